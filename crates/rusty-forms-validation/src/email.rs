//! Email address predicates

/// List of common public email domains
const PUBLIC_DOMAINS: &[&str] = &[
    "gmail.com",
    "yahoo.com",
    "hotmail.com",
    "outlook.com",
    "icloud.com",
    "aol.com",
    "mail.com",
    "protonmail.com",
    "yandex.com",
    "zoho.com",
];

/// Validates email format
///
/// With the `rfc-email` feature this defers to an RFC 5322 parser.
#[cfg(feature = "rfc-email")]
pub fn is_valid_email(email: &str) -> bool {
    email_address::EmailAddress::is_valid(email)
}

/// Validates basic email format
///
/// Checks for:
/// - Exactly one '@' symbol with content on both sides
/// - A dotted domain that doesn't start or end with '.' or '-'
/// - A top level domain of at least two characters
#[cfg(not(feature = "rfc-email"))]
pub fn is_valid_email(email: &str) -> bool {
    if email.len() < 3 {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    if domain.contains('@') {
        return false;
    }

    if local.is_empty() || local.len() > 64 {
        return false;
    }

    if domain.is_empty() || domain.len() > 255 || !domain.contains('.') {
        return false;
    }

    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
        || domain.contains("..")
    {
        return false;
    }

    let valid_local_chars = |c: char| c.is_ascii_alphanumeric() || "._%+-".contains(c);
    if !local.chars().all(valid_local_chars) {
        return false;
    }

    let valid_domain_chars = |c: char| c.is_ascii_alphanumeric() || c == '.' || c == '-';
    if !domain.chars().all(valid_domain_chars) {
        return false;
    }

    // TLD must be at least 2 characters
    match domain.rfind('.') {
        Some(last_dot) => domain.len() - last_dot - 1 >= 2,
        None => false,
    }
}

/// Checks if email domain is a public domain (gmail, yahoo, etc.)
pub fn is_public_domain(email: &str) -> bool {
    email
        .split('@')
        .nth(1)
        .map(|domain| PUBLIC_DOMAINS.iter().any(|d| d.eq_ignore_ascii_case(domain)))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_emails() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("test.user@example.co.uk"));
        assert!(is_valid_email("user+tag@example.com"));
        assert!(is_valid_email("user_name@example-domain.com"));
        assert!(is_valid_email("a@b.co"));
    }

    #[cfg(not(feature = "rfc-email"))]
    #[test]
    fn test_invalid_emails() {
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("@"));
        assert!(!is_valid_email("user@"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("user@@example.com"));
        assert!(!is_valid_email("user@example"));
        assert!(!is_valid_email("user@.com"));
        assert!(!is_valid_email("user@example..com"));
        assert!(!is_valid_email("not-an-email"));
    }

    #[cfg(feature = "rfc-email")]
    #[test]
    fn test_invalid_emails_rfc() {
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("user@"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("not-an-email"));
    }

    #[test]
    fn test_public_domains() {
        assert!(is_public_domain("user@gmail.com"));
        assert!(is_public_domain("user@GMAIL.COM"));
        assert!(!is_public_domain("user@company.com"));
    }
}
