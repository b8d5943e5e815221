//! String shape predicates

use once_cell::sync::Lazy;
use regex::Regex;

static ISO_DATE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-(0[1-9]|1[0-2])-(0[1-9]|[12]\d|3[01])$").expect("date pattern compiles")
});

/// URL validation
///
/// With the `rfc-url` feature this is a full RFC 3986 parse. Otherwise it
/// requires an http/https scheme followed by a dotted host.
#[cfg(feature = "rfc-url")]
pub fn is_valid_url(url: &str) -> bool {
    url::Url::parse(url).is_ok()
}

#[cfg(not(feature = "rfc-url"))]
pub fn is_valid_url(url: &str) -> bool {
    let after_protocol = match url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
    {
        Some(rest) => rest,
        None => return false,
    };

    let host = after_protocol.split(['/', '?', '#']).next().unwrap_or("");
    !host.is_empty() && host.contains('.') && !host.chars().any(char::is_whitespace)
}

pub fn is_alpha(s: &str) -> bool {
    !s.is_empty() && s.chars().all(char::is_alphabetic)
}

pub fn is_alphanumeric(s: &str) -> bool {
    !s.is_empty() && s.chars().all(char::is_alphanumeric)
}

pub fn is_lowercase(s: &str) -> bool {
    s == s.to_lowercase()
}

pub fn is_uppercase(s: &str) -> bool {
    s == s.to_uppercase()
}

pub fn is_hex(s: &str) -> bool {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_hexdigit())
}

pub fn is_uuid(s: &str) -> bool {
    uuid::Uuid::parse_str(s).is_ok()
}

/// `YYYY-MM-DD`
pub fn is_iso_date(s: &str) -> bool {
    ISO_DATE_REGEX.is_match(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[cfg(not(feature = "rfc-url"))]
    #[rstest]
    #[case("https://example.com", true)]
    #[case("http://example.com/path?q=1", true)]
    #[case("ftp://example.com", false)]
    #[case("https://", false)]
    #[case("https://localhost", false)]
    #[case("example.com", false)]
    fn test_url(#[case] input: &str, #[case] expected: bool) {
        assert_eq!(is_valid_url(input), expected);
    }

    #[cfg(feature = "rfc-url")]
    #[rstest]
    #[case("https://example.com", true)]
    #[case("ftp://example.com/file", true)]
    #[case("https://localhost", true)]
    #[case("example.com", false)]
    #[case("http://exa mple.com", false)]
    fn test_url_rfc(#[case] input: &str, #[case] expected: bool) {
        assert_eq!(is_valid_url(input), expected);
    }

    #[test]
    fn test_character_classes() {
        assert!(is_alpha("abc"));
        assert!(!is_alpha("abc1"));
        assert!(!is_alpha(""));
        assert!(is_alphanumeric("abc1"));
        assert!(!is_alphanumeric("abc 1"));
        assert!(is_lowercase("abc"));
        assert!(!is_lowercase("aBc"));
        assert!(is_uppercase("ABC"));
    }

    #[test]
    fn test_hex_and_uuid() {
        assert!(is_hex("0xFF"));
        assert!(is_hex("deadbeef"));
        assert!(!is_hex("xyz"));
        assert!(is_uuid("550e8400-e29b-41d4-a716-446655440000"));
        assert!(is_uuid("550E8400-E29B-41D4-A716-446655440000"));
        assert!(!is_uuid("550e8400"));
        assert!(!is_uuid("550e8400-e29b-41d4-a716-44665544000g"));
    }

    #[test]
    fn test_iso_date() {
        assert!(is_iso_date("2024-02-29"));
        assert!(!is_iso_date("2024-13-01"));
        assert!(!is_iso_date("24-01-01"));
    }
}
