//! Rusty-Forms-Validation
//!
//! Named string predicates backing the `is(...)` validator of rusty-forms.
//! Every predicate takes the submitted value as text and answers whether it
//! has the named shape. Unknown names resolve to `None` so the engine can
//! report a misconfigured form instead of silently passing.

pub mod email;
pub mod numeric;
pub mod string;

pub use email::*;
pub use numeric::*;
pub use string::*;

/// A named predicate over a submitted string value
pub type Predicate = fn(&str) -> bool;

/// Names understood by [`predicate`], in lookup order
pub const PREDICATE_NAMES: &[&str] = &[
    "email",
    "url",
    "alpha",
    "alphanumeric",
    "numeric",
    "int",
    "integer",
    "float",
    "decimal",
    "lowercase",
    "uppercase",
    "hex",
    "uuid",
    "date",
    "public_email",
];

/// Resolve a predicate by name (case-insensitive)
///
/// ```
/// use rusty_forms_validation::predicate;
///
/// let is_email = predicate("email").unwrap();
/// assert!(is_email("a@b.com"));
/// assert!(predicate("no-such-thing").is_none());
/// ```
pub fn predicate(name: &str) -> Option<Predicate> {
    let predicate: Predicate = match name.to_ascii_lowercase().as_str() {
        "email" => is_valid_email,
        "url" => is_valid_url,
        "alpha" => is_alpha,
        "alphanumeric" => is_alphanumeric,
        "numeric" => is_numeric,
        "int" | "integer" => is_int,
        "float" | "decimal" => is_float,
        "lowercase" => is_lowercase,
        "uppercase" => is_uppercase,
        "hex" => is_hex,
        "uuid" => is_uuid,
        "date" => is_iso_date,
        "public_email" => is_public_domain,
        _ => return None,
    };
    Some(predicate)
}
