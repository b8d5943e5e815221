//! Numeric shape predicates

/// Digits only, no sign or separator
pub fn is_numeric(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

/// A signed whole number
pub fn is_int(s: &str) -> bool {
    s.trim().parse::<i64>().is_ok()
}

/// Any finite decimal number
pub fn is_float(s: &str) -> bool {
    s.trim().parse::<f64>().map(f64::is_finite).unwrap_or(false)
}
