//! Named predicates consulted by `is(..)` validators

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type PredicateFn = dyn Fn(&str) -> bool + Send + Sync;

/// Lookup of named value predicates
///
/// `None` means the name is unknown, which the engine treats as a
/// misconfigured form rather than a failed value.
pub trait Predicates: Send + Sync {
    fn check(&self, name: &str, value: &str) -> Option<bool>;
}

/// Predicates from `rusty_forms_validation`
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardPredicates;

impl Predicates for StandardPredicates {
    fn check(&self, name: &str, value: &str) -> Option<bool> {
        rusty_forms_validation::predicate(name).map(|predicate| predicate(value))
    }
}

/// Application predicates layered over another set
#[derive(Clone)]
pub struct PredicateSet {
    custom: HashMap<String, Arc<PredicateFn>>,
    fallback: Arc<dyn Predicates>,
}

impl PredicateSet {
    pub fn new() -> Self {
        Self {
            custom: HashMap::new(),
            fallback: Arc::new(StandardPredicates),
        }
    }

    pub fn with<F>(mut self, name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.custom.insert(name.into(), Arc::new(predicate));
        self
    }

    pub fn fallback(mut self, fallback: impl Predicates + 'static) -> Self {
        self.fallback = Arc::new(fallback);
        self
    }
}

impl Default for PredicateSet {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PredicateSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredicateSet")
            .field("custom", &self.custom.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Predicates for PredicateSet {
    fn check(&self, name: &str, value: &str) -> Option<bool> {
        match self.custom.get(name) {
            Some(predicate) => Some(predicate(value)),
            None => self.fallback.check(name, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_predicates() {
        assert_eq!(StandardPredicates.check("email", "a@b.com"), Some(true));
        assert_eq!(StandardPredicates.check("email", "not-an-email"), Some(false));
        assert_eq!(StandardPredicates.check("shoe_size", "42"), None);
    }

    #[test]
    fn test_custom_predicate_overrides_and_falls_back() {
        let set = PredicateSet::new()
            .with("even", |v| v.parse::<i64>().map(|n| n % 2 == 0).unwrap_or(false))
            .with("email", |v| v.ends_with("@corp.example"));
        assert_eq!(set.check("even", "4"), Some(true));
        assert_eq!(set.check("even", "3"), Some(false));
        assert_eq!(set.check("email", "a@b.com"), Some(false));
        assert_eq!(set.check("uuid", "nope"), Some(false));
        assert_eq!(set.check("unknown", "x"), None);
    }
}
