//! Key-matching predicates used to scope listener delivery (spec §4.5).

use std::fmt;
use std::sync::Arc;

use crate::key::Key;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringOperator {
    Equals,
    StartsWith,
    EndsWith,
    Contains,
}

impl StringOperator {
    fn evaluate(self, haystack: &str, needle: &str) -> bool {
        match self {
            StringOperator::Equals => haystack == needle,
            StringOperator::StartsWith => haystack.starts_with(needle),
            StringOperator::EndsWith => haystack.ends_with(needle),
            StringOperator::Contains => haystack.contains(needle),
        }
    }
}

/// A boolean predicate over a [`Key`], composable with [`Matcher::and`],
/// [`Matcher::or`], and [`Matcher::negate`].
#[derive(Clone)]
pub struct Matcher(Arc<dyn Fn(&Key) -> bool + Send + Sync>);

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Matcher(..)")
    }
}

impl Matcher {
    fn new(f: impl Fn(&Key) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn is_match(&self, key: &Key) -> bool {
        (self.0)(key)
    }

    pub fn everything() -> Self {
        Matcher::new(|_| true)
    }

    pub fn name(op: StringOperator, value: impl Into<String>) -> Self {
        let value = value.into();
        Matcher::new(move |key: &Key| op.evaluate(&key.name, &value))
    }

    pub fn group(op: StringOperator, value: impl Into<String>) -> Self {
        let value = value.into();
        Matcher::new(move |key: &Key| op.evaluate(&key.group, &value))
    }

    pub fn any_group() -> Self {
        Matcher::everything()
    }

    pub fn key(target: Key) -> Self {
        Matcher::new(move |key: &Key| *key == target)
    }

    pub fn and(self, other: Matcher) -> Self {
        Matcher::new(move |key: &Key| self.is_match(key) && other.is_match(key))
    }

    pub fn or(self, other: Matcher) -> Self {
        Matcher::new(move |key: &Key| self.is_match(key) || other.is_match(key))
    }

    pub fn negate(self) -> Self {
        Matcher::new(move |key: &Key| !self.is_match(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_equals_matches_only_exact_name() {
        let m = Matcher::name(StringOperator::Equals, "job-a");
        assert!(m.is_match(&Key::new("job-a")));
        assert!(!m.is_match(&Key::new("job-b")));
    }

    #[test]
    fn group_contains_matches_substring() {
        let m = Matcher::group(StringOperator::Contains, "report");
        assert!(m.is_match(&Key::with_group("x", "nightly-reports")));
        assert!(!m.is_match(&Key::with_group("x", "billing")));
    }

    #[test]
    fn and_or_not_compose() {
        let a = Matcher::name(StringOperator::StartsWith, "job");
        let b = Matcher::group(StringOperator::Equals, "DEFAULT");
        let and = a.clone().and(b.clone());
        let or = a.clone().or(b.clone());
        let not = a.clone().negate();

        let key = Key::new("job-1");
        assert_eq!(and.is_match(&key), a.is_match(&key) && b.is_match(&key));
        assert_eq!(or.is_match(&key), a.is_match(&key) || b.is_match(&key));
        assert_eq!(not.is_match(&key), !a.is_match(&key));
    }

    #[test]
    fn everything_matches_any_key() {
        let m = Matcher::everything();
        assert!(m.is_match(&Key::new("anything")));
        assert!(m.is_match(&Key::with_group("x", "y")));
    }

    #[test]
    fn any_group_matches_every_key() {
        let m = Matcher::any_group();
        assert!(m.is_match(&Key::with_group("x", "g1")));
        assert!(m.is_match(&Key::with_group("x", "g2")));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn arb_key() -> impl Strategy<Value = Key> {
        ("[a-z]{1,6}", "[a-z]{1,6}").prop_map(|(name, group)| Key::with_group(name, group))
    }

    fn arb_matcher() -> impl Strategy<Value = Matcher> {
        prop_oneof![
            "[a-z]{1,6}".prop_map(|s| Matcher::name(StringOperator::Contains, s)),
            "[a-z]{1,6}".prop_map(|s| Matcher::group(StringOperator::Contains, s)),
            Just(Matcher::everything()),
        ]
    }

    proptest! {
        #[test]
        fn and_matches_iff_both_match(key in arb_key(), a in arb_matcher(), b in arb_matcher()) {
            let expected = a.is_match(&key) && b.is_match(&key);
            prop_assert_eq!(a.and(b).is_match(&key), expected);
        }

        #[test]
        fn or_matches_iff_either_matches(key in arb_key(), a in arb_matcher(), b in arb_matcher()) {
            let expected = a.is_match(&key) || b.is_match(&key);
            prop_assert_eq!(a.or(b).is_match(&key), expected);
        }

        #[test]
        fn not_is_the_logical_complement(key in arb_key(), a in arb_matcher()) {
            let expected = !a.is_match(&key);
            prop_assert_eq!(a.negate().is_match(&key), expected);
        }

        #[test]
        fn any_group_always_matches(key in arb_key()) {
            prop_assert!(Matcher::any_group().is_match(&key));
        }
    }
}
