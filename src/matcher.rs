//! Ordered phrase tables
//!
//! Every keyword classification in the agent (date phrases, intents, metric words,
//! rank order words) is an ordered list of `(phrases, value)` rules resolved by
//! first match. The table order is the priority order.

/// One rule: any of `phrases` contained in the text selects `value`.
#[derive(Debug, Clone)]
pub struct PhraseRule<T> {
    pub phrases: &'static [&'static str],
    pub value: T,
}

impl<T> PhraseRule<T> {
    pub const fn new(phrases: &'static [&'static str], value: T) -> Self {
        Self { phrases, value }
    }

    /// First phrase of this rule found in `text`, if any.
    pub fn matched_phrase(&self, text: &str) -> Option<&'static str> {
        self.phrases.iter().copied().find(|p| text.contains(p))
    }
}

/// First-match resolver over an ordered rule list.
#[derive(Debug, Clone)]
pub struct PhraseTable<T> {
    rules: Vec<PhraseRule<T>>,
}

impl<T> PhraseTable<T> {
    pub fn new(rules: Vec<PhraseRule<T>>) -> Self {
        Self { rules }
    }

    /// Resolve `text` (expected lower-cased) to the value of the first matching rule.
    pub fn resolve(&self, text: &str) -> Option<&T> {
        self.resolve_with_phrase(text).map(|(value, _)| value)
    }

    /// Same as [`resolve`](Self::resolve) but also reports which phrase fired.
    pub fn resolve_with_phrase(&self, text: &str) -> Option<(&T, &'static str)> {
        self.rules
            .iter()
            .find_map(|rule| rule.matched_phrase(text).map(|p| (&rule.value, p)))
    }

    /// Index of the first matching rule.
    pub fn position(&self, text: &str) -> Option<usize> {
        self.rules
            .iter()
            .position(|rule| rule.matched_phrase(text).is_some())
    }

    pub fn rules(&self) -> &[PhraseRule<T>] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_rule_wins_over_later_match() {
        let table = PhraseTable::new(vec![
            PhraseRule::new(&["net sales"], "net"),
            PhraseRule::new(&["sales"], "gross"),
        ]);
        assert_eq!(table.resolve("show net sales today"), Some(&"net"));
        assert_eq!(table.resolve("show sales today"), Some(&"gross"));
        assert_eq!(table.position("show net sales today"), Some(0));
    }

    #[test]
    fn test_no_match_is_none() {
        let table = PhraseTable::new(vec![PhraseRule::new(&["returns"], 1)]);
        assert!(table.resolve("how are we doing").is_none());
        assert!(table.position("how are we doing").is_none());
    }

    #[test]
    fn test_reports_matched_phrase() {
        let table = PhraseTable::new(vec![PhraseRule::new(&["refund", "return"], ())]);
        let (_, phrase) = table.resolve_with_phrase("any returns today").unwrap();
        assert_eq!(phrase, "return");
    }
}
