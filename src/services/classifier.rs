use crate::models::PhraseRules;
use regex::Regex;
use std::sync::Arc;

/// What an inbound text line means to the automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextSignal {
    /// Listing storage is full; stop listing and start reselling.
    Blocked,
    /// One of our listings was bought.
    Sold,
}

/// Maps inbound text lines to signals. Unrecognised text yields `None`.
pub trait TextClassifier: Send + Sync {
    fn classify(&self, text: &str) -> Option<TextSignal>;
}

/// Case-sensitive substring matcher over [`PhraseRules`].
///
/// The blocked rule is checked first, so a line matching both counts as
/// blocked.
#[derive(Debug, Clone, Default)]
pub struct PhraseClassifier {
    rules: PhraseRules,
}

impl PhraseClassifier {
    pub fn new(rules: PhraseRules) -> Self {
        Self { rules }
    }
}

impl TextClassifier for PhraseClassifier {
    fn classify(&self, text: &str) -> Option<TextSignal> {
        if self.rules.blocked_any.iter().any(|p| text.contains(p.as_str())) {
            return Some(TextSignal::Blocked);
        }

        let sold = !self.rules.sold_all.is_empty()
            && self.rules.sold_all.iter().all(|p| text.contains(p.as_str()));
        sold.then_some(TextSignal::Sold)
    }
}

/// Matcher for servers whose messages need more than fixed phrases.
///
/// Same shape as [`PhraseClassifier`]: any blocked pattern matches, or every
/// sold pattern matches.
#[derive(Debug, Clone)]
pub struct RegexClassifier {
    blocked_any: Vec<Regex>,
    sold_all: Vec<Regex>,
}

impl RegexClassifier {
    pub fn new(blocked: &str, sold: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            blocked_any: vec![Regex::new(blocked)?],
            sold_all: vec![Regex::new(sold)?],
        })
    }

    /// Compile every entry of `rules` as a pattern.
    pub fn from_rules(rules: &PhraseRules) -> Result<Self, regex::Error> {
        let compile = |patterns: &[String]| {
            patterns
                .iter()
                .map(|p| Regex::new(p))
                .collect::<Result<Vec<_>, _>>()
        };
        Ok(Self {
            blocked_any: compile(&rules.blocked_any)?,
            sold_all: compile(&rules.sold_all)?,
        })
    }
}

impl TextClassifier for RegexClassifier {
    fn classify(&self, text: &str) -> Option<TextSignal> {
        if self.blocked_any.iter().any(|re| re.is_match(text)) {
            return Some(TextSignal::Blocked);
        }

        let sold = !self.sold_all.is_empty() && self.sold_all.iter().all(|re| re.is_match(text));
        sold.then_some(TextSignal::Sold)
    }
}

/// Build the classifier described by `rules`.
///
/// # Errors
/// Fails if `rules.regex` is set and a pattern does not compile.
pub fn classifier_for(rules: &PhraseRules) -> Result<Arc<dyn TextClassifier>, regex::Error> {
    if rules.regex {
        Ok(Arc::new(RegexClassifier::from_rules(rules)?))
    } else {
        Ok(Arc::new(PhraseClassifier::new(rules.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_phrases() {
        let classifier = PhraseClassifier::default();

        assert_eq!(
            classifier.classify("[AH] Освободите хранилище или уберите предметы с продажи"),
            Some(TextSignal::Blocked)
        );
        assert_eq!(
            classifier.classify("Пожалуйста, уберите предметы с продажи"),
            Some(TextSignal::Blocked)
        );
        assert_eq!(
            classifier.classify("У Вас купили Алмаз x5 на /ah за 1200"),
            Some(TextSignal::Sold)
        );
    }

    #[test]
    fn test_sold_requires_every_phrase() {
        let classifier = PhraseClassifier::default();
        assert_eq!(classifier.classify("У Вас купили Алмаз x5"), None);
        assert_eq!(classifier.classify("Лоты на /ah обновлены"), None);
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        let classifier = PhraseClassifier::default();
        assert_eq!(classifier.classify("у вас купили алмаз на /ah"), None);
    }

    #[test]
    fn test_unrelated_text_ignored() {
        let classifier = PhraseClassifier::default();
        assert_eq!(classifier.classify(""), None);
        assert_eq!(classifier.classify("<Steve> hello"), None);
    }

    #[test]
    fn test_empty_sold_rule_never_matches() {
        let classifier = PhraseClassifier::new(PhraseRules {
            blocked_any: vec!["full".to_string()],
            sold_all: Vec::new(),
            regex: false,
        });
        assert_eq!(classifier.classify("anything"), None);
        assert_eq!(classifier.classify("storage full"), Some(TextSignal::Blocked));
    }

    #[test]
    fn test_regex_classifier() {
        let classifier =
            RegexClassifier::new(r"(?i)auction house is full", r"bought your .+ for \d+").unwrap();

        assert_eq!(
            classifier.classify("The Auction House is FULL"),
            Some(TextSignal::Blocked)
        );
        assert_eq!(
            classifier.classify("Alex bought your Diamond x5 for 1200"),
            Some(TextSignal::Sold)
        );
        assert_eq!(classifier.classify("Alex bought nothing"), None);
    }

    #[test]
    fn test_regex_classifier_rejects_bad_pattern() {
        assert!(RegexClassifier::new("(", "ok").is_err());
    }

    #[test]
    fn test_classifier_for_substring_rules() {
        let classifier = classifier_for(&PhraseRules::default()).unwrap();
        assert_eq!(
            classifier.classify("У Вас купили Алмаз x5 на /ah за 1200"),
            Some(TextSignal::Sold)
        );
        // Metacharacters are literal without the regex switch.
        let literal = classifier_for(&PhraseRules {
            blocked_any: vec!["full (ah)".to_string()],
            sold_all: vec!["sold".to_string()],
            regex: false,
        })
        .unwrap();
        assert_eq!(literal.classify("storage full (ah)"), Some(TextSignal::Blocked));
        assert_eq!(literal.classify("storage full ah"), None);
    }

    #[test]
    fn test_classifier_for_regex_rules() {
        let rules = PhraseRules {
            blocked_any: vec![r"(?i)auction house is full".to_string()],
            sold_all: vec![r"^\w+ bought".to_string(), r"for \d+$".to_string()],
            regex: true,
        };
        let classifier = classifier_for(&rules).unwrap();

        assert_eq!(classifier.classify("AUCTION HOUSE IS FULL"), Some(TextSignal::Blocked));
        assert_eq!(classifier.classify("Alex bought Diamond x5 for 1200"), Some(TextSignal::Sold));
        assert_eq!(classifier.classify("Alex bought Diamond x5"), None);

        let broken = PhraseRules {
            blocked_any: vec!["(".to_string()],
            ..rules
        };
        assert!(classifier_for(&broken).is_err());
    }
}
