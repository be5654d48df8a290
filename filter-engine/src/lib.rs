//! Pure text and group predicates: keyword matching, spam detection and
//! blacklist membership. No I/O anywhere in this crate.
//!
//! Patterns are compiled once per config snapshot. Construction fails on
//! an invalid spam regex, which surfaces a bad config at startup instead
//! of on the first matching post.

use regex::Regex;
use repostbot_core::{Config, ConfigError};
use std::collections::HashSet;

#[derive(Debug)]
pub struct FilterEngine {
    keyword_patterns: Vec<Regex>,
    stop_words: Vec<String>,
    spam_patterns: Vec<Regex>,
    blacklist: HashSet<i64>,
}

impl FilterEngine {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Self::new(
            &config.post_keywords,
            &config.stop_words,
            &config.spam_regex,
            &config.blacklist_groups,
        )
    }

    pub fn new(
        post_keywords: &[String],
        stop_words: &[String],
        spam_regex: &[String],
        blacklist_groups: &[i64],
    ) -> Result<Self, ConfigError> {
        // An empty keyword, stop word or pattern matches every text, so
        // all three lists reject blank entries up front.
        let keyword_patterns = post_keywords
            .iter()
            .map(|kw| {
                if kw.trim().is_empty() {
                    return Err(invalid("post_keywords", kw));
                }
                // Whole-word, case-insensitive: "cat" must not fire on
                // "category".
                Regex::new(&format!(r"(?i)\b{}\b", regex::escape(kw)))
                    .map_err(|_| invalid("post_keywords", kw))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(word) = stop_words.iter().find(|w| w.trim().is_empty()) {
            return Err(invalid("stop_words", word));
        }

        let spam_patterns = spam_regex
            .iter()
            .map(|pattern| {
                if pattern.trim().is_empty() {
                    return Err(invalid("spam_regex", pattern));
                }
                Regex::new(&format!("(?i){}", pattern))
                    .map_err(|_| invalid("spam_regex", pattern))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            keyword_patterns,
            stop_words: stop_words.iter().map(|w| w.to_lowercase()).collect(),
            spam_patterns,
            blacklist: blacklist_groups.iter().copied().collect(),
        })
    }

    /// True iff any keyword occurs as a whole word, case-insensitively.
    pub fn matches_keywords(&self, text: &str) -> bool {
        self.keyword_patterns.iter().any(|p| p.is_match(text))
    }

    /// True if any stop word appears as a substring (case-insensitive) or
    /// any spam pattern matches.
    pub fn is_spam(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        if self.stop_words.iter().any(|w| lowered.contains(w)) {
            return true;
        }
        self.spam_patterns.iter().any(|p| p.is_match(text))
    }

    /// Config-level blacklist. The persistent blacklist table is checked
    /// separately by the pipeline.
    pub fn is_blacklisted(&self, group_id: i64) -> bool {
        self.blacklist.contains(&group_id)
    }
}

fn invalid(field: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(keywords: &[&str], stop_words: &[&str], spam: &[&str]) -> FilterEngine {
        FilterEngine::new(
            &keywords.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
            &stop_words.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
            &spam.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
            &[-100, -200],
        )
        .unwrap()
    }

    #[test]
    fn test_whole_word_keyword_matching() {
        let f = engine(&["cat"], &[], &[]);

        assert!(f.matches_keywords("a cat sat"));
        assert!(f.matches_keywords("Cat!"));
        assert!(f.matches_keywords("the CAT"));
        assert!(!f.matches_keywords("category"));
        assert!(!f.matches_keywords("concatenate"));
        assert!(!f.matches_keywords(""));
    }

    #[test]
    fn test_any_keyword_suffices() {
        let f = engine(&["concert", "festival"], &[], &[]);
        assert!(f.matches_keywords("summer festival lineup"));
        assert!(f.matches_keywords("concert tonight"));
        assert!(!f.matches_keywords("quiet evening"));
    }

    #[test]
    fn test_cyrillic_keywords() {
        let f = engine(&["концерт"], &[], &[]);
        assert!(f.matches_keywords("Большой КОНЦЕРТ в субботу"));
        assert!(!f.matches_keywords("концертный зал закрыт"));
    }

    #[test]
    fn test_stop_words_are_substrings() {
        let f = engine(&[], &["casino"], &[]);
        assert!(f.is_spam("best CASINO bonuses"));
        // Substring semantics, unlike keywords.
        assert!(f.is_spam("supercasino777"));
        assert!(!f.is_spam("card games night"));
    }

    #[test]
    fn test_spam_regex_case_insensitive() {
        let f = engine(&[], &[], &[r"win \d+ rub"]);
        assert!(f.is_spam("WIN 1000 RUB now"));
        assert!(!f.is_spam("the winner is announced"));
    }

    #[test]
    fn test_blank_entries_fail_construction() {
        // "".contains("") is true for every text, so an empty stop word
        // would flag everything as spam.
        let result = FilterEngine::new(&[], &[String::new()], &[], &[]);
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { field, .. }) if field == "stop_words"
        ));

        let result = FilterEngine::new(&["  ".to_string()], &[], &[], &[]);
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { field, .. }) if field == "post_keywords"
        ));

        let result = FilterEngine::new(&[], &[], &[String::new()], &[]);
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { field, .. }) if field == "spam_regex"
        ));
    }

    #[test]
    fn test_invalid_spam_regex_fails_construction() {
        let result = FilterEngine::new(&[], &[], &["(unclosed".to_string()], &[]);
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { field, .. }) if field == "spam_regex"
        ));
    }

    #[test]
    fn test_blacklist_membership() {
        let f = engine(&[], &[], &[]);
        assert!(f.is_blacklisted(-100));
        assert!(f.is_blacklisted(-200));
        assert!(!f.is_blacklisted(-300));
    }

    #[test]
    fn test_keywords_with_regex_metacharacters_are_escaped() {
        let f = engine(&["c.t"], &[], &[]);
        // The dot is literal, not a wildcard.
        assert!(!f.matches_keywords("a cat sat"));
        assert!(f.matches_keywords("open c.t now"));
    }
}
