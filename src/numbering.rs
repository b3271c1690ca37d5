use rand::seq::SliceRandom;
use regex::Regex;

use crate::error::{BotError, Result};

/// Strips and applies numeric nickname prefixes.
///
/// Patterns are configuration, not hard-coded: each is a regex anchored at
/// the start of the name, applied once, in order, to the progressively
/// stripped result. The compiled set lives for the process lifetime.
#[derive(Debug)]
pub struct NicknameTransformer {
    patterns: Vec<Regex>,
    width: usize,
}

impl NicknameTransformer {
    pub fn new(patterns: &[String], width: usize) -> Result<Self> {
        let compiled = patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| BotError::InvalidPattern {
                    pattern: p.clone(),
                    source: e,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            patterns: compiled,
            width,
        })
    }

    /// Remove any configured numeric prefix from a display name.
    ///
    /// Absence of a match is a no-op; the result is always trimmed.
    pub fn strip(&self, name: &str) -> String {
        let mut result = name.to_string();
        for pattern in &self.patterns {
            result = pattern.replace(&result, "").into_owned();
        }
        result.trim().to_string()
    }

    /// Produce a numbered display name: "03. Name".
    ///
    /// The input is stripped first, so renumbering an already-numbered
    /// name replaces the old prefix instead of stacking a second one.
    pub fn apply(&self, name: &str, number: usize) -> String {
        format!("{:0w$}. {}", number, self.strip(name), w = self.width)
    }

    pub fn width(&self) -> usize {
        self.width
    }
}

/// A uniformly random permutation of 1..=n (Fisher-Yates via rand).
pub fn shuffled_numbers(n: usize) -> Vec<usize> {
    let mut numbers: Vec<usize> = (1..=n).collect();
    numbers.shuffle(&mut rand::thread_rng());
    numbers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_NUMBER_FORMATS;

    fn transformer() -> NicknameTransformer {
        let patterns: Vec<String> = DEFAULT_NUMBER_FORMATS
            .iter()
            .map(|p| p.to_string())
            .collect();
        NicknameTransformer::new(&patterns, 2).unwrap()
    }

    #[test]
    fn test_strip_common_formats() {
        let t = transformer();
        assert_eq!(t.strip("01. Alice"), "Alice");
        assert_eq!(t.strip("7 || Bob"), "Bob");
        assert_eq!(t.strip("12 Carol"), "Carol");
        assert_eq!(t.strip("[03] Dave"), "Dave");
    }

    #[test]
    fn test_strip_without_prefix_is_trim() {
        let t = transformer();
        assert_eq!(t.strip("Alice"), "Alice");
        assert_eq!(t.strip("  Alice  "), "Alice");
        assert_eq!(t.strip(""), "");
    }

    #[test]
    fn test_apply_format() {
        let t = transformer();
        assert_eq!(t.apply("Alice", 3), "03. Alice");
        assert_eq!(t.apply("Bob", 12), "12. Bob");
    }

    #[test]
    fn test_apply_replaces_existing_prefix() {
        let t = transformer();
        assert_eq!(t.strip("07. Bob"), "Bob");
        assert_eq!(t.apply("07. Bob", 12), "12. Bob");
    }

    #[test]
    fn test_strip_apply_roundtrip() {
        let t = transformer();
        for name in ["Alice", "05. Alice", "[9] Bob", "  Carol  "] {
            for n in [1, 7, 42] {
                assert_eq!(t.strip(&t.apply(name, n)), t.strip(name));
            }
        }
    }

    #[test]
    fn test_wider_padding() {
        let patterns: Vec<String> = DEFAULT_NUMBER_FORMATS
            .iter()
            .map(|p| p.to_string())
            .collect();
        let t = NicknameTransformer::new(&patterns, 3).unwrap();
        assert_eq!(t.apply("Alice", 3), "003. Alice");
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let patterns = vec!["[unclosed".to_string()];
        assert!(NicknameTransformer::new(&patterns, 2).is_err());
    }

    #[test]
    fn test_shuffled_numbers_is_permutation() {
        for n in [1, 2, 5, 20] {
            let mut numbers = shuffled_numbers(n);
            numbers.sort_unstable();
            let expected: Vec<usize> = (1..=n).collect();
            assert_eq!(numbers, expected);
        }
    }

    #[test]
    fn test_shuffled_numbers_varies() {
        // With 6 elements there are 720 orderings; 50 draws yielding a
        // single ordering would indicate a broken shuffle.
        let mut seen = std::collections::HashSet::new();
        for _ in 0..50 {
            seen.insert(shuffled_numbers(6));
        }
        assert!(seen.len() > 1);
    }

    #[test]
    fn test_shuffled_numbers_empty() {
        assert!(shuffled_numbers(0).is_empty());
    }
}
