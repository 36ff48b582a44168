//! Character and token counting for prompt-size estimates.
//!
//! The default estimator is a deterministic segmentation, not a real
//! subword tokenizer:
//!
//! - whitespace separates and costs nothing,
//! - each maximal run of alphanumeric or `_` characters costs
//!   `ceil(len / 4)` tokens (long identifiers split like subwords),
//! - every other character (punctuation, symbols) costs one token.
//!
//! Appending text can only extend the last run or add new tokens, and
//! `ceil` is non-decreasing, so the count never drops when text grows.
//!
//! tiktoken-rs BPE counting is available for model-accurate numbers. BPE
//! merges make it non-monotonic under append, so it is opt-in.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tiktoken_rs::CoreBPE;

/// Characters per token inside a word run.
const CHARS_PER_TOKEN: usize = 4;

/// How token counts are estimated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenEstimator {
    /// Whitespace/punctuation-aware approximation.
    #[default]
    Approximate,
    /// cl100k_base: GPT-4, GPT-3.5-turbo
    Cl100k,
    /// o200k_base: GPT-4o
    O200k,
}

impl std::fmt::Display for TokenEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenEstimator::Approximate => write!(f, "approx"),
            TokenEstimator::Cl100k => write!(f, "cl100k_base"),
            TokenEstimator::O200k => write!(f, "o200k_base"),
        }
    }
}

impl std::str::FromStr for TokenEstimator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "approx" | "approximate" => Ok(TokenEstimator::Approximate),
            "cl100k" | "cl100k_base" => Ok(TokenEstimator::Cl100k),
            "o200k" | "o200k_base" => Ok(TokenEstimator::O200k),
            _ => Err(format!("unknown token estimator: {}", s)),
        }
    }
}

/// Character and token counts for a piece of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Counts {
    /// Unicode scalar values.
    pub chars: usize,
    /// Estimated tokens.
    pub tokens: usize,
}

// Cached tokenizers - initialized once per encoding
static CL100K: OnceLock<Option<CoreBPE>> = OnceLock::new();
static O200K: OnceLock<Option<CoreBPE>> = OnceLock::new();

fn get_tokenizer(estimator: TokenEstimator) -> Option<&'static CoreBPE> {
    match estimator {
        TokenEstimator::Approximate => None,
        TokenEstimator::Cl100k => CL100K
            .get_or_init(|| tiktoken_rs::cl100k_base().ok())
            .as_ref(),
        TokenEstimator::O200k => O200K
            .get_or_init(|| tiktoken_rs::o200k_base().ok())
            .as_ref(),
    }
}

fn tiktoken_count(text: &str, estimator: TokenEstimator) -> Option<usize> {
    let bpe = get_tokenizer(estimator)?;
    Some(bpe.encode_ordinary(text).len())
}

/// Approximate token count; see the module docs for the rules.
pub fn approximate_tokens(text: &str) -> usize {
    let mut tokens = 0;
    let mut run: usize = 0;

    for c in text.chars() {
        if c.is_alphanumeric() || c == '_' {
            run += 1;
            continue;
        }
        tokens += run.div_ceil(CHARS_PER_TOKEN);
        run = 0;
        if !c.is_whitespace() {
            tokens += 1;
        }
    }

    tokens + run.div_ceil(CHARS_PER_TOKEN)
}

/// Count tokens with the given estimator.
///
/// BPE estimators fall back to the approximation if their tables cannot
/// be loaded.
pub fn count_tokens_with(text: &str, estimator: TokenEstimator) -> usize {
    if text.is_empty() {
        return 0;
    }
    tiktoken_count(text, estimator).unwrap_or_else(|| approximate_tokens(text))
}

/// Count characters and approximate tokens.
///
/// # Examples
///
/// ```
/// use ctxpack::tokens::count;
///
/// let counts = count("fn main() {}");
/// assert_eq!(counts.chars, 12);
/// assert!(counts.tokens > 0);
/// assert_eq!(count("").tokens, 0);
/// ```
pub fn count(text: &str) -> Counts {
    count_with(text, TokenEstimator::Approximate)
}

/// Count characters and tokens with the given estimator.
pub fn count_with(text: &str, estimator: TokenEstimator) -> Counts {
    Counts {
        chars: text.chars().count(),
        tokens: count_tokens_with(text, estimator),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_string() {
        assert_eq!(count(""), Counts { chars: 0, tokens: 0 });
        assert_eq!(count_with("", TokenEstimator::Cl100k).tokens, 0);
    }

    #[test]
    fn test_whitespace_only() {
        assert_eq!(approximate_tokens(" \n\t  "), 0);
    }

    #[test]
    fn test_word_runs() {
        assert_eq!(approximate_tokens("a"), 1);
        assert_eq!(approximate_tokens("abcd"), 1);
        assert_eq!(approximate_tokens("abcde"), 2);
        assert_eq!(approximate_tokens("hello world"), 4);
    }

    #[test]
    fn test_punctuation_counts_each() {
        assert_eq!(approximate_tokens("a.b"), 3);
        assert_eq!(approximate_tokens("()"), 2);
        assert_eq!(approximate_tokens("fn main() {}"), 1 + 1 + 2 + 2);
    }

    #[test]
    fn test_chars_are_scalar_values() {
        assert_eq!(count("héllo").chars, 5);
        assert_eq!(count("日本").chars, 2);
        assert_eq!(count("🦀").chars, 1);
    }

    #[test]
    fn test_estimator_from_str() {
        assert_eq!("approx".parse::<TokenEstimator>().unwrap(), TokenEstimator::Approximate);
        assert_eq!("cl100k".parse::<TokenEstimator>().unwrap(), TokenEstimator::Cl100k);
        assert_eq!("O200K_BASE".parse::<TokenEstimator>().unwrap(), TokenEstimator::O200k);
        assert!("invalid".parse::<TokenEstimator>().is_err());
    }

    #[test]
    fn test_bpe_counts_something() {
        assert!(count_with("Hello, world!", TokenEstimator::Cl100k).tokens > 0);
    }

    proptest! {
        #[test]
        fn prop_append_never_decreases(base in "\\PC*", tail in "\\PC+") {
            let before = count(&base).tokens;
            let after = count(&format!("{}{}", base, tail)).tokens;
            prop_assert!(after >= before);
        }

        #[test]
        fn prop_deterministic(text in "\\PC*") {
            prop_assert_eq!(count(&text), count(&text));
        }
    }
}
