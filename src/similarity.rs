//! String similarity capability.
//!
//! The scorer only ever asks "how alike are these two strings", so the
//! concrete edit-distance algorithm sits behind [`StringSimilarity`] and can
//! be swapped without touching registry logic.

use serde::{Deserialize, Serialize};

use crate::normalize::sorted_key;

/// A normalized string-similarity measure.
pub trait StringSimilarity: Send + Sync {
    /// Similarity in `[0.0, 1.0]`; 1.0 means identical.
    ///
    /// Two empty strings score 0.0: an empty name carries no evidence.
    fn ratio(&self, a: &str, b: &str) -> f64;

    /// Ratio over alphabetically sorted tokens, neutralizing word order.
    fn token_sort_ratio(&self, a: &[String], b: &[String]) -> f64 {
        self.ratio(&sorted_key(a), &sorted_key(b))
    }
}

/// Which similarity backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityKind {
    /// Insert/delete distance ratio, `2·LCS / (|a| + |b|)`.
    #[default]
    Indel,
    /// `1 - levenshtein / max(|a|, |b|)`.
    Levenshtein,
}

impl SimilarityKind {
    /// Instantiates the backend.
    #[must_use]
    pub fn build(self) -> Box<dyn StringSimilarity> {
        match self {
            Self::Indel => Box::new(IndelRatio),
            Self::Levenshtein => Box::new(LevenshteinRatio),
        }
    }
}

/// Indel (LCS-based) similarity ratio.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndelRatio;

impl StringSimilarity for IndelRatio {
    fn ratio(&self, a: &str, b: &str) -> f64 {
        let a: Vec<char> = a.chars().collect();
        let b: Vec<char> = b.chars().collect();
        let total = a.len() + b.len();
        if total == 0 {
            return 0.0;
        }
        if a == b {
            return 1.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let ratio = (2 * lcs_len(&a, &b)) as f64 / total as f64;
        ratio
    }
}

/// Normalized Levenshtein similarity ratio.
#[derive(Debug, Clone, Copy, Default)]
pub struct LevenshteinRatio;

impl StringSimilarity for LevenshteinRatio {
    fn ratio(&self, a: &str, b: &str) -> f64 {
        let a: Vec<char> = a.chars().collect();
        let b: Vec<char> = b.chars().collect();
        let longest = a.len().max(b.len());
        if longest == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let ratio = 1.0 - levenshtein(&a, &b) as f64 / longest as f64;
        ratio
    }
}

/// Longest common subsequence length, two-row DP.
fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for ca in a {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                curr[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

fn levenshtein(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}
