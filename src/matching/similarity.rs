//! Text similarity scores in `[0, 1]`.

use std::collections::HashMap;

/// Scores how alike two normalized strings are
pub trait SimilarityService: Send + Sync {
    /// Per-text representation, built once and compared many times
    type Features;

    fn features(&self, text: &str) -> Self::Features;

    /// Score two prepared texts. Empty input scores 0.
    fn score(&self, a: &Self::Features, b: &Self::Features) -> f64;

    /// 1.0 for identical meaning, 0.0 for nothing in common. Empty input scores 0.
    fn similarity(&self, a: &str, b: &str) -> f64 {
        self.score(&self.features(a), &self.features(b))
    }
}

const WORD_WEIGHT: f64 = 1.0;
const TRIGRAM_WEIGHT: f64 = 0.5;

/// Cosine similarity over whole words plus character trigrams.
///
/// Trigrams let near spellings ("mitigeur" / "mitigeurs", "wc" / "w.c") score
/// above zero while shared words dominate.
#[derive(Debug, Clone, Default)]
pub struct TermVectorSimilarity;

/// Weighted word and trigram counts of one text, with their norm
#[derive(Debug, Clone, Default)]
pub struct TermVector {
    weights: HashMap<String, f64>,
    norm: f64,
}

impl TermVector {
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

impl TermVectorSimilarity {
    pub fn new() -> Self {
        Self
    }
}

impl SimilarityService for TermVectorSimilarity {
    type Features = TermVector;

    fn features(&self, text: &str) -> TermVector {
        let mut weights = HashMap::new();
        for token in text.split_whitespace() {
            *weights.entry(format!("w:{token}")).or_insert(0.0) += WORD_WEIGHT;

            let padded: Vec<char> = format!("<{token}>").chars().collect();
            for window in padded.windows(3) {
                let gram: String = window.iter().collect();
                *weights.entry(format!("g:{gram}")).or_insert(0.0) += TRIGRAM_WEIGHT;
            }
        }
        let norm = weights.values().map(|w| w * w).sum::<f64>().sqrt();
        TermVector { weights, norm }
    }

    fn score(&self, a: &TermVector, b: &TermVector) -> f64 {
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }
        let (small, large) = if a.weights.len() <= b.weights.len() {
            (a, b)
        } else {
            (b, a)
        };
        let dot: f64 = small
            .weights
            .iter()
            .filter_map(|(key, weight)| large.weights.get(key).map(|other| weight * other))
            .sum();

        (dot / (a.norm * b.norm)).clamp(0.0, 1.0)
    }
}
