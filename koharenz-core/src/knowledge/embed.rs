//! Deterministic feature-hashed text embeddings.
//!
//! Unigrams and bigrams are hashed (FNV-1a) into a fixed number of buckets
//! and the resulting counts are L2-normalised, so cosine similarity is a
//! plain dot product.

pub const DIMENSIONS: usize = 512;

/// Function words in both languages, skipped before hashing.
const STOPWORDS: [&str; 57] = [
    "a", "an", "the", "is", "are", "was", "be", "of", "to", "in", "on", "at", "by", "for", "with",
    "and", "or", "it", "its", "that", "this", "what", "who", "when", "about", "as", "my", "me",
    "i", "you", "not", "do", "does", "der", "die", "das", "und", "ist", "ein", "eine", "einer",
    "zu", "den", "dem", "des", "wer", "mit", "von", "nicht", "sich", "es", "wie", "auf",
    "für", "im", "am", "oder",
];

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0100_0000_01b3;

/// A normalised embedding. All zeros for text without tokens.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    pub fn of(text: &str) -> Self {
        let tokens = tokenize(text);
        let mut values = vec![0.0f32; DIMENSIONS];

        for token in &tokens {
            values[bucket(token)] += 1.0;
        }
        for pair in tokens.windows(2) {
            values[bucket(&format!("{} {}", pair[0], pair[1]))] += 1.0;
        }

        let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            values.iter_mut().for_each(|v| *v /= norm);
        }
        Self(values)
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|v| *v == 0.0)
    }

    /// Cosine similarity. Zero when either side has no tokens.
    pub fn cosine(&self, other: &Self) -> f32 {
        self.0.iter().zip(&other.0).map(|(a, b)| a * b).sum()
    }
}

/// Lowercased alphanumeric runs without stopwords. Umlauts and ß count as
/// letters.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
        .collect()
}

fn bucket(feature: &str) -> usize {
    let hash = feature.bytes().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    });
    (hash % DIMENSIONS as u64) as usize
}
