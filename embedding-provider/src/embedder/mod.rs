use thiserror::Error;

/// Identifies the backing implementation that powers an embedder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// Deterministic FNV-1a feature hashing; fully offline.
    Hash,
}

/// Static metadata describing a particular embedder instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedderInfo {
    pub provider: ProviderKind,
    pub embedding_model_id: String,
    pub dimension: usize,
}

/// Errors that can be produced by embedder operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EmbedderError {
    #[error("invalid embedder configuration: {message}")]
    InvalidConfiguration { message: String },
    #[error("provider failure: {message}")]
    ProviderFailure { message: String },
}

/// Core interface for all embedder implementations.
///
/// Contract: an empty or whitespace-only input yields the zero vector,
/// never an error, so that empty queries score 0.0 downstream.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError>;
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError>;
    fn info(&self) -> &EmbedderInfo;
}

/// Configuration for the hash-projection embedder.
#[derive(Debug, Clone)]
pub struct HashEmbedderConfig {
    pub dimension: usize,
    pub embedding_model_id: String,
}

/// Deterministic embedder that projects unigram and bigram features into a
/// fixed-dimension space via FNV-1a and L2-normalizes the result. It stands
/// in for the external text-to-vector model in offline and test setups.
#[derive(Debug)]
pub struct HashEmbedder {
    info: EmbedderInfo,
}

impl HashEmbedder {
    pub fn new(config: HashEmbedderConfig) -> Result<Self, EmbedderError> {
        if config.dimension == 0 {
            return Err(EmbedderError::InvalidConfiguration {
                message: "dimension must be greater than zero".into(),
            });
        }
        Ok(Self {
            info: EmbedderInfo {
                provider: ProviderKind::Hash,
                embedding_model_id: config.embedding_model_id,
                dimension: config.dimension,
            },
        })
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let dim = self.info.dimension;
        let mut embedding = vec![0.0f32; dim];
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return embedding;
        }
        for token in &tokens {
            accumulate(&mut embedding, token, 1.0);
        }
        for window in tokens.windows(2) {
            let bigram = format!("{} {}", window[0], window[1]);
            accumulate(&mut embedding, &bigram, 0.5);
        }
        l2_normalize(&mut embedding);
        embedding
    }
}

impl Embedder for HashEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        Ok(self.embed_one(text))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn info(&self) -> &EmbedderInfo {
        &self.info
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// FNV-1a over the token bytes picks the slot; a second round with a salt
/// byte picks the sign.
fn accumulate(embedding: &mut [f32], token: &str, weight: f32) {
    let hash = fnv1a(token.as_bytes());
    let slot = (hash % embedding.len() as u64) as usize;
    let sign = if fnv1a_salted(token.as_bytes(), 0x9d) & 1 == 0 { 1.0 } else { -1.0 };
    embedding[slot] += sign * weight;
}

fn fnv1a(bytes: &[u8]) -> u64 {
    fnv1a_salted(bytes, 0)
}

fn fnv1a_salted(bytes: &[u8], salt: u8) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = OFFSET ^ u64::from(salt);
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

fn l2_normalize(embedding: &mut [f32]) {
    let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in embedding.iter_mut() {
            *x /= norm;
        }
    }
}
