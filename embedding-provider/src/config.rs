use crate::embedder::HashEmbedderConfig;

/// Default settings for the hash-projection embedder.
#[derive(Debug, Clone, Copy)]
pub struct HashEmbedderDefaults {
    pub embedding_dimension: usize,
    pub embedding_model_id: &'static str,
}

/// Shared defaults so services and tests stay in sync.
pub const HASH_EMBEDDER_DEFAULTS: HashEmbedderDefaults = HashEmbedderDefaults {
    embedding_dimension: 384,
    embedding_model_id: "fnv1a-hash-v1",
};

/// Convenience helper to build a [`HashEmbedderConfig`] from the shared defaults.
pub fn default_hash_config() -> HashEmbedderConfig {
    HashEmbedderConfig {
        dimension: HASH_EMBEDDER_DEFAULTS.embedding_dimension,
        embedding_model_id: HASH_EMBEDDER_DEFAULTS.embedding_model_id.into(),
    }
}
