use embedding_provider::config::{default_hash_config, HASH_EMBEDDER_DEFAULTS};
use embedding_provider::embedder::{
    Embedder, EmbedderError, HashEmbedder, HashEmbedderConfig, ProviderKind,
};

fn assert_vectors_close(lhs: &[f32], rhs: &[f32]) {
    assert_eq!(lhs.len(), rhs.len(), "vector lengths differ");
    for (index, (a, b)) in lhs.iter().zip(rhs.iter()).enumerate() {
        let diff = (a - b).abs();
        assert!(
            diff <= 1e-6,
            "vectors diverge at position {index}: {a} vs {b} (diff {diff})"
        );
    }
}

#[test]
fn hash_embedder_produces_deterministic_vectors() {
    let embedder = HashEmbedder::new(default_hash_config()).expect("configuration is valid");

    let sentence = "OSPF neighbor stuck in exstart state";
    let vector_a = embedder.embed(sentence).expect("first embedding succeeds");
    let vector_b = embedder.embed(sentence).expect("second embedding succeeds");

    assert_eq!(vector_a.len(), HASH_EMBEDDER_DEFAULTS.embedding_dimension);
    assert_vectors_close(&vector_a, &vector_b);
    assert!(
        vector_a.iter().any(|component| component.abs() > 1e-3),
        "embedding should not be all zeros"
    );

    let info = embedder.info();
    assert_eq!(info.provider, ProviderKind::Hash);
    assert_eq!(info.dimension, HASH_EMBEDDER_DEFAULTS.embedding_dimension);
    assert_eq!(info.embedding_model_id, HASH_EMBEDDER_DEFAULTS.embedding_model_id);
}

#[test]
fn embed_batch_matches_individual_embeddings() {
    let embedder = HashEmbedder::new(default_hash_config()).expect("configuration is valid");

    let inputs = [
        "embeddings unlock semantic search",
        "hybrid ranking mixes keywords and vectors",
    ];
    let batch_vectors = embedder.embed_batch(&inputs).expect("batch embedding succeeds");
    assert_eq!(batch_vectors.len(), inputs.len());

    for (input, batch_vector) in inputs.iter().zip(batch_vectors.iter()) {
        let single = embedder.embed(input).expect("single embedding succeeds");
        assert_vectors_close(&single, batch_vector);
    }
}

#[test]
fn empty_input_yields_the_zero_vector() {
    let embedder = HashEmbedder::new(default_hash_config()).expect("configuration is valid");

    for input in ["", "   ", "\t\n"] {
        let vector = embedder.embed(input).expect("empty input must not error");
        assert!(
            vector.iter().all(|component| *component == 0.0),
            "input {input:?} should embed to the zero vector"
        );
    }
}

#[test]
fn non_empty_embeddings_are_unit_length() {
    let embedder = HashEmbedder::new(default_hash_config()).expect("configuration is valid");
    let vector = embedder.embed("vlan trunk configuration steps").expect("embedding succeeds");
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() < 1e-4, "expected unit norm, got {norm}");
}

#[test]
fn zero_dimension_configuration_is_rejected() {
    let err = HashEmbedder::new(HashEmbedderConfig {
        dimension: 0,
        embedding_model_id: "broken".into(),
    })
    .expect_err("zero dimensions should fail");
    assert!(matches!(err, EmbedderError::InvalidConfiguration { .. }));
}
