use std::sync::Arc;

use embedding_provider::config::default_hash_config;
use embedding_provider::embedder::HashEmbedder;
use retrieval_service::HybridRetrieval;
use search_model::DocumentChunk;
use vector_store::LocalVectorStore;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: cargo run -p retrieval-service --example search_demo -- <QUERY>");
        std::process::exit(1);
    }
    let query = &args[1];

    let embedder = Arc::new(HashEmbedder::new(default_hash_config())?);
    let store = Arc::new(LocalVectorStore::open("target/demo/vectors")?);
    let engine = HybridRetrieval::new(embedder, store);

    engine.vector().index_document(
        "kb-ospf",
        &[DocumentChunk::new(
            "OSPF neighbor troubleshooting steps: 1. check interface state, \
             2. verify area id and hello timers, 3. inspect the adjacency with \
             display ospf peer.",
            "OSPF Guide",
        )
        .with_metadata("vendor", "Huawei")
        .with_metadata("category", "troubleshooting")],
    )?;
    engine.vector().index_document(
        "kb-vlan",
        &[DocumentChunk::new(
            "VLAN trunk configuration commands for access and trunk ports, \
             including allowed vlan lists and native vlan handling.",
            "VLAN Configuration",
        )
        .with_metadata("vendor", "Cisco")
        .with_metadata("category", "configuration")],
    )?;

    let hits = engine.search(query, &[])?;
    println!("Results: {}", hits.len());
    for (i, hit) in hits.iter().enumerate() {
        let preview: String = hit.content.chars().take(80).collect();
        println!(
            "{:>2}. [{:?}] {:.4} {} | {}",
            i + 1,
            hit.source_type,
            hit.score,
            hit.title,
            preview
        );
    }
    Ok(())
}
