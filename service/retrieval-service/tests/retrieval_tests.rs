use std::sync::Arc;

use embedding_provider::config::default_hash_config;
use embedding_provider::embedder::HashEmbedder;
use retrieval_service::fusion::{
    fuse_results, has_query_terms_in_title, has_vendor_match, quality_score, rerank,
    RankingConfig,
};
use retrieval_service::keyword::{extract_keywords, extract_tech_terms, keyword_score};
use retrieval_service::{HybridRetrieval, KeywordSearcher, RetrievalError};
use search_model::{DocumentChunk, SearchResult, SourceType};
use serde_json::Map;
use vector_store::{FilterClause, LocalVectorStore};

fn engine(dir: &std::path::Path) -> HybridRetrieval {
    let embedder = Arc::new(HashEmbedder::new(default_hash_config()).expect("embedder config"));
    let store = Arc::new(LocalVectorStore::open(dir).expect("open store"));
    HybridRetrieval::new(embedder, store)
}

fn index_network_docs(engine: &HybridRetrieval) {
    engine
        .vector()
        .index_document(
            "doc-ospf",
            &[DocumentChunk::new(
                "OSPF neighbor troubleshooting steps: 1. check interface state, \
                 2. verify area id and hello timers, then inspect the adjacency \
                 with display ospf peer and confirm the router ids differ.",
                "OSPF Guide",
            )
            .with_metadata("vendor", "Huawei")
            .with_metadata("category", "troubleshooting")],
        )
        .expect("index ospf doc");
    engine
        .vector()
        .index_document(
            "doc-storage",
            &[DocumentChunk::new(
                "Disk array maintenance overview covering raid levels and spare \
                 handling for the data center storage shelf.",
                "Storage Notes",
            )
            .with_metadata("vendor", "Cisco")],
        )
        .expect("index unrelated doc");
}

fn result(document_id: &str, chunk_id: &str, score: f64, source: SourceType) -> SearchResult {
    SearchResult {
        content: "x".repeat(200),
        title: "Title".to_string(),
        score,
        source_type: source,
        document_id: document_id.to_string(),
        chunk_id: chunk_id.to_string(),
        metadata: Map::new(),
        relevance_explanation: match source {
            SourceType::Vector => "semantic vector similarity match".to_string(),
            _ => "keyword match: ospf".to_string(),
        },
    }
}

// ------------------------------
// keyword extraction and scoring
// ------------------------------

#[test]
fn tech_terms_are_detected_case_insensitively_and_through_cjk() {
    let terms = extract_tech_terms("华为OSPF邻居 ospf vlan trunk");
    assert!(terms.contains(&"OSPF".to_string()));
    assert!(terms.contains(&"VLAN".to_string()));
    assert!(terms.contains(&"TRUNK".to_string()));
    assert!(terms.contains(&"华为".to_string()));
    // deduplicated: ospf appears twice in the query
    assert_eq!(terms.iter().filter(|t| *t == "OSPF").count(), 1);
}

#[test]
fn longer_terms_win_over_their_prefixes() {
    let terms = extract_tech_terms("ipsec tunnel");
    assert!(terms.contains(&"IPSEC".to_string()));
    assert!(!terms.contains(&"IP".to_string()), "IPSEC must not also report IP");
}

#[test]
fn keywords_drop_single_characters_and_dedupe() {
    let keywords = extract_keywords("a OSPF neighbor neighbor b");
    assert!(keywords.contains(&"OSPF".to_string()));
    assert!(keywords.contains(&"neighbor".to_string()));
    assert!(!keywords.iter().any(|k| k == "a" || k == "b"));
    assert_eq!(keywords.iter().filter(|k| k.to_lowercase() == "neighbor").count(), 1);
}

#[test]
fn title_hits_weigh_double_and_tech_terms_half_again() {
    let keywords = vec!["ospf".to_string()];
    let body_only = keyword_score(&keywords, "ospf ospf filler words here", "");
    let with_title = keyword_score(&keywords, "ospf ospf filler words here", "ospf guide");
    // one title occurrence adds twice a body occurrence, pre-normalization
    assert!(with_title > body_only);

    let plain = vec!["filler".to_string()];
    let plain_score = keyword_score(&plain, "filler filler ospf words here", "");
    let tech = vec!["ospf".to_string()];
    let tech_score = keyword_score(&tech, "ospf ospf filler words here", "");
    assert!(
        tech_score > plain_score,
        "technical terms should outscore plain words at equal frequency"
    );
}

#[test]
fn no_keyword_hits_scores_zero() {
    let keywords = vec!["mpls".to_string()];
    assert_eq!(keyword_score(&keywords, "unrelated text about storage", ""), 0.0);
    assert_eq!(keyword_score(&keywords, "", "MPLS Guide"), 0.0);
}

#[test]
fn length_normalization_prevents_wall_of_text_wins() {
    let keywords = vec!["ospf".to_string()];
    let short = keyword_score(&keywords, "ospf overview", "");
    let padded = format!("ospf {}", "filler ".repeat(400));
    let long = keyword_score(&keywords, &padded, "");
    assert!(short > long, "a long body with one hit must not outrank a short one");
}

// ------------------------------
// fusion
// ------------------------------

#[test]
fn fusion_keys_are_unique_and_overlaps_become_hybrid() {
    let vector = vec![
        result("doc-1", "c1", 0.9, SourceType::Vector),
        result("doc-1", "c2", 0.5, SourceType::Vector),
    ];
    let keyword = vec![
        result("doc-1", "c1", 2.0, SourceType::Keyword),
        result("doc-2", "c1", 1.0, SourceType::Keyword),
    ];

    let fused = fuse_results(vector, keyword, 0.7, 0.3);

    let mut keys: Vec<(String, String)> =
        fused.iter().map(|r| (r.document_id.clone(), r.chunk_id.clone())).collect();
    keys.sort();
    keys.dedup();
    assert_eq!(keys.len(), fused.len(), "fusion keys must be unique");

    let merged = fused
        .iter()
        .find(|r| r.document_id == "doc-1" && r.chunk_id == "c1")
        .expect("merged entry present");
    assert_eq!(merged.source_type, SourceType::Hybrid);
    assert!((merged.score - (0.9 * 0.7 + 2.0 * 0.3)).abs() < 1e-9);
    assert!(merged.relevance_explanation.contains("semantic vector similarity match"));
    assert!(merged.relevance_explanation.contains("keyword match"));

    let keyword_only = fused
        .iter()
        .find(|r| r.document_id == "doc-2")
        .expect("keyword-only entry present");
    assert_eq!(keyword_only.source_type, SourceType::Keyword);
    assert!((keyword_only.score - 0.3).abs() < 1e-9);
}

#[test]
fn duplicate_vector_candidates_accumulate_instead_of_duplicating() {
    let vector = vec![
        result("doc-1", "c1", 0.4, SourceType::Vector),
        result("doc-1", "c1", 0.6, SourceType::Vector),
    ];
    let fused = fuse_results(vector, Vec::new(), 0.5, 0.5);
    assert_eq!(fused.len(), 1);
    assert!((fused[0].score - (0.4 * 0.5 + 0.6 * 0.5)).abs() < 1e-9);
}

#[test]
fn fusion_sorts_descending() {
    let vector = vec![
        result("doc-low", "c", 0.1, SourceType::Vector),
        result("doc-high", "c", 0.9, SourceType::Vector),
    ];
    let fused = fuse_results(vector, Vec::new(), 1.0, 0.0);
    assert_eq!(fused[0].document_id, "doc-high");
}

// ------------------------------
// reranking
// ------------------------------

#[test]
fn tech_term_queries_require_the_term_in_the_title() {
    assert!(has_query_terms_in_title("OSPF neighbor down", "OSPF Guide"));
    // the query has a technical term, so a plain-word title hit does not count
    assert!(!has_query_terms_in_title("OSPF neighbor down", "Neighbor Relations"));
    // without technical terms, token matching applies
    assert!(has_query_terms_in_title("neighbor discovery", "Neighbor Relations"));
    assert!(!has_query_terms_in_title("anything", ""));
}

#[test]
fn vendor_aliases_match_across_languages() {
    assert!(has_vendor_match("华为交换机配置", "Huawei"));
    assert!(has_vendor_match("cisco ios upgrade", "思科"));
    assert!(has_vendor_match("comware acl", "H3C"));
    assert!(!has_vendor_match("cisco ios upgrade", "Huawei"));
    // unknown vendors fall back to a literal mention
    assert!(has_vendor_match("juniper junos bgp", "Juniper"));
    assert!(!has_vendor_match("anything", ""));
}

#[test]
fn quality_heuristic_rewards_well_formed_structured_content() {
    let config = RankingConfig::default();

    let mut well_formed = result("d", "c", 1.0, SourceType::Vector);
    well_formed.content = format!("1. check the config {}", "detail ".repeat(20));
    well_formed.title = "Guide".to_string();
    // length bonus, title bonus and structure bonus all apply
    let expected = config.quality_bonus * config.titled_bonus * config.structure_bonus;
    assert!((quality_score(&well_formed, &config) - expected).abs() < 1e-9);

    let mut stub = result("d", "c", 1.0, SourceType::Vector);
    stub.content = "too short".to_string();
    stub.title = String::new();
    assert!((quality_score(&stub, &config) - config.short_penalty).abs() < 1e-9);
}

#[test]
fn rerank_boosts_title_matches_above_plain_hits() {
    let mut titled = result("doc-a", "c", 1.0, SourceType::Vector);
    titled.title = "OSPF Guide".to_string();
    let mut untitled = result("doc-b", "c", 1.0, SourceType::Vector);
    untitled.title = "Switch Notes".to_string();

    let reranked = rerank(vec![untitled, titled], "OSPF neighbor", &RankingConfig::default());
    assert_eq!(reranked[0].document_id, "doc-a");
    assert!(reranked[0].score > reranked[1].score);
}

#[test]
fn rerank_ordering_is_stable_under_repeated_application() {
    let mut a = result("doc-a", "c", 2.0, SourceType::Vector);
    a.title = "OSPF Guide".to_string();
    let mut b = result("doc-b", "c", 1.0, SourceType::Vector);
    b.title = "Switch Notes".to_string();

    let config = RankingConfig::default();
    let once = rerank(vec![a, b], "OSPF neighbor", &config);
    let order_once: Vec<&str> = once.iter().map(|r| r.document_id.as_str()).collect();
    let twice = rerank(once.clone(), "OSPF neighbor", &config);
    let order_twice: Vec<&str> = twice.iter().map(|r| r.document_id.as_str()).collect();
    assert_eq!(order_once, order_twice);
}

// ------------------------------
// orchestrator
// ------------------------------

#[test]
fn invalid_weights_are_rejected_before_any_work() {
    let dir = tempfile::tempdir().expect("temp dir");
    let engine = engine(dir.path());

    let err = engine
        .search_with("ospf", &[], 0.5, 0.6, 10)
        .expect_err("weights not summing to 1.0 must fail");
    assert!(matches!(err, RetrievalError::InvalidWeights { .. }));

    let err = engine
        .search_with("ospf", &[], 1.1, -0.1, 10)
        .expect_err("out-of-range weights must fail");
    assert!(matches!(err, RetrievalError::InvalidWeights { .. }));

    let err = engine
        .search_with("ospf", &[], 0.7, 0.3, 0)
        .expect_err("top_k of zero must fail");
    assert!(matches!(err, RetrievalError::InvalidTopK(0)));

    let err = engine
        .search_with("ospf", &[], 0.7, 0.3, 51)
        .expect_err("top_k above the bound must fail");
    assert!(matches!(err, RetrievalError::InvalidTopK(51)));
}

#[test]
fn hybrid_search_confirms_overlapping_hits() {
    let dir = tempfile::tempdir().expect("temp dir");
    let engine = engine(dir.path());
    index_network_docs(&engine);

    let results = engine.search("OSPF neighbor troubleshooting", &[]).expect("search succeeds");
    assert!(!results.is_empty());
    let top = &results[0];
    assert_eq!(top.document_id, "doc-ospf");
    // found by both paths: provenance flips to hybrid, explanations concatenate
    assert_eq!(top.source_type, SourceType::Hybrid);
    assert!(top.relevance_explanation.contains("keyword match"));

    // no fusion key appears twice
    let mut keys: Vec<(String, String)> =
        results.iter().map(|r| (r.document_id.clone(), r.chunk_id.clone())).collect();
    keys.sort();
    keys.dedup();
    assert_eq!(keys.len(), results.len());
}

struct FailingKeyword;

impl KeywordSearcher for FailingKeyword {
    fn search(
        &self,
        _query: &str,
        _filters: &[FilterClause],
        _limit: usize,
    ) -> Result<Vec<SearchResult>, RetrievalError> {
        Err(RetrievalError::Keyword("forced failure".into()))
    }
}

#[test]
fn keyword_failure_degrades_to_vector_only() {
    let dir = tempfile::tempdir().expect("temp dir");
    let engine = engine(dir.path()).with_keyword_searcher(Box::new(FailingKeyword));
    index_network_docs(&engine);

    let results = engine
        .search("OSPF neighbor troubleshooting", &[])
        .expect("degraded search must not error");
    assert!(!results.is_empty(), "vector-only fallback should still return results");
    assert!(
        results.iter().all(|r| r.source_type == SourceType::Vector),
        "every result must come from the vector path"
    );
}

#[test]
fn vendor_filter_excludes_other_vendors_at_candidate_generation() {
    let dir = tempfile::tempdir().expect("temp dir");
    let engine = engine(dir.path());
    index_network_docs(&engine);

    let filters = [FilterClause::meta_eq("vendor", "Huawei")];
    let results = engine.search("华为 OSPF neighbor", &filters).expect("search succeeds");

    assert!(!results.is_empty());
    assert_eq!(results[0].document_id, "doc-ospf");
    assert!(
        results.iter().all(|r| r.document_id != "doc-storage"),
        "the Cisco document must be filtered out entirely"
    );
}

#[test]
fn repeated_queries_over_unchanged_data_are_reproducible() {
    let dir = tempfile::tempdir().expect("temp dir");
    let engine = engine(dir.path());
    index_network_docs(&engine);

    let first = engine.search("OSPF neighbor troubleshooting", &[]).expect("first search");
    let second = engine.search("OSPF neighbor troubleshooting", &[]).expect("second search");

    let order = |results: &[SearchResult]| -> Vec<(String, String)> {
        results.iter().map(|r| (r.document_id.clone(), r.chunk_id.clone())).collect()
    };
    assert_eq!(order(&first), order(&second));
}

#[test]
fn search_truncates_to_the_requested_top_k() {
    let dir = tempfile::tempdir().expect("temp dir");
    let engine = engine(dir.path());
    for i in 0..5 {
        engine
            .vector()
            .index_document(
                &format!("doc-{i}"),
                &[DocumentChunk::new(format!("vlan trunk notes number {i}"), "VLAN")],
            )
            .expect("index doc");
    }

    let results = engine.search_with("vlan trunk", &[], 0.7, 0.3, 2).expect("search succeeds");
    assert!(results.len() <= 2);
}
