use std::collections::HashMap;

use search_model::{SearchResult, SourceType};
use tracing::debug;

use crate::keyword::{extract_tech_terms, tokenize_query};

/// Every scoring heuristic constant in one tunable place.
#[derive(Debug, Clone)]
pub struct RankingConfig {
    /// Applied when a query term appears in the fragment title.
    pub title_boost: f64,
    /// Applied when the fragment category is one of `high_value_categories`.
    pub category_boost: f64,
    /// Applied when the query mentions the fragment's vendor (or an alias).
    pub vendor_boost: f64,
    /// Body length inside the well-formed range.
    pub quality_bonus: f64,
    /// Body shorter than `short_max_chars`.
    pub short_penalty: f64,
    /// Non-empty title present.
    pub titled_bonus: f64,
    /// Body contains structural markers (numbered steps, step/config/command).
    pub structure_bonus: f64,
    pub well_formed_min_chars: usize,
    pub well_formed_max_chars: usize,
    pub short_max_chars: usize,
    pub high_value_categories: Vec<String>,
    /// Matched case-insensitively against the body.
    pub structure_markers: Vec<String>,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            title_boost: 1.2,
            category_boost: 1.0,
            vendor_boost: 1.1,
            quality_bonus: 1.1,
            short_penalty: 0.8,
            titled_bonus: 1.05,
            structure_bonus: 1.1,
            well_formed_min_chars: 100,
            well_formed_max_chars: 2000,
            short_max_chars: 50,
            high_value_categories: vec![
                "配置管理".to_string(),
                "故障排除".to_string(),
                "configuration".to_string(),
                "troubleshooting".to_string(),
            ],
            structure_markers: vec![
                "1.".to_string(),
                "2.".to_string(),
                "步骤".to_string(),
                "配置".to_string(),
                "命令".to_string(),
                "step".to_string(),
                "config".to_string(),
                "command".to_string(),
            ],
        }
    }
}

/// Vendor alias groups: a fragment vendor matches when the query mentions
/// any alias from the group the vendor belongs to.
const VENDOR_ALIASES: &[&[&str]] = &[
    &["华为", "huawei", "vrp"],
    &["思科", "cisco", "ios"],
    &["华三", "h3c", "comware"],
];

/// Merge the two candidate sets into one deduplicated list keyed by
/// `(document_id, chunk_id)`.
///
/// Vector results are inserted (or accumulated) with `vector_weight`
/// applied; keyword results with `keyword_weight`. A fragment confirmed by
/// both paths becomes `Hybrid` and keeps both explanations. Insertion order
/// is preserved under the final stable sort, so ties keep the vector path's
/// original ordering and repeated queries are reproducible.
pub fn fuse_results(
    vector_results: Vec<SearchResult>,
    keyword_results: Vec<SearchResult>,
    vector_weight: f64,
    keyword_weight: f64,
) -> Vec<SearchResult> {
    let mut fused: Vec<SearchResult> = Vec::new();
    let mut index: HashMap<(String, String), usize> = HashMap::new();

    for mut result in vector_results {
        let key = (result.document_id.clone(), result.chunk_id.clone());
        match index.get(&key) {
            // Duplicate keys can only come from a misbehaving candidate
            // source; merge rather than raise.
            Some(&i) => fused[i].score += result.score * vector_weight,
            None => {
                result.score *= vector_weight;
                index.insert(key, fused.len());
                fused.push(result);
            }
        }
    }

    for mut result in keyword_results {
        let key = (result.document_id.clone(), result.chunk_id.clone());
        match index.get(&key) {
            Some(&i) => {
                let existing = &mut fused[i];
                existing.score += result.score * keyword_weight;
                existing.source_type = SourceType::Hybrid;
                existing.relevance_explanation = format!(
                    "{} + {}",
                    existing.relevance_explanation, result.relevance_explanation
                );
            }
            None => {
                result.score *= keyword_weight;
                result.source_type = SourceType::Keyword;
                index.insert(key, fused.len());
                fused.push(result);
            }
        }
    }

    fused.sort_by(|a, b| b.score.total_cmp(&a.score));
    debug!(fused = fused.len(), "fusion completed");
    fused
}

/// Apply the domain boosts and the quality heuristic to every fused result,
/// exactly once, then stable-sort descending. Consumes the fused list so the
/// multipliers cannot be applied twice within one pipeline run.
pub fn rerank(
    mut results: Vec<SearchResult>,
    query: &str,
    config: &RankingConfig,
) -> Vec<SearchResult> {
    for result in results.iter_mut() {
        if has_query_terms_in_title(query, &result.title) {
            result.score *= config.title_boost;
        }
        if let Some(category) = result.metadata_str("category") {
            if config.high_value_categories.iter().any(|c| c.eq_ignore_ascii_case(&category)) {
                result.score *= config.category_boost;
            }
        }
        if let Some(vendor) = result.metadata_str("vendor") {
            if has_vendor_match(query, &vendor) {
                result.score *= config.vendor_boost;
            }
        }
        result.score *= quality_score(result, config);
    }
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
    results
}

/// Title-match rule. When the query contains at least one technical term,
/// that path is dominant: only an exact technical-term hit in the title
/// counts. Otherwise any multi-character query token found in the title
/// qualifies.
pub fn has_query_terms_in_title(query: &str, title: &str) -> bool {
    if title.is_empty() {
        return false;
    }
    let title_lower = title.to_lowercase();

    let tech_terms = extract_tech_terms(query);
    if !tech_terms.is_empty() {
        return tech_terms.iter().any(|term| title_lower.contains(&term.to_lowercase()));
    }

    tokenize_query(&query.to_lowercase())
        .into_iter()
        .any(|term| term.chars().count() > 1 && title_lower.contains(&term))
}

/// Vendor metadata matches when the query names the vendor or one of its
/// known aliases (product OS names included). Unknown vendors fall back to
/// a literal substring check.
pub fn has_vendor_match(query: &str, vendor: &str) -> bool {
    if vendor.is_empty() {
        return false;
    }
    let query_lower = query.to_lowercase();
    let vendor_lower = vendor.to_lowercase();

    for group in VENDOR_ALIASES {
        if group.contains(&vendor_lower.as_str()) {
            return group.iter().any(|alias| query_lower.contains(alias));
        }
    }
    query_lower.contains(&vendor_lower)
}

/// Content-quality multiplier: well-formed body length earns a bonus,
/// fragments get penalized, a title and structural markers each add a
/// little on top.
pub fn quality_score(result: &SearchResult, config: &RankingConfig) -> f64 {
    let mut score = 1.0f64;

    let content_length = result.content.chars().count();
    if (config.well_formed_min_chars..=config.well_formed_max_chars).contains(&content_length) {
        score *= config.quality_bonus;
    } else if content_length < config.short_max_chars {
        score *= config.short_penalty;
    }

    if !result.title.is_empty() {
        score *= config.titled_bonus;
    }

    let content_lower = result.content.to_lowercase();
    if config.structure_markers.iter().any(|m| content_lower.contains(&m.to_lowercase())) {
        score *= config.structure_bonus;
    }

    score
}
