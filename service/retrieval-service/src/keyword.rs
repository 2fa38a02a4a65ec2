use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use search_model::{SearchResult, SourceType};
use tracing::debug;
use vector_store::FilterClause;

use crate::vector_search::VectorSearch;
use crate::{KeywordSearcher, RetrievalError};

/// Domain vocabulary: routing, switching, security, QoS, MPLS and transport
/// acronyms plus vendor names. Longer terms come first so the alternation
/// prefers them (IPSEC over IP, RSVP-TE over RSVP).
const TECH_TERMS: &[&str] = &[
    "RSVP-TE", "EIGRP", "IPSEC", "TRUNK", "ACCESS", "ISIS", "VLAN", "MPLS", "ICMP",
    "OSPF", "DSCP", "BGP", "STP", "ACL", "VPN", "GRE", "QOS", "COS", "LDP", "RIP",
    "TCP", "UDP", "IP", "华为", "思科", "华三", "CISCO", "HUAWEI", "H3C",
];

/// Candidate pool pulled from the vector store before lexical rescoring.
pub const KEYWORD_CANDIDATE_POOL: usize = 100;

fn tech_term_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let pattern = format!("(?i)(?:{})", TECH_TERMS.join("|"));
        Regex::new(&pattern).expect("technical term pattern is valid")
    })
}

fn tech_term_set() -> &'static HashSet<String> {
    static SET: OnceLock<HashSet<String>> = OnceLock::new();
    SET.get_or_init(|| TECH_TERMS.iter().map(|t| t.to_lowercase()).collect())
}

/// Pull technical terms out of a query. Case-insensitive, no word-boundary
/// anchors so terms glued to CJK text ("华为OSPF邻居") still match. ASCII
/// matches are normalized to upper case; deduplicated in match order.
pub fn extract_tech_terms(query: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut terms = Vec::new();
    for m in tech_term_regex().find_iter(query) {
        let raw = m.as_str();
        let term = if raw.is_ascii() { raw.to_uppercase() } else { raw.to_string() };
        if seen.insert(term.to_lowercase()) {
            terms.push(term);
        }
    }
    terms
}

pub fn is_tech_term(term: &str) -> bool {
    tech_term_set().contains(&term.to_lowercase())
}

/// Content-word tokens: maximal alphanumeric runs. CJK codepoints count as
/// alphanumeric, so contiguous CJK text stays one token.
pub fn tokenize_query(query: &str) -> Vec<String> {
    query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

/// Tokenizer output unioned with detected technical terms; single-character
/// tokens dropped, deduplicated case-insensitively in first-seen order.
pub fn extract_keywords(query: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut keywords = Vec::new();
    for token in tokenize_query(query) {
        if token.chars().count() <= 1 {
            continue;
        }
        if seen.insert(token.to_lowercase()) {
            keywords.push(token);
        }
    }
    for term in extract_tech_terms(query) {
        if seen.insert(term.to_lowercase()) {
            keywords.push(term);
        }
    }
    keywords
}

/// Lexical relevance of one fragment: per keyword, raw occurrences in the
/// body plus double-weighted occurrences in the title, with a 1.5x bump for
/// technical terms, summed and normalized by sqrt of the body word count so
/// long fragments cannot win on length alone.
pub fn keyword_score(keywords: &[String], content: &str, title: &str) -> f64 {
    let content_lower = content.to_lowercase();
    let title_lower = title.to_lowercase();
    if content_lower.trim().is_empty() {
        return 0.0;
    }

    let mut total = 0.0f64;
    for keyword in keywords {
        let needle = keyword.to_lowercase();
        let content_tf = content_lower.matches(needle.as_str()).count() as f64;
        let title_tf = title_lower.matches(needle.as_str()).count() as f64;
        let mut score = content_tf + title_tf * 2.0;
        if is_tech_term(keyword) {
            score *= 1.5;
        }
        total += score;
    }

    let word_count = content.split_whitespace().count();
    if word_count > 0 {
        total /= (word_count as f64).sqrt();
    }
    total
}

/// Keyword retrieval path. There is no separate full-text index in this
/// design: the vector store queried with the joined keyword string acts as a
/// cheap candidate generator, and the candidates are rescored with the
/// lexical formula (the vector similarity from that probe is discarded).
pub struct LexicalSearcher {
    vector: VectorSearch,
}

impl LexicalSearcher {
    pub fn new(vector: VectorSearch) -> Self {
        Self { vector }
    }
}

impl KeywordSearcher for LexicalSearcher {
    fn search(
        &self,
        query: &str,
        filters: &[FilterClause],
        limit: usize,
    ) -> Result<Vec<SearchResult>, RetrievalError> {
        let keywords = extract_keywords(query);
        if keywords.is_empty() {
            return Ok(Vec::new());
        }
        debug!(?keywords, "extracted query keywords");

        let probe = keywords.join(" ");
        let candidates = self.vector.search(&probe, filters, KEYWORD_CANDIDATE_POOL);

        let mut scored: Vec<SearchResult> = Vec::new();
        for mut candidate in candidates {
            let score = keyword_score(&keywords, &candidate.content, &candidate.title);
            if score > 0.0 {
                candidate.score = score;
                candidate.source_type = SourceType::Keyword;
                candidate.relevance_explanation = format!("keyword match: {}", keywords.join(", "));
                scored.push(candidate);
            }
        }
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(limit);
        Ok(scored)
    }
}
