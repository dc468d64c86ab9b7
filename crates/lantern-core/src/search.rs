//! Search filter for the suggestion list
//!
//! A query is split into lower-cased terms; a record is kept when every term
//! is a plain substring of at least one of its haystacks. Matching never
//! reorders and never interprets pattern syntax.

use crate::suggest::Suggestion;
use serde::Serialize;
use serde_json::Value;

/// A parsed search query.
///
/// `raw` is kept verbatim for redisplay; `normalized` is what filtering and
/// state comparisons use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchQuery {
    raw: String,
    normalized: String,
    #[serde(skip)]
    terms: Vec<String>,
}

impl SearchQuery {
    pub fn parse(raw: &str) -> Self {
        let terms: Vec<String> = raw
            .trim()
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect();
        Self {
            raw: raw.to_string(),
            normalized: terms.join(" "),
            terms,
        }
    }

    /// Absent input means no filter.
    pub fn from_input(raw: Option<&str>) -> Self {
        raw.map(Self::parse).unwrap_or_default()
    }

    /// Untyped input from a UI message; anything but a string means no filter.
    pub fn from_value(value: &Value) -> Self {
        Self::from_input(value.as_str())
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/// Precomputed lower-cased haystacks for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchEntry {
    haystacks: Vec<String>,
}

impl SearchEntry {
    pub fn new(record: &Suggestion) -> Self {
        Self {
            haystacks: search_haystacks(record),
        }
    }

    pub fn haystacks(&self) -> &[String] {
        &self.haystacks
    }

    /// Every term must occur in some haystack.
    pub fn matches(&self, query: &SearchQuery) -> bool {
        query
            .terms()
            .iter()
            .all(|term| self.haystacks.iter().any(|hay| hay.contains(term.as_str())))
    }
}

/// Derive the lower-cased match targets of a record.
///
/// Order: issue, suggestion, feature, file, finding id, conversation id,
/// parent id, status, rating, tags, file basename, humanized feature.
/// Absent optional fields contribute nothing. Token counts and response
/// times are not match targets.
pub fn search_haystacks(record: &Suggestion) -> Vec<String> {
    let mut out = Vec::with_capacity(12 + record.tags().len());

    push_lower(&mut out, &record.issue);
    push_lower(&mut out, &record.suggestion);
    for field in [
        &record.feature,
        &record.file,
        &record.finding_id,
        &record.conversation_id,
        &record.parent_id,
    ]
    .into_iter()
    .flatten()
    {
        push_lower(&mut out, field);
    }
    out.push(record.status.as_str().to_string());
    if let Some(rating) = record.rating {
        out.push(rating.to_string());
    }
    for tag in record.tags() {
        push_lower(&mut out, tag);
    }
    if let Some(file) = &record.file {
        push_lower(&mut out, file_basename(file));
    }
    if let Some(feature) = &record.feature {
        push_lower(&mut out, &humanize_feature(feature));
    }

    out
}

fn push_lower(out: &mut Vec<String>, value: &str) {
    out.push(value.to_lowercase());
}

/// Last path segment, splitting on both `/` and `\`.
pub fn file_basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Split camel case and snake/kebab separators into words.
///
/// `fetchRetryPolicy` becomes `fetch Retry Policy`, `rate_limit-v2` becomes
/// `rate limit v2`. Case is left alone; haystacks are lower-cased later.
pub fn humanize_feature(feature: &str) -> String {
    let mut result = String::with_capacity(feature.len() + 4);
    for (i, c) in feature.chars().enumerate() {
        if c == '-' || c == '_' {
            result.push(' ');
            continue;
        }
        if i > 0 && c.is_uppercase() {
            result.push(' ');
        }
        result.push(c);
    }
    result
}

/// Filter records by query, keeping collection order.
pub fn filter_suggestions<'a>(records: &'a [Suggestion], query: &SearchQuery) -> Vec<&'a Suggestion> {
    if query.is_empty() {
        return records.iter().collect();
    }
    records
        .iter()
        .filter(|record| SearchEntry::new(record).matches(query))
        .collect()
}

/// Positions of the records that match `query`.
pub fn matching_indices(records: &[Suggestion], query: &SearchQuery) -> Vec<usize> {
    if query.is_empty() {
        return (0..records.len()).collect();
    }
    records
        .iter()
        .enumerate()
        .filter(|(_, record)| SearchEntry::new(record).matches(query))
        .map(|(idx, _)| idx)
        .collect()
}

/// Same as [`matching_indices`] over precomputed entries.
pub fn matching_entry_indices(entries: &[SearchEntry], query: &SearchQuery) -> Vec<usize> {
    if query.is_empty() {
        return (0..entries.len()).collect();
    }
    entries
        .iter()
        .enumerate()
        .filter(|(_, entry)| entry.matches(query))
        .map(|(idx, _)| idx)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suggest::{Rating, SuggestionStatus};

    fn tagged(id: &str, tags: &[&str]) -> Suggestion {
        Suggestion::new(id, format!("Issue {}", id), "Body").with_tags(tags.iter().copied())
    }

    fn scenario_records() -> Vec<Suggestion> {
        vec![
            tagged("r1", &["javascript", "async", "promises"]),
            tagged("r2", &["css", "grid"]),
            tagged("r3", &["javascript", "fetch"]),
        ]
    }

    fn ids(records: &[&Suggestion]) -> Vec<String> {
        records.iter().map(|r| r.id.clone()).collect()
    }

    #[test]
    fn test_query_normalization() {
        let query = SearchQuery::parse("  Fetch   RETRY\tPolicy ");
        assert_eq!(query.raw(), "  Fetch   RETRY\tPolicy ");
        assert_eq!(query.normalized(), "fetch retry policy");
        assert_eq!(query.terms(), ["fetch", "retry", "policy"]);
    }

    #[test]
    fn test_blank_and_non_string_queries_are_empty() {
        assert!(SearchQuery::parse("").is_empty());
        assert!(SearchQuery::parse("   \t ").is_empty());
        assert_eq!(SearchQuery::parse("   ").normalized(), "");
        assert!(SearchQuery::from_input(None).is_empty());
        assert!(SearchQuery::from_value(&serde_json::json!(null)).is_empty());
        assert!(SearchQuery::from_value(&serde_json::json!(17)).is_empty());
        assert!(SearchQuery::from_value(&serde_json::json!({"q": "x"})).is_empty());
        assert_eq!(
            SearchQuery::from_value(&serde_json::json!("Grid")).normalized(),
            "grid"
        );
    }

    #[test]
    fn test_haystacks_in_documented_order() {
        let record = Suggestion::new("s-1", "Leaky Socket", "Close It")
            .with_feature("fetchRetry_policy")
            .with_file("C:\\repo\\src\\Network.ts")
            .with_finding_id("F-7")
            .with_conversation_id("C-1")
            .with_parent_id("P-1")
            .with_status(SuggestionStatus::Pending)
            .with_rating(Rating::new(3).unwrap())
            .with_tags(["IO", "net"]);

        assert_eq!(
            search_haystacks(&record),
            vec![
                "leaky socket",
                "close it",
                "fetchretry_policy",
                "c:\\repo\\src\\network.ts",
                "f-7",
                "c-1",
                "p-1",
                "pending",
                "3",
                "io",
                "net",
                "network.ts",
                "fetch retry policy",
            ]
        );
    }

    #[test]
    fn test_haystacks_skip_absent_fields() {
        let record = Suggestion::new("s-1", "Issue", "Body");
        assert_eq!(search_haystacks(&record), vec!["issue", "body", "success"]);
    }

    #[test]
    fn test_metrics_are_not_searchable() {
        let records = vec![Suggestion::new("s-1", "Issue", "Body")
            .with_tokens_used(4096)
            .with_response_time(1834)];
        assert_eq!(search_haystacks(&records[0]), vec!["issue", "body", "success"]);
        assert!(filter_suggestions(&records, &SearchQuery::parse("4096")).is_empty());
        assert!(filter_suggestions(&records, &SearchQuery::parse("1834")).is_empty());
    }

    #[test]
    fn test_file_basename() {
        assert_eq!(file_basename("/workspace/src/network.ts"), "network.ts");
        assert_eq!(file_basename("src\\lib\\util.rs"), "util.rs");
        assert_eq!(file_basename("mixed/dir\\file.go"), "file.go");
        assert_eq!(file_basename("plain.txt"), "plain.txt");
        assert_eq!(file_basename("trailing/"), "");
    }

    #[test]
    fn test_humanize_feature() {
        assert_eq!(humanize_feature("fetchRetryPolicy"), "fetch Retry Policy");
        assert_eq!(humanize_feature("rate_limit-v2"), "rate limit v2");
        assert_eq!(humanize_feature("Auth"), "Auth");
        assert_eq!(humanize_feature(""), "");
    }

    #[test]
    fn test_scenario_tag_search() {
        let records = scenario_records();
        let js = filter_suggestions(&records, &SearchQuery::parse("javascript"));
        assert_eq!(ids(&js), ["r1", "r3"]);

        let js_async = filter_suggestions(&records, &SearchQuery::parse("javascript async"));
        assert_eq!(ids(&js_async), ["r1"]);
    }

    #[test]
    fn test_scenario_basename_match() {
        let records = vec![
            Suggestion::new("n", "Timeout", "Retry").with_file("/workspace/src/network.ts"),
            Suggestion::new("o", "Other", "Thing").with_file("/workspace/src/ui.ts"),
        ];
        let found = filter_suggestions(&records, &SearchQuery::parse("network"));
        assert_eq!(ids(&found), ["n"]);
    }

    #[test]
    fn test_humanized_feature_matches_multi_word_term() {
        let records = vec![Suggestion::new("a", "x", "y").with_feature("fetchRetryPolicy")];
        assert_eq!(filter_suggestions(&records, &SearchQuery::parse("retry policy")).len(), 1);
        assert_eq!(filter_suggestions(&records, &SearchQuery::parse("fetchretry")).len(), 1);
    }

    #[test]
    fn test_whitespace_query_returns_everything() {
        let records = scenario_records();
        let query = SearchQuery::parse("   ");
        let all = filter_suggestions(&records, &query);
        assert_eq!(ids(&all), ["r1", "r2", "r3"]);
        assert_eq!(query.normalized(), "");
    }

    #[test]
    fn test_empty_collection_stays_empty() {
        let records: Vec<Suggestion> = Vec::new();
        for raw in ["", "javascript", ".*"] {
            assert!(filter_suggestions(&records, &SearchQuery::parse(raw)).is_empty());
        }
    }

    #[test]
    fn test_filter_preserves_order() {
        let records = scenario_records();
        for raw in ["", "issue", "r", "javascript", "grid", "zzz"] {
            let found = matching_indices(&records, &SearchQuery::parse(raw));
            assert!(found.windows(2).all(|w| w[0] < w[1]), "query {:?}", raw);
        }
    }

    #[test]
    fn test_and_semantics_matches_intersection() {
        let records = scenario_records();
        let a = matching_indices(&records, &SearchQuery::parse("javascript"));
        let b = matching_indices(&records, &SearchQuery::parse("fetch"));
        let both = matching_indices(&records, &SearchQuery::parse("javascript fetch"));
        let expected: Vec<usize> = a.into_iter().filter(|idx| b.contains(idx)).collect();
        assert_eq!(both, expected);
        assert_eq!(both, vec![2]);
    }

    #[test]
    fn test_case_insensitive() {
        let records = scenario_records();
        let lower = matching_indices(&records, &SearchQuery::parse("javascript async"));
        let upper = matching_indices(&records, &SearchQuery::parse("JAVASCRIPT ASYNC"));
        let mixed = matching_indices(&records, &SearchQuery::parse("JavaScript Async"));
        assert_eq!(lower, upper);
        assert_eq!(lower, mixed);
    }

    #[test]
    fn test_metacharacters_are_literal() {
        let records = scenario_records();
        let meta = SearchQuery::parse(".*+?^${}()|[]\\");
        assert!(filter_suggestions(&records, &meta).is_empty());
        assert!(filter_suggestions(&records, &SearchQuery::parse(".*")).is_empty());

        let literal = vec![
            Suggestion::new("m", "Regex .*+?^${}()|[]\\ in config", "Escape it"),
            Suggestion::new("p", "Plain", "Text"),
        ];
        assert_eq!(ids(&filter_suggestions(&literal, &meta)), ["m"]);
        assert!(filter_suggestions(&literal, &SearchQuery::parse("(1+1)")).is_empty());
    }

    #[test]
    fn test_entry_indices_agree_with_direct_filter() {
        let records = scenario_records();
        let entries: Vec<SearchEntry> = records.iter().map(SearchEntry::new).collect();
        for raw in ["", "javascript", "css grid", "nope"] {
            let query = SearchQuery::parse(raw);
            assert_eq!(
                matching_entry_indices(&entries, &query),
                matching_indices(&records, &query)
            );
        }
    }
}
