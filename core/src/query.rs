use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use crate::index::{now_unix, Document, SearchIndex};
use crate::snippet::{generate_snippet, DEFAULT_SNIPPET_LEN};
use crate::tokenizer::tokenize;

lazy_static! {
    static ref PHRASES: Regex = Regex::new(r#""([^"]*)""#).expect("valid regex");
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterValue {
    pub value: String,
    pub exclude: bool,
}

/// Structured form of a raw query string.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryPlan {
    pub required: Vec<String>,
    pub optional: Vec<String>,
    pub excluded: Vec<String>,
    pub phrases: Vec<String>,
    pub filters: HashMap<String, Vec<FilterValue>>,
}

impl QueryPlan {
    pub fn is_empty(&self) -> bool {
        self.required.is_empty() && self.optional.is_empty() && self.phrases.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub limit: usize,
    pub offset: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions { limit: 10, offset: 0 }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub document: Document,
    pub score: f64,
    pub matched_terms: Vec<String>,
    pub snippet: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub results: Vec<SearchHit>,
    /// Qualifying documents before pagination.
    pub total: usize,
    pub query: String,
    pub parsed: QueryPlan,
}

/// Parse a raw query: `"quoted phrases"`, AND/OR/NOT keywords
/// (case-insensitive), a leading `-` as NOT shorthand, and `field:value`
/// filter tokens. Plain tokens land in `required` under AND (the default)
/// and `optional` under OR; `OR` also demotes the term just before it, so
/// `fox OR dog` means either, not "fox and maybe dog".
pub fn parse_query(raw: &str) -> QueryPlan {
    let mut plan = QueryPlan::default();
    for cap in PHRASES.captures_iter(raw) {
        let phrase = cap[1].trim().to_lowercase();
        if !phrase.is_empty() {
            plan.phrases.push(phrase);
        }
    }
    let working = PHRASES.replace_all(raw, " ");

    let mut or_mode = false;
    let mut negate_next = false;
    for raw_token in working.split_whitespace() {
        let token = raw_token.to_lowercase();
        match token.as_str() {
            "and" => {
                or_mode = false;
                continue;
            }
            "or" => {
                or_mode = true;
                if let Some(prev) = plan.required.pop() {
                    plan.optional.push(prev);
                }
                continue;
            }
            "not" => {
                negate_next = true;
                continue;
            }
            _ => {}
        }

        let (token, negated) = match token.strip_prefix('-') {
            Some(rest) => (rest.to_string(), true),
            None => (token, negate_next),
        };
        negate_next = false;
        if token.is_empty() {
            continue;
        }

        if let Some((field, value)) = token.split_once(':') {
            if !field.is_empty() && !value.is_empty() {
                plan.filters
                    .entry(field.to_string())
                    .or_default()
                    .push(FilterValue { value: value.to_string(), exclude: negated });
                continue;
            }
        }

        if negated {
            plan.excluded.push(token);
        } else if or_mode {
            plan.optional.push(token);
        } else {
            plan.required.push(token);
        }
    }
    plan
}

/// Conjunctive filter check. `site` matches the url (substring or `*` glob),
/// `type` compares the canonical type string exactly, `title` is a substring
/// of the lowercased title; an unknown field never matches.
pub fn matches_filters(doc: &Document, filters: &HashMap<String, Vec<FilterValue>>) -> bool {
    for (field, values) in filters {
        for fv in values {
            let matched = match field.as_str() {
                "site" => matches_pattern(&doc.url.to_lowercase(), &fv.value),
                "type" => doc.doc_type.as_str() == fv.value,
                "title" => doc.title.to_lowercase().contains(&fv.value),
                _ => false,
            };
            if matched == fv.exclude {
                return false;
            }
        }
    }
    true
}

/// Simple glob: `*` matches any substring, everything else is literal, and a
/// pattern without `*` matches anywhere in the text.
pub fn matches_pattern(text: &str, pattern: &str) -> bool {
    if pattern.is_empty() {
        return false;
    }
    if !pattern.contains('*') {
        return text.contains(pattern);
    }
    let mut rest = text;
    for part in pattern.split('*') {
        if part.is_empty() {
            continue;
        }
        match rest.find(part) {
            Some(idx) => rest = &rest[idx + part.len()..],
            None => return false,
        }
    }
    true
}

/// Evaluate a raw query against the index: gather candidates from postings,
/// score with tf-idf partials and multiplicative boosts, filter, sort by
/// score descending (ties in no particular order), paginate, and attach
/// snippets.
pub fn search(index: &SearchIndex, raw_query: &str, options: &SearchOptions) -> SearchResults {
    let plan = parse_query(raw_query);
    tracing::debug!(query = raw_query, ?plan, "parsed query");
    if plan.is_empty() {
        return SearchResults {
            results: Vec::new(),
            total: 0,
            query: raw_query.to_string(),
            parsed: plan,
        };
    }

    // Postings are the only candidate source, so phrase words join the
    // scoring pool; the phrase-as-substring requirement still applies below.
    let mut scoring_terms: Vec<String> = Vec::new();
    for term in plan.required.iter().chain(plan.optional.iter()) {
        if !scoring_terms.contains(term) {
            scoring_terms.push(term.clone());
        }
    }
    for phrase in &plan.phrases {
        for word in tokenize(phrase) {
            if !scoring_terms.contains(&word) {
                scoring_terms.push(word);
            }
        }
    }

    let total_docs = index.document_count() as f64;
    let mut partials: HashMap<&str, HashMap<&str, f64>> = HashMap::new();
    for term in &scoring_terms {
        let df = index.document_frequency(term);
        if df == 0 {
            continue;
        }
        let idf = (total_docs / df as f64).ln();
        if let Some(postings) = index.postings(term) {
            for (doc_id, posting) in postings {
                partials
                    .entry(doc_id.as_str())
                    .or_default()
                    .insert(term.as_str(), f64::from(posting.count) * idf);
            }
        }
    }

    let now = now_unix();
    let mut qualified: Vec<(&Document, f64, Vec<String>)> = Vec::new();
    for (doc_id, term_partials) in &partials {
        let Some(doc) = index.document(doc_id) else {
            continue;
        };
        if !plan.required.iter().all(|t| term_partials.contains_key(t.as_str())) {
            continue;
        }
        if !plan.optional.is_empty()
            && !plan.optional.iter().any(|t| term_partials.contains_key(t.as_str()))
        {
            continue;
        }
        // exclusion and phrase checks scan raw content: positional data is
        // capped and cannot answer them
        let content_lower = doc.content.to_lowercase();
        if plan.excluded.iter().any(|t| content_lower.contains(t)) {
            continue;
        }
        if !plan.phrases.iter().all(|p| content_lower.contains(p)) {
            continue;
        }
        if !matches_filters(doc, &plan.filters) {
            continue;
        }

        let mut score: f64 = term_partials.values().sum();
        let title_lower = doc.title.to_lowercase();
        let url_lower = doc.url.to_lowercase();
        let plan_terms = || plan.required.iter().chain(plan.optional.iter());
        if plan_terms().any(|t| title_lower.contains(t)) {
            score *= 1.5;
        }
        if !plan.phrases.is_empty() {
            score *= 2.0;
        }
        if plan_terms().any(|t| url_lower.contains(t)) {
            score *= 1.2;
        }
        let age_days = (now - doc.last_modified).max(0) as f64 / 86_400.0;
        let recency = 1.0 / (1.0 + age_days / 30.0);
        score *= 1.0 + recency * 0.2;

        let matched: Vec<String> = scoring_terms
            .iter()
            .filter(|t| term_partials.contains_key(t.as_str()))
            .cloned()
            .collect();
        qualified.push((doc, score, matched));
    }

    qualified.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    let total = qualified.len();

    let results: Vec<SearchHit> = qualified
        .into_iter()
        .skip(options.offset)
        .take(options.limit)
        .map(|(doc, score, matched)| {
            let mut anchor_terms = matched.clone();
            anchor_terms.extend(plan.phrases.iter().cloned());
            SearchHit {
                snippet: generate_snippet(&doc.content, &anchor_terms, DEFAULT_SNIPPET_LEN),
                document: doc.clone(),
                score,
                matched_terms: matched,
            }
        })
        .collect();

    SearchResults {
        results,
        total,
        query: raw_query.to_string(),
        parsed: plan,
    }
}

/// Vocabulary terms starting with `prefix`, most frequent first.
pub fn suggestions(index: &SearchIndex, prefix: &str, limit: usize) -> Vec<String> {
    let prefix = prefix.to_lowercase();
    if prefix.is_empty() {
        return Vec::new();
    }
    let mut matches: Vec<(String, usize)> = index
        .vocabulary()
        .filter(|(term, _)| term.starts_with(&prefix))
        .map(|(term, df)| (term.to_string(), df))
        .collect();
    matches.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    matches.into_iter().take(limit).map(|(term, _)| term).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::DocType;

    #[test]
    fn parse_plain_tokens_default_to_required() {
        let plan = parse_query("red fox");
        assert_eq!(plan.required, vec!["red", "fox"]);
        assert!(plan.optional.is_empty());
    }

    #[test]
    fn parse_and_keyword_is_consumed() {
        let plan = parse_query("red AND fox");
        assert_eq!(plan.required, vec!["red", "fox"]);
    }

    #[test]
    fn parse_or_demotes_both_sides() {
        let plan = parse_query("fox OR dog");
        assert!(plan.required.is_empty());
        assert_eq!(plan.optional, vec!["fox", "dog"]);
    }

    #[test]
    fn parse_not_and_dash_are_equivalent() {
        let a = parse_query("fox NOT lazy");
        let b = parse_query("fox -lazy");
        assert_eq!(a.excluded, vec!["lazy"]);
        assert_eq!(a, b);
    }

    #[test]
    fn parse_extracts_phrases() {
        let plan = parse_query(r#"jumps "Red Fox""#);
        assert_eq!(plan.phrases, vec!["red fox"]);
        assert_eq!(plan.required, vec!["jumps"]);
    }

    #[test]
    fn parse_filters_and_negated_filters() {
        let plan = parse_query("fox site:blog -type:script NOT title:draft");
        assert_eq!(plan.required, vec!["fox"]);
        assert_eq!(plan.filters["site"], vec![FilterValue { value: "blog".into(), exclude: false }]);
        assert_eq!(plan.filters["type"], vec![FilterValue { value: "script".into(), exclude: true }]);
        assert_eq!(plan.filters["title"], vec![FilterValue { value: "draft".into(), exclude: true }]);
    }

    #[test]
    fn parse_is_case_insensitive_on_keywords() {
        let plan = parse_query("fox or dog");
        assert_eq!(plan.optional, vec!["fox", "dog"]);
    }

    #[test]
    fn pattern_glob_matches_substrings() {
        assert!(matches_pattern("site.rw/blog/post", "blog"));
        assert!(matches_pattern("site.rw/blog/post", "blog*post"));
        assert!(!matches_pattern("site.rw/blog/post", "post*blog"));
        assert!(!matches_pattern("anything", ""));
    }

    fn two_doc_index() -> SearchIndex {
        let mut index = SearchIndex::new();
        index.add_document("/a", "Fox", "the quick red fox jumps", DocType::PlainText);
        index.add_document("/b", "Dog", "lazy dog sleeps", DocType::PlainText);
        index
    }

    #[test]
    fn empty_query_returns_empty_results() {
        let index = two_doc_index();
        let out = search(&index, "   ", &SearchOptions::default());
        assert_eq!(out.total, 0);
        assert!(out.results.is_empty());
        assert_eq!(out.query, "   ");
    }

    #[test]
    fn unknown_term_matches_nothing() {
        let index = two_doc_index();
        let out = search(&index, "zebra", &SearchOptions::default());
        assert_eq!(out.total, 0);
    }

    #[test]
    fn title_match_boosts_score() {
        let mut index = SearchIndex::new();
        index.add_document("/titled", "Fox Report", "fox fox", DocType::PlainText);
        index.add_document("/plain", "Report", "fox fox", DocType::PlainText);
        // keep df below the doc count so the idf term stays positive
        index.add_document("/other", "Other", "nothing relevant", DocType::PlainText);
        let out = search(&index, "fox", &SearchOptions::default());
        assert_eq!(out.total, 2);
        assert_eq!(out.results[0].document.url, "/titled");
        assert!(out.results[0].score > out.results[1].score);
    }

    #[test]
    fn suggestions_ranked_by_frequency() {
        let mut index = SearchIndex::new();
        index.add_document("/1", "A", "carrot carrot cart", DocType::PlainText);
        index.add_document("/2", "B", "carrot candle", DocType::PlainText);
        let got = suggestions(&index, "ca", 10);
        assert_eq!(got[0], "carrot");
        assert!(got.contains(&"candle".to_string()));
        assert!(got.contains(&"cart".to_string()));
        assert_eq!(suggestions(&index, "zz", 10), Vec::<String>::new());
    }
}
