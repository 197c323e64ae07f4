use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::tokenizer::tokenize;

/// Per-posting position cap. A deliberate memory bound: occurrences past the
/// tenth are counted but their offsets are not retained, which is why phrase
/// and exclusion checks scan raw content instead of positions.
pub const MAX_POSITIONS: usize = 10;

/// Bumped whenever the persisted blob layout changes.
pub const INDEX_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocType {
    Rwml,
    Script,
    PlainText,
    Html,
}

impl DocType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocType::Rwml => "rwml",
            DocType::Script => "script",
            DocType::PlainText => "plain-text",
            DocType::Html => "html",
        }
    }
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub url: String,
    pub title: String,
    /// Full fetched text, markup included; snippet and phrase checks need it raw.
    pub content: String,
    /// Unix seconds at index time.
    pub last_modified: i64,
    pub size: u64,
    pub doc_type: DocType,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub count: u32,
    /// Token offsets of the first `MAX_POSITIONS` occurrences.
    pub positions: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMeta {
    pub total_documents: u64,
    /// Count of distinct term keys in the inverted table.
    pub total_terms: u64,
    pub last_update: i64,
    pub version: u32,
}

impl IndexMeta {
    fn new() -> Self {
        IndexMeta {
            total_documents: 0,
            total_terms: 0,
            last_update: 0,
            version: INDEX_VERSION,
        }
    }
}

/// Document table plus inverted term table. An explicit value: callers hold
/// as many independent indices as they like, there is no ambient instance.
///
/// Invariant: a term key exists iff at least one document posts it, and the
/// metadata counters always agree with the map sizes after every mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchIndex {
    pub(crate) documents: HashMap<String, Document>,
    pub(crate) terms: HashMap<String, HashMap<String, Posting>>,
    pub(crate) meta: IndexMeta,
}

impl Default for SearchIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchIndex {
    pub fn new() -> Self {
        SearchIndex {
            documents: HashMap::new(),
            terms: HashMap::new(),
            meta: IndexMeta::new(),
        }
    }

    /// Index a document and return its generated id.
    ///
    /// Ids combine a url slug with the current timestamp, so re-indexing the
    /// same url always creates a new document next to the old one. Callers
    /// wanting replace semantics remove the prior id first.
    pub fn add_document(&mut self, url: &str, title: &str, content: &str, doc_type: DocType) -> String {
        let id = self.next_doc_id(url);
        let term_count = self.index_content(&id, content);

        self.documents.insert(
            id.clone(),
            Document {
                id: id.clone(),
                url: url.to_string(),
                title: title.to_string(),
                content: content.to_string(),
                last_modified: now_unix(),
                size: content.len() as u64,
                doc_type,
            },
        );
        self.meta.total_documents += 1;
        self.meta.last_update = now_unix();
        tracing::debug!(doc_id = %id, url, terms = term_count, "indexed document");
        id
    }

    /// Remove a document and every posting that referenced it. Returns false
    /// for an unknown id; absence is reported, never raised.
    pub fn remove_document(&mut self, doc_id: &str) -> bool {
        if self.documents.remove(doc_id).is_none() {
            tracing::debug!(doc_id, "remove of unknown document");
            return false;
        }
        self.terms.retain(|_, postings| {
            postings.remove(doc_id);
            !postings.is_empty()
        });
        self.meta.total_terms = self.terms.len() as u64;
        self.meta.total_documents -= 1;
        self.meta.last_update = now_unix();
        true
    }

    /// Number of distinct documents posting `term`; 0 when the term is absent.
    pub fn document_frequency(&self, term: &str) -> usize {
        self.terms.get(term).map_or(0, |p| p.len())
    }

    /// Drop the whole term table and rebuild it from the retained documents.
    /// For when tokenizer rules change under an existing document set.
    pub fn rebuild(&mut self) {
        self.terms.clear();
        self.meta.total_terms = 0;
        let docs: Vec<(String, String)> = self
            .documents
            .iter()
            .map(|(id, doc)| (id.clone(), doc.content.clone()))
            .collect();
        for (id, content) in docs {
            self.index_content(&id, &content);
        }
        self.meta.last_update = now_unix();
        tracing::info!(
            documents = self.meta.total_documents,
            terms = self.meta.total_terms,
            "rebuilt postings"
        );
    }

    /// Back to the empty state, documents included.
    pub fn clear(&mut self) {
        self.documents.clear();
        self.terms.clear();
        self.meta = IndexMeta::new();
        self.meta.last_update = now_unix();
    }

    pub fn document(&self, doc_id: &str) -> Option<&Document> {
        self.documents.get(doc_id)
    }

    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub fn postings(&self, term: &str) -> Option<&HashMap<String, Posting>> {
        self.terms.get(term)
    }

    /// Term keys with their document frequencies.
    pub fn vocabulary(&self) -> impl Iterator<Item = (&str, usize)> {
        self.terms.iter().map(|(term, p)| (term.as_str(), p.len()))
    }

    pub fn metadata(&self) -> &IndexMeta {
        &self.meta
    }

    /// Tokenize `content` into the term table under `doc_id`; returns the
    /// token count. Shared by add_document and rebuild.
    fn index_content(&mut self, doc_id: &str, content: &str) -> usize {
        let tokens = tokenize(content);
        for (pos, term) in tokens.iter().enumerate() {
            if !self.terms.contains_key(term) {
                self.meta.total_terms += 1;
            }
            let posting = self
                .terms
                .entry(term.clone())
                .or_default()
                .entry(doc_id.to_string())
                .or_default();
            posting.count += 1;
            if posting.positions.len() < MAX_POSITIONS {
                posting.positions.push(pos as u32);
            }
        }
        tokens.len()
    }

    fn next_doc_id(&self, url: &str) -> String {
        let slug: String = url
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect();
        let stamp = (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64;
        let mut id = format!("{slug}-{stamp}");
        // same url indexed twice within one tick still gets a distinct id
        let mut bump = 1;
        while self.documents.contains_key(&id) {
            id = format!("{slug}-{stamp}-{bump}");
            bump += 1;
        }
        id
    }
}

pub(crate) fn now_unix() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}
