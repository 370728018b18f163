use super::embed::Embedding;
use super::KnowledgeError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Metadata key carrying a document's language tag.
pub const LANG_KEY: &str = "lang";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeDocument {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl KnowledgeDocument {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_lang(self, lang: impl Into<String>) -> Self {
        self.with_metadata(LANG_KEY, lang)
    }

    pub fn lang(&self) -> Option<&str> {
        self.metadata.get(LANG_KEY).map(String::as_str)
    }
}

/// Conjunction of `key = value` constraints on document metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataFilter {
    constraints: BTreeMap<String, String>,
}

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only documents in `lang`.
    pub fn lang(lang: impl Into<String>) -> Self {
        Self::new().eq(LANG_KEY, lang)
    }

    pub fn eq(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.constraints.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// A document missing a constrained key does not match.
    pub fn matches(&self, document: &KnowledgeDocument) -> bool {
        self.constraints
            .iter()
            .all(|(key, value)| document.metadata.get(key) == Some(value))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub document: KnowledgeDocument,
    pub score: f32,
}

#[derive(Debug, Clone)]
struct Entry {
    document: KnowledgeDocument,
    embedding: Embedding,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    documents: Vec<KnowledgeDocument>,
}

/// In-memory document store with similarity search.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeStore {
    entries: BTreeMap<String, Entry>,
}

impl KnowledgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from documents, later ids replacing earlier ones.
    pub fn from_documents(
        documents: impl IntoIterator<Item = KnowledgeDocument>,
    ) -> Result<Self, KnowledgeError> {
        let mut store = Self::new();
        for document in documents {
            store.add(document)?;
        }
        Ok(store)
    }

    /// Insert or replace a document.
    pub fn add(&mut self, document: KnowledgeDocument) -> Result<(), KnowledgeError> {
        if document.id.trim().is_empty() {
            return Err(KnowledgeError::EmptyId);
        }
        let embedding = Embedding::of(&document.text);
        tracing::trace!(id = %document.id, "document indexed");
        self.entries
            .insert(document.id.clone(), Entry { document, embedding });
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Option<KnowledgeDocument> {
        self.entries.remove(id).map(|e| e.document)
    }

    pub fn get(&self, id: &str) -> Option<&KnowledgeDocument> {
        self.entries.get(id).map(|e| &e.document)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn documents(&self) -> impl Iterator<Item = &KnowledgeDocument> {
        self.entries.values().map(|e| &e.document)
    }

    /// The `top_k` documents most similar to `text` that pass `filter`.
    pub fn query(
        &self,
        text: &str,
        filter: Option<&MetadataFilter>,
        top_k: usize,
    ) -> Vec<SearchHit> {
        let query = Embedding::of(text);
        if query.is_zero() || top_k == 0 {
            return Vec::new();
        }

        let mut hits: Vec<SearchHit> = self
            .entries
            .values()
            .filter(|e| filter.map_or(true, |f| f.matches(&e.document)))
            .map(|e| SearchHit {
                score: query.cosine(&e.embedding),
                document: e.document.clone(),
            })
            .filter(|hit| hit.score > 0.0)
            .collect();

        // Stable sort: ties stay in id order.
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);
        tracing::debug!(query = text, hits = hits.len(), "knowledge query");
        hits
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), KnowledgeError> {
        let path = path.as_ref();
        let file = StoreFile {
            documents: self.documents().cloned().collect(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        tokio::fs::write(path, json)
            .await
            .map_err(|source| KnowledgeError::Io {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Load a store written by [`save`](Self::save). Embeddings are recomputed.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, KnowledgeError> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| KnowledgeError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let file: StoreFile = serde_json::from_str(&json)?;
        Self::from_documents(file.documents)
    }
}
