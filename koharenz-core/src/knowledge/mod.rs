//! Retrieval layer: a small in-memory vector store over philosophical texts.
//!
//! Every document carries a language tag in its `lang` metadata, and queries
//! can be restricted to one language with [`MetadataFilter::lang`].

pub mod embed;
pub mod store;

pub use embed::{Embedding, DIMENSIONS};
pub use store::{KnowledgeDocument, KnowledgeStore, MetadataFilter, SearchHit, LANG_KEY};

use std::path::PathBuf;
use thiserror::Error;

const BUNDLED_CORPUS: &str = include_str!("../../data/corpus.json");

#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("Document id must not be empty")]
    EmptyId,

    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid knowledge file: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(serde::Deserialize)]
struct Corpus {
    documents: Vec<KnowledgeDocument>,
}

impl KnowledgeStore {
    /// A store seeded with the bundled English and German corpus.
    pub fn seeded() -> Result<Self, KnowledgeError> {
        let corpus: Corpus = serde_json::from_str(BUNDLED_CORPUS)?;
        Self::from_documents(corpus.documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_corpus_is_bilingual() {
        let store = KnowledgeStore::seeded().unwrap();
        assert_eq!(store.len(), 16);
        assert_eq!(store.documents().filter(|d| d.lang() == Some("en")).count(), 8);
        assert_eq!(store.documents().filter(|d| d.lang() == Some("de")).count(), 8);
    }

    #[test]
    fn test_german_filter_never_returns_english() {
        let store = KnowledgeStore::seeded().unwrap();
        let de = MetadataFilter::lang("de");
        for query in [
            "coherence theory of truth",
            "Kohärenztheorie der Wahrheit",
            "Gödel incompleteness system",
            "integration phi consciousness",
            "structural dissociation identity",
        ] {
            for hit in store.query(query, Some(&de), 10) {
                assert_eq!(hit.document.lang(), Some("de"), "query {query:?} returned {}", hit.document.id);
            }
        }
    }

    #[test]
    fn test_query_ranks_relevant_document_first() {
        let store = KnowledgeStore::seeded().unwrap();
        let hits = store.query(
            "paraconsistent logic contradiction",
            Some(&MetadataFilter::lang("en")),
            3,
        );
        assert_eq!(hits[0].document.id, "en_paraconsistent_logic");
        assert!(hits.len() <= 3);
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_upsert_and_remove() {
        let mut store = KnowledgeStore::new();
        store
            .add(KnowledgeDocument::new("a", "first text").with_lang("en"))
            .unwrap();
        store
            .add(KnowledgeDocument::new("a", "replaced text").with_lang("en"))
            .unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("a").unwrap().text, "replaced text");

        assert!(matches!(
            store.add(KnowledgeDocument::new(" ", "x")),
            Err(KnowledgeError::EmptyId)
        ));

        assert!(store.remove("a").is_some());
        assert!(store.is_empty());
        assert!(store.remove("a").is_none());
    }

    #[test]
    fn test_ties_sorted_by_id_and_zero_scores_dropped() {
        let store = KnowledgeStore::from_documents([
            KnowledgeDocument::new("b", "truth"),
            KnowledgeDocument::new("a", "truth"),
            KnowledgeDocument::new("c", "bananas"),
        ])
        .unwrap();
        let ids: Vec<String> = store
            .query("truth", None, 10)
            .into_iter()
            .map(|h| h.document.id)
            .collect();
        assert_eq!(ids, ["a", "b"]);
        assert!(store.query("", None, 10).is_empty());
    }

    #[test]
    fn test_filter_requires_key() {
        let untagged = KnowledgeDocument::new("x", "text");
        assert!(!MetadataFilter::lang("en").matches(&untagged));
        assert!(MetadataFilter::new().matches(&untagged));
        let tagged = untagged.with_lang("en").with_metadata("topic", "truth");
        assert!(MetadataFilter::lang("en").eq("topic", "truth").matches(&tagged));
        assert!(!MetadataFilter::lang("en").eq("topic", "logic").matches(&tagged));
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("knowledge.json");

        let store = KnowledgeStore::seeded().unwrap();
        store.save(&path).await.unwrap();
        let loaded = KnowledgeStore::load(&path).await.unwrap();

        assert_eq!(loaded.len(), store.len());
        let query = "narrative identity self";
        assert_eq!(
            loaded.query(query, None, 3),
            store.query(query, None, 3)
        );
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let result = KnowledgeStore::load("/nonexistent/knowledge.json").await;
        assert!(matches!(result, Err(KnowledgeError::Io { .. })));
    }
}
