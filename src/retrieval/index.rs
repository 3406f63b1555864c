//! Vector index abstraction and the in-memory implementation.

use std::collections::BTreeMap;

use async_trait::async_trait;
use ndarray::Array1;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use super::embeddings::{cosine_similarity, HashedEmbedder};
use crate::error::RetrievalError;

/// Metadata key holding the owning student of a chunk.
pub const STUDENT_NAME_KEY: &str = "student_name";
/// Metadata key holding the file a chunk came from.
pub const SOURCE_FILE_KEY: &str = "source_file";
/// `student_name` value used for lesson/reference material.
pub const LESSON_OWNER: &str = "LESSON";

/// A chunk of text stored in a vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub text: String,
    pub metadata: BTreeMap<String, String>,
}

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Owning student, if tagged.
    pub fn student_name(&self) -> Option<&str> {
        self.metadata.get(STUDENT_NAME_KEY).map(String::as_str)
    }

    /// Source file label, `"?"` when untagged.
    pub fn source_label(&self) -> &str {
        self.metadata
            .get(SOURCE_FILE_KEY)
            .map(String::as_str)
            .unwrap_or("?")
    }
}

/// Equality filter on one metadata key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataFilter {
    pub key: String,
    pub value: String,
}

impl MetadataFilter {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Filter on `student_name`.
    pub fn student(name: impl Into<String>) -> Self {
        Self::new(STUDENT_NAME_KEY, name)
    }

    pub fn matches(&self, document: &Document) -> bool {
        document.metadata.get(&self.key) == Some(&self.value)
    }
}

/// Similarity search over stored documents.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Returns up to `k` documents most similar to `query`, best first.
    ///
    /// Indexes that cannot filter by metadata return
    /// `RetrievalError::FilterUnsupported` when `filter` is `Some`.
    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Document>, RetrievalError>;
}

/// In-memory index ranking documents by cosine similarity of hashed embeddings.
#[derive(Debug, Clone)]
pub struct LocalVectorIndex {
    name: String,
    embedder: HashedEmbedder,
    entries: Vec<(Document, Array1<f64>)>,
    supports_filter: bool,
}

impl LocalVectorIndex {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            embedder: HashedEmbedder::default(),
            entries: Vec::new(),
            supports_filter: true,
        }
    }

    /// Makes the index reject metadata filters, like a store whose backend
    /// has no JSON metadata predicates.
    pub fn without_filter_support(mut self) -> Self {
        self.supports_filter = false;
        self
    }

    pub fn with_embedder(mut self, embedder: HashedEmbedder) -> Self {
        self.embedder = embedder;
        self
    }

    pub fn add_documents(&mut self, documents: impl IntoIterator<Item = Document>) {
        for document in documents {
            let embedding = self.embedder.embed(&document.text);
            self.entries.push((document, embedding));
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl VectorIndex for LocalVectorIndex {
    fn name(&self) -> &str {
        &self.name
    }

    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Document>, RetrievalError> {
        if filter.is_some() && !self.supports_filter {
            return Err(RetrievalError::FilterUnsupported(self.name.clone()));
        }

        let query_embedding = self.embedder.embed(query);
        let mut scored: Vec<(OrderedFloat<f64>, usize)> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, (doc, _))| filter.map_or(true, |f| f.matches(doc)))
            .map(|(i, (_, emb))| (OrderedFloat(cosine_similarity(&query_embedding, emb)), i))
            .collect();

        // Best score first; insertion order breaks ties.
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(_, i)| self.entries[i].0.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn homework(student: &str, file: &str, text: &str) -> Document {
        Document::new(text)
            .with_metadata(STUDENT_NAME_KEY, student)
            .with_metadata(SOURCE_FILE_KEY, file)
    }

    fn sample_index() -> LocalVectorIndex {
        let mut index = LocalVectorIndex::new("homework");
        index.add_documents(vec![
            homework("Aarav", "a1.txt", "recursion needs a base case and a recursive step"),
            homework("Aarav", "a2.txt", "binary search compares against the middle element"),
            homework("Dev", "d1.txt", "recursion recursion recursion call stack"),
        ]);
        index
    }

    #[test]
    fn test_document_labels() {
        let doc = homework("Aarav", "a1.txt", "x");
        assert_eq!(doc.student_name(), Some("Aarav"));
        assert_eq!(doc.source_label(), "a1.txt");
        assert_eq!(Document::new("y").source_label(), "?");
    }

    #[tokio::test]
    async fn test_search_ranks_and_truncates() {
        let index = sample_index();
        let results = index
            .similarity_search("recursion", 2, None)
            .await
            .expect("search");
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|d| d.text.contains("recursion")));
    }

    #[tokio::test]
    async fn test_search_with_filter() {
        let index = sample_index();
        let filter = MetadataFilter::student("Aarav");
        let results = index
            .similarity_search("recursion", 10, Some(&filter))
            .await
            .expect("search");
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|d| d.student_name() == Some("Aarav")));
        assert_eq!(results[0].source_label(), "a1.txt");
    }

    #[tokio::test]
    async fn test_filter_unsupported() {
        let index = sample_index().without_filter_support();
        let filter = MetadataFilter::student("Dev");
        let err = index
            .similarity_search("recursion", 3, Some(&filter))
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::FilterUnsupported(_)));

        let unfiltered = index.similarity_search("recursion", 3, None).await;
        assert_eq!(unfiltered.expect("search").len(), 3);
    }
}
