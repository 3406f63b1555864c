//! The retrieval capability used by the pipeline.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::index::{Document, MetadataFilter, VectorIndex};
use crate::error::RetrievalError;

/// A retrieved text chunk tagged with where it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snippet {
    pub text: String,
    pub source_label: String,
}

impl From<Document> for Snippet {
    fn from(document: Document) -> Self {
        let source_label = document.source_label().to_string();
        Self {
            text: document.text,
            source_label,
        }
    }
}

/// Retrieval capability: student evidence and lesson material.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Up to `result_bound` snippets of `student`'s own work relevant to `concept`.
    async fn student_evidence(
        &self,
        student: &str,
        concept: &str,
        result_bound: usize,
    ) -> Result<Vec<Snippet>, RetrievalError>;

    /// Up to `result_bound` lesson snippets relevant to `concept`.
    async fn lesson_context(
        &self,
        concept: &str,
        result_bound: usize,
    ) -> Result<Vec<Snippet>, RetrievalError>;
}

/// `Retriever` backed by one homework index and one lesson index.
pub struct IndexRetriever {
    homework: Arc<dyn VectorIndex>,
    lessons: Arc<dyn VectorIndex>,
    filtered_k: usize,
    broadened_k: usize,
}

impl IndexRetriever {
    pub fn new(homework: Arc<dyn VectorIndex>, lessons: Arc<dyn VectorIndex>) -> Self {
        Self {
            homework,
            lessons,
            filtered_k: 16,
            broadened_k: 32,
        }
    }

    /// Sets the candidate counts for the filtered and the broadened search.
    pub fn with_search_bounds(mut self, filtered_k: usize, broadened_k: usize) -> Self {
        self.filtered_k = filtered_k;
        self.broadened_k = broadened_k;
        self
    }
}

#[async_trait]
impl Retriever for IndexRetriever {
    async fn student_evidence(
        &self,
        student: &str,
        concept: &str,
        result_bound: usize,
    ) -> Result<Vec<Snippet>, RetrievalError> {
        let filter = MetadataFilter::student(student);

        let documents = match self
            .homework
            .similarity_search(concept, self.filtered_k, Some(&filter))
            .await
        {
            Ok(documents) => documents,
            Err(RetrievalError::FilterUnsupported(index)) => {
                debug!(
                    index = %index,
                    student = %student,
                    "Index cannot filter, broadening search and post-filtering"
                );
                self.homework
                    .similarity_search(concept, self.broadened_k, None)
                    .await?
                    .into_iter()
                    .filter(|doc| filter.matches(doc))
                    .collect()
            }
            Err(e) => return Err(e),
        };

        Ok(documents
            .into_iter()
            .take(result_bound)
            .map(Snippet::from)
            .collect())
    }

    async fn lesson_context(
        &self,
        concept: &str,
        result_bound: usize,
    ) -> Result<Vec<Snippet>, RetrievalError> {
        let documents = self
            .lessons
            .similarity_search(concept, result_bound, None)
            .await?;
        Ok(documents.into_iter().map(Snippet::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::index::{LocalVectorIndex, SOURCE_FILE_KEY, STUDENT_NAME_KEY};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn doc(student: &str, file: &str, text: &str) -> Document {
        Document::new(text)
            .with_metadata(STUDENT_NAME_KEY, student)
            .with_metadata(SOURCE_FILE_KEY, file)
    }

    fn homework_docs() -> Vec<Document> {
        let mut docs = Vec::new();
        for i in 0..5 {
            docs.push(doc("Aarav", &format!("a{}.txt", i), "recursion base case"));
            docs.push(doc("Dev", &format!("d{}.txt", i), "recursion call stack"));
        }
        docs
    }

    fn retriever(homework: LocalVectorIndex) -> IndexRetriever {
        IndexRetriever::new(Arc::new(homework), Arc::new(LocalVectorIndex::new("lessons")))
    }

    #[tokio::test]
    async fn test_filtered_evidence_is_bounded() {
        let mut index = LocalVectorIndex::new("homework");
        index.add_documents(homework_docs());

        let snippets = retriever(index)
            .student_evidence("Aarav", "recursion", 3)
            .await
            .expect("retrieve");
        assert_eq!(snippets.len(), 3);
        assert!(snippets.iter().all(|s| s.source_label.starts_with('a')));
    }

    #[tokio::test]
    async fn test_fallback_post_filters_by_student() {
        let mut index = LocalVectorIndex::new("homework").without_filter_support();
        index.add_documents(homework_docs());

        let snippets = retriever(index)
            .student_evidence("Dev", "recursion", 6)
            .await
            .expect("retrieve");
        assert_eq!(snippets.len(), 5);
        assert!(snippets.iter().all(|s| s.source_label.starts_with('d')));
    }

    struct FailingIndex {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl VectorIndex for FailingIndex {
        fn name(&self) -> &str {
            "failing"
        }

        async fn similarity_search(
            &self,
            _query: &str,
            _k: usize,
            _filter: Option<&MetadataFilter>,
        ) -> Result<Vec<Document>, RetrievalError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(RetrievalError::SearchFailed("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_other_errors_do_not_trigger_fallback() {
        let index = Arc::new(FailingIndex {
            calls: AtomicUsize::new(0),
        });
        let retriever = IndexRetriever::new(index.clone(), Arc::new(LocalVectorIndex::new("l")));

        let err = retriever
            .student_evidence("Aarav", "recursion", 6)
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::SearchFailed(_)));
        assert_eq!(index.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_lesson_context() {
        let mut lessons = LocalVectorIndex::new("lessons");
        lessons.add_documents(vec![
            doc("LESSON", "dp.md", "dynamic programming stores subproblem results"),
            doc("LESSON", "graphs.md", "breadth first search visits neighbours"),
        ]);
        let retriever = IndexRetriever::new(
            Arc::new(LocalVectorIndex::new("homework")),
            Arc::new(lessons),
        );

        let snippets = retriever
            .lesson_context("dynamic programming", 1)
            .await
            .expect("retrieve");
        assert_eq!(snippets.len(), 1);
        assert_eq!(snippets[0].source_label, "dp.md");
    }
}
