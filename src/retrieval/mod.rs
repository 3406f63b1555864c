//! Evidence and lesson-context retrieval.
//!
//! - `index`: the `VectorIndex` trait and an in-memory implementation
//! - `embeddings`: hashed embeddings used by the in-memory index
//! - `retriever`: the `Retriever` capability consumed by the pipeline
//! - `ingest`: out-of-band loading and chunking of homework and lesson files

pub mod embeddings;
pub mod index;
pub mod ingest;
pub mod retriever;

pub use embeddings::{cosine_similarity, HashedEmbedder};
pub use index::{
    Document, LocalVectorIndex, MetadataFilter, VectorIndex, LESSON_OWNER, SOURCE_FILE_KEY,
    STUDENT_NAME_KEY,
};
pub use ingest::{chunk_text, load_homework_dir, load_lessons_dir, CHUNK_OVERLAP, CHUNK_SIZE};
pub use retriever::{IndexRetriever, Retriever, Snippet};
