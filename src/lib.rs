//! comprende: student comprehension diagnostics and study planning.
//!
//! This library scores how well each student understands each concept from
//! their homework, then derives reports, an awareness graph, study groups,
//! remedial lesson plans and personalized homework.

// Core modules
pub mod cli;
pub mod error;
pub mod generation;
pub mod knowledge;
pub mod llm;
pub mod pipeline;
pub mod prompts;
pub mod retrieval;
pub mod scoring;
pub mod storage;
pub mod utils;

// Re-export commonly used error types
pub use error::{LlmError, RetrievalError};
pub use pipeline::PipelineError;
