//! Comprehension pipeline.
//!
//! # Architecture
//!
//! - **Config**: cohort, thresholds, retrieval bounds and LLM options
//! - **State**: the write-once record threaded through the stages
//! - **Aggregator**: scores every (student, concept) cell and persists it
//! - **Orchestrator**: runs the stages in order and enforces preconditions
//!
//! # Pipeline Flow
//!
//! 1. **Evaluate**: retrieve evidence and score each cell
//! 2. **Report**: one generated report per student
//! 3. **KnowledgeGraphAndGroups**: awareness snapshot and study groups
//! 4. **LessonPlans**: plans for concepts whose cohort median is below mastery
//! 5. **Homework**: per-student homework for that student's weak concepts
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use comprende::pipeline::{Collaborators, PipelineConfig, PipelineOrchestrator};
//!
//! let config = PipelineConfig::from_env()?
//!     .with_students(["Aarav", "Bhavana"])
//!     .with_max_concurrent_evaluations(4);
//!
//! let collaborators = Collaborators {
//!     retriever: Arc::new(retriever),
//!     scorer: Arc::new(scorer),
//!     generator: Arc::new(generator),
//!     persistence: Arc::new(database),
//! };
//!
//! let output = PipelineOrchestrator::new(config, collaborators)?.run().await?;
//! println!("{} study groups", output.groups.len());
//! ```

pub mod aggregator;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod state;

pub use aggregator::{CellOutcome, ComprehensionAggregator};
pub use config::{parse_list, ConfigError, PipelineConfig, RetrievalBounds, SnippetLimits};
pub use error::PipelineError;
pub use orchestrator::{Collaborators, PipelineOrchestrator};
pub use state::{PipelineOutput, PipelineState, Stage, StageTiming, TextTable};
