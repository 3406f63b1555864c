//! SQLite persistence for pipeline results.
//!
//! The pipeline only sees the `Persistence` capability:
//! - an idempotent insert-if-absent for the `comprehension` audit log
//! - snapshot replacement (delete-all then insert, in one transaction)
//!   for lesson plans and homework, and for awareness together with
//!   study groups
//!
//! # Usage
//!
//! ```rust,ignore
//! use comprende::storage::{Database, Persistence};
//!
//! let db = Database::connect("sqlite://comprende.db").await?;
//! db.upsert_identities(&students, &concepts).await?;
//! db.replace_knowledge_snapshot(&scores, &groups).await?;
//! ```

pub mod database;
pub mod schema;

pub use database::{ComprehensionRecord, Database, DatabaseError, Persistence};
