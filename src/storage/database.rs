//! SQLite database client and the `Persistence` capability.

use std::collections::BTreeMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use thiserror::Error;
use tracing::{debug, info};

use super::schema::SCHEMA_STATEMENTS;
use crate::knowledge::{ScoreTable, StudyGroups};

/// Errors that can occur during database operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Connection to the database failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(#[from] sqlx::Error),

    /// A table name outside the schema was requested.
    #[error("Unknown table: {0}")]
    UnknownTable(String),
}

/// One row of the `comprehension` audit log.
#[derive(Debug, Clone, PartialEq)]
pub struct ComprehensionRecord {
    pub student: String,
    pub concept: String,
    pub score: f64,
    pub pain_points: Vec<String>,
}

/// Persistence capability used by the pipeline.
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Inserts a comprehension row unless one exists for (student, concept).
    /// Returns `true` when a row was written.
    async fn insert_comprehension_if_absent(
        &self,
        record: &ComprehensionRecord,
    ) -> Result<bool, DatabaseError>;

    /// Records student and concept identities. Existing names are kept.
    async fn upsert_identities(
        &self,
        students: &[String],
        concepts: &[String],
    ) -> Result<(), DatabaseError>;

    /// Replaces the awareness snapshot with every cell of `scores` and the
    /// study group snapshot with `groups`. Readers see both old tables or
    /// both new ones.
    async fn replace_knowledge_snapshot(
        &self,
        scores: &ScoreTable,
        groups: &StudyGroups,
    ) -> Result<(), DatabaseError>;

    /// Replaces the lesson plan snapshot.
    async fn replace_lesson_plans(
        &self,
        plans: &BTreeMap<String, String>,
    ) -> Result<(), DatabaseError>;

    /// Replaces the personalized homework snapshot.
    async fn replace_homework(
        &self,
        homework: &BTreeMap<String, String>,
    ) -> Result<(), DatabaseError>;
}

/// SQLite-backed store.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens (creating if missing) the database at `database_url` and applies
    /// the schema.
    ///
    /// # Arguments
    ///
    /// * `database_url` - SQLite URL, e.g. "sqlite://comprende.db"
    pub async fn connect(database_url: &str) -> Result<Self, DatabaseError> {
        let opts = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(opts)
            .await
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        let db = Self { pool };
        db.init_schema().await?;
        info!(url = database_url, "Database opened");
        Ok(db)
    }

    /// Opens a private in-memory database on a single connection.
    pub async fn in_memory() -> Result<Self, DatabaseError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        let db = Self { pool };
        db.init_schema().await?;
        Ok(db)
    }

    /// Creates a client from an existing pool. The schema is not applied.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Creates all tables and indexes that do not exist yet.
    pub async fn init_schema(&self) -> Result<(), DatabaseError> {
        for statement in SCHEMA_STATEMENTS {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Looks up the comprehension row for one cell.
    pub async fn get_comprehension(
        &self,
        student: &str,
        concept: &str,
    ) -> Result<Option<ComprehensionRecord>, DatabaseError> {
        let row = sqlx::query(
            "SELECT student_name, concept, score, pain_points FROM comprehension
             WHERE student_name = ?1 AND concept = ?2",
        )
        .bind(student)
        .bind(concept)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| {
            let pain_points: String = row.get("pain_points");
            ComprehensionRecord {
                student: row.get("student_name"),
                concept: row.get("concept"),
                score: row.get("score"),
                pain_points: pain_points
                    .lines()
                    .filter(|l| !l.is_empty())
                    .map(str::to_string)
                    .collect(),
            }
        }))
    }

    /// Number of rows in `table`. Only schema table names are accepted.
    pub async fn count_rows(&self, table: &str) -> Result<i64, DatabaseError> {
        const TABLES: &[&str] = &[
            "students",
            "concepts",
            "comprehension",
            "student_concepts",
            "study_groups",
            "lesson_plans",
            "homework_personalized",
        ];
        if !TABLES.contains(&table) {
            return Err(DatabaseError::UnknownTable(table.to_string()));
        }

        let row = sqlx::query(&format!("SELECT COUNT(*) AS n FROM {}", table))
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }

    /// Reads the current study group snapshot.
    pub async fn study_groups(&self) -> Result<StudyGroups, DatabaseError> {
        let rows = sqlx::query(
            "SELECT group_id, student_name FROM study_groups ORDER BY group_id, student_name",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut groups = StudyGroups::new();
        for row in rows {
            let group_id: i64 = row.get("group_id");
            groups
                .entry(group_id as u32)
                .or_default()
                .push(row.get("student_name"));
        }
        Ok(groups)
    }

    /// Reads the awareness snapshot as a score table.
    pub async fn student_concepts(&self) -> Result<ScoreTable, DatabaseError> {
        let rows = sqlx::query("SELECT student_name, concept, awareness_score FROM student_concepts")
            .fetch_all(&self.pool)
            .await?;

        let mut scores = ScoreTable::new();
        for row in rows {
            scores
                .entry(row.get("student_name"))
                .or_default()
                .insert(row.get("concept"), row.get("awareness_score"));
        }
        Ok(scores)
    }

    async fn replace_text_table(
        &self,
        table: &'static str,
        key_column: &'static str,
        value_column: &'static str,
        rows: &BTreeMap<String, String>,
    ) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!("DELETE FROM {}", table))
            .execute(&mut *tx)
            .await?;

        let insert = format!(
            "INSERT INTO {} ({}, {}) VALUES (?1, ?2)",
            table, key_column, value_column
        );
        for (key, value) in rows {
            sqlx::query(&insert)
                .bind(key)
                .bind(value)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        debug!(table, rows = rows.len(), "Snapshot replaced");
        Ok(())
    }
}

#[async_trait]
impl Persistence for Database {
    async fn insert_comprehension_if_absent(
        &self,
        record: &ComprehensionRecord,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO comprehension (student_name, concept, score, pain_points, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&record.student)
        .bind(&record.concept)
        .bind(record.score)
        .bind(record.pain_points.join("\n"))
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn upsert_identities(
        &self,
        students: &[String],
        concepts: &[String],
    ) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;
        for student in students {
            sqlx::query("INSERT OR IGNORE INTO students (name) VALUES (?1)")
                .bind(student)
                .execute(&mut *tx)
                .await?;
        }
        for concept in concepts {
            sqlx::query("INSERT OR IGNORE INTO concepts (name) VALUES (?1)")
                .bind(concept)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn replace_knowledge_snapshot(
        &self,
        scores: &ScoreTable,
        groups: &StudyGroups,
    ) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;
        write_student_concepts(&mut tx, scores).await?;
        write_study_groups(&mut tx, groups).await?;
        tx.commit().await?;

        debug!(
            students = scores.len(),
            groups = groups.len(),
            "Knowledge snapshot replaced"
        );
        Ok(())
    }

    async fn replace_lesson_plans(
        &self,
        plans: &BTreeMap<String, String>,
    ) -> Result<(), DatabaseError> {
        self.replace_text_table("lesson_plans", "concept", "plan", plans)
            .await
    }

    async fn replace_homework(
        &self,
        homework: &BTreeMap<String, String>,
    ) -> Result<(), DatabaseError> {
        self.replace_text_table("homework_personalized", "student_name", "homework", homework)
            .await
    }
}

async fn write_student_concepts(
    tx: &mut Transaction<'_, Sqlite>,
    scores: &ScoreTable,
) -> Result<(), DatabaseError> {
    sqlx::query("DELETE FROM student_concepts")
        .execute(&mut **tx)
        .await?;

    for (student, row) in scores {
        for (concept, score) in row {
            sqlx::query(
                "INSERT INTO student_concepts (student_name, concept, awareness_score)
                 VALUES (?1, ?2, ?3)",
            )
            .bind(student)
            .bind(concept)
            .bind(*score)
            .execute(&mut **tx)
            .await?;
        }
    }
    Ok(())
}

async fn write_study_groups(
    tx: &mut Transaction<'_, Sqlite>,
    groups: &StudyGroups,
) -> Result<(), DatabaseError> {
    sqlx::query("DELETE FROM study_groups")
        .execute(&mut **tx)
        .await?;

    for (group_id, members) in groups {
        for student in members {
            sqlx::query("INSERT INTO study_groups (group_id, student_name) VALUES (?1, ?2)")
                .bind(*group_id as i64)
                .bind(student)
                .execute(&mut **tx)
                .await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(student: &str, concept: &str, score: f64, pains: &[&str]) -> ComprehensionRecord {
        ComprehensionRecord {
            student: student.to_string(),
            concept: concept.to_string(),
            score,
            pain_points: pains.iter().map(|p| p.to_string()).collect(),
        }
    }

    fn groups(entries: &[(u32, &[&str])]) -> StudyGroups {
        entries
            .iter()
            .map(|(id, members)| (*id, members.iter().map(|m| m.to_string()).collect()))
            .collect()
    }

    #[tokio::test]
    async fn test_comprehension_insert_is_idempotent() {
        let db = Database::in_memory().await.expect("db");

        let first = record("Aarav", "Recursion", 55.0, &["no base case", "stack depth"]);
        assert!(db.insert_comprehension_if_absent(&first).await.expect("insert"));

        let second = record("Aarav", "Recursion", 95.0, &[]);
        assert!(!db.insert_comprehension_if_absent(&second).await.expect("insert"));

        assert_eq!(db.count_rows("comprehension").await.expect("count"), 1);
        let stored = db
            .get_comprehension("Aarav", "Recursion")
            .await
            .expect("get")
            .expect("row");
        assert_eq!(stored, first);
    }

    fn scores(cells: &[(&str, &str, f64)]) -> ScoreTable {
        let mut table = ScoreTable::new();
        for (student, concept, score) in cells {
            table
                .entry(student.to_string())
                .or_default()
                .insert(concept.to_string(), *score);
        }
        table
    }

    #[tokio::test]
    async fn test_knowledge_snapshot_is_replaced() {
        let db = Database::in_memory().await.expect("db");

        db.replace_knowledge_snapshot(
            &scores(&[("A", "X", 90.0), ("A", "Y", 30.0), ("C", "X", 50.0)]),
            &groups(&[(1, &["A", "B"]), (2, &["C"])]),
        )
        .await
        .expect("replace");

        let smaller = scores(&[("B", "X", 20.0)]);
        db.replace_knowledge_snapshot(&smaller, &groups(&[(1, &["A", "C"]), (2, &["B"])]))
            .await
            .expect("replace");

        assert_eq!(db.student_concepts().await.expect("read"), smaller);
        assert_eq!(db.count_rows("study_groups").await.expect("count"), 3);
        assert_eq!(
            db.study_groups().await.expect("read"),
            groups(&[(1, &["A", "C"]), (2, &["B"])])
        );
    }

    #[tokio::test]
    async fn test_failed_knowledge_snapshot_keeps_previous_tables() {
        let db = Database::in_memory().await.expect("db");
        let before = scores(&[("A", "X", 90.0), ("B", "X", 20.0)]);
        let before_groups = groups(&[(1, &["A", "B"])]);
        db.replace_knowledge_snapshot(&before, &before_groups)
            .await
            .expect("replace");

        // A student listed twice in one group violates UNIQUE(group_id, student_name).
        let err = db
            .replace_knowledge_snapshot(&scores(&[("C", "Y", 10.0)]), &groups(&[(1, &["C", "C"])]))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::QueryFailed(_)));

        assert_eq!(db.student_concepts().await.expect("read"), before);
        assert_eq!(db.study_groups().await.expect("read"), before_groups);
    }

    #[tokio::test]
    async fn test_identities_and_text_snapshots() {
        let db = Database::in_memory().await.expect("db");
        let students = vec!["A".to_string(), "B".to_string()];
        let concepts = vec!["X".to_string()];
        db.upsert_identities(&students, &concepts).await.expect("upsert");
        db.upsert_identities(&students, &concepts).await.expect("upsert");
        assert_eq!(db.count_rows("students").await.expect("count"), 2);
        assert_eq!(db.count_rows("concepts").await.expect("count"), 1);

        let mut plans = BTreeMap::new();
        plans.insert("X".to_string(), "plan one".to_string());
        plans.insert("Y".to_string(), "plan two".to_string());
        db.replace_lesson_plans(&plans).await.expect("replace");
        db.replace_lesson_plans(&BTreeMap::new()).await.expect("replace");
        assert_eq!(db.count_rows("lesson_plans").await.expect("count"), 0);

        let mut homework = BTreeMap::new();
        homework.insert("A".to_string(), "practice".to_string());
        db.replace_homework(&homework).await.expect("replace");
        assert_eq!(db.count_rows("homework_personalized").await.expect("count"), 1);
    }

    #[tokio::test]
    async fn test_count_rows_rejects_unknown_table() {
        let db = Database::in_memory().await.expect("db");
        let err = db.count_rows("sqlite_master; DROP TABLE x").await.unwrap_err();
        assert!(matches!(err, DatabaseError::UnknownTable(_)));
    }

    #[tokio::test]
    async fn test_connect_creates_file() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let path = dir.path().join("results.db");
        let url = format!("sqlite://{}", path.display());

        let db = Database::connect(&url).await.expect("connect");
        db.insert_comprehension_if_absent(&record("A", "X", 10.0, &[]))
            .await
            .expect("insert");
        assert!(path.exists());
    }
}
