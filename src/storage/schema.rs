//! SQLite schema for pipeline results.
//!
//! `comprehension` is an append-only audit log keyed by (student, concept).
//! The `student_concepts`, `study_groups`, `lesson_plans` and
//! `homework_personalized` tables are snapshots, fully replaced every run.

/// Known students.
pub const CREATE_STUDENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS students (
    name TEXT PRIMARY KEY
)
"#;

/// Known concepts.
pub const CREATE_CONCEPTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS concepts (
    name TEXT PRIMARY KEY
)
"#;

/// Per-cell grader results. First write wins.
pub const CREATE_COMPREHENSION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS comprehension (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    student_name TEXT    NOT NULL,
    concept      TEXT    NOT NULL,
    score        REAL    NOT NULL,
    pain_points  TEXT    NOT NULL DEFAULT '',
    created_at   TEXT    NOT NULL,
    UNIQUE (student_name, concept)
)
"#;

/// Awareness snapshot: every scored (student, concept) cell of the latest run.
pub const CREATE_STUDENT_CONCEPTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS student_concepts (
    student_name    TEXT NOT NULL,
    concept         TEXT NOT NULL,
    awareness_score REAL NOT NULL,
    PRIMARY KEY (student_name, concept)
)
"#;

/// Study group snapshot.
pub const CREATE_STUDY_GROUPS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS study_groups (
    group_id     INTEGER NOT NULL,
    student_name TEXT    NOT NULL,
    UNIQUE (group_id, student_name)
)
"#;

/// Lesson plan snapshot, one row per weak concept.
pub const CREATE_LESSON_PLANS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS lesson_plans (
    concept TEXT PRIMARY KEY,
    plan    TEXT NOT NULL
)
"#;

/// Homework snapshot, one row per student.
pub const CREATE_HOMEWORK_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS homework_personalized (
    student_name TEXT PRIMARY KEY,
    homework     TEXT NOT NULL
)
"#;

pub const CREATE_COMPREHENSION_STUDENT_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_comprehension_student ON comprehension(student_name)";

/// Statements applied in order when a database is opened.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_STUDENTS_TABLE,
    CREATE_CONCEPTS_TABLE,
    CREATE_COMPREHENSION_TABLE,
    CREATE_COMPREHENSION_STUDENT_INDEX,
    CREATE_STUDENT_CONCEPTS_TABLE,
    CREATE_STUDY_GROUPS_TABLE,
    CREATE_LESSON_PLANS_TABLE,
    CREATE_HOMEWORK_TABLE,
];
