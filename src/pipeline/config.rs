//! Pipeline configuration.
//!
//! Covers the cohort (students and concepts), the thresholds used by the
//! knowledge stages, retrieval bounds per call site, snippet limits, LLM
//! options and the results database.

use thiserror::Error;

use crate::llm::DEFAULT_MODEL;

/// Students used when none are configured.
pub const DEFAULT_STUDENTS: &str = "Aarav,Bhavana,Chitra,Dev";

/// Concepts used when none are configured.
pub const DEFAULT_CONCEPTS: &str = "Binary Search,Recursion,Dynamic Programming,Graph Traversal";

/// Database used when none is configured.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://comprende.db";

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Result-count bounds for each retrieval call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalBounds {
    /// Evidence snippets passed to the scorer per (student, concept).
    pub evidence: usize,
    /// Candidates requested from a student-filtered search.
    pub filtered_search: usize,
    /// Candidates requested when the index cannot filter and results are
    /// post-filtered by student.
    pub broadened_search: usize,
    /// Lesson snippets per weak concept for lesson plans.
    pub lesson_context: usize,
    /// Lesson snippets per weak concept for homework.
    pub homework_context: usize,
}

impl Default for RetrievalBounds {
    fn default() -> Self {
        Self {
            evidence: 6,
            filtered_search: 16,
            broadened_search: 32,
            lesson_context: 6,
            homework_context: 3,
        }
    }
}

/// Per-snippet character limits in generated prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnippetLimits {
    pub evidence_chars: usize,
    pub lesson_chars: usize,
    pub homework_chars: usize,
}

impl Default for SnippetLimits {
    fn default() -> Self {
        Self {
            evidence_chars: 600,
            lesson_chars: 600,
            homework_chars: 400,
        }
    }
}

/// Configuration for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    // Cohort
    /// Student identifiers, unique, in input order.
    pub students: Vec<String>,
    /// Concept identifiers, unique, in input order.
    pub concepts: Vec<String>,

    // Thresholds
    /// Score at or above which a student is aware of a concept.
    pub awareness_threshold: f64,
    /// Cohort median below which a concept gets a lesson plan.
    pub mastery_threshold: f64,
    /// Score below which a concept goes into a student's homework.
    pub homework_threshold: f64,
    /// Desired study group size.
    pub target_group_size: usize,

    // Retrieval
    pub retrieval: RetrievalBounds,
    pub snippets: SnippetLimits,

    // Execution
    /// Scorer calls allowed in flight. 1 evaluates cells sequentially.
    pub max_concurrent_evaluations: usize,

    // LLM settings
    pub model: String,
    pub temperature: f64,

    // Storage
    /// SQLite URL for results.
    pub database_url: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            students: parse_list(DEFAULT_STUDENTS),
            concepts: parse_list(DEFAULT_CONCEPTS),
            awareness_threshold: 70.0,
            mastery_threshold: 70.0,
            homework_threshold: 70.0,
            target_group_size: 2,
            retrieval: RetrievalBounds::default(),
            snippets: SnippetLimits::default(),
            max_concurrent_evaluations: 1,
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.2,
            database_url: DEFAULT_DATABASE_URL.to_string(),
        }
    }
}

impl PipelineConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `COMPRENDE_STUDENTS`: Comma-separated students
    /// - `COMPRENDE_CONCEPTS`: Comma-separated concepts
    /// - `COMPRENDE_AWARENESS_THRESHOLD`: Awareness threshold (default: 70)
    /// - `COMPRENDE_MASTERY_THRESHOLD`: Cohort mastery threshold (default: 70)
    /// - `COMPRENDE_HOMEWORK_THRESHOLD`: Per-student homework threshold (default: 70)
    /// - `COMPRENDE_GROUP_SIZE`: Target study group size (default: 2)
    /// - `COMPRENDE_EVIDENCE_K`: Evidence snippets per cell (default: 6)
    /// - `COMPRENDE_MAX_CONCURRENT`: Concurrent scorer calls (default: 1)
    /// - `COMPRENDE_MODEL`: Chat model (default: gpt-4o-mini)
    /// - `COMPRENDE_TEMPERATURE`: Sampling temperature (default: 0.2)
    /// - `DATABASE_URL`: SQLite URL (default: sqlite://comprende.db)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable has an invalid value or the
    /// resulting configuration fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("COMPRENDE_STUDENTS") {
            config.students = parse_list(&val);
        }

        if let Ok(val) = std::env::var("COMPRENDE_CONCEPTS") {
            config.concepts = parse_list(&val);
        }

        if let Ok(val) = std::env::var("COMPRENDE_AWARENESS_THRESHOLD") {
            config.awareness_threshold = parse_env_value(&val, "COMPRENDE_AWARENESS_THRESHOLD")?;
        }

        if let Ok(val) = std::env::var("COMPRENDE_MASTERY_THRESHOLD") {
            config.mastery_threshold = parse_env_value(&val, "COMPRENDE_MASTERY_THRESHOLD")?;
        }

        if let Ok(val) = std::env::var("COMPRENDE_HOMEWORK_THRESHOLD") {
            config.homework_threshold = parse_env_value(&val, "COMPRENDE_HOMEWORK_THRESHOLD")?;
        }

        if let Ok(val) = std::env::var("COMPRENDE_GROUP_SIZE") {
            config.target_group_size = parse_env_value(&val, "COMPRENDE_GROUP_SIZE")?;
        }

        if let Ok(val) = std::env::var("COMPRENDE_EVIDENCE_K") {
            config.retrieval.evidence = parse_env_value(&val, "COMPRENDE_EVIDENCE_K")?;
        }

        if let Ok(val) = std::env::var("COMPRENDE_MAX_CONCURRENT") {
            config.max_concurrent_evaluations = parse_env_value(&val, "COMPRENDE_MAX_CONCURRENT")?;
        }

        if let Ok(val) = std::env::var("COMPRENDE_MODEL") {
            config.model = val;
        }

        if let Ok(val) = std::env::var("COMPRENDE_TEMPERATURE") {
            config.temperature = parse_env_value(&val, "COMPRENDE_TEMPERATURE")?;
        }

        if let Ok(val) = std::env::var("DATABASE_URL") {
            config.database_url = val;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Cohort validation
        validate_identifiers("students", &self.students)?;
        validate_identifiers("concepts", &self.concepts)?;

        // Threshold validation
        for (name, value) in [
            ("awareness_threshold", self.awareness_threshold),
            ("mastery_threshold", self.mastery_threshold),
            ("homework_threshold", self.homework_threshold),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(ConfigError::ValidationFailed(format!(
                    "{} must be between 0 and 100",
                    name
                )));
            }
        }

        if self.target_group_size == 0 {
            return Err(ConfigError::ValidationFailed(
                "target_group_size must be greater than 0".to_string(),
            ));
        }

        // Retrieval validation
        let bounds = &self.retrieval;
        for (name, value) in [
            ("retrieval.evidence", bounds.evidence),
            ("retrieval.filtered_search", bounds.filtered_search),
            ("retrieval.broadened_search", bounds.broadened_search),
            ("retrieval.lesson_context", bounds.lesson_context),
            ("retrieval.homework_context", bounds.homework_context),
        ] {
            if value == 0 {
                return Err(ConfigError::ValidationFailed(format!(
                    "{} must be greater than 0",
                    name
                )));
            }
        }

        if self.max_concurrent_evaluations == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_concurrent_evaluations must be greater than 0".to_string(),
            ));
        }

        // LLM validation
        if self.model.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "model cannot be empty".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationFailed(
                "temperature must be between 0.0 and 2.0".to_string(),
            ));
        }

        // Storage validation
        if self.database_url.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "database_url cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    // Builder methods

    /// Sets the students.
    pub fn with_students<I, S>(mut self, students: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.students = students.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the concepts.
    pub fn with_concepts<I, S>(mut self, concepts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.concepts = concepts.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the awareness threshold.
    pub fn with_awareness_threshold(mut self, threshold: f64) -> Self {
        self.awareness_threshold = threshold;
        self
    }

    /// Sets the cohort mastery threshold.
    pub fn with_mastery_threshold(mut self, threshold: f64) -> Self {
        self.mastery_threshold = threshold;
        self
    }

    /// Sets the per-student homework threshold.
    pub fn with_homework_threshold(mut self, threshold: f64) -> Self {
        self.homework_threshold = threshold;
        self
    }

    /// Sets the target study group size.
    pub fn with_target_group_size(mut self, size: usize) -> Self {
        self.target_group_size = size;
        self
    }

    /// Sets the retrieval bounds.
    pub fn with_retrieval_bounds(mut self, bounds: RetrievalBounds) -> Self {
        self.retrieval = bounds;
        self
    }

    /// Sets the snippet limits.
    pub fn with_snippet_limits(mut self, limits: SnippetLimits) -> Self {
        self.snippets = limits;
        self
    }

    /// Sets the number of concurrent scorer calls.
    pub fn with_max_concurrent_evaluations(mut self, max: usize) -> Self {
        self.max_concurrent_evaluations = max;
        self
    }

    /// Sets the chat model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the temperature.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sets the database URL.
    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = url.into();
        self
    }
}

/// Splits a comma-separated list, trimming items and dropping empties.
pub fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn validate_identifiers(name: &str, values: &[String]) -> Result<(), ConfigError> {
    if values.is_empty() {
        return Err(ConfigError::ValidationFailed(format!(
            "{} cannot be empty",
            name
        )));
    }

    let mut seen = std::collections::HashSet::new();
    for value in values {
        if !seen.insert(value.as_str()) {
            return Err(ConfigError::ValidationFailed(format!(
                "{} contains duplicate '{}'",
                name, value
            )));
        }
    }
    Ok(())
}

/// Parse an environment variable value.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}
