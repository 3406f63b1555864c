//! CLI command definitions for comprende.
//!
//! `run` executes the full pipeline against directories of homework and
//! lesson material. `groups` recomputes awareness, study groups and weak
//! concepts from a saved scores file without calling any model.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing::info;

use crate::generation::LlmContentGenerator;
use crate::knowledge::{AwarenessGraph, ScoreTable, StudyGroupBuilder, StudyGroups, WeakConceptSelector};
use crate::llm::{ChatClient, LlmProvider, DEFAULT_API_BASE};
use crate::pipeline::{parse_list, Collaborators, PipelineConfig, PipelineOrchestrator, PipelineOutput};
use crate::retrieval::{load_homework_dir, load_lessons_dir, IndexRetriever, LocalVectorIndex};
use crate::scoring::LlmScorer;
use crate::storage::Database;

/// Default directory of per-student homework submissions.
const DEFAULT_HOMEWORK_DIR: &str = "./data/homework";

/// Default directory of lesson material.
const DEFAULT_LESSONS_DIR: &str = "./data/lessons";

/// Student comprehension diagnostics, study groups and remedial content.
#[derive(Parser)]
#[command(name = "comprende")]
#[command(about = "Score student comprehension and plan study groups, lessons and homework")]
#[command(version)]
#[command(
    long_about = "comprende scores each student's comprehension of each concept from their homework, then builds reports, study groups, lesson plans and personalized homework.\n\nExample usage:\n  comprende run --students Aarav,Bhavana --concepts Recursion,Graphs --homework-dir ./data/homework --lessons-dir ./data/lessons --output run.json"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Run the full pipeline.
    Run(RunArgs),

    /// Form study groups and weak concepts from a saved scores file.
    Groups(GroupsArgs),
}

/// Arguments for `comprende run`.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Comma-separated student names. Defaults to COMPRENDE_STUDENTS.
    #[arg(long)]
    pub students: Option<String>,

    /// Comma-separated concepts. Defaults to COMPRENDE_CONCEPTS.
    #[arg(long)]
    pub concepts: Option<String>,

    /// Directory with one sub-directory of .txt/.md files per student.
    #[arg(long, default_value = DEFAULT_HOMEWORK_DIR)]
    pub homework_dir: PathBuf,

    /// Directory of lesson material (.txt/.md).
    #[arg(long, default_value = DEFAULT_LESSONS_DIR)]
    pub lessons_dir: PathBuf,

    /// SQLite URL for results.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Chat model used for scoring and generation.
    #[arg(short = 'm', long)]
    pub model: Option<String>,

    /// API key (default: from COMPRENDE_API_KEY or OPENAI_API_KEY env var).
    #[arg(long)]
    pub api_key: Option<String>,

    /// OpenAI-compatible API base URL.
    #[arg(long)]
    pub api_base: Option<String>,

    /// Target study group size.
    #[arg(long)]
    pub group_size: Option<usize>,

    /// Score at or above which a student is aware of a concept.
    #[arg(long)]
    pub awareness_threshold: Option<f64>,

    /// Cohort median below which a concept gets a lesson plan.
    #[arg(long)]
    pub mastery_threshold: Option<f64>,

    /// Number of cells scored concurrently.
    #[arg(short = 'j', long)]
    pub max_concurrent: Option<usize>,

    /// Write the completed run as pretty JSON to this path.
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,
}

/// Arguments for `comprende groups`.
#[derive(Parser, Debug)]
pub struct GroupsArgs {
    /// JSON file mapping student -> concept -> score.
    #[arg(long)]
    pub scores: PathBuf,

    /// Comma-separated students. Defaults to the students in the file.
    #[arg(long)]
    pub students: Option<String>,

    /// Comma-separated concepts. Defaults to every concept in the file.
    #[arg(long)]
    pub concepts: Option<String>,

    /// Target study group size.
    #[arg(long, default_value = "2")]
    pub group_size: usize,

    /// Score at or above which a student is aware of a concept.
    #[arg(long, default_value = "70")]
    pub awareness_threshold: f64,

    /// Cohort median below which a concept is weak.
    #[arg(long, default_value = "70")]
    pub mastery_threshold: f64,

    /// Print the result as JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => run_pipeline_command(args).await,
        Commands::Groups(args) => run_groups_command(args),
    }
}

// ============================================================================
// run
// ============================================================================

/// Applies CLI overrides on top of the environment configuration.
fn build_config(args: &RunArgs) -> anyhow::Result<PipelineConfig> {
    let mut config = PipelineConfig::from_env()?;

    if let Some(students) = &args.students {
        config.students = parse_list(students);
    }
    if let Some(concepts) = &args.concepts {
        config.concepts = parse_list(concepts);
    }
    if let Some(url) = &args.database_url {
        config.database_url = url.clone();
    }
    if let Some(model) = &args.model {
        config.model = model.clone();
    }
    if let Some(size) = args.group_size {
        config.target_group_size = size;
    }
    if let Some(threshold) = args.awareness_threshold {
        config.awareness_threshold = threshold;
    }
    if let Some(threshold) = args.mastery_threshold {
        config.mastery_threshold = threshold;
    }
    if let Some(max) = args.max_concurrent {
        config.max_concurrent_evaluations = max;
    }

    config.validate()?;
    Ok(config)
}

fn build_llm_client(
    api_key: Option<String>,
    api_base: Option<String>,
    model: &str,
) -> anyhow::Result<Arc<dyn LlmProvider>> {
    let client = match (api_key, api_base) {
        (None, None) => {
            info!("Using chat client from environment");
            ChatClient::from_env().map_err(|e| {
                anyhow::anyhow!(
                    "Failed to initialize LLM client: {}. Please provide --api-key or set COMPRENDE_API_KEY/OPENAI_API_KEY env var.",
                    e
                )
            })?
        }
        (key, base) => {
            let key = key
                .or_else(|| std::env::var("COMPRENDE_API_KEY").ok())
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
            let base = base.unwrap_or_else(|| DEFAULT_API_BASE.to_string());
            info!(api_base = %base, model = %model, "Using chat client with explicit settings");
            ChatClient::new(base, key, model)?
        }
    };
    Ok(Arc::new(client))
}

fn build_retriever(args: &RunArgs, config: &PipelineConfig) -> anyhow::Result<IndexRetriever> {
    let homework_docs = load_homework_dir(&args.homework_dir).with_context(|| {
        format!("Failed to load homework from {}", args.homework_dir.display())
    })?;
    let lesson_docs = load_lessons_dir(&args.lessons_dir)
        .with_context(|| format!("Failed to load lessons from {}", args.lessons_dir.display()))?;

    let mut homework = LocalVectorIndex::new("homework");
    homework.add_documents(homework_docs);
    let mut lessons = LocalVectorIndex::new("lessons");
    lessons.add_documents(lesson_docs);
    info!(
        homework_chunks = homework.len(),
        lesson_chunks = lessons.len(),
        "Indexes built"
    );

    Ok(
        IndexRetriever::new(Arc::new(homework), Arc::new(lessons)).with_search_bounds(
            config.retrieval.filtered_search,
            config.retrieval.broadened_search,
        ),
    )
}

async fn run_pipeline_command(args: RunArgs) -> anyhow::Result<()> {
    let config = build_config(&args)?;
    let retriever = build_retriever(&args, &config)?;

    let llm = build_llm_client(args.api_key.clone(), args.api_base.clone(), &config.model)?;
    let scorer = LlmScorer::new(llm.clone())
        .with_model(config.model.clone())
        .with_temperature(config.temperature)
        .with_snippet_chars(config.snippets.evidence_chars);
    let generator = LlmContentGenerator::new(llm)
        .with_model(config.model.clone())
        .with_temperature(config.temperature);

    let database = Database::connect(&config.database_url)
        .await
        .with_context(|| format!("Failed to open database {}", config.database_url))?;

    let awareness_threshold = config.awareness_threshold;
    let collaborators = Collaborators {
        retriever: Arc::new(retriever),
        scorer: Arc::new(scorer),
        generator: Arc::new(generator),
        persistence: Arc::new(database),
    };
    let output = PipelineOrchestrator::new(config, collaborators)?.run().await?;

    if let Some(path) = &args.output {
        write_json(path, &output)?;
        info!(path = %path.display(), "Run written");
    }

    print_run_summary(&output, awareness_threshold);
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| anyhow::anyhow!("Failed to serialize output JSON: {}", e))?;
    fs::write(path, json)?;
    Ok(())
}

fn print_run_summary(output: &PipelineOutput, awareness_threshold: f64) {
    println!();
    println!("============================================================");
    println!("  Run {}", output.run_id);
    println!("============================================================");

    println!("\nReports:");
    for (student, report) in &output.reports {
        println!("\n--- {} ---\n{}", student, report);
    }

    let graph = AwarenessGraph::new(
        &output.scores,
        &output.students,
        &output.concepts,
        awareness_threshold,
    );
    print_edges(&graph);
    print_groups(&output.groups);

    println!("\nLesson plans:");
    if output.lesson_plans.is_empty() {
        println!("  (no concept below the mastery threshold)");
    }
    for (concept, plan) in &output.lesson_plans {
        println!("\n--- {} ---\n{}", concept, plan);
    }

    println!("\nHomework:");
    for (student, homework) in &output.homework {
        println!("\n--- {} ---\n{}", student, homework);
    }

    println!("\nStage timings:");
    for timing in &output.timings {
        println!("  {:<28} {:>8} ms", timing.stage.as_str(), timing.millis);
    }
}

fn print_edges(graph: &AwarenessGraph<'_>) {
    let edges = graph.edges();
    println!(
        "\nAwareness edges (score >= {}): {}",
        graph.threshold(),
        edges.len()
    );
    for (student, concept) in edges {
        println!("  {} -> {}", student, concept);
    }
}

fn print_groups(groups: &StudyGroups) {
    println!("\nStudy groups:");
    for (id, members) in groups {
        println!("  Group {}: {}", id, members.join(", "));
    }
}

// ============================================================================
// groups
// ============================================================================

#[derive(Debug, Serialize)]
struct GroupsReport<'a> {
    students: &'a [String],
    concepts: &'a [String],
    awareness_edges: Vec<(&'a str, &'a str)>,
    groups: StudyGroups,
    weak_concepts: Vec<String>,
}

fn load_scores(path: &Path) -> anyhow::Result<ScoreTable> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read scores file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Scores file {} is not a student -> concept -> score map", path.display()))
}

/// Students and concepts from the flags, else every name in `scores`.
fn cohort_from_scores(
    scores: &ScoreTable,
    students: Option<&str>,
    concepts: Option<&str>,
) -> (Vec<String>, Vec<String>) {
    let students = students
        .map(parse_list)
        .unwrap_or_else(|| scores.keys().cloned().collect());
    let concepts = concepts.map(parse_list).unwrap_or_else(|| {
        scores
            .values()
            .flat_map(|row| row.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    });
    (students, concepts)
}

fn run_groups_command(args: GroupsArgs) -> anyhow::Result<()> {
    let scores = load_scores(&args.scores)?;
    let (students, concepts) =
        cohort_from_scores(&scores, args.students.as_deref(), args.concepts.as_deref());

    // Same cohort and threshold rules as the pipeline.
    PipelineConfig::new()
        .with_students(students.iter().cloned())
        .with_concepts(concepts.iter().cloned())
        .with_target_group_size(args.group_size)
        .with_awareness_threshold(args.awareness_threshold)
        .with_mastery_threshold(args.mastery_threshold)
        .validate()
        .with_context(|| format!("Invalid groups input from {}", args.scores.display()))?;

    let graph = AwarenessGraph::new(&scores, &students, &concepts, args.awareness_threshold);
    let groups = StudyGroupBuilder::new(args.group_size)
        .with_awareness_threshold(args.awareness_threshold)
        .build(&scores, &students, &concepts);
    let weak_concepts =
        WeakConceptSelector::new(args.mastery_threshold).select(&scores, &students, &concepts);

    if args.json {
        let report = GroupsReport {
            students: &students,
            concepts: &concepts,
            awareness_edges: graph.edges(),
            groups,
            weak_concepts,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_edges(&graph);
    print_groups(&groups);
    println!("\nWeak concepts (median < {}):", args.mastery_threshold);
    if weak_concepts.is_empty() {
        println!("  (none)");
    }
    for concept in &weak_concepts {
        println!("  {}", concept);
    }
    Ok(())
}
