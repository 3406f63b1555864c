//! Directory ingestion and chunking.
//!
//! Homework lives under `<root>/<student>/...`; the first path component
//! below the root names the owning student. Lesson material lives anywhere
//! under its root and is tagged with the `LESSON` owner.

use std::fs;
use std::path::Path;

use tracing::{debug, warn};
use walkdir::WalkDir;

use super::index::{Document, LESSON_OWNER, SOURCE_FILE_KEY, STUDENT_NAME_KEY};
use crate::error::RetrievalError;

/// Maximum characters per chunk.
pub const CHUNK_SIZE: usize = 1000;
/// Characters shared between consecutive chunks.
pub const CHUNK_OVERLAP: usize = 150;

const INGESTIBLE_EXTENSIONS: &[&str] = &["txt", "md"];

/// Splits `text` into overlapping chunks of at most `chunk_size` characters,
/// preferring to break on whitespace in the second half of a window.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chunk_size = chunk_size.max(1);
    let overlap = overlap.min(chunk_size / 2);
    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let mut end = (start + chunk_size).min(chars.len());
        if end < chars.len() {
            let floor = start + chunk_size / 2;
            if let Some(pos) = (floor..end).rev().find(|&i| chars[i].is_whitespace()) {
                end = pos + 1;
            }
        }

        let chunk: String = chars[start..end].iter().collect();
        let chunk = chunk.trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }

        if end == chars.len() {
            break;
        }
        start = end.saturating_sub(overlap).max(start + 1);
    }

    chunks
}

fn is_ingestible(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| INGESTIBLE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn read_file(path: &Path) -> Result<String, RetrievalError> {
    fs::read_to_string(path).map_err(|e| RetrievalError::IngestionFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

fn chunk_documents(text: &str, owner: &str, source_file: &str) -> Vec<Document> {
    chunk_text(text, CHUNK_SIZE, CHUNK_OVERLAP)
        .into_iter()
        .map(|chunk| {
            Document::new(chunk)
                .with_metadata(STUDENT_NAME_KEY, owner)
                .with_metadata(SOURCE_FILE_KEY, source_file)
        })
        .collect()
}

/// Walks `root` and yields `(relative path, absolute path)` for ingestible files,
/// in file-name order.
fn ingestible_files(
    root: &Path,
) -> Result<Vec<(std::path::PathBuf, std::path::PathBuf)>, RetrievalError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| RetrievalError::IngestionFailed {
            path: root.display().to_string(),
            reason: e.to_string(),
        })?;
        if !entry.file_type().is_file() || !is_ingestible(entry.path()) {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_path_buf();
        files.push((relative, entry.path().to_path_buf()));
    }
    Ok(files)
}

/// Loads homework chunks from `<root>/<student>/**/*.{txt,md}`.
pub fn load_homework_dir(root: &Path) -> Result<Vec<Document>, RetrievalError> {
    let mut documents = Vec::new();

    for (relative, path) in ingestible_files(root)? {
        let mut components = relative.components();
        let student = components
            .next()
            .map(|c| c.as_os_str().to_string_lossy().to_string());
        let student = match (student, components.next()) {
            (Some(student), Some(_)) => student,
            _ => {
                warn!(path = %path.display(), "Homework file is not inside a student directory, skipping");
                continue;
            }
        };

        let source_file = file_label(&path);
        let chunks = chunk_documents(&read_file(&path)?, &student, &source_file);
        debug!(student = %student, file = %source_file, chunks = chunks.len(), "Ingested homework file");
        documents.extend(chunks);
    }

    Ok(documents)
}

/// Loads lesson chunks from every `.txt`/`.md` file under `root`.
pub fn load_lessons_dir(root: &Path) -> Result<Vec<Document>, RetrievalError> {
    let mut documents = Vec::new();

    for (_, path) in ingestible_files(root)? {
        let source_file = file_label(&path);
        let chunks = chunk_documents(&read_file(&path)?, LESSON_OWNER, &source_file);
        debug!(file = %source_file, chunks = chunks.len(), "Ingested lesson file");
        documents.extend(chunks);
    }

    Ok(documents)
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_short_text_is_single_chunk() {
        assert_eq!(chunk_text("  base case  ", 1000, 150), vec!["base case"]);
        assert!(chunk_text("   ", 1000, 150).is_empty());
    }

    #[test]
    fn test_chunks_are_bounded_and_overlap() {
        let text = "word ".repeat(600);
        let chunks = chunk_text(&text, 1000, 150);
        assert!(chunks.len() >= 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 1000));

        let covered: usize = chunks.iter().map(|c| c.chars().count()).sum();
        assert!(covered > text.trim().chars().count());
    }

    #[test]
    fn test_chunking_without_whitespace() {
        let text = "x".repeat(2500);
        let chunks = chunk_text(&text, 1000, 150);
        assert_eq!(chunks[0].len(), 1000);
        assert_eq!(chunks[1].len(), 1000);
        assert_eq!(chunks.last().map(String::len), Some(2500 - 2 * 850));
    }

    #[test]
    fn test_load_homework_dir() {
        let dir = TempDir::new().expect("tempdir");
        let aarav = dir.path().join("Aarav");
        fs::create_dir_all(aarav.join("week1")).expect("mkdir");
        fs::write(aarav.join("hw1.txt"), "Recursion needs a base case.").expect("write");
        fs::write(aarav.join("week1").join("notes.md"), "Binary search halves.").expect("write");
        fs::write(aarav.join("scan.pdf"), "binary").expect("write");
        fs::write(dir.path().join("stray.txt"), "no owner").expect("write");

        let docs = load_homework_dir(dir.path()).expect("load");
        assert_eq!(docs.len(), 2);
        assert!(docs.iter().all(|d| d.student_name() == Some("Aarav")));
        let labels: Vec<&str> = docs.iter().map(|d| d.source_label()).collect();
        assert!(labels.contains(&"hw1.txt"));
        assert!(labels.contains(&"notes.md"));
    }

    #[test]
    fn test_load_lessons_dir() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join("dp.md"), "Memoize overlapping subproblems.").expect("write");

        let docs = load_lessons_dir(dir.path()).expect("load");
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].student_name(), Some(LESSON_OWNER));
        assert_eq!(docs[0].source_label(), "dp.md");
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let err = load_lessons_dir(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, RetrievalError::IngestionFailed { .. }));
    }
}
