use std::fs;
use std::path::{Path, PathBuf};

use cover_core::error::AppError;
use tracing::{debug, info};

use crate::graph::ChunkRecord;

pub const MAX_CHUNK_CHARS: usize = 1600;

const TEXT_EXTENSIONS: [&str; 3] = ["txt", "md", "markdown"];

/// Loads every text document under `dir` (recursively, in path order) and splits each into
/// paragraph-aligned chunks. The chunk source is the file path.
pub fn load_text_dir(dir: &Path) -> Result<Vec<ChunkRecord>, AppError> {
    let mut files = Vec::new();
    collect_text_files(dir, &mut files)?;
    files.sort();

    let mut out = Vec::new();
    for path in files {
        let text = fs::read_to_string(&path).map_err(|e| {
            AppError::new("INGEST_CORPUS_READ_FAILED", "Failed to read corpus document")
                .with_details(format!("path={}; err={}", path.display(), e))
        })?;
        let source = path.display().to_string();
        let chunks = chunk_text_by_paragraphs(&text, MAX_CHUNK_CHARS);
        debug!(source = %source, chunks = chunks.len(), "chunked document");
        out.extend(chunks.into_iter().map(|content| ChunkRecord {
            source: source.clone(),
            content,
        }));
    }
    info!(dir = %dir.display(), chunks = out.len(), "corpus loaded");
    Ok(out)
}

fn collect_text_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), AppError> {
    let entries = fs::read_dir(dir).map_err(|e| {
        AppError::new("INGEST_CORPUS_READ_FAILED", "Failed to list corpus directory")
            .with_details(format!("path={}; err={}", dir.display(), e))
    })?;
    for entry in entries {
        let path = entry
            .map_err(|e| {
                AppError::new("INGEST_CORPUS_READ_FAILED", "Failed to list corpus directory")
                    .with_details(format!("path={}; err={}", dir.display(), e))
            })?
            .path();
        if path.is_dir() {
            collect_text_files(&path, out)?;
        } else if path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| TEXT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        {
            out.push(path);
        }
    }
    Ok(())
}

/// Greedy paragraph packing: paragraphs are joined with a blank line until the next one
/// would push the chunk past `max_chars`. A single oversized paragraph stays whole.
pub fn chunk_text_by_paragraphs(text: &str, max_chars: usize) -> Vec<String> {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    let paras = normalized
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty());

    let mut out = Vec::new();
    let mut buf = String::new();
    for p in paras {
        let add_len = if buf.is_empty() { p.chars().count() } else { 2 + p.chars().count() };
        if !buf.is_empty() && buf.chars().count() + add_len > max_chars {
            out.push(std::mem::take(&mut buf));
        }
        if !buf.is_empty() {
            buf.push_str("\n\n");
        }
        buf.push_str(p);
    }
    if !buf.trim().is_empty() {
        out.push(buf);
    }
    out
}
