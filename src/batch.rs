//! Batch analysis across files
//!
//! Per-file analysis is a pure function of the file text and the read-only
//! [`Analyzer`], so a batch fans out over a rayon pool with no locking. Each
//! file runs under a wall-clock budget on its own worker thread; a file that
//! blows the budget is reported with the dedicated `timeout` record and
//! never with partial results. One bad file, unreadable or unparseable,
//! never stops the rest of the batch.

use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use crate::analyzer::{timed_out_result, AnalysisResult, Analyzer};
use crate::diagnostics::{Diagnostic, Guard, Severity};

/// Outcome for one file in a batch.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub timed_out: bool,
    #[serde(flatten)]
    pub result: AnalysisResult,
}

/// Expand files and directories into the sorted list of `.py` files to
/// analyze, skipping configured directory names.
pub fn discover(paths: &[PathBuf], ignore_dirs: &[String]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_file() {
            files.push(path.clone());
            continue;
        }
        let walk = walkdir::WalkDir::new(path)
            .into_iter()
            .filter_entry(|entry| {
                !(entry.file_type().is_dir() && is_ignored(entry.path(), ignore_dirs))
            });
        for entry in walk {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("skipping unreadable path: {e}");
                    continue;
                }
            };
            if entry.file_type().is_file()
                && entry.path().extension().is_some_and(|ext| ext == "py")
            {
                files.push(entry.into_path());
            }
        }
    }
    files.sort();
    files.dedup();
    files
}

fn is_ignored(path: &Path, ignore_dirs: &[String]) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| ignore_dirs.iter().any(|dir| dir == name))
        .unwrap_or(false)
}

/// Analyze a batch of files in parallel. Always returns one report per input
/// file, in input order.
pub fn analyze_files(analyzer: &Arc<Analyzer>, files: &[PathBuf]) -> Vec<FileReport> {
    files
        .par_iter()
        .map(|path| analyze_one(Arc::clone(analyzer), path))
        .collect()
}

fn analyze_one(analyzer: Arc<Analyzer>, path: &Path) -> FileReport {
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            // Unreadable or non-UTF-8 input is an unparseable file.
            return FileReport {
                path: path.to_path_buf(),
                timed_out: false,
                result: AnalysisResult {
                    diagnostics: vec![Diagnostic::new(
                        Guard::Parse,
                        Severity::Critical,
                        1,
                        format!("file could not be read: {e}"),
                    )],
                    parse_error: Some(e.to_string()),
                },
            };
        }
    };

    let budget = analyzer.timeout();
    match run_with_timeout(analyzer, source, budget) {
        Some(result) => FileReport {
            path: path.to_path_buf(),
            timed_out: false,
            result,
        },
        None => FileReport {
            path: path.to_path_buf(),
            timed_out: true,
            result: timed_out_result(budget),
        },
    }
}

/// Run one file's analysis under a wall-clock budget. A budget of zero
/// disables the limit. The worker thread is detached on timeout; analysis is
/// CPU-bound and side-effect free, so an abandoned worker finishes (or keeps
/// spinning on a pathological input) without affecting any report.
pub(crate) fn run_with_timeout(
    analyzer: Arc<Analyzer>,
    source: String,
    budget: Duration,
) -> Option<AnalysisResult> {
    if budget.is_zero() {
        return Some(analyzer.analyze(&source));
    }
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let _ = tx.send(analyzer.analyze(&source));
    });
    rx.recv_timeout(budget).ok()
}
