//! Turning a ready export into local files.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::error::{ExportError, Result};
use crate::reply::ExportStatus;
use crate::transport::{Transport, ensure_dir, partial_path};
use crate::util::{relative_file_path, urljoin};

pub const DEFAULT_WORKERS: usize = 5;

/// One staged file and where it should land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub url: String,
    pub dest: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Downloaded { bytes: u64 },
    /// The destination already existed.
    Skipped,
}

#[derive(Debug)]
pub struct TaskResult {
    pub task: DownloadTask,
    pub outcome: Result<FetchOutcome>,
}

/// Maps every staged filename to `<base><dir>/<filename>` and `<out_dir>/<filename>`.
pub fn build_download_tasks(
    base_url: &str,
    status: &ExportStatus,
    out_dir: &Path,
) -> Result<Vec<DownloadTask>> {
    let dir = status.dir.as_deref().ok_or_else(|| {
        ExportError::malformed(base_url, format!("export {} has no directory", status.request_id))
    })?;
    let remote_dir = urljoin(base_url, dir);
    let remote_dir = remote_dir.trim_end_matches('/');

    status
        .filenames
        .iter()
        .map(|filename| {
            let rel = relative_file_path(filename).ok_or_else(|| {
                ExportError::malformed(base_url, format!("unusable filename {filename:?}"))
            })?;
            Ok(DownloadTask {
                url: format!("{}/{}", remote_dir, filename.trim_start_matches('/')),
                dest: out_dir.join(rel),
            })
        })
        .collect()
}

/// Downloads one file unless its destination already exists.
///
/// Bytes go to `<dest>.part` first and are renamed into place, so an
/// interrupted transfer is retried on the next run instead of skipped.
pub fn fetch(task: &DownloadTask, transport: &dyn Transport) -> Result<FetchOutcome> {
    if task.dest.exists() {
        debug!(dest = %task.dest.display(), "already present, skipping");
        return Ok(FetchOutcome::Skipped);
    }

    if let Some(parent) = task.dest.parent() {
        ensure_dir(parent)?;
    }

    let part = partial_path(&task.dest);
    let bytes = match transport.download(&task.url, &part) {
        Ok(bytes) => bytes,
        Err(e) => {
            let _ = fs::remove_file(&part);
            return Err(e);
        }
    };
    fs::rename(&part, &task.dest).map_err(|source| ExportError::Io {
        path: task.dest.clone(),
        source,
    })?;

    debug!(url = %task.url, bytes, "downloaded");
    Ok(FetchOutcome::Downloaded { bytes })
}

/// Executes [`fetch`] over a batch of tasks.
pub trait TaskRunner {
    /// Returns one result per task, in task order. A failed task never
    /// stops the others.
    fn run(&self, tasks: &[DownloadTask], transport: &dyn Transport) -> Vec<TaskResult>;
}

#[derive(Debug, Clone, Default)]
pub struct SequentialRunner {
    progress: bool,
}

impl SequentialRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }
}

impl TaskRunner for SequentialRunner {
    fn run(&self, tasks: &[DownloadTask], transport: &dyn Transport) -> Vec<TaskResult> {
        let pb = progress_bar(self.progress, tasks.len());
        let results = tasks
            .iter()
            .map(|task| {
                let outcome = fetch(task, transport);
                pb.inc(1);
                TaskResult {
                    task: task.clone(),
                    outcome,
                }
            })
            .collect();
        pb.finish_and_clear();
        results
    }
}

/// Fixed pool of worker threads pulling tasks from a shared cursor.
#[derive(Debug, Clone)]
pub struct ParallelRunner {
    workers: usize,
    progress: bool,
}

impl ParallelRunner {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            progress: false,
        }
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }
}

impl Default for ParallelRunner {
    fn default() -> Self {
        Self::new(DEFAULT_WORKERS)
    }
}

impl TaskRunner for ParallelRunner {
    fn run(&self, tasks: &[DownloadTask], transport: &dyn Transport) -> Vec<TaskResult> {
        if tasks.is_empty() {
            return Vec::new();
        }

        let pb = progress_bar(self.progress, tasks.len());
        let next = AtomicUsize::new(0);
        let slots: Mutex<Vec<Option<Result<FetchOutcome>>>> =
            Mutex::new(tasks.iter().map(|_| None).collect());
        let workers = self.workers.min(tasks.len());

        std::thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| {
                    loop {
                        let idx = next.fetch_add(1, Ordering::Relaxed);
                        let Some(task) = tasks.get(idx) else {
                            break;
                        };
                        let outcome = fetch(task, transport);
                        pb.inc(1);
                        if let Ok(mut slots) = slots.lock() {
                            slots[idx] = Some(outcome);
                        }
                    }
                });
            }
        });
        pb.finish_and_clear();

        let slots = slots.into_inner().unwrap_or_else(|e| e.into_inner());
        tasks
            .iter()
            .zip(slots)
            .map(|(task, outcome)| TaskResult {
                task: task.clone(),
                outcome: outcome.unwrap_or_else(|| {
                    Err(ExportError::Io {
                        path: task.dest.clone(),
                        source: std::io::Error::other("download worker terminated"),
                    })
                }),
            })
            .collect()
    }
}

fn progress_bar(enabled: bool, len: usize) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] {wide_bar} {pos}/{len} files ({eta})",
    ) {
        pb.set_style(style.progress_chars("=>-"));
    }
    pb
}

/// Summary of a download run.
#[derive(Debug)]
pub struct DownloadReport {
    results: Vec<TaskResult>,
}

impl DownloadReport {
    pub fn new(results: Vec<TaskResult>) -> Self {
        Self { results }
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn downloaded(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, Ok(FetchOutcome::Downloaded { .. })))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, Ok(FetchOutcome::Skipped)))
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&DownloadTask, &ExportError)> {
        self.results
            .iter()
            .filter_map(|r| r.outcome.as_ref().err().map(|e| (&r.task, e)))
    }

    pub fn results(&self) -> &[TaskResult] {
        &self.results
    }

    /// Logs every failure; errors if there was at least one.
    pub fn into_result(self) -> Result<Self> {
        let mut failed = 0;
        for (task, err) in self.failures() {
            failed += 1;
            warn!(url = %task.url, dest = %task.dest.display(), error = %err, "download failed");
        }
        info!(
            downloaded = self.downloaded(),
            skipped = self.skipped(),
            failed,
            total = self.total(),
            "Download complete"
        );
        if failed > 0 {
            return Err(ExportError::DownloadsFailed {
                failed,
                total: self.total(),
            });
        }
        Ok(self)
    }
}
