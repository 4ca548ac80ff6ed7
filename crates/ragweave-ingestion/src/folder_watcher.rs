//! Folder Watcher (C12): observes a set of directories and feeds
//! create/change/delete events into the ingestion pipeline as `IngestJob`s,
//! debounced and filtered by extension and base-directory containment.

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use ragweave_common::{RagError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub base_dir: PathBuf,
    pub watched_folders: Vec<PathBuf>,
    pub extensions: Vec<String>,
    pub debounce: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            watched_folders: Vec::new(),
            extensions: vec!["txt".into(), "md".into(), "pdf".into()],
            debounce: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobKind {
    CreatedOrChanged,
    Deleted,
}

#[derive(Debug, Clone)]
pub struct IngestJob {
    pub path: PathBuf,
    pub kind: JobKind,
}

/// Returns `Some(canonicalized_path)` if `path` both exists and is
/// contained within `base_dir` — the path-traversal guard. A
/// not-yet-existent path (e.g. mid-delete) falls back to lexical
/// containment instead of failing the check outright.
fn guarded_path(base_dir: &Path, path: &Path) -> Option<PathBuf> {
    let base = base_dir.canonicalize().ok()?;
    match path.canonicalize() {
        Ok(resolved) => resolved.starts_with(&base).then_some(resolved),
        Err(_) => path.starts_with(&base).then(|| path.to_path_buf()),
    }
}

fn matches_extension(path: &Path, extensions: &[String]) -> bool {
    if extensions.is_empty() {
        return true;
    }
    path.extension().and_then(|e| e.to_str()).map(|e| extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(e))).unwrap_or(false)
}

/// Starts watching `config.watched_folders` and returns the job receiver
/// the ingestion pipeline consumes. The returned `RecommendedWatcher`
/// must be kept alive for the duration of the watch.
#[instrument(skip(config))]
pub fn start(config: WatcherConfig) -> Result<(RecommendedWatcher, mpsc::Receiver<IngestJob>)> {
    let (raw_tx, mut raw_rx) = mpsc::unbounded_channel::<Event>();
    let (job_tx, job_rx) = mpsc::channel::<IngestJob>(256);

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| {
            if let Ok(event) = res {
                let _ = raw_tx.send(event);
            }
        },
        notify::Config::default(),
    )
    .map_err(|e| RagError::Other(anyhow::anyhow!(e)))?;

    for folder in &config.watched_folders {
        watcher.watch(folder, RecursiveMode::Recursive).map_err(|e| RagError::Validation(format!("cannot watch {}: {e}", folder.display())))?;
    }

    tokio::spawn(async move {
        let mut pending: HashMap<PathBuf, (JobKind, Instant)> = HashMap::new();
        let mut ticker = tokio::time::interval(config.debounce);

        loop {
            tokio::select! {
                event = raw_rx.recv() => {
                    let Some(event) = event else { break };
                    let kind = match event.kind {
                        EventKind::Remove(_) => JobKind::Deleted,
                        EventKind::Create(_) | EventKind::Modify(_) => JobKind::CreatedOrChanged,
                        _ => continue,
                    };
                    for path in event.paths {
                        if !matches_extension(&path, &config.extensions) {
                            continue;
                        }
                        let Some(guarded) = guarded_path(&config.base_dir, &path) else {
                            warn!(path = %path.display(), "ignoring event outside base directory");
                            continue;
                        };
                        pending.insert(guarded, (kind.clone(), Instant::now()));
                    }
                }
                _ = ticker.tick() => {
                    let ready: Vec<_> = pending
                        .iter()
                        .filter(|(_, (_, seen))| seen.elapsed() >= config.debounce)
                        .map(|(path, (kind, _))| (path.clone(), kind.clone()))
                        .collect();
                    for (path, kind) in ready {
                        pending.remove(&path);
                        debug!(path = %path.display(), ?kind, "dispatching ingest job");
                        if job_tx.send(IngestJob { path, kind }).await.is_err() {
                            return;
                        }
                    }
                }
            }
        }
    });

    Ok((watcher, job_rx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_filter_is_case_insensitive() {
        let extensions = vec!["pdf".to_string(), "TXT".to_string()];
        assert!(matches_extension(Path::new("a.PDF"), &extensions));
        assert!(matches_extension(Path::new("a.txt"), &extensions));
        assert!(!matches_extension(Path::new("a.docx"), &extensions));
    }

    #[test]
    fn empty_extension_list_matches_everything() {
        assert!(matches_extension(Path::new("a.anything"), &[]));
    }

    #[test]
    fn guarded_path_rejects_paths_outside_base_dir() {
        let base = std::env::temp_dir().join(format!("ragweave-watch-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&base).unwrap();
        let outside = std::env::temp_dir();
        assert!(guarded_path(&base, &outside).is_none());
        std::fs::remove_dir_all(&base).ok();
    }
}
