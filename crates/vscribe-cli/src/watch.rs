//! Directory watcher.
//!
//! New video files are processed after a quiet window: a path must stop
//! receiving filesystem events AND keep a stable size for the configured
//! debounce period before it is handed to the pipeline. This avoids
//! analyzing files that are still being copied in.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::AppConfig;

const TICK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
struct Pending {
    last_event: Instant,
    last_size: u64,
}

/// Tracks files that recently changed and releases them once quiet.
struct Debouncer {
    quiet: Duration,
    pending: HashMap<PathBuf, Pending>,
}

impl Debouncer {
    fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            pending: HashMap::new(),
        }
    }

    fn record(&mut self, path: PathBuf, size: u64, now: Instant) {
        self.pending.insert(
            path,
            Pending {
                last_event: now,
                last_size: size,
            },
        );
    }

    /// Release paths that have been quiet for the full window. A size change
    /// observed at flush time restarts the window for that path.
    fn take_ready(&mut self, now: Instant, current_size: impl Fn(&Path) -> Option<u64>) -> Vec<PathBuf> {
        let mut ready = Vec::new();
        self.pending.retain(|path, state| {
            let Some(size) = current_size(path) else {
                // File vanished before it settled.
                return false;
            };
            if size != state.last_size {
                state.last_size = size;
                state.last_event = now;
                return true;
            }
            if now.duration_since(state.last_event) >= self.quiet {
                ready.push(path.clone());
                return false;
            }
            true
        });
        ready
    }
}

fn is_candidate(path: &Path, config: &AppConfig) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    config.supported_formats.contains(&ext.to_lowercase())
}

/// Watch directories and call `process` for every video file that settles.
/// Runs until the task is cancelled.
pub async fn watch_directories<F, Fut>(
    dirs: &[PathBuf],
    config: &AppConfig,
    mut process: F,
) -> Result<()>
where
    F: FnMut(PathBuf) -> Fut,
    Fut: Future<Output = ()>,
{
    for dir in dirs {
        if !dir.is_dir() {
            anyhow::bail!("not a directory: {}", dir.display());
        }
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<Event>();
    let mut watcher: RecommendedWatcher = notify::recommended_watcher(move |res| {
        match res {
            Ok(event) => {
                let _ = tx.send(event);
            }
            Err(e) => warn!("watch error: {}", e),
        }
    })
    .context("creating filesystem watcher")?;
    for dir in dirs {
        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("watching {}", dir.display()))?;
        info!(
            dir = %dir.display(),
            debounce_secs = config.watch_debounce_secs,
            "watching for new videos"
        );
    }

    let mut debouncer = Debouncer::new(Duration::from_secs(config.watch_debounce_secs));
    let mut tick = tokio::time::interval(TICK_INTERVAL);

    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else {
                    // Watcher dropped its sender.
                    return Ok(());
                };
                if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                    continue;
                }
                let now = Instant::now();
                for path in event.paths {
                    if !is_candidate(&path, config) {
                        continue;
                    }
                    let size = path.metadata().map(|m| m.len()).unwrap_or(0);
                    debug!(path = %path.display(), size, "file event");
                    debouncer.record(path, size, now);
                }
            }
            _ = tick.tick() => {
                let ready = debouncer.take_ready(Instant::now(), |p| {
                    p.metadata().ok().map(|m| m.len())
                });
                for path in ready {
                    info!(path = %path.display(), "file settled, processing");
                    process(path).await;
                }
            }
        }
    }
}
