use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;

use super::loader::{load_file, LoadError, LoadOptions};
use super::model::{Dataset, LoadReport};

pub type LoadResult = Result<(Dataset, LoadReport), LoadError>;

/// A finished background load.
#[derive(Debug)]
pub struct LoadOutcome {
    pub generation: u64,
    pub path: PathBuf,
    pub result: LoadResult,
}

/// Background loads tagged with a request generation.
///
/// Every spawn bumps the generation; `poll` only hands back the result of the
/// most recently spawned load, so a slow earlier load can never overwrite a
/// newer one.
pub struct LoadJobs {
    generation: u64,
    pending: bool,
    progress: Arc<AtomicU8>,
    tx: Sender<LoadOutcome>,
    rx: Receiver<LoadOutcome>,
}

impl Default for LoadJobs {
    fn default() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            generation: 0,
            pending: false,
            progress: Arc::new(AtomicU8::new(0)),
            tx,
            rx,
        }
    }
}

impl LoadJobs {
    /// Start loading `path` on a worker thread. Returns the new generation.
    pub fn spawn(&mut self, path: PathBuf, options: LoadOptions) -> u64 {
        self.spawn_with(path, move |path, progress| load_file(path, &options, progress))
    }

    pub(crate) fn spawn_with<F>(&mut self, path: PathBuf, job: F) -> u64
    where
        F: FnOnce(&Path, &AtomicU8) -> LoadResult + Send + 'static,
    {
        self.generation += 1;
        self.pending = true;
        let generation = self.generation;
        let progress = Arc::new(AtomicU8::new(0));
        self.progress = Arc::clone(&progress);
        let tx = self.tx.clone();

        log::info!("Load #{generation} started: {}", path.display());
        let spawned = thread::Builder::new()
            .name(format!("load-{generation}"))
            .spawn({
                let path = path.clone();
                let tx = tx.clone();
                move || {
                    let result = job(&path, &progress);
                    progress.store(100, Ordering::Relaxed);
                    // Receiver gone means the app is shutting down.
                    let _ = tx.send(LoadOutcome {
                        generation,
                        path,
                        result,
                    });
                }
            });

        if let Err(e) = spawned {
            log::error!("Could not start load thread: {e}");
            let _ = tx.send(LoadOutcome {
                generation,
                path,
                result: Err(LoadError::Io(e)),
            });
        }
        generation
    }

    /// Drain finished jobs; return the latest generation's result if it arrived.
    pub fn poll(&mut self) -> Option<LoadOutcome> {
        let mut current = None;
        loop {
            match self.rx.try_recv() {
                Ok(outcome) if outcome.generation == self.generation => {
                    self.pending = false;
                    current = Some(outcome);
                }
                Ok(stale) => {
                    log::warn!(
                        "Discarding stale load #{} of {} (latest is #{})",
                        stale.generation,
                        stale.path.display(),
                        self.generation
                    );
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        current
    }

    /// Make every in-flight load stale.
    pub fn cancel(&mut self) {
        if self.pending {
            log::info!("Load #{} cancelled", self.generation);
        }
        self.generation += 1;
        self.pending = false;
    }

    pub fn is_loading(&self) -> bool {
        self.pending
    }

    /// Approximate byte-read percentage of the latest load.
    pub fn progress(&self) -> u8 {
        self.progress.load(Ordering::Relaxed)
    }
}
