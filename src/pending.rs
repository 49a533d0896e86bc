//! Registry of output prefixes that tesseract may still be writing to
//!
//! A prefix is registered right before the process is spawned and released
//! once its result has been read. Anything left over is swept at shutdown.

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Shared set of in-flight output prefixes
#[derive(Debug, Clone, Default)]
pub struct PendingOutputs {
    inner: Arc<Mutex<BTreeSet<PathBuf>>>,
}

impl PendingOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeSet<PathBuf>> {
        // The set stays consistent even if a holder panicked
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, prefix: &Path) {
        self.lock().insert(prefix.to_path_buf());
    }

    /// Returns false if the prefix was not registered
    pub fn release(&self, prefix: &Path) -> bool {
        self.lock().remove(prefix)
    }

    pub fn contains(&self, prefix: &Path) -> bool {
        self.lock().contains(prefix)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn snapshot(&self) -> Vec<PathBuf> {
        self.lock().iter().cloned().collect()
    }

    /// Best-effort removal of `<prefix>.txt` for every pending prefix
    ///
    /// Deletion errors are ignored. The set is empty afterwards. Returns the
    /// number of prefixes that were pending.
    pub fn sweep(&self) -> usize {
        let drained = std::mem::take(&mut *self.lock());

        for prefix in &drained {
            let leftover = output_file(prefix, "txt");
            match std::fs::remove_file(&leftover) {
                Ok(()) => tracing::debug!("Removed leftover output {}", leftover.display()),
                Err(e) => tracing::debug!("Could not remove {}: {}", leftover.display(), e),
            }
        }

        drained.len()
    }
}

/// `<prefix>.<extension>`, without touching any dots already in the prefix
pub fn output_file(prefix: &Path, extension: &str) -> PathBuf {
    let mut path = OsString::from(prefix.as_os_str());
    path.push(".");
    path.push(extension);
    PathBuf::from(path)
}
