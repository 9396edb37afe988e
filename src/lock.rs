//! Advisory write lock on a store directory.
//!
//! Every operation that reads the graph, checks a rule and appends records
//! holds this lock for its whole duration, so two processes (or two handles
//! in one process) working on the same `.todograph/` cannot interleave.

use eyre::{Context, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::Path;

/// Lock file name within the .todograph directory.
const LOCK_FILE: &str = "todograph.lock";

/// RAII guard for the store-wide exclusive lock. Released on drop.
#[derive(Debug)]
pub struct StoreLock {
    file: File,
}

impl StoreLock {
    /// Block until the exclusive lock on `store_dir` is held.
    pub fn acquire(store_dir: &Path) -> Result<Self> {
        let path = store_dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .with_context(|| format!("Failed to open lock file {}", path.display()))?;

        file.lock_exclusive()
            .with_context(|| format!("Failed to acquire write lock on {}", path.display()))?;

        Ok(Self { file })
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_second_holder_waits_for_drop() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().to_path_buf();

        let held = StoreLock::acquire(&dir).unwrap();

        let (tx, rx) = mpsc::channel();
        let waiter = thread::spawn(move || {
            let _lock = StoreLock::acquire(&dir).unwrap();
            tx.send(()).unwrap();
        });

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

        drop(held);
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
        waiter.join().unwrap();
    }
}
