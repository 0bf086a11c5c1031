use anyhow::{anyhow, Result};
use fd_lock::{RwLock, RwLockWriteGuard};
use std::fs::File;
use std::path::{Path, PathBuf};

/// Exclusive per-plan run lock
///
/// The remote backup subsystem is stateful and serial, so two runs against the
/// same hosts must never overlap. The guard lives until the process exits.
pub struct RunLock {
    path: PathBuf,
    _guard: RwLockWriteGuard<'static, File>,
}

impl RunLock {
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let lock_file = File::create(path)?;
        let lock = Box::leak(Box::new(RwLock::new(lock_file)));
        let guard = lock.try_write().map_err(|_| {
            anyhow!(
                "Another run already holds {}. Only one run can drive the hosts at a time.",
                path.display()
            )
        })?;

        tracing::debug!(lock = %path.display(), "Run lock acquired");
        Ok(Self {
            path: path.to_path_buf(),
            _guard: guard,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
