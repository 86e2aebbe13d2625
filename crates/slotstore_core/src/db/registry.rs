//! Process-wide registry of open store files.
//!
//! # Responsibility
//! - Refuse a second backend on a store file that is already open.
//! - Release a file's registration deterministically when its backend closes.
//!
//! # Invariants
//! - Registered paths are canonical, so aliases of one file collide.
//! - A lease is removed from the registry exactly once, on drop.

use super::{DbError, DbResult};
use log::debug;
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

static OPEN_LOCATIONS: Lazy<Mutex<HashSet<PathBuf>>> = Lazy::new(|| Mutex::new(HashSet::new()));

/// Exclusive registration of one store file.
#[derive(Debug)]
pub struct LocationLease {
    path: PathBuf,
}

impl LocationLease {
    /// Registers `path` for the caller.
    ///
    /// # Errors
    /// - `LocationInUse` when another lease holds the same file.
    /// - `Io` when the parent directory cannot be resolved.
    pub fn acquire(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = canonical_location(path.as_ref())?;
        if !lock_locations().insert(path.clone()) {
            return Err(DbError::LocationInUse(path));
        }

        debug!(
            "event=location_lease module=db status=acquired path={}",
            path.display()
        );
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LocationLease {
    fn drop(&mut self) {
        lock_locations().remove(&self.path);
        debug!(
            "event=location_lease module=db status=released path={}",
            self.path.display()
        );
    }
}

/// Returns whether a backend in this process currently holds `path`.
pub fn is_location_open(path: impl AsRef<Path>) -> bool {
    match canonical_location(path.as_ref()) {
        Ok(path) => lock_locations().contains(&path),
        Err(_) => false,
    }
}

fn lock_locations() -> MutexGuard<'static, HashSet<PathBuf>> {
    // The set stays consistent even if a holder panicked mid-insert/remove.
    OPEN_LOCATIONS
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

// The file itself may not exist yet; its parent directory must.
fn canonical_location(path: &Path) -> DbResult<PathBuf> {
    if path.exists() {
        return Ok(std::fs::canonicalize(path)?);
    }

    let file_name = path.file_name().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("store path `{}` has no file name", path.display()),
        )
    })?;
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    Ok(std::fs::canonicalize(parent)?.join(file_name))
}
