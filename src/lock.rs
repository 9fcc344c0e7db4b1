//! Advisory single-instance lock
//!
//! The lock file holds JSON metadata about its owner and is published in one
//! step: the metadata goes to a temporary file next to the lock, which is then
//! moved into place without replacing an existing lock. A lock older than the
//! allowed age is abandoned and may be taken over. So is an unreadable one,
//! once it has sat unchanged for a grace period.

use crate::errors::{ReplayError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How long an unreadable lock file is still treated as held
pub const UNREADABLE_GRACE: Duration = Duration::from_secs(10);

/// Who holds the lock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockOwner {
    pub pid: u32,
    pub host: String,
    pub token: Uuid,
    pub acquired_at: DateTime<Utc>,
}

impl LockOwner {
    fn current() -> Self {
        Self {
            pid: std::process::id(),
            host: host_label(),
            token: Uuid::new_v4(),
            acquired_at: Utc::now(),
        }
    }

    fn is_stale(&self, max_age: Duration) -> bool {
        let age = Utc::now() - self.acquired_at;
        age.to_std().map(|age| age > max_age).unwrap_or(false)
    }
}

fn host_label() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

/// What sits at the lock path right now
#[derive(Debug, Clone)]
enum Holder {
    Owner(LockOwner),
    /// File exists but its metadata does not parse; carries its age
    Unreadable(Duration),
    Gone,
}

impl Holder {
    fn inspect(path: &Path) -> Holder {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(owner) => Holder::Owner(owner),
                Err(_) => Holder::Unreadable(file_age(path)),
            },
            Err(err) if err.kind() == ErrorKind::NotFound => Holder::Gone,
            Err(_) => Holder::Unreadable(file_age(path)),
        }
    }

    fn same_as(&self, other: &Holder) -> bool {
        match (self, other) {
            (Holder::Owner(a), Holder::Owner(b)) => a.token == b.token,
            (Holder::Unreadable(_), Holder::Unreadable(_)) | (Holder::Gone, Holder::Gone) => true,
            _ => false,
        }
    }

    fn is_abandoned(&self, max_age: Duration, grace: Duration) -> bool {
        match self {
            Holder::Owner(owner) => owner.is_stale(max_age),
            Holder::Unreadable(age) => *age > grace,
            Holder::Gone => true,
        }
    }
}

fn file_age(path: &Path) -> Duration {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .unwrap_or_default()
}

/// Held instance lock; the file is removed on drop
#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
    owner: LockOwner,
}

impl InstanceLock {
    /// Take the lock at `path`, reclaiming it if the current holder is stale.
    pub fn acquire(path: impl AsRef<Path>, max_age: Duration) -> Result<Self> {
        Self::acquire_with_grace(path, max_age, UNREADABLE_GRACE)
    }

    /// Like [`InstanceLock::acquire`], with an explicit grace period for
    /// unreadable lock files.
    pub fn acquire_with_grace(
        path: impl AsRef<Path>,
        max_age: Duration,
        grace: Duration,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => {
                fs::create_dir_all(parent)?;
                parent.to_path_buf()
            }
            None => PathBuf::from("."),
        };
        let owner = LockOwner::current();

        // One reclaim attempt; a second collision means someone else won.
        for _ in 0..2 {
            let mut staged = NamedTempFile::new_in(&dir)?;
            staged.write_all(serde_json::to_string_pretty(&owner)?.as_bytes())?;
            staged.as_file().sync_all()?;

            match staged.persist_noclobber(&path) {
                Ok(_) => {
                    info!(path = %path.display(), pid = owner.pid, "instance lock acquired");
                    return Ok(Self { path, owner });
                }
                Err(err) if err.error.kind() == ErrorKind::AlreadyExists => {}
                Err(err) => return Err(err.error.into()),
            }

            let holder = Holder::inspect(&path);
            if !holder.is_abandoned(max_age, grace) {
                return Err(held(&path, &holder));
            }

            // Someone may have reclaimed it since we looked.
            let current = Holder::inspect(&path);
            if !matches!(current, Holder::Gone) && !current.same_as(&holder) {
                return Err(held(&path, &current));
            }
            warn!(path = %path.display(), holder = ?holder, "reclaiming stale instance lock");
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }

        Err(ReplayError::LockHeld(format!(
            "{} (contended during reclaim)",
            path.display()
        )))
    }

    /// Current holder of the lock at `path`, if the file is readable.
    pub fn read_owner(path: &Path) -> Option<LockOwner> {
        let contents = fs::read_to_string(path).ok()?;
        serde_json::from_str(&contents).ok()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn owner(&self) -> &LockOwner {
        &self.owner
    }
}

fn held(path: &Path, holder: &Holder) -> ReplayError {
    match holder {
        Holder::Owner(owner) => ReplayError::LockHeld(format!(
            "{} (pid {} on {}, since {})",
            path.display(),
            owner.pid,
            owner.host,
            owner.acquired_at
        )),
        _ => ReplayError::LockHeld(format!("{} (being written)", path.display())),
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        // Only remove the file while it still carries our token.
        match Self::read_owner(&self.path) {
            Some(holder) if holder.token == self.owner.token => {
                if let Err(err) = fs::remove_file(&self.path) {
                    warn!(path = %self.path.display(), error = %err, "failed to release instance lock");
                } else {
                    debug!(path = %self.path.display(), "instance lock released");
                }
            }
            _ => debug!(path = %self.path.display(), "instance lock no longer ours"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn second_acquire_fails_until_released() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("replay.lock");

        let lock = InstanceLock::acquire(&path, HOUR).unwrap();
        let owner = InstanceLock::read_owner(&path).unwrap();
        assert_eq!(owner.pid, std::process::id());
        assert_eq!(&owner, lock.owner());

        assert!(matches!(
            InstanceLock::acquire(&path, HOUR),
            Err(ReplayError::LockHeld(_))
        ));

        drop(lock);
        assert!(!path.exists());
        assert!(InstanceLock::acquire(&path, HOUR).is_ok());
    }

    #[test]
    fn stale_or_corrupt_locks_are_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("replay.lock");

        let old = LockOwner {
            pid: 1,
            host: "elsewhere".into(),
            token: Uuid::new_v4(),
            acquired_at: Utc::now() - chrono::Duration::hours(2),
        };
        fs::write(&path, serde_json::to_string(&old).unwrap()).unwrap();
        let lock = InstanceLock::acquire(&path, HOUR).unwrap();
        assert_ne!(lock.owner().token, old.token);
        drop(lock);

        fs::write(&path, "not json").unwrap();
        assert!(InstanceLock::acquire_with_grace(&path, HOUR, Duration::ZERO).is_ok());
    }

    #[test]
    fn lock_being_written_is_not_taken_over() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("replay.lock");

        fs::write(&path, "").unwrap();
        assert!(matches!(
            InstanceLock::acquire(&path, HOUR),
            Err(ReplayError::LockHeld(_))
        ));
        assert!(path.exists());
    }

    #[test]
    fn published_lock_is_complete() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("replay.lock");

        let lock = InstanceLock::acquire(&path, HOUR).unwrap();
        assert_eq!(InstanceLock::read_owner(&path).as_ref(), Some(lock.owner()));
        let leftovers = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn drop_leaves_foreign_lock_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("replay.lock");

        let lock = InstanceLock::acquire(&path, HOUR).unwrap();
        let foreign = LockOwner::current();
        fs::write(&path, serde_json::to_string(&foreign).unwrap()).unwrap();
        drop(lock);
        assert_eq!(InstanceLock::read_owner(&path), Some(foreign));
    }
}
