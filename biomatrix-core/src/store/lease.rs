//! In-process file leases
//!
//! A disk-resident store holds a lease on its file for as long as it keeps
//! the handle open. Exclusive leases conflict with every other lease on the
//! same canonical path; shared-read leases only conflict with an exclusive
//! one. Leases are released when dropped.
//!
//! Within the process the registry below decides. Every lease also holds an
//! OS advisory lock on its own handle to the file (exclusive or shared to
//! match the policy), so a store opened by another process is refused the
//! same way. Advisory locks bind only openers that also lock; a plain
//! reader or writer elsewhere is not stopped.

use fnv::FnvHashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{File, TryLockError};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::error::{MatrixError, MatrixResult};

/// How a disk-resident store shares its file with other stores in the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessPolicy {
    /// No other store may open the file
    Exclusive,
    /// Other shared-read stores may open the file
    #[default]
    SharedRead,
}

#[derive(Debug, Clone, Copy)]
enum Holders {
    Exclusive,
    Shared(usize),
}

fn registry() -> &'static Mutex<FnvHashMap<PathBuf, Holders>> {
    static LEASES: OnceLock<Mutex<FnvHashMap<PathBuf, Holders>>> = OnceLock::new();
    LEASES.get_or_init(|| Mutex::new(FnvHashMap::default()))
}

#[derive(Debug)]
pub struct Lease {
    path: PathBuf,
    policy: AccessPolicy,
    handle: File,
}

/// Take the OS lock matching `policy` on a fresh handle to `path`
fn lock_file(path: &Path, policy: AccessPolicy) -> MatrixResult<File> {
    let handle = File::open(path)?;
    let locked = match policy {
        AccessPolicy::Exclusive => handle.try_lock(),
        AccessPolicy::SharedRead => handle.try_lock_shared(),
    };
    match locked {
        Ok(()) => Ok(handle),
        Err(TryLockError::WouldBlock) => Err(MatrixError::usage(format!(
            "{} is locked by another process; cannot open it {:?}",
            path.display(),
            policy
        ))),
        Err(TryLockError::Error(err)) => Err(err.into()),
    }
}

impl Lease {
    pub fn acquire(path: &Path, policy: AccessPolicy) -> MatrixResult<Self> {
        let path = std::fs::canonicalize(path)?;
        let mut leases = registry().lock();
        let next = match (leases.get(&path).copied(), policy) {
            (None, AccessPolicy::Exclusive) => Holders::Exclusive,
            (None, AccessPolicy::SharedRead) => Holders::Shared(1),
            (Some(Holders::Shared(n)), AccessPolicy::SharedRead) => Holders::Shared(n + 1),
            (Some(held), _) => {
                return Err(MatrixError::usage(format!(
                    "{} is already open ({}); cannot open it {:?}",
                    path.display(),
                    match held {
                        Holders::Exclusive => "exclusive",
                        Holders::Shared(_) => "shared",
                    },
                    policy
                )));
            }
        };
        let handle = lock_file(&path, policy)?;
        leases.insert(path.clone(), next);
        Ok(Self { path, policy, handle })
    }

    pub fn policy(&self) -> AccessPolicy {
        self.policy
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if let Err(err) = self.handle.unlock() {
            log::warn!("Failed to unlock {}: {}", self.path.display(), err);
        }
        let mut leases = registry().lock();
        match leases.get(&self.path).copied() {
            Some(Holders::Shared(n)) if n > 1 => {
                leases.insert(self.path.clone(), Holders::Shared(n - 1));
            }
            _ => {
                leases.remove(&self.path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::NamedTempFile;

    #[test]
    fn test_shared_leases_coexist() {
        let file = NamedTempFile::new().unwrap();
        let a = Lease::acquire(file.path(), AccessPolicy::SharedRead).unwrap();
        let b = Lease::acquire(file.path(), AccessPolicy::SharedRead).unwrap();
        assert!(Lease::acquire(file.path(), AccessPolicy::Exclusive).unwrap_err().is_usage());
        drop(a);
        assert!(Lease::acquire(file.path(), AccessPolicy::Exclusive).is_err());
        drop(b);
        assert!(Lease::acquire(file.path(), AccessPolicy::Exclusive).is_ok());
    }

    #[test]
    fn test_exclusive_blocks_until_dropped() {
        let file = NamedTempFile::new().unwrap();
        let lease = Lease::acquire(file.path(), AccessPolicy::Exclusive).unwrap();
        assert_eq!(lease.policy(), AccessPolicy::Exclusive);
        assert!(Lease::acquire(file.path(), AccessPolicy::SharedRead).unwrap_err().is_usage());
        drop(lease);
        let _shared = Lease::acquire(file.path(), AccessPolicy::SharedRead).unwrap();
    }

    #[test]
    fn test_exclusive_lease_locks_out_other_openers() {
        let file = NamedTempFile::new().unwrap();
        let lease = Lease::acquire(file.path(), AccessPolicy::Exclusive).unwrap();

        let other = File::open(file.path()).unwrap();
        assert!(matches!(other.try_lock_shared(), Err(TryLockError::WouldBlock)));
        drop(lease);
        other.try_lock_shared().unwrap();
    }

    #[test]
    fn test_foreign_lock_refuses_lease() {
        let file = NamedTempFile::new().unwrap();
        let other = File::open(file.path()).unwrap();
        other.try_lock().unwrap();

        let err = Lease::acquire(file.path(), AccessPolicy::SharedRead).unwrap_err();
        assert!(err.is_usage());
        assert!(err.to_string().contains("locked by another process"));

        other.unlock().unwrap();
        let lease = Lease::acquire(file.path(), AccessPolicy::SharedRead).unwrap();
        assert_eq!(lease.policy(), AccessPolicy::SharedRead);
    }

    #[test]
    fn test_shared_lease_admits_other_shared_openers() {
        let file = NamedTempFile::new().unwrap();
        let _lease = Lease::acquire(file.path(), AccessPolicy::SharedRead).unwrap();
        let other = File::open(file.path()).unwrap();
        other.try_lock_shared().unwrap();
        let writer = File::open(file.path()).unwrap();
        assert!(matches!(writer.try_lock(), Err(TryLockError::WouldBlock)));
    }
}
