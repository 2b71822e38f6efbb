//! Data directory migration.
//!
//! Relocates every top-level entry of the current data directory into a
//! new, pre-created and empty directory. Entries are moved one at a time;
//! a failure part way through leaves the data split between the two
//! directories and is reported, not repaired.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::PathError;

/// Where data should live next, if anywhere other than `current`.
///
/// With a custom path configured the target is that path; without one the
/// target is the default path.
pub fn migration_target(
    custom: Option<&Path>,
    current: &Path,
    default: &Path,
) -> Option<PathBuf> {
    let desired = custom.unwrap_or(default);
    (desired != current).then(|| desired.to_path_buf())
}

/// A validated migration, ready to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationPlan {
    pub source: PathBuf,
    pub target: PathBuf,
    pub entries: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationReport {
    /// Source and target are the same directory.
    Skipped,
    Moved { target: PathBuf, entries: Vec<PathBuf> },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DataMigrator;

impl DataMigrator {
    pub fn new() -> Self {
        Self
    }

    /// Check preconditions without touching anything.
    ///
    /// Returns `Ok(None)` when `source == target`.
    pub fn plan(&self, source: &Path, target: &Path) -> Result<Option<MigrationPlan>, PathError> {
        if source == target {
            info!(path = %target.display(), "data path unchanged, skipping migration");
            return Ok(None);
        }
        if target.starts_with(source) {
            return Err(PathError::DestinationInsideSource {
                current: source.to_path_buf(),
                target: target.to_path_buf(),
            });
        }
        if !target.is_dir() {
            return Err(PathError::DestinationMissing(target.to_path_buf()));
        }
        if !is_empty_dir(target).map_err(|source_err| PathError::Move {
            from: source.to_path_buf(),
            to: target.to_path_buf(),
            source: source_err,
        })? {
            return Err(PathError::DestinationNotEmpty(target.to_path_buf()));
        }

        let entries = if source.is_dir() {
            list_entries(source).map_err(|e| PathError::Move {
                from: source.to_path_buf(),
                to: target.to_path_buf(),
                source: e,
            })?
        } else {
            warn!(path = %source.display(), "current data path is missing, nothing to move");
            Vec::new()
        };

        Ok(Some(MigrationPlan {
            source: source.to_path_buf(),
            target: target.to_path_buf(),
            entries,
        }))
    }

    /// Move every planned entry into the target.
    pub fn execute(&self, plan: &MigrationPlan) -> Result<MigrationReport, PathError> {
        let mut moved = Vec::with_capacity(plan.entries.len());
        for from in &plan.entries {
            let Some(name) = from.file_name() else {
                continue;
            };
            let to = plan.target.join(name);
            move_entry(from, &to).map_err(|source| {
                warn!(
                    moved = moved.len(),
                    remaining = plan.entries.len() - moved.len(),
                    "data migration interrupted"
                );
                PathError::Move {
                    from: from.clone(),
                    to: to.clone(),
                    source,
                }
            })?;
            debug!(from = %from.display(), to = %to.display(), "moved entry");
            moved.push(to);
        }

        info!(
            source = %plan.source.display(),
            target = %plan.target.display(),
            entries = moved.len(),
            "data migration complete"
        );
        Ok(MigrationReport::Moved {
            target: plan.target.clone(),
            entries: moved,
        })
    }

    pub fn migrate(&self, source: &Path, target: &Path) -> Result<MigrationReport, PathError> {
        match self.plan(source, target)? {
            Some(plan) => self.execute(&plan),
            None => Ok(MigrationReport::Skipped),
        }
    }
}

fn is_empty_dir(path: &Path) -> io::Result<bool> {
    Ok(fs::read_dir(path)?.next().is_none())
}

fn list_entries(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<io::Result<Vec<_>>>()?;
    entries.sort();
    Ok(entries)
}

/// Rename, falling back to copy-and-remove across filesystems.
fn move_entry(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(err) if is_cross_device_os_error(&err) => {
            debug!(from = %from.display(), "cross-device move, copying");
            copy_entry(from, to)?;
            remove_entry(from)
        }
        Err(err) => Err(err),
    }
}

fn copy_entry(from: &Path, to: &Path) -> io::Result<()> {
    let ty = fs::symlink_metadata(from)?.file_type();
    if ty.is_dir() {
        fs::create_dir_all(to)?;
        for entry in fs::read_dir(from)? {
            let entry = entry?;
            copy_entry(&entry.path(), &to.join(entry.file_name()))?;
        }
        Ok(())
    } else if ty.is_file() {
        fs::copy(from, to).map(|_| ())
    } else if ty.is_symlink() {
        copy_symlink(from, to)
    } else {
        Err(io::Error::other(format!(
            "Unsupported filesystem entry type at {}",
            from.display()
        )))
    }
}

#[cfg(unix)]
fn copy_symlink(from: &Path, to: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(fs::read_link(from)?, to)
}

#[cfg(not(unix))]
fn copy_symlink(from: &Path, to: &Path) -> io::Result<()> {
    fs::copy(from, to).map(|_| ())
}

fn remove_entry(path: &Path) -> io::Result<()> {
    if fs::symlink_metadata(path)?.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

fn is_cross_device_os_error(err: &io::Error) -> bool {
    let Some(code) = err.raw_os_error() else {
        return false;
    };

    #[cfg(unix)]
    {
        const EXDEV: i32 = 18;
        code == EXDEV
    }

    #[cfg(windows)]
    {
        const ERROR_NOT_SAME_DEVICE: i32 = 17;
        code == ERROR_NOT_SAME_DEVICE
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = code;
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn target_follows_custom_path() {
        let default = Path::new("/opt/foundry/userdata");
        let custom = Path::new("/srv/foundry");

        assert_eq!(
            migration_target(Some(custom), default, default),
            Some(custom.to_path_buf())
        );
        assert_eq!(migration_target(Some(custom), custom, default), None);
    }

    #[test]
    fn target_returns_to_default_when_custom_cleared() {
        let default = Path::new("/opt/foundry/userdata");
        let custom = Path::new("/srv/foundry");

        assert_eq!(
            migration_target(None, custom, default),
            Some(default.to_path_buf())
        );
        assert_eq!(migration_target(None, default, default), None);
    }

    #[test]
    fn copy_entry_handles_nested_trees() {
        let temp = TempDir::new().unwrap();
        let from = temp.path().join("from");
        fs::create_dir_all(from.join("Config")).unwrap();
        fs::write(from.join("Config/options.json"), "{\"port\": 30000}").unwrap();

        let to = temp.path().join("to");
        copy_entry(&from, &to).unwrap();
        remove_entry(&from).unwrap();

        assert!(!from.exists());
        assert_eq!(
            fs::read_to_string(to.join("Config/options.json")).unwrap(),
            "{\"port\": 30000}"
        );
    }

    #[test]
    fn exdev_is_cross_device() {
        #[cfg(unix)]
        assert!(is_cross_device_os_error(&io::Error::from_raw_os_error(18)));
        assert!(!is_cross_device_os_error(&io::Error::other("nope")));
    }
}
