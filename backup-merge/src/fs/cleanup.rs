//! Removal of stale working directories left by a previous run.
//!
//! On some filesystems a directory can still be visible for a moment after
//! `remove_dir_all` returns. Removal is repeated until the paths are really
//! gone, up to a fixed number of passes.

use crate::utils::{MergeError, Result};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Bounded retry policy for clearing stale directories
#[derive(Debug, Clone, Copy)]
pub struct CleanupPolicy {
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for CleanupPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 50,
            retry_delay: Duration::from_millis(100),
        }
    }
}

/// Remove every directory in `dirs`, retrying until none of them exists.
///
/// A failed removal is logged and ends the current pass; the next pass starts
/// after `retry_delay`. Returns [`MergeError::CleanupTimeout`] naming the first
/// directory still present once `max_attempts` passes are used up.
pub fn clear_stale_dirs(dirs: &[PathBuf], policy: &CleanupPolicy) -> Result<()> {
    clear_with(dirs, policy, |dir| std::fs::remove_dir_all(dir))
}

fn clear_with<F>(dirs: &[PathBuf], policy: &CleanupPolicy, mut remove: F) -> Result<()>
where
    F: FnMut(&Path) -> io::Result<()>,
{
    for attempt in 1..=policy.max_attempts {
        if remaining(dirs).is_none() {
            return Ok(());
        }

        debug!("Cleanup pass {}/{}", attempt, policy.max_attempts);
        for dir in dirs {
            match remove(dir) {
                Ok(()) => debug!("Removed {}", dir.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!("Failed to remove {}: {}", dir.display(), e);
                    break;
                }
            }
        }

        std::thread::sleep(policy.retry_delay);
    }

    match remaining(dirs) {
        None => Ok(()),
        Some(path) => Err(MergeError::CleanupTimeout {
            path: path.to_path_buf(),
            attempts: policy.max_attempts,
        }),
    }
}

fn remaining(dirs: &[PathBuf]) -> Option<&Path> {
    dirs.iter().map(PathBuf::as_path).find(|d| d.is_dir())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn quick_policy(max_attempts: u32) -> CleanupPolicy {
        CleanupPolicy {
            max_attempts,
            retry_delay: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_removes_populated_dirs() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let out = temp_dir.path().join("out");
        let campus = temp_dir.path().join("campus");
        fs::create_dir_all(out.join("sections/section_1"))?;
        fs::write(out.join("sections/section_1/section.xml"), b"<section/>")?;
        fs::create_dir(&campus)?;

        clear_stale_dirs(&[out.clone(), campus.clone()], &quick_policy(5))?;

        assert!(!out.exists());
        assert!(!campus.exists());
        Ok(())
    }

    #[test]
    fn test_missing_dirs_are_fine() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let missing = temp_dir.path().join("never-created");

        clear_stale_dirs(&[missing], &quick_policy(1))?;
        Ok(())
    }

    #[test]
    fn test_gives_up_after_cap() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let stale = temp_dir.path().join("out");
        fs::create_dir(&stale)?;

        let result = clear_stale_dirs(&[stale.clone()], &quick_policy(0));

        match result {
            Err(MergeError::CleanupTimeout { path, attempts }) => {
                assert_eq!(path, stale);
                assert_eq!(attempts, 0);
            }
            other => panic!("expected cleanup timeout, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_dir_still_visible_after_removal_is_retried() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let out = temp_dir.path().join("out");
        fs::create_dir(&out)?;

        let mut calls = 0;
        clear_with(&[out.clone()], &quick_policy(5), |dir| {
            calls += 1;
            // first removal reports success but leaves the directory behind
            if calls == 1 {
                Ok(())
            } else {
                fs::remove_dir_all(dir)
            }
        })?;

        assert_eq!(calls, 2);
        assert!(!out.exists());
        Ok(())
    }

    #[test]
    fn test_removal_error_ends_pass_and_next_pass_continues() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let campus = temp_dir.path().join("campus");
        let out = temp_dir.path().join("out");
        fs::create_dir(&campus)?;
        fs::create_dir(&out)?;

        let mut attempted = Vec::new();
        clear_with(&[campus.clone(), out.clone()], &quick_policy(5), |dir| {
            attempted.push(dir.to_path_buf());
            if attempted.len() == 1 {
                Err(io::Error::new(io::ErrorKind::PermissionDenied, "busy"))
            } else {
                fs::remove_dir_all(dir)
            }
        })?;

        assert_eq!(attempted, vec![campus.clone(), campus.clone(), out.clone()]);
        assert!(!campus.exists());
        assert!(!out.exists());
        Ok(())
    }

    #[test]
    fn test_dir_that_keeps_coming_back_times_out() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let stale = temp_dir.path().join("out");
        fs::create_dir(&stale)?;

        let mut passes = 0;
        let result = clear_with(&[stale.clone()], &quick_policy(3), |dir| {
            passes += 1;
            fs::remove_dir_all(dir)?;
            fs::create_dir(dir)
        });

        assert_eq!(passes, 3);
        match result {
            Err(MergeError::CleanupTimeout { path, attempts }) => {
                assert_eq!(path, stale);
                assert_eq!(attempts, 3);
            }
            other => panic!("expected cleanup timeout, got {:?}", other),
        }
        Ok(())
    }
}
