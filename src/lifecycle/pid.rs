// src/lifecycle/pid.rs
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// PID file of the running instance, removed when dropped.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        fs::write(&path, std::process::id().to_string())
            .with_context(|| format!("Failed to write PID file {}", path.display()))?;

        tracing::debug!(path = %path.display(), "PID file written");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), %err, "Failed to remove PID file");
        }
    }
}

pub fn read_pid(path: &Path) -> Result<u32> {
    let contents = fs::read_to_string(path).with_context(|| {
        format!(
            "No running load balancer found (cannot read {})",
            path.display()
        )
    })?;

    contents
        .trim()
        .parse()
        .with_context(|| format!("Malformed PID file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pid_file_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lb.pid");

        let pid_file = PidFile::create(&path).unwrap();
        assert_eq!(pid_file.path(), path.as_path());
        assert_eq!(read_pid(&path).unwrap(), std::process::id());

        drop(pid_file);
        assert!(!path.exists());
    }

    #[test]
    fn test_read_pid_errors() {
        let dir = tempfile::tempdir().unwrap();

        let missing = dir.path().join("missing.pid");
        let err = read_pid(&missing).unwrap_err();
        assert!(err.to_string().contains("No running load balancer found"));

        let garbage = dir.path().join("garbage.pid");
        fs::write(&garbage, "not-a-pid\n").unwrap();
        let err = read_pid(&garbage).unwrap_err();
        assert!(err.to_string().contains("Malformed PID file"));
    }

    #[test]
    fn test_read_pid_tolerates_whitespace() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lb.pid");
        fs::write(&path, " 4242\n").unwrap();

        assert_eq!(read_pid(&path).unwrap(), 4242);
    }
}
