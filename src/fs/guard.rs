//! Every retryable unit of work starts by clearing whatever an earlier attempt
//! at the same index left behind. These operations never fail because the
//! thing to clean is already gone.

use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;

use super::Fs;

impl Fs {
    /// Recursively delete `path` if it exists. A missing path is a no-op.
    pub fn clean_folder<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        let path = path.as_ref();
        if path.is_symlink() || path.is_file() {
            return self.clean_file(path);
        }
        if path.is_dir() {
            log::info!(
                "{} cleaning up content of folder from previous run: {path:?}",
                "Resubmission of task -".yellow()
            );
            self.delete_dir(path)?;
        }
        Ok(())
    }

    /// Delete a single file if it exists. A missing file is a no-op.
    pub fn clean_file<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        let path = path.as_ref();
        if self.exists(path) {
            log::info!(
                "{} cleaning up file from previous run: {path:?}",
                "Resubmission of task -".yellow()
            );
            self.delete_file(path)?;
        }
        Ok(())
    }

    /// Create `path` if absent. Another attempt creating it at the same time is fine.
    pub fn ensure_folder<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        let path = path.as_ref();
        if path.is_dir() {
            return Ok(());
        }
        match self.create_dir(path) {
            Ok(()) => Ok(()),
            Err(e) if lost_creation_race(&e) && path.is_dir() => Ok(()),
            Err(e) => Err(e).with_context(|| format!("ensuring folder {path:?} exists")),
        }
    }

    /// Clean `path`, then recreate it empty.
    pub fn clean_and_ensure<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        let path = path.as_ref();
        self.clean_folder(path)?;
        self.ensure_folder(path)
    }
}

fn lost_creation_race(e: &anyhow::Error) -> bool {
    e.chain()
        .filter_map(|cause| cause.downcast_ref::<std::io::Error>())
        .any(|io| io.kind() == ErrorKind::AlreadyExists)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::fs;
    use tempfile::tempdir;

    fn is_empty_dir(path: &Path) -> Result<bool> {
        Ok(path.is_dir() && fs::read_dir(path)?.next().is_none())
    }

    #[test]
    fn test_clean_and_ensure_is_idempotent() -> Result<()> {
        let shared = tempdir()?;
        let fs = Fs::new(shared.path());
        let folder = shared.path().join("_task_outputs/0");

        fs.create_dir(folder.join("S1_A/outs"))?;
        std::fs::write(folder.join("partial.txt"), "from an earlier attempt")?;

        fs.clean_and_ensure(&folder)?;
        assert!(is_empty_dir(&folder)?);

        fs.clean_and_ensure(&folder)?;
        assert!(is_empty_dir(&folder)?);
        Ok(())
    }

    #[test]
    fn test_clean_missing_is_noop() -> Result<()> {
        let shared = tempdir()?;
        let fs = Fs::new(shared.path());
        fs.clean_folder(shared.path().join("never_created"))?;
        fs.clean_file(shared.path().join("never_created.csv"))?;
        Ok(())
    }

    #[test]
    fn test_clean_file() -> Result<()> {
        let shared = tempdir()?;
        let fs = Fs::new(shared.path());
        let file = shared.path().join("S1_gex_cellmux_config.csv");
        std::fs::write(&file, "[libraries]\n")?;

        fs.clean_file(&file)?;
        assert!(!file.exists());
        fs.clean_file(&file)?;
        Ok(())
    }

    #[test]
    fn test_clean_folder_removes_symlink_not_target() -> Result<()> {
        let shared = tempdir()?;
        let fs = Fs::new(shared.path());
        let target = shared.path().join("real");
        fs.create_dir(&target)?;
        let link = shared.path().join("link");
        fs.symlink(&target, &link)?;

        fs.clean_folder(&link)?;
        assert!(!link.is_symlink());
        assert!(target.is_dir());
        Ok(())
    }

    #[test]
    fn test_ensure_existing_folder() -> Result<()> {
        let shared = tempdir()?;
        let fs = Fs::new(shared.path());
        let folder = shared.path().join("__failed_tracks__");
        fs.ensure_folder(&folder)?;
        std::fs::write(folder.join("keep"), "")?;
        fs.ensure_folder(&folder)?;
        assert!(folder.join("keep").exists());
        Ok(())
    }
}
