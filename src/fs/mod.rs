use std::path::{Path, PathBuf};
use std::{fs, io};

use anyhow::{Context, Result};

use util::PathEncodingError;

/// Utility fns
mod ops;
pub use ops::compile_patterns;

/// Defines fns for creating common paths in the shared folder
mod paths;

/// Idempotent clean-and-recreate operations for resubmitted tasks
mod guard;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Path is neither file nor dir: {0}")]
    UnknownPathType(String),
    #[error("Can't perform IO operation: \"{0}\" is not whitelisted")]
    NotWhitelisted(String),
    #[error("Can't move {0} to {1}: destination already exists")]
    DestinationExists(String, String),
    #[error("Invalid exclusion pattern \"{0}\"")]
    InvalidPattern(String),
}

/// All file operations in the crate should go through this struct.
///
/// All destructive operations check that the path in question is a child of one
/// of the whitelisted prefixes (the shared folder, plus whatever working, export
/// and output dirs the current stage was given), otherwise they will not be performed.
#[derive(Debug)]
pub struct Fs {
    /// Root of the storage shared between all tasks
    shared_root: PathBuf,
    /// Directories we are allowed to modify
    whitelist: Vec<PathBuf>,
}

impl Fs {
    /// Create a new `Fs` rooted at the given shared folder.
    pub fn new(shared_root: &Path) -> Self {
        Self {
            shared_root: shared_root.to_path_buf(),
            whitelist: vec![shared_root.to_path_buf()],
        }
    }

    /// Allow destructive operations below `prefix` too.
    pub fn allow(&mut self, prefix: &Path) {
        log::debug!("whitelisting {prefix:?}");
        self.whitelist.push(prefix.to_path_buf());
    }

    /// Check if path exists on disk.
    pub fn exists<T: AsRef<Path>>(&self, path: T) -> bool {
        let path = path.as_ref();
        path.exists() || path.is_symlink()
    }

    /// Check if path exists and is a directory.
    pub fn is_dir<T: AsRef<Path>>(&self, path: T) -> Result<bool> {
        let path = path.as_ref();
        if path.is_dir() || (path.is_symlink() && path.canonicalize()?.is_dir()) {
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Create a directory (uses `std::fs::create_dir_all`, so an entire tree of dirs can be created).
    pub fn create_dir<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        let path = path.as_ref();
        self.check_whitelist(path)?;
        fs::create_dir_all(path).with_context(|| format!("creating dir {path:?}"))?;
        Ok(())
    }

    /// Create parent directory of a given path.
    pub fn create_parent_dir<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            self.check_whitelist(parent)?;
            fs::create_dir_all(parent).context("creating parent dir")?;
        }
        Ok(())
    }

    /// Write entire str to a file.
    pub fn write_file<T: AsRef<Path>>(&self, path: T, text: &str) -> Result<()> {
        let path = path.as_ref();
        self.check_whitelist(path)?;
        fs::write(path, text).with_context(|| format!("writing file {path:?}"))?;
        Ok(())
    }

    /// Delete a file (or a symlink).
    pub fn delete_file<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        let path = path.as_ref();
        self.check_whitelist(path)?;
        fs::remove_file(path).with_context(|| format!("deleting file {path:?}"))?;
        Ok(())
    }

    /// Recursively delete a directory.
    pub fn delete_dir<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        let path = path.as_ref();
        self.check_whitelist(path)?;
        fs::remove_dir_all(path).with_context(|| format!("deleting dir {path:?}"))?;
        Ok(())
    }

    /// Symlink `symlink` to `tgt`.
    pub fn symlink<T: AsRef<Path>, U: AsRef<Path>>(&self, tgt: T, symlink: U) -> Result<()> {
        let (tgt, symlink) = (tgt.as_ref(), symlink.as_ref());
        self.check_whitelist(symlink)?;
        ops::symlink(tgt, symlink)
            .with_context(|| format!("symlinking {:?} to {:?}", symlink, tgt))?;
        Ok(())
    }

    /// Copy `src` into `tgt`, recursively if `src` is a directory, skipping any
    /// entry whose file name matches one of `exclude`. Existing dirs are merged into.
    pub fn copy<T: AsRef<Path>, U: AsRef<Path>>(
        &self,
        src: T,
        tgt: U,
        exclude: &[glob::Pattern],
    ) -> Result<()> {
        let (src, tgt) = (src.as_ref(), tgt.as_ref());
        self.check_whitelist(tgt)?;
        ops::copy(src, tgt, exclude).with_context(|| format!("copying {src:?} to {tgt:?}"))?;
        Ok(())
    }

    /// Move `src` to `tgt`. `tgt` is the full destination path and must not exist yet.
    pub fn move_path<T: AsRef<Path>, U: AsRef<Path>>(&self, src: T, tgt: U) -> Result<()> {
        let (src, tgt) = (src.as_ref(), tgt.as_ref());
        self.check_whitelist(src)?;
        self.check_whitelist(tgt)?;
        if self.exists(tgt) {
            return Err(Error::DestinationExists(path_str(src)?, path_str(tgt)?).into());
        }
        self.create_parent_dir(tgt)?;
        log::debug!("moving {src:?} to {tgt:?}");
        ops::move_path(src, tgt).with_context(|| format!("moving {src:?} to {tgt:?}"))?;
        Ok(())
    }

    /// Read entire file into a String.
    pub fn read_to_string<T: AsRef<Path>>(&self, path: T) -> Result<String> {
        let path = path.as_ref();
        fs::read_to_string(path).with_context(|| format!("reading file {path:?}"))
    }

    /// List entries in a directory
    pub fn read_dir<T: AsRef<Path>>(&self, path: T) -> Result<fs::ReadDir, io::Error> {
        fs::read_dir(path)
    }

    fn is_whitelisted<T: AsRef<Path>>(&self, path: T) -> bool {
        let path = path.as_ref();
        self.whitelist.iter().any(|prefix| path.starts_with(prefix))
    }

    fn check_whitelist(&self, path: &Path) -> Result<()> {
        if !self.is_whitelisted(path) {
            Err(Error::NotWhitelisted(path_str(path)?).into())
        } else {
            Ok(())
        }
    }
}

fn path_str(path: &Path) -> Result<String, PathEncodingError> {
    Ok(path.to_str().ok_or(PathEncodingError)?.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    #[test]
    fn test_refuses_paths_outside_whitelist() -> Result<()> {
        let shared = tempdir()?;
        let other = tempdir()?;
        let mut fs = Fs::new(shared.path());

        let outside = other.path().join("file");
        let err = fs.write_file(&outside, "x").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::NotWhitelisted(_))
        ));
        assert!(!outside.exists());

        fs.allow(other.path());
        fs.write_file(&outside, "x")?;
        assert!(outside.exists());
        Ok(())
    }

    #[test]
    fn test_move_refuses_existing_destination() -> Result<()> {
        let shared = tempdir()?;
        let fs = Fs::new(shared.path());
        let src = shared.path().join("src");
        let tgt = shared.path().join("tgt");
        fs.write_file(&src, "a")?;
        fs.write_file(&tgt, "b")?;

        let err = fs.move_path(&src, &tgt).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::DestinationExists(..))
        ));
        assert_eq!(std::fs::read_to_string(&tgt)?, "b");
        Ok(())
    }

    #[test]
    fn test_move_creates_parent() -> Result<()> {
        let shared = tempdir()?;
        let fs = Fs::new(shared.path());
        let src = shared.path().join("outs");
        fs.create_dir(src.join("count"))?;
        let tgt = shared.path().join("_task_outputs/0/S1_DEMUX");

        fs.move_path(&src, &tgt)?;
        assert!(!src.exists());
        assert!(tgt.join("count").is_dir());
        Ok(())
    }
}
