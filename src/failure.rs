use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{Context, Result};

use util::PathEncodingError;

use crate::fs::Fs;

/// Kind of message attached to a failed track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Error,
    Warning,
}

impl MessageKind {
    /// Fixed file name of this kind of message inside a track's failed folder.
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Error => "error_message.txt",
            Self::Warning => "warning_message.txt",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Error => "error:",
            Self::Warning => "warning:",
        }
    }
}

/// Track id -> failure record. A record is the existence of a failure flag
/// plus optional error and warning messages.
///
/// Records are keyed by track only, so they survive cleanup of the task
/// folders of the tasks that produced them.
pub trait FailureStore {
    /// Flag each of `tracks` as failed, attaching `message` if given.
    fn report(&self, tracks: &[u32], message: Option<&str>, kind: MessageKind) -> Result<()>;
    /// Remove the failure record of each of `tracks`.
    fn clear(&self, tracks: &[u32]) -> Result<()>;
    /// All tracks currently flagged as failed.
    fn list(&self) -> Result<BTreeSet<u32>>;
    /// The message of `kind` for `track`, or an empty string if there is none.
    fn read_message(&self, track: u32, kind: MessageKind) -> Result<String>;
}

/// `FailureStore` backed by one folder per track under `$SHARED/__failed_tracks__`.
pub struct FsFailureStore<'a> {
    fs: &'a Fs,
}

impl<'a> FsFailureStore<'a> {
    pub fn new(fs: &'a Fs) -> Self {
        Self { fs }
    }
}

impl FailureStore for FsFailureStore<'_> {
    fn report(&self, tracks: &[u32], message: Option<&str>, kind: MessageKind) -> Result<()> {
        let mut buf = PathBuf::with_capacity(128);
        // several tasks may create the root at once:
        self.fs.ensure_folder(self.fs.failed_tracks_root(&mut buf))?;
        for &track in tracks {
            log::debug!("reporting track {track} as failed");
            self.fs
                .ensure_folder(self.fs.failed_track_folder(track, &mut buf))
                .with_context(|| format!("while flagging track {track} as failed"))?;
            if let Some(message) = message {
                self.fs
                    .write_file(self.fs.message_file(track, kind, &mut buf), message)
                    .with_context(|| format!("while writing message for track {track}"))?;
            }
        }
        Ok(())
    }

    fn clear(&self, tracks: &[u32]) -> Result<()> {
        let mut buf = PathBuf::with_capacity(128);
        for &track in tracks {
            self.fs
                .clean_folder(self.fs.failed_track_folder(track, &mut buf))
                .with_context(|| format!("while clearing failure flag of track {track}"))?;
        }
        Ok(())
    }

    fn list(&self) -> Result<BTreeSet<u32>> {
        let mut buf = PathBuf::with_capacity(128);
        let root = self.fs.failed_tracks_root(&mut buf);
        let mut tracks = BTreeSet::new();
        if !self.fs.is_dir(root)? {
            return Ok(tracks);
        }
        for entry in self.fs.read_dir(root)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_str().ok_or(PathEncodingError)?;
            match name.parse() {
                Ok(track) => {
                    tracks.insert(track);
                }
                Err(_) => log::warn!("ignoring unexpected entry {name:?} in failed tracks folder"),
            }
        }
        Ok(tracks)
    }

    fn read_message(&self, track: u32, kind: MessageKind) -> Result<String> {
        let mut buf = PathBuf::with_capacity(128);
        let file = self.fs.message_file(track, kind, &mut buf);
        if self.fs.exists(file) {
            self.fs.read_to_string(file)
        } else {
            Ok(String::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    #[test]
    fn test_report_list_read_clear() -> Result<()> {
        let shared = tempdir()?;
        let fs = Fs::new(shared.path());
        let store = FsFailureStore::new(&fs);

        assert!(store.list()?.is_empty());

        store.report(&[3, 7], Some("boom"), MessageKind::Error)?;
        assert_eq!(store.list()?, BTreeSet::from([3, 7]));
        assert_eq!(store.read_message(3, MessageKind::Error)?, "boom");
        assert_eq!(store.read_message(7, MessageKind::Error)?, "boom");
        assert_eq!(store.read_message(3, MessageKind::Warning)?, "");
        assert_eq!(store.read_message(4, MessageKind::Error)?, "");

        store.clear(&[3, 7])?;
        assert!(store.list()?.is_empty());
        assert_eq!(store.read_message(3, MessageKind::Error)?, "");
        Ok(())
    }

    #[test]
    fn test_report_without_message() -> Result<()> {
        let shared = tempdir()?;
        let fs = Fs::new(shared.path());
        let store = FsFailureStore::new(&fs);

        store.report(&[1], None, MessageKind::Error)?;
        store.report(&[1], Some("low coverage"), MessageKind::Warning)?;
        assert_eq!(store.list()?, BTreeSet::from([1]));
        assert_eq!(store.read_message(1, MessageKind::Error)?, "");
        assert_eq!(store.read_message(1, MessageKind::Warning)?, "low coverage");
        Ok(())
    }

    #[test]
    fn test_clear_only_named_tracks() -> Result<()> {
        let shared = tempdir()?;
        let fs = Fs::new(shared.path());
        let store = FsFailureStore::new(&fs);

        store.report(&[0, 1, 2], Some("boom"), MessageKind::Error)?;
        store.clear(&[1, 5])?;
        assert_eq!(store.list()?, BTreeSet::from([0, 2]));
        Ok(())
    }

    #[test]
    fn test_failure_survives_task_folder_cleanup() -> Result<()> {
        let shared = tempdir()?;
        let fs = Fs::new(shared.path());
        let store = FsFailureStore::new(&fs);

        store.report(&[4], Some("boom"), MessageKind::Error)?;
        let mut buf = PathBuf::new();
        fs.clean_and_ensure(fs.task_folder(4, &mut buf))?;
        assert_eq!(store.list()?, BTreeSet::from([4]));
        Ok(())
    }
}
