use std::path::{Path, PathBuf};

use crate::failure::MessageKind;

use super::Fs;

/// Folder under the shared root holding one folder per task index
pub const TASK_OUTPUTS: &str = "_task_outputs";
/// Folder under the shared root holding one folder per failed track
pub const FAILED_TRACKS: &str = "__failed_tracks__";
/// Folder under the shared root holding the staged input fastqs
pub const FASTQ_INPUT: &str = "fastq_input";

/// Utility fns for making common paths in the shared folder.
/// These are pure; callers decide when to create or destroy what they point to.
impl Fs {
    /// $SHARED/_task_outputs/<index>
    pub fn task_folder<'a>(&self, index: usize, buf: &'a mut PathBuf) -> &'a Path {
        self.parts3(&self.shared_root, TASK_OUTPUTS, index.to_string(), buf)
    }

    /// $SHARED/__failed_tracks__
    pub fn failed_tracks_root<'a>(&self, buf: &'a mut PathBuf) -> &'a Path {
        self.parts2(&self.shared_root, FAILED_TRACKS, buf)
    }

    /// $SHARED/__failed_tracks__/<track>
    pub fn failed_track_folder<'a>(&self, track: u32, buf: &'a mut PathBuf) -> &'a Path {
        self.parts3(&self.shared_root, FAILED_TRACKS, track.to_string(), buf)
    }

    /// $SHARED/__failed_tracks__/<track>/error_message.txt (or warning_message.txt)
    pub fn message_file<'a>(
        &self,
        track: u32,
        kind: MessageKind,
        buf: &'a mut PathBuf,
    ) -> &'a Path {
        self.failed_track_folder(track, buf);
        buf.push(kind.file_name());
        &*buf
    }

    /// $SHARED/fastq_input
    pub fn fastq_input<'a>(&self, buf: &'a mut PathBuf) -> &'a Path {
        self.parts2(&self.shared_root, FASTQ_INPUT, buf)
    }

    fn parts2<'a, T, U>(&self, p1: T, p2: U, buf: &'a mut PathBuf) -> &'a Path
    where
        T: AsRef<Path>,
        U: AsRef<Path>,
    {
        buf.clear();
        buf.push(p1);
        buf.push(p2);
        &*buf
    }

    fn parts3<'a, T, U, V>(&self, p1: T, p2: U, p3: V, buf: &'a mut PathBuf) -> &'a Path
    where
        T: AsRef<Path>,
        U: AsRef<Path>,
        V: AsRef<Path>,
    {
        buf.clear();
        buf.push(p1);
        buf.push(p2);
        buf.push(p3);
        &*buf
    }
}
