use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use util::pluralize;

use crate::fs::Fs;
use crate::settings::PostSettings;
use crate::ui::Ui;

/// Subfolder of the generic output that task outputs are moved into.
const GENERIC_SUBFOLDER: &str = "cellranger_multi";

/// Gathers the outputs of every task once all tasks have finished.
pub struct ResultCollector<'a> {
    fs: &'a Fs,
    ui: &'a Ui,
}

impl<'a> ResultCollector<'a> {
    pub fn new(fs: &'a Fs, ui: &'a Ui) -> Self {
        Self { fs, ui }
    }

    /// Visit task folders 0, 1, 2, ... until the first one that doesn't exist.
    /// Each one is copied to the export folder (if exporting) and then its
    /// entries are moved to the generic output (if there is one).
    ///
    /// Returns the number of task folders visited.
    pub fn collect(&self, settings: &PostSettings) -> Result<usize> {
        let mut buf = PathBuf::with_capacity(256);
        let mut index = 0;
        loop {
            let task_folder = self.fs.task_folder(index, &mut buf);
            if !self.fs.is_dir(task_folder)? {
                break;
            }
            self.ui
                .verbose_msg(&format!("collecting outputs of task {index}"));

            if let Some(export) = &settings.export {
                self.fs
                    .copy(task_folder, &export.folder, &export.exclude)
                    .with_context(|| format!("while exporting outputs of task {index}"))?;
            }
            if let Some(generic_output) = &settings.generic_output {
                self.relocate(task_folder, &generic_output.join(GENERIC_SUBFOLDER))
                    .with_context(|| format!("while relocating outputs of task {index}"))?;
            }
            index += 1;
        }
        log::info!("collected outputs of {}", pluralize(index, "task"));
        Ok(index)
    }

    fn relocate(&self, task_folder: &Path, dest_root: &Path) -> Result<()> {
        let mut entries = Vec::new();
        for entry in self.fs.read_dir(task_folder)? {
            entries.push(entry?.file_name());
        }
        entries.sort();
        for name in entries {
            let dest = dest_root.join(&name);
            self.fs.clean_folder(&dest)?;
            self.fs.move_path(task_folder.join(&name), &dest)?;
        }
        Ok(())
    }
}
