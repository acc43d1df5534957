use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;

use sheet::{ConfigBuilder, Sample, SampleSheet};
use util::pluralize;

use crate::collect::ResultCollector;
use crate::exec::{CellRanger, SamplePipeline};
use crate::failure::{FailureStore, FsFailureStore, MessageKind};
use crate::fs::Fs;
use crate::prep::InputStaging;
use crate::settings::{MainSettings, PostSettings, PreSettings, Settings, StageSettings};
use crate::ui::Ui;

/// This struct actually runs the command-line app.
pub struct App {
    /// Interpreted command line settings
    settings: Settings,
    /// Filesystem interface
    fs: Fs,
    /// User interface
    ui: Ui,
}

impl App {
    /// Create a new `App`. Besides the shared folder, only the folders the
    /// selected stage writes to are whitelisted.
    pub fn new(settings: Settings) -> Self {
        let mut fs = Fs::new(&settings.shared_folder);
        match &settings.stage {
            StageSettings::Main(main) => fs.allow(&main.work_dir),
            StageSettings::Post(post) => {
                if let Some(export) = &post.export {
                    fs.allow(&export.folder);
                }
                if let Some(generic_output) = &post.generic_output {
                    fs.allow(generic_output);
                }
            }
            StageSettings::Pre(_) | StageSettings::Failed => (),
        }
        let ui = Ui::new(settings.verbose > 0);
        Self { settings, fs, ui }
    }

    /// Run the app, using settings to determine which stage to run.
    pub fn run(self) -> Result<()> {
        if self.ui.verbose {
            eprintln!("Using shared folder {:?}", self.settings.shared_folder);
        }
        match &self.settings.stage {
            StageSettings::Pre(pre) => self.run_pre(pre),
            StageSettings::Main(main) => self.run_main(main),
            StageSettings::Post(post) => self.run_post(post),
            StageSettings::Failed => self.run_failed(),
        }
    }

    fn run_pre(&self, pre: &PreSettings) -> Result<()> {
        let sheet = SampleSheet::from_path(&pre.sample_sheet)
            .with_context(|| format!("while reading sample sheet {:?}", pre.sample_sheet))?;
        let staged = InputStaging::new(&self.fs).stage(
            &pre.inputs,
            sheet.len(),
            pre.files_per_sample,
        )?;
        self.ui
            .completed_banner(&format!("input staging into {staged:?}"));
        Ok(())
    }

    /// Failure flags of this task's tracks are cleared first; any later error
    /// is recorded against every one of them before it is returned.
    fn run_main(&self, main: &MainSettings) -> Result<()> {
        let store = FsFailureStore::new(&self.fs);
        store
            .clear(&main.tracks)
            .context("while clearing failure flags")?;
        eprintln!(
            "Using shared folder for task {} containing {}: {:?}",
            main.task_index,
            pluralize(main.tracks.len(), "track"),
            main.tracks
        );

        if let Err(e) = self.run_task(main) {
            self.ui.failed_banner(&format!("task {}", main.task_index));
            let message = format!("{e:#}");
            let reported = store.report(&main.tracks, Some(&message), MessageKind::Error);
            if let Err(report_err) = reported {
                log::error!("could not record failure of tracks {:?}: {report_err:#}", main.tracks);
            }
            return Err(e);
        }

        self.ui
            .completed_banner(&format!("task {}", main.task_index));
        Ok(())
    }

    fn run_task(&self, main: &MainSettings) -> Result<()> {
        let mut buf = PathBuf::with_capacity(256);
        let task_folder = self.fs.task_folder(main.task_index, &mut buf).to_path_buf();
        self.fs.clean_and_ensure(&task_folder)?;
        self.fs.ensure_folder(&main.work_dir)?;

        let sheet = SampleSheet::from_path(&main.sample_sheet)
            .with_context(|| format!("while reading sample sheet {:?}", main.sample_sheet))?;
        let row = sheet.row(main.task_index)?;
        let sample = Sample::from_row(row, &main.libraries)?;
        eprintln!(
            "{} {} ({}): {:?}",
            "Sample".bold(),
            main.task_index + 1,
            sample.id,
            row.iter().collect::<Vec<_>>()
        );

        let fastqs = self.fs.fastq_input(&mut buf).to_path_buf();
        let builder = ConfigBuilder::new(&main.libraries, &fastqs);
        let tools = CellRanger::new(&main.tools, main.resources, main.dry_run, &self.fs);
        let mut pipeline = SamplePipeline::new(
            &self.fs,
            &tools,
            &self.ui,
            builder,
            &main.work_dir,
            &task_folder,
        );
        pipeline.set_dry_run(main.dry_run);

        let outcome = pipeline
            .run(&sample)
            .with_context(|| format!("while running sample {}", sample.id))?;
        for path in &outcome.relocated {
            self.ui.verbose_msg(&format!("output: {path:?}"));
        }
        Ok(())
    }

    fn run_post(&self, post: &PostSettings) -> Result<()> {
        let store = FsFailureStore::new(&self.fs);
        let failed = store.list()?;
        if !failed.is_empty() {
            log::warn!("{} reported as failed", pluralize(failed.len(), "track"));
        }
        for track in failed {
            let error = store.read_message(track, MessageKind::Error)?;
            let warning = store.read_message(track, MessageKind::Warning)?;
            log::warn!("track {track} failed: {}", error.trim());
            if !warning.is_empty() {
                log::warn!("track {track} warning: {}", warning.trim());
            }
        }

        let collected = ResultCollector::new(&self.fs, &self.ui).collect(post)?;
        self.ui
            .completed_banner(&format!("collected outputs of {}", pluralize(collected, "task")));
        Ok(())
    }

    fn run_failed(&self) -> Result<()> {
        let store = FsFailureStore::new(&self.fs);
        for track in store.list()? {
            println!("{track}");
            for kind in [MessageKind::Error, MessageKind::Warning] {
                let message = store.read_message(track, kind)?;
                if !message.is_empty() {
                    eprintln!("  {} {}", kind.label().yellow(), message.trim());
                }
            }
        }
        Ok(())
    }
}
