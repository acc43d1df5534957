use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;

use sheet::{ConfigBuilder, RunConfig, Sample};
use util::PathEncodingError;

use crate::fs::Fs;
use crate::ui::Ui;

use super::{Error, ExternalTools, MultiRun, WorkLayout};

/// Suffix of the diagnostic archive cellranger leaves in each pipestance.
const MRI_ARCHIVE_SUFFIX: &str = "mri.tgz";

/// Where a sample is in its sequence of passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassState {
    /// Combined run over all hashing tags (pass 1)
    Multiplexed,
    /// Per-tag multiomics run (pass 2) for the tag at this index
    Tag(usize),
    /// Moving pass 1 outputs into the task folder
    Relocate,
    Done,
}

/// What a successful run of a sample produced.
#[derive(Debug, Default)]
pub struct Outcome {
    /// Tags whose pass 2 completed, in order
    pub tags: Vec<String>,
    /// Everything moved into the task folder
    pub relocated: Vec<PathBuf>,
}

/// `SamplePipeline` runs every pass of one sample.
///
/// Pass 1 runs `cellranger multi` once over the multiplexed libraries. Then, for
/// each hashing tag, pass 2 re-derives fastqs from that tag's pass 1 BAM, finds
/// the gene expression library among them, and runs `cellranger multi` again
/// with gene expression, VDJ and antibody capture combined. Each tag's outputs
/// are moved into the task folder as soon as its pass finishes, so a failure in
/// a later tag leaves earlier tags in place.
///
/// Every folder a pass writes is cleaned right before that pass, so running a
/// sample again after a failure starts from a clean slate. The task folder is
/// expected to be empty; outputs are never moved over existing entries.
pub struct SamplePipeline<'a, T: ExternalTools> {
    fs: &'a Fs,
    tools: &'a T,
    ui: &'a Ui,
    builder: ConfigBuilder<'a>,
    /// Scratch space for pipestances and configs
    work_dir: &'a Path,
    /// Final home of this task's outputs
    task_folder: &'a Path,
    /// if true, stop after pass 1 (which cellranger only validates)
    dry_run: bool,
}

impl<'a, T: ExternalTools> SamplePipeline<'a, T> {
    /// Create a new `SamplePipeline`.
    pub fn new(
        fs: &'a Fs,
        tools: &'a T,
        ui: &'a Ui,
        builder: ConfigBuilder<'a>,
        work_dir: &'a Path,
        task_folder: &'a Path,
    ) -> Self {
        Self {
            fs,
            tools,
            ui,
            builder,
            work_dir,
            task_folder,
            dry_run: false,
        }
    }

    /// Set the `dry_run` variable to true or false.
    pub fn set_dry_run(&mut self, dry_run: bool) {
        self.dry_run = dry_run;
    }

    /// Run all passes of `sample`. Any error leaves the sample failed; nothing
    /// already moved into the task folder is rolled back.
    pub fn run(&self, sample: &Sample) -> Result<Outcome> {
        let layout = WorkLayout::new(self.work_dir, sample.id);
        let mut outcome = Outcome::default();
        let mut state = PassState::Multiplexed;

        loop {
            log::debug!("sample {}: {state:?}", sample.id);
            state = match state {
                PassState::Multiplexed => {
                    self.first_pass(sample, &layout)
                        .context("in multiplexed pass")?;
                    if self.dry_run {
                        eprintln!("{}", "Dry run; skipping remaining passes.".yellow());
                        PassState::Done
                    } else if sample.tags.is_empty() {
                        PassState::Relocate
                    } else {
                        PassState::Tag(0)
                    }
                }
                PassState::Tag(i) => {
                    let tag = sample.tags[i];
                    let dest = self
                        .tag_pass(sample, &layout, tag)
                        .with_context(|| format!("in pass for hashing tag {tag}"))?;
                    outcome.tags.push(tag.to_owned());
                    outcome.relocated.push(dest);
                    if i + 1 < sample.tags.len() {
                        PassState::Tag(i + 1)
                    } else {
                        PassState::Relocate
                    }
                }
                PassState::Relocate => {
                    let relocated = self
                        .relocate_first_pass(sample, &layout)
                        .context("while moving multiplexed outputs to task folder")?;
                    outcome.relocated.extend(relocated);
                    PassState::Done
                }
                PassState::Done => break,
            };
        }

        Ok(outcome)
    }

    fn first_pass(&self, sample: &Sample, layout: &WorkLayout) -> Result<()> {
        let config = self.builder.first_pass(sample);
        let config_path = layout.first_pass_config();
        self.write_config(&config_path, &config)?;

        self.fs.clean_folder(layout.first_pass_pipestance())?;
        // tag passes fill this in, one subfolder per tag:
        self.fs.clean_and_ensure(layout.bam2fq_root())?;
        self.ui.start_timer();
        self.ui
            .run_banner(&format!("cellranger multi (multiplexed) for sample {}", sample.id));
        self.tools.multi(&MultiRun {
            id: sample.id,
            config: &config_path,
            work_dir: self.work_dir,
        })?;
        self.ui.print_elapsed("Multiplexed pass");
        Ok(())
    }

    fn tag_pass(&self, sample: &Sample, layout: &WorkLayout, tag: &str) -> Result<PathBuf> {
        let bam = layout.tag_bam(tag);
        let metrics = layout.tag_metrics(tag);
        self.ui.start_timer();

        // re-derive fastqs for this tag:
        let rederived = layout.bam2fq_tag(tag);
        self.fs.clean_folder(&rederived)?;
        self.ui.run_banner(&format!("bamtofastq on {bam:?}"));
        self.tools.bam_to_fastq(&bam, &rederived)?;

        // find the gene expression library among them:
        let library_id = self.tools.gex_library_id(&bam)?;
        log::info!("gene expression library id for tag {tag}: {library_id}");
        let gex_fastqs = self.find_rederived_library(layout, &rederived, library_id.0)?;

        let force_cells = sample.force_cells(|| {
            let assigned = self.tools.assigned_cells(&metrics)?;
            log::info!("{} cells assigned to tag {tag}", assigned.0);
            Ok::<_, anyhow::Error>(assigned.0)
        })?;
        log::info!("using force-cells {force_cells} for tag {tag}");

        let config = self.builder.tag_pass(sample, &gex_fastqs, force_cells)?;
        let config_path = layout.tag_pass_config(tag);
        self.write_config(&config_path, &config)?;

        let id = layout.tag_id(tag);
        self.fs.clean_folder(layout.tag_pipestance(tag))?;
        self.ui
            .run_banner(&format!("cellranger multi (multiomics) for {id}"));
        self.tools.multi(&MultiRun {
            id: &id,
            config: &config_path,
            work_dir: self.work_dir,
        })?;

        let dest = self.relocate_tag(layout, tag)?;
        self.ui.print_elapsed(&format!("Pass for tag {tag}"));
        Ok(dest)
    }

    /// Re-derived folder whose name embeds `library_id`, e.g. `S1_1_1_HNNWJDSXX`.
    fn find_rederived_library(
        &self,
        layout: &WorkLayout,
        rederived: &Path,
        library_id: u32,
    ) -> Result<PathBuf> {
        let prefix = layout.rederived_prefix(library_id);
        let mut matches = Vec::with_capacity(1);
        for entry in self.fs.read_dir(rederived)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_str().ok_or(PathEncodingError)?;
            if name.starts_with(&prefix) && entry.file_type()?.is_dir() {
                matches.push(entry.path());
            }
        }
        matches.sort();
        if matches.len() > 1 {
            log::warn!("several folders match {prefix:?}; using the first: {matches:?}");
        }
        matches.into_iter().next().ok_or_else(|| {
            Error::MissingArtifact {
                what: "re-derived gene expression fastq folder",
                path: rederived.join(format!("{prefix}*")).display().to_string(),
            }
            .into()
        })
    }

    fn relocate_tag(&self, layout: &WorkLayout, tag: &str) -> Result<PathBuf> {
        let pipestance = layout.tag_pipestance(tag);
        let dest = self.task_folder.join(layout.tag_id(tag));
        self.fs.move_path(pipestance.join("outs"), &dest)?;

        match self.find_mri_archive(&pipestance)? {
            Some((archive, name)) => self.fs.move_path(&archive, dest.join(name))?,
            None => log::warn!("no *{MRI_ARCHIVE_SUFFIX} archive found in {pipestance:?}"),
        }
        Ok(dest)
    }

    fn find_mri_archive(&self, pipestance: &Path) -> Result<Option<(PathBuf, OsString)>> {
        for entry in self.fs.read_dir(pipestance)? {
            let entry = entry?;
            let name = entry.file_name();
            if name.to_str().ok_or(PathEncodingError)?.ends_with(MRI_ARCHIVE_SUFFIX) {
                return Ok(Some((entry.path(), name)));
            }
        }
        Ok(None)
    }

    fn relocate_first_pass(&self, sample: &Sample, layout: &WorkLayout) -> Result<Vec<PathBuf>> {
        let mut relocated = Vec::with_capacity(2);

        let dest = self
            .task_folder
            .join(layout.demux_name(!sample.tags.is_empty()));
        self.fs.move_path(layout.first_pass_outs(), &dest)?;
        relocated.push(dest);

        let bam2fq = layout.bam2fq_root();
        if self.fs.is_dir(&bam2fq)? {
            let dest = self.task_folder.join(layout.bam2fq_name());
            self.fs.move_path(&bam2fq, &dest)?;
            relocated.push(dest);
        }
        Ok(relocated)
    }

    fn write_config(&self, path: &Path, config: &RunConfig) -> Result<()> {
        let text = config.to_string();
        self.fs.clean_file(path)?;
        self.fs
            .write_file(path, &text)
            .context("while writing cellranger multi config")?;
        self.ui.print_config(path, &text);
        Ok(())
    }
}
