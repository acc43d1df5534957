use std::borrow::Cow;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;

use util::{pluralize, HashMap, PathEncodingError};

use crate::fs::Fs;

use super::Error;

/// Extensions rewritten when staging, so the counting tool recognizes the files.
const EXTENSIONS: &[(&str, &str)] = &[(".fq.gz", ".fastq.gz"), (".fq", ".fastq")];

/// Rewrite `.fq.gz` to `.fastq.gz` and `.fq` to `.fastq`; other names pass through.
pub fn normalize_name(name: &str) -> Cow<'_, str> {
    for (from, to) in EXTENSIONS {
        if let Some(stem) = name.strip_suffix(from) {
            return Cow::Owned(format!("{stem}{to}"));
        }
    }
    Cow::Borrowed(name)
}

/// Every sample sheet row needs exactly `files_per_sample` inputs.
pub fn validate_input_count(rows: usize, files_per_sample: usize, inputs: usize) -> Result<(), Error> {
    let mismatch = |expected| Error::InputCountMismatch {
        rows,
        files_per_sample,
        inputs,
        expected,
    };
    match rows.checked_mul(files_per_sample) {
        Some(expected) if expected == inputs => Ok(()),
        Some(expected) => Err(mismatch(expected.to_string())),
        None => Err(mismatch(format!("more than {}", usize::MAX))),
    }
}

/// Lays out the task inputs in a single staging folder, one symlink per input.
pub struct InputStaging<'a> {
    fs: &'a Fs,
}

impl<'a> InputStaging<'a> {
    pub fn new(fs: &'a Fs) -> Self {
        Self { fs }
    }
}

impl InputStaging<'_> {
    /// Validate `inputs` against the sample sheet, then replace the contents of the
    /// staging folder with one symlink per input. Returns the staging folder.
    pub fn stage(&self, inputs: &[PathBuf], rows: usize, files_per_sample: usize) -> Result<PathBuf> {
        validate_input_count(rows, files_per_sample, inputs.len())?;

        // resolve all names before touching anything:
        let mut seen: HashMap<String, &Path> = HashMap::default();
        let mut links = Vec::with_capacity(inputs.len());
        for input in inputs {
            let name = input
                .file_name()
                .ok_or_else(|| Error::NoFileName(input.display().to_string()))?
                .to_str()
                .ok_or(PathEncodingError)?;
            let staged = normalize_name(name).into_owned();
            if let Some(other) = seen.insert(staged.clone(), input) {
                return Err(Error::DuplicateName(
                    other.display().to_string(),
                    input.display().to_string(),
                    staged,
                )
                .into());
            }
            links.push((input, staged));
        }

        let mut staging_dir = PathBuf::with_capacity(128);
        self.fs.fastq_input(&mut staging_dir);
        self.fs
            .clean_and_ensure(&staging_dir)
            .context("while preparing fastq staging folder")?;

        for (input, staged) in &links {
            let target = input
                .canonicalize()
                .with_context(|| format!("while resolving input {input:?}"))?;
            self.fs.symlink(&target, staging_dir.join(staged))?;
        }

        let mut names: Vec<&str> = inputs
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
            .collect();
        names.sort_unstable();
        eprintln!(
            "{} {}:\n{}",
            "Staged".green(),
            pluralize(names.len(), "input file"),
            names.join("\n")
        );

        Ok(staging_dir)
    }
}
