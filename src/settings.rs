use std::path::{self, PathBuf};

use anyhow::Result;

use sheet::{
    AntibodyLibrary, GexLibrary, Libraries, LibraryType, MultiplexingLibrary, VdjLibrary,
};

use crate::args::{Args, LibraryArgs, MainArgs, PostArgs, PreArgs, Stage, ToolArgs};
use crate::fs::compile_patterns;

/// Prefix of the dynamically-numbered input variables (`input_0_0`, `input_0_1`, ...).
const INPUT_VAR_PREFIX: &str = "input_0_";
/// Files left out of an export when alignments are excluded.
const BAM_PATTERNS: [&str; 2] = ["*.bam", "*.bam.bai"];

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{library} library is enabled but {variable} is not set")]
    MissingLibrarySetting {
        library: LibraryType,
        variable: &'static str,
    },
    #[error("multiplexing capture needs the gene expression library to be enabled")]
    MultiplexingWithoutGex,
    #[error("invalid track index '{0}' in track_indices")]
    InvalidTrackIndex(String),
    #[error("track_indices is empty")]
    NoTracks,
    #[error("results export is enabled but POST_COMMAND_EXPORT_FOLDER is not set")]
    MissingExportFolder,
}

/// Settings are like Args, except all the logic has been applied,
/// so e.g. paths are absolute and enabled libraries are complete.
/// Nothing reads the environment after these are built.
#[derive(Debug)]
pub struct Settings {
    pub shared_folder: PathBuf,
    pub verbose: u8,
    pub stage: StageSettings,
}

#[derive(Debug)]
pub enum StageSettings {
    Pre(PreSettings),
    Main(MainSettings),
    Post(PostSettings),
    Failed,
}

#[derive(Debug)]
pub struct PreSettings {
    pub sample_sheet: PathBuf,
    pub files_per_sample: usize,
    pub inputs: Vec<PathBuf>,
}

#[derive(Debug)]
pub struct MainSettings {
    pub task_index: usize,
    pub tracks: Vec<u32>,
    pub sample_sheet: PathBuf,
    pub libraries: Libraries,
    pub resources: Resources,
    pub tools: ToolPaths,
    pub work_dir: PathBuf,
    pub dry_run: bool,
}

/// Compute resources handed to cellranger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resources {
    pub threads: u32,
    pub memory_gb: u64,
}

impl Resources {
    /// Leaves 1 GB of `max_memory_mb` for everything besides cellranger.
    pub fn new(threads: u32, max_memory_mb: u64) -> Self {
        Self {
            threads,
            memory_gb: (max_memory_mb / 1024).saturating_sub(1).max(1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ToolPaths {
    pub cellranger: PathBuf,
    pub bamtofastq: PathBuf,
    pub samtools: PathBuf,
}

#[derive(Debug)]
pub struct PostSettings {
    /// Without one, task outputs stay in the shared folder
    pub generic_output: Option<PathBuf>,
    pub export: Option<Export>,
}

/// Where to copy task outputs, and which file names to leave behind.
#[derive(Debug)]
pub struct Export {
    pub folder: PathBuf,
    pub exclude: Vec<glob::Pattern>,
}

impl TryFrom<Args> for Settings {
    type Error = anyhow::Error;
    fn try_from(args: Args) -> Result<Self, Self::Error> {
        let stage = match args.stage {
            Stage::Pre(pre) => StageSettings::Pre(pre.try_into()?),
            Stage::Main(main) => StageSettings::Main(main.try_into()?),
            Stage::Post(post) => StageSettings::Post(post.try_into()?),
            Stage::Failed => StageSettings::Failed,
        };
        Ok(Self {
            shared_folder: path::absolute(&args.shared_folder)?,
            verbose: args.verbose,
            stage,
        })
    }
}

impl TryFrom<PreArgs> for PreSettings {
    type Error = anyhow::Error;
    fn try_from(args: PreArgs) -> Result<Self, Self::Error> {
        let inputs = if args.inputs.is_empty() {
            inputs_from_env()
        } else {
            args.inputs.into_iter().map(PathBuf::from).collect()
        };
        Ok(Self {
            sample_sheet: path::absolute(&args.sample_sheet)?,
            files_per_sample: args.files_per_sample,
            inputs,
        })
    }
}

/// Values of `input_0_0`, `input_0_1`, ... up to the first one that is unset.
fn inputs_from_env() -> Vec<PathBuf> {
    (0..)
        .map_while(|i| std::env::var_os(format!("{INPUT_VAR_PREFIX}{i}")))
        .map(PathBuf::from)
        .collect()
}

impl TryFrom<MainArgs> for MainSettings {
    type Error = anyhow::Error;
    fn try_from(args: MainArgs) -> Result<Self, Self::Error> {
        Ok(Self {
            task_index: args.task_index,
            tracks: parse_tracks(&args.track_indices)?,
            sample_sheet: path::absolute(&args.sample_sheet)?,
            libraries: args.libraries.try_into()?,
            resources: Resources::new(args.max_threads, args.max_memory),
            tools: args.tools.try_into()?,
            work_dir: path::absolute(&args.work_dir)?,
            dry_run: args.dry_run,
        })
    }
}

/// Parse comma-separated track indices, e.g. "0,1,2".
fn parse_tracks(text: &str) -> Result<Vec<u32>, Error> {
    let tracks = text
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().map_err(|_| Error::InvalidTrackIndex(s.to_owned())))
        .collect::<Result<Vec<u32>, Error>>()?;
    if tracks.is_empty() {
        return Err(Error::NoTracks);
    }
    Ok(tracks)
}

/// Treat empty values the same as unset ones.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn required(
    value: Option<String>,
    library: LibraryType,
    variable: &'static str,
) -> Result<String, Error> {
    non_empty(value).ok_or(Error::MissingLibrarySetting { library, variable })
}

impl TryFrom<LibraryArgs> for Libraries {
    type Error = anyhow::Error;
    fn try_from(args: LibraryArgs) -> Result<Self, Self::Error> {
        let gex = if args.gene_expression_library {
            let ty = LibraryType::GeneExpression;
            let cmo_set = match non_empty(args.cmo_set) {
                Some(cmo_set) => Some(path::absolute(cmo_set)?),
                None => None,
            };
            Some(GexLibrary {
                id_column: required(args.gex_id_column, ty, "GEX_ID_COLUMN")?,
                reference: required(args.gex_reference, ty, "GEX_REFERENCE")?.into(),
                include_introns: args.include_introns,
                no_bam: args.no_bam,
                cmo_set,
            })
        } else {
            None
        };

        let vdj = if args.vdj_library {
            let ty = LibraryType::Vdj;
            Some(VdjLibrary {
                id_column: required(args.vdj_id_column, ty, "VDJ_ID_COLUMN")?,
                reference: required(args.vdj_reference, ty, "VDJ_REFERENCE")?.into(),
                library_type: args.vdj_library_type,
            })
        } else {
            None
        };

        let multiplexing = if args.multiplexing_capture_library {
            let ty = LibraryType::MultiplexingCapture;
            Some(MultiplexingLibrary {
                id_column: required(args.multiplexing_id_column, ty, "MULTIPLEXING_ID_COLUMN")?,
                hashing_tag_column: required(args.hashing_tag_column, ty, "HASHING_TAG_COLUMN")?,
            })
        } else {
            None
        };

        let antibody = if args.antibody_capture_library {
            let ty = LibraryType::AntibodyCapture;
            Some(AntibodyLibrary {
                id_column: required(
                    args.antibody_capture_id_column,
                    ty,
                    "ANTIBODY_CAPTURE_ID_COLUMN",
                )?,
                feature_reference: required(args.feature_reference, ty, "FEATURE_REFERENCE")?
                    .into(),
            })
        } else {
            None
        };

        // the tag pass re-derives gene expression reads; it has nothing to run on without them:
        if multiplexing.is_some() && gex.is_none() {
            return Err(Error::MultiplexingWithoutGex.into());
        }

        Ok(Self {
            sample_id_column: args.sample_id_column,
            cell_count_column: non_empty(args.cell_count_column),
            gex,
            vdj,
            multiplexing,
            antibody,
        })
    }
}

impl TryFrom<ToolArgs> for ToolPaths {
    type Error = anyhow::Error;
    fn try_from(args: ToolArgs) -> Result<Self, Self::Error> {
        Ok(Self {
            cellranger: path::absolute(&args.cellranger_dir)?.join("cellranger"),
            bamtofastq: args.bamtofastq.into(),
            samtools: args.samtools.into(),
        })
    }
}

impl TryFrom<PostArgs> for PostSettings {
    type Error = anyhow::Error;
    fn try_from(args: PostArgs) -> Result<Self, Self::Error> {
        let export = if args.export_results {
            let folder = non_empty(args.export_folder).ok_or(Error::MissingExportFolder)?;
            let exclude = if args.export_exclude_bam {
                compile_patterns(&BAM_PATTERNS)?
            } else {
                Vec::new()
            };
            Some(Export {
                folder: path::absolute(folder)?,
                exclude,
            })
        } else {
            None
        };
        let generic_output = match non_empty(args.generic_output) {
            Some(dir) => Some(path::absolute(dir)?),
            None => None,
        };
        Ok(Self {
            generic_output,
            export,
        })
    }
}
