use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args as ClapArgs, Parser, Subcommand};

const CMD_NAME: &str = "crmp";
const DEFAULT_WORK_DIR: &str = ".";
const DEFAULT_VDJ_TYPE: &str = "VDJ-T";

/// Stores our command-line args format.
///
/// Every option can also be set through the environment variable the hosting
/// platform exports for it.
#[derive(Parser, Debug)]
#[command(name = CMD_NAME, version, about = None, long_about = None)]
pub struct Args {
    /// Storage root shared by every task of the job
    #[arg(short, long, value_name = "DIR", env = "shared_folder")]
    pub shared_folder: String,

    /// Print additional debugging info (repeat for more)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub stage: Stage,
}

#[derive(Subcommand, Debug)]
pub enum Stage {
    /// Stage input fastqs into the shared folder
    Pre(PreArgs),
    /// Run all passes for one sample sheet row
    Main(MainArgs),
    /// Collect task outputs
    Post(PostArgs),
    /// List failed tracks and their messages
    Failed,
}

#[derive(ClapArgs, Debug)]
pub struct PreArgs {
    /// Tab-separated sample sheet, one row per sample
    #[arg(long, value_name = "FILE", env = "SAMPLE_SHEET")]
    pub sample_sheet: String,

    /// Number of input files belonging to each sample
    #[arg(long, value_name = "N", env = "NUMBER_FILES_PER_SAMPLE")]
    pub files_per_sample: usize,

    /// Input fastq (repeatable); defaults to $input_0_0, $input_0_1, ...
    #[arg(short, long = "input", value_name = "FILE")]
    pub inputs: Vec<String>,
}

#[derive(ClapArgs, Debug)]
pub struct MainArgs {
    /// Index of the task, and of its row in the sample sheet
    #[arg(long, value_name = "N", env = "task_index")]
    pub task_index: usize,

    /// Comma-separated tracks covered by this task
    #[arg(long, value_name = "N[,N...]", env = "track_indices")]
    pub track_indices: String,

    #[arg(long, value_name = "N", env = "max_threads")]
    pub max_threads: u32,

    /// Memory available to the task, in MB
    #[arg(long, value_name = "MB", env = "max_memory")]
    pub max_memory: u64,

    /// Tab-separated sample sheet, one row per sample
    #[arg(long, value_name = "FILE", env = "SAMPLE_SHEET")]
    pub sample_sheet: String,

    /// Scratch directory for pipestances and configs
    #[arg(short, long, value_name = "DIR", default_value = DEFAULT_WORK_DIR)]
    pub work_dir: String,

    /// Run cellranger with --dry and stop after the first pass
    #[arg(short = 'n', long, env = "CELLRANGER_DRY_RUN", action = ArgAction::Set)]
    #[arg(default_value_t = false, value_parser = BoolishValueParser::new())]
    pub dry_run: bool,

    #[command(flatten)]
    pub libraries: LibraryArgs,

    #[command(flatten)]
    pub tools: ToolArgs,
}

/// Which library types to combine, and where their values live in the sample sheet.
#[derive(ClapArgs, Debug)]
pub struct LibraryArgs {
    #[arg(long, value_name = "COLUMN", env = "SAMPLE_ID_COLUMN")]
    pub sample_id_column: String,

    #[arg(long, value_name = "COLUMN", env = "CELL_COUNT_COLUMN")]
    pub cell_count_column: Option<String>,

    #[arg(long = "gex", env = "GENE_EXPRESSION_LIBRARY", action = ArgAction::Set)]
    #[arg(default_value_t = false, value_parser = BoolishValueParser::new())]
    pub gene_expression_library: bool,

    #[arg(long, value_name = "COLUMN", env = "GEX_ID_COLUMN")]
    pub gex_id_column: Option<String>,

    #[arg(long, value_name = "DIR", env = "GEX_REFERENCE")]
    pub gex_reference: Option<String>,

    #[arg(long, env = "INCLUDE_INTRONS", action = ArgAction::Set)]
    #[arg(default_value_t = false, value_parser = BoolishValueParser::new())]
    pub include_introns: bool,

    #[arg(long, env = "NO_BAM", action = ArgAction::Set)]
    #[arg(default_value_t = false, value_parser = BoolishValueParser::new())]
    pub no_bam: bool,

    /// Custom CMO reference for multiplexing
    #[arg(long, value_name = "FILE", env = "CMO_SET")]
    pub cmo_set: Option<String>,

    #[arg(long = "vdj", env = "VDJ_LIBRARY", action = ArgAction::Set)]
    #[arg(default_value_t = false, value_parser = BoolishValueParser::new())]
    pub vdj_library: bool,

    #[arg(long, value_name = "COLUMN", env = "VDJ_ID_COLUMN")]
    pub vdj_id_column: Option<String>,

    #[arg(long, value_name = "DIR", env = "VDJ_REFERENCE")]
    pub vdj_reference: Option<String>,

    /// Feature type of the VDJ library, e.g. VDJ-T or VDJ-B
    #[arg(long, value_name = "TYPE", env = "VDJ_LIBRARY_TYPE", default_value = DEFAULT_VDJ_TYPE)]
    pub vdj_library_type: String,

    #[arg(long = "multiplexing", env = "MULTIPLEXING_CAPTURE_LIBRARY", action = ArgAction::Set)]
    #[arg(default_value_t = false, value_parser = BoolishValueParser::new())]
    pub multiplexing_capture_library: bool,

    #[arg(long, value_name = "COLUMN", env = "MULTIPLEXING_ID_COLUMN")]
    pub multiplexing_id_column: Option<String>,

    /// Column holding comma-separated hashing tags
    #[arg(long, value_name = "COLUMN", env = "HASHING_TAG_COLUMN")]
    pub hashing_tag_column: Option<String>,

    #[arg(long = "antibody", env = "ANTIBODY_CAPTURE_LIBRARY", action = ArgAction::Set)]
    #[arg(default_value_t = false, value_parser = BoolishValueParser::new())]
    pub antibody_capture_library: bool,

    #[arg(long, value_name = "COLUMN", env = "ANTIBODY_CAPTURE_ID_COLUMN")]
    pub antibody_capture_id_column: Option<String>,

    #[arg(long, value_name = "FILE", env = "FEATURE_REFERENCE")]
    pub feature_reference: Option<String>,
}

/// Locations of the external tools.
#[derive(ClapArgs, Debug)]
pub struct ToolArgs {
    /// Directory containing the `cellranger` executable
    #[arg(long, value_name = "DIR", env = "CELLRANGER_DIR")]
    pub cellranger_dir: String,

    #[arg(long, value_name = "FILE", env = "bamtofastq_exec")]
    pub bamtofastq: String,

    #[arg(long, value_name = "FILE", env = "samtools")]
    pub samtools: String,
}

#[derive(ClapArgs, Debug)]
pub struct PostArgs {
    /// Folder whose subfolders become the job's generic output
    #[arg(long, value_name = "DIR", env = "output_generic_data_0")]
    pub generic_output: Option<String>,

    /// Also copy every task output to the export folder
    #[arg(long = "export", env = "POST_COMMAND_EXPORT_RESULTS", action = ArgAction::Set)]
    #[arg(default_value_t = false, value_parser = BoolishValueParser::new())]
    pub export_results: bool,

    #[arg(long, value_name = "DIR", env = "POST_COMMAND_EXPORT_FOLDER")]
    pub export_folder: Option<String>,

    /// Leave alignment files out of the export
    #[arg(long, env = "POST_COMMAND_EXPORT_EXCLUDE_BAM", action = ArgAction::Set)]
    #[arg(default_value_t = false, value_parser = BoolishValueParser::new())]
    pub export_exclude_bam: bool,
}
