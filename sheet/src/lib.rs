/// Tab-separated sample sheet and typed row access
mod sample_sheet;
pub use sample_sheet::{FastqIds, Row, Sample, SampleSheet};

/// Library types that can be enabled for a run
mod libraries;
pub use libraries::{
    AntibodyLibrary, GexLibrary, Libraries, LibraryType, MultiplexingLibrary, VdjLibrary,
};

/// Sectioned config file consumed by `cellranger multi`
mod run_config;
pub use run_config::{RunConfig, Section, SectionKind};

/// Builds a `RunConfig` for each pass of a sample
mod builder;
pub use builder::ConfigBuilder;

// separates hashing tags in the tag column e.g. "HT1,HT2"
pub const TAG_DELIM: char = ',';

/// Task folder entry `<sample>_DEMUX` holds the multiplexed run's outs.
pub const DEMUX_SUFFIX: &str = "DEMUX";
/// Task folder entry `<sample>_BAM2FQ` holds the re-derived fastqs.
pub const BAM2FQ_SUFFIX: &str = "BAM2FQ";

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Column '{column}' not present in selected sample sheet file with columns {available:?}")]
    MissingColumn {
        column: String,
        available: Vec<String>,
    },
    #[error("Sample sheet has {rows} rows; there is no row for task index {index}")]
    RowOutOfRange { index: usize, rows: usize },
    #[error("Invalid cell count '{value}' in column '{column}'")]
    InvalidCellCount { column: String, value: String },
    #[error("Hashing tag '{0}' is reserved for outputs of the multiplexed run")]
    ReservedTag(String),
    #[error("Hashing tag '{0}' appears more than once")]
    DuplicateTag(String),
    #[error("{0} library is required for this pass but is not enabled")]
    LibraryNotEnabled(LibraryType),
    #[error("Unable to read sample sheet")]
    Csv(#[from] csv::Error),
}
