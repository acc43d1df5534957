/// Symlinks input fastqs into the shared staging folder
mod staging;
pub use staging::InputStaging;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(
        "Number of lines in selected sample sheet ({rows}) does not match number of samples. \
         Input Files: {inputs}. Files per Sample: {files_per_sample} (expected {expected} input files)."
    )]
    InputCountMismatch {
        rows: usize,
        files_per_sample: usize,
        inputs: usize,
        expected: String,
    },
    #[error("Input path has no file name: {0}")]
    NoFileName(String),
    #[error("Inputs {0} and {1} both stage as \"{2}\"")]
    DuplicateName(String, String, String),
}
