/// Run a subprocess
mod run_cmd;
pub use run_cmd::run_cmd;

/// Text extraction from external tool output
mod scrape;
pub use scrape::{parse_assigned_cells, parse_gex_library_id};

/// Interface to the external tools, plus the real implementation
mod tools;
pub use tools::{AssignedCellCount, CellRanger, ExternalTools, LibraryId, MultiRun};

/// Working-directory paths produced and consumed by the passes
mod layout;
pub use layout::WorkLayout;

/// Drives all passes of one sample
mod pipeline;
pub use pipeline::SamplePipeline;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to start {program}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Lost output stream of child process {0}")]
    OutputStream(String),
    #[error(
        "System call returned a non-zero exit status ({status}) for command '{command}'.\n\
         stdout: {stdout}\nstderr: {stderr}"
    )]
    CommandFailed {
        command: String,
        status: std::process::ExitStatus,
        stdout: String,
        stderr: String,
    },
    #[error("Expected {what} not found in {path}")]
    MissingArtifact { what: &'static str, path: String },
}
