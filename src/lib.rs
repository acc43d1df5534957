/// High-level command line app
mod app;
/// Definition of command-line args
mod args;
/// Gathering task outputs after all tasks ran
mod collect;
/// External tools and the multi-pass run of a sample
mod exec;
/// Failed-track records in the shared folder
mod failure;
/// Filesystem operations
mod fs;
/// Staging inputs before any task runs
mod prep;
/// Validated command-line and environment settings
mod settings;
/// Text UI
mod ui;

// exported for tests:
pub use app::App;
pub use args::Args;
pub use settings::Settings;

/// Run the command-line app.
pub fn run() -> Result<(), anyhow::Error> {
    use clap::Parser;
    let args = Args::parse();

    // INTERPRET SETTINGS ///////////////
    let settings: Settings = args.try_into()?;

    let log_level = match settings.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    simple_logging::log_to_stderr(log_level);

    // RUN THE STAGE /////////////////
    let app = App::new(settings);
    app.run()?;

    Ok(())
}
