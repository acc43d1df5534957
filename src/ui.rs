use std::cell::RefCell;
use std::path::Path;

use colored::Colorize;

use util::Timer;

/// All interactions with the text UI should go through this struct.
pub struct Ui {
    /// -v setting, displays extra text info to user
    pub verbose: bool,
    /// keeps track of time for each pass.
    /// RefCell so passes can be timed through a shared reference.
    timer: RefCell<Timer>,
}

impl Ui {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            timer: RefCell::new(Timer::now()),
        }
    }

    pub fn start_timer(&self) {
        self.timer.borrow_mut().reset();
    }

    pub fn print_elapsed(&self, what: &str) {
        let timer = self.timer.borrow();
        if self.verbose {
            eprintln!("{what} took {:.1?}", timer.elapsed());
        } else {
            timer.log_elapsed(what);
        }
    }

    /// Announce an external tool about to run.
    pub fn run_banner(&self, what: &str) {
        eprintln!("{} {}", "RUN".cyan().bold(), what);
    }

    pub fn completed_banner(&self, what: &str) {
        eprintln!("{} {}", "COMPLETED".green().bold(), what);
    }

    pub fn failed_banner(&self, what: &str) {
        eprintln!("{} {}", "FAILED".red().bold(), what);
    }

    /// Echo a rendered config file before it is used.
    pub fn print_config(&self, path: &Path, text: &str) {
        log::info!("config {path:?}:\n{text}");
        if self.verbose {
            eprintln!("{}\n{}", format!("{path:?}").magenta(), text);
        }
    }

    pub fn verbose_msg(&self, msg: &str) {
        if self.verbose {
            eprintln!("{}", msg);
        }
    }
}
