use colored::Colorize;

fn main() {
    if let Err(e) = cellranger_multipass::run() {
        eprintln!("{} {e:#}", "ERROR".red().bold());
        std::process::exit(1);
    }
}
