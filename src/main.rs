//! Stepgen CLI: liquid-handling protocol step generation.

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "stepgen",
    version,
    about = "Liquid-handling step generation with simulated robot state and BLAKE3 fingerprints"
)]
struct Cli {
    #[command(subcommand)]
    command: stepgen::cli::Commands,
}

fn main() {
    stepgen::logging::init();
    let cli = Cli::parse();
    if let Err(e) = stepgen::cli::dispatch(cli.command) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
