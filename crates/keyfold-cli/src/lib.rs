pub mod cli;
pub mod commands;
pub mod utils;

use clap::Parser;
use cli::Keyfold;
use commands::handle_command;
use std::process;
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Run the keyfold CLI application
pub fn run_main() {
    let args = Keyfold::parse();
    init_logging();

    if let Err(e) = handle_command(args.command) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
