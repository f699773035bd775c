pub mod analysis;
pub mod cli;
pub mod commands;
pub mod errors;
pub mod models;

use clap::Parser;
use std::process::ExitCode;

pub use errors::{Error, Result};

pub fn run() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = cli::Cli::parse();
    match cli::execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
