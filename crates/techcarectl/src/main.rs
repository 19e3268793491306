//! TechCare Control - CLI client for the TechCare daemon

use clap::Parser;
use owo_colors::OwoColorize;
use techcarectl::cli::Cli;
use techcarectl::commands;
use techcarectl::errors::{exit_code_for, EXIT_SUCCESS};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("techcarectl=debug")),
            )
            .init();
    }

    let code = match commands::run(cli).await {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "error:".bright_red().bold(), e);
            exit_code_for(&e)
        }
    };
    std::process::exit(code);
}
