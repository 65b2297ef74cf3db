//! docvault command-line tool.
//!
//! - `docvault view` / `docvault check` - Access decisions
//! - `docvault viewed` - Documents opened today
//! - `docvault anon` / `docvault cache` - Client-side helpers
//! - `docvault admin` - Manage accounts and documents (SQL backend)

use std::process::ExitCode;

use clap::Parser;
use docvault::cli::{Cli, run};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
