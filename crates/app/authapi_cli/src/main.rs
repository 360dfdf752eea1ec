//! `authapi`: operator CLI for session tokens and role administration.
//!
//! Results go to stdout as JSON; logs go to stderr.

pub use self::error::{Error, Result};
mod error;

mod cli;
mod commands;

use std::process::ExitCode;

use clap::Parser;
use cli::Cli;
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,authapi_core=debug".into()),
        )
        .init();

    let args = Cli::parse();

    match commands::run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
