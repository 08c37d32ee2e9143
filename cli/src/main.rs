// Copyright (c) 2026 Choreo Contributors
// SPDX-License-Identifier: AGPL-3.0

//! # choreo CLI
//!
//! `choreo` is the control plane's command-line entry point: it serves the
//! HTTP tool surface (§4.8) that workflow workers call into, and validates
//! workflow manifests offline before they are deployed.
//!
//! ## Commands
//!
//! - `choreo serve` - run the HTTP tool surface
//! - `choreo validate <file>` - validate a workflow manifest and exit
//!   non-zero on schema, resolution, or graph errors

use anyhow::Result;
use clap::{Parser, Subcommand};

use choreo_cli::commands::{serve, validate};
use choreo_core::infrastructure::config::init_tracing;

#[derive(Parser)]
#[command(name = "choreo")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP tool surface
    Serve(serve::ServeArgs),

    /// Validate a workflow manifest file
    Validate(validate::ValidateArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => serve::run(args).await,
        Commands::Validate(args) => validate::run(args).await,
    }
}
