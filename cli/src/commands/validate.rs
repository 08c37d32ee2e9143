// Copyright (c) 2026 Choreo Contributors
// SPDX-License-Identifier: AGPL-3.0

//! `choreo validate <file>` — runs the three-phase workflow validator
//! (schema, bundle resolution, graph checks) against a manifest on disk
//! and prints the resulting report.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use choreo_core::application::validator::WorkflowValidator;
use choreo_core::infrastructure::bundle_loader::BundleLoader;

#[derive(Args)]
pub struct ValidateArgs {
    /// Path to a workflow manifest JSON file
    #[arg(value_name = "FILE")]
    file: PathBuf,
}

pub async fn run(args: ValidateArgs) -> Result<()> {
    let raw = std::fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let manifest: serde_json::Value =
        serde_json::from_str(&raw).context("manifest is not valid JSON")?;

    let base_dir = args
        .file
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));
    let validator = WorkflowValidator::new(Arc::new(BundleLoader::new(base_dir)));

    let report = validator.validate(&manifest).await;

    if report.exit_code == 0 {
        println!("{}", "✓ workflow manifest is valid".green().bold());
    } else {
        println!("{}", "✗ workflow manifest failed validation".red().bold());
    }
    println!("{}", serde_json::to_string_pretty(&report)?);

    std::process::exit(report.exit_code);
}
