//! Binary entry point for tagsweep.
//!
//! This binary provides the CLI interface for the tagsweep retention engine.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tagsweep::config::DEFAULT_CONFIG_FILE;
use tagsweep::observability::{self, LoggingConfig};
use tagsweep::registry::AcrClient;
use tagsweep::{RetentionService, TagsweepConfig};

/// Tagsweep - Retention policies for container registry tags.
#[derive(Parser)]
#[command(name = "tagsweep")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Apply retention to the configured repositories.
    Run {
        /// Report what would be deleted without deleting anything.
        #[arg(long)]
        dry_run: bool,

        /// Delete tags that match no group.
        #[arg(long)]
        delete_others: bool,

        /// Only process this repository (repeatable).
        #[arg(short, long = "repository", value_name = "NAME")]
        repositories: Vec<String>,
    },

    /// Validate the configuration and show the tag groups.
    Validate,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli.config, &cli.command) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    let logging = LoggingConfig::from_settings(Some(&config.logging), cli.verbose);
    if let Err(e) = observability::init(&logging) {
        eprintln!("Failed to initialize observability: {e}");
        return ExitCode::FAILURE;
    }

    match run_command(cli.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

/// Loads the file, then applies environment and CLI overrides.
fn load_config(path: &Path, command: &Commands) -> tagsweep::Result<TagsweepConfig> {
    let mut config = TagsweepConfig::load_from_file(path)?.with_env_overrides();
    if let Commands::Run {
        dry_run,
        delete_others,
        ..
    } = command
    {
        // Flags only switch behavior on; an absent flag keeps the file/env value.
        if *dry_run {
            config = config.with_dry_run(true);
        }
        if *delete_others {
            config = config.with_delete_others(true);
        }
    }
    Ok(config)
}

async fn run_command(command: Commands, config: TagsweepConfig) -> anyhow::Result<()> {
    config.validate()?;

    match command {
        Commands::Run { repositories, .. } => cmd_run(&config, repositories).await,
        Commands::Validate => cmd_validate(&config),
    }
}

async fn cmd_run(config: &TagsweepConfig, only: Vec<String>) -> anyhow::Result<()> {
    let repositories = select_repositories(config, only)?;
    let address = config.registry_address()?;
    let client = Arc::new(
        AcrClient::from_env(address).context("failed to build registry client")?,
    );
    let service = RetentionService::new(client, config)?;

    let summary = service.run(&repositories).await;

    if summary.has_listing_failures() {
        let skipped: Vec<&str> = summary
            .reports
            .iter()
            .filter(|r| !r.was_listed())
            .map(|r| r.repository.as_str())
            .collect();
        bail!("could not list tags for: {}", skipped.join(", "));
    }
    Ok(())
}

fn select_repositories(config: &TagsweepConfig, only: Vec<String>) -> anyhow::Result<Vec<String>> {
    if only.is_empty() {
        return Ok(config.repositories.clone());
    }
    if let Some(unknown) = only.iter().find(|r| !config.repositories.contains(r)) {
        bail!("repository '{unknown}' is not in the configuration");
    }
    Ok(only)
}

fn cmd_validate(config: &TagsweepConfig) -> anyhow::Result<()> {
    let groups = config.compile_groups()?;

    println!("Registry:      {}", config.registry_address()?);
    println!("Repositories:  {}", config.repositories.join(", "));
    println!("Dry run:       {}", config.dry_run);
    println!("Delete others: {}", config.delete_others);
    println!("Concurrency:   {}", config.max_concurrency);
    if groups.is_empty() {
        println!("Tag groups:    (none)");
    } else {
        println!("Tag groups:");
        for group in &groups {
            println!(
                "  {:<16} keep {:<4} /{}/",
                group.name(),
                group.keep_count(),
                group.spec().pattern
            );
        }
    }
    Ok(())
}
