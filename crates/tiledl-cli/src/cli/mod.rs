//! CLI for the TileDL tile acquisition engine.

mod commands;
mod selection;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use tiledl_core::config;
use tiledl_core::convert::OutputFormat;
use tiledl_core::provider::ProviderRegistry;
use tiledl_core::{Engine, EngineOptions};

use commands::{run_cache, run_completions, run_providers, run_tiles};

/// Top-level CLI for TileDL.
#[derive(Debug, Parser)]
#[command(name = "tiledl")]
#[command(about = "TileDL: download, cache and convert web map tiles", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download the tiles covering a selection and write them to the output directory.
    Run {
        /// Provider id from the provider descriptor.
        #[arg(long, short = 'p')]
        provider: String,

        /// JSON file with one polygon or a list of polygons of [lat, lng] pairs. Repeatable.
        #[arg(long, value_name = "FILE")]
        polygon: Vec<PathBuf>,

        /// Bounding box as west,south,east,north in degrees. Repeatable.
        #[arg(long, value_name = "W,S,E,N", allow_hyphen_values = true)]
        bbox: Vec<String>,

        /// Select the whole world (zoom is clamped to world_max_zoom).
        #[arg(long, conflicts_with_all = ["polygon", "bbox"])]
        world: bool,

        #[arg(long, default_value = "0", value_name = "Z")]
        min_zoom: u8,

        #[arg(long, value_name = "Z")]
        max_zoom: u8,

        /// Output format: raw, png8 or rgb565. Repeatable; defaults to raw.
        #[arg(long = "format", short = 'f', value_name = "FORMAT")]
        formats: Vec<OutputFormat>,

        /// Output root (overrides output_dir from the config file).
        #[arg(long, short = 'o', value_name = "DIR")]
        output: Option<PathBuf>,

        /// Print the final snapshot as JSON instead of a summary line.
        #[arg(long)]
        json: bool,
    },

    /// List configured providers.
    Providers {
        #[arg(long)]
        json: bool,
    },

    /// Inspect or clear the tile cache.
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },

    /// Print shell completions to stdout.
    Completions {
        shell: Shell,
    },
}

#[derive(Debug, Subcommand)]
pub enum CacheCommand {
    /// Bytes and tile count per provider.
    Usage {
        #[arg(long)]
        json: bool,
    },

    /// List cached tile coordinates for one provider.
    List {
        provider: String,
    },

    /// Remove cached tiles for one provider or for all of them.
    Clear {
        #[arg(long, conflicts_with = "all", required_unless_present = "all")]
        provider: Option<String>,

        #[arg(long)]
        all: bool,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        if let CliCommand::Completions { shell } = cli.command {
            run_completions(shell);
            return Ok(());
        }

        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let providers_path = cfg.providers_path()?;
        let providers = ProviderRegistry::load_or_init(&providers_path)
            .with_context(|| format!("loading providers from {}", providers_path.display()))?;
        if providers.is_empty() {
            tracing::warn!("no providers configured in {}", providers_path.display());
        }
        let engine = Engine::new(EngineOptions::from_config(&cfg)?, providers)?;

        match cli.command {
            CliCommand::Run {
                provider,
                polygon,
                bbox,
                world,
                min_zoom,
                max_zoom,
                formats,
                output,
                json,
            } => {
                let selection = selection::build(&polygon, &bbox, world)?;
                let args = commands::RunArgs {
                    provider,
                    selection,
                    min_zoom,
                    max_zoom,
                    formats,
                    output,
                    json,
                };
                run_tiles(&engine, args).await?;
            }
            CliCommand::Providers { json } => run_providers(&engine, json)?,
            CliCommand::Cache { command } => run_cache(&engine, command)?,
            CliCommand::Completions { .. } => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
