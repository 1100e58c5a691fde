//! Spoccer - maplayer tag reconciliation
//!
//! Validates the maplayer tables, lists the parameter matches of a
//! location, manages its sync level and reconciles its tags with the
//! historian export and the H2GO file registry.

mod config;
mod matches;
mod reconcile;
mod registry;
mod settings;
mod utils;

use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use common::LogConfig;
use spoc_reconcile::ErrorPolicy;
use tracing::{debug, Level};

use crate::settings::{parse_datetime, SpoccerConfig};

#[derive(Parser)]
#[command(name = "spoccer")]
#[command(about = "Spoccer - maplayer tag reconciliation")]
#[command(long_about = "Spoccer - maplayer tag reconciliation

Maplayers:
  validate    Load and validate all maplayer tables
  save        Validate and write the tables to the destination dir
  level       Show or advance the sync level of a location

Reconciliation:
  matches     List the parameter matches of a location
  reconcile   Sync a location with the historian and H2GO exports

Examples:
  spoccer validate --srcdir data/maplayers
  spoccer matches HL000001
  spoccer level HL000001 --set LIVE
  spoccer reconcile HL000001 --start 2024-01-01 --skip-errors

Configuration is read from spoccer.yaml or spoccer.toml and SPOCCER_* env vars.")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Configuration file (default: spoccer.yaml or spoccer.toml in the working dir)
    #[arg(short = 'c', long = "config-path", global = true)]
    config_path: Option<PathBuf>,

    /// Maplayer source directory
    #[arg(long, global = true)]
    srcdir: Option<PathBuf>,

    /// Maplayer destination directory
    #[arg(long, global = true)]
    dstdir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate all maplayer tables
    Validate,

    /// Validate and write the tables to the destination dir
    Save,

    /// List the parameter matches of a location
    Matches {
        /// Top-level location id (HL code)
        root: String,

        /// Include matches without tag or file
        #[arg(short, long)]
        all: bool,
    },

    /// Show or advance the sync level of a location
    Level {
        /// Top-level location id (HL code)
        root: String,

        /// Level to move to: LIVE, VALIDATIE, INTERPOLATIE or DEBIET
        #[arg(long)]
        set: Option<String>,

        /// Column holding the level (default from config)
        #[arg(long)]
        column: Option<String>,
    },

    /// Sync a location with the historian and the H2GO exports
    Reconcile {
        /// Top-level location id (HL code)
        root: String,

        /// Level to reach (default: the next level)
        #[arg(long)]
        level: Option<String>,

        /// Start of the query window
        #[arg(long, value_parser = parse_datetime)]
        start: Option<NaiveDateTime>,

        /// End of the query window (default: now)
        #[arg(long, value_parser = parse_datetime)]
        end: Option<NaiveDateTime>,

        /// Historian export file
        #[arg(long)]
        historian: Option<PathBuf>,

        /// Log and skip failing matches instead of aborting
        #[arg(long)]
        skip_errors: bool,

        /// Delay between historian queries in milliseconds
        #[arg(long)]
        throttle_ms: Option<u64>,
    },

    /// Configuration inspection
    #[command(about = "Configuration inspection utilities")]
    Config {
        #[command(subcommand)]
        command: config::ConfigCommands,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let mut config = SpoccerConfig::load(cli.config_path.as_deref())?;
    if let Some(srcdir) = cli.srcdir {
        config.srcdir = srcdir;
    }
    if let Some(dstdir) = cli.dstdir {
        config.dstdir = dstdir;
    }

    common::init_with_config(LogConfig {
        service_name: "spoccer".to_string(),
        console_level: if cli.verbose { Level::DEBUG } else { Level::INFO },
        log_dir: config.log.dir.clone(),
        enable_json: config.log.json,
        ansi: !cli.no_color,
    })
    .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;
    debug!("Maplayers: {} -> {}", config.srcdir.display(), config.dstdir.display());

    match cli.command {
        Commands::Validate => registry::handle_validate(&config)?,
        Commands::Save => registry::handle_save(&config)?,
        Commands::Matches { root, all } => matches::handle_matches(&config, &root, all)?,
        Commands::Level { root, set, column } => {
            registry::handle_level(&config, &root, set.as_deref(), column.as_deref())?;
        },
        Commands::Reconcile {
            root,
            level,
            start,
            end,
            historian,
            skip_errors,
            throttle_ms,
        } => {
            if start.is_some() {
                config.start = start;
            }
            if end.is_some() {
                config.end = end;
            }
            if historian.is_some() {
                config.historian = historian;
            }
            if skip_errors {
                config.policy = ErrorPolicy::LogAndSkip;
            }
            if let Some(throttle_ms) = throttle_ms {
                config.throttle_ms = throttle_ms;
            }
            reconcile::handle_reconcile(&config, &root, level.as_deref())?;
        },
        Commands::Config { command } => config::handle_command(command, &config)?,
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_reconcile_args() {
        let cli = Cli::try_parse_from([
            "spoccer",
            "--srcdir",
            "data",
            "reconcile",
            "HL000001",
            "--start",
            "2024-01-01",
            "--skip-errors",
        ])
        .unwrap();
        assert_eq!(cli.srcdir, Some(PathBuf::from("data")));
        match cli.command {
            Commands::Reconcile {
                root,
                start,
                skip_errors,
                level,
                ..
            } => {
                assert_eq!(root, "HL000001");
                assert_eq!(start, Some(parse_datetime("2024-01-01").unwrap()));
                assert!(skip_errors);
                assert_eq!(level, None);
            },
            _ => panic!("expected reconcile"),
        }
    }

    #[test]
    fn test_invalid_start_is_rejected() {
        assert!(Cli::try_parse_from(["spoccer", "reconcile", "HL000001", "--start", "jan"]).is_err());
    }
}
