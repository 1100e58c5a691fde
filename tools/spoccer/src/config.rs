//! Configuration inspection

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use crate::settings::SpoccerConfig;
use crate::utils::coded;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration as YAML
    #[command(about = "Print the effective configuration after all overrides")]
    Show,

    /// Check that the configured paths exist
    #[command(about = "Check configured directories and files")]
    Check,
}

pub fn handle_command(cmd: ConfigCommands, config: &SpoccerConfig) -> Result<()> {
    match cmd {
        ConfigCommands::Show => {
            print!("{}", common::to_yaml(config).map_err(coded)?);
        },
        ConfigCommands::Check => {
            let problems = check_paths(config);
            for (name, path, ok) in &problems {
                let status = if *ok { "OK".green() } else { "MISSING".red() };
                println!("  {:<8} {:<14} {}", status, name, path);
            }
            let missing = problems.iter().filter(|(_, _, ok)| !ok).count();
            if missing > 0 {
                anyhow::bail!("{} configured inputs are missing", missing);
            }
        },
    }
    Ok(())
}

/// Inputs every command may read: (name, path, exists)
fn check_paths(config: &SpoccerConfig) -> Vec<(&'static str, String, bool)> {
    let mut checks = vec![
        (
            "srcdir",
            config.srcdir.display().to_string(),
            config.srcdir.is_dir(),
        ),
        (
            "h2go.srcdir",
            config.h2go.srcdir.display().to_string(),
            config.h2go.srcdir.is_dir(),
        ),
    ];
    match &config.historian {
        Some(path) => checks.push(("historian", path.display().to_string(), path.is_file())),
        None => checks.push(("historian", "<unset>".to_string(), false)),
    }
    checks
}
