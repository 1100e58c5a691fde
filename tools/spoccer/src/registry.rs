//! Maplayer commands: validate, save and sync levels

use anyhow::{Context, Result};
use colored::Colorize;
use spoc_model::SyncLevel;
use spoc_reconcile::Indexer;

use crate::settings::SpoccerConfig;
use crate::utils::{coded, load_tree, load_validated};

pub fn handle_validate(config: &SpoccerConfig) -> Result<()> {
    let tree = load_tree(config)?;
    println!();
    for table in tree.iter() {
        println!(
            "{} {:<18} {:>6} rows",
            "-".bright_cyan(),
            table.name().bright_yellow(),
            table.len()
        );
    }

    tree.validate()
        .map_err(coded)
        .context("Maplayer validation failed")?;
    println!("\n{} All tables valid", "OK".green());
    Ok(())
}

/// Load, validate and write the tables to the destination dir unchanged
pub fn handle_save(config: &SpoccerConfig) -> Result<()> {
    let tree = load_validated(config)?;
    tree.save(&config.dstdir, &config.csv)
        .map_err(coded)
        .with_context(|| format!("Failed to save maplayers to {}", config.dstdir.display()))?;
    println!(
        "{} Saved {} tables to {}",
        "OK".green(),
        tree.iter().count(),
        config.dstdir.display()
    );
    Ok(())
}

/// Show the sync level of a location, or advance it by one and save
pub fn handle_level(
    config: &SpoccerConfig,
    root: &str,
    set: Option<&str>,
    column: Option<&str>,
) -> Result<SyncLevel> {
    let column = column.unwrap_or(&config.sync_column);
    let mut tree = load_validated(config)?;
    let indexer = Indexer::new(&tree, root).map_err(coded)?;
    let current = indexer.sync_level(&tree, column).map_err(coded)?;

    let Some(requested) = set else {
        let ids = indexer.sublocation_ids();
        println!(
            "{} {} {}: {} ({} SL, {} WS)",
            "*".bright_blue(),
            root.bright_yellow(),
            column,
            current.to_string().bright_green(),
            ids.sl.len(),
            ids.ws.len()
        );
        return Ok(current);
    };

    let requested: SyncLevel = requested.parse().map_err(coded)?;
    indexer
        .set_sync_level(&mut tree, requested, column)
        .map_err(coded)
        .with_context(|| format!("Cannot move {} to {}", root, requested))?;
    tree.save(&config.dstdir, &config.csv)
        .map_err(coded)
        .with_context(|| format!("Failed to save maplayers to {}", config.dstdir.display()))?;
    println!(
        "{} {} {}: {} -> {}",
        "OK".green(),
        root.bright_yellow(),
        column,
        current,
        requested.to_string().bright_green()
    );
    Ok(requested)
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::utils::test_support::{fixture_config, fixture_dir};
    use tempfile::TempDir;

    #[test]
    fn test_save_round_trips_bytes() {
        let dir = TempDir::new().unwrap();
        let config = fixture_config(dir.path());
        handle_save(&config).unwrap();

        for name in ["HL.csv", "SL.csv", "WS.csv", "WS_VALIDATIE.csv"] {
            let original = std::fs::read(fixture_dir().join(name)).unwrap();
            let saved = std::fs::read(config.dstdir.join(name)).unwrap();
            assert_eq!(original, saved, "{name} changed on save");
        }
    }

    #[test]
    fn test_level_show_and_set() {
        let dir = TempDir::new().unwrap();
        let config = fixture_config(dir.path());
        assert_eq!(
            handle_level(&config, "HL000001", None, None).unwrap(),
            SyncLevel::Unset
        );

        let level = handle_level(&config, "HL000001", Some("live"), None).unwrap();
        assert_eq!(level, SyncLevel::Live);
        let hl = std::fs::read_to_string(config.dstdir.join("HL.csv")).unwrap();
        assert!(hl.contains("LIVE"));
    }

    #[test]
    fn test_level_skip_is_rejected() {
        let dir = TempDir::new().unwrap();
        let config = fixture_config(dir.path());
        let err = handle_level(&config, "HL000001", Some("VALIDATIE"), None).unwrap_err();
        assert!(format!("{err:#}").contains("[SYNC_LEVEL_SKIP]"));
        assert!(!config.dstdir.exists());
    }

    #[test]
    fn test_unknown_root() {
        let dir = TempDir::new().unwrap();
        let err = handle_level(&fixture_config(dir.path()), "HL999999", None, None).unwrap_err();
        assert!(err.to_string().starts_with("[NOT_FOUND]"));
    }
}
