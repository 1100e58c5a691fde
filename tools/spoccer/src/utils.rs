//! Helpers shared by the spoccer commands

use anyhow::{Context, Result};
use errors::{SpocError, SpocErrorTrait};
use spoc_registry::SpocTree;
use tracing::debug;

use crate::settings::SpoccerConfig;

/// Prefix the error code so scripts can grep for it
pub fn coded(err: SpocError) -> anyhow::Error {
    anyhow::anyhow!("[{}] {}", err.error_code(), err)
}

/// Load every maplayer table from the configured source dir
pub fn load_tree(config: &SpoccerConfig) -> Result<SpocTree> {
    debug!("Loading maplayers from {}", config.srcdir.display());
    let mut tree = SpocTree::new();
    tree.load(&config.srcdir, &config.csv)
        .map_err(coded)
        .with_context(|| format!("Failed to load maplayers from {}", config.srcdir.display()))?;
    Ok(tree)
}

/// Load and validate, failing on the first schema violation
pub fn load_validated(config: &SpoccerConfig) -> Result<SpocTree> {
    let tree = load_tree(config)?;
    tree.validate()
        .map_err(coded)
        .context("Maplayer validation failed")?;
    Ok(tree)
}


#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::test_support::fixture_config;
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_coded_prefixes_error_code() {
        let err = coded(SpocError::not_found("location HL999999 in HL"));
        assert!(err.to_string().starts_with("[NOT_FOUND]"));
    }

    #[test]
    fn test_load_validated_fixture() {
        let dir = TempDir::new().unwrap();
        let tree = load_validated(&fixture_config(dir.path())).unwrap();
        assert_eq!(tree.table("HL").unwrap().len(), 2);
    }

    #[test]
    fn test_load_missing_dir_has_context() {
        let dir = TempDir::new().unwrap();
        let mut config = fixture_config(dir.path());
        config.srcdir = dir.path().join("absent");
        let err = load_tree(&config).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to load maplayers"));
        assert!(format!("{err:#}").contains("[IO_ERROR]"));
    }
}
