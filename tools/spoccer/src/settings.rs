//! Effective spoccer configuration
//!
//! Built from defaults, the optional `spoccer.yaml` / `spoccer.toml` file and
//! `SPOCCER_*` environment variables, then overridden by command line flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use spoc_reconcile::{ErrorPolicy, ReconcileOptions};
use spoc_registry::{CsvOptions, SYNC_LEVEL_COLUMN};

/// Source and destination of the H2GO exports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct H2goSettings {
    pub srcdir: PathBuf,
    pub dstdir: PathBuf,
}

impl Default for H2goSettings {
    fn default() -> Self {
        Self {
            srcdir: PathBuf::from("h2go"),
            dstdir: PathBuf::from("output/h2go"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Daily file log directory
    pub dir: Option<PathBuf>,
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpoccerConfig {
    /// Maplayer files read by every command
    pub srcdir: PathBuf,
    /// Where saved maplayer files go
    pub dstdir: PathBuf,
    pub h2go: H2goSettings,
    /// Tag time series output
    pub outdir: PathBuf,
    /// Historian export `TAGNAME;TIMESTAMP;VALUE`
    pub historian: Option<PathBuf>,
    pub sync_column: String,
    pub start: Option<NaiveDateTime>,
    /// End of the query window; now when unset
    pub end: Option<NaiveDateTime>,
    pub throttle_ms: u64,
    pub policy: ErrorPolicy,
    pub csv: CsvOptions,
    pub log: LogSettings,
}

impl Default for SpoccerConfig {
    fn default() -> Self {
        Self {
            srcdir: PathBuf::from("maplayers"),
            dstdir: PathBuf::from("output/maplayers"),
            h2go: H2goSettings::default(),
            outdir: PathBuf::from("output/tags"),
            historian: None,
            sync_column: SYNC_LEVEL_COLUMN.to_string(),
            start: None,
            end: None,
            throttle_ms: 1000,
            policy: ErrorPolicy::Raise,
            csv: CsvOptions::default(),
            log: LogSettings::default(),
        }
    }
}

impl SpoccerConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        common::load_config("spoccer", &SpoccerConfig::default(), path)
            .context("Failed to load spoccer configuration")
    }

    /// Options for one reconciliation run
    pub fn reconcile_options(&self, now: NaiveDateTime) -> Result<ReconcileOptions> {
        let start = self
            .start
            .context("No start of the query window configured (set `start` or pass --start)")?;
        let end = self.end.unwrap_or(now);
        if start >= end {
            anyhow::bail!("Query window is empty: {} is not before {}", start, end);
        }

        Ok(ReconcileOptions {
            start,
            end,
            throttle: Duration::from_millis(self.throttle_ms),
            policy: self.policy,
            outdir: self.outdir.clone(),
            csv: self.csv,
        })
    }
}

/// Accepts `2024-01-01`, `2024-01-01 06:00:00` and `2024-01-01T06:00:00`
pub fn parse_datetime(value: &str) -> Result<NaiveDateTime, String> {
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(datetime);
        }
    }
    chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(|| format!("invalid date or datetime: '{}'", value))
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use spoc_registry::Encoding;
    use tempfile::TempDir;

    fn at(value: &str) -> NaiveDateTime {
        parse_datetime(value).unwrap()
    }

    #[test]
    fn test_parse_datetime() {
        assert_eq!(at("2024-01-01").to_string(), "2024-01-01 00:00:00");
        assert_eq!(at("2024-01-01 06:15:00"), at("2024-01-01T06:15:00"));
        assert!(parse_datetime("01-01-2024").is_err());
    }

    #[test]
    fn test_file_layers_over_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("spoccer.yaml");
        std::fs::write(
            &path,
            "srcdir: data/maplayers\nstart: 2024-01-01T00:00:00\npolicy: log_and_skip\ncsv:\n  encoding: utf8\nh2go:\n  srcdir: data/h2go\n",
        )
        .unwrap();

        let config = SpoccerConfig::load(Some(&path)).unwrap();
        assert_eq!(config.srcdir, PathBuf::from("data/maplayers"));
        assert_eq!(config.dstdir, PathBuf::from("output/maplayers"));
        assert_eq!(config.h2go.srcdir, PathBuf::from("data/h2go"));
        assert_eq!(config.h2go.dstdir, PathBuf::from("output/h2go"));
        assert_eq!(config.policy, ErrorPolicy::LogAndSkip);
        assert_eq!(config.csv.encoding, Encoding::Utf8);
        assert_eq!(config.csv.delimiter, ';');
        assert_eq!(config.start, Some(at("2024-01-01")));
        assert_eq!(config.sync_column, "SYNC_LEVEL");
    }

    #[test]
    fn test_reconcile_options() {
        let now = at("2024-03-01 12:00:00");
        let mut config = SpoccerConfig::default();
        assert!(config.reconcile_options(now).is_err());

        config.start = Some(at("2024-01-01"));
        config.throttle_ms = 0;
        let options = config.reconcile_options(now).unwrap();
        assert_eq!(options.end, now);
        assert!(options.throttle.is_zero());

        config.end = Some(at("2023-12-31"));
        let err = config.reconcile_options(now).unwrap_err();
        assert!(err.to_string().contains("Query window is empty"));
    }
}
