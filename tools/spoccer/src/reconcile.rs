//! The reconcile command

use anyhow::{Context, Result};
use colored::Colorize;
use spoc_model::SyncLevel;
use spoc_reconcile::{
    CsvHistorian, H2goRegistry, ReconcileReport, Reconciler, SystemTimeProvider, TimeProvider,
};

use crate::settings::SpoccerConfig;
use crate::utils::{coded, load_validated};

/// Reconcile one location against the historian export and the H2GO exports
///
/// The maplayers are saved to the destination dir only when the sync level
/// was advanced.
pub fn run_reconcile(
    config: &SpoccerConfig,
    clock: &dyn TimeProvider,
    root: &str,
    level: Option<&str>,
) -> Result<ReconcileReport> {
    let requested = level
        .map(str::parse::<SyncLevel>)
        .transpose()
        .map_err(coded)?;
    let options = config.reconcile_options(clock.now())?;

    let export = config
        .historian
        .as_deref()
        .context("No historian export configured (set `historian` or pass --historian)")?;
    let historian = CsvHistorian::load(export, &config.csv)
        .map_err(coded)
        .with_context(|| format!("Failed to load historian export {}", export.display()))?;
    let registry = H2goRegistry::new(&config.h2go.srcdir, &config.h2go.dstdir, config.csv);

    let mut tree = load_validated(config)?;
    let mut reconciler = Reconciler::new(&historian, clock, &registry, options);
    let report = reconciler
        .reconcile_location(&mut tree, root, requested, &config.sync_column)
        .map_err(coded)
        .with_context(|| format!("Reconciliation of {} aborted", root))?;

    if report.level_to.is_some() {
        tree.save(&config.dstdir, &config.csv)
            .map_err(coded)
            .with_context(|| format!("Failed to save maplayers to {}", config.dstdir.display()))?;
    }
    Ok(report)
}

fn print_report(report: &ReconcileReport) {
    println!("\n{} {}", "Reconciled".bright_cyan(), report.root.bright_yellow());
    println!("  {} H2GO records saved: {}", "-".bright_cyan(), report.h2go_saved);
    println!(
        "  {} Tags saved: {} ({} rows)",
        "-".bright_cyan(),
        report.tags_saved,
        report.rows_written
    );
    println!("  {} Historian queries: {}", "-".bright_cyan(), report.queries);
    println!("  {} Empty matches: {}", "-".bright_cyan(), report.empty);

    for failure in &report.failures {
        println!(
            "  {} [{}] {} {}@{} '{}'",
            "SKIP".yellow(),
            failure.code,
            failure.key,
            failure.table,
            failure.column,
            failure.value
        );
    }

    match report.level_to {
        Some(level) => println!(
            "{} Sync level {} -> {}",
            "OK".green(),
            report.level_from,
            level.to_string().bright_green()
        ),
        None => println!(
            "{} {} matches skipped, sync level stays {}",
            "WARNING".yellow(),
            report.failures.len(),
            report.level_from
        ),
    }
}

pub fn handle_reconcile(config: &SpoccerConfig, root: &str, level: Option<&str>) -> Result<()> {
    let report = run_reconcile(config, &SystemTimeProvider, root, level)?;
    print_report(&report);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::settings::parse_datetime;
    use crate::utils::test_support::fixture_config;
    use spoc_reconcile::{ErrorPolicy, FixedTimeProvider};
    use std::path::Path;
    use tempfile::TempDir;

    const BAANBREKER: &str = "~SCX.~Watersysteem.Objecten.De Baanbreker";

    fn export(locid: &str, mptid: &str) -> String {
        format!(
            "LOCATIEID;MEETPUNTID;DATUM;TIJD;WAARDE\n{locid};{mptid};01-01-2024;00:00:00;1\n{locid};{mptid};01-01-2024;00:15:00;2\n"
        )
    }

    fn setup(dir: &Path) -> SpoccerConfig {
        let h2go = dir.join("h2go");
        std::fs::create_dir_all(&h2go).unwrap();
        for (locid, mptid) in [
            ("1001", "BS1"),
            ("1001", "SH1"),
            ("1001", "SD1"),
            ("1002", "TT1"),
            ("1002", "HH1"),
            ("2001", "HM1"),
            ("2002", "HMH2"),
        ] {
            std::fs::write(h2go.join(format!("{locid}_{mptid}.csv")), export(locid, mptid)).unwrap();
        }

        let mut historian = String::from("TAGNAME;TIMESTAMP;VALUE\n");
        for (object, suffix) in [
            ("Ronde Morgen", "NL*09*001049 wtSTs--1001.s--1001_BS"),
            ("Ronde Morgen", "NL*09*001049 wtSTs--1001.s--1001_SD"),
            ("Peilschaal Noord", "NL*09*001051 wtPS--1003.p--1003_MNAP"),
        ] {
            let tag = format!("{BAANBREKER}.{object}.Tags.{suffix}.Historic");
            historian.push_str(&format!("{tag};2024-01-01 12:00:00;0,40\n"));
            historian.push_str(&format!("{tag};2024-02-01 12:00:00;0,45\n"));
        }
        let export_path = dir.join("historian.csv");
        std::fs::write(&export_path, historian).unwrap();

        let mut config = fixture_config(dir);
        config.h2go.srcdir = h2go;
        config.h2go.dstdir = dir.join("h2go_out");
        config.historian = Some(export_path);
        config.start = Some(parse_datetime("2024-01-01").unwrap());
        config.end = Some(parse_datetime("2024-03-01").unwrap());
        config.throttle_ms = 0;
        config
    }

    fn clock() -> FixedTimeProvider {
        FixedTimeProvider::new(parse_datetime("2024-03-01 12:00:00").unwrap())
    }

    #[test]
    fn test_clean_run_advances_and_saves() {
        let dir = TempDir::new().unwrap();
        let config = setup(dir.path());
        let report = run_reconcile(&config, &clock(), "HL000002", None).unwrap();

        assert!(report.is_clean());
        assert_eq!(report.level_to, Some(SyncLevel::Live));
        assert_eq!(report.h2go_saved, 1);
        assert_eq!(report.queries, 0);
        assert!(config.h2go.dstdir.join("2002_HMH2.csv").is_file());
        let ws = std::fs::read(config.dstdir.join("WS.csv")).unwrap();
        assert!(String::from_utf8_lossy(&ws).contains("LIVE"));
    }

    #[test]
    fn test_muted_tag_aborts_under_raise() {
        let dir = TempDir::new().unwrap();
        let config = setup(dir.path());
        let err = run_reconcile(&config, &clock(), "HL000001", None).unwrap_err();
        assert!(format!("{err:#}").contains("[TAG_MUTED]"));
        assert!(!config.dstdir.exists());
    }

    #[test]
    fn test_skipped_match_keeps_level() {
        let dir = TempDir::new().unwrap();
        let mut config = setup(dir.path());
        config.policy = ErrorPolicy::LogAndSkip;
        let report = run_reconcile(&config, &clock(), "HL000001", None).unwrap();

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].code, "TAG_MUTED");
        assert_eq!(report.level_to, None);
        assert_eq!(report.tags_saved, 3);
        assert_eq!(report.queries, 2);
        assert!(!config.dstdir.exists());
        assert_eq!(std::fs::read_dir(&config.outdir).unwrap().count(), 3);
    }

    #[test]
    fn test_missing_historian_export() {
        let dir = TempDir::new().unwrap();
        let mut config = setup(dir.path());
        config.historian = None;
        let err = run_reconcile(&config, &clock(), "HL000002", None).unwrap_err();
        assert!(err.to_string().contains("No historian export configured"));
    }

    #[test]
    fn test_requested_level_skip() {
        let dir = TempDir::new().unwrap();
        let config = setup(dir.path());
        let err = run_reconcile(&config, &clock(), "HL000002", Some("DEBIET")).unwrap_err();
        assert!(format!("{err:#}").contains("[SYNC_LEVEL_SKIP]"));
    }
}
