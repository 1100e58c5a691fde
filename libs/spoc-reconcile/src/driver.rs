//! Reconciliation driver
//!
//! Takes the parameter matches of one top-level location, validates the file
//! side and the tag side of each match and dispatches the synchronization
//! action for its group:
//!
//! - `h2go_only`: resave the H2GO record, no historian query
//! - `tag_only` / `both`: one time-series query per tag location, then
//!   persist every match of that location
//!
//! Match-scoped failures go through the configured [`ErrorPolicy`].

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::NaiveDateTime;
use errors::{ConsistencyError, SpocError, SpocResult, TagStateError};
use spoc_model::{SyncLevel, Tag};
use spoc_registry::csv_io::{write_csv, CsvContent, TableLayout};
use spoc_registry::{CsvOptions, SpocTree};
use tracing::{debug, info, warn};

use crate::h2go::{H2goRecord, H2goRegistry};
use crate::historian::{Historian, HistorianRow, KnownTagsCache, TimeProvider};
use crate::indexer::Indexer;
use crate::param_match::{sort_matches, MatchGroup, ParamMatch, ParamValue};
use crate::policy::{ErrorPolicy, FailureContext, MatchFailure};

/// Header of the tag time-series files
pub const TIMESERIES_HEADER: [&str; 3] = ["DATUM", "TIJD", "WAARDE"];

#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    /// Start of the full query window
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// Minimum delay between consecutive historian queries, probes included
    pub throttle: Duration,
    pub policy: ErrorPolicy,
    /// Directory receiving the tag time series
    pub outdir: PathBuf,
    pub csv: CsvOptions,
}

/// Outcome of one run
#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    pub root: String,
    pub level_from: SyncLevel,
    /// Level written after the run; `None` when the level was not advanced
    pub level_to: Option<SyncLevel>,
    pub empty: usize,
    pub h2go_saved: usize,
    pub tags_saved: usize,
    pub rows_written: usize,
    pub queries: usize,
    pub failures: Vec<MatchFailure>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A match that passed both side checks
struct Checked<'m> {
    param_match: &'m ParamMatch,
    record: Option<H2goRecord>,
}

pub struct Reconciler<'a> {
    historian: &'a dyn Historian,
    clock: &'a dyn TimeProvider,
    registry: &'a H2goRegistry,
    options: ReconcileOptions,
    known_tags: KnownTagsCache,
    last_query: Option<Instant>,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        historian: &'a dyn Historian,
        clock: &'a dyn TimeProvider,
        registry: &'a H2goRegistry,
        options: ReconcileOptions,
    ) -> Self {
        Self {
            historian,
            clock,
            registry,
            options,
            known_tags: KnownTagsCache::new(),
            last_query: None,
        }
    }

    /// Reconcile one top-level location and advance its sync level
    ///
    /// The requested level defaults to the level directly above the current
    /// one. The transition is checked before any work is done and applied
    /// only when no match was skipped. Persisting the tree is up to the caller.
    pub fn reconcile_location(
        &mut self,
        tree: &mut SpocTree,
        root_id: &str,
        requested: Option<SyncLevel>,
        column: &str,
    ) -> SpocResult<ReconcileReport> {
        let indexer = Indexer::new(tree, root_id)?;
        let current = indexer.sync_level(tree, column)?;
        let requested = requested.or_else(|| current.next()).unwrap_or(current);
        current.advance(requested)?;

        let matches = indexer.parameter_matches(tree, true)?;
        let mut report = self.run(matches)?;
        report.root = root_id.to_string();
        report.level_from = current;

        if report.is_clean() {
            indexer.set_sync_level(tree, requested, column)?;
            report.level_to = Some(requested);
        } else {
            warn!(
                "{} matches of {} were skipped, sync level stays {}",
                report.failures.len(),
                root_id,
                current
            );
        }
        Ok(report)
    }

    /// Validate and dispatch a set of matches
    ///
    /// Tag filename collisions are fatal and detected before anything is
    /// written.
    pub fn run(&mut self, mut matches: Vec<ParamMatch>) -> SpocResult<ReconcileReport> {
        sort_matches(&mut matches);
        check_filenames(&matches)?;
        self.known_tags = KnownTagsCache::new();
        let mut report = ReconcileReport::default();
        let mut by_location: BTreeMap<String, Vec<Checked<'_>>> = BTreeMap::new();

        for param_match in &matches {
            let group = param_match.group();
            if group == MatchGroup::Empty {
                report.empty += 1;
                continue;
            }

            let record = match param_match.file_pattern() {
                Some(pattern) => match self.registry.load(pattern) {
                    Ok(record) => Some(record),
                    Err(err) => {
                        self.skip_or_raise(&mut report, err, param_match, param_match.file_table)?;
                        continue;
                    },
                },
                None => None,
            };

            if let Some(tag) = param_match.tag() {
                if let Err(err) = self.check_tag(tag) {
                    self.skip_or_raise(&mut report, err, param_match, param_match.tag_table)?;
                    continue;
                }
            }

            match (group, record) {
                (MatchGroup::H2goOnly, Some(record)) => {
                    self.registry.save(&record)?;
                    report.h2go_saved += 1;
                },
                (_, record) => by_location
                    .entry(param_match.location().to_string())
                    .or_default()
                    .push(Checked {
                        param_match,
                        record,
                    }),
            }
        }

        for (location, members) in by_location {
            self.reconcile_tags(&mut report, &location, members)?;
        }

        info!(
            "Reconciled: {} H2GO records, {} tags, {} queries, {} skipped, {} empty",
            report.h2go_saved,
            report.tags_saved,
            report.queries,
            report.failures.len(),
            report.empty
        );
        Ok(report)
    }

    /// Rejects muted tags and tags the historian does not serve
    fn check_tag(&mut self, tag: &Tag) -> SpocResult<()> {
        if tag.is_muted() {
            return Err(TagStateError::Muted {
                tag: tag.raw().to_string(),
            }
            .into());
        }

        let now = self.clock.now();
        let probing = !self.known_tags.contains(tag.location());
        if probing {
            self.throttle();
        }
        let known = self
            .known_tags
            .get_or_query(self.historian, tag.location(), now)
            .map(|known| known.contains(tag.raw()));
        if probing {
            self.last_query = Some(Instant::now());
        }
        if !known? {
            return Err(TagStateError::NotInKnownSet {
                location: tag.location().to_string(),
                tag: tag.raw().to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Query start for one location group
    ///
    /// Any tag-only match needs the full window. Otherwise the query resumes
    /// at the earliest end timestamp of the existing H2GO records.
    fn query_start(&self, members: &[Checked<'_>]) -> SpocResult<NaiveDateTime> {
        if members
            .iter()
            .any(|member| member.param_match.group() == MatchGroup::TagOnly)
        {
            return Ok(self.options.start);
        }

        let mut earliest: Option<NaiveDateTime> = None;
        for record in members.iter().filter_map(|member| member.record.as_ref()) {
            if let Some(end) = record.end_datetime()? {
                earliest = Some(earliest.map_or(end, |current| current.min(end)));
            }
        }
        Ok(earliest.unwrap_or(self.options.start))
    }

    fn reconcile_tags(
        &mut self,
        report: &mut ReconcileReport,
        location: &str,
        members: Vec<Checked<'_>>,
    ) -> SpocResult<()> {
        let start = self.query_start(&members)?;
        self.throttle();

        report.queries += 1;
        let rows = self
            .historian
            .query_timeseries(location, start, self.options.end);
        self.last_query = Some(Instant::now());
        let rows = match rows {
            Ok(rows) => rows,
            Err(err) => {
                let reason = err.to_string();
                let mut err = Some(err);
                for member in &members {
                    let err = err
                        .take()
                        .unwrap_or_else(|| SpocError::historian(location, reason.clone()));
                    let m = member.param_match;
                    self.skip_or_raise(report, err, m, m.tag_table)?;
                }
                return Ok(());
            },
        };
        debug!("Historian returned {} rows for {}", rows.len(), location);

        for member in members {
            if let Some(record) = &member.record {
                self.registry.save(record)?;
                report.h2go_saved += 1;
            }
            if let Some(tag) = member.param_match.tag() {
                report.rows_written += self.save_timeseries(tag, &rows)?;
                report.tags_saved += 1;
            }
        }
        Ok(())
    }

    /// Sleep until the throttle delay since the last historian query has passed
    fn throttle(&self) {
        let Some(last) = self.last_query else {
            return;
        };
        let remaining = self.options.throttle.saturating_sub(last.elapsed());
        if !remaining.is_zero() {
            debug!("Throttling historian for {:?}", remaining);
            std::thread::sleep(remaining);
        }
    }

    /// Write the rows of one tag to `<outdir>/<tag filename>`
    fn save_timeseries(&self, tag: &Tag, rows: &[HistorianRow]) -> SpocResult<usize> {
        let filename = tag.filename();
        let content = CsvContent {
            headers: TIMESERIES_HEADER.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .iter()
                .filter(|row| row.tag == tag.raw())
                .map(|row| {
                    vec![
                        row.timestamp.format("%d-%m-%Y").to_string(),
                        row.timestamp.format("%H:%M:%S").to_string(),
                        row.value.clone(),
                    ]
                })
                .collect(),
            layout: TableLayout::default(),
        };

        std::fs::create_dir_all(&self.options.outdir)?;
        let path = self.options.outdir.join(&filename);
        write_csv(&path, &content, &self.options.csv)?;
        info!("Saved {} rows of {} to {}", content.rows.len(), tag, path.display());
        Ok(content.rows.len())
    }

    fn skip_or_raise(
        &self,
        report: &mut ReconcileReport,
        err: SpocError,
        param_match: &ParamMatch,
        table: &str,
    ) -> SpocResult<()> {
        let value = param_match
            .field
            .get(table)
            .map(ParamValue::as_str)
            .unwrap_or("");
        let failure = self.options.policy.handle(
            err,
            FailureContext {
                key: &param_match.key,
                group: param_match.group(),
                table,
                column: param_match.column(table),
                value,
            },
        )?;
        report.failures.push(failure);
        Ok(())
    }
}

/// Distinct tags must map to distinct time-series files
fn check_filenames(matches: &[ParamMatch]) -> SpocResult<()> {
    let mut filenames: HashMap<String, &str> = HashMap::new();
    for tag in matches.iter().filter_map(ParamMatch::tag) {
        match filenames.entry(tag.filename()) {
            Entry::Occupied(entry) if *entry.get() != tag.raw() => {
                return Err(ConsistencyError::FilenameCollision {
                    filename: entry.key().clone(),
                    first: entry.get().to_string(),
                    second: tag.raw().to_string(),
                }
                .into());
            },
            Entry::Occupied(_) => {},
            Entry::Vacant(entry) => {
                entry.insert(tag.raw());
            },
        }
    }
    Ok(())
}
