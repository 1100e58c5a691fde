//! Historian boundary
//!
//! The historian serves time series per location. Implementations:
//! - `MemoryHistorian`: in-memory rows, for tests and dry runs
//! - `CsvHistorian`: an offline `TAGNAME;TIMESTAMP;VALUE` export

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::time::Instant;

use chrono::{Duration, Local, NaiveDateTime};
use errors::{SpocError, SpocResult};
use spoc_model::Tag;
use spoc_registry::csv_io::read_csv;
use spoc_registry::CsvOptions;
use tracing::{debug, trace};

/// Timestamp format of the offline historian export
pub const EXPORT_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One sample of one tag
#[derive(Debug, Clone, PartialEq)]
pub struct HistorianRow {
    pub tag: String,
    pub timestamp: NaiveDateTime,
    pub value: String,
}

/// Source of "now" for the known-tags probe
pub trait TimeProvider {
    fn now(&self) -> NaiveDateTime;
}

/// Local wall clock
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Fixed time provider for testing
#[derive(Clone, Copy, Debug)]
pub struct FixedTimeProvider {
    now: NaiveDateTime,
}

impl FixedTimeProvider {
    pub fn new(now: NaiveDateTime) -> Self {
        Self { now }
    }
}

impl TimeProvider for FixedTimeProvider {
    fn now(&self) -> NaiveDateTime {
        self.now
    }
}

/// Time-series query client
///
/// Queries are assumed idempotent and side-effect-free on the source system.
pub trait Historian {
    fn query_timeseries(
        &self,
        location: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> SpocResult<Vec<HistorianRow>>;

    /// Length of the known-tags probe window
    fn probe_span(&self) -> Duration {
        Duration::hours(1)
    }

    /// Tags the historian currently serves for a location
    ///
    /// The live view only lists tags for a window starting one day ahead of
    /// `now`, so the probe queries that window and collects the tag names.
    fn known_tags(&self, location: &str, now: NaiveDateTime) -> SpocResult<BTreeSet<String>> {
        let start = now + Duration::days(1);
        let end = start + self.probe_span();
        let rows = self.query_timeseries(location, start, end)?;
        Ok(rows.into_iter().map(|row| row.tag).collect())
    }
}

/// Known tags memoized per location for one run
#[derive(Debug, Default)]
pub struct KnownTagsCache {
    tags: HashMap<String, BTreeSet<String>>,
}

impl KnownTagsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_query(
        &mut self,
        historian: &dyn Historian,
        location: &str,
        now: NaiveDateTime,
    ) -> SpocResult<&BTreeSet<String>> {
        if !self.tags.contains_key(location) {
            let known = historian.known_tags(location, now)?;
            debug!("Historian knows {} tags for {}", known.len(), location);
            self.tags.insert(location.to_string(), known);
        }
        self.tags
            .get(location)
            .ok_or_else(|| SpocError::not_found(format!("known tags for {}", location)))
    }

    pub fn contains(&self, location: &str) -> bool {
        self.tags.contains_key(location)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

/// Location a tag name is served under
fn location_of(tag: &str) -> String {
    match Tag::parse(tag) {
        Ok(Some(parsed)) => parsed.location().to_string(),
        _ => tag.to_string(),
    }
}

/// A query as received by [`MemoryHistorian`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRecord {
    pub location: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub received: Instant,
}

/// In-memory historian that records every query it serves
#[derive(Debug, Default)]
pub struct MemoryHistorian {
    rows: HashMap<String, Vec<HistorianRow>>,
    queries: RefCell<Vec<QueryRecord>>,
}

impl MemoryHistorian {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sample; the location is derived from the tag name
    pub fn insert(&mut self, tag: &str, timestamp: NaiveDateTime, value: impl Into<String>) {
        self.rows
            .entry(location_of(tag))
            .or_default()
            .push(HistorianRow {
                tag: tag.to_string(),
                timestamp,
                value: value.into(),
            });
    }

    pub fn queries(&self) -> Vec<QueryRecord> {
        self.queries.borrow().clone()
    }

    pub fn query_count(&self) -> usize {
        self.queries.borrow().len()
    }
}

impl Historian for MemoryHistorian {
    fn query_timeseries(
        &self,
        location: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> SpocResult<Vec<HistorianRow>> {
        self.queries.borrow_mut().push(QueryRecord {
            location: location.to_string(),
            start,
            end,
            received: Instant::now(),
        });
        trace!("Memory query {} [{} - {}]", location, start, end);
        Ok(select(self.rows.get(location), start, end))
    }
}

fn select(rows: Option<&Vec<HistorianRow>>, start: NaiveDateTime, end: NaiveDateTime) -> Vec<HistorianRow> {
    rows.map(|rows| {
        rows.iter()
            .filter(|row| row.timestamp >= start && row.timestamp <= end)
            .cloned()
            .collect()
    })
    .unwrap_or_default()
}

/// Historian backed by an offline export file
///
/// An export has no live view, so every tag present for a location counts
/// as known.
#[derive(Debug, Default)]
pub struct CsvHistorian {
    rows: HashMap<String, Vec<HistorianRow>>,
}

impl CsvHistorian {
    pub fn load(path: &Path, options: &CsvOptions) -> SpocResult<Self> {
        let content = read_csv(path, options)?;
        let file = path.display().to_string();
        let position = |name: &str| {
            content
                .headers
                .iter()
                .position(|header| header == name)
                .ok_or_else(|| SpocError::parse(file.clone(), format!("missing column {}", name)))
        };
        let (tag_col, time_col, value_col) =
            (position("TAGNAME")?, position("TIMESTAMP")?, position("VALUE")?);

        let mut rows: HashMap<String, Vec<HistorianRow>> = HashMap::new();
        for record in &content.rows {
            let tag = &record[tag_col];
            let timestamp = NaiveDateTime::parse_from_str(&record[time_col], EXPORT_DATETIME_FORMAT)
                .map_err(|e| SpocError::parse(file.clone(), e))?;
            rows.entry(location_of(tag)).or_default().push(HistorianRow {
                tag: tag.clone(),
                timestamp,
                value: record[value_col].clone(),
            });
        }

        debug!("Loaded historian export {} ({} locations)", file, rows.len());
        Ok(Self { rows })
    }
}

impl Historian for CsvHistorian {
    fn query_timeseries(
        &self,
        location: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> SpocResult<Vec<HistorianRow>> {
        Ok(select(self.rows.get(location), start, end))
    }

    fn known_tags(&self, location: &str, _now: NaiveDateTime) -> SpocResult<BTreeSet<String>> {
        Ok(self
            .rows
            .get(location)
            .map(|rows| rows.iter().map(|row| row.tag.clone()).collect())
            .unwrap_or_default())
    }
}
