//! H2GO file registry
//!
//! H2GO exports are per-station CSV files somewhere below a source
//! directory. A record is addressed by the pattern `<locid>_<mptid>`, which
//! must resolve to exactly one file whose name starts with it.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use errors::{FileRegistryError, SpocError, SpocResult};
use spoc_registry::csv_io::{read_csv, write_csv, CsvContent};
use spoc_registry::CsvOptions;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Date and time format of the `DATUM` and `TIJD` columns, joined by a space
pub const H2GO_DATETIME_FORMAT: &str = "%d-%m-%Y %H:%M:%S";

const LOCATION_COLUMN: &str = "LOCATIEID";
const MEASUREMENT_POINT_COLUMN: &str = "MEETPUNTID";
const DATE_COLUMN: &str = "DATUM";
const TIME_COLUMN: &str = "TIJD";

#[derive(Debug, Clone)]
pub struct H2goRegistry {
    srcdir: PathBuf,
    dstdir: PathBuf,
    options: CsvOptions,
}

impl H2goRegistry {
    pub fn new(srcdir: impl Into<PathBuf>, dstdir: impl Into<PathBuf>, options: CsvOptions) -> Self {
        Self {
            srcdir: srcdir.into(),
            dstdir: dstdir.into(),
            options,
        }
    }

    pub fn dstdir(&self) -> &Path {
        &self.dstdir
    }

    /// The single `*.csv` file below the source dir starting with `pattern`
    pub fn find(&self, pattern: &str) -> Result<PathBuf, FileRegistryError> {
        let mut found: Vec<PathBuf> = WalkDir::new(&self.srcdir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                let name = entry.file_name().to_string_lossy();
                name.starts_with(pattern) && name.ends_with(".csv")
            })
            .map(|entry| entry.into_path())
            .collect();

        match found.len() {
            0 => Err(FileRegistryError::FileNotFound {
                pattern: pattern.to_string(),
            }),
            1 => Ok(found.remove(0)),
            count => Err(FileRegistryError::MultipleMatches {
                pattern: pattern.to_string(),
                count,
            }),
        }
    }

    /// Resolve, read and content-check a record
    pub fn load(&self, pattern: &str) -> SpocResult<H2goRecord> {
        let path = self.find(pattern)?;
        let content = read_csv(&path, &self.options)?;
        let record = H2goRecord {
            pattern: pattern.to_string(),
            path,
            content,
        };
        record.validate()?;
        debug!("Loaded H2GO record {} ({} rows)", record.path.display(), record.len());
        Ok(record)
    }

    /// Write a record unchanged into the destination dir
    pub fn save(&self, record: &H2goRecord) -> SpocResult<PathBuf> {
        std::fs::create_dir_all(&self.dstdir)?;
        let filename = record
            .path
            .file_name()
            .ok_or_else(|| SpocError::not_found(format!("file name of {}", record.path.display())))?;
        let dst = self.dstdir.join(filename);
        write_csv(&dst, &record.content, &self.options)?;
        info!("Saved H2GO record {}", dst.display());
        Ok(dst)
    }
}

/// One loaded H2GO export
#[derive(Debug, Clone)]
pub struct H2goRecord {
    pattern: String,
    path: PathBuf,
    content: CsvContent,
}

impl H2goRecord {
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.content.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.rows.is_empty()
    }

    fn column(&self, name: &str) -> Option<usize> {
        self.content.headers.iter().position(|header| header == name)
    }

    /// Every row must belong to the location and measurement point in the pattern
    pub fn validate(&self) -> Result<(), FileRegistryError> {
        let (locid, mptid) = self
            .pattern
            .split_once('_')
            .unwrap_or((self.pattern.as_str(), ""));

        for (name, expected) in [(LOCATION_COLUMN, locid), (MEASUREMENT_POINT_COLUMN, mptid)] {
            let mismatch = |found: &str| FileRegistryError::ContentMismatch {
                file: self.path.display().to_string(),
                column: name.to_string(),
                expected: expected.to_string(),
                found: found.to_string(),
            };
            let Some(col) = self.column(name) else {
                return Err(mismatch("<missing column>"));
            };
            if let Some(row) = self.content.rows.iter().find(|row| row[col] != expected) {
                return Err(mismatch(&row[col]));
            }
        }
        Ok(())
    }

    fn datetime(&self, row: &[String]) -> SpocResult<NaiveDateTime> {
        let file = || self.path.display().to_string();
        let (Some(date), Some(time)) = (self.column(DATE_COLUMN), self.column(TIME_COLUMN)) else {
            return Err(SpocError::parse(file(), "missing DATUM or TIJD column"));
        };
        let text = format!("{} {}", row[date], row[time]);
        NaiveDateTime::parse_from_str(&text, H2GO_DATETIME_FORMAT).map_err(|e| SpocError::parse(file(), e))
    }

    /// Timestamp of the first row; `None` for an empty export
    pub fn start_datetime(&self) -> SpocResult<Option<NaiveDateTime>> {
        self.content.rows.first().map(|row| self.datetime(row)).transpose()
    }

    /// Timestamp of the last row; `None` for an empty export
    pub fn end_datetime(&self) -> SpocResult<Option<NaiveDateTime>> {
        self.content.rows.last().map(|row| self.datetime(row)).transpose()
    }
}
