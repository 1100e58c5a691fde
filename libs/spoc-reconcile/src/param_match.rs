//! Parameter matches: the unit of reconciliation
//!
//! A [`ParamMatch`] pairs one sublocation id and one semantic parameter with
//! the values every participating table holds for it.

use std::collections::BTreeMap;
use std::fmt;

use spoc_model::{Tag, Tier};

/// Structured join key of a match
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParamKey {
    pub location_id: String,
    pub param: &'static str,
}

impl ParamKey {
    pub fn new(location_id: impl Into<String>, param: &'static str) -> Self {
        Self {
            location_id: location_id.into(),
            param,
        }
    }
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.location_id, self.param)
    }
}

/// Value a table contributes to a match
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    /// File-registry pattern `<H2GO_LOCID>_<value>`
    Raw(String),
    Tag(Tag),
}

impl ParamValue {
    pub fn as_str(&self) -> &str {
        match self {
            ParamValue::Raw(raw) => raw,
            ParamValue::Tag(tag) => tag.raw(),
        }
    }

    pub fn tag(&self) -> Option<&Tag> {
        match self {
            ParamValue::Tag(tag) => Some(tag),
            ParamValue::Raw(_) => None,
        }
    }
}

/// Column and value a single table contributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub column: &'static str,
    pub value: Option<ParamValue>,
}

/// Per-table values observed for one id and parameter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexField {
    entries: BTreeMap<&'static str, IndexEntry>,
}

impl IndexField {
    pub fn insert(&mut self, table: &'static str, column: &'static str, value: Option<ParamValue>) {
        self.entries.insert(table, IndexEntry { column, value });
    }

    pub fn entry(&self, table: &str) -> Option<&IndexEntry> {
        self.entries.get(table)
    }

    pub fn get(&self, table: &str) -> Option<&ParamValue> {
        self.entry(table).and_then(|entry| entry.value.as_ref())
    }

    /// Whether `table` holds a non-missing value
    pub fn exists(&self, table: &str) -> bool {
        self.get(table).is_some()
    }

    /// Whether none of `tables` holds a value
    pub fn is_empty(&self, tables: &[&str]) -> bool {
        !tables.iter().any(|table| self.exists(table))
    }

    pub fn exists_all(&self, tables: &[&str]) -> bool {
        tables.iter().all(|table| self.exists(table))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &IndexEntry)> {
        self.entries.iter().map(|(table, entry)| (*table, entry))
    }
}

/// Reconciliation category; the derived order is the processing order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MatchGroup {
    Empty,
    H2goOnly,
    TagOnly,
    Both,
}

impl MatchGroup {
    pub fn classify(tag_present: bool, file_present: bool) -> Self {
        match (tag_present, file_present) {
            (false, false) => MatchGroup::Empty,
            (false, true) => MatchGroup::H2goOnly,
            (true, false) => MatchGroup::TagOnly,
            (true, true) => MatchGroup::Both,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MatchGroup::Empty => "empty",
            MatchGroup::H2goOnly => "h2go_only",
            MatchGroup::TagOnly => "tag_only",
            MatchGroup::Both => "both",
        }
    }
}

impl fmt::Display for MatchGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamMatch {
    pub key: ParamKey,
    pub tier: Tier,
    pub tag_table: &'static str,
    pub file_table: &'static str,
    pub field: IndexField,
}

impl ParamMatch {
    pub fn group(&self) -> MatchGroup {
        MatchGroup::classify(self.tag().is_some(), self.file_pattern().is_some())
    }

    /// Parsed tag on the tag side
    pub fn tag(&self) -> Option<&Tag> {
        self.field.get(self.tag_table).and_then(ParamValue::tag)
    }

    /// H2GO file pattern on the file side
    pub fn file_pattern(&self) -> Option<&str> {
        self.field.get(self.file_table).map(ParamValue::as_str)
    }

    /// Grouping location: the tag's location, else the sublocation id
    pub fn location(&self) -> &str {
        self.tag()
            .map(Tag::location)
            .unwrap_or(&self.key.location_id)
    }

    /// Column backing a table's value, for error context
    pub fn column(&self, table: &str) -> &str {
        self.field.entry(table).map(|entry| entry.column).unwrap_or("")
    }
}

/// Processing order: group, then location, then parameter
pub fn sort_matches(matches: &mut [ParamMatch]) {
    matches.sort_by(|a, b| {
        (a.group(), a.location(), a.key.param).cmp(&(b.group(), b.location(), b.key.param))
    });
}
