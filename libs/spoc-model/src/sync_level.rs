//! Reconciliation stages
//!
//! A location moves through the sync levels one step at a time. The level is
//! stored as text in a dedicated column; an empty cell is the implicit
//! [`SyncLevel::Unset`] floor.

use std::fmt;
use std::str::FromStr;

use errors::{ConsistencyError, SpocError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SyncLevel {
    #[default]
    Unset,
    Live,
    Validatie,
    Interpolatie,
    Debiet,
}

impl SyncLevel {
    /// Declared levels, lowest first
    pub const DECLARED: [SyncLevel; 4] = [
        SyncLevel::Live,
        SyncLevel::Validatie,
        SyncLevel::Interpolatie,
        SyncLevel::Debiet,
    ];

    pub fn rank(self) -> i8 {
        match self {
            SyncLevel::Unset => -1,
            SyncLevel::Live => 0,
            SyncLevel::Validatie => 1,
            SyncLevel::Interpolatie => 2,
            SyncLevel::Debiet => 3,
        }
    }

    /// Cell text; empty for [`SyncLevel::Unset`]
    pub fn as_str(self) -> &'static str {
        match self {
            SyncLevel::Unset => "",
            SyncLevel::Live => "LIVE",
            SyncLevel::Validatie => "VALIDATIE",
            SyncLevel::Interpolatie => "INTERPOLATIE",
            SyncLevel::Debiet => "DEBIET",
        }
    }

    /// The level directly above this one
    pub fn next(self) -> Option<SyncLevel> {
        match self {
            SyncLevel::Unset => Some(SyncLevel::Live),
            SyncLevel::Live => Some(SyncLevel::Validatie),
            SyncLevel::Validatie => Some(SyncLevel::Interpolatie),
            SyncLevel::Interpolatie => Some(SyncLevel::Debiet),
            SyncLevel::Debiet => None,
        }
    }

    /// Move from `self` to `requested`
    ///
    /// Legal iff the requested rank is exactly one above the current rank:
    /// no skipping, no regressing, no staying.
    pub fn advance(self, requested: SyncLevel) -> Result<SyncLevel, ConsistencyError> {
        if requested.rank() - self.rank() != 1 {
            return Err(ConsistencyError::IllegalTransition {
                current: self.to_string(),
                requested: requested.to_string(),
            });
        }
        Ok(requested)
    }

    /// The single level reported by every participant
    ///
    /// An empty set of participants is `Unset`.
    pub fn agreed<I>(levels: I, id: &str, column: &str) -> Result<SyncLevel, ConsistencyError>
    where
        I: IntoIterator<Item = SyncLevel>,
    {
        let levels: Vec<SyncLevel> = levels.into_iter().collect();
        let Some(first) = levels.first().copied() else {
            return Ok(SyncLevel::Unset);
        };

        if levels.iter().any(|level| *level != first) {
            let mut distinct = levels.clone();
            distinct.sort();
            distinct.dedup();
            return Err(ConsistencyError::Disagreement {
                id: id.to_string(),
                column: column.to_string(),
                levels: distinct
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        }
        Ok(first)
    }
}

/// Whether a cell holds a valid sync level (empty included)
pub fn is_sync_level(value: &str) -> bool {
    value.parse::<SyncLevel>().is_ok()
}

impl fmt::Display for SyncLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncLevel::Unset => f.write_str("<unset>"),
            level => f.write_str(level.as_str()),
        }
    }
}

impl FromStr for SyncLevel {
    type Err = SpocError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "" => Ok(SyncLevel::Unset),
            "LIVE" => Ok(SyncLevel::Live),
            "VALIDATIE" => Ok(SyncLevel::Validatie),
            "INTERPOLATIE" => Ok(SyncLevel::Interpolatie),
            "DEBIET" => Ok(SyncLevel::Debiet),
            other => Err(SpocError::parse(
                "sync level",
                format!("unknown level '{}'", other),
            )),
        }
    }
}
