//! Declarative column descriptors
//!
//! A [`Column`] is stateless schema metadata bound to a physical column name.
//! It owns the validation rules for that column; the owning table owns the
//! data and passes the column's values in.

use std::collections::HashSet;

use errors::ColumnError;

use crate::identifier::IdentifierPattern;
use crate::tag::{is_tag_like, Tag};

/// Structural constraint checked for every non-missing value
#[derive(Debug, Clone, Copy)]
pub enum Pattern {
    Unchecked,
    Identifier(IdentifierPattern),
    /// Value must parse as a historian tag when it is tag-like
    Tag,
    Custom {
        check: fn(&str) -> bool,
        expected: &'static str,
    },
}

/// Role of a column within its table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Generic,
    Identifier,
    /// Measurement parameter, joined across tables by its semantic `param` key
    Parameter {
        param: &'static str,
        relation: Option<&'static str>,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub unique: bool,
    pub allow_empty: bool,
    pub pattern: Pattern,
}

impl Column {
    /// Plain column without constraints
    pub const fn generic(name: &'static str) -> Self {
        Self {
            name,
            kind: ColumnKind::Generic,
            unique: false,
            allow_empty: true,
            pattern: Pattern::Unchecked,
        }
    }

    /// Unique, non-empty asset code column
    pub const fn identifier(name: &'static str, pattern: IdentifierPattern) -> Self {
        Self {
            name,
            kind: ColumnKind::Identifier,
            unique: true,
            allow_empty: false,
            pattern: Pattern::Identifier(pattern),
        }
    }

    /// Parameter column without a structural constraint
    pub const fn parameter(name: &'static str, param: &'static str) -> Self {
        Self {
            name,
            kind: ColumnKind::Parameter {
                param,
                relation: None,
            },
            unique: false,
            allow_empty: true,
            pattern: Pattern::Unchecked,
        }
    }

    /// Parameter column holding historian tags
    pub const fn tag_parameter(name: &'static str, param: &'static str) -> Self {
        let mut column = Self::parameter(name, param);
        column.pattern = Pattern::Tag;
        column
    }

    /// Reference column holding a code of another tier; may be empty
    pub const fn reference(name: &'static str, pattern: IdentifierPattern) -> Self {
        let mut column = Self::generic(name);
        column.pattern = Pattern::Identifier(pattern);
        column
    }

    pub const fn with_relation(mut self, table: &'static str) -> Self {
        if let ColumnKind::Parameter { param, .. } = self.kind {
            self.kind = ColumnKind::Parameter {
                param,
                relation: Some(table),
            };
        }
        self
    }

    pub const fn with_unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    pub const fn with_allow_empty(mut self, allow_empty: bool) -> Self {
        self.allow_empty = allow_empty;
        self
    }

    pub const fn with_pattern(mut self, pattern: Pattern) -> Self {
        self.pattern = pattern;
        self
    }

    /// Semantic parameter key for parameter columns
    pub fn param(&self) -> Option<&'static str> {
        match self.kind {
            ColumnKind::Parameter { param, .. } => Some(param),
            _ => None,
        }
    }

    /// Counterpart table of a parameter column
    pub fn relation(&self) -> Option<&'static str> {
        match self.kind {
            ColumnKind::Parameter { relation, .. } => relation,
            _ => None,
        }
    }

    pub fn is_parameter(&self) -> bool {
        matches!(self.kind, ColumnKind::Parameter { .. })
    }

    /// Validate all values of this column
    ///
    /// Rules are applied in fixed order: uniqueness, emptiness, pattern.
    /// Empty strings are missing values.
    pub fn validate<S: AsRef<str>>(&self, table: &str, values: &[S]) -> Result<(), ColumnError> {
        if self.unique {
            self.check_unique(table, values)?;
        }
        if !self.allow_empty {
            self.check_not_empty(table, values)?;
        }
        for value in values.iter().map(AsRef::as_ref) {
            if !value.is_empty() {
                self.check_value(table, value)?;
            }
        }
        Ok(())
    }

    fn check_unique<S: AsRef<str>>(&self, table: &str, values: &[S]) -> Result<(), ColumnError> {
        let mut seen = HashSet::with_capacity(values.len());
        for value in values.iter().map(AsRef::as_ref) {
            if !value.is_empty() && !seen.insert(value) {
                return Err(ColumnError::NonUnique {
                    table: table.to_string(),
                    column: self.name.to_string(),
                    value: value.to_string(),
                });
            }
        }
        Ok(())
    }

    fn check_not_empty<S: AsRef<str>>(&self, table: &str, values: &[S]) -> Result<(), ColumnError> {
        match values.iter().position(|value| value.as_ref().is_empty()) {
            Some(row) => Err(ColumnError::EmptyField {
                table: table.to_string(),
                column: self.name.to_string(),
                row,
            }),
            None => Ok(()),
        }
    }

    /// Check a single non-missing value against the structural constraint
    pub fn check_value(&self, table: &str, value: &str) -> Result<(), ColumnError> {
        let expected = match self.pattern {
            Pattern::Unchecked => return Ok(()),
            Pattern::Identifier(pattern) => {
                if pattern.matches(value) {
                    return Ok(());
                }
                pattern.expected()
            },
            Pattern::Tag => {
                // only tag-like values are checked; anything else is an absent tag
                if !is_tag_like(value) {
                    return Ok(());
                }
                return Tag::parse(value)
                    .map(|_| ())
                    .map_err(|e| e.located(table, self.name));
            },
            Pattern::Custom { check, expected } => {
                if check(value) {
                    return Ok(());
                }
                expected.to_string()
            },
        };

        Err(ColumnError::InvalidPattern {
            table: table.to_string(),
            column: self.name.to_string(),
            value: value.to_string(),
            expected,
        })
    }
}
