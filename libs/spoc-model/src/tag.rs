//! Historian tag parsing
//!
//! Historian tags are free-text dotted paths. A small ordered set of
//! structural patterns turns them into named fields. Patterns overlap on some
//! inputs, so they are tried in declaration order and the first match wins.

use std::fmt;
use std::sync::LazyLock;

use errors::ColumnError;
use regex::Regex;

/// Minimum length (exclusive) for a value to be considered tag-like
pub const TAG_MIN_LEN: usize = 25;

/// Minimum number (exclusive) of `.` separators for a value to be tag-like
pub const TAG_MIN_SEPARATORS: usize = 4;

/// Fields that never contribute to a derived filename
const BOILERPLATE_FIELDS: [&str; 5] = ["marker1", "marker2", "prefix", "tag_type", "suffix"];

static IWA_TAG: LazyLock<Regex> = LazyLock::new(|| {
    compile(concat!(
        r"^(?P<marker1>.*)",
        r"(?P<prefix>~SCX)\.",
        r"(?P<tag_type>~Watersysteem.Objecten)\.",
        r"(?P<area>.*)\.",
        r"(?P<name>.*)\.Tags\.",
        r"(?P<optional>.*)NL\*09\*",
        r"(?P<legger_code>[0-9]{6}\s)",
        r"(?P<type>.*)\.",
        r"(?P<param>.*)\.",
        r"(?P<suffix>Historic)",
        r"(?P<marker2>.*)$",
    ))
});

static PBH_TAG: LazyLock<Regex> = LazyLock::new(|| {
    compile(concat!(
        r"^(?P<marker1>.*)",
        r"(?P<prefix>~SCX)\.",
        r"(?P<tag_type>Pbh)\.",
        r"(?P<area>.*)\.",
        r"(?P<name>.*)\.",
        r"(?:.*)\.",
        r"(?P<suffix>Historic)",
        r"(?P<marker2>.*)$",
    ))
});

static AVIC_TAG: LazyLock<Regex> = LazyLock::new(|| {
    compile(concat!(
        r"^(?P<marker1>.*)",
        r"(?P<prefix>~SCX)\.",
        r"(?P<tag_type>Applicatiebeheer\.~Koppelingen\.AvicDataloggers)\.",
        r"(?P<name>.*)\.",
        r"(?P<param>Niveau)\.",
        r"(?P<suffix>Historic)",
        r"(?P<marker2>.*)$",
    ))
});

static VAARWEG_TAG: LazyLock<Regex> = LazyLock::new(|| {
    compile(concat!(
        r"^(?P<marker1>.*)",
        r"(?P<prefix>~SCX)\.",
        r"(?P<tag_type>~?Vaarwegen.Objecten)\.",
        r"(?P<name>.*)\.Tags\.",
        r"(?:(?:NL\*09\*(?P<legger_code>[0-9]{6}).*)|.*)\.",
        r"(?P<suffix>Historic)",
        r"(?P<marker2>.*)$",
    ))
});

#[allow(clippy::disallowed_methods)] // Static patterns, compilation is covered by tests
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static tag pattern must compile")
}

/// Structural family a tag was recognised as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    /// Generic watersystem-object tags
    Iwa,
    /// `Pbh`-prefixed tags
    Pbh,
    /// AVIC datalogger tags
    Avic,
    /// Waterway-object tags
    Vaarweg,
}

impl TagKind {
    /// Patterns in matching order
    pub const ALL: [TagKind; 4] = [TagKind::Iwa, TagKind::Pbh, TagKind::Avic, TagKind::Vaarweg];

    fn regex(self) -> &'static Regex {
        match self {
            TagKind::Iwa => &IWA_TAG,
            TagKind::Pbh => &PBH_TAG,
            TagKind::Avic => &AVIC_TAG,
            TagKind::Vaarweg => &VAARWEG_TAG,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TagKind::Iwa => "iwa",
            TagKind::Pbh => "pbh",
            TagKind::Avic => "avic",
            TagKind::Vaarweg => "vaarweg",
        }
    }
}

/// Whether a raw value looks like a tag at all
///
/// Values that are not tag-like represent an absent tag, not an invalid one.
pub fn is_tag_like(raw: &str) -> bool {
    raw.chars().count() > TAG_MIN_LEN && raw.matches('.').count() > TAG_MIN_SEPARATORS
}

/// A parsed historian tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    raw: String,
    kind: TagKind,
    fields: Vec<(&'static str, String)>,
}

impl Tag {
    /// Parse a raw tag string
    ///
    /// Returns `Ok(None)` when the value is not tag-like and
    /// [`ColumnError::InvalidTagPattern`] when it is tag-like but matches none
    /// of the known patterns. The returned error carries no table context.
    pub fn parse(raw: &str) -> Result<Option<Tag>, ColumnError> {
        if !is_tag_like(raw) {
            return Ok(None);
        }

        for kind in TagKind::ALL {
            let regex = kind.regex();
            if let Some(caps) = regex.captures(raw) {
                let fields = regex
                    .capture_names()
                    .flatten()
                    .map(|name| {
                        let value = caps.name(name).map(|m| m.as_str()).unwrap_or("");
                        (name, value.to_string())
                    })
                    .collect();

                return Ok(Some(Tag {
                    raw: raw.to_string(),
                    kind,
                    fields,
                }));
            }
        }

        Err(ColumnError::InvalidTagPattern {
            table: String::new(),
            column: String::new(),
            value: raw.to_string(),
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn kind(&self) -> TagKind {
        self.kind
    }

    /// Captured fields in pattern order
    pub fn fields(&self) -> &[(&'static str, String)] {
        &self.fields
    }

    /// Value of a captured field, `None` when the pattern has no such field
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }

    fn non_empty(&self, name: &str) -> Option<&str> {
        self.field(name)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub fn area(&self) -> Option<&str> {
        self.non_empty("area")
    }

    /// Trivial object name
    pub fn name(&self) -> Option<&str> {
        self.non_empty("name")
    }

    /// Registry ("legger") code, trimmed
    pub fn legger_code(&self) -> Option<&str> {
        self.non_empty("legger_code")
    }

    /// Raw parameter capture, e.g. `s--1001_SD`
    pub fn param(&self) -> Option<&str> {
        self.non_empty("param")
    }

    /// Parameter code: the segment after the last `_` of the parameter capture
    pub fn param_code(&self) -> Option<&str> {
        self.param()
            .map(|param| param.rsplit('_').next().unwrap_or(param))
    }

    /// A tag is muted when either administrative marker is present
    pub fn is_muted(&self) -> bool {
        self.non_empty("marker1").is_some() || self.non_empty("marker2").is_some()
    }

    /// Join key used for grouping: the registry code, else the object name
    pub fn location(&self) -> &str {
        self.legger_code().or_else(|| self.name()).unwrap_or("")
    }

    /// Filesystem-safe name derived from every non-boilerplate field
    pub fn filename(&self) -> String {
        let joined = self
            .fields
            .iter()
            .filter(|(key, _)| !BOILERPLATE_FIELDS.contains(key))
            .map(|(_, value)| value.as_str())
            .filter(|value| !value.trim().is_empty())
            .collect::<Vec<_>>()
            .join("_");

        let mut name: String = joined
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
            .collect();
        name.push_str(".csv");
        name
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
