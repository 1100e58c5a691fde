//! Asset identifier codes
//!
//! Every asset is identified by a two-letter tier prefix followed by six
//! digits: `HL######` for top-level locations, `SL######` for sublocations
//! and `OW######` for water-level stations.

use std::fmt;

/// Number of digits following the tier prefix
pub const CODE_DIGITS: usize = 6;

/// Asset tier, determined by the code prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tier {
    Hl,
    Sl,
    Ow,
}

impl Tier {
    pub const fn prefix(self) -> &'static str {
        match self {
            Tier::Hl => "HL",
            Tier::Sl => "SL",
            Tier::Ow => "OW",
        }
    }

    /// Tier of a well-formed code
    pub fn of(code: &str) -> Option<Tier> {
        [Tier::Hl, Tier::Sl, Tier::Ow]
            .into_iter()
            .find(|tier| IdentifierPattern::single(*tier).matches(code))
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Structural constraint for identifier columns
#[derive(Debug, Clone, Copy)]
pub struct IdentifierPattern {
    tiers: &'static [Tier],
}

impl IdentifierPattern {
    pub const HL: IdentifierPattern = IdentifierPattern { tiers: &[Tier::Hl] };
    pub const SL: IdentifierPattern = IdentifierPattern { tiers: &[Tier::Sl] };
    pub const OW: IdentifierPattern = IdentifierPattern { tiers: &[Tier::Ow] };
    /// Any sublocation code
    pub const SUB: IdentifierPattern = IdentifierPattern {
        tiers: &[Tier::Sl, Tier::Ow],
    };

    pub const fn new(tiers: &'static [Tier]) -> Self {
        Self { tiers }
    }

    const fn single(tier: Tier) -> Self {
        match tier {
            Tier::Hl => Self::HL,
            Tier::Sl => Self::SL,
            Tier::Ow => Self::OW,
        }
    }

    pub fn tiers(&self) -> &'static [Tier] {
        self.tiers
    }

    /// `<prefix><6 digits>` for one of the accepted tiers
    pub fn matches(&self, value: &str) -> bool {
        self.tiers.iter().any(|tier| {
            value
                .strip_prefix(tier.prefix())
                .is_some_and(|digits| {
                    digits.len() == CODE_DIGITS && digits.bytes().all(|b| b.is_ascii_digit())
                })
        })
    }

    /// Human readable form used in error messages, e.g. `SL######|OW######`
    pub fn expected(&self) -> String {
        self.tiers
            .iter()
            .map(|tier| format!("{}{}", tier.prefix(), "#".repeat(CODE_DIGITS)))
            .collect::<Vec<_>>()
            .join("|")
    }
}
