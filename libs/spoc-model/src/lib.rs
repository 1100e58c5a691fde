//! Spoc Model Library
//!
//! Pure domain logic for spoccer, without any IO:
//!
//! - `tag`: historian tag parsing into structured fields
//! - `identifier`: tiered asset codes (`HL`, `SL`, `OW`)
//! - `column`: declarative column descriptors and their validation rules
//! - `sync_level`: ordered reconciliation stages
//!
//! # Example
//!
//! ```
//! use spoc_model::Tag;
//!
//! let raw = "~SCX.~Watersysteem.Objecten.De Baanbreker.Ronde Morgen.Tags.NL*09*001049 wtSTs--1001.s--1001_SD.Historic";
//! let tag = Tag::parse(raw).unwrap().unwrap();
//! assert_eq!(tag.legger_code(), Some("001049"));
//! assert_eq!(tag.param_code(), Some("SD"));
//! ```

pub mod column;
pub mod identifier;
pub mod sync_level;
pub mod tag;

// Re-exports for convenience
pub use column::{Column, ColumnKind, Pattern};
pub use identifier::{IdentifierPattern, Tier};
pub use sync_level::{is_sync_level, SyncLevel};
pub use tag::{is_tag_like, Tag, TagKind};
