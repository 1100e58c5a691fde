//! Spoc Registry Library
//!
//! The maplayer file registry: static table schemas, the in-memory
//! [`SpocTable`], the [`SpocTree`] holding all tables, and the byte-preserving
//! CSV layer underneath.

pub mod csv_io;
pub mod schema;
pub mod table;
pub mod tree;

// Re-exports for convenience
pub use csv_io::{CsvOptions, Encoding};
pub use schema::{TableRole, TableSchema, TierSchema, SUB_TIERS, SYNC_LEVEL_COLUMN};
pub use table::{Row, SpocTable};
pub use tree::SpocTree;
