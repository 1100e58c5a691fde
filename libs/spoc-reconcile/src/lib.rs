//! Spoc Reconcile Library
//!
//! Joins the maplayer registry, the historian tag registry and the H2GO file
//! registry for one top-level location and drives the synchronization:
//!
//! - `indexer`: sublocation ids, parameter matches and sync levels
//! - `param_match`: match records and their classification
//! - `historian` / `h2go`: the two external sources
//! - `policy`: what to do with a failure scoped to a single match
//! - `driver`: the reconciliation run

pub mod driver;
pub mod h2go;
pub mod historian;
pub mod indexer;
pub mod param_match;
pub mod policy;

// Re-exports for convenience
pub use driver::{ReconcileOptions, ReconcileReport, Reconciler};
pub use h2go::{H2goRecord, H2goRegistry};
pub use historian::{
    CsvHistorian, FixedTimeProvider, Historian, HistorianRow, KnownTagsCache, MemoryHistorian,
    SystemTimeProvider, TimeProvider,
};
pub use indexer::{Indexer, SublocationIds};
pub use param_match::{IndexField, MatchGroup, ParamKey, ParamMatch, ParamValue};
pub use policy::{ErrorPolicy, MatchFailure};

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
pub(crate) mod test_support {
    use std::path::PathBuf;

    use spoc_registry::{CsvOptions, SpocTree};

    pub fn fixture_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../spoc-registry/tests/fixtures/maplayers")
    }

    /// The registry fixture maplayers, loaded and validated
    pub fn fixture_tree() -> SpocTree {
        let mut tree = SpocTree::new();
        tree.load(&fixture_dir(), &CsvOptions::default()).unwrap();
        tree.validate().unwrap();
        tree
    }
}
