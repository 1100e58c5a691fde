//! End-to-end reconciliation over the registry fixture maplayers
#![allow(clippy::disallowed_methods)] // Integration test - unwrap is acceptable

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDateTime;
use errors::{ConsistencyError, SpocError, TagStateError};
use spoc_model::{SyncLevel, Tag, Tier};
use spoc_reconcile::{
    ErrorPolicy, FixedTimeProvider, H2goRegistry, IndexField, Indexer, MatchGroup,
    MemoryHistorian, ParamKey, ParamMatch, ParamValue, ReconcileOptions, Reconciler,
};
use spoc_registry::{CsvOptions, SpocTree, SYNC_LEVEL_COLUMN};
use tempfile::TempDir;

const BAANBREKER: &str = "~SCX.~Watersysteem.Objecten.De Baanbreker";

fn tag(object: &str, suffix: &str) -> String {
    format!("{BAANBREKER}.{object}.Tags.{suffix}.Historic")
}

fn sd_tag() -> String {
    tag("Ronde Morgen", "NL*09*001049 wtSTs--1001.s--1001_SD")
}

fn bs_tag() -> String {
    tag("Ronde Morgen", "NL*09*001049 wtSTs--1001.s--1001_BS")
}

fn mnap_tag() -> String {
    tag("Peilschaal Noord", "NL*09*001051 wtPS--1003.p--1003_MNAP")
}

fn at(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
}

fn maplayers() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../spoc-registry/tests/fixtures/maplayers")
}

fn load_tree() -> SpocTree {
    let mut tree = SpocTree::new();
    tree.load(&maplayers(), &CsvOptions::default()).unwrap();
    tree.validate().unwrap();
    tree
}

fn export(locid: &str, mptid: &str, last: &str) -> String {
    format!(
        "LOCATIEID;MEETPUNTID;DATUM;TIJD;WAARDE\n{locid};{mptid};01-01-2024;00:00:00;1\n{locid};{mptid};{last};2\n"
    )
}

struct Fixture {
    dir: TempDir,
    registry: H2goRegistry,
    historian: MemoryHistorian,
    clock: FixedTimeProvider,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("h2go");
        std::fs::create_dir_all(src.join("sl")).unwrap();
        std::fs::create_dir_all(src.join("ws")).unwrap();
        for (name, body) in [
            ("sl/1001_BS1.csv", export("1001", "BS1", "01-01-2024;00:15:00")),
            ("sl/1001_SH1.csv", export("1001", "SH1", "01-01-2024;00:15:00")),
            ("sl/1001_SD1.csv", export("1001", "SD1", "01-01-2024;06:00:00")),
            ("sl/1002_TT1.csv", export("1002", "TT1", "01-01-2024;00:15:00")),
            ("sl/1002_HH1.csv", export("1002", "HH1", "01-01-2024;00:15:00")),
            ("ws/2001_HM1.csv", export("2001", "HM1", "01-01-2024;00:15:00")),
            ("ws/2002_HMH2.csv", export("2002", "HMH2", "01-01-2024;00:15:00")),
        ] {
            std::fs::write(src.join(name), body).unwrap();
        }

        let registry = H2goRegistry::new(src, dir.path().join("h2go_out"), CsvOptions::default());

        let mut historian = MemoryHistorian::new();
        for tag in [sd_tag(), bs_tag(), mnap_tag()] {
            historian.insert(&tag, at("2024-01-01 12:00:00"), "0,40");
            historian.insert(&tag, at("2024-02-01 12:00:00"), "0,45");
            // visible to the one-day-ahead probe
            historian.insert(&tag, at("2024-03-02 12:30:00"), "0,50");
        }

        Self {
            dir,
            registry,
            historian,
            clock: FixedTimeProvider::new(at("2024-03-01 12:00:00")),
        }
    }

    fn options(&self, policy: ErrorPolicy) -> ReconcileOptions {
        ReconcileOptions {
            start: at("2024-01-01 00:00:00"),
            end: at("2024-03-01 00:00:00"),
            throttle: Duration::ZERO,
            policy,
            outdir: self.dir.path().join("tags"),
            csv: CsvOptions::default(),
        }
    }

    fn reconciler(&self, policy: ErrorPolicy) -> Reconciler<'_> {
        Reconciler::new(&self.historian, &self.clock, &self.registry, self.options(policy))
    }
}

fn matches_for(tree: &SpocTree, root: &str) -> Vec<ParamMatch> {
    Indexer::new(tree, root)
        .unwrap()
        .parameter_matches(tree, true)
        .unwrap()
}

#[test]
fn test_h2go_only_is_saved_without_query() {
    let fixture = Fixture::new();
    let tree = load_tree();
    let matches: Vec<_> = matches_for(&tree, "HL000001")
        .into_iter()
        .filter(|m| m.group() == MatchGroup::H2goOnly)
        .collect();
    assert_eq!(matches.len(), 2);

    let report = fixture.reconciler(ErrorPolicy::Raise).run(matches).unwrap();
    assert_eq!(report.h2go_saved, 2);
    assert_eq!(report.queries, 0);
    assert_eq!(fixture.historian.query_count(), 0);

    let saved = fixture.dir.path().join("h2go_out/1001_SH1.csv");
    let original = fixture.dir.path().join("h2go/sl/1001_SH1.csv");
    assert_eq!(std::fs::read(saved).unwrap(), std::fs::read(original).unwrap());
}

#[test]
fn test_muted_tag_raises() {
    let fixture = Fixture::new();
    let tree = load_tree();
    let err = fixture
        .reconciler(ErrorPolicy::Raise)
        .run(matches_for(&tree, "HL000001"))
        .unwrap_err();
    assert!(matches!(err, SpocError::TagState(TagStateError::Muted { .. })));
}

#[test]
fn test_log_and_skip_continues_past_muted_tag() {
    let fixture = Fixture::new();
    let tree = load_tree();
    let report = fixture
        .reconciler(ErrorPolicy::LogAndSkip)
        .run(matches_for(&tree, "HL000001"))
        .unwrap();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].key, ParamKey::new("SL000002", "TT"));
    assert_eq!(report.failures[0].code, "TAG_MUTED");
    assert_eq!(report.tags_saved, 3);
    assert_eq!(report.h2go_saved, 5);
    assert_eq!(report.queries, 2);
    // one probe per tag location plus one query per tag location
    assert_eq!(fixture.historian.query_count(), 4);

    let sd = Tag::parse(&sd_tag()).unwrap().unwrap();
    let series = std::fs::read_to_string(fixture.dir.path().join("tags").join(sd.filename())).unwrap();
    assert!(series.starts_with("DATUM;TIJD;WAARDE\n"));
}

#[test]
fn test_both_group_queries_incrementally() {
    let fixture = Fixture::new();
    let tree = load_tree();
    fixture
        .reconciler(ErrorPolicy::LogAndSkip)
        .run(matches_for(&tree, "HL000001"))
        .unwrap();

    let query = fixture
        .historian
        .queries()
        .into_iter()
        .find(|q| q.location == "001049" && q.end == at("2024-03-01 00:00:00"))
        .unwrap();
    // earliest end timestamp of the BS1 and SD1 exports
    assert_eq!(query.start, at("2024-01-01 00:15:00"));

    let sd = Tag::parse(&sd_tag()).unwrap().unwrap();
    let series = std::fs::read_to_string(fixture.dir.path().join("tags").join(sd.filename())).unwrap();
    assert_eq!(
        series,
        "DATUM;TIJD;WAARDE\n01-01-2024;12:00:00;0,40\n01-02-2024;12:00:00;0,45\n"
    );
}

#[test]
fn test_unknown_tag_is_rejected() {
    let mut fixture = Fixture::new();
    fixture.historian = MemoryHistorian::new();
    let tree = load_tree();
    let report = fixture
        .reconciler(ErrorPolicy::LogAndSkip)
        .run(matches_for(&tree, "HL000001"))
        .unwrap();
    assert!(report.failures.iter().any(|f| f.code == "TAG_UNKNOWN"));
    assert_eq!(report.tags_saved, 0);
}

#[test]
fn test_missing_export_is_match_scoped() {
    let fixture = Fixture::new();
    std::fs::remove_file(fixture.dir.path().join("h2go/sl/1001_SH1.csv")).unwrap();
    let tree = load_tree();

    let report = fixture
        .reconciler(ErrorPolicy::LogAndSkip)
        .run(matches_for(&tree, "HL000001"))
        .unwrap();
    assert!(report
        .failures
        .iter()
        .any(|f| f.code == "FILE_NOT_FOUND" && f.column == "SH_0" && f.value == "1001_SH1"));
}

#[test]
fn test_clean_run_advances_sync_level() {
    let fixture = Fixture::new();
    let mut tree = load_tree();

    let report = fixture
        .reconciler(ErrorPolicy::Raise)
        .reconcile_location(&mut tree, "HL000002", None, SYNC_LEVEL_COLUMN)
        .unwrap();
    assert_eq!(report.level_from, SyncLevel::Unset);
    assert_eq!(report.level_to, Some(SyncLevel::Live));
    assert_eq!(report.h2go_saved, 1);
    assert_eq!(fixture.historian.query_count(), 0);

    assert_eq!(tree.table("HL").unwrap().field("HL000002", "SYNC_LEVEL"), Some("LIVE"));
    assert_eq!(tree.table("WS_TI_H2GO_TAGS").unwrap().field("OW000002", "SYNC_LEVEL"), Some("LIVE"));
    assert_eq!(tree.table("HL").unwrap().field("HL000001", "SYNC_LEVEL"), Some(""));
}

#[test]
fn test_skipped_matches_keep_sync_level() {
    let fixture = Fixture::new();
    let mut tree = load_tree();

    let report = fixture
        .reconciler(ErrorPolicy::LogAndSkip)
        .reconcile_location(&mut tree, "HL000001", None, SYNC_LEVEL_COLUMN)
        .unwrap();
    assert_eq!(report.level_to, None);
    assert_eq!(tree.table("HL").unwrap().field("HL000001", "SYNC_LEVEL"), Some(""));
}

#[test]
fn test_level_skip_is_rejected_before_any_work() {
    let fixture = Fixture::new();
    let mut tree = load_tree();

    let err = fixture
        .reconciler(ErrorPolicy::LogAndSkip)
        .reconcile_location(&mut tree, "HL000002", Some(SyncLevel::Validatie), SYNC_LEVEL_COLUMN)
        .unwrap_err();
    assert!(matches!(
        err,
        SpocError::Consistency(ConsistencyError::IllegalTransition { .. })
    ));
    assert!(!fixture.dir.path().join("h2go_out").exists());
}

fn colliding_tag() -> String {
    "~SCX.~Watersysteem.Objecten.De-Baanbreker.Ronde Morgen.Tags.NL*09*001049 wtSTs--1001.s--1001_SD.Historic"
        .to_string()
}

fn tag_only(id: &str, raw: &str) -> ParamMatch {
    let mut field = IndexField::default();
    field.insert(
        "SL_TAGS",
        "TAG_CGOO_SD",
        Some(ParamValue::Tag(Tag::parse(raw).unwrap().unwrap())),
    );
    field.insert("SL_TI_H2GO_TAGS", "SD_0", None);
    ParamMatch {
        key: ParamKey::new(id, "SD"),
        tier: Tier::Sl,
        tag_table: "SL_TAGS",
        file_table: "SL_TI_H2GO_TAGS",
        field,
    }
}

#[test]
fn test_filename_collision_is_fatal_before_any_write() {
    let mut fixture = Fixture::new();
    let (first, second) = (sd_tag(), colliding_tag());
    fixture.historian.insert(&second, at("2024-03-02 12:30:00"), "0,50");

    let err = fixture
        .reconciler(ErrorPolicy::LogAndSkip)
        .run(vec![tag_only("SL000001", &first), tag_only("SL000009", &second)])
        .unwrap_err();
    assert!(matches!(
        err,
        SpocError::Consistency(ConsistencyError::FilenameCollision { .. })
    ));
    assert!(!fixture.dir.path().join("tags").exists());
    assert_eq!(fixture.historian.query_count(), 0);
}

#[test]
fn test_each_run_starts_with_fresh_state() {
    let mut fixture = Fixture::new();
    let second = colliding_tag();
    fixture.historian.insert(&second, at("2024-03-02 12:30:00"), "0,50");
    let mut reconciler = fixture.reconciler(ErrorPolicy::Raise);

    let first = reconciler.run(vec![tag_only("SL000001", &sd_tag())]).unwrap();
    let again = reconciler.run(vec![tag_only("SL000009", &second)]).unwrap();
    assert_eq!((first.tags_saved, again.tags_saved), (1, 1));
    // the known tags are probed again in the second run
    assert_eq!(fixture.historian.query_count(), 4);
}

#[test]
fn test_throttle_spaces_every_historian_query() {
    let fixture = Fixture::new();
    let tree = load_tree();
    let throttle = Duration::from_millis(40);
    let options = ReconcileOptions {
        throttle,
        ..fixture.options(ErrorPolicy::LogAndSkip)
    };

    Reconciler::new(&fixture.historian, &fixture.clock, &fixture.registry, options)
        .run(matches_for(&tree, "HL000001"))
        .unwrap();

    let queries = fixture.historian.queries();
    // two known-tags probes and two time-series queries
    assert_eq!(queries.len(), 4);
    for pair in queries.windows(2) {
        let gap = pair[1].received.duration_since(pair[0].received);
        assert!(gap >= throttle, "queries only {gap:?} apart");
    }
}
