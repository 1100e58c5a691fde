//! Static table schemas
//!
//! Every maplayer file is described by one `static` [`TableSchema`]: an
//! ordered list of the columns the tool relies on plus the roles of a few of
//! them. Columns present in a file but not declared here are carried along
//! untouched.

use spoc_model::{is_sync_level, Column, IdentifierPattern, Pattern, Tier};

/// Default name of the column holding the reconciliation stage
pub const SYNC_LEVEL_COLUMN: &str = "SYNC_LEVEL";

/// Column of the file-registry tables holding the H2GO location id
pub const H2GO_LOCID_COLUMN: &str = "H2GO_LOCID";

const SYNC_LEVEL: Column = Column::generic(SYNC_LEVEL_COLUMN).with_pattern(Pattern::Custom {
    check: is_sync_level,
    expected: "LIVE|VALIDATIE|INTERPOLATIE|DEBIET",
});

const H2GO_LOCID: Column = Column::generic(H2GO_LOCID_COLUMN);

/// Role of a table within its tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableRole {
    /// Owns the ids of a tier
    Index,
    /// Historian tag registry
    Tags,
    /// H2GO export registry
    FileRegistry,
    /// Equipment details, keyed by the tier id
    Auxiliary,
}

#[derive(Debug)]
pub struct TableSchema {
    pub name: &'static str,
    pub role: TableRole,
    pub tier: Tier,
    pub id_column: &'static str,
    pub parent_column: Option<&'static str>,
    pub area_column: Option<&'static str>,
    pub columns: &'static [Column],
}

impl TableSchema {
    pub fn filename(&self) -> String {
        format!("{}.csv", self.name)
    }

    pub fn column(&self, name: &str) -> Option<&'static Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn declares(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Parameter columns in declaration order
    pub fn parameters(&self) -> impl Iterator<Item = &'static Column> {
        self.columns.iter().filter(|column| column.is_parameter())
    }

    /// Parameter column carrying the given semantic key
    pub fn parameter(&self, param: &str) -> Option<&'static Column> {
        self.parameters().find(|column| column.param() == Some(param))
    }
}

// ============================================================================
// Top-level locations
// ============================================================================

pub static HL: TableSchema = TableSchema {
    name: "HL",
    role: TableRole::Index,
    tier: Tier::Hl,
    id_column: "CODE",
    parent_column: None,
    area_column: Some("DS_GBD"),
    columns: &[
        Column::generic("OBJECTID"),
        Column::identifier("CODE", IdentifierPattern::HL),
        Column::generic("NAAM"),
        Column::generic("DS_GBD"),
        SYNC_LEVEL,
    ],
};

// ============================================================================
// SL tier: sublocations and their details
// ============================================================================

pub static SL: TableSchema = TableSchema {
    name: "SL",
    role: TableRole::Index,
    tier: Tier::Sl,
    id_column: "CODE",
    parent_column: Some("PARENTLOCATIONID"),
    area_column: Some("GEBIED"),
    columns: &[
        Column::identifier("CODE", IdentifierPattern::SL),
        Column::generic("NAAM"),
        Column::generic("TYPE"),
        Column::generic("GEBIED"),
        Column::reference("PARENTLOCATIONID", IdentifierPattern::HL),
        SYNC_LEVEL,
    ],
};

pub static SL_TAGS: TableSchema = TableSchema {
    name: "SL_TAGS",
    role: TableRole::Tags,
    tier: Tier::Sl,
    id_column: "CODE",
    parent_column: None,
    area_column: None,
    columns: &[
        Column::generic("SHORTNAME"),
        Column::identifier("CODE", IdentifierPattern::SL),
        Column::generic("SOURCE"),
        Column::tag_parameter("TAG_CGOO_BS", "BS").with_relation("SL_TI_H2GO_TAGS"),
        Column::tag_parameter("TAG_CGOO_TT", "TT").with_relation("SL_TI_H2GO_TAGS"),
        Column::tag_parameter("TAG_CGOO_SH", "SH").with_relation("SL_TI_H2GO_TAGS"),
        Column::tag_parameter("TAG_CGOO_SD", "SD").with_relation("SL_TI_H2GO_TAGS"),
        Column::tag_parameter("TAG_CGOO_MWAR", "MWAR").with_relation("SL_TI_H2GO_TAGS"),
        Column::tag_parameter("TAG_CGOO_Q_berekening", "QB").with_relation("SL_TI_H2GO_TAGS"),
        Column::tag_parameter("TAG_CGOO_OPEN_DICHT", "OD").with_relation("SL_TI_H2GO_TAGS"),
        Column::tag_parameter("TAG_CGOO_GKZ", "GKZ").with_relation("SL_TI_H2GO_TAGS"),
        Column::tag_parameter("TAG_CGOO_FREQ", "PF").with_relation("SL_TI_H2GO_TAGS"),
        Column::tag_parameter("TAG_CGOO_A", "A").with_relation("SL_TI_H2GO_TAGS"),
        Column::tag_parameter("TAG_CGOO_SO", "SO").with_relation("SL_TI_H2GO_TAGS"),
        Column::generic("GECONTROLEERD"),
        SYNC_LEVEL,
    ],
};

pub static SL_TI_H2GO_TAGS: TableSchema = TableSchema {
    name: "SL_TI_H2GO_TAGS",
    role: TableRole::FileRegistry,
    tier: Tier::Sl,
    id_column: "SL_CODE",
    parent_column: None,
    area_column: None,
    columns: &[
        Column::identifier("SL_CODE", IdentifierPattern::SL),
        Column::generic("TI_CODE"),
        H2GO_LOCID,
        Column::parameter("BS_0", "BS").with_relation("SL_TAGS"),
        Column::parameter("TT_0", "TT").with_relation("SL_TAGS"),
        Column::parameter("SH_0", "SH").with_relation("SL_TAGS"),
        Column::parameter("SD_0", "SD").with_relation("SL_TAGS"),
        Column::parameter("MWAR_0", "MWAR").with_relation("SL_TAGS"),
        Column::parameter("Q_B_0", "QB").with_relation("SL_TAGS"),
        Column::parameter("OD_0", "OD").with_relation("SL_TAGS"),
        Column::parameter("GKZ_0", "GKZ").with_relation("SL_TAGS"),
        Column::parameter("PF_0", "PF").with_relation("SL_TAGS"),
        Column::parameter("A_0", "A").with_relation("SL_TAGS"),
        Column::parameter("SO_0", "SO").with_relation("SL_TAGS"),
        Column::parameter("HANDH_0", "HANDH"),
        Column::generic("GECONTROLEERD"),
        SYNC_LEVEL,
    ],
};

pub static DAMO_POMP: TableSchema = TableSchema {
    name: "DAMO_pomp",
    role: TableRole::Auxiliary,
    tier: Tier::Sl,
    id_column: "SL_CODE",
    parent_column: None,
    area_column: None,
    columns: &[
        Column::identifier("SL_CODE", IdentifierPattern::SL),
        Column::generic("CODE"),
        Column::generic("CAPACITEIT"),
    ],
};

pub static DAMO_STUW: TableSchema = TableSchema {
    name: "DAMO_stuw",
    role: TableRole::Auxiliary,
    tier: Tier::Sl,
    id_column: "SL_CODE",
    parent_column: None,
    area_column: None,
    columns: &[
        Column::identifier("SL_CODE", IdentifierPattern::SL),
        Column::generic("CODE"),
        Column::generic("KRUINHOOGTE"),
    ],
};

// ============================================================================
// WS tier: water-level stations and their details
// ============================================================================

pub static WS: TableSchema = TableSchema {
    name: "WS",
    role: TableRole::Index,
    tier: Tier::Ow,
    id_column: "CODE",
    parent_column: Some("PARENTLOCATIONID"),
    area_column: Some("GEBIED"),
    columns: &[
        Column::identifier("CODE", IdentifierPattern::OW),
        Column::generic("NAAM"),
        Column::generic("TYPE"),
        Column::generic("GEBIED"),
        Column::reference("PARENTLOCATIONID", IdentifierPattern::HL),
        Column::generic("SCX_Lcode"),
        SYNC_LEVEL,
    ],
};

pub static WS_TAGS: TableSchema = TableSchema {
    name: "WS_TAGS",
    role: TableRole::Tags,
    tier: Tier::Ow,
    id_column: "LOCATIONID",
    parent_column: None,
    area_column: None,
    columns: &[
        Column::identifier("LOCATIONID", IdentifierPattern::OW),
        Column::generic("SOURCE"),
        Column::tag_parameter("TAG_CGOO_MNAP", "HM").with_relation("WS_TI_H2GO_TAGS"),
        Column::tag_parameter("TAG_CGOO_Q", "QM").with_relation("WS_TI_H2GO_TAGS"),
        Column::generic("GECONTROLEERD"),
        SYNC_LEVEL,
    ],
};

pub static WS_TI_H2GO_TAGS: TableSchema = TableSchema {
    name: "WS_TI_H2GO_TAGS",
    role: TableRole::FileRegistry,
    tier: Tier::Ow,
    id_column: "OW_CODE",
    parent_column: None,
    area_column: None,
    columns: &[
        Column::generic("NAAM"),
        Column::identifier("OW_CODE", IdentifierPattern::OW),
        Column::generic("TI_CODE"),
        H2GO_LOCID,
        Column::parameter("H2GO_MEETPUNTID", "HM").with_relation("WS_TAGS"),
        Column::parameter("H2GO_Q", "QM").with_relation("WS_TAGS"),
        Column::parameter("H2GO_HANDMEETPUNTID", "HMHAND"),
        Column::generic("GECONTROLEERD"),
        SYNC_LEVEL,
    ],
};

pub static WS_VALIDATIE: TableSchema = TableSchema {
    name: "WS_VALIDATIE",
    role: TableRole::Auxiliary,
    tier: Tier::Ow,
    id_column: "LOC_ID",
    parent_column: None,
    area_column: None,
    columns: &[
        Column::identifier("LOC_ID", IdentifierPattern::OW),
        Column::generic("HMAX"),
        Column::generic("HMIN"),
    ],
};

// ============================================================================
// Tiers
// ============================================================================

/// One sublocation tier: its index table and the detail tables keyed by it
#[derive(Debug)]
pub struct TierSchema {
    pub tier: Tier,
    pub index: &'static TableSchema,
    pub tags: &'static TableSchema,
    pub file_registry: &'static TableSchema,
    /// All detail tables in traversal order
    pub details: &'static [&'static TableSchema],
}

pub static SL_TIER: TierSchema = TierSchema {
    tier: Tier::Sl,
    index: &SL,
    tags: &SL_TAGS,
    file_registry: &SL_TI_H2GO_TAGS,
    details: &[&SL_TAGS, &SL_TI_H2GO_TAGS, &DAMO_POMP, &DAMO_STUW],
};

pub static WS_TIER: TierSchema = TierSchema {
    tier: Tier::Ow,
    index: &WS,
    tags: &WS_TAGS,
    file_registry: &WS_TI_H2GO_TAGS,
    details: &[&WS_TAGS, &WS_TI_H2GO_TAGS, &WS_VALIDATIE],
};

/// Sublocation tiers below the top-level table
pub static SUB_TIERS: [&TierSchema; 2] = [&SL_TIER, &WS_TIER];

impl TierSchema {
    /// Tables of this tier, index first
    pub fn tables(&self) -> impl Iterator<Item = &'static TableSchema> {
        std::iter::once(self.index).chain(self.details.iter().copied())
    }
}

/// Every table in top-down traversal order
pub fn all_tables() -> impl Iterator<Item = &'static TableSchema> {
    std::iter::once(&HL).chain(SUB_TIERS.iter().flat_map(|tier| tier.tables()))
}
