//! Hierarchical indexer
//!
//! For one top-level location the indexer resolves its sublocations, unifies
//! the parameter columns of the tag and file-registry tables by their
//! semantic key and builds one [`ParamMatch`] per sublocation and parameter.
//! It also reads and advances the sync level of every contributing row.

use std::collections::BTreeMap;

use errors::{SpocError, SpocResult};
use spoc_model::{Column, SyncLevel, Tag};
use spoc_registry::schema::{TableRole, TierSchema, HL, SUB_TIERS};
use spoc_registry::SpocTree;
use tracing::{debug, info};

use crate::param_match::{IndexField, ParamKey, ParamMatch, ParamValue};

/// Sublocation ids of one top-level location
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SublocationIds {
    pub hl: String,
    pub sl: Vec<String>,
    pub ws: Vec<String>,
}

/// An id with the tables that hold a row for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    pub id: String,
    pub index_table: &'static str,
    pub tables: Vec<&'static str>,
}

#[derive(Debug, Clone)]
pub struct Indexer {
    ids: SublocationIds,
    indexes: Vec<Index>,
}

impl Indexer {
    pub fn new(tree: &SpocTree, root_id: &str) -> SpocResult<Self> {
        let hl = tree.of(&HL)?;
        if !hl.contains(root_id) {
            return Err(SpocError::not_found(format!("location {} in {}", root_id, HL.name)));
        }

        let mut ids = SublocationIds {
            hl: root_id.to_string(),
            ..SublocationIds::default()
        };
        let mut indexes = vec![Index {
            id: root_id.to_string(),
            index_table: HL.name,
            tables: Vec::new(),
        }];

        for (tier, slot) in SUB_TIERS.iter().zip([&mut ids.sl, &mut ids.ws]) {
            let sub_ids = tree.of(tier.index)?.ids_by_parent(&[root_id]);
            for id in &sub_ids {
                let mut tables = Vec::new();
                for detail in tier.details {
                    if tree.of(detail)?.contains(id) {
                        tables.push(detail.name);
                    }
                }
                indexes.push(Index {
                    id: id.clone(),
                    index_table: tier.index.name,
                    tables,
                });
            }
            *slot = sub_ids;
        }

        info!(
            "Indexed {}: {} SL, {} WS sublocations",
            root_id,
            ids.sl.len(),
            ids.ws.len()
        );
        Ok(Self { ids, indexes })
    }

    pub fn sublocation_ids(&self) -> &SublocationIds {
        &self.ids
    }

    /// HL index first, then every sublocation
    pub fn indexes(&self) -> &[Index] {
        &self.indexes
    }

    /// Parameter columns of a tier's tag and file-registry tables, by param
    pub fn param_columns(
        tier: &TierSchema,
    ) -> BTreeMap<&'static str, BTreeMap<&'static str, &'static Column>> {
        let mut params: BTreeMap<&'static str, BTreeMap<&'static str, &'static Column>> =
            BTreeMap::new();
        for schema in [tier.tags, tier.file_registry] {
            for column in schema.parameters() {
                if let Some(param) = column.param() {
                    params.entry(param).or_default().insert(schema.name, column);
                }
            }
        }
        params
    }

    /// One match per sublocation id and parameter
    pub fn parameter_matches(
        &self,
        tree: &SpocTree,
        exclude_empty: bool,
    ) -> SpocResult<Vec<ParamMatch>> {
        let mut matches = Vec::new();

        for (tier, ids) in SUB_TIERS.iter().zip([&self.ids.sl, &self.ids.ws]) {
            let params = Self::param_columns(tier);
            for id in ids {
                for (&param, columns) in &params {
                    let mut field = IndexField::default();
                    for (&table, &column) in columns {
                        let value = Self::param_value(tree, table, id, column)?;
                        field.insert(table, column.name, value);
                    }

                    let param_match = ParamMatch {
                        key: ParamKey::new(id.as_str(), param),
                        tier: tier.tier,
                        tag_table: tier.tags.name,
                        file_table: tier.file_registry.name,
                        field,
                    };
                    if exclude_empty && param_match.field.is_empty(&[
                        param_match.tag_table,
                        param_match.file_table,
                    ]) {
                        continue;
                    }
                    matches.push(param_match);
                }
            }
        }

        debug!("Built {} parameter matches for {}", matches.len(), self.ids.hl);
        Ok(matches)
    }

    fn param_value(
        tree: &SpocTree,
        table: &str,
        id: &str,
        column: &Column,
    ) -> SpocResult<Option<ParamValue>> {
        let table = tree.table(table)?;
        let Some(raw) = table.param_value(id, column) else {
            return Ok(None);
        };
        match table.schema().role {
            TableRole::Tags => Ok(Tag::parse(&raw)
                .map_err(|e| e.located(table.name(), column.name))?
                .map(ParamValue::Tag)),
            _ => Ok(Some(ParamValue::Raw(raw))),
        }
    }

    /// Rows that carry the sync level for this location, as (table, id)
    fn contributing_rows<'a>(
        &'a self,
        tree: &'a SpocTree,
        column: &'a str,
    ) -> impl Iterator<Item = SpocResult<(&'static str, &'a str)>> + 'a {
        self.indexes.iter().flat_map(move |index| {
            std::iter::once(index.index_table)
                .chain(index.tables.iter().copied())
                .filter_map(move |name| match tree.table(name) {
                    Ok(table) if table.schema().declares(column) && table.contains(&index.id) => {
                        Some(Ok((name, index.id.as_str())))
                    },
                    Ok(_) => None,
                    Err(e) => Some(Err(e)),
                })
        })
    }

    /// The level every contributing row agrees on
    pub fn sync_level(&self, tree: &SpocTree, column: &str) -> SpocResult<SyncLevel> {
        let mut levels = Vec::new();
        for row in self.contributing_rows(tree, column) {
            let (table, id) = row?;
            let text = tree.table(table)?.field(id, column).unwrap_or("");
            levels.push(text.parse::<SyncLevel>()?);
        }
        Ok(SyncLevel::agreed(levels, &self.ids.hl, column)?)
    }

    /// Advance every contributing row by exactly one level
    pub fn set_sync_level(
        &self,
        tree: &mut SpocTree,
        requested: SyncLevel,
        column: &str,
    ) -> SpocResult<()> {
        let current = self.sync_level(tree, column)?;
        let level = current.advance(requested)?;

        let rows: Vec<(&'static str, String)> = self
            .contributing_rows(tree, column)
            .map(|row| row.map(|(table, id)| (table, id.to_string())))
            .collect::<SpocResult<_>>()?;
        if rows.is_empty() {
            return Err(SpocError::not_found(format!(
                "rows with column {} for {}",
                column, self.ids.hl
            )));
        }

        for (table, id) in &rows {
            tree.table_mut(table)?.set_field(id, column, level.as_str())?;
        }
        info!(
            "Sync level of {} moved from {} to {} ({} rows)",
            self.ids.hl,
            current,
            level,
            rows.len()
        );
        Ok(())
    }
}
