//! The table tree: HL -> {SL, WS} -> detail tables

use std::collections::HashMap;
use std::path::Path;

use errors::{SpocError, SpocResult};
use tracing::{debug, info};

use crate::csv_io::CsvOptions;
use crate::schema::{all_tables, TableSchema};
use crate::table::SpocTable;

/// All maplayer tables, stored in top-down traversal order
#[derive(Debug)]
pub struct SpocTree {
    tables: Vec<SpocTable>,
    names: HashMap<String, usize>,
}

impl Default for SpocTree {
    fn default() -> Self {
        Self::new()
    }
}

impl SpocTree {
    /// Assemble empty tables for every schema
    pub fn new() -> Self {
        Self::from_tables(all_tables().map(SpocTable::new).collect())
    }

    fn from_tables(tables: Vec<SpocTable>) -> Self {
        let names = tables
            .iter()
            .enumerate()
            .map(|(i, table)| (table.name().to_lowercase(), i))
            .collect();
        Self { tables, names }
    }

    pub fn iter(&self) -> impl Iterator<Item = &SpocTable> {
        self.tables.iter()
    }

    /// Resolve a table by name, case-insensitively
    pub fn table(&self, name: &str) -> SpocResult<&SpocTable> {
        self.names
            .get(&name.to_lowercase())
            .map(|&i| &self.tables[i])
            .ok_or_else(|| SpocError::not_found(format!("table {}", name)))
    }

    pub fn table_mut(&mut self, name: &str) -> SpocResult<&mut SpocTable> {
        match self.names.get(&name.to_lowercase()) {
            Some(&i) => Ok(&mut self.tables[i]),
            None => Err(SpocError::not_found(format!("table {}", name))),
        }
    }

    /// Table for a schema
    pub fn of(&self, schema: &TableSchema) -> SpocResult<&SpocTable> {
        self.table(schema.name)
    }

    /// Replace a table with an in-memory one
    pub fn insert(&mut self, table: SpocTable) -> SpocResult<()> {
        let slot = self.table_mut(table.name())?;
        *slot = table;
        Ok(())
    }

    pub fn load(&mut self, dir: &Path, options: &CsvOptions) -> SpocResult<()> {
        for table in &mut self.tables {
            table.read(dir, options)?;
        }
        info!("Loaded {} tables from {}", self.tables.len(), dir.display());
        Ok(())
    }

    pub fn save(&self, dir: &Path, options: &CsvOptions) -> SpocResult<()> {
        std::fs::create_dir_all(dir)?;
        for table in &self.tables {
            table.write(dir, options)?;
        }
        info!("Saved {} tables to {}", self.tables.len(), dir.display());
        Ok(())
    }

    /// Validate every table top-down, stopping at the first violation
    pub fn validate(&self) -> SpocResult<()> {
        for table in &self.tables {
            table.validate()?;
        }
        self.check_relations()
    }

    /// Every parameter relation must name a table declaring the same param
    pub fn check_relations(&self) -> SpocResult<()> {
        for table in &self.tables {
            for column in table.schema().parameters() {
                let (Some(param), Some(relation)) = (column.param(), column.relation()) else {
                    continue;
                };
                let target = self.table(relation)?;
                if target.schema().parameter(param).is_none() {
                    return Err(SpocError::Configuration(format!(
                        "{}@{} relates to {}, which has no parameter {}",
                        table.name(),
                        column.name,
                        relation,
                        param
                    )));
                }
            }
        }
        debug!("Parameter relations are consistent");
        Ok(())
    }
}
