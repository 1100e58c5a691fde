//! In-memory maplayer table
//!
//! A [`SpocTable`] exclusively owns its rows. Columns are schema metadata
//! only; all access goes through explicit `field`/`set_field` calls keyed by
//! the primary-key id and a column name.

use std::collections::HashMap;
use std::path::Path;

use errors::{ColumnError, SpocError, SpocResult};
use spoc_model::Column;
use tracing::{debug, warn};

use crate::csv_io::{read_csv, write_csv, CsvContent, CsvOptions, TableLayout};
use crate::schema::{TableRole, TableSchema, H2GO_LOCID_COLUMN};

/// Borrowed view on a single row
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    headers: &'a [String],
    values: &'a [String],
}

impl<'a> Row<'a> {
    pub fn get(&self, column: &str) -> Option<&'a str> {
        self.headers
            .iter()
            .position(|header| header == column)
            .and_then(|i| self.values.get(i))
            .map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a str)> {
        self.headers
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().map(String::as_str))
    }
}

#[derive(Debug)]
pub struct SpocTable {
    schema: &'static TableSchema,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    index: HashMap<String, usize>,
    layout: TableLayout,
}

impl SpocTable {
    /// Empty table with the declared columns as header
    pub fn new(schema: &'static TableSchema) -> Self {
        Self {
            schema,
            headers: schema.columns.iter().map(|c| c.name.to_string()).collect(),
            rows: Vec::new(),
            index: HashMap::new(),
            layout: TableLayout::default(),
        }
    }

    /// Table from in-memory records; short rows are padded with missing values
    pub fn from_records(
        schema: &'static TableSchema,
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
    ) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();

        let mut table = Self {
            schema,
            headers,
            rows,
            index: HashMap::new(),
            layout: TableLayout::default(),
        };
        table.set_primary_key_index();
        table
    }

    pub fn name(&self) -> &'static str {
        self.schema.name
    }

    pub fn schema(&self) -> &'static TableSchema {
        self.schema
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Load `<dir>/<name>.csv`, replacing the current contents
    pub fn read(&mut self, dir: &Path, options: &CsvOptions) -> SpocResult<()> {
        let path = dir.join(self.schema.filename());
        let content = read_csv(&path, options)?;
        self.headers = content.headers;
        self.rows = content.rows;
        self.layout = content.layout;
        self.set_primary_key_index();
        debug!("Loaded table {} ({} rows)", self.name(), self.rows.len());
        Ok(())
    }

    /// Save to `<dir>/<name>.csv`
    pub fn write(&self, dir: &Path, options: &CsvOptions) -> SpocResult<()> {
        let path = dir.join(self.schema.filename());
        let content = CsvContent {
            headers: self.headers.clone(),
            rows: self.rows.clone(),
            layout: self.layout,
        };
        write_csv(&path, &content, options)
    }

    /// Rebuild the id -> row index
    ///
    /// Missing ids are skipped and the first occurrence of a duplicate id
    /// wins; duplicates themselves are reported by [`SpocTable::validate`].
    pub fn set_primary_key_index(&mut self) {
        self.index.clear();
        let Some(col) = self.column_index(self.schema.id_column) else {
            return;
        };
        for (i, row) in self.rows.iter().enumerate() {
            let id = &row[col];
            if !id.is_empty() && !self.index.contains_key(id) {
                self.index.insert(id.clone(), i);
            }
        }
    }

    /// Check the header, then run every declared column's rules
    pub fn validate(&self) -> Result<(), ColumnError> {
        for column in self.schema.columns {
            if self.column_index(column.name).is_none() {
                return Err(ColumnError::MissingColumn {
                    table: self.name().to_string(),
                    column: column.name.to_string(),
                });
            }
        }

        for column in self.schema.columns {
            let values = self.column(column.name).unwrap_or_default();
            column.validate(self.name(), &values)?;
        }
        debug!("Validated table {}", self.name());
        Ok(())
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    /// All values of a column in row order
    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let col = self.column_index(name)?;
        Some(self.rows.iter().map(|row| row[col].as_str()).collect())
    }

    /// Primary-key values in row order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        let col = self.column_index(self.schema.id_column);
        self.rows
            .iter()
            .filter_map(move |row| col.map(|c| row[c].as_str()))
            .filter(|id| !id.is_empty())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn row(&self, id: &str) -> Option<Row<'_>> {
        self.index.get(id).map(|&i| Row {
            headers: &self.headers,
            values: &self.rows[i],
        })
    }

    /// Raw cell text; `None` when the row or column does not exist
    pub fn field(&self, id: &str, column: &str) -> Option<&str> {
        let col = self.column_index(column)?;
        self.index.get(id).map(|&i| self.rows[i][col].as_str())
    }

    pub fn set_field(&mut self, id: &str, column: &str, value: &str) -> SpocResult<()> {
        let col = self.column_index(column).ok_or_else(|| {
            SpocError::not_found(format!("column {}@{}", self.name(), column))
        })?;
        let row = *self
            .index
            .get(id)
            .ok_or_else(|| SpocError::not_found(format!("row {} in {}", id, self.name())))?;
        self.rows[row][col] = value.to_string();
        Ok(())
    }

    /// Append a row given as column/value pairs; undeclared columns are rejected
    pub fn append_row(&mut self, values: &[(&str, &str)]) -> SpocResult<()> {
        let mut row = vec![String::new(); self.headers.len()];
        for (column, value) in values {
            let col = self.column_index(column).ok_or_else(|| {
                SpocError::not_found(format!("column {}@{}", self.name(), column))
            })?;
            row[col] = (*value).to_string();
        }

        let id = self
            .column_index(self.schema.id_column)
            .map(|col| row[col].clone())
            .unwrap_or_default();
        if id.is_empty() {
            return Err(ColumnError::EmptyField {
                table: self.name().to_string(),
                column: self.schema.id_column.to_string(),
                row: self.rows.len(),
            }
            .into());
        }
        if self.index.contains_key(&id) {
            return Err(ColumnError::NonUnique {
                table: self.name().to_string(),
                column: self.schema.id_column.to_string(),
                value: id,
            }
            .into());
        }

        self.index.insert(id, self.rows.len());
        self.rows.push(row);
        Ok(())
    }

    /// Ids of rows whose parent column holds one of `parents`
    pub fn ids_by_parent(&self, parents: &[&str]) -> Vec<String> {
        match self.schema.parent_column {
            Some(column) => self.ids_where(column, parents),
            None => {
                warn!("Table {} has no parent column", self.name());
                Vec::new()
            },
        }
    }

    /// Ids of rows whose area column holds one of `areas`
    pub fn ids_by_area(&self, areas: &[&str]) -> Vec<String> {
        match self.schema.area_column {
            Some(column) => self.ids_where(column, areas),
            None => {
                warn!("Table {} has no area column", self.name());
                Vec::new()
            },
        }
    }

    fn ids_where(&self, column: &str, wanted: &[&str]) -> Vec<String> {
        let (Some(col), Some(id_col)) = (
            self.column_index(column),
            self.column_index(self.schema.id_column),
        ) else {
            return Vec::new();
        };
        self.rows
            .iter()
            .filter(|row| wanted.contains(&row[col].as_str()))
            .map(|row| row[id_col].clone())
            .filter(|id| !id.is_empty())
            .collect()
    }

    /// `_`-joined non-missing values of `columns` for one row
    pub fn join_fields(&self, id: &str, columns: &[&str]) -> Option<String> {
        let parts: Vec<&str> = columns
            .iter()
            .filter_map(|column| self.field(id, column))
            .filter(|value| !value.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("_"))
        }
    }

    /// Value a parameter column contributes for one id
    ///
    /// File-registry tables prefix the H2GO location id and report nothing
    /// when either half is missing. Other tables report the raw cell.
    pub fn param_value(&self, id: &str, column: &Column) -> Option<String> {
        let value = self.field(id, column.name).filter(|v| !v.is_empty())?;
        match self.schema.role {
            TableRole::FileRegistry => {
                let locid = self.field(id, H2GO_LOCID_COLUMN).filter(|v| !v.is_empty())?;
                Some(format!("{}_{}", locid, value))
            },
            _ => Some(value.to_string()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::schema::{HL, SL, SL_TI_H2GO_TAGS};

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn hl(codes: &[&str]) -> SpocTable {
        SpocTable::from_records(
            &HL,
            strings(&["OBJECTID", "CODE", "NAAM", "DS_GBD", "SYNC_LEVEL"]),
            codes
                .iter()
                .enumerate()
                .map(|(i, code)| strings(&[&i.to_string(), code, "x", "Noord", ""]))
                .collect(),
        )
    }

    #[test]
    fn test_duplicate_primary_key_is_non_unique() {
        let err = hl(&["HL000001", "HL000001"]).validate().unwrap_err();
        match err {
            ColumnError::NonUnique { table, column, value } => {
                assert_eq!(table, "HL");
                assert_eq!(column, "CODE");
                assert_eq!(value, "HL000001");
            },
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_declared_column() {
        let table = SpocTable::from_records(
            &HL,
            strings(&["OBJECTID", "CODE", "NAAM"]),
            vec![strings(&["1", "HL000001", "x"])],
        );
        let err = table.validate().unwrap_err();
        assert!(matches!(err, ColumnError::MissingColumn { ref column, .. } if column == "DS_GBD"));
    }

    #[test]
    fn test_field_access() {
        let mut table = hl(&["HL000001", "HL000002"]);
        assert_eq!(table.field("HL000002", "NAAM"), Some("x"));
        assert_eq!(table.field("HL000002", "SYNC_LEVEL"), Some(""));
        assert_eq!(table.field("HL000003", "NAAM"), None);
        assert_eq!(table.field("HL000001", "UNKNOWN"), None);

        table.set_field("HL000002", "SYNC_LEVEL", "LIVE").unwrap();
        assert_eq!(table.row("HL000002").unwrap().get("SYNC_LEVEL"), Some("LIVE"));
        assert!(table.set_field("HL000009", "NAAM", "y").is_err());
    }

    #[test]
    fn test_ids_by_parent_and_area() {
        let table = SpocTable::from_records(
            &SL,
            strings(&["CODE", "NAAM", "TYPE", "GEBIED", "PARENTLOCATIONID", "SYNC_LEVEL"]),
            vec![
                strings(&["SL000001", "a", "pomp", "Noord", "HL000001", ""]),
                strings(&["SL000002", "b", "stuw", "Zuid", "HL000002", ""]),
                strings(&["SL000003", "c", "stuw", "Noord", "HL000001", ""]),
            ],
        );
        assert_eq!(table.ids_by_parent(&["HL000001"]), vec!["SL000001", "SL000003"]);
        assert_eq!(table.ids_by_area(&["Zuid"]), vec!["SL000002"]);
        assert!(table.ids_by_parent(&["HL000404"]).is_empty());
    }

    #[test]
    fn test_file_registry_param_value_needs_both_halves() {
        let table = SpocTable::from_records(
            &SL_TI_H2GO_TAGS,
            strings(&["SL_CODE", "H2GO_LOCID", "SD_0", "BS_0"]),
            vec![
                strings(&["SL000001", "1001", "SD1", ""]),
                strings(&["SL000002", "", "SD1", ""]),
            ],
        );
        let sd = SL_TI_H2GO_TAGS.parameter("SD").unwrap();
        let bs = SL_TI_H2GO_TAGS.parameter("BS").unwrap();
        assert_eq!(table.param_value("SL000001", sd), Some("1001_SD1".to_string()));
        assert_eq!(table.param_value("SL000001", bs), None);
        assert_eq!(table.param_value("SL000002", sd), None);
        assert_eq!(table.param_value("SL000404", sd), None);
        assert_eq!(
            table.join_fields("SL000001", &["H2GO_LOCID", "BS_0", "SD_0"]),
            Some("1001_SD1".to_string())
        );
    }

    #[test]
    fn test_append_row() {
        let mut table = hl(&["HL000001"]);
        table
            .append_row(&[("CODE", "HL000002"), ("NAAM", "Nieuw")])
            .unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.field("HL000002", "NAAM"), Some("Nieuw"));
        assert_eq!(table.field("HL000002", "DS_GBD"), Some(""));

        assert!(table.append_row(&[("CODE", "HL000001")]).is_err());
        assert!(table.append_row(&[("NAAM", "zonder code")]).is_err());
        assert!(table.append_row(&[("CODE", "HL000003"), ("BESTAAT_NIET", "x")]).is_err());
    }
}
