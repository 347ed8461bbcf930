//! 📦 Common data structures: the building blocks of admx
//!
//! 🎬 COLD OPEN, INT. ADMISSIONS OFFICE, SUBMISSION DEADLINE, 11:58 PM
//!
//! Four thousand applicants hit "Submit" in the same two minutes. Each one
//! leaves behind a row. Some rows have phones. Some rows have three phones and
//! a fax number from 1997. Somewhere a column holds a JSON array stuffed into a
//! string, like a letter folded into a paper airplane and thrown across the
//! lake house.
//!
//! This module defines the two shapes everything else passes around:
//! [`SourceRow`] going in, [`OutputTable`] coming out. 🦆

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 🎯 One row out of the data lake: a field name → JSON value map.
///
/// Applicant rows and application rows both look like this. Some columns hold
/// plain scalars (`applicationStatus`, `personalData_firstName`), others hold
/// JSON arrays encoded as strings (`phones`, `addresses`, ...). The row does
/// not know which is which. The transformer does.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceRow {
    fields: Map<String, Value>,
}

impl SourceRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// 🔄 Turns a JSON object into a row. Anything else is not a row, it's a cry for help.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            honestly_who_knows => bail!(
                "💀 Expected a JSON object for a source row, got {}. \
                 Rows are maps. This was not a map.",
                kind_of(&honestly_who_knows)
            ),
        }
    }

    /// 📡 Raw lookup. A present `null` comes back as `Some(Value::Null)`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// 📡 Lookup that treats `null` the same as "not there at all".
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).filter(|v| !v.is_null())
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<Map<String, Value>> for SourceRow {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

/// 📊 The flattened result: fixed column order, one `Vec<Value>` per record.
///
/// Cells stay JSON scalars until the very end so the boolean pass can still
/// tell a real `true` from the string `"true"` (it maps both anyway, but it
/// gets to know the difference first).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputTable {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl OutputTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// 🏗️ Appends one record. The record must have exactly one cell per column.
    ///
    /// A short row is an error, never a silent trim: rows do not get to vanish
    /// from the partner file without somebody hearing about it.
    pub fn push_row(&mut self, row: Vec<Value>) -> Result<()> {
        if row.len() != self.columns.len() {
            bail!(
                "💀 Row has {} cells but the table has {} columns. \
                 Somebody's column group went rogue.",
                row.len(),
                self.columns.len()
            );
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// 🔍 One cell by row number and column name. Tests love this. Tests are needy.
    pub fn cell(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    /// 📋 Every value of one column, top to bottom.
    pub fn column_values(&self, column: &str) -> Option<Vec<&Value>> {
        let idx = self.column_index(column)?;
        Some(self.rows.iter().filter_map(|r| r.get(idx)).collect())
    }

    /// 🔄 Rewrites every cell in place. Used for the table-wide passes.
    pub fn map_cells(&mut self, mut f: impl FnMut(&mut Value)) {
        for row in &mut self.rows {
            for cell in row.iter_mut() {
                f(cell);
            }
        }
    }
}

/// 🖨️ How a cell looks in the delimited file: `null` is an empty field,
/// strings go out bare, everything else uses its JSON spelling.
pub fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
