use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::{
    fs::File,
    io::{self, AsyncBufReadExt},
};
use tracing::{info, trace};

use crate::backends::RecordSource;
use crate::backends::file::confined_path;
use crate::common::SourceRow;

// -- 📂 FileSourceConfig: "It's just a directory of NDJSON", said no data engineer ever twice.
// -- Lives right here next to the source that reads it. One backend, one config, one file.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FileSourceConfig {
    pub root_dir: PathBuf,
    #[serde(default = "default_table_extension")]
    pub extension: String,
}

fn default_table_extension() -> String {
    // -- ✅ one JSON object per line. the only format that streams and still greps.
    "ndjson".to_string()
}

/// 📂 FileRecordSource: reads `<root>/<database_path>/<table>.<ext>` line by line.
///
/// Blank lines are skipped. Every other line must be a JSON object or the
/// whole table load fails, with the line number in the error so you can go
/// find the culprit with `sed -n`.
#[derive(Debug)]
pub struct FileRecordSource {
    source_config: FileSourceConfig,
}

impl FileRecordSource {
    pub async fn new(source_config: FileSourceConfig) -> Result<Self> {
        Ok(Self { source_config })
    }

    fn table_path(&self, database_path: &str, table_name: &str) -> Result<PathBuf> {
        confined_path(
            &self.source_config.root_dir,
            &format!(
                "{database_path}/{table_name}.{}",
                self.source_config.extension
            ),
        )
    }
}

#[async_trait]
impl RecordSource for FileRecordSource {
    async fn load_table(&mut self, database_path: &str, table_name: &str) -> Result<Vec<SourceRow>> {
        let table_path = self.table_path(database_path, table_name)?;

        // -- 🏜️ no file, no rows. an empty partition is a quiet day, not an incident.
        if !tokio::fs::try_exists(&table_path).await.unwrap_or(false) {
            info!(
                "📭 table file '{}' does not exist, treating {database_path}.{table_name} as empty",
                table_path.display()
            );
            return Ok(Vec::new());
        }

        let file_handle = File::open(&table_path).await.context(format!(
            "💀 The door to '{}' would not budge. We knocked. We checked permissions. \
             The table remains unread.",
            table_path.display()
        ))?;
        let mut lines = io::BufReader::new(file_handle).lines();

        let mut rows = Vec::new();
        let mut line_number = 0usize;
        while let Some(line) = lines.next_line().await.context(format!(
            "💀 Reading '{}' stopped halfway through a sentence.",
            table_path.display()
        ))? {
            line_number += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let value: serde_json::Value = serde_json::from_str(trimmed).with_context(|| {
                format!(
                    "💀 Line {line_number} of '{}' is not JSON. It's something. Just not JSON.",
                    table_path.display()
                )
            })?;
            rows.push(SourceRow::from_value(value).with_context(|| {
                format!("💀 Line {line_number} of '{}'", table_path.display())
            })?);
        }

        trace!(
            "📖 hauled {} rows out of '{}' like a digital fishing trip",
            rows.len(),
            table_path.display()
        );
        Ok(rows)
    }
}
