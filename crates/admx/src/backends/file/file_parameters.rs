use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backends::ParameterStore;

// -- 🗝️ FileParameterConfig: a JSON object of `"/parameter/name": "value"` pairs.
// -- JSON and not TOML because parameter names are full of slashes and dots,
// -- and TOML would like a word about that.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FileParameterConfig {
    pub file_name: PathBuf,
}

/// 🗝️ FileParameterStore: loads the whole file once, answers from memory after that.
#[derive(Debug)]
pub struct FileParameterStore {
    parameter_config: FileParameterConfig,
    values: BTreeMap<String, String>,
}

impl FileParameterStore {
    pub async fn new(parameter_config: FileParameterConfig) -> Result<Self> {
        let raw = tokio::fs::read_to_string(&parameter_config.file_name)
            .await
            .context(format!(
                "💀 The parameter file '{}' is nowhere to be found. We looked under the couch.",
                parameter_config.file_name.display()
            ))?;
        let values: BTreeMap<String, String> = serde_json::from_str(&raw).context(format!(
            "💀 The parameter file '{}' must be one JSON object of string values.",
            parameter_config.file_name.display()
        ))?;
        debug!(
            "🗝️ loaded {} parameters from '{}'",
            values.len(),
            parameter_config.file_name.display()
        );
        Ok(Self {
            parameter_config,
            values,
        })
    }
}

#[async_trait]
impl ParameterStore for FileParameterStore {
    async fn get_parameter(&self, name: &str) -> Result<String> {
        self.values.get(name).cloned().with_context(|| {
            format!(
                "💀 Parameter '{name}' is not in '{}'. The key ring is missing a key.",
                self.parameter_config.file_name.display()
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn the_one_where_slashes_are_welcome_in_names() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let file_name = dir.path().join("parameters.json");
        std::fs::write(
            &file_name,
            r#"{"/services/dev/university-sftp-connector-id": "c-1234"}"#,
        )?;

        let store = FileParameterStore::new(FileParameterConfig { file_name }).await?;
        assert_eq!(
            store
                .get_parameter("/services/dev/university-sftp-connector-id")
                .await?,
            "c-1234"
        );
        assert!(store.get_parameter("/services/dev/nope").await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_the_parameter_file_went_on_vacation() {
        let outcome = FileParameterStore::new(FileParameterConfig {
            file_name: PathBuf::from("/definitely/not/here/parameters.json"),
        })
        .await;
        assert!(outcome.is_err());
    }
}
