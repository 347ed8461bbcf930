//! 🔧 App Configuration: the sacred TOML-to-struct pipeline.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the fridge.
//! In the junk drawer. Nothing." said every developer at 3am 🦆
//!
//! 🏗️ Powered by Figment. Three layers, last one wins:
//!
//! 1. environment variables prefixed `ADMX_` (nested keys split on `__`,
//!    so `ADMX_JOB__TENANT_CODE=UNIVERSITY` lands in `job.tenant_code`)
//! 2. an optional TOML file
//! 3. whatever the CLI was handed, as [`JobOverrides`]

use std::path::Path;

use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::backends::{
    FileErrorStreamConfig, FileParameterConfig, FileSourceConfig, FileStoreConfig,
    FileTransferConfig, InMemoryParameterConfig, InMemorySourceConfig,
};
use crate::transforms::{FailureMode, OutputSchema, TransformerSettings};

/// 📦 The AppConfig: one struct to rule them all, one struct to find them,
/// one struct to bring them all, and in the Figment bind them.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub job: JobConfig,
    pub source_config: SourceConfig,
    pub store_config: StoreConfig,
    pub parameter_config: ParameterConfig,
    pub transfer_config: TransferConfig,
    #[serde(default)]
    pub error_stream_config: ErrorStreamConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// 🪪 Who is running, for whom, against which accounts, over which window.
///
/// Every identity field is optional at parse time so the validator can say
/// exactly which one is missing instead of serde's generic shrug.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct JobConfig {
    pub job_name: Option<String>,
    pub job_run_id: Option<String>,
    pub tenant_code: Option<String>,
    pub env_name: Option<String>,
    pub ds_account_number: Option<String>,
    pub is_account_number: Option<String>,
    pub override_start_date_iso8601: Option<String>,
    pub override_end_date_iso8601: Option<String>,
    pub lookback_hours: u32,
    pub database_path: String,
    pub applicant_table: String,
    pub application_table: String,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            job_name: None,
            job_run_id: None,
            tenant_code: None,
            env_name: None,
            ds_account_number: None,
            is_account_number: None,
            override_start_date_iso8601: None,
            override_end_date_iso8601: None,
            lookback_hours: 24,
            database_path: "admissions".to_string(),
            applicant_table: "applicant".to_string(),
            application_table: "application".to_string(),
        }
    }
}

/// 🚩 The CLI's say in the matter. `None` means "no opinion, keep what the file said".
#[derive(Debug, Default, Serialize, Clone, PartialEq)]
pub struct JobOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_run_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ds_account_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_account_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_start_date_iso8601: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_end_date_iso8601: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub enum SourceConfig {
    File(FileSourceConfig),
    InMemory(InMemorySourceConfig),
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub enum StoreConfig {
    File(FileStoreConfig),
    InMemory,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub enum ParameterConfig {
    File(FileParameterConfig),
    InMemory(InMemoryParameterConfig),
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub enum TransferConfig {
    File(FileTransferConfig),
    InMemory,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq)]
pub enum ErrorStreamConfig {
    File(FileErrorStreamConfig),
    /// Records stay in memory. The errors still hit the log either way.
    #[default]
    InMemory,
}

/// 📮 Where the partner wants the file dropped on their side.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct DeliveryConfig {
    pub sftp_remote_path: String,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            sftp_remote_path: "/".to_string(),
        }
    }
}

/// 🎛️ Knobs for the transform itself.
#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct RuntimeConfig {
    pub failure_mode: FailureMode,
    /// Replaces the default passthrough list when set.
    pub passthrough_columns: Option<Vec<String>>,
}

impl RuntimeConfig {
    pub fn transformer_settings(&self) -> TransformerSettings {
        TransformerSettings {
            failure_mode: self.failure_mode,
            passthrough_columns: self
                .passthrough_columns
                .clone()
                .unwrap_or_else(OutputSchema::default_passthrough_columns),
        }
    }
}

/// 🚀 Load the config: env vars, then the file if there is one, then the CLI.
///
/// 📐 No file → env vars and CLI only. We don't go looking for a default
/// `config.toml` uninvited.
///
/// 💀 Returns an error if the merged result won't deserialize. The message
/// says which layers were involved, because "error: error" helps nobody.
pub fn load_config(config_file_name: Option<&Path>, overrides: &JobOverrides) -> Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    let config = Figment::new().merge(Env::prefixed("ADMX_").split("__"));
    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };
    let config = config.merge(Serialized::default("job", overrides));

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}', environment variables (ADMX_*) \
             and command line flags. The file exists in our hearts, but maybe not on disk.",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables (ADMX_*) and \
                 command line flags. No file was provided, this one's all on the environment."
            .to_string(),
    };

    config.extract().context(context_msg)
}
