//! 🧳 TransformationContext: everything one run owns, packed into one bag.
//!
//! Built fresh for every run and dropped when the run ends. No globals, no
//! lazily created clients hiding in module statics. If the job needs to talk
//! to something, the handle is in here.

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use tracing::info;

use crate::app_config::{AppConfig, DeliveryConfig, JobConfig, RuntimeConfig};
use crate::backends::{
    ErrorStreamBackend, ObjectStoreBackend, ParameterStoreBackend, RecordSourceBackend,
    TransferBackend,
};
use crate::window::IncrementalWindow;

/// 🪪 The validated job identity. Every field here is guaranteed non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobParameters {
    pub job_name: String,
    pub job_run_id: String,
    pub tenant_code: String,
    pub env_name: String,
    pub ds_account_number: String,
    pub is_account_number: String,
    pub database_path: String,
    pub applicant_table: String,
    pub application_table: String,
}

impl JobParameters {
    /// 🚦 Checks that every required parameter is present and non-blank.
    pub fn from_config(job: &JobConfig) -> Result<Self> {
        fn required(value: &Option<String>, name: &str, label: &str) -> Result<String> {
            match value.as_deref().map(str::trim) {
                Some(v) if !v.is_empty() => Ok(v.to_string()),
                _ => bail!("💀 Required parameter {label} [{name}] not configured on this job."),
            }
        }

        Ok(Self {
            job_name: required(&job.job_name, "job_name", "job name")?,
            job_run_id: required(&job.job_run_id, "job_run_id", "job run id")?,
            tenant_code: required(&job.tenant_code, "tenant_code", "tenant code")?,
            env_name: required(&job.env_name, "env_name", "environment name")?,
            ds_account_number: required(
                &job.ds_account_number,
                "ds_account_number",
                "data services account number",
            )?,
            is_account_number: required(
                &job.is_account_number,
                "is_account_number",
                "integration services account number",
            )?,
            database_path: job.database_path.clone(),
            applicant_table: job.applicant_table.clone(),
            application_table: job.application_table.clone(),
        })
    }

    /// Lowercased tenant, the way it appears in bucket and parameter names.
    pub fn tenant_slug(&self) -> String {
        self.tenant_code.to_lowercase()
    }
}

/// 🧳 One run's worth of collaborators and settings.
#[derive(Debug)]
pub struct TransformationContext {
    pub job: JobParameters,
    pub window: IncrementalWindow,
    pub delivery: DeliveryConfig,
    pub runtime: RuntimeConfig,
    pub source: RecordSourceBackend,
    pub store: ObjectStoreBackend,
    pub parameters: ParameterStoreBackend,
    pub transfer: TransferBackend,
    pub error_stream: ErrorStreamBackend,
}

impl TransformationContext {
    /// 🏗️ Validates the job parameters and the window, then builds every backend.
    ///
    /// Validation comes first: a missing tenant code fails the run before a
    /// single byte of the lake is read.
    pub async fn from_config(config: &AppConfig, now: DateTime<Utc>) -> Result<Self> {
        let job = JobParameters::from_config(&config.job)?;
        let window = IncrementalWindow::resolve(
            config.job.override_start_date_iso8601.as_deref(),
            config.job.override_end_date_iso8601.as_deref(),
            config.job.lookback_hours,
            now,
        )?;
        info!(
            "🪪 job '{}' run '{}' for tenant '{}' in '{}', window [{}, {})",
            job.job_name,
            job.job_run_id,
            job.tenant_code,
            job.env_name,
            window.start().to_rfc3339(),
            window.end().to_rfc3339()
        );

        Ok(Self {
            job,
            window,
            delivery: config.delivery.clone(),
            runtime: config.runtime.clone(),
            source: RecordSourceBackend::from_config(&config.source_config).await?,
            store: ObjectStoreBackend::from_config(&config.store_config).await?,
            parameters: ParameterStoreBackend::from_config(&config.parameter_config).await?,
            transfer: TransferBackend::from_config(&config.transfer_config, &config.store_config)
                .await?,
            error_stream: ErrorStreamBackend::from_config(&config.error_stream_config).await?,
        })
    }
}
