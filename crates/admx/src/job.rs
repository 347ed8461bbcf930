//! 🎬 *[camera pans across a sleeping data lake]*
//! 🎬 "Every night, at the same time, one job wakes up..."
//! 🎬 "...reads two tables, writes one CSV, and goes back to sleep."
//! 🎬 *[record scratch]* 🦆
//!
//! 🚀 The job driver. One run, start to finish:
//!
//! 1. build a [`TransformationContext`] (validation happens here, before any I/O)
//! 2. resolve the transformer for `(flow, tenant)`
//! 3. load the applicant and application tables
//! 4. transform, with the incremental window as the row filter
//! 5. log the metrics line, then file and stream any failures
//! 6. publish the output
//!
//! Row failures don't fail the run. Missing parameters and unreadable tables do.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::info;

use crate::app_config::AppConfig;
use crate::backends::RecordSource;
use crate::context::TransformationContext;
use crate::publish::{publish, stream_errors, upload_error_report};
use crate::response::{PublishResponse, TransformationResponse};
use crate::transforms::{DataTransformer, FlowType, TransformInput, TransformerRegistry};

/// 🏁 How a run went, for whoever called it.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub response: TransformationResponse,
    /// Curated write, staging write, transfer. Empty when there was nothing to publish.
    pub publish_results: Vec<PublishResponse>,
    /// The failure artifact upload, if there were failures to file.
    pub error_report: Option<PublishResponse>,
    pub streamed_errors: usize,
}

/// 🚀 Runs the job once against the clock on the wall.
pub async fn run(app_config: AppConfig) -> Result<JobOutcome> {
    let now = Utc::now();
    let mut context = TransformationContext::from_config(&app_config, now)
        .await
        .context("💀 Could not set up the transformation context")?;
    run_with_context(&mut context, now).await
}

/// 🧪 Runs the job with an already built context and a fixed `now`.
pub async fn run_with_context(
    context: &mut TransformationContext,
    now: DateTime<Utc>,
) -> Result<JobOutcome> {
    let transformer = TransformerRegistry::default().resolve(
        FlowType::InstitutionApplication,
        &context.job.tenant_code,
        &context.runtime.transformer_settings(),
    )?;

    let input = TransformInput {
        applicants: context
            .source
            .load_table(&context.job.database_path, &context.job.applicant_table)
            .await
            .context("💀 Could not load the applicant table")?,
        applications: context
            .source
            .load_table(&context.job.database_path, &context.job.application_table)
            .await
            .context("💀 Could not load the application table")?,
    };
    info!(
        "📥 loaded {} applicants and {} applications",
        input.applicants.len(),
        input.applications.len()
    );

    let response = transformer
        .transform(&input, &context.window)
        .context("💀 The transform gave up on the whole batch")?;
    info!("📊 Transformation Summary:\n{response}");
    info!("{}", metrics_line(context, &response));

    let mut error_report = None;
    let mut streamed_errors = 0;
    if response.failed_count() > 0 {
        error_report = upload_error_report(context, &response, now).await?;
        streamed_errors = stream_errors(context, response.errors(), now).await;
    }

    let publish_results = publish(context, &response, transformer.output_stem(), now).await?;
    for result in &publish_results {
        info!("📮 {result}");
    }

    Ok(JobOutcome {
        response,
        publish_results,
        error_report,
        streamed_errors,
    })
}

/// 📈 One JSON line a log-based metric filter can pick up.
pub fn metrics_line(context: &TransformationContext, response: &TransformationResponse) -> String {
    json!({
        "successMetricName": format!("{}_CMS_Transformation_Success_Count", context.job.env_name),
        "failedMetricName": format!("{}_CMS_Transformation_Failed_Count", context.job.env_name),
        "successCount": response.success_count(),
        "failedCount": response.failed_count(),
        "jobName": context.job.job_name,
        "tenantCode": context.job.tenant_code,
    })
    .to_string()
}
