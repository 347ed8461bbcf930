//! 📮 Delivery: getting the CSV out the door and the complaints filed.
//!
//! 🎬 INT. LOADING DOCK, 6:02 AM
//!
//! The file is built. Now it goes to two places: the curated store (ours, for
//! the record) and the staging store (theirs, for the connector). If staging
//! took it, we ring the SFTP connector. Every write is its own attempt: a
//! curated failure doesn't stop the staging write, and neither one ever
//! raises. They come back as [`PublishResponse`]s and land in the log.
//!
//! Failures go somewhere too: a JSON artifact in the data-artifact store and
//! one line per failure on the error stream. The stream is best effort.
//! If it's down, we say so in the log and move on. 🦆

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::backends::{
    ErrorStream, ObjectStore, ObjectStoreBackend, ParameterStore, TransferRequest,
    TransferTrigger,
};
use crate::common::{OutputTable, render_cell};
use crate::context::{JobParameters, TransformationContext};
use crate::response::{PublishResponse, TransformError, TransformationResponse};

const S3_ARN_PREFIX: &str = "arn:aws:s3:::";
const ERROR_PARTITION_KEY: &str = "error";

/// 🗺️ Where the output file goes, all derived from the job identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryTargets {
    pub curated_bucket: String,
    pub curated_prefix: String,
    pub staging_bucket: String,
}

impl DeliveryTargets {
    pub fn for_job(job: &JobParameters) -> Self {
        let tenant = job.tenant_slug();
        Self {
            curated_bucket: format!(
                "{}-{tenant}-cms-curated-data-{}",
                job.env_name, job.ds_account_number
            ),
            curated_prefix: format!("{tenant}-cms"),
            staging_bucket: format!(
                "{}-admissions-gateway-{tenant}-sftp-egress-{}",
                job.env_name, job.is_account_number
            ),
        }
    }
}

/// 🗝️ Parameter names this module resolves.
pub mod parameter_names {
    use crate::context::JobParameters;

    pub fn sftp_connector_id(job: &JobParameters) -> String {
        format!(
            "/services/{}/{}-sftp-connector-id",
            job.env_name,
            job.tenant_slug()
        )
    }

    pub fn sftp_invocation_role(job: &JobParameters) -> String {
        format!(
            "/services/{}/{}-sftp-connector-invocation-role-arn",
            job.env_name,
            job.tenant_slug()
        )
    }

    pub fn data_artifact_bucket(job: &JobParameters) -> String {
        format!(
            "/cdk/{}/dps-data-services-baseline/data-artifact-bucket-arn",
            job.env_name
        )
    }

    pub fn error_stream(job: &JobParameters) -> String {
        format!(
            "/cdk/{}/dps-data-service-baseline/internal-kinesis-stream-arn",
            job.env_name
        )
    }
}

/// 📄 Header row plus one line per record, comma separated, `\n` terminated.
pub fn render_csv(table: &OutputTable) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer
        .write_record(table.columns())
        .context("💀 could not write the CSV header")?;
    for row in table.rows() {
        writer
            .write_record(row.iter().map(render_cell))
            .context("💀 could not write a CSV record")?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("💀 could not flush the CSV buffer: {}", e.error()))?;
    String::from_utf8(bytes).context("💀 the CSV came out as something other than UTF-8")
}

/// `<stem>-<UTC %Y%m%d%H%M%S.%6f>.csv`
pub fn output_file_name(stem: &str, now: DateTime<Utc>) -> String {
    format!("{stem}-{}.csv", now.format("%Y%m%d%H%M%S%.6f"))
}

/// `<job>-<run id>-admissions-cms-<%Y%m%d%H%M%S>.log`
pub fn error_log_file_name(job: &JobParameters, now: DateTime<Utc>) -> String {
    format!(
        "{}-{}-admissions-cms-{}.log",
        job.job_name,
        job.job_run_id,
        now.format("%Y%m%d%H%M%S")
    )
}

fn object_key(prefix: &str, file_name: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        file_name.to_string()
    } else {
        format!("{prefix}/{file_name}")
    }
}

/// 🪣 One write, one verdict. Never raises.
async fn upload(
    store: &mut ObjectStoreBackend,
    body: &str,
    file_name: &str,
    bucket: &str,
    prefix: &str,
) -> PublishResponse {
    let key = object_key(prefix, file_name);
    match store.put_object(bucket, &key, body).await {
        Ok(()) => {
            let response =
                PublishResponse::succeeded(format!("Uploaded {file_name} to {bucket}/{key}"));
            info!("✅ {}", response.message);
            response
        }
        Err(e) => {
            let response = PublishResponse::failed(format!(
                "Failed to upload {file_name} to {bucket}/{key}: {e:#}"
            ));
            error!("💀 {}", response.message);
            response
        }
    }
}

/// 🚚 Resolves the connector, assumes its role, triggers the transfer.
///
/// Parameter lookups are the one thing here that can `Err`: without a
/// connector id the job is misconfigured, and that's not a delivery hiccup.
/// A refused transfer comes back as a failed [`PublishResponse`].
pub async fn send_to_sftp_server(
    context: &mut TransformationContext,
    file_name: &str,
    staging_bucket: &str,
) -> Result<PublishResponse> {
    let connector_id = context
        .parameters
        .get_parameter(&parameter_names::sftp_connector_id(&context.job))
        .await
        .context("💀 could not resolve the SFTP connector id")?;
    let role_arn = context
        .parameters
        .get_parameter(&parameter_names::sftp_invocation_role(&context.job))
        .await
        .context("💀 could not resolve the SFTP connector invocation role")?;
    debug!("🔌 connector id {connector_id}, invocation role {role_arn}");

    let request = TransferRequest {
        connector_id,
        role_arn,
        role_session_name: format!("{}-sftp-transfer-session", context.job.tenant_code),
        send_file_paths: vec![format!("/{staging_bucket}/{file_name}")],
        remote_directory_path: context.delivery.sftp_remote_path.clone(),
    };

    Ok(match context.transfer.start_file_transfer(&request).await {
        Ok(receipt) => {
            info!("🚚 SFTP Transfer ID: {}", receipt.transfer_id);
            info!("🔌 SFTP Connector ID: {}", request.connector_id);
            info!("🪣 SFTP Bucket: {staging_bucket}");
            info!("📄 SFTP File: {file_name}");
            info!("📂 SFTP Remote Path: {}", request.remote_directory_path);
            PublishResponse::succeeded(format!(
                "Started SFTP transfer {} for {file_name}",
                receipt.transfer_id
            ))
        }
        Err(e) => {
            let response = PublishResponse::failed(format!(
                "Failed to start SFTP transfer for {file_name}: {e:#}"
            ));
            error!("💀 {}", response.message);
            response
        }
    })
}

/// 📮 Publishes the output table: curated write, staging write, then the
/// transfer if staging took the file. Empty output publishes nothing.
pub async fn publish(
    context: &mut TransformationContext,
    response: &TransformationResponse,
    stem: &str,
    now: DateTime<Utc>,
) -> Result<Vec<PublishResponse>> {
    let table = response.transformed();
    if table.is_empty() {
        info!("📭 No data to publish");
        return Ok(Vec::new());
    }

    let body = render_csv(table)?;
    let file_name = output_file_name(stem, now);
    let targets = DeliveryTargets::for_job(&context.job);
    let mut results = Vec::with_capacity(3);

    info!("📤 Publishing file to curated bucket: {file_name}");
    results.push(
        upload(
            &mut context.store,
            &body,
            &file_name,
            &targets.curated_bucket,
            &targets.curated_prefix,
        )
        .await,
    );

    info!("📤 Publishing file to staging bucket: {file_name}");
    let staged = upload(
        &mut context.store,
        &body,
        &file_name,
        &targets.staging_bucket,
        "",
    )
    .await;
    let staged_ok = staged.publish_status;
    results.push(staged);

    if staged_ok {
        results.push(send_to_sftp_server(context, &file_name, &targets.staging_bucket).await?);
    }
    Ok(results)
}

/// 📜 Uploads the failure list to the data-artifact store.
///
/// Returns `Ok(None)` when there's nothing to report. Resolving the artifact
/// store is required, the upload itself is best effort.
pub async fn upload_error_report(
    context: &mut TransformationContext,
    response: &TransformationResponse,
    now: DateTime<Utc>,
) -> Result<Option<PublishResponse>> {
    if response.failed_count() == 0 {
        return Ok(None);
    }
    let error_json = response.errors_to_json()?;
    error!(
        "💀 Job Run Id: {} Error Data: {error_json}",
        context.job.job_run_id
    );

    let bucket_arn = context
        .parameters
        .get_parameter(&parameter_names::data_artifact_bucket(&context.job))
        .await
        .context("💀 could not resolve the data artifact bucket")?;
    let bucket = bucket_arn
        .strip_prefix(S3_ARN_PREFIX)
        .unwrap_or(&bucket_arn)
        .to_string();
    let prefix = format!(
        "output/transformation-errors/{}_admissions_cms/",
        context.job.tenant_slug()
    );
    let file_name = error_log_file_name(&context.job, now);

    Ok(Some(
        upload(&mut context.store, &error_json, &file_name, &bucket, &prefix).await,
    ))
}

#[derive(Debug, Serialize)]
struct ErrorStreamLine<'a> {
    data_type: &'static str,
    tenant_code: &'a str,
    detail_type: &'a TransformError,
    job_name: &'a str,
    job_run_id: &'a str,
    time: String,
}

/// 📣 Puts every failure on the error stream, one JSON line each.
///
/// Best effort all the way down: a missing stream parameter or a rejected
/// record is logged and the rest of the run carries on. Returns how many
/// records made it.
pub async fn stream_errors(
    context: &mut TransformationContext,
    errors: &[TransformError],
    now: DateTime<Utc>,
) -> usize {
    if errors.is_empty() {
        info!("✅ No transformation errors found");
        return 0;
    }
    error!(
        "💀 {} error records found. Publishing transformation errors",
        errors.len()
    );

    let stream_arn = match context
        .parameters
        .get_parameter(&parameter_names::error_stream(&context.job))
        .await
    {
        Ok(arn) => arn,
        Err(e) => {
            error!(
                "💀 Tenant : {} | {} | could not resolve the error stream: {e:#}",
                context.job.tenant_code, context.job.job_name
            );
            return 0;
        }
    };
    info!(
        "📣 Publish error records to stream: {} : {} | stream arn : {stream_arn}",
        context.job.tenant_code, context.job.job_name
    );

    let time = now.format("%Y-%m-%dT%H:%M:%SZ").to_string();
    let mut streamed = 0;
    for failure in errors {
        let line = ErrorStreamLine {
            data_type: "error",
            tenant_code: &context.job.tenant_code,
            detail_type: failure,
            job_name: &context.job.job_name,
            job_run_id: &context.job.job_run_id,
            time: time.clone(),
        };
        let mut data = match serde_json::to_vec(&line) {
            Ok(data) => data,
            Err(e) => {
                error!("💀 could not serialize an error record: {e}");
                continue;
            }
        };
        data.push(b'\n');

        match context
            .error_stream
            .put_record(&stream_arn, ERROR_PARTITION_KEY, &data)
            .await
        {
            Ok(()) => streamed += 1,
            Err(e) => error!(
                "💀 Tenant : {} | {} | Error putting error records into stream: {e:#}",
                context.job.tenant_code, context.job.job_name
            ),
        }
    }
    streamed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_config::{DeliveryConfig, RuntimeConfig};
    use crate::backends::{
        ErrorStreamBackend, InMemoryErrorStream, InMemoryObjectStore, InMemoryParameterStore,
        InMemoryRecordSource, InMemoryTransferTrigger, ParameterStoreBackend,
        RecordSourceBackend, TransferBackend,
    };
    use crate::window::IncrementalWindow;
    use anyhow::anyhow;
    use chrono::TimeZone;
    use serde_json::json;

    fn job() -> JobParameters {
        JobParameters {
            job_name: "egress".into(),
            job_run_id: "jr_42".into(),
            tenant_code: "UNIVERSITY".into(),
            env_name: "dev".into(),
            ds_account_number: "111".into(),
            is_account_number: "222".into(),
            database_path: "admissions".into(),
            applicant_table: "applicant".into(),
            application_table: "application".into(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 45)
            .single()
            .expect("💀 a perfectly ordinary instant")
    }

    struct Handles {
        store: InMemoryObjectStore,
        transfer: InMemoryTransferTrigger,
        stream: InMemoryErrorStream,
    }

    fn context(
        store: InMemoryObjectStore,
        transfer: InMemoryTransferTrigger,
        stream: InMemoryErrorStream,
        parameters: InMemoryParameterStore,
    ) -> (TransformationContext, Handles) {
        let handles = Handles {
            store: store.clone(),
            transfer: transfer.clone(),
            stream: stream.clone(),
        };
        let context = TransformationContext {
            job: job(),
            window: IncrementalWindow::new(now(), now()).expect("💀 a zero-width window is still a window"),
            delivery: DeliveryConfig {
                sftp_remote_path: "/inbound".into(),
            },
            runtime: RuntimeConfig::default(),
            source: RecordSourceBackend::InMemory(InMemoryRecordSource::new()),
            store: ObjectStoreBackend::InMemory(store),
            parameters: ParameterStoreBackend::InMemory(parameters),
            transfer: TransferBackend::InMemory(transfer),
            error_stream: ErrorStreamBackend::InMemory(stream),
        };
        (context, handles)
    }

    fn all_parameters() -> InMemoryParameterStore {
        InMemoryParameterStore::default()
            .with("/services/dev/university-sftp-connector-id", "c-77")
            .with(
                "/services/dev/university-sftp-connector-invocation-role-arn",
                "arn:aws:iam::222:role/sftp",
            )
            .with(
                "/cdk/dev/dps-data-services-baseline/data-artifact-bucket-arn",
                "arn:aws:s3:::dev-artifacts",
            )
            .with(
                "/cdk/dev/dps-data-service-baseline/internal-kinesis-stream-arn",
                "arn:aws:kinesis:us-east-1:111:stream/internal",
            )
    }

    fn one_row_response() -> Result<TransformationResponse> {
        let mut table = OutputTable::new(vec!["applicationId".into(), "Permanent address".into()]);
        table.push_row(vec![json!("a-1"), json!("12 Elm St, Apt 4")])?;
        Ok(TransformationResponse::new(table, Vec::new(), 1))
    }

    #[test]
    fn the_one_where_names_are_derived_from_the_tenant() {
        let targets = DeliveryTargets::for_job(&job());
        assert_eq!(targets.curated_bucket, "dev-university-cms-curated-data-111");
        assert_eq!(targets.curated_prefix, "university-cms");
        assert_eq!(
            targets.staging_bucket,
            "dev-admissions-gateway-university-sftp-egress-222"
        );
        assert_eq!(
            output_file_name("application", now()),
            "application-20240301123045.000000.csv"
        );
        assert_eq!(
            error_log_file_name(&job(), now()),
            "egress-jr_42-admissions-cms-20240301123045.log"
        );
    }

    #[test]
    fn the_one_where_commas_get_quoted_and_nulls_go_blank() -> Result<()> {
        let mut table = OutputTable::new(vec!["a".into(), "b".into(), "c".into()]);
        table.push_row(vec![json!("x, y"), serde_json::Value::Null, json!(3)])?;
        assert_eq!(render_csv(&table)?, "a,b,c\n\"x, y\",,3\n");
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_the_file_goes_everywhere_it_should() -> Result<()> {
        let (mut ctx, handles) = context(
            InMemoryObjectStore::new(),
            InMemoryTransferTrigger::new(),
            InMemoryErrorStream::new(),
            all_parameters(),
        );
        let results = publish(&mut ctx, &one_row_response()?, "application", now()).await?;

        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.publish_status));
        let file = "application-20240301123045.000000.csv";
        let curated = handles
            .store
            .object("dev-university-cms-curated-data-111", &format!("university-cms/{file}"))
            .await;
        let staged = handles
            .store
            .object("dev-admissions-gateway-university-sftp-egress-222", file)
            .await;
        assert!(curated.is_some());
        assert_eq!(curated, staged);

        let requests = handles.transfer.requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].connector_id, "c-77");
        assert_eq!(
            requests[0].send_file_paths,
            vec![format!("/dev-admissions-gateway-university-sftp-egress-222/{file}")]
        );
        assert_eq!(requests[0].remote_directory_path, "/inbound");
        assert_eq!(
            requests[0].role_session_name,
            "UNIVERSITY-sftp-transfer-session"
        );
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_curated_fails_and_staging_carries_on() -> Result<()> {
        let (mut ctx, handles) = context(
            InMemoryObjectStore::new().failing_on("dev-university-cms-curated-data-111"),
            InMemoryTransferTrigger::new(),
            InMemoryErrorStream::new(),
            all_parameters(),
        );
        let results = publish(&mut ctx, &one_row_response()?, "application", now()).await?;

        assert_eq!(
            results.iter().map(|r| r.publish_status).collect::<Vec<_>>(),
            vec![false, true, true]
        );
        assert_eq!(handles.transfer.requests().await.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_no_staging_means_no_transfer() -> Result<()> {
        let (mut ctx, handles) = context(
            InMemoryObjectStore::new()
                .failing_on("dev-admissions-gateway-university-sftp-egress-222"),
            InMemoryTransferTrigger::new(),
            InMemoryErrorStream::new(),
            all_parameters(),
        );
        let results = publish(&mut ctx, &one_row_response()?, "application", now()).await?;

        assert_eq!(
            results.iter().map(|r| r.publish_status).collect::<Vec<_>>(),
            vec![true, false]
        );
        assert!(handles.transfer.requests().await.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_the_connector_says_no() -> Result<()> {
        let (mut ctx, _handles) = context(
            InMemoryObjectStore::new(),
            InMemoryTransferTrigger::new().refusing(),
            InMemoryErrorStream::new(),
            all_parameters(),
        );
        let results = publish(&mut ctx, &one_row_response()?, "application", now()).await?;
        assert_eq!(
            results.iter().map(|r| r.publish_status).collect::<Vec<_>>(),
            vec![true, true, false]
        );
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_the_connector_id_is_a_mystery() -> Result<()> {
        let (mut ctx, _handles) = context(
            InMemoryObjectStore::new(),
            InMemoryTransferTrigger::new(),
            InMemoryErrorStream::new(),
            InMemoryParameterStore::default(),
        );
        assert!(
            publish(&mut ctx, &one_row_response()?, "application", now())
                .await
                .is_err()
        );
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_empty_output_stays_home() -> Result<()> {
        let (mut ctx, handles) = context(
            InMemoryObjectStore::new(),
            InMemoryTransferTrigger::new(),
            InMemoryErrorStream::new(),
            all_parameters(),
        );
        let empty = TransformationResponse::empty(OutputTable::new(vec!["a".into()]));
        assert!(publish(&mut ctx, &empty, "application", now()).await?.is_empty());
        assert!(handles.store.keys().await.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_failures_get_filed_and_streamed() -> Result<()> {
        let (mut ctx, handles) = context(
            InMemoryObjectStore::new(),
            InMemoryTransferTrigger::new(),
            InMemoryErrorStream::new(),
            all_parameters(),
        );
        let failure = TransformError::new("applicationId=a-9 applicantId=p-9", &anyhow!("bad time"), "");
        let response = TransformationResponse::new(
            OutputTable::new(vec!["a".into()]),
            vec![failure.clone()],
            1,
        );

        let report = upload_error_report(&mut ctx, &response, now()).await?;
        assert!(report.is_some_and(|r| r.publish_status));
        let artifact = handles
            .store
            .object(
                "dev-artifacts",
                "output/transformation-errors/university_admissions_cms/egress-jr_42-admissions-cms-20240301123045.log",
            )
            .await;
        assert_eq!(artifact, Some(response.errors_to_json()?));

        assert_eq!(stream_errors(&mut ctx, response.errors(), now()).await, 1);
        let records = handles.stream.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].partition_key, "error");
        assert!(records[0].data.ends_with(b"\n"));
        let line: serde_json::Value = serde_json::from_slice(&records[0].data)?;
        assert_eq!(
            line,
            json!({
                "data_type": "error",
                "tenant_code": "UNIVERSITY",
                "detail_type": {
                    "failed_object": "applicationId=a-9 applicantId=p-9",
                    "error_message": "bad time"
                },
                "job_name": "egress",
                "job_run_id": "jr_42",
                "time": "2024-03-01T12:30:45Z"
            })
        );
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_the_stream_is_down_and_nobody_panics() -> Result<()> {
        let (mut ctx, _handles) = context(
            InMemoryObjectStore::new(),
            InMemoryTransferTrigger::new(),
            InMemoryErrorStream::new().refusing(),
            all_parameters(),
        );
        let failure = TransformError::new("x", &anyhow!("y"), "");
        assert_eq!(stream_errors(&mut ctx, &[failure], now()).await, 0);

        let (mut ctx, _handles) = context(
            InMemoryObjectStore::new(),
            InMemoryTransferTrigger::new(),
            InMemoryErrorStream::new(),
            InMemoryParameterStore::default(),
        );
        let failure = TransformError::new("x", &anyhow!("y"), "");
        assert_eq!(stream_errors(&mut ctx, &[failure], now()).await, 0);
        Ok(())
    }
}
