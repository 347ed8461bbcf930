//! 🚀 admx-cli: the front door of the nightly egress run.
//!
//! 🎬 *[narrator voice]* "It all started with a cron line..."
//! 📦 A thin wrapper: parse flags, set up logging, load config, run the job,
//! print a little table, exit with a meaningful code. Like a manager. 🦆

use std::path::PathBuf;

use admx::{JobOutcome, JobOverrides, load_config};
use anyhow::{Context, Result};
use clap::Parser;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::UTF8_FULL};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// 🎓 Transforms submitted admissions applications into the partner CMS CSV
/// and delivers it.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// TOML config file. Environment variables (`ADMX_*`) apply either way.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    job_name: Option<String>,
    #[arg(long)]
    job_run_id: Option<String>,
    #[arg(long)]
    tenant_code: Option<String>,
    #[arg(long)]
    env_name: Option<String>,
    #[arg(long)]
    ds_account_number: Option<String>,
    #[arg(long)]
    is_account_number: Option<String>,
    /// Inclusive window start. Only honoured together with the end.
    #[arg(long)]
    override_start_date_iso8601: Option<String>,
    /// Exclusive window end. Only honoured together with the start.
    #[arg(long)]
    override_end_date_iso8601: Option<String>,
}

impl Args {
    fn overrides(&self) -> JobOverrides {
        JobOverrides {
            job_name: self.job_name.clone(),
            job_run_id: self.job_run_id.clone(),
            tenant_code: self.tenant_code.clone(),
            env_name: self.env_name.clone(),
            ds_account_number: self.ds_account_number.clone(),
            is_account_number: self.is_account_number.clone(),
            override_start_date_iso8601: self.override_start_date_iso8601.clone(),
            override_end_date_iso8601: self.override_end_date_iso8601.clone(),
        }
    }
}

/// 🍽️ The end-of-run receipt.
fn summary_table(outcome: &JobOutcome) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["", "Result"]);

    let response = &outcome.response;
    for (label, value) in [
        ("Total", response.total_count()),
        ("Transformed", response.success_count()),
        ("Failed", response.failed_count()),
        ("Streamed errors", outcome.streamed_errors),
    ] {
        table.add_row(vec![
            Cell::new(label),
            Cell::new(value).set_alignment(CellAlignment::Right),
        ]);
    }

    if let Some(report) = &outcome.error_report {
        table.add_row(vec![Cell::new("Error report"), Cell::new(&report.message)]);
    }
    if outcome.publish_results.is_empty() {
        table.add_row(vec![Cell::new("Publish"), Cell::new("No data to publish")]);
    }
    for result in &outcome.publish_results {
        let badge = if result.publish_status { "✅" } else { "💀" };
        table.add_row(vec![
            Cell::new(format!("Publish {badge}")),
            Cell::new(&result.message),
        ]);
    }
    table
}

#[tokio::main]
async fn main() -> Result<()> {
    // 📡 println! debugging is a lifestyle choice we're trying to move past
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let result = async {
        let app_config = load_config(args.config.as_deref(), &args.overrides()).context(
            "💀 In admx-cli, main, we couldn't load the configuration. Check the file, \
             the ADMX_* variables and the flags, in roughly that order.",
        )?;
        admx::run(app_config).await
    }
    .await;

    match result {
        Ok(outcome) => {
            info!("🏁 run finished");
            println!("{}", summary_table(&outcome));
            Ok(())
        }
        Err(err) => {
            error!("💀 error: {}", err);
            // -- 🧅 peel the onion, one layer at a time
            for cause in err.chain().skip(1) {
                error!("⚠️  cause: {}", cause);
            }
            std::process::exit(1);
        }
    }
}
