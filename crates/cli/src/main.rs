//! `mmm-cli` -- command-line front end for the job explorer.
//!
//! Loads the job catalog and prints it. Optionally selects a job, prints
//! its chart summaries, and runs a budget optimization for it. With a
//! refresh interval configured it keeps running, refreshing the catalog
//! and logging explorer events until interrupted.
//!
//! # Environment variables
//!
//! | Variable                   | Required | Default | Description                          |
//! |----------------------------|----------|---------|--------------------------------------|
//! | `MMM_API_ENDPOINT`         | yes      | --      | Base URL of the job service          |
//! | `MMM_API_TOKEN`            | no       | --      | Bearer token                         |
//! | `MMM_REQUEST_TIMEOUT_SECS` | no       | `30`    | Per-request timeout                  |
//! | `MMM_CATALOG_REFRESH_SECS` | no       | `0`     | Catalog refresh interval, `0` = once |
//! | `MMM_SELECT_JOB`           | no       | --      | Job id to select                     |
//! | `MMM_OPTIMIZE_BUDGET`      | no       | --      | Budget to optimize for that job      |
//! | `MMM_LOG_FORMAT`           | no       | `text`  | `json` for JSON log lines            |

use std::sync::Arc;

use anyhow::Context;
use mmm_cli::options::CliOptions;
use mmm_cli::report;
use mmm_client::{ClientConfig, HttpJobService, StaticTokenProvider};
use mmm_explorer::{Explorer, IssueOutcome, QueryResult};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let options = CliOptions::from_env();
    init_tracing(options.as_ref().is_ok_and(|o| o.json_logs));

    let options = options.unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid command-line configuration");
        std::process::exit(1);
    });
    let config = ClientConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid client configuration");
        std::process::exit(1);
    });

    if let Err(e) = run(config, options).await {
        tracing::error!(error = %format!("{e:#}"), "mmm-cli failed");
        std::process::exit(1);
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "mmm_cli=info,mmm_explorer=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn run(config: ClientConfig, options: CliOptions) -> anyhow::Result<()> {
    let auth = Arc::new(StaticTokenProvider::new(config.token.clone()));
    let service = HttpJobService::from_config(&config, auth);

    tracing::info!(
        endpoint = %service.endpoint().as_str(),
        timeout_secs = config.request_timeout.as_secs(),
        "Starting mmm-cli",
    );

    let explorer = Explorer::new(Arc::new(service));

    let jobs = explorer
        .refresh()
        .await
        .context("Failed to load the job catalog")?;
    print!("{}", report::job_table(&jobs));

    if let Some(job_id) = options.select_job.as_deref() {
        explorer.select(Some(job_id))?;
        if let Some(job) = explorer.current_selection() {
            print!("{}", report::job_details(&job));
        }

        let attribution = explorer.attribution().settled().await;
        let media = explorer.media_metrics().settled().await;
        println!("{}", report::chart_summary("attribution", &attribution));
        println!("{}", report::chart_summary("media metrics", &media));

        if let Some(amount) = options.optimize_budget {
            explorer.set_budget(amount)?;
            if explorer.optimize() == IssueOutcome::Gated {
                tracing::warn!(job_id, "Selected job has not completed; skipping budget optimization");
            } else {
                match explorer.budget().settled().await {
                    QueryResult::Ready(payload) => print!("{}", report::budget_report(amount, &payload)),
                    QueryResult::Failed(err) => {
                        return Err(err).context("Budget optimization failed");
                    }
                    QueryResult::Idle | QueryResult::Loading => {}
                }
            }
        }
    }

    if let Some(interval) = config.catalog_refresh {
        watch(&explorer, interval).await?;
    }
    Ok(())
}

/// Refresh on `interval` and log every explorer event until Ctrl-C.
async fn watch(explorer: &Explorer, interval: std::time::Duration) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let mut events = explorer.subscribe();
    let logger = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => tracing::info!(event = %json, "Explorer event"),
                    Err(e) => tracing::warn!(error = %e, "Failed to serialize explorer event"),
                },
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event logger lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let refresher = explorer.spawn_auto_refresh(interval, cancel.clone());
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    tracing::info!("Shutting down");
    cancel.cancel();
    let _ = refresher.await;
    logger.abort();
    Ok(())
}
