use std::path::Path;

use anyhow::{Context, Result};
use outage_sync::{
    config::{AppConfig, Secrets},
    metrics_export, observability,
    pipeline::{PageEstimate, SyncOutcome, SyncPipeline},
    sinks::PgOutageStore,
    sources::EiaOutageSource,
};
use sqlx::postgres::PgPoolOptions;
use time::OffsetDateTime;

/// One sync pass, started by an external scheduler.
#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine; the variables may come from the environment.
    let _ = dotenvy::dotenv();
    observability::init_tracing();
    tracing::info!("outage sync started");

    let cfg = AppConfig::load()?;
    let secrets = Secrets::from_env()?;
    let table = cfg.sink.table()?;

    if cfg.metrics.is_some() {
        metrics_export::init();
    }

    // The pool lives for this run only and is closed on every exit path below.
    let pool = match PgPoolOptions::new()
        .max_connections(cfg.database.max_connections)
        .acquire_timeout(cfg.database.connect_timeout())
        .connect_with(cfg.database.connect_options(&secrets))
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(
                error = %e,
                host = %cfg.database.host,
                database = %cfg.database.database,
                "failed to connect to destination database"
            );
            return Err(e).context("failed to connect to destination database");
        }
    };
    tracing::info!(host = %cfg.database.host, database = %cfg.database.database, "connected to destination database");

    let source = EiaOutageSource::from_config(&cfg.eia, secrets.api_key.clone())?;
    let store = PgOutageStore::new(
        pool.clone(),
        table,
        cfg.sink.batch_size,
        cfg.sink.max_retries,
        cfg.sink.retry_backoff(),
    );
    let pipeline = SyncPipeline {
        source,
        store,
        page_estimate: PageEstimate {
            generators_per_day: cfg.eia.generators_per_day,
            page_limit: cfg.eia.page_limit,
        },
    };

    let today = OffsetDateTime::now_utc().date();
    let result = pipeline.run(today).await;
    pool.close().await;

    if let Some(metrics_cfg) = &cfg.metrics {
        if let Err(e) = metrics_export::write_textfile(Path::new(&metrics_cfg.textfile_path)) {
            tracing::warn!(error = %e, path = %metrics_cfg.textfile_path, "failed to write metrics textfile");
        }
    }

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(error = %e, "failed to read watermark, aborting run");
            return Err(e.into());
        }
    };

    match outcome {
        SyncOutcome::Inserted { rows, watermark } => {
            tracing::info!(rows, %watermark, "data successfully inserted");
        }
        SyncOutcome::NoNewData(reason) => {
            tracing::info!(?reason, "outage sync finished without inserting");
        }
        SyncOutcome::WriteFailed => {
            tracing::warn!("outage sync finished without confirming the write");
        }
    }

    Ok(())
}
