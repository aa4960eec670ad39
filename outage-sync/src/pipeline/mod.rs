pub mod window;

pub use window::{SyncWindow, EPOCH_WATERMARK};

use outage_client::OutageRecord;
use time::Date;

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("storage error: {0}")]
    Storage(String),
    #[error("sink error: {0}")]
    Sink(String),
}

/// Why an upstream fetch produced nothing usable.
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("upstream returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("response body is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("unexpected response structure: {0}")]
    Shape(String),
}

impl FetchError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Status { .. } => "status",
            Self::Decode(_) => "decode",
            Self::Shape(_) => "shape",
        }
    }
}

/// Normalized records from one upstream request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchedBatch {
    pub records: Vec<OutageRecord>,
    /// Rows discarded for a missing or unparseable `period` or `percentOutage`.
    pub dropped: usize,
    /// Row count the API reports for the whole query, when present.
    pub reported_total: Option<u64>,
}

#[async_trait::async_trait]
pub trait OutageSource: Send + Sync {
    async fn fetch(&self, window: &SyncWindow) -> Result<FetchedBatch, FetchError>;
}

#[async_trait::async_trait]
pub trait OutageStore: Send + Sync {
    /// Latest stored period, `None` when the table is empty.
    async fn latest_period(&self) -> Result<Option<Date>, PipelineError>;

    /// Append `records` and return the number of rows written.
    async fn append(&self, records: &[OutageRecord]) -> Result<u64, PipelineError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoNewDataReason {
    /// Upstream answered with zero valid rows.
    Empty,
    /// The fetch failed; carries `FetchError::kind`.
    FetchFailed(&'static str),
    /// Every fetched period is already covered by the watermark.
    StaleEcho { fetched_max: Date, watermark: Date },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Inserted { rows: u64, watermark: Date },
    NoNewData(NoNewDataReason),
    WriteFailed,
}

impl SyncOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Inserted { .. } => "inserted",
            Self::NoNewData(NoNewDataReason::Empty) => "no_new_data",
            Self::NoNewData(NoNewDataReason::FetchFailed(_)) => "fetch_failed",
            Self::NoNewData(NoNewDataReason::StaleEcho { .. }) => "stale_echo",
            Self::WriteFailed => "write_failed",
        }
    }
}

/// Used only to warn when a window probably spans more than one page.
#[derive(Debug, Clone, Copy)]
pub struct PageEstimate {
    pub generators_per_day: u32,
    pub page_limit: u32,
}

impl Default for PageEstimate {
    fn default() -> Self {
        Self {
            generators_per_day: 94,
            page_limit: 5000,
        }
    }
}

/// One incremental sync pass: watermark read, fetch, novelty check, append.
pub struct SyncPipeline<S, K> {
    pub source: S,
    pub store: K,
    pub page_estimate: PageEstimate,
}

impl<S, K> SyncPipeline<S, K>
where
    S: OutageSource,
    K: OutageStore,
{
    /// Run once for `today`.
    ///
    /// Only a failed watermark read is returned as an error. Fetch and write
    /// failures end the run as a logged no-op and are retried by the next run.
    pub async fn run(&self, today: Date) -> Result<SyncOutcome, PipelineError> {
        let res = self.run_inner(today).await;

        let label = match &res {
            Ok(outcome) => outcome.label(),
            Err(_) => "storage_error",
        };
        metrics::counter!("outage_sync_runs_total", "outcome" => label).increment(1);

        res
    }

    async fn run_inner(&self, today: Date) -> Result<SyncOutcome, PipelineError> {
        let watermark = match self.store.latest_period().await? {
            Some(latest) => {
                tracing::info!(watermark = %latest, "read watermark from destination table");
                latest
            }
            None => {
                tracing::warn!(
                    fallback = %EPOCH_WATERMARK,
                    "destination table is empty, fetching full history"
                );
                EPOCH_WATERMARK
            }
        };

        let window = SyncWindow::after(watermark, today);
        if window.is_degenerate() {
            tracing::info!(%window, "watermark is not before today, fetching anyway");
        }
        let PageEstimate {
            generators_per_day,
            page_limit,
        } = self.page_estimate;
        if window.exceeds_page(generators_per_day, page_limit) {
            tracing::warn!(
                %window,
                estimated_rows = window.estimated_rows(generators_per_day),
                page_limit,
                "window likely exceeds one response page, only the first page is fetched"
            );
        }

        tracing::info!(%window, "fetching outages");
        let batch = match self.source.fetch(&window).await {
            Ok(batch) => batch,
            Err(e) => {
                tracing::warn!(kind = e.kind(), error = %e, "fetch failed, nothing to insert");
                metrics::counter!("eia_fetch_failures_total", "kind" => e.kind()).increment(1);
                return Ok(SyncOutcome::NoNewData(NoNewDataReason::FetchFailed(e.kind())));
            }
        };

        let Some(fetched_max) = OutageRecord::max_period(&batch.records) else {
            tracing::warn!(%window, "no new data from API, nothing to insert");
            return Ok(SyncOutcome::NoNewData(NoNewDataReason::Empty));
        };

        if fetched_max <= watermark {
            tracing::warn!(
                fetched_max = %fetched_max,
                watermark = %watermark,
                "API data already up to date with destination table, nothing to insert"
            );
            return Ok(SyncOutcome::NoNewData(NoNewDataReason::StaleEcho {
                fetched_max,
                watermark,
            }));
        }

        match self.store.append(&batch.records).await {
            Ok(rows) => {
                tracing::info!(rows, new_watermark = %fetched_max, "outages appended");
                Ok(SyncOutcome::Inserted {
                    rows,
                    watermark: fetched_max,
                })
            }
            Err(e) => {
                tracing::warn!(error = %e, "write failed, watermark not advanced");
                Ok(SyncOutcome::WriteFailed)
            }
        }
    }
}
