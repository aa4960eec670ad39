use std::time::Duration;

use outage_client::{db, OutageRecord, OutageTable};
use sqlx::{postgres::PgPool, Postgres, QueryBuilder};
use time::Date;

use crate::pipeline::{OutageStore, PipelineError};

/// Postgres binds at most 65535 parameters per statement.
const MAX_BIND_PARAMS: usize = 65_535;

/// Destination outage table: watermark reads and append-only writes.
pub struct PgOutageStore {
    pool: PgPool,
    table: OutageTable,
    batch_size: usize,
    max_retries: u32,
    retry_backoff: Duration,
}

impl PgOutageStore {
    pub fn new(
        pool: PgPool,
        table: OutageTable,
        batch_size: usize,
        max_retries: u32,
        retry_backoff: Duration,
    ) -> Self {
        let max_rows = MAX_BIND_PARAMS / OutageRecord::COLUMNS.len();
        Self {
            pool,
            table,
            batch_size: batch_size.clamp(1, max_rows),
            max_retries,
            retry_backoff,
        }
    }

    pub fn table(&self) -> &OutageTable {
        &self.table
    }

    /// Insert every chunk in one transaction, so a failure leaves no partial batch.
    async fn insert_all(&self, records: &[OutageRecord]) -> Result<u64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for chunk in records.chunks(self.batch_size) {
            let mut builder = self.insert_builder(chunk);
            inserted += builder.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }

    fn insert_builder<'a>(&self, chunk: &'a [OutageRecord]) -> QueryBuilder<'a, Postgres> {
        let columns = OutageRecord::COLUMNS
            .iter()
            .map(|c| format!("\"{c}\""))
            .collect::<Vec<_>>()
            .join(", ");
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "INSERT INTO {} ({columns}) ",
            self.table.quoted()
        ));

        builder.push_values(chunk, |mut b, r| {
            b.push_bind(r.period)
                .push_bind(&r.facility)
                .push_bind(&r.facility_name)
                .push_bind(&r.generator)
                .push_bind(r.capacity)
                .push_bind(r.outage)
                .push_bind(r.percent_outage);
        });

        builder
    }
}

#[async_trait::async_trait]
impl OutageStore for PgOutageStore {
    async fn latest_period(&self) -> Result<Option<Date>, PipelineError> {
        db::latest_period(&self.pool, &self.table)
            .await
            .map_err(|e| PipelineError::Storage(e.to_string()))
    }

    async fn append(&self, records: &[OutageRecord]) -> Result<u64, PipelineError> {
        if records.is_empty() {
            tracing::warn!(table = %self.table, "batch is empty, nothing was inserted");
            return Ok(0);
        }

        let mut attempt: u32 = 0;
        loop {
            match self.insert_all(records).await {
                Ok(rows) => {
                    metrics::counter!("outage_rows_inserted_total").increment(rows);
                    tracing::info!(table = %self.table, rows, "inserted outage rows");
                    return Ok(rows);
                }
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    let sleep_for = self.retry_backoff * attempt;
                    tracing::warn!(
                        error = %e,
                        attempt,
                        table = %self.table,
                        "outage insert failed, retrying with backoff"
                    );
                    tokio::time::sleep(sleep_for).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, table = %self.table, "outage insert failed, giving up");
                    metrics::counter!("outage_sink_errors_total").increment(1);
                    return Err(PipelineError::Sink(e.to_string()));
                }
            }
        }
    }
}
