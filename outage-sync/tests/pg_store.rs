//! Round trips against a real Postgres.
//!
//! Run with `OUTAGE_SYNC_TEST_DATABASE_URL=postgres://... cargo test -- --ignored`.

use std::{
    env,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use outage_client::{db, OutageRecord, OutageTable};
use outage_sync::{
    pipeline::{
        FetchError, FetchedBatch, NoNewDataReason, OutageSource, OutageStore, PageEstimate,
        SyncOutcome, SyncPipeline, SyncWindow,
    },
    sinks::PgOutageStore,
};
use sqlx::{postgres::PgPoolOptions, PgPool};
use time::{macros::date, Date};

async fn pool() -> PgPool {
    let url = env::var("OUTAGE_SYNC_TEST_DATABASE_URL")
        .expect("OUTAGE_SYNC_TEST_DATABASE_URL must be set for ignored tests");
    PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await
        .unwrap()
}

/// Fresh table with the destination schema.
async fn scratch_table(pool: &PgPool) -> OutageTable {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let table = OutageTable::new(format!("outages_test_{nanos}")).unwrap();
    sqlx::query(&format!(
        r#"
        CREATE TABLE {} (
            period DATE NOT NULL,
            facility TEXT,
            "facilityName" TEXT,
            generator TEXT,
            capacity DOUBLE PRECISION,
            outage DOUBLE PRECISION,
            "percentOutage" DOUBLE PRECISION NOT NULL
        )
        "#,
        table.quoted()
    ))
    .execute(pool)
    .await
    .unwrap();
    table
}

async fn drop_table(pool: &PgPool, table: &OutageTable) {
    sqlx::query(&format!("DROP TABLE IF EXISTS {}", table.quoted()))
        .execute(pool)
        .await
        .unwrap();
}

fn records(first: Date, days: usize) -> Vec<OutageRecord> {
    let mut out = Vec::new();
    let mut day = first;
    for _ in 0..days {
        for generator in ["1", "2"] {
            out.push(OutageRecord {
                period: day,
                facility: Some("6110".to_string()),
                facility_name: Some("Point Beach".to_string()),
                generator: Some(generator.to_string()),
                capacity: Some(591.2),
                outage: if generator == "1" { Some(0.0) } else { None },
                percent_outage: 0.0,
            });
        }
        day = day.next_day().unwrap();
    }
    out
}

struct FixedSource(Vec<OutageRecord>);

#[async_trait::async_trait]
impl OutageSource for FixedSource {
    async fn fetch(&self, window: &SyncWindow) -> Result<FetchedBatch, FetchError> {
        let records = self
            .0
            .iter()
            .filter(|r| r.period >= window.start && r.period <= window.end)
            .cloned()
            .collect();
        Ok(FetchedBatch {
            records,
            ..Default::default()
        })
    }
}

#[tokio::test]
#[ignore]
async fn append_then_watermark_returns_latest_period() {
    let pool = pool().await;
    let table = scratch_table(&pool).await;
    let store = PgOutageStore::new(pool.clone(), table.clone(), 3, 0, Duration::from_millis(10));

    assert_eq!(store.latest_period().await.unwrap(), None);

    let batch = records(date!(2024 - 01 - 01), 10);
    assert_eq!(store.append(&batch).await.unwrap(), 20);

    assert_eq!(
        store.latest_period().await.unwrap(),
        Some(date!(2024 - 01 - 10))
    );
    assert_eq!(db::count_rows(&pool, &table).await.unwrap(), 20);

    let stored = db::records_between(&pool, &table, date!(2024 - 01 - 10), date!(2024 - 01 - 10))
        .await
        .unwrap();
    assert_eq!(stored, batch[18..].to_vec());

    drop_table(&pool, &table).await;
}

#[tokio::test]
#[ignore]
async fn second_run_without_new_days_writes_nothing() {
    let pool = pool().await;
    let table = scratch_table(&pool).await;
    let upstream = records(date!(2024 - 01 - 01), 10);
    let today = date!(2024 - 01 - 10);

    let first = SyncPipeline {
        source: FixedSource(upstream.clone()),
        store: PgOutageStore::new(pool.clone(), table.clone(), 100, 0, Duration::from_millis(10)),
        page_estimate: PageEstimate::default(),
    };
    assert_eq!(
        first.run(today).await.unwrap(),
        SyncOutcome::Inserted {
            rows: 20,
            watermark: today,
        }
    );

    let second = SyncPipeline {
        source: FixedSource(upstream),
        store: PgOutageStore::new(pool.clone(), table.clone(), 100, 0, Duration::from_millis(10)),
        page_estimate: PageEstimate::default(),
    };
    assert_eq!(
        second.run(today).await.unwrap(),
        SyncOutcome::NoNewData(NoNewDataReason::Empty)
    );
    assert_eq!(db::count_rows(&pool, &table).await.unwrap(), 20);

    drop_table(&pool, &table).await;
}

#[tokio::test]
#[ignore]
async fn failed_write_leaves_no_partial_rows() {
    let pool = pool().await;
    let table = scratch_table(&pool).await;
    sqlx::query(&format!(
        "ALTER TABLE {} ADD CONSTRAINT non_negative CHECK (\"percentOutage\" >= 0)",
        table.quoted()
    ))
    .execute(&pool)
    .await
    .unwrap();

    let mut batch = records(date!(2024 - 01 - 01), 5);
    batch[9].percent_outage = -1.0;
    let store = PgOutageStore::new(pool.clone(), table.clone(), 2, 0, Duration::from_millis(10));

    assert!(store.append(&batch).await.is_err());
    assert_eq!(db::count_rows(&pool, &table).await.unwrap(), 0);
    assert_eq!(store.latest_period().await.unwrap(), None);

    drop_table(&pool, &table).await;
}
