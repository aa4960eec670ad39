use anyhow::Result;
use sqlx::PgPool;
use time::Date;

use crate::{db::OutageTable, domain::OutageRecord};

/// Most recent `period` stored in the outage table.
///
/// `Ok(None)` means the table holds no rows yet; storage failures are returned
/// as errors so callers can tell the two apart.
pub async fn latest_period(pool: &PgPool, table: &OutageTable) -> Result<Option<Date>> {
    let sql = format!("SELECT MAX(period) FROM {}", table.quoted());
    let latest: Option<Date> = sqlx::query_scalar(&sql).fetch_one(pool).await?;
    Ok(latest)
}

/// Fetch every stored record with `start <= period <= end`.
pub async fn records_between(
    pool: &PgPool,
    table: &OutageTable,
    start: Date,
    end: Date,
) -> Result<Vec<OutageRecord>> {
    let sql = format!(
        r#"
        SELECT
            period,
            facility,
            "facilityName",
            generator,
            capacity,
            outage,
            "percentOutage"
        FROM {}
        WHERE period >= $1
          AND period <= $2
        ORDER BY period, facility, generator
        "#,
        table.quoted()
    );

    let rows = sqlx::query_as::<_, OutageRecord>(&sql)
        .bind(start)
        .bind(end)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

pub async fn count_rows(pool: &PgPool, table: &OutageTable) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM {}", table.quoted());
    let count: i64 = sqlx::query_scalar(&sql).fetch_one(pool).await?;
    Ok(count)
}
