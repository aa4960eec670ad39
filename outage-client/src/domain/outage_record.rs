use time::Date;

/// One generator's outage figures for one day.
///
/// `period` and `percent_outage` are required; rows published upstream without
/// them never become an `OutageRecord`.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OutageRecord {
    pub period: Date,
    pub facility: Option<String>,
    #[sqlx(rename = "facilityName")]
    pub facility_name: Option<String>,
    pub generator: Option<String>,
    pub capacity: Option<f64>,
    pub outage: Option<f64>,
    #[sqlx(rename = "percentOutage")]
    pub percent_outage: f64,
}

impl OutageRecord {
    /// Column names in the destination table, in insert order.
    pub const COLUMNS: [&'static str; 7] = [
        "period",
        "facility",
        "facilityName",
        "generator",
        "capacity",
        "outage",
        "percentOutage",
    ];

    /// Latest period in a batch, `None` for an empty batch.
    pub fn max_period<'a, I>(records: I) -> Option<Date>
    where
        I: IntoIterator<Item = &'a OutageRecord>,
    {
        records.into_iter().map(|r| r.period).max()
    }
}
