use outage_client::OutageRecord;
use serde_json::{Map, Value};
use time::{macros::format_description, Date};

/// Records kept from one `response.data` array and the number of rows rejected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Normalized {
    pub records: Vec<OutageRecord>,
    pub dropped: usize,
}

/// Normalize the upstream `response.data` rows.
///
/// Only the known columns are read, so the `*-units` metadata columns never
/// reach storage. Measures that do not parse become null; rows without a usable
/// `period` or `percentOutage` are dropped and counted.
pub fn normalize_rows(rows: &[Value]) -> Normalized {
    let mut out = Normalized {
        records: Vec::with_capacity(rows.len()),
        dropped: 0,
    };

    for row in rows {
        match row.as_object().and_then(normalize_row) {
            Some(record) => out.records.push(record),
            None => out.dropped += 1,
        }
    }

    if out.dropped > 0 {
        metrics::counter!("outage_rows_dropped_total").increment(out.dropped as u64);
    }

    out
}

pub fn normalize_row(row: &Map<String, Value>) -> Option<OutageRecord> {
    let period = row.get("period").and_then(parse_period)?;
    let percent_outage = row.get("percentOutage").and_then(coerce_f64)?;

    Some(OutageRecord {
        period,
        facility: row.get("facility").and_then(coerce_id),
        facility_name: row.get("facilityName").and_then(coerce_id),
        generator: row.get("generator").and_then(coerce_id),
        capacity: row.get("capacity").and_then(coerce_f64),
        outage: row.get("outage").and_then(coerce_f64),
        percent_outage,
    })
}

/// Parse `YYYY-MM-DD`, ignoring any time-of-day suffix.
pub fn parse_period(value: &Value) -> Option<Date> {
    let raw = value.as_str()?.trim();
    let day = raw
        .split_once(|c: char| c == 'T' || c == ' ')
        .map_or(raw, |(day, _)| day);
    Date::parse(day, format_description!("[year]-[month]-[day]")).ok()
}

/// Numbers arrive either as JSON numbers or as numeric strings.
pub fn coerce_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

fn coerce_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
