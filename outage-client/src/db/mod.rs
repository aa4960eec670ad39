pub mod outage_queries;

pub use outage_queries::{count_rows, latest_period, records_between};

use std::fmt;

/// Longest identifier Postgres keeps without truncation.
const MAX_IDENT_LEN: usize = 63;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum TableNameError {
    #[error("table name is empty")]
    Empty,
    #[error("table name '{0}' is longer than 63 characters")]
    TooLong(String),
    #[error("table name '{0}' may only contain ASCII letters, digits and '_' and must not start with a digit")]
    InvalidCharacters(String),
}

/// Name of the destination outage table.
///
/// Table names cannot be bound as query parameters, so the name is checked once
/// here and always rendered as a quoted identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutageTable(String);

impl OutageTable {
    pub fn new(name: impl Into<String>) -> Result<Self, TableNameError> {
        let name = name.into();
        if name.is_empty() {
            return Err(TableNameError::Empty);
        }
        if name.len() > MAX_IDENT_LEN {
            return Err(TableNameError::TooLong(name));
        }
        let valid_chars = name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        let starts_with_digit = name.chars().next().is_some_and(|c| c.is_ascii_digit());
        if !valid_chars || starts_with_digit {
            return Err(TableNameError::InvalidCharacters(name));
        }
        Ok(Self(name))
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    /// Double-quoted SQL identifier, e.g. `"Outages"`.
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

impl Default for OutageTable {
    fn default() -> Self {
        Self("Outages".to_string())
    }
}

impl fmt::Display for OutageTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
