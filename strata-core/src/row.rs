use crate::Value;
use std::sync::Arc;

/// Shared column-name list; one allocation per statement, not per row.
pub type RowNames = Arc<[String]>;
/// Row values aligned by index with a [`RowNames`].
pub type Row = Box<[Value]>;

/// A result row with its column labels.
#[derive(Debug, Clone)]
pub struct RowLabeled {
    pub labels: RowNames,
    pub values: Row,
}

impl RowLabeled {
    pub fn new(labels: RowNames, values: Row) -> Self {
        Self { labels, values }
    }

    /// Build a row from (label, value) pairs, preserving order.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, Value)>) -> Self {
        let (labels, values): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();
        Self {
            labels: labels.into(),
            values: values.into(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.labels
            .iter()
            .position(|l| l == name)
            .map(|i| &self.values[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.labels
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

/// Outcome of a modify statement.
#[derive(Debug, Default, Clone, Copy)]
pub struct RowsAffected {
    pub rows_affected: u64,
    /// Backend-generated identifier of the last inserted row, when available.
    pub last_affected_id: Option<i64>,
}
