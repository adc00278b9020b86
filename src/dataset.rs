use serde::{Deserialize, Serialize};

use crate::config::OverlayStyle;
use crate::foundation::error::{ReelError, ReelResult};

/// One dataset row: ordered text cells, one per overlay column.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(pub Vec<String>);

impl Row {
    pub fn new<S: Into<String>>(cells: impl IntoIterator<Item = S>) -> Self {
        Self(cells.into_iter().map(Into::into).collect())
    }

    /// Cell `i`, or `None` when it is missing or empty.
    pub fn cell(&self, i: usize) -> Option<&str> {
        self.0.get(i).map(String::as_str).filter(|s| !s.is_empty())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Immutable, non-empty ordered set of rows. Row count is the job count.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dataset {
    rows: Vec<Row>,
}

impl Dataset {
    /// Build a dataset, dropping rows without any cells.
    pub fn new(rows: Vec<Row>) -> ReelResult<Self> {
        let rows: Vec<Row> = rows.into_iter().filter(|r| !r.is_empty()).collect();
        if rows.is_empty() {
            return Err(ReelError::validation(
                "dataset is empty or its data format is wrong",
            ));
        }
        Ok(Self { rows })
    }

    /// Parse a JSON array of arrays. Non-string cells become their string form and `null`
    /// becomes an empty cell.
    pub fn from_json_value(value: serde_json::Value) -> ReelResult<Self> {
        let serde_json::Value::Array(raw_rows) = value else {
            return Err(ReelError::validation("dataset JSON must be an array of rows"));
        };
        let mut rows = Vec::with_capacity(raw_rows.len());
        for (i, raw) in raw_rows.into_iter().enumerate() {
            let serde_json::Value::Array(cells) = raw else {
                return Err(ReelError::validation(format!(
                    "dataset row {i} is not an array"
                )));
            };
            rows.push(Row(cells.into_iter().map(cell_to_string).collect()));
        }
        Self::new(rows)
    }

    pub fn from_json_str(s: &str) -> ReelResult<Self> {
        Self::from_json_value(serde_json::from_str(s)?)
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, i: usize) -> Option<&Row> {
        self.rows.get(i)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column count as seen on the first row.
    pub fn column_count(&self) -> usize {
        self.rows.first().map(Row::len).unwrap_or(0)
    }

    pub fn default_overlays(&self) -> Vec<OverlayStyle> {
        OverlayStyle::defaults_for_columns(self.column_count())
    }
}

fn cell_to_string(v: serde_json::Value) -> String {
    match v {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    }
}
