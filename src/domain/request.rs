//! Request - Block Fetch Protocol Types
//!
//! Sort and filter criteria are opaque to the cache: they are snapshotted into
//! each request and forwarded to the provider untouched.

use serde::{Deserialize, Serialize};

/// Sort direction for a single column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// One column of a sort model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortColumn {
    /// Column identifier understood by the provider
    pub col_id: String,
    /// Direction
    pub sort: SortDirection,
}

impl SortColumn {
    pub fn asc(col_id: impl Into<String>) -> Self {
        Self {
            col_id: col_id.into(),
            sort: SortDirection::Asc,
        }
    }

    pub fn desc(col_id: impl Into<String>) -> Self {
        Self {
            col_id: col_id.into(),
            sort: SortDirection::Desc,
        }
    }
}

/// Ordered sort criteria (empty = provider's natural order)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SortModel(pub Vec<SortColumn>);

impl SortModel {
    pub fn new(columns: impl IntoIterator<Item = SortColumn>) -> Self {
        Self(columns.into_iter().collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Filter criteria, passed through as JSON
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterModel(pub serde_json::Value);

impl FilterModel {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// True when no filter is applied
    pub fn is_empty(&self) -> bool {
        match &self.0 {
            serde_json::Value::Null => true,
            serde_json::Value::Object(map) => map.is_empty(),
            _ => false,
        }
    }
}

/// A request for one block of rows, handed to the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowRequest {
    /// First row (inclusive)
    pub start_row: usize,
    /// Last row (exclusive)
    pub end_row: usize,
    /// Sort criteria in effect when the request was issued
    #[serde(default, skip_serializing_if = "SortModel::is_empty")]
    pub sort_model: SortModel,
    /// Filter criteria in effect when the request was issued
    #[serde(default, skip_serializing_if = "FilterModel::is_empty")]
    pub filter_model: FilterModel,
    /// Group path for grouped data
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_keys: Vec<String>,
}

impl RowRequest {
    /// Number of rows requested
    pub fn len(&self) -> usize {
        self.end_row.saturating_sub(self.start_row)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Provider response for one block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowResponse<R> {
    /// Rows in order, at most the requested count
    pub rows: Vec<R>,
    /// Total row count, if the provider knows it
    #[serde(default)]
    pub total_rows: Option<usize>,
    /// Index one past the last row, once the provider has reached the end
    #[serde(default)]
    pub last_row: Option<usize>,
}

impl<R> RowResponse<R> {
    pub fn new(rows: Vec<R>) -> Self {
        Self {
            rows,
            total_rows: None,
            last_row: None,
        }
    }

    pub fn with_total_rows(mut self, total_rows: usize) -> Self {
        self.total_rows = Some(total_rows);
        self
    }

    pub fn with_last_row(mut self, last_row: usize) -> Self {
        self.last_row = Some(last_row);
        self
    }

    /// Total row count implied by this response.
    ///
    /// Falls back to `last_row`, then to the end of a short block: fewer rows
    /// than requested means the provider ran out of data.
    pub fn reported_total(&self, request_start: usize, requested: usize) -> Option<usize> {
        let received = self.rows.len();
        self.total_rows
            .or(self.last_row)
            .or_else(|| (received < requested).then(|| request_start.saturating_add(received)))
    }
}
