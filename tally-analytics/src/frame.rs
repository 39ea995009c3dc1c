//! Row-group helpers for in-memory analyses
//!
//! Analyses that run client-side share this small tabular layer: lenient
//! numeric coercion, grouping on first-seen key order, column ordering,
//! and the aggregate operators `group_and_aggregate` accepts.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde_json::Value;
use tally_core::{AnalysisError, Document};
use tally_store::compare_values;

/// True when at least one row carries the column.
pub fn has_column(rows: &[Document], column: &str) -> bool {
    rows.iter().any(|row| row.contains_key(column))
}

/// Fail with the first required column no row carries.
pub fn require_columns(
    analysis: &str,
    rows: &[Document],
    columns: &[&str],
) -> Result<(), AnalysisError> {
    for column in columns {
        if !has_column(rows, column) {
            return Err(AnalysisError::MissingColumn {
                analysis: analysis.to_string(),
                column: (*column).to_string(),
            });
        }
    }
    Ok(())
}

/// Lenient numeric view of a cell: numbers pass through, numeric strings
/// parse, booleans count as 0/1, and anything else (missing included) is 0.
pub fn coerce_numeric(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        Some(Value::Bool(b)) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

/// The coerced numeric column across a set of rows.
pub fn numeric_column(rows: &[&Document], column: &str) -> Vec<f64> {
    rows.iter()
        .map(|row| coerce_numeric(row.get(column)))
        .collect()
}

/// Rows sharing one group-key tuple.
pub struct RowGroup<'a> {
    /// Key values in the same order as the grouping columns
    pub keys: Vec<Value>,
    pub rows: Vec<&'a Document>,
}

/// Group rows by the given columns in first-seen order.
///
/// A row missing a grouping column lands in the JSON-null bucket for that
/// column, mirroring how the pipeline engine groups absent fields.
pub fn group_rows<'a, C: AsRef<str>>(rows: &'a [Document], columns: &[C]) -> Vec<RowGroup<'a>> {
    let mut groups: Vec<RowGroup<'a>> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for row in rows {
        let keys: Vec<Value> = columns
            .iter()
            .map(|column| row.get(column.as_ref()).cloned().unwrap_or(Value::Null))
            .collect();
        let tag = Value::Array(keys.clone()).to_string();
        match index.get(&tag) {
            Some(&slot) => groups[slot].rows.push(row),
            None => {
                index.insert(tag, groups.len());
                groups.push(RowGroup {
                    keys,
                    rows: vec![row],
                });
            }
        }
    }
    groups
}

/// Order result documents by the given columns ascending, missing last
/// within each type per the store's cross-type ordering.
pub fn sort_by_columns<C: AsRef<str>>(rows: &mut [Document], columns: &[C]) {
    rows.sort_by(|a, b| {
        for column in columns {
            let ordering = compare_values(a.get(column.as_ref()), b.get(column.as_ref()));
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

/// The aggregate operators `group_and_aggregate` accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOp {
    Sum,
    Mean,
    Count,
    Min,
    Max,
}

impl AggregateOp {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "sum" => Some(Self::Sum),
            "mean" => Some(Self::Mean),
            "count" => Some(Self::Count),
            "min" => Some(Self::Min),
            "max" => Some(Self::Max),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Mean => "mean",
            Self::Count => "count",
            Self::Min => "min",
            Self::Max => "max",
        }
    }

    /// Apply over a coerced numeric column. Empty input yields 0.
    pub fn apply(self, values: &[f64]) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        match self {
            Self::Sum => values.iter().sum(),
            Self::Mean => values.iter().sum::<f64>() / values.len() as f64,
            Self::Count => values.len() as f64,
            Self::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Self::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
