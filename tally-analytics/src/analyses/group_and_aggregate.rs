//! Parameterized group-and-aggregate
//!
//! The caller names the grouping columns and an aggregation map
//! (`column -> operation` or `column -> [operations]`). Results carry one
//! flattened `column_operation` field per pair and are ordered by the
//! group-key tuple ascending; that ordering happens client-side in both
//! strategies so the store never needs a compound sort.

use serde_json::{json, Map, Value};
use tally_core::num::{number_value, value_as_f64};
use tally_core::{AnalysisError, Document};

use crate::frame::{group_rows, numeric_column, require_columns, sort_by_columns, AggregateOp};
use crate::service::{AnalysisPayload, AnalysisReport, AnalysisService};

/// Groups rows by caller-chosen columns and applies caller-chosen
/// numeric aggregations.
#[derive(Debug, Default)]
pub struct GroupAndAggregate;

impl GroupAndAggregate {
    pub const NAME: &'static str = "group_and_aggregate";
}

/// Hidden per-group row counter carried through the pipeline so the
/// pushed-down strategy can report the matched row count.
const ROWS_FIELD: &str = "rows_in_group";

struct Plan {
    group_by: Vec<String>,
    /// Column to deduplicated operations, ordered by column name
    aggregations: Vec<(String, Vec<AggregateOp>)>,
}

fn invalid(param: &str, reason: impl Into<String>) -> AnalysisError {
    AnalysisError::InvalidParams {
        analysis: GroupAndAggregate::NAME.to_string(),
        param: param.to_string(),
        reason: reason.into(),
    }
}

fn string_list(value: Option<&Value>, param: &str) -> Result<Vec<String>, AnalysisError> {
    match value {
        Some(Value::String(column)) => Ok(vec![column.clone()]),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| invalid(param, "entries must be strings"))
            })
            .collect(),
        Some(_) => Err(invalid(param, "expected a column name or list of column names")),
        None => Err(invalid(param, "parameter is required")),
    }
}

fn parse_params(params: &Map<String, Value>) -> Result<Plan, AnalysisError> {
    let group_by = string_list(params.get("group_by_columns"), "group_by_columns")?;
    if group_by.is_empty() {
        return Err(invalid("group_by_columns", "at least one column is required"));
    }

    let Some(Value::Object(spec)) = params.get("aggregations") else {
        return Err(invalid(
            "aggregations",
            "an object mapping columns to operations is required",
        ));
    };
    if spec.is_empty() {
        return Err(invalid("aggregations", "at least one aggregation is required"));
    }

    let mut aggregations = Vec::new();
    for (column, entry) in spec {
        let tokens = string_list(Some(entry), "aggregations").map_err(|_| {
            invalid(
                "aggregations",
                format!("`{column}` must name an operation or list of operations"),
            )
        })?;
        if tokens.is_empty() {
            return Err(invalid("aggregations", format!("`{column}` lists no operations")));
        }
        let mut ops = Vec::new();
        for token in tokens {
            let op = AggregateOp::parse(&token)
                .ok_or_else(|| invalid("aggregations", format!("unknown operation `{token}`")))?;
            if !ops.contains(&op) {
                ops.push(op);
            }
        }
        aggregations.push((column.clone(), ops));
    }

    Ok(Plan {
        group_by,
        aggregations,
    })
}

fn summarize(by_group: Vec<Value>, row_count: u64) -> AnalysisReport {
    AnalysisReport {
        summary: json!({ "group_count": by_group.len(), "row_count": row_count }),
        top: by_group.first().cloned(),
        bottom: by_group.last().cloned(),
        by_group,
    }
}

impl AnalysisService for GroupAndAggregate {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn needs_raw_rows(&self) -> bool {
        true
    }

    fn validate_params(&self, params: &Map<String, Value>) -> Result<(), AnalysisError> {
        parse_params(params).map(|_| ())
    }

    fn compute_in_memory(
        &self,
        rows: &[Document],
        params: &Map<String, Value>,
    ) -> Result<AnalysisPayload, AnalysisError> {
        if rows.is_empty() {
            return Ok(AnalysisPayload::NoData);
        }
        let plan = parse_params(params)?;

        let needed: Vec<&str> = plan
            .group_by
            .iter()
            .map(String::as_str)
            .chain(plan.aggregations.iter().map(|(column, _)| column.as_str()))
            .collect();
        require_columns(Self::NAME, rows, &needed)?;

        let mut result_rows: Vec<Document> = Vec::new();
        for group in group_rows(rows, &plan.group_by) {
            let mut entry = Document::new();
            for (column, key) in plan.group_by.iter().zip(&group.keys) {
                entry.insert(column.clone(), key.clone());
            }
            for (column, ops) in &plan.aggregations {
                let values = numeric_column(&group.rows, column);
                for op in ops {
                    entry.insert(
                        format!("{column}_{}", op.as_str()),
                        number_value(op.apply(&values)),
                    );
                }
            }
            result_rows.push(entry);
        }
        sort_by_columns(&mut result_rows, &plan.group_by);

        let by_group: Vec<Value> = result_rows.into_iter().map(Value::Object).collect();
        Ok(AnalysisPayload::Report(summarize(by_group, rows.len() as u64)))
    }

    fn build_pipeline(
        &self,
        base_filter: &Value,
        params: &Map<String, Value>,
    ) -> Result<Vec<Value>, AnalysisError> {
        let plan = parse_params(params)?;

        let mut key = Map::new();
        for column in &plan.group_by {
            key.insert(column.clone(), Value::String(format!("${column}")));
        }

        let mut group = Map::new();
        group.insert("_id".to_string(), Value::Object(key));
        group.insert(ROWS_FIELD.to_string(), json!({ "$sum": 1 }));

        let mut project = Map::new();
        project.insert("_id".to_string(), json!(0));
        project.insert(ROWS_FIELD.to_string(), json!(1));
        for column in &plan.group_by {
            project.insert(column.clone(), Value::String(format!("$_id.{column}")));
        }

        for (column, ops) in &plan.aggregations {
            for op in ops {
                let field = format!("{column}_{}", op.as_str());
                let operand = format!("${column}");
                let accumulator = match op {
                    AggregateOp::Sum => json!({ "$sum": operand }),
                    AggregateOp::Mean => json!({ "$avg": operand }),
                    AggregateOp::Count => json!({ "$sum": 1 }),
                    AggregateOp::Min => json!({ "$min": operand }),
                    AggregateOp::Max => json!({ "$max": operand }),
                };
                group.insert(field.clone(), accumulator);
                project.insert(field, json!(1));
            }
        }

        Ok(vec![
            json!({ "$match": base_filter }),
            json!({ "$group": group }),
            json!({ "$project": project }),
        ])
    }

    fn post_process(
        &self,
        rows: Vec<Document>,
        params: &Map<String, Value>,
    ) -> Result<AnalysisPayload, AnalysisError> {
        let plan = parse_params(params)?;
        let mut rows = rows;
        let mut row_count: u64 = 0;

        for row in &mut rows {
            row_count += row
                .remove(ROWS_FIELD)
                .as_ref()
                .and_then(Value::as_u64)
                .ok_or_else(|| AnalysisError::MalformedResult {
                    analysis: Self::NAME.to_string(),
                    reason: format!("group row missing `{ROWS_FIELD}` counter"),
                })?;
            // Collapse whole floats so both strategies emit the same numbers.
            for (column, ops) in &plan.aggregations {
                for op in ops {
                    let field = format!("{column}_{}", op.as_str());
                    if let Some(number) = row.get(&field).and_then(value_as_f64) {
                        row.insert(field, number_value(number));
                    }
                }
            }
        }
        sort_by_columns(&mut rows, &plan.group_by);

        let by_group: Vec<Value> = rows.into_iter().map(Value::Object).collect();
        Ok(AnalysisPayload::Report(summarize(by_group, row_count)))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tally_test_utils::fixtures;

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    fn report(payload: AnalysisPayload) -> AnalysisReport {
        match payload {
            AnalysisPayload::Report(report) => report,
            AnalysisPayload::NoData => panic!("expected a report, got the no-data marker"),
        }
    }

    #[test]
    fn test_validate_requires_group_columns() {
        let err = GroupAndAggregate
            .validate_params(&params(json!({ "aggregations": { "units": "sum" } })))
            .unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::InvalidParams { ref param, .. } if param == "group_by_columns"
        ));
    }

    #[test]
    fn test_validate_rejects_unknown_operation() {
        let err = GroupAndAggregate
            .validate_params(&params(json!({
                "group_by_columns": ["region"],
                "aggregations": { "units": ["sum", "median"] },
            })))
            .unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::InvalidParams { ref reason, .. } if reason.contains("median")
        ));
    }

    #[test]
    fn test_validate_accepts_single_string_forms() {
        GroupAndAggregate
            .validate_params(&params(json!({
                "group_by_columns": "region",
                "aggregations": { "units": "max" },
            })))
            .unwrap();
    }

    #[test]
    fn test_in_memory_groups_sorted_by_key() {
        let rows = fixtures::sales_documents();
        let report = report(
            GroupAndAggregate
                .compute_in_memory(
                    &rows,
                    &params(json!({
                        "group_by_columns": ["region"],
                        "aggregations": { "sales_amount": ["sum", "mean"], "units": "max" },
                    })),
                )
                .unwrap(),
        );

        assert_eq!(report.summary, json!({ "group_count": 4, "row_count": 10 }));
        assert_eq!(report.by_group.len(), 4);
        assert_eq!(
            report.by_group[0],
            json!({
                "region": "East",
                "sales_amount_sum": 200,
                "sales_amount_mean": 100,
                "units_max": 6,
            })
        );
        assert_eq!(report.by_group[1]["region"], json!("North"));
        assert_eq!(report.by_group[1]["sales_amount_mean"], json!(500.0 / 3.0));
        assert_eq!(report.by_group[3]["region"], json!("West"));
        assert_eq!(report.top, Some(report.by_group[0].clone()));
        assert_eq!(report.bottom, Some(report.by_group[3].clone()));
    }

    #[test]
    fn test_in_memory_composite_keys() {
        let rows = fixtures::sales_documents();
        let report = report(
            GroupAndAggregate
                .compute_in_memory(
                    &rows,
                    &params(json!({
                        "group_by_columns": ["region", "product"],
                        "aggregations": { "units": "count" },
                    })),
                )
                .unwrap(),
        );
        // West sells all three products; ties broken by product name.
        assert_eq!(report.by_group[0]["region"], json!("East"));
        let west: Vec<&Value> = report
            .by_group
            .iter()
            .filter(|row| row["region"] == json!("West"))
            .collect();
        assert_eq!(west.len(), 3);
        assert_eq!(west[0]["product"], json!("gadget"));
        assert_eq!(west[0]["units_count"], json!(2));
    }

    #[test]
    fn test_in_memory_missing_column_rejected() {
        let rows = fixtures::sales_documents();
        let err = GroupAndAggregate
            .compute_in_memory(
                &rows,
                &params(json!({
                    "group_by_columns": ["warehouse"],
                    "aggregations": { "units": "sum" },
                })),
            )
            .unwrap_err();
        assert_eq!(
            err,
            AnalysisError::MissingColumn {
                analysis: "group_and_aggregate".to_string(),
                column: "warehouse".to_string(),
            }
        );
    }

    #[test]
    fn test_pipeline_shape() {
        let stages = GroupAndAggregate
            .build_pipeline(
                &json!({}),
                &params(json!({
                    "group_by_columns": ["region"],
                    "aggregations": { "units": ["sum"] },
                })),
            )
            .unwrap();
        assert_eq!(stages.len(), 3);
        assert_eq!(
            stages[1],
            json!({ "$group": {
                "_id": { "region": "$region" },
                "rows_in_group": { "$sum": 1 },
                "units_sum": { "$sum": "$units" },
            }})
        );
        assert_eq!(
            stages[2],
            json!({ "$project": {
                "_id": 0,
                "rows_in_group": 1,
                "region": "$_id.region",
                "units_sum": 1,
            }})
        );
    }

    #[test]
    fn test_post_process_normalizes_and_sorts() {
        let rows: Vec<Document> = vec![
            serde_json::from_value(json!({
                "region": "West", "units_min": 2.0, "rows_in_group": 4,
            }))
            .unwrap(),
            serde_json::from_value(json!({
                "region": "East", "units_min": 3, "rows_in_group": 2,
            }))
            .unwrap(),
        ];
        let report = report(
            GroupAndAggregate
                .post_process(
                    rows,
                    &params(json!({
                        "group_by_columns": ["region"],
                        "aggregations": { "units": "min" },
                    })),
                )
                .unwrap(),
        );
        assert_eq!(report.summary, json!({ "group_count": 2, "row_count": 6 }));
        assert_eq!(
            report.by_group[0],
            json!({ "region": "East", "units_min": 3 })
        );
        // Whole float collapsed to an integer.
        assert_eq!(
            report.by_group[1],
            json!({ "region": "West", "units_min": 2 })
        );
    }

    #[test]
    fn test_empty_rows_yield_no_data() {
        let payload = GroupAndAggregate
            .compute_in_memory(
                &[],
                &params(json!({
                    "group_by_columns": ["region"],
                    "aggregations": { "units": "sum" },
                })),
            )
            .unwrap();
        assert!(payload.is_no_data());
    }
}
