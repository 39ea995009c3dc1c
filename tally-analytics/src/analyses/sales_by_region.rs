//! Regional sales breakdown

use std::cmp::Ordering;

use serde_json::{json, Map, Value};
use tally_core::num::{number_value, round_to, value_as_f64};
use tally_core::{AnalysisError, Document};

use crate::frame::{group_rows, numeric_column, require_columns};
use crate::service::{AnalysisPayload, AnalysisReport, AnalysisService};

/// Groups rows by `region` and reports totals, averages, extrema, and each
/// region's share of the grand total, largest region first.
#[derive(Debug, Default)]
pub struct SalesByRegion;

impl SalesByRegion {
    pub const NAME: &'static str = "sales_by_region";
}

struct RegionRow {
    region: Value,
    total: f64,
    average: f64,
    count: usize,
    min: f64,
    max: f64,
}

/// Summary, top, and bottom derived from ordered per-region entries.
///
/// `grand` comes from raw amounts in the in-memory strategy and from
/// already-rounded region totals in the pipeline strategy, so the two can
/// disagree by at most a cent per region.
fn assemble(grand: f64, by_group: Vec<Value>) -> AnalysisReport {
    let regions = by_group.len();
    let average_per_region = if regions == 0 {
        0.0
    } else {
        grand / regions as f64
    };
    AnalysisReport {
        summary: json!({
            "total_sales": number_value(round_to(grand, 2)),
            "total_regions": regions,
            "average_per_region": number_value(round_to(average_per_region, 2)),
        }),
        top: by_group.first().cloned(),
        bottom: by_group.last().cloned(),
        by_group,
    }
}

impl AnalysisService for SalesByRegion {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn needs_raw_rows(&self) -> bool {
        true
    }

    fn validate_params(&self, _params: &Map<String, Value>) -> Result<(), AnalysisError> {
        Ok(())
    }

    fn compute_in_memory(
        &self,
        rows: &[Document],
        _params: &Map<String, Value>,
    ) -> Result<AnalysisPayload, AnalysisError> {
        if rows.is_empty() {
            return Ok(AnalysisPayload::NoData);
        }
        require_columns(Self::NAME, rows, &["region", "sales_amount"])?;

        let mut regions = Vec::new();
        for group in group_rows(rows, &["region"]) {
            let amounts = numeric_column(&group.rows, "sales_amount");
            let total: f64 = amounts.iter().sum();
            let count = amounts.len();
            regions.push(RegionRow {
                region: group.keys.into_iter().next().unwrap_or(Value::Null),
                total,
                average: total / count as f64,
                count,
                min: amounts.iter().copied().fold(f64::INFINITY, f64::min),
                max: amounts.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            });
        }

        let grand: f64 = regions.iter().map(|region| region.total).sum();
        regions.sort_by(|a, b| b.total.partial_cmp(&a.total).unwrap_or(Ordering::Equal));

        let by_group: Vec<Value> = regions
            .iter()
            .map(|region| {
                let share = if grand == 0.0 {
                    0.0
                } else {
                    region.total / grand * 100.0
                };
                json!({
                    "region": region.region,
                    "total_sales": number_value(round_to(region.total, 2)),
                    "average_sales": number_value(round_to(region.average, 2)),
                    "count": region.count,
                    "min_sale": number_value(round_to(region.min, 2)),
                    "max_sale": number_value(round_to(region.max, 2)),
                    "percentage_of_total": number_value(round_to(share, 2)),
                })
            })
            .collect();

        Ok(AnalysisPayload::Report(assemble(grand, by_group)))
    }

    fn build_pipeline(
        &self,
        base_filter: &Value,
        _params: &Map<String, Value>,
    ) -> Result<Vec<Value>, AnalysisError> {
        Ok(vec![
            json!({ "$match": base_filter }),
            json!({ "$group": {
                "_id": "$region",
                "total_sales": { "$sum": "$sales_amount" },
                "average_sales": { "$avg": "$sales_amount" },
                "count": { "$sum": 1 },
                "min_sale": { "$min": "$sales_amount" },
                "max_sale": { "$max": "$sales_amount" },
            }}),
            json!({ "$group": {
                "_id": null,
                "grand_total": { "$sum": "$total_sales" },
                "regions": { "$push": {
                    "region": "$_id",
                    "total_sales": "$total_sales",
                    "average_sales": "$average_sales",
                    "count": "$count",
                    "min_sale": "$min_sale",
                    "max_sale": "$max_sale",
                }},
            }}),
            json!({ "$unwind": "$regions" }),
            json!({ "$project": {
                "_id": 0,
                "region": "$regions.region",
                "count": "$regions.count",
                "total_sales": { "$round": ["$regions.total_sales", 2] },
                "average_sales": { "$round": ["$regions.average_sales", 2] },
                "min_sale": { "$round": ["$regions.min_sale", 2] },
                "max_sale": { "$round": ["$regions.max_sale", 2] },
                "percentage_of_total": { "$round": [
                    { "$multiply": [
                        { "$divide": ["$regions.total_sales", "$grand_total"] },
                        100,
                    ]},
                    2,
                ]},
            }}),
            json!({ "$sort": { "total_sales": -1 } }),
        ])
    }

    fn post_process(
        &self,
        rows: Vec<Document>,
        _params: &Map<String, Value>,
    ) -> Result<AnalysisPayload, AnalysisError> {
        let mut grand = 0.0;
        for row in &rows {
            let total = row
                .get("total_sales")
                .and_then(value_as_f64)
                .ok_or_else(|| AnalysisError::MalformedResult {
                    analysis: Self::NAME.to_string(),
                    reason: "row missing numeric `total_sales`".to_string(),
                })?;
            grand += total;
        }
        let by_group: Vec<Value> = rows.into_iter().map(Value::Object).collect();
        Ok(AnalysisPayload::Report(assemble(grand, by_group)))
    }
}

// =============================================================================
// TESTS
// =============================================================================
