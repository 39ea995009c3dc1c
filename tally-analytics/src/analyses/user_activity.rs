//! User activity profile
//!
//! Both strategies reduce to the same [`Activity`] intermediate before
//! assembly: the pipeline strategy parses the store's `$facet` output,
//! the in-memory strategy accumulates the facets itself in one pass over
//! the rows. Everything derived (peak hours, daily statistics, trends)
//! is computed from the intermediate so the strategies cannot drift.

use chrono::Timelike;
use serde_json::{json, Map, Value};
use tally_core::num::{number_value, round_to};
use tally_core::{parse_datetime, AnalysisError, Document};

use crate::frame::require_columns;
use crate::service::{AnalysisPayload, AnalysisReport, AnalysisService};

/// Profiles event rows by user, action type, hour of day, and calendar day.
#[derive(Debug, Default)]
pub struct UserActivitySummary;

impl UserActivitySummary {
    pub const NAME: &'static str = "user_activity_summary";
}

/// Facet-shaped intermediate shared by both strategies.
struct Activity {
    total_actions: u64,
    total_users: u64,
    unique_action_types: u64,
    range_start: String,
    range_end: String,
    /// Per-action-type rows, busiest first
    by_action: Vec<Value>,
    /// Per-user rows, most active first
    per_user: Vec<Value>,
    /// (hour, actions) ascending by hour; silent hours absent
    hourly: Vec<(u32, u64)>,
    /// Per-day rows ascending by date
    daily: Vec<DailyRow>,
}

struct DailyRow {
    date: String,
    actions: u64,
    users: u64,
}

fn malformed(reason: impl Into<String>) -> AnalysisError {
    AnalysisError::MalformedResult {
        analysis: UserActivitySummary::NAME.to_string(),
        reason: reason.into(),
    }
}

/// The three busiest hours; ties resolve to the earlier hour.
fn peak_hours(hourly: &[(u32, u64)]) -> Value {
    let mut entries = hourly.to_vec();
    entries.sort_by(|a, b| b.1.cmp(&a.1));
    let top: Vec<Value> = entries
        .iter()
        .take(3)
        .map(|(hour, actions)| json!({ "hour": hour, "actions": actions }))
        .collect();
    Value::Array(top)
}

fn daily_statistics(daily: &[DailyRow]) -> Value {
    if daily.is_empty() {
        return Value::Null;
    }
    let days = daily.len() as f64;
    let total_actions: u64 = daily.iter().map(|day| day.actions).sum();
    let total_users: u64 = daily.iter().map(|day| day.users).sum();
    let max_actions = daily.iter().map(|day| day.actions).max().unwrap_or(0);
    let min_actions = daily.iter().map(|day| day.actions).min().unwrap_or(0);
    let max_users = daily.iter().map(|day| day.users).max().unwrap_or(0);
    let min_users = daily.iter().map(|day| day.users).min().unwrap_or(0);
    // First day hitting the maximum wins ties.
    let peak = daily.iter().find(|day| day.actions == max_actions);
    json!({
        "average_daily_actions": number_value(round_to(total_actions as f64 / days, 2)),
        "average_daily_users": number_value(round_to(total_users as f64 / days, 2)),
        "max_daily_actions": max_actions,
        "min_daily_actions": min_actions,
        "max_daily_users": max_users,
        "min_daily_users": min_users,
        "peak_day": peak.map(|day| json!({
            "date": day.date,
            "actions": day.actions,
            "users": day.users,
        })),
    })
}

fn half_average(days: &[DailyRow], pick: fn(&DailyRow) -> u64) -> f64 {
    if days.is_empty() {
        return 0.0;
    }
    days.iter().map(pick).sum::<u64>() as f64 / days.len() as f64
}

/// First-half versus second-half comparison; null below two days.
fn trends(daily: &[DailyRow]) -> Value {
    if daily.len() < 2 {
        return Value::Null;
    }
    let (first, second) = daily.split_at(daily.len() / 2);
    let first_actions = half_average(first, |day| day.actions);
    let second_actions = half_average(second, |day| day.actions);
    let first_users = half_average(first, |day| day.users);
    let second_users = half_average(second, |day| day.users);
    let trend = |later: f64, earlier: f64| {
        if later > earlier {
            "increasing"
        } else {
            "decreasing"
        }
    };
    json!({
        "first_half_avg_actions": number_value(round_to(first_actions, 2)),
        "second_half_avg_actions": number_value(round_to(second_actions, 2)),
        "first_half_avg_users": number_value(round_to(first_users, 2)),
        "second_half_avg_users": number_value(round_to(second_users, 2)),
        "action_trend": trend(second_actions, first_actions),
        "user_trend": trend(second_users, first_users),
    })
}

fn assemble(activity: Activity) -> AnalysisReport {
    let average_per_user = if activity.total_users == 0 {
        0.0
    } else {
        activity.total_actions as f64 / activity.total_users as f64
    };
    AnalysisReport {
        summary: json!({
            "total_actions": activity.total_actions,
            "total_users": activity.total_users,
            "unique_action_types": activity.unique_action_types,
            "average_actions_per_user": number_value(round_to(average_per_user, 2)),
            "date_range": { "start": activity.range_start, "end": activity.range_end },
            "peak_hours": peak_hours(&activity.hourly),
            "daily_statistics": daily_statistics(&activity.daily),
            "trends": trends(&activity.daily),
        }),
        top: activity.per_user.first().cloned(),
        bottom: activity.per_user.last().cloned(),
        by_group: activity.by_action,
    }
}

// === Facet output parsing ===

fn facet_rows<'a>(facet: &'a Document, name: &str) -> Result<&'a Vec<Value>, AnalysisError> {
    facet
        .get(name)
        .and_then(Value::as_array)
        .ok_or_else(|| malformed(format!("missing `{name}` facet")))
}

fn require_u64(entry: &Value, field: &str) -> Result<u64, AnalysisError> {
    entry
        .get(field)
        .and_then(Value::as_u64)
        .ok_or_else(|| malformed(format!("missing numeric `{field}`")))
}

fn require_str(entry: &Value, field: &str) -> Result<String, AnalysisError> {
    entry
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| malformed(format!("missing string `{field}`")))
}

impl AnalysisService for UserActivitySummary {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn needs_raw_rows(&self) -> bool {
        false
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
        require_columns(Self::NAME, rows, &["user_id", "action_type", "timestamp"])?;

        struct UserAcc {
            user: Value,
            count: u64,
            first: String,
            last: String,
            action_types: Vec<Value>,
        }
        struct ActionAcc {
            action: Value,
            count: u64,
            users: Vec<Value>,
        }
        struct DayAcc {
            date: String,
            actions: u64,
            users: Vec<Value>,
        }

        let mut users: Vec<UserAcc> = Vec::new();
        let mut actions: Vec<ActionAcc> = Vec::new();
        let mut days: Vec<DayAcc> = Vec::new();
        let mut hours = [0u64; 24];
        let mut range: Option<(String, String)> = None;

        for row in rows {
            let Some(timestamp) = row.get("timestamp").and_then(Value::as_str) else {
                return Err(AnalysisError::Failed {
                    analysis: Self::NAME.to_string(),
                    reason: "a row is missing its `timestamp` string".to_string(),
                });
            };
            let instant = parse_datetime(timestamp).ok_or_else(|| AnalysisError::Failed {
                analysis: Self::NAME.to_string(),
                reason: format!("unparseable timestamp `{timestamp}`"),
            })?;
            let user = row.get("user_id").cloned().unwrap_or(Value::Null);
            let action = row.get("action_type").cloned().unwrap_or(Value::Null);
            let date = instant.format("%Y-%m-%d").to_string();

            hours[instant.hour() as usize] += 1;
            // Lexicographic min/max, same as the store's string ordering.
            match &mut range {
                None => range = Some((timestamp.to_string(), timestamp.to_string())),
                Some((start, end)) => {
                    if timestamp < start.as_str() {
                        *start = timestamp.to_string();
                    }
                    if timestamp > end.as_str() {
                        *end = timestamp.to_string();
                    }
                }
            }

            match users.iter_mut().find(|acc| acc.user == user) {
                Some(acc) => {
                    acc.count += 1;
                    if timestamp < acc.first.as_str() {
                        acc.first = timestamp.to_string();
                    }
                    if timestamp > acc.last.as_str() {
                        acc.last = timestamp.to_string();
                    }
                    if !acc.action_types.contains(&action) {
                        acc.action_types.push(action.clone());
                    }
                }
                None => users.push(UserAcc {
                    user: user.clone(),
                    count: 1,
                    first: timestamp.to_string(),
                    last: timestamp.to_string(),
                    action_types: vec![action.clone()],
                }),
            }

            match actions.iter_mut().find(|acc| acc.action == action) {
                Some(acc) => {
                    acc.count += 1;
                    if !acc.users.contains(&user) {
                        acc.users.push(user.clone());
                    }
                }
                None => actions.push(ActionAcc {
                    action: action.clone(),
                    count: 1,
                    users: vec![user.clone()],
                }),
            }

            match days.iter_mut().find(|acc| acc.date == date) {
                Some(acc) => {
                    acc.actions += 1;
                    if !acc.users.contains(&user) {
                        acc.users.push(user.clone());
                    }
                }
                None => days.push(DayAcc {
                    date,
                    actions: 1,
                    users: vec![user.clone()],
                }),
            }
        }

        let Some((range_start, range_end)) = range else {
            return Ok(AnalysisPayload::NoData);
        };

        users.sort_by(|a, b| b.count.cmp(&a.count));
        actions.sort_by(|a, b| b.count.cmp(&a.count));
        days.sort_by(|a, b| a.date.cmp(&b.date));

        let activity = Activity {
            total_actions: rows.len() as u64,
            total_users: users.len() as u64,
            unique_action_types: actions.len() as u64,
            range_start,
            range_end,
            by_action: actions
                .iter()
                .map(|acc| {
                    json!({
                        "action_type": acc.action,
                        "total_actions": acc.count,
                        "unique_users": acc.users.len(),
                        "avg_per_user": number_value(round_to(
                            acc.count as f64 / acc.users.len() as f64,
                            2,
                        )),
                    })
                })
                .collect(),
            per_user: users
                .iter()
                .map(|acc| {
                    json!({
                        "user_id": acc.user,
                        "action_count": acc.count,
                        "first_action": acc.first,
                        "last_action": acc.last,
                        "unique_action_types": acc.action_types.len(),
                    })
                })
                .collect(),
            hourly: hours
                .iter()
                .enumerate()
                .filter(|(_, &count)| count > 0)
                .map(|(hour, &count)| (hour as u32, count))
                .collect(),
            daily: days
                .into_iter()
                .map(|acc| DailyRow {
                    date: acc.date,
                    actions: acc.actions,
                    users: acc.users.len() as u64,
                })
                .collect(),
        };

        Ok(AnalysisPayload::Report(assemble(activity)))
    }

    fn build_pipeline(
        &self,
        base_filter: &Value,
        _params: &Map<String, Value>,
    ) -> Result<Vec<Value>, AnalysisError> {
        Ok(vec![
            json!({ "$match": base_filter }),
            json!({ "$facet": {
                "summary": [
                    { "$group": {
                        "_id": null,
                        "total_actions": { "$sum": 1 },
                        "users": { "$addToSet": "$user_id" },
                        "action_types": { "$addToSet": "$action_type" },
                        "start": { "$min": "$timestamp" },
                        "end": { "$max": "$timestamp" },
                    }},
                    { "$project": {
                        "_id": 0,
                        "total_actions": 1,
                        "total_users": { "$size": "$users" },
                        "unique_action_types": { "$size": "$action_types" },
                        "date_range": { "start": "$start", "end": "$end" },
                    }},
                ],
                "by_action_type": [
                    { "$group": {
                        "_id": "$action_type",
                        "total_actions": { "$sum": 1 },
                        "users": { "$addToSet": "$user_id" },
                    }},
                    { "$project": {
                        "_id": 0,
                        "action_type": "$_id",
                        "total_actions": 1,
                        "unique_users": { "$size": "$users" },
                        "avg_per_user": { "$round": [
                            { "$divide": ["$total_actions", { "$size": "$users" }] },
                            2,
                        ]},
                    }},
                    { "$sort": { "total_actions": -1 } },
                ],
                "per_user": [
                    { "$group": {
                        "_id": "$user_id",
                        "action_count": { "$sum": 1 },
                        "first_action": { "$min": "$timestamp" },
                        "last_action": { "$max": "$timestamp" },
                        "action_types": { "$addToSet": "$action_type" },
                    }},
                    { "$project": {
                        "_id": 0,
                        "user_id": "$_id",
                        "action_count": 1,
                        "first_action": 1,
                        "last_action": 1,
                        "unique_action_types": { "$size": "$action_types" },
                    }},
                    { "$sort": { "action_count": -1 } },
                ],
                "hourly": [
                    { "$project": { "hour": { "$hour": "$timestamp" } } },
                    { "$group": { "_id": "$hour", "actions": { "$sum": 1 } } },
                    { "$sort": { "_id": 1 } },
                ],
                "daily": [
                    { "$project": {
                        "date": { "$dateToString": { "format": "%Y-%m-%d", "date": "$timestamp" } },
                        "user_id": 1,
                    }},
                    { "$group": {
                        "_id": "$date",
                        "actions": { "$sum": 1 },
                        "users": { "$addToSet": "$user_id" },
                    }},
                    { "$project": { "_id": 0, "date": "$_id", "actions": 1, "users": { "$size": "$users" } } },
                    { "$sort": { "date": 1 } },
                ],
            }}),
        ])
    }

    fn post_process(
        &self,
        rows: Vec<Document>,
        _params: &Map<String, Value>,
    ) -> Result<AnalysisPayload, AnalysisError> {
        let facet = rows
            .into_iter()
            .next()
            .ok_or_else(|| malformed("empty facet result"))?;

        let summary_rows = facet_rows(&facet, "summary")?;
        // An empty summary facet means the match stage passed nothing through.
        let Some(core) = summary_rows.first() else {
            return Ok(AnalysisPayload::NoData);
        };
        let date_range = core
            .get("date_range")
            .ok_or_else(|| malformed("missing `date_range`"))?;

        let mut hourly = Vec::new();
        for entry in facet_rows(&facet, "hourly")? {
            let hour = require_u64(entry, "_id")? as u32;
            hourly.push((hour, require_u64(entry, "actions")?));
        }

        let mut daily = Vec::new();
        for entry in facet_rows(&facet, "daily")? {
            daily.push(DailyRow {
                date: require_str(entry, "date")?,
                actions: require_u64(entry, "actions")?,
                users: require_u64(entry, "users")?,
            });
        }

        let activity = Activity {
            total_actions: require_u64(core, "total_actions")?,
            total_users: require_u64(core, "total_users")?,
            unique_action_types: require_u64(core, "unique_action_types")?,
            range_start: require_str(date_range, "start")?,
            range_end: require_str(date_range, "end")?,
            by_action: facet_rows(&facet, "by_action_type")?.clone(),
            per_user: facet_rows(&facet, "per_user")?.clone(),
            hourly,
            daily,
        };

        Ok(AnalysisPayload::Report(assemble(activity)))
    }
}

// =============================================================================
// TESTS
// =============================================================================
