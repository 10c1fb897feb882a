//! Query executor: scan, admit, aggregate, group, paginate.
//!
//! Runs a parsed plan against the LSM tree's `scan()` merged view. Each
//! aggregate function is a variant of a closed `AggFunc` enum rather than
//! a string dispatched at call time.

use crate::error::{LsmError, Result};
use crate::lsm::LsmTree;
use crate::query::parser::{AggFunc, Plan, SelectItem, TimeRange};
use crate::record::Record;
use chrono::DateTime;
use serde_json::{Map, Value};
use tracing::warn;

/// The executor's output: either bare rows, a single aggregated row, or
/// one row per GROUP BY partition.
#[derive(Debug)]
pub enum QueryOutcome {
    Rows(Vec<Record>),
    Aggregate(Map<String, Value>),
    Groups(Vec<GroupResult>),
}

#[derive(Debug)]
pub struct GroupResult {
    pub group: Map<String, Value>,
    /// The group's aggregate mapping, or its admitted records unchanged
    /// when the SELECT list has no aggregate items.
    pub results: Value,
}

fn parse_time_to_nanos(s: &str) -> Result<i64> {
    let dt = DateTime::parse_from_rfc3339(s)
        .map_err(|_| LsmError::MalformedQuery(format!("invalid ISO-8601 timestamp: {s}")))?;
    Ok(dt.timestamp() * 1_000_000_000 + dt.timestamp_subsec_nanos() as i64)
}

fn time_range_ns(range: &TimeRange) -> Result<(i64, i64)> {
    Ok((parse_time_to_nanos(&range.start)?, parse_time_to_nanos(&range.end)?))
}

/// Scan phase admission test: does this record match the plan's FROM,
/// WHERE, and TIME RANGE?
fn admits(record: &Record, plan: &Plan, range_ns: Option<(i64, i64)>) -> bool {
    if record.measurement != plan.from {
        return false;
    }

    for cond in &plan.where_clauses {
        let Some((key, raw_value)) = cond.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = raw_value.trim().trim_matches(|c| c == '\'' || c == '"');
        match record.lookup(key) {
            Some(actual) if actual == value => {}
            _ => return false,
        }
    }

    if let Some((start, end)) = range_ns {
        if record.timestamp < start || record.timestamp > end {
            return false;
        }
    }

    true
}

fn aggregate_items(plan: &Plan) -> Vec<SelectItem> {
    plan.select
        .iter()
        .map(|s| SelectItem::parse(s))
        .filter(|item| matches!(item, SelectItem::Aggregate { .. }))
        .collect()
}

fn is_pure_non_aggregate(plan: &Plan) -> bool {
    plan.select.is_empty() || aggregate_items(plan).is_empty()
}

fn coerce_numeric(record: &Record, field: &str) -> f64 {
    record.numeric_field(field).unwrap_or(0.0)
}

/// Compute one aggregation value over `records`.
fn compute_aggregate(records: &[&Record], func: AggFunc, field: &str) -> Value {
    match func {
        AggFunc::Count => Value::from(records.len()),
        AggFunc::Sum => Value::from(records.iter().map(|r| coerce_numeric(r, field)).sum::<f64>()),
        AggFunc::Avg => {
            if records.is_empty() {
                Value::from(0.0)
            } else {
                let sum: f64 = records.iter().map(|r| coerce_numeric(r, field)).sum();
                Value::from(sum / records.len() as f64)
            }
        }
        AggFunc::Min => records
            .iter()
            .map(|r| coerce_numeric(r, field))
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.min(v))))
            .map(Value::from)
            .unwrap_or(Value::Null),
        AggFunc::Max => records
            .iter()
            .map(|r| coerce_numeric(r, field))
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
            .map(Value::from)
            .unwrap_or(Value::Null),
    }
}

/// Build the single-row aggregation mapping keyed by SELECT expression text.
fn aggregate_row(records: &[&Record], plan: &Plan) -> Map<String, Value> {
    let mut out = Map::new();
    for item in aggregate_items(plan) {
        if let SelectItem::Aggregate { func, field, text } = item {
            out.insert(text, compute_aggregate(records, func, &field));
        }
    }
    out
}

fn group_key(record: &Record, group_by: &[String]) -> Vec<String> {
    group_by
        .iter()
        .map(|tag| record.tags.get(tag).cloned().unwrap_or_default())
        .collect()
}

/// Run a parsed plan against the LSM tree's merged view.
pub fn execute(tree: &LsmTree, plan: &Plan) -> Result<QueryOutcome> {
    let range_ns = match &plan.time_range {
        Some(r) => Some(time_range_ns(r)?),
        None => None,
    };

    let entries = tree.scan()?;
    let mut admitted = Vec::with_capacity(entries.len());
    for (_key, value) in entries {
        match Record::from_json_bytes(&value) {
            Ok(record) => {
                if admits(&record, plan, range_ns) {
                    admitted.push(record);
                }
            }
            Err(e) => {
                // A bad record is skipped, never aborts the query.
                warn!(error = %e, "skipping unreadable record during query scan");
            }
        }
    }

    let outcome = if !plan.group_by.is_empty() {
        let mut groups: Vec<(Vec<String>, Vec<Record>)> = Vec::new();
        for record in admitted {
            let key = group_key(&record, &plan.group_by);
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, recs)) => recs.push(record),
                None => groups.push((key, vec![record])),
            }
        }

        let results = groups
            .into_iter()
            .map(|(key, recs)| {
                let refs: Vec<&Record> = recs.iter().collect();
                let mut group = Map::new();
                for (tag, value) in plan.group_by.iter().zip(key.iter()) {
                    group.insert(tag.clone(), Value::from(value.clone()));
                }
                let results = if is_pure_non_aggregate(plan) {
                    serde_json::to_value(&recs).unwrap_or(Value::Array(vec![]))
                } else {
                    Value::Object(aggregate_row(&refs, plan))
                };
                GroupResult { group, results }
            })
            .collect();

        QueryOutcome::Groups(results)
    } else if is_pure_non_aggregate(plan) {
        QueryOutcome::Rows(admitted)
    } else {
        let refs: Vec<&Record> = admitted.iter().collect();
        QueryOutcome::Aggregate(aggregate_row(&refs, plan))
    };

    Ok(paginate(outcome, plan))
}

/// OFFSET then LIMIT over the final sequence. Aggregation results are
/// single rows and are not paginated; rows and groups are.
fn paginate(outcome: QueryOutcome, plan: &Plan) -> QueryOutcome {
    let offset = plan.offset.unwrap_or(0);
    match outcome {
        QueryOutcome::Rows(rows) => {
            let paged = apply_window(rows, offset, plan.limit);
            QueryOutcome::Rows(paged)
        }
        QueryOutcome::Groups(groups) => {
            let paged = apply_window(groups, offset, plan.limit);
            QueryOutcome::Groups(paged)
        }
        other => other,
    }
}

fn apply_window<T>(items: Vec<T>, offset: usize, limit: Option<usize>) -> Vec<T> {
    let skipped: Vec<T> = items.into_iter().skip(offset).collect();
    match limit {
        Some(n) => skipped.into_iter().take(n).collect(),
        None => skipped,
    }
}

/// Render an outcome into the JSON body the storage HTTP surface returns:
/// an array for rows/groups, a single object for a pure-aggregate query.
pub fn outcome_to_json(outcome: QueryOutcome) -> Value {
    match outcome {
        QueryOutcome::Rows(rows) => serde_json::to_value(rows).unwrap_or(Value::Array(vec![])),
        QueryOutcome::Aggregate(map) => Value::Object(map),
        QueryOutcome::Groups(groups) => Value::Array(
            groups
                .into_iter()
                .map(|g| {
                    let mut row = Map::new();
                    row.insert("group".to_string(), Value::Object(g.group));
                    row.insert("results".to_string(), g.results);
                    Value::Object(row)
                })
                .collect(),
        ),
    }
}
