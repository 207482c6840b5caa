//! `masterplan extract` command: show the constraints found in a prompt.

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use serde::Serialize;

use masterplan_core::extract::{
    ExtractorConfig, PlanConstraints, extract_constraints, resolve_constraints,
};
use masterplan_core::generate::bucket_targets;
use masterplan_core::period::MonthKey;

/// Constraints for a prompt plus the per-month budget targets they imply.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractReport {
    /// False when nothing was found and defaults were applied.
    pub explicit: bool,
    pub constraints: PlanConstraints,
    pub buckets: Vec<BucketTarget>,
}

#[derive(Debug, Serialize)]
pub struct BucketTarget {
    pub month: MonthKey,
    pub budget: f64,
}

pub fn extract_report(prompt: &str, today: NaiveDate, config: &ExtractorConfig) -> ExtractReport {
    let found = extract_constraints(prompt, today, config);
    let explicit = found.is_some();
    let constraints = match found {
        Some(constraints) => constraints,
        None => resolve_constraints(prompt, today, config),
    };
    let buckets = bucket_targets(&constraints)
        .into_iter()
        .map(|(month, budget)| BucketTarget { month, budget })
        .collect();

    ExtractReport {
        explicit,
        constraints,
        buckets,
    }
}

/// Run the extract command.
pub fn run_extract(prompt: &str, today: Option<NaiveDate>, config: &ExtractorConfig) -> Result<()> {
    let today = today.unwrap_or_else(|| Utc::now().date_naive());
    let report = extract_report(prompt, today, config);
    let json = serde_json::to_string_pretty(&report).context("failed to serialize constraints")?;
    println!("{json}");
    Ok(())
}
