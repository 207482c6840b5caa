//! Per-month budget targets.

use crate::extract::PlanConstraints;
use crate::period::MonthKey;

/// Split `total` into `count` buckets whose sum is exactly `total`.
///
/// Every bucket but the last gets the rounded even share; the last one
/// absorbs the remainder. When rounding up would overshoot the total (tiny
/// totals over many buckets) the share is rounded down instead, so no
/// bucket is ever negative.
pub fn bucket_budgets(total: f64, count: u32) -> Vec<f64> {
    if count == 0 {
        return Vec::new();
    }
    let total = if total.is_finite() && total > 0.0 { total } else { 0.0 };
    let n = count as usize;
    let even = total / count as f64;

    let mut share = even.round();
    if share * (n - 1) as f64 > total {
        share = even.floor();
    }

    let mut budgets = vec![share; n - 1];
    let allocated: f64 = budgets.iter().sum();
    budgets.push(total - allocated);
    budgets
}

/// Bucket keys paired with their budget targets.
pub fn bucket_targets(constraints: &PlanConstraints) -> Vec<(MonthKey, f64)> {
    let keys = constraints.bucket_keys();
    let budgets = bucket_budgets(constraints.total_budget, keys.len() as u32);
    keys.into_iter().zip(budgets).collect()
}
