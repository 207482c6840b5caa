//! Aggregate figures over a set of campaigns.

use std::collections::BTreeMap;

use serde::Serialize;

use super::model::{Campaign, PlanData};
use crate::metrics::safe_div;
use crate::period::MonthKey;

/// Channel label used for campaigns without one.
pub const UNLABELLED_CHANNEL: &str = "Outros";

/// Totals and blended rates for a group of campaigns.
///
/// Rates are percentages; zero denominators give zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryData {
    pub budget: f64,
    pub impressions: u64,
    pub clicks: u64,
    pub conversions: u64,
    pub visits: u64,
    pub leads: u64,
    pub channel_budgets: BTreeMap<String, f64>,
    pub ctr: f64,
    pub cpc: f64,
    pub cpm: f64,
    pub cpa: f64,
    pub conversion_rate: f64,
}

/// Overall summary plus one per month.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanSummary {
    pub summary: SummaryData,
    pub monthly: BTreeMap<MonthKey, SummaryData>,
}

pub fn summarize_campaigns<'a>(campaigns: impl IntoIterator<Item = &'a Campaign>) -> SummaryData {
    let mut s = SummaryData::default();

    for campaign in campaigns {
        let m = &campaign.metrics;
        let budget = if m.budget.is_finite() { m.budget.max(0.0) } else { 0.0 };
        s.budget += budget;
        s.impressions += m.impressions;
        s.clicks += m.clicks;
        s.conversions += m.conversions;
        s.visits += m.visits;
        s.leads += m.leads;

        let channel = match campaign.channel.trim() {
            "" => UNLABELLED_CHANNEL,
            name => name,
        };
        *s.channel_budgets.entry(channel.to_string()).or_default() += budget;
    }

    s.ctr = safe_div(s.clicks as f64, s.impressions as f64) * 100.0;
    s.cpc = safe_div(s.budget, s.clicks as f64);
    s.cpm = safe_div(s.budget, s.impressions as f64) * 1000.0;
    s.cpa = safe_div(s.budget, s.conversions as f64);
    s.conversion_rate = safe_div(s.conversions as f64, s.clicks as f64) * 100.0;
    s
}

pub fn summarize_plan(plan: &PlanData) -> PlanSummary {
    PlanSummary {
        summary: summarize_campaigns(plan.campaigns()),
        monthly: plan
            .months
            .iter()
            .map(|(key, campaigns)| (*key, summarize_campaigns(campaigns)))
            .collect(),
    }
}
