//! Plan and campaign records as persisted and served.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::metrics::CampaignMetrics;
use crate::period::MonthKey;

/// A reconciled campaign inside a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub campaign_type: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub format: String,
    #[serde(flatten)]
    pub metrics: CampaignMetrics,
}

/// A complete media plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanData {
    pub id: Uuid,
    /// Opaque id of the user who owns the plan.
    pub owner_id: String,
    #[serde(default)]
    pub campaign_name: String,
    #[serde(default)]
    pub objective: String,
    #[serde(default)]
    pub target_audience: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub total_investment: f64,
    /// The free-text request the plan was generated from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_image_prompt: Option<String>,
    #[serde(default)]
    pub months: BTreeMap<MonthKey, Vec<Campaign>>,
    #[serde(default)]
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
}

impl PlanData {
    /// An empty plan with a fresh id.
    pub fn new_empty(owner_id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.into(),
            campaign_name: String::new(),
            objective: String::new(),
            target_audience: String::new(),
            location: String::new(),
            total_investment: 0.0,
            ai_prompt: None,
            ai_image_prompt: None,
            months: BTreeMap::new(),
            is_public: false,
            created_at,
        }
    }

    /// Every campaign in chronological bucket order.
    pub fn campaigns(&self) -> impl Iterator<Item = &Campaign> {
        self.months.values().flatten()
    }

    /// Sum of all campaign budgets.
    pub fn planned_budget(&self) -> f64 {
        self.campaigns().map(|c| c.metrics.budget).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PlanData {
        let mut plan = PlanData::new_empty("user-1", Utc::now());
        plan.campaign_name = "Verão".into();
        plan.months.insert(
            MonthKey::new(2026, 1),
            vec![Campaign {
                id: Uuid::new_v4(),
                name: "Busca".into(),
                campaign_type: "Conversion".into(),
                channel: "Google Ads".into(),
                format: "Search".into(),
                metrics: CampaignMetrics {
                    budget: 1500.0,
                    cpc: 2.0,
                    ..Default::default()
                },
            }],
        );
        plan
    }

    #[test]
    fn empty_plan_defaults() {
        let plan = PlanData::new_empty("owner", Utc::now());
        assert_eq!(plan.owner_id, "owner");
        assert!(plan.months.is_empty());
        assert!(!plan.is_public);
        assert_eq!(plan.planned_budget(), 0.0);
    }

    #[test]
    fn json_shape_is_flat_and_camel_case() {
        let plan = sample();
        let json = serde_json::to_value(&plan).unwrap();
        assert_eq!(json["campaignName"], "Verão");
        assert_eq!(json["ownerId"], "user-1");
        assert!(json.get("aiPrompt").is_none());

        let campaign = &json["months"]["2026-Fevereiro"][0];
        assert_eq!(campaign["channel"], "Google Ads");
        assert_eq!(campaign["budget"], 1500.0);
        assert_eq!(campaign["campaignType"], "Conversion");
    }

    #[test]
    fn json_roundtrip() {
        let plan = sample();
        let json = serde_json::to_string(&plan).unwrap();
        let back: PlanData = serde_json::from_str(&json).unwrap();
        assert_eq!(back, plan);
        assert_eq!(back.planned_budget(), 1500.0);
    }
}
