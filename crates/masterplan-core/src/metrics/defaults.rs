//! Typical metric seeds per campaign objective.
//!
//! Generated campaigns frequently omit costs or rates. Before reconciliation
//! the gaps are filled with seeds for the campaign's objective so that the
//! derived volumes are plausible instead of zero.

use super::{CampaignMetrics, PurchaseUnit};

/// Default metrics for one campaign objective.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectiveSeed {
    pub purchase_unit: PurchaseUnit,
    /// Cost for the seed's purchase unit (cpc or cpm).
    pub cost: f64,
    /// Percentages, 0-100.
    pub ctr: f64,
    pub conversion_rate: f64,
    pub connect_rate: f64,
}

const AWARENESS: ObjectiveSeed = ObjectiveSeed {
    purchase_unit: PurchaseUnit::PerMille,
    cost: 12.0,
    ctr: 0.8,
    conversion_rate: 0.5,
    connect_rate: 70.0,
};

const CONSIDERATION: ObjectiveSeed = ObjectiveSeed {
    purchase_unit: PurchaseUnit::PerClick,
    cost: 1.2,
    ctr: 1.5,
    conversion_rate: 2.0,
    connect_rate: 80.0,
};

const TRAFFIC: ObjectiveSeed = ObjectiveSeed {
    purchase_unit: PurchaseUnit::PerClick,
    cost: 0.9,
    ctr: 1.8,
    conversion_rate: 1.5,
    connect_rate: 75.0,
};

const CONVERSION: ObjectiveSeed = ObjectiveSeed {
    purchase_unit: PurchaseUnit::PerClick,
    cost: 2.5,
    ctr: 2.0,
    conversion_rate: 4.0,
    connect_rate: 85.0,
};

const RETARGETING: ObjectiveSeed = ObjectiveSeed {
    purchase_unit: PurchaseUnit::PerClick,
    cost: 1.8,
    ctr: 2.5,
    conversion_rate: 6.0,
    connect_rate: 90.0,
};

/// Look up the seed for a campaign type (case-insensitive, pt-BR or English).
pub fn seed_for(campaign_type: &str) -> Option<&'static ObjectiveSeed> {
    match campaign_type.trim().to_lowercase().as_str() {
        "awareness" | "reconhecimento" | "alcance" | "reach" => Some(&AWARENESS),
        "consideration" | "consideração" | "consideracao" | "engajamento" | "engagement" => {
            Some(&CONSIDERATION)
        }
        "traffic" | "tráfego" | "trafego" => Some(&TRAFFIC),
        "conversion" | "conversão" | "conversao" | "leads" | "vendas" | "sales" => {
            Some(&CONVERSION)
        }
        "retargeting" | "remarketing" => Some(&RETARGETING),
        _ => None,
    }
}

impl CampaignMetrics {
    /// Fill unset fields from `seed`. Supplied values always win, and the
    /// seed cost is only used when neither cpc nor cpm was supplied.
    pub fn seeded_with(mut self, seed: &ObjectiveSeed) -> Self {
        if self.purchase_unit.is_none() {
            self.purchase_unit = Some(seed.purchase_unit);
        }
        if self.cpc <= 0.0 && self.cpm <= 0.0 {
            match seed.purchase_unit {
                PurchaseUnit::PerClick => self.cpc = seed.cost,
                PurchaseUnit::PerMille => self.cpm = seed.cost,
            }
        }
        if self.ctr <= 0.0 {
            self.ctr = seed.ctr;
        }
        if self.conversion_rate <= 0.0 {
            self.conversion_rate = seed.conversion_rate;
        }
        if self.connect_rate <= 0.0 {
            self.connect_rate = seed.connect_rate;
        }
        self
    }
}

/// Apply the objective seed for `campaign_type`, if one exists.
pub fn apply_objective_defaults(metrics: &CampaignMetrics, campaign_type: &str) -> CampaignMetrics {
    match seed_for(campaign_type) {
        Some(seed) => metrics.clone().seeded_with(seed),
        None => metrics.clone(),
    }
}
