//! Budget conservation: make each bucket's campaigns add up to its target.

use super::response::GeneratedPlanDraft;
use crate::metrics::CampaignMetrics;
use crate::period::MonthKey;

/// Differences below this are treated as rounding noise.
const TOLERANCE: f64 = 0.005;

/// Rebalance the draft so every bucket sums to its target.
///
/// The bucket's last campaign absorbs the difference. If that would drive
/// it negative, the other campaigns are scaled down to the target (rounded
/// down to whole units) and the last one takes what is left. Buckets that
/// are missing or empty are left alone. Volumes of campaigns whose budget
/// changed are cleared so reconciliation derives them again.
///
/// Returns the number of buckets adjusted.
pub fn conserve_budget(draft: &mut GeneratedPlanDraft, targets: &[(MonthKey, f64)]) -> usize {
    let mut adjusted = 0;

    for (key, target) in targets {
        let Some(campaigns) = draft.months.get_mut(key) else {
            continue;
        };
        let Some((last, others)) = campaigns.split_last_mut() else {
            continue;
        };

        let others_total: f64 = others.iter().map(|c| c.metrics.budget).sum();
        let current = others_total + last.metrics.budget;
        let difference = target - current;
        if difference.abs() < TOLERANCE {
            continue;
        }

        let absorbed = target - others_total;
        if absorbed >= 0.0 {
            last.metrics.budget = absorbed;
            clear_volumes(&mut last.metrics);
        } else {
            let factor = target / current;
            let mut scaled_total = 0.0;
            for campaign in others.iter_mut() {
                campaign.metrics.budget = (campaign.metrics.budget * factor).floor();
                clear_volumes(&mut campaign.metrics);
                scaled_total += campaign.metrics.budget;
            }
            last.metrics.budget = (target - scaled_total).max(0.0);
            clear_volumes(&mut last.metrics);
        }

        tracing::info!(
            month = %key,
            target = *target,
            generated = current,
            "rebalanced bucket budget"
        );
        adjusted += 1;
    }

    adjusted
}

fn clear_volumes(metrics: &mut CampaignMetrics) {
    metrics.impressions = 0;
    metrics.clicks = 0;
    metrics.conversions = 0;
    metrics.visits = 0;
    metrics.leads = 0;
}
