//! `masterplan reconcile` command: complete a partial metrics record.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use masterplan_core::metrics::{CampaignMetrics, PurchaseUnit, apply_objective_defaults, reconcile};

#[derive(Debug, Default, Args)]
pub struct ReconcileArgs {
    /// JSON file with a partial metrics record (flags override its fields)
    #[arg(long)]
    pub file: Option<PathBuf>,
    /// Campaign budget
    #[arg(long)]
    pub budget: Option<f64>,
    /// Purchase unit: cpc or cpm
    #[arg(long)]
    pub unit: Option<PurchaseUnit>,
    /// Cost per click
    #[arg(long)]
    pub cpc: Option<f64>,
    /// Cost per thousand impressions
    #[arg(long)]
    pub cpm: Option<f64>,
    /// Click-through rate, in percent
    #[arg(long)]
    pub ctr: Option<f64>,
    /// Conversion rate, in percent
    #[arg(long)]
    pub conversion_rate: Option<f64>,
    /// Connect rate, in percent
    #[arg(long)]
    pub connect_rate: Option<f64>,
    #[arg(long)]
    pub impressions: Option<u64>,
    #[arg(long)]
    pub clicks: Option<u64>,
    /// Campaign type whose typical metrics fill unset fields (e.g. Conversion)
    #[arg(long)]
    pub objective: Option<String>,
}

impl ReconcileArgs {
    /// Build the partial record from the file (if any) and the flags.
    pub fn partial(&self) -> Result<CampaignMetrics> {
        let mut metrics = match &self.file {
            Some(path) => {
                let contents = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                serde_json::from_str(&contents)
                    .with_context(|| format!("failed to parse metrics JSON in {}", path.display()))?
            }
            None => CampaignMetrics::default(),
        };

        if let Some(v) = self.budget {
            metrics.budget = v;
        }
        if let Some(v) = self.unit {
            metrics.purchase_unit = Some(v);
        }
        if let Some(v) = self.cpc {
            metrics.cpc = v;
        }
        if let Some(v) = self.cpm {
            metrics.cpm = v;
        }
        if let Some(v) = self.ctr {
            metrics.ctr = v;
        }
        if let Some(v) = self.conversion_rate {
            metrics.conversion_rate = v;
        }
        if let Some(v) = self.connect_rate {
            metrics.connect_rate = v;
        }
        if let Some(v) = self.impressions {
            metrics.impressions = v;
        }
        if let Some(v) = self.clicks {
            metrics.clicks = v;
        }
        Ok(metrics)
    }
}

/// Seed from the objective (when given), then reconcile.
pub fn reconcile_with_objective(
    partial: &CampaignMetrics,
    objective: Option<&str>,
    unit: Option<PurchaseUnit>,
) -> CampaignMetrics {
    match objective {
        Some(objective) => reconcile(&apply_objective_defaults(partial, objective), unit),
        None => reconcile(partial, unit),
    }
}

/// Run the reconcile command.
pub fn run_reconcile(args: &ReconcileArgs) -> Result<()> {
    let partial = args.partial()?;
    let reconciled = reconcile_with_objective(&partial, args.objective.as_deref(), None);
    let json = serde_json::to_string_pretty(&reconciled).context("failed to serialize metrics")?;
    println!("{json}");
    Ok(())
}
