//! End-to-end plan creation: free text in, reconciled [`PlanData`] out.
//!
//! ```text
//! resolve_constraints -> bucket_targets -> generate_plan -> conserve_budget
//!     -> per campaign: objective defaults + reconcile -> PlanData
//! ```
//!
//! [`PlanPipeline::regenerate`] runs the same steps and writes the result
//! into an existing plan instead of a new one.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::channels::ChannelFormatTable;
use crate::extract::{ExtractorConfig, PlanConstraints, resolve_constraints};
use crate::generate::{
    CampaignDraft, GeneratedPlanDraft, GenerationError, RetryPolicy, bucket_targets,
    conserve_budget, generate_plan,
};
use crate::metrics::{apply_objective_defaults, reconcile};
use crate::period::MonthKey;
use crate::plan::{Campaign, PlanData};
use crate::service::{GenerationService, Language};

/// Name given to generated plans the model left unnamed.
pub const DEFAULT_PLAN_NAME: &str = "Novo Plano (IA)";

/// Everything needed to turn a request into a plan.
#[derive(Clone)]
pub struct PlanPipeline {
    service: Arc<dyn GenerationService>,
    table: ChannelFormatTable,
    extractor: ExtractorConfig,
    policy: RetryPolicy,
    language: Language,
}

impl PlanPipeline {
    pub fn new(service: Arc<dyn GenerationService>) -> Self {
        Self {
            service,
            table: ChannelFormatTable::default(),
            extractor: ExtractorConfig::default(),
            policy: RetryPolicy::default(),
            language: Language::default(),
        }
    }

    pub fn with_table(mut self, table: ChannelFormatTable) -> Self {
        self.table = table;
        self
    }

    pub fn with_extractor(mut self, extractor: ExtractorConfig) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    pub fn service(&self) -> &dyn GenerationService {
        self.service.as_ref()
    }

    pub fn table(&self) -> &ChannelFormatTable {
        &self.table
    }

    pub fn extractor(&self) -> &ExtractorConfig {
        &self.extractor
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Generate, rebalance and reconcile a plan for `prompt`.
    pub async fn run(
        &self,
        prompt: &str,
        owner_id: &str,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<PlanData, GenerationError> {
        let (constraints, draft) = self.balanced_draft(prompt, now, cancel).await?;
        Ok(assemble_plan(draft, &constraints, prompt, owner_id, now))
    }

    /// Generate fresh buckets for `existing` from a new `prompt`.
    ///
    /// The plan keeps its id, owner, name, visibility and creation time; its
    /// months are replaced. On failure `existing` is untouched.
    pub async fn regenerate(
        &self,
        existing: &PlanData,
        prompt: &str,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<PlanData, GenerationError> {
        tracing::info!(plan_id = %existing.id, "regenerating plan");
        let (constraints, draft) = self.balanced_draft(prompt, now, cancel).await?;
        Ok(regenerate_plan(existing, draft, &constraints, prompt))
    }

    async fn balanced_draft(
        &self,
        prompt: &str,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<(PlanConstraints, GeneratedPlanDraft), GenerationError> {
        let constraints = resolve_constraints(prompt, now.date_naive(), &self.extractor);
        let targets = bucket_targets(&constraints);

        let mut draft = generate_plan(
            self.service.as_ref(),
            prompt,
            &constraints,
            self.language,
            &self.table,
            &self.policy,
            cancel,
        )
        .await?;

        let rebalanced = conserve_budget(&mut draft, &targets);
        if rebalanced > 0 {
            tracing::info!(buckets = rebalanced, "generated budgets rebalanced to targets");
        }
        Ok((constraints, draft))
    }
}

impl std::fmt::Debug for PlanPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanPipeline")
            .field("service", &self.service.name())
            .field("language", &self.language)
            .field("policy", &self.policy)
            .finish()
    }
}

/// Seed a drafted campaign with its objective's defaults and reconcile it.
pub fn finish_campaign(draft: CampaignDraft) -> Campaign {
    let seeded = apply_objective_defaults(&draft.metrics, &draft.campaign_type);
    Campaign {
        id: Uuid::new_v4(),
        name: draft.name,
        campaign_type: draft.campaign_type,
        channel: draft.channel,
        format: draft.format,
        metrics: reconcile(&seeded, None),
    }
}

/// Fold a rebalanced draft into a plan owned by `owner_id`.
pub fn assemble_plan(
    draft: GeneratedPlanDraft,
    constraints: &PlanConstraints,
    prompt: &str,
    owner_id: &str,
    now: DateTime<Utc>,
) -> PlanData {
    let meta = draft.meta;
    let mut plan = PlanData::new_empty(owner_id, now);

    plan.campaign_name = match meta.campaign_name.trim() {
        "" => DEFAULT_PLAN_NAME.to_string(),
        name => name.to_string(),
    };
    plan.objective = meta.objective;
    plan.target_audience = meta.target_audience;
    plan.location = meta.location;
    plan.total_investment = constraints.total_budget;
    plan.ai_prompt = Some(prompt.to_string());
    plan.ai_image_prompt = Some(meta.ai_image_prompt).filter(|p| !p.trim().is_empty());
    plan.months = finish_months(draft.months);
    plan
}

/// Replace the months of `existing` with a rebalanced draft.
///
/// Descriptive fields the model left blank keep their previous values.
pub fn regenerate_plan(
    existing: &PlanData,
    draft: GeneratedPlanDraft,
    constraints: &PlanConstraints,
    prompt: &str,
) -> PlanData {
    let meta = draft.meta;
    let mut plan = existing.clone();

    if plan.campaign_name.trim().is_empty() {
        plan.campaign_name = match meta.campaign_name.trim() {
            "" => DEFAULT_PLAN_NAME.to_string(),
            name => name.to_string(),
        };
    }
    replace_unless_blank(&mut plan.objective, meta.objective);
    replace_unless_blank(&mut plan.target_audience, meta.target_audience);
    replace_unless_blank(&mut plan.location, meta.location);
    if !meta.ai_image_prompt.trim().is_empty() {
        plan.ai_image_prompt = Some(meta.ai_image_prompt);
    }
    plan.total_investment = constraints.total_budget;
    plan.ai_prompt = Some(prompt.to_string());
    plan.months = finish_months(draft.months);
    plan
}

fn replace_unless_blank(field: &mut String, generated: String) {
    if !generated.trim().is_empty() {
        *field = generated;
    }
}

fn finish_months(
    months: BTreeMap<MonthKey, Vec<CampaignDraft>>,
) -> BTreeMap<MonthKey, Vec<Campaign>> {
    months
        .into_iter()
        .map(|(key, campaigns)| (key, campaigns.into_iter().map(finish_campaign).collect()))
        .collect()
}
