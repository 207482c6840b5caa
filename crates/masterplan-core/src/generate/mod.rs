//! Plan generation: from a request and its constraints to a validated draft.
//!
//! ```text
//! constraints --bucket_targets--> [(MonthKey, budget)]
//!      |                                  |
//!      '--------- build_plan_prompt <-----'
//!                        |
//!        call_with_retry(service)   (transient failures retried)
//!                        |
//!               parse_plan_response
//!                        |
//!                  align_buckets       (unrequested months dropped)
//!                        |
//!                 repair_formats       --> GeneratedPlanDraft
//! ```
//!
//! Budget conservation ([`conserve_budget`]) is a separate step run by the
//! caller once the draft is returned.

pub mod buckets;
pub mod conserve;
pub mod error;
pub mod prompt;
pub mod response;
pub mod retry;

use tokio_util::sync::CancellationToken;

use crate::channels::ChannelFormatTable;
use crate::extract::PlanConstraints;
use crate::service::{GenerationRequest, GenerationService, Language};

pub use buckets::{bucket_budgets, bucket_targets};
pub use conserve::conserve_budget;
pub use error::{FailureCategory, GenerationError};
pub use prompt::build_plan_prompt;
pub use response::{CampaignDraft, DraftMeta, GeneratedPlanDraft, parse_plan_response};
pub use retry::{RetryPolicy, call_with_retry};

/// Generate a plan draft for `user_prompt` within `constraints`.
///
/// On success the draft holds exactly the requested buckets, none empty, and
/// every campaign's format is valid for its channel. No partial draft is
/// returned on failure.
pub async fn generate_plan(
    service: &dyn GenerationService,
    user_prompt: &str,
    constraints: &PlanConstraints,
    language: Language,
    table: &ChannelFormatTable,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> Result<GeneratedPlanDraft, GenerationError> {
    let targets = bucket_targets(constraints);
    let prompt = build_plan_prompt(user_prompt, constraints, &targets, language, table);

    tracing::info!(
        service = service.name(),
        months = constraints.month_count,
        total_budget = constraints.total_budget,
        %language,
        "requesting plan generation"
    );

    let text = call_with_retry(
        service,
        &GenerationRequest::json(prompt, language),
        policy,
        cancel,
    )
    .await?;

    let mut draft = parse_plan_response(&text).inspect_err(|err| {
        tracing::warn!(error = %err, "generated plan rejected");
    })?;
    let dropped = draft
        .align_buckets(&constraints.bucket_keys())
        .inspect_err(|err| tracing::warn!(error = %err, "generated plan rejected"))?;
    let repaired = draft.repair_formats(table);

    tracing::info!(
        buckets = draft.months.len(),
        campaigns = draft.campaign_count(),
        dropped_buckets = dropped.len(),
        repaired_formats = repaired,
        "plan draft generated"
    );
    Ok(draft)
}
