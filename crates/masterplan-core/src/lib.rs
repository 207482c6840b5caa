//! Core library for masterplan: campaign metrics reconciliation, planning
//! constraint extraction, channel/format validation, and AI plan generation.
//!
//! # Data flow
//!
//! ```text
//! prompt --extract--> PlanConstraints --generate_plan--> GeneratedPlanDraft
//!                                              |
//!                      GenerationService <-----+ (retry on transient failure)
//!                                              |
//!            validate_format (per campaign) <--+
//!                                              v
//!                 conserve_budget --> reconcile (per campaign) --> PlanData
//! ```

pub mod channels;
pub mod creative;
pub mod extract;
pub mod generate;
pub mod keywords;
pub mod metrics;
pub mod period;
pub mod pipeline;
pub mod plan;
pub mod service;
pub mod units;

pub use channels::{ChannelFormatTable, validate_format};
pub use extract::{ExtractorConfig, PlanConstraints, extract_constraints, resolve_constraints};
pub use generate::{GeneratedPlanDraft, GenerationError, RetryPolicy, generate_plan};
pub use metrics::{CampaignMetrics, PurchaseUnit, reconcile};
pub use service::{CallOutcome, GenerationService};
