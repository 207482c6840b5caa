//! Finished plans: the stored model, aggregate summaries, and the store
//! interface plans are handed to.

pub mod model;
pub mod store;
pub mod summary;

pub use model::{Campaign, PlanData};
pub use store::{InMemoryPlanStore, PlanStore, StoreError};
pub use summary::{PlanSummary, SummaryData, summarize_campaigns, summarize_plan};
