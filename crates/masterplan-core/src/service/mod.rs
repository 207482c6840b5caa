//! Generation service seam: the upstream model the orchestrator talks to.
//!
//! # Architecture
//!
//! ```text
//! generate_plan / generate_creative_concepts
//!     |
//!     v
//! &dyn GenerationService --generate(request)--> CallOutcome
//!                                                 |- Completed(text)
//!                                                 |- Transient(signal)  -> retried
//!                                                 '- Permanent(signal)  -> aborts
//! ```
//!
//! Failures are returned as data, not raised, so the retry loop can match on
//! them directly.

pub mod gemini;
pub mod trait_def;
pub mod types;

pub use gemini::{GeminiClient, GeminiConfig};
pub use trait_def::GenerationService;
pub use types::{
    CallOutcome, GenerationRequest, Language, LanguageParseError, PermanentCause, UpstreamSignal,
};
