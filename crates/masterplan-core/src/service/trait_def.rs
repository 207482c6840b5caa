//! The `GenerationService` trait: the adapter interface for upstream models.
//!
//! The trait is object-safe so the orchestrator can take
//! `&dyn GenerationService` and tests can substitute a scripted fake.

use async_trait::async_trait;

use super::types::{CallOutcome, GenerationRequest};

/// A text-generation backend.
///
/// Implementations never return `Err` and never panic: transport errors,
/// HTTP failures and empty bodies are all reported through [`CallOutcome`].
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Human-readable name for this service (e.g. "gemini").
    fn name(&self) -> &str;

    /// Issue one request. No retries happen at this layer.
    async fn generate(&self, request: &GenerationRequest) -> CallOutcome;
}

// Compile-time assertion: GenerationService must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn GenerationService) {}
};
