//! Errors surfaced by plan generation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::service::{PermanentCause, UpstreamSignal};

/// Why a generation request produced no draft.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GenerationError {
    /// The service stayed overloaded through every allowed attempt.
    #[error("generation service still unavailable after {attempts} attempt(s): {signal}")]
    UpstreamTransient {
        attempts: u32,
        signal: UpstreamSignal,
    },

    /// The service failed in a way retrying cannot fix.
    #[error("generation service failed ({cause}): {message}")]
    UpstreamPermanent {
        cause: PermanentCause,
        message: String,
    },

    /// The service answered, but not with a usable plan.
    #[error("generated plan could not be parsed: {0}")]
    ParseFailure(String),

    /// The caller abandoned the request.
    #[error("generation cancelled")]
    Cancelled,
}

/// User-facing classification of a [`GenerationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    Overloaded,
    QuotaExceeded,
    Generic,
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Overloaded => "overloaded",
            Self::QuotaExceeded => "quota_exceeded",
            Self::Generic => "generic",
        };
        f.write_str(s)
    }
}

impl GenerationError {
    pub fn category(&self) -> FailureCategory {
        match self {
            Self::UpstreamTransient { .. } => FailureCategory::Overloaded,
            Self::UpstreamPermanent {
                cause: PermanentCause::QuotaExceeded,
                ..
            } => FailureCategory::QuotaExceeded,
            _ => FailureCategory::Generic,
        }
    }

    pub(crate) fn permanent(signal: &UpstreamSignal) -> Self {
        Self::UpstreamPermanent {
            cause: signal.permanent_cause(),
            message: signal.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories() {
        let overloaded = GenerationError::UpstreamTransient {
            attempts: 3,
            signal: UpstreamSignal::new(Some(503), "overloaded"),
        };
        assert_eq!(overloaded.category(), FailureCategory::Overloaded);

        let quota = GenerationError::permanent(&UpstreamSignal::new(Some(429), "slow down"));
        assert_eq!(quota.category(), FailureCategory::QuotaExceeded);

        let auth = GenerationError::permanent(&UpstreamSignal::new(Some(401), "no"));
        assert_eq!(auth.category(), FailureCategory::Generic);

        assert_eq!(
            GenerationError::ParseFailure("bad".into()).category(),
            FailureCategory::Generic
        );
        assert_eq!(GenerationError::Cancelled.category(), FailureCategory::Generic);
    }

    #[test]
    fn messages_name_the_cause() {
        let err = GenerationError::permanent(&UpstreamSignal::new(Some(429), "slow down"));
        assert_eq!(
            err.to_string(),
            "generation service failed (quota exceeded): HTTP 429: slow down"
        );
        assert_eq!(FailureCategory::QuotaExceeded.to_string(), "quota_exceeded");
    }
}
