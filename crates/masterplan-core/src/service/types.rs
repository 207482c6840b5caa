//! Request and outcome types shared by every generation service.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Language
// ---------------------------------------------------------------------------

/// Output language requested from the upstream model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "pt-BR")]
    PtBr,
    #[serde(rename = "en")]
    En,
}

impl Language {
    /// One-line instruction prepended to every prompt.
    pub fn instruction(&self) -> &'static str {
        match self {
            Self::PtBr => "Responda em Português.",
            Self::En => "Respond in English.",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::PtBr => "pt-BR",
            Self::En => "en",
        };
        f.write_str(s)
    }
}

impl FromStr for Language {
    type Err = LanguageParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pt-br" | "pt_br" | "pt" | "portuguese" | "português" => Ok(Self::PtBr),
            "en" | "en-us" | "en_us" | "en-gb" | "english" => Ok(Self::En),
            _ => Err(LanguageParseError(s.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`Language`] string.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid language: {0:?} (expected pt-BR or en)")]
pub struct LanguageParseError(pub String);

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// One call to the upstream model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub language: Language,
    /// Ask the service for a JSON-only response.
    pub json_output: bool,
}

impl GenerationRequest {
    pub fn json(prompt: impl Into<String>, language: Language) -> Self {
        Self {
            prompt: prompt.into(),
            language,
            json_output: true,
        }
    }

    pub fn text(prompt: impl Into<String>, language: Language) -> Self {
        Self {
            prompt: prompt.into(),
            language,
            json_output: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Status and message reported by the upstream service on failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamSignal {
    /// HTTP status, if the failure came with one.
    pub status: Option<u16>,
    pub message: String,
}

/// Why a non-retryable failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermanentCause {
    QuotaExceeded,
    Unauthorized,
    Rejected,
    EmptyResponse,
}

impl fmt::Display for PermanentCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::QuotaExceeded => "quota exceeded",
            Self::Unauthorized => "unauthorized",
            Self::Rejected => "request rejected",
            Self::EmptyResponse => "empty response",
        };
        f.write_str(s)
    }
}

/// Statuses that mean "overloaded, try again later".
const TRANSIENT_STATUSES: [u16; 3] = [500, 503, 529];

impl UpstreamSignal {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Overload or unavailability, judged by status code or message text.
    pub fn is_transient(&self) -> bool {
        if self
            .status
            .is_some_and(|status| TRANSIENT_STATUSES.contains(&status))
        {
            return true;
        }
        let message = self.message.to_lowercase();
        message.contains("overloaded") || message.contains("unavailable")
    }

    /// Cause of a failure that is not transient.
    pub fn permanent_cause(&self) -> PermanentCause {
        let message = self.message.to_lowercase();
        match self.status {
            Some(429) => PermanentCause::QuotaExceeded,
            _ if message.contains("resource_exhausted") || message.contains("quota") => {
                PermanentCause::QuotaExceeded
            }
            Some(401) | Some(403) => PermanentCause::Unauthorized,
            _ if message.contains("permission_denied") || message.contains("api key not valid") => {
                PermanentCause::Unauthorized
            }
            _ => PermanentCause::Rejected,
        }
    }
}

impl fmt::Display for UpstreamSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "HTTP {status}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Result of one upstream call, tagged for the retry loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    /// The service answered with text (possibly empty).
    Completed(String),
    /// Overloaded or unavailable; worth retrying.
    Transient(UpstreamSignal),
    /// Anything else; retrying will not help.
    Permanent(UpstreamSignal),
}

impl CallOutcome {
    /// Tag a failure signal as transient or permanent.
    pub fn from_signal(signal: UpstreamSignal) -> Self {
        if signal.is_transient() {
            Self::Transient(signal)
        } else {
            Self::Permanent(signal)
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}
