//! Shared error kinds for the ragweave workspace.
//!
//! Every crate-local error enum (chunk store, conversation store, provider)
//! converts into this one at the crate boundary, the same way the rest of
//! the workspace folds a narrower error into one shared type before it
//! reaches a caller.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

/// Error kinds from §7 of the design: one variant per category, each with
/// a single, well-defined propagation rule.
#[derive(Debug, Error)]
pub enum RagError {
    #[error("configuration missing: {0}")]
    ConfigMissing(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("rate limited by provider")]
    RateLimited,

    #[error("provider returned {status}: {body}")]
    ProviderHttp { status: u16, body: String },

    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Substrings on-prem backends (e.g. a local model runner) are known to
/// emit when the runner process has died mid-call rather than returning
/// a clean HTTP status.
const ON_PREM_RETRY_SIGNATURES: &[&str] = &["EOF", "runner no longer running"];

impl RagError {
    /// True for kinds the Resilient Caller should retry per §4.2.
    pub fn is_retriable(&self) -> bool {
        matches!(self, RagError::RateLimited | RagError::Transport(_))
            || matches!(self, RagError::ProviderHttp { status, .. } if matches!(status, 429 | 503 | 529 | 500))
            || self.has_on_prem_retry_signature()
    }

    fn has_on_prem_retry_signature(&self) -> bool {
        let body = match self {
            RagError::ProviderHttp { body, .. } => body.as_str(),
            RagError::Parse(message) => message.as_str(),
            _ => return false,
        };
        ON_PREM_RETRY_SIGNATURES.iter().any(|sig| body.contains(sig))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_provider_statuses_are_retriable() {
        assert!(RagError::RateLimited.is_retriable());
        assert!(RagError::ProviderHttp { status: 503, body: String::new() }.is_retriable());
        assert!(!RagError::ProviderHttp { status: 400, body: String::new() }.is_retriable());
    }

    #[test]
    fn on_prem_runner_crash_signatures_are_retriable() {
        let eof = RagError::ProviderHttp { status: 200, body: "unexpected EOF".to_string() };
        let crashed = RagError::ProviderHttp { status: 200, body: "runner no longer running".to_string() };
        assert!(eof.is_retriable());
        assert!(crashed.is_retriable());
    }

    #[test]
    fn unrelated_parse_errors_are_not_retriable() {
        assert!(!RagError::Parse("missing field `answer`".to_string()).is_retriable());
    }
}
