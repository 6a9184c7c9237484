//! Failure taxonomy for a single refresh cycle

use crate::core::rates::ProviderId;
use std::fmt::Display;
use thiserror::Error;

/// Payload did not match the expected layout.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ParseError(pub String);

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        ParseError(message.into())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RebaseError {
    #[error("base currency {0} not present in fetched rates")]
    MissingBase(String),
    #[error("base currency {currency} has unusable rate {rate}")]
    InvalidBaseRate { currency: String, rate: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Transport,
    Format,
    Provider,
    Rebase,
    Persistence,
}

impl Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            FailureKind::Transport => "transport",
            FailureKind::Format => "format",
            FailureKind::Provider => "provider",
            FailureKind::Rebase => "rebase",
            FailureKind::Persistence => "persistence",
        })
    }
}

/// Why a refresh cycle was abandoned. Always local to one provider.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CycleError {
    #[error("{provider}: transport failure: {message}")]
    Transport { provider: ProviderId, message: String },
    #[error("{provider}: malformed payload: {message}")]
    Format { provider: ProviderId, message: String },
    #[error("{provider}: provider error {code}: {message}")]
    Provider {
        provider: ProviderId,
        code: i64,
        message: String,
    },
    #[error("{provider}: cannot rebase, {source}")]
    Rebase {
        provider: ProviderId,
        source: RebaseError,
    },
    #[error("{provider}: could not persist entry: {message}")]
    Persistence { provider: ProviderId, message: String },
}

impl CycleError {
    pub fn transport(provider: ProviderId, err: impl Display) -> Self {
        CycleError::Transport {
            provider,
            message: err.to_string(),
        }
    }

    pub fn format(provider: ProviderId, err: impl Display) -> Self {
        CycleError::Format {
            provider,
            message: err.to_string(),
        }
    }

    pub fn persistence(provider: ProviderId, err: impl Display) -> Self {
        CycleError::Persistence {
            provider,
            message: err.to_string(),
        }
    }

    pub fn provider(&self) -> ProviderId {
        match self {
            CycleError::Transport { provider, .. }
            | CycleError::Format { provider, .. }
            | CycleError::Provider { provider, .. }
            | CycleError::Rebase { provider, .. }
            | CycleError::Persistence { provider, .. } => *provider,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            CycleError::Transport { .. } => FailureKind::Transport,
            CycleError::Format { .. } => FailureKind::Format,
            CycleError::Provider { .. } => FailureKind::Provider,
            CycleError::Rebase { .. } => FailureKind::Rebase,
            CycleError::Persistence { .. } => FailureKind::Persistence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_message_includes_code_and_info() {
        let err = CycleError::Provider {
            provider: ProviderId::Fixer,
            code: 101,
            message: "invalid_access_key".to_string(),
        };
        assert_eq!(err.kind(), FailureKind::Provider);
        assert_eq!(err.provider(), ProviderId::Fixer);
        assert_eq!(
            err.to_string(),
            "fixer: provider error 101: invalid_access_key"
        );
    }

    #[test]
    fn test_rebase_error_names_missing_base() {
        let err = CycleError::Rebase {
            provider: ProviderId::Ecb,
            source: RebaseError::MissingBase("XYZ".to_string()),
        };
        assert_eq!(err.kind(), FailureKind::Rebase);
        assert!(err.to_string().contains("XYZ"));
    }
}
