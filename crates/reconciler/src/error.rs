//! Error types for the reconciler crate.
//!
//! Every failure carries a [`Disposition`] so the dispatch layer can decide
//! between backing off and giving up without inspecting messages.

use thiserror::Error;
use workshop_core::ResourceKind;

use crate::store::StoreError;

/// Result type alias for reconciler operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Whether the event source should retry a failed reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Retry later with backoff.
    Retryable,
    /// Do not retry; surface to an operator.
    Fatal,
}

/// Why an access policy rejected a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyViolation {
    #[error("namespace '{namespace}' not permitted")]
    NamespaceNotPermitted { namespace: String },

    #[error("token mismatch")]
    TokenMismatch,
}

/// Reconciler error types.
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("cannot find workshop environment '{name}'")]
    EnvironmentNotFound { name: String },

    #[error("request to environment '{environment}' rejected: {violation}")]
    PolicyViolation {
        environment: String,
        violation: PolicyViolation,
    },

    #[error("unable to allocate a session for '{environment}' after {attempts} attempts")]
    AllocationExhausted { environment: String, attempts: u32 },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("no handler registered for {event} of {kind}")]
    HandlerNotRegistered { kind: ResourceKind, event: String },

    #[error("a handler is already registered for {event} of {kind}")]
    HandlerAlreadyRegistered { kind: ResourceKind, event: String },

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl Error {
    /// Create an environment not found error.
    pub fn environment_not_found(name: impl Into<String>) -> Self {
        Self::EnvironmentNotFound { name: name.into() }
    }

    /// Create a policy violation error.
    pub fn policy_violation(environment: impl Into<String>, violation: PolicyViolation) -> Self {
        Self::PolicyViolation {
            environment: environment.into(),
            violation,
        }
    }

    /// Create an allocation exhausted error.
    pub fn allocation_exhausted(environment: impl Into<String>, attempts: u32) -> Self {
        Self::AllocationExhausted {
            environment: environment.into(),
            attempts,
        }
    }

    /// Create an invalid config error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Classify this error for the dispatch layer.
    ///
    /// Policy violations stay retryable: an operator may still edit the
    /// environment so the request becomes acceptable.
    pub const fn disposition(&self) -> Disposition {
        match self {
            Self::EnvironmentNotFound { .. }
            | Self::PolicyViolation { .. }
            | Self::AllocationExhausted { .. } => Disposition::Retryable,
            Self::Store(_)
            | Self::HandlerNotRegistered { .. }
            | Self::HandlerAlreadyRegistered { .. }
            | Self::InvalidConfig { .. } => Disposition::Fatal,
        }
    }

    /// Shorthand for `disposition() == Disposition::Retryable`.
    pub fn is_retryable(&self) -> bool {
        self.disposition() == Disposition::Retryable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::policy_violation(
            "training-env",
            PolicyViolation::NamespaceNotPermitted {
                namespace: "team-b".to_string(),
            },
        );
        let msg = err.to_string();
        assert!(msg.contains("training-env"));
        assert!(msg.contains("team-b"));
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(Error::environment_not_found("missing").is_retryable());
        assert!(Error::policy_violation("env", PolicyViolation::TokenMismatch).is_retryable());
        assert!(Error::allocation_exhausted("env", 20).is_retryable());
    }

    #[test]
    fn test_store_errors_are_fatal() {
        let err = Error::from(StoreError::unavailable("create", "connection refused"));
        assert_eq!(err.disposition(), Disposition::Fatal);
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_dispatch_misconfiguration_is_fatal() {
        let err = Error::HandlerNotRegistered {
            kind: ResourceKind::Request,
            event: "delete".to_string(),
        };
        assert!(!err.is_retryable());
    }
}
