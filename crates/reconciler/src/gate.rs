//! Access policy evaluation for workshop requests.

use workshop_core::{AccessPolicy, Environment, Request};

use crate::error::PolicyViolation;

/// Placeholder in allowed namespaces replaced by the environment name.
pub const NAMESPACE_PLACEHOLDER: &str = "$(workshop_namespace)";

/// Decides whether a request may obtain a session from an environment.
///
/// Stateless; evaluation has no side effects.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthorizationGate;

impl AuthorizationGate {
    pub const fn new() -> Self {
        Self
    }

    /// Check `request` against the access policy of `environment`.
    ///
    /// # Errors
    ///
    /// Returns `NamespaceNotPermitted` when an allow-list is configured and
    /// does not contain the request's namespace, and `TokenMismatch` when a
    /// token is required and the request's token differs.
    pub fn authorize(
        &self,
        environment: &Environment,
        request: &Request,
    ) -> Result<(), PolicyViolation> {
        environment.policy().map_or(Ok(()), |policy| {
            self.evaluate(policy, environment.name(), request.namespace(), request.token())
        })
    }

    /// Evaluate a policy directly.
    ///
    /// # Errors
    ///
    /// See [`AuthorizationGate::authorize`].
    pub fn evaluate(
        &self,
        policy: &AccessPolicy,
        environment_name: &str,
        namespace: &str,
        token: Option<&str>,
    ) -> Result<(), PolicyViolation> {
        let allowed = allowed_namespaces(policy, environment_name);
        if !allowed.is_empty() && !allowed.iter().any(|n| n == namespace) {
            return Err(PolicyViolation::NamespaceNotPermitted {
                namespace: namespace.to_string(),
            });
        }

        match policy.token.as_deref() {
            Some(required) if !required.is_empty() && token != Some(required) => {
                Err(PolicyViolation::TokenMismatch)
            }
            _ => Ok(()),
        }
    }
}

/// Allowed namespaces with the placeholder substituted.
pub fn allowed_namespaces(policy: &AccessPolicy, environment_name: &str) -> Vec<String> {
    policy
        .namespaces
        .iter()
        .map(|pattern| pattern.replace(NAMESPACE_PLACEHOLDER, environment_name))
        .collect()
}
