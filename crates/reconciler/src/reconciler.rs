//! Create and delete reconciliation of workshop requests.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use workshop_core::{
    DEFAULT_INGRESS_DOMAIN, DEFAULT_USERNAME, Environment, ObjectPointer, Request, RequestStatus,
};

use crate::allocator::{DEFAULT_MAX_ATTEMPTS, SessionAllocator, SessionTemplate};
use crate::credentials::CredentialResolver;
use crate::entropy::Entropy;
use crate::error::{Error, Result};
use crate::gate::AuthorizationGate;
use crate::store::{ResourceStore, StoreError};

/// Environment variable supplying the fallback ingress domain.
pub const INGRESS_DOMAIN_ENV: &str = "INGRESS_DOMAIN";

/// Configuration for the reconcilers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// Domain used when an environment does not set its own.
    pub ingress_domain: String,
    /// Username used when an environment does not set its own.
    pub default_username: String,
    /// Session create attempts before giving up.
    pub max_attempts: u32,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            ingress_domain: DEFAULT_INGRESS_DOMAIN.to_string(),
            default_username: DEFAULT_USERNAME.to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl ReconcilerConfig {
    /// Defaults, with the ingress domain taken from `INGRESS_DOMAIN` if set.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults, overridden by the variables `lookup` resolves. Blank values
    /// are ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(domain) = lookup(INGRESS_DOMAIN_ENV).filter(|d| !d.trim().is_empty()) {
            config.ingress_domain = domain;
        }
        config
    }

    /// Check the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for an empty domain or username, or a zero
    /// attempt budget.
    pub fn validate(&self) -> Result<()> {
        if self.ingress_domain.trim().is_empty() {
            return Err(Error::invalid_config("ingress domain must not be empty"));
        }
        if self.default_username.trim().is_empty() {
            return Err(Error::invalid_config("default username must not be empty"));
        }
        if self.max_attempts == 0 {
            return Err(Error::invalid_config("max attempts must be at least 1"));
        }
        Ok(())
    }
}

/// Result of a successful create, stored by the platform on the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOutcome {
    pub url: String,
    pub username: String,
    pub password: String,
    pub session: ObjectPointer,
}

impl CreateOutcome {
    /// Request status recording the created session.
    pub fn status(&self) -> RequestStatus {
        RequestStatus {
            session: Some(self.session.clone()),
        }
    }
}

/// Which path a delete reconciliation took.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeleteOutcome {
    /// The request never recorded a session.
    NoSessionRecorded,
    /// The recorded session no longer exists.
    AlreadyGone { session: String },
    /// The session was created by a different request and was left alone.
    NotOwner { session: String },
    /// The session was deleted.
    Deleted { session: String },
}

/// Turns a new request into a session.
pub struct CreateReconciler {
    store: Arc<dyn ResourceStore>,
    entropy: Arc<Entropy>,
    gate: AuthorizationGate,
    credentials: CredentialResolver,
    allocator: SessionAllocator,
    ingress_domain: String,
}

impl CreateReconciler {
    /// Create a new create reconciler.
    pub fn new(
        store: Arc<dyn ResourceStore>,
        entropy: Arc<Entropy>,
        config: &ReconcilerConfig,
    ) -> Self {
        Self {
            store,
            entropy,
            gate: AuthorizationGate::new(),
            credentials: CredentialResolver::new(config.default_username.clone()),
            allocator: SessionAllocator::new(config.max_attempts),
            ingress_domain: config.ingress_domain.clone(),
        }
    }

    /// Reconcile a request-create event.
    ///
    /// # Errors
    ///
    /// Returns `EnvironmentNotFound` when the target environment is missing,
    /// `PolicyViolation` when its access policy rejects the request,
    /// `AllocationExhausted` when no free session name was found, and
    /// `Store` for any unexpected store failure.
    pub async fn reconcile(&self, request: &Request) -> Result<CreateOutcome> {
        let environment_name = request.environment_name();

        info!(
            request = request.name(),
            namespace = request.namespace(),
            environment = environment_name,
            "Reconciling workshop request"
        );

        let environment = self.resolve_environment(environment_name).await?;

        self.gate.authorize(&environment, request).map_err(|violation| {
            warn!(
                request = request.name(),
                environment = environment_name,
                %violation,
                "Workshop request rejected"
            );
            Error::policy_violation(environment_name, violation)
        })?;

        let template = self.template(&environment, request);
        let session = self
            .allocator
            .allocate(self.store.as_ref(), &template, &environment, &self.entropy)
            .await?;

        let outcome = CreateOutcome {
            url: format!("http://{}", session.hostname()),
            username: session.spec.session.username.clone(),
            password: session.spec.session.password.clone(),
            session: session.pointer(),
        };

        info!(
            request = request.name(),
            session = session.name(),
            url = %outcome.url,
            "Workshop session created"
        );

        Ok(outcome)
    }

    async fn resolve_environment(&self, name: &str) -> Result<Environment> {
        self.store.get_environment(name).await.map_err(|e| match e {
            StoreError::NotFound { .. } => Error::environment_not_found(name),
            other => Error::Store(other),
        })
    }

    fn template(&self, environment: &Environment, request: &Request) -> SessionTemplate {
        let credentials = self.credentials.resolve(environment, &self.entropy);
        let defaults = environment.session_defaults();

        SessionTemplate {
            environment: environment.name().to_string(),
            credentials,
            domain: defaults
                .and_then(|s| s.domain.clone())
                .unwrap_or_else(|| self.ingress_domain.clone()),
            ingress: defaults.map(|s| s.ingress.clone()).unwrap_or_default(),
            env: defaults.map(|s| s.env.clone()).unwrap_or_default(),
            request: request.reference(),
        }
    }
}

/// Tears down the session a request created.
pub struct DeleteReconciler {
    store: Arc<dyn ResourceStore>,
}

impl DeleteReconciler {
    /// Create a new delete reconciler.
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self { store }
    }

    /// Reconcile a request-delete event.
    ///
    /// Safe to repeat: a missing pointer, a vanished session, or a session
    /// created by another request all succeed without touching the store.
    ///
    /// # Errors
    ///
    /// Returns `Store` for any store failure other than `NotFound`.
    pub async fn reconcile(&self, request: &Request) -> Result<DeleteOutcome> {
        let Some(pointer) = request.session_pointer() else {
            debug!(request = request.name(), "No session recorded for request");
            return Ok(DeleteOutcome::NoSessionRecorded);
        };
        let name = pointer.name.clone();

        let session = match self.store.get_session(&name).await {
            Ok(session) => session,
            Err(StoreError::NotFound { .. }) => {
                debug!(request = request.name(), session = %name, "Session already gone");
                return Ok(DeleteOutcome::AlreadyGone { session: name });
            }
            Err(e) => return Err(Error::Store(e)),
        };

        if !session.is_created_by(request) {
            warn!(
                request = request.name(),
                session = %name,
                "Session was not created by this request, leaving it"
            );
            return Ok(DeleteOutcome::NotOwner { session: name });
        }

        match self.store.delete_session(&name).await {
            Ok(()) => {
                info!(request = request.name(), session = %name, "Workshop session deleted");
                Ok(DeleteOutcome::Deleted { session: name })
            }
            Err(StoreError::NotFound { .. }) => {
                debug!(request = request.name(), session = %name, "Session deleted concurrently");
                Ok(DeleteOutcome::AlreadyGone { session: name })
            }
            Err(e) => Err(Error::Store(e)),
        }
    }
}

/// The pair of reconcilers handling workshop requests.
pub struct RequestReconcilers {
    pub create: CreateReconciler,
    pub delete: DeleteReconciler,
}

/// Builder for the request reconcilers.
pub struct ReconcilerBuilder {
    store: Option<Arc<dyn ResourceStore>>,
    entropy: Option<Arc<Entropy>>,
    config: ReconcilerConfig,
}

impl ReconcilerBuilder {
    /// Create a new builder configured from the environment.
    pub fn new() -> Self {
        Self {
            store: None,
            entropy: None,
            config: ReconcilerConfig::from_env(),
        }
    }

    /// The configuration the reconcilers will be built with.
    pub const fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Set the resource store.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn ResourceStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the randomness source.
    #[must_use]
    pub fn with_entropy(mut self, entropy: Arc<Entropy>) -> Self {
        self.entropy = Some(entropy);
        self
    }

    /// Set the configuration.
    #[must_use]
    pub fn with_config(mut self, config: ReconcilerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the fallback ingress domain.
    #[must_use]
    pub fn ingress_domain(mut self, domain: impl Into<String>) -> Self {
        self.config.ingress_domain = domain.into();
        self
    }

    /// Set the session create attempt budget.
    #[must_use]
    pub const fn max_attempts(mut self, max: u32) -> Self {
        self.config.max_attempts = max;
        self
    }

    /// Build the reconcilers.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` when no store was given or the configuration
    /// does not validate.
    pub fn build(self) -> Result<RequestReconcilers> {
        let store = self
            .store
            .ok_or_else(|| Error::invalid_config("resource store is required"))?;
        self.config.validate()?;

        let entropy = self.entropy.unwrap_or_else(|| Arc::new(Entropy::from_os()));

        Ok(RequestReconcilers {
            create: CreateReconciler::new(Arc::clone(&store), entropy, &self.config),
            delete: DeleteReconciler::new(store),
        })
    }
}

impl Default for ReconcilerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
