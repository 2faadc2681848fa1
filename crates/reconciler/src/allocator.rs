//! Session identifier allocation.
//!
//! Identifiers are short so hostnames stay friendly, which makes collisions
//! routine at scale. Instead of a central counter the allocator draws a
//! random candidate and lets the store's create-if-absent semantics decide:
//! a `Conflict` means someone else holds the name and another candidate is
//! drawn, up to a fixed attempt budget.

use std::collections::BTreeMap;

use rand::RngCore;
use rand::seq::SliceRandom;
use tracing::{debug, info, warn};
use workshop_core::{
    ENVIRONMENT_LABEL, EnvVar, Environment, EnvironmentName, IngressRule, ObjectMeta,
    RequestReference, Session, SessionDetails, SessionSpec,
};

use crate::credentials::Credentials;
use crate::entropy::Entropy;
use crate::error::{Error, Result};
use crate::ownership::OwnershipLinker;
use crate::store::{ResourceStore, StoreError};

/// Symbols a session identifier is drawn from. Vowels are left out so ids
/// do not spell words.
pub const SESSION_ID_ALPHABET: &[u8] = b"bcdfghjklmnpqrstvwxyz0123456789";

/// Length of a session identifier.
pub const SESSION_ID_LENGTH: usize = 5;

/// Create attempts before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 20;

/// Draw a candidate session identifier; characters may repeat.
pub fn generate_session_id(rng: &mut dyn RngCore) -> String {
    (0..SESSION_ID_LENGTH)
        .filter_map(|_| SESSION_ID_ALPHABET.choose(&mut *rng))
        .map(|&b| char::from(b))
        .collect()
}

/// Session name for an environment and identifier.
pub fn session_name(environment: &str, session_id: &str) -> String {
    format!("{environment}-{session_id}")
}

/// Everything about a session except its identifier.
#[derive(Debug, Clone)]
pub struct SessionTemplate {
    pub environment: String,
    pub credentials: Credentials,
    pub domain: String,
    pub ingress: Vec<IngressRule>,
    pub env: Vec<EnvVar>,
    pub request: RequestReference,
}

impl SessionTemplate {
    /// Compose the session body for a candidate identifier.
    pub fn compose(&self, session_id: &str) -> Session {
        let labels = BTreeMap::from([(
            ENVIRONMENT_LABEL.to_string(),
            self.environment.clone(),
        )]);

        Session {
            metadata: ObjectMeta {
                name: session_name(&self.environment, session_id),
                labels,
                ..ObjectMeta::default()
            },
            spec: SessionSpec {
                environment: EnvironmentName {
                    name: self.environment.clone(),
                },
                session: SessionDetails {
                    id: session_id.to_string(),
                    username: self.credentials.username.clone(),
                    password: self.credentials.password.clone(),
                    domain: self.domain.clone(),
                    ingress: self.ingress.clone(),
                    env: self.env.clone(),
                },
                request: Some(self.request.clone()),
            },
        }
    }
}

/// Claims a unique session name by repeated create attempts.
#[derive(Debug, Clone)]
pub struct SessionAllocator {
    max_attempts: u32,
    linker: OwnershipLinker,
}

impl SessionAllocator {
    pub const fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            linker: OwnershipLinker::new(),
        }
    }

    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Create a session from `template`, owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns `AllocationExhausted` when every attempt collided with an
    /// existing name, and propagates any store error other than `Conflict`
    /// without retrying.
    pub async fn allocate(
        &self,
        store: &dyn ResourceStore,
        template: &SessionTemplate,
        owner: &Environment,
        entropy: &Entropy,
    ) -> Result<Session> {
        for attempt in 1..=self.max_attempts {
            let session_id = entropy.with_rng(generate_session_id);
            let mut body = template.compose(&session_id);
            self.linker.link(&mut body, owner);

            debug!(
                environment = %template.environment,
                session = %body.metadata.name,
                attempt,
                "Attempting to create session"
            );

            match store.create_session(body).await {
                Ok(session) => {
                    info!(
                        environment = %template.environment,
                        session = %session.metadata.name,
                        attempt,
                        "Session allocated"
                    );
                    return Ok(session);
                }
                Err(StoreError::Conflict { name, .. }) => {
                    warn!(
                        environment = %template.environment,
                        session = %name,
                        attempt,
                        "Session name already taken, retrying"
                    );
                }
                Err(e) => return Err(Error::Store(e)),
            }
        }

        Err(Error::allocation_exhausted(
            &template.environment,
            self.max_attempts,
        ))
    }
}

impl Default for SessionAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use workshop_core::{Request, RequestStatus};

    use super::*;
    use crate::store::{InMemoryStore, StoreResult};

    fn template() -> SessionTemplate {
        SessionTemplate {
            environment: "training-env".to_string(),
            credentials: Credentials {
                username: "eduk8s".to_string(),
                password: "abcdefghijkl".to_string(),
            },
            domain: "example.com".to_string(),
            ingress: Vec::new(),
            env: Vec::new(),
            request: Request::new("req", "uid-1", "team-a", "training-env").reference(),
        }
    }

    fn owner() -> Environment {
        let mut env = Environment::new("training-env");
        env.metadata.uid = "env-uid".to_string();
        env
    }

    /// Store whose session creates always fail with a fixed error.
    struct FailingStore {
        error: StoreError,
        creates: AtomicU32,
    }

    #[async_trait]
    impl ResourceStore for FailingStore {
        async fn get_environment(&self, name: &str) -> StoreResult<Environment> {
            Err(StoreError::not_found(workshop_core::ResourceKind::Environment, name))
        }
        async fn create_environment(&self, e: Environment) -> StoreResult<Environment> {
            Ok(e)
        }
        async fn delete_environment(&self, _: &str) -> StoreResult<()> {
            Ok(())
        }
        async fn get_request(&self, name: &str) -> StoreResult<Request> {
            Err(StoreError::not_found(workshop_core::ResourceKind::Request, name))
        }
        async fn create_request(&self, r: Request) -> StoreResult<Request> {
            Ok(r)
        }
        async fn update_request_status(
            &self,
            name: &str,
            _: RequestStatus,
        ) -> StoreResult<Request> {
            Err(StoreError::not_found(workshop_core::ResourceKind::Request, name))
        }
        async fn delete_request(&self, _: &str) -> StoreResult<()> {
            Ok(())
        }
        async fn get_session(&self, name: &str) -> StoreResult<Session> {
            Err(StoreError::not_found(workshop_core::ResourceKind::Session, name))
        }
        async fn create_session(&self, _: Session) -> StoreResult<Session> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            Err(self.error.clone())
        }
        async fn delete_session(&self, _: &str) -> StoreResult<()> {
            Ok(())
        }
        async fn list_sessions(&self) -> StoreResult<Vec<Session>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_session_id_shape() {
        let id = Entropy::seeded(3).with_rng(generate_session_id);
        assert_eq!(id.len(), SESSION_ID_LENGTH);
        assert!(id.bytes().all(|b| SESSION_ID_ALPHABET.contains(&b)));
    }

    #[test]
    fn test_compose_sets_name_label_and_back_reference() {
        let session = template().compose("b4x9z");
        assert_eq!(session.metadata.name, "training-env-b4x9z");
        assert_eq!(
            session.metadata.labels.get(ENVIRONMENT_LABEL).map(String::as_str),
            Some("training-env")
        );
        assert_eq!(session.spec.session.id, "b4x9z");
        assert_eq!(session.hostname(), "training-env-b4x9z.example.com");
        assert_eq!(
            session.request_reference().map(|r| r.uid.as_str()),
            Some("uid-1")
        );
    }

    #[tokio::test]
    async fn test_allocate_links_owner() {
        let store = InMemoryStore::new();
        let result = SessionAllocator::default()
            .allocate(&store, &template(), &owner(), &Entropy::seeded(5))
            .await;

        let owners = result.map(|s| s.metadata.owner_references).unwrap_or_default();
        assert_eq!(owners.len(), 1);
        assert_eq!(owners.first().map(|o| o.uid.as_str()), Some("env-uid"));
    }

    #[tokio::test]
    async fn test_non_conflict_errors_abort_immediately() {
        let store = FailingStore {
            error: StoreError::unavailable("create", "connection reset"),
            creates: AtomicU32::new(0),
        };
        let result = SessionAllocator::default()
            .allocate(&store, &template(), &owner(), &Entropy::seeded(5))
            .await;

        assert!(matches!(result, Err(Error::Store(StoreError::Unavailable { .. }))));
        assert_eq!(store.creates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_after_budget() {
        let store = FailingStore {
            error: StoreError::conflict(workshop_core::ResourceKind::Session, "taken"),
            creates: AtomicU32::new(0),
        };
        let result = SessionAllocator::new(4)
            .allocate(&store, &template(), &owner(), &Entropy::seeded(5))
            .await;

        assert!(matches!(
            result,
            Err(Error::AllocationExhausted { attempts: 4, .. })
        ));
        assert_eq!(store.creates.load(Ordering::SeqCst), 4);
    }
}
