//! Resource store trait and implementations.
//!
//! The store is the only source of atomicity: `create_*` is create-if-absent
//! and the first writer of a name wins. Reconcilers never lock.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;
use workshop_core::{Environment, Request, RequestStatus, ResourceKind, Session};

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Store-level failures.
///
/// `Conflict` and `NotFound` are expected signals that reconcilers branch
/// on; everything else is `Unavailable`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{kind} '{name}' already exists")]
    Conflict { kind: ResourceKind, name: String },

    #[error("{kind} '{name}' not found")]
    NotFound { kind: ResourceKind, name: String },

    #[error("store operation '{operation}' failed: {reason}")]
    Unavailable { operation: String, reason: String },
}

impl StoreError {
    /// Create a conflict error.
    pub fn conflict(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self::Conflict {
            kind,
            name: name.into(),
        }
    }

    /// Create a not found error.
    pub fn not_found(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Create an unavailable error.
    pub fn unavailable(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Typed, cluster-scoped access to workshop resources.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Fetch an environment by name.
    async fn get_environment(&self, name: &str) -> StoreResult<Environment>;

    /// Create an environment; fails with `Conflict` if the name is taken.
    async fn create_environment(&self, environment: Environment) -> StoreResult<Environment>;

    /// Delete an environment and, through ownership, its sessions.
    async fn delete_environment(&self, name: &str) -> StoreResult<()>;

    /// Fetch a request by name.
    async fn get_request(&self, name: &str) -> StoreResult<Request>;

    /// Create a request; fails with `Conflict` if the name is taken.
    async fn create_request(&self, request: Request) -> StoreResult<Request>;

    /// Replace the status of an existing request.
    async fn update_request_status(&self, name: &str, status: RequestStatus)
    -> StoreResult<Request>;

    /// Delete a request.
    async fn delete_request(&self, name: &str) -> StoreResult<()>;

    /// Fetch a session by name.
    async fn get_session(&self, name: &str) -> StoreResult<Session>;

    /// Create a session; fails with `Conflict` if the name is taken.
    async fn create_session(&self, session: Session) -> StoreResult<Session>;

    /// Delete a session; fails with `NotFound` if it is already gone.
    async fn delete_session(&self, name: &str) -> StoreResult<()>;

    /// All sessions, ordered by name.
    async fn list_sessions(&self) -> StoreResult<Vec<Session>>;
}

#[derive(Default)]
struct Objects {
    environments: BTreeMap<String, Environment>,
    requests: BTreeMap<String, Request>,
    sessions: BTreeMap<String, Session>,
}

/// In-memory resource store.
///
/// Assigns a fresh uid to every created object and emulates the platform's
/// garbage collector: deleting an environment removes the sessions that
/// carry an owner reference to it.
#[derive(Default)]
pub struct InMemoryStore {
    objects: RwLock<Objects>,
}

impl InMemoryStore {
    /// Create a new in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new in-memory store wrapped in an Arc.
    pub fn new_arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn assign_uid(uid: &mut String) {
        if uid.is_empty() {
            *uid = Uuid::new_v4().to_string();
        }
    }
}

#[async_trait]
impl ResourceStore for InMemoryStore {
    async fn get_environment(&self, name: &str) -> StoreResult<Environment> {
        let objects = self.objects.read().await;
        objects
            .environments
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::not_found(ResourceKind::Environment, name))
    }

    async fn create_environment(&self, mut environment: Environment) -> StoreResult<Environment> {
        let mut objects = self.objects.write().await;
        let name = environment.metadata.name.clone();
        if objects.environments.contains_key(&name) {
            return Err(StoreError::conflict(ResourceKind::Environment, name));
        }
        Self::assign_uid(&mut environment.metadata.uid);
        objects.environments.insert(name, environment.clone());
        Ok(environment)
    }

    async fn delete_environment(&self, name: &str) -> StoreResult<()> {
        let mut objects = self.objects.write().await;
        let environment = objects
            .environments
            .remove(name)
            .ok_or_else(|| StoreError::not_found(ResourceKind::Environment, name))?;

        let owner_uid = environment.metadata.uid;
        let before = objects.sessions.len();
        objects.sessions.retain(|_, session| {
            !session
                .metadata
                .owner_references
                .iter()
                .any(|owner| owner.uid == owner_uid)
        });
        tracing::debug!(
            environment = name,
            collected = before.saturating_sub(objects.sessions.len()),
            "Garbage collected owned sessions"
        );
        Ok(())
    }

    async fn get_request(&self, name: &str) -> StoreResult<Request> {
        let objects = self.objects.read().await;
        objects
            .requests
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::not_found(ResourceKind::Request, name))
    }

    async fn create_request(&self, mut request: Request) -> StoreResult<Request> {
        let mut objects = self.objects.write().await;
        let name = request.metadata.name.clone();
        if objects.requests.contains_key(&name) {
            return Err(StoreError::conflict(ResourceKind::Request, name));
        }
        Self::assign_uid(&mut request.metadata.uid);
        objects.requests.insert(name, request.clone());
        Ok(request)
    }

    async fn update_request_status(
        &self,
        name: &str,
        status: RequestStatus,
    ) -> StoreResult<Request> {
        let mut objects = self.objects.write().await;
        let request = objects
            .requests
            .get_mut(name)
            .ok_or_else(|| StoreError::not_found(ResourceKind::Request, name))?;
        request.status = Some(status);
        Ok(request.clone())
    }

    async fn delete_request(&self, name: &str) -> StoreResult<()> {
        let mut objects = self.objects.write().await;
        objects
            .requests
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(ResourceKind::Request, name))
    }

    async fn get_session(&self, name: &str) -> StoreResult<Session> {
        let objects = self.objects.read().await;
        objects
            .sessions
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::not_found(ResourceKind::Session, name))
    }

    async fn create_session(&self, mut session: Session) -> StoreResult<Session> {
        let mut objects = self.objects.write().await;
        let name = session.metadata.name.clone();
        if objects.sessions.contains_key(&name) {
            return Err(StoreError::conflict(ResourceKind::Session, name));
        }
        Self::assign_uid(&mut session.metadata.uid);
        objects.sessions.insert(name, session.clone());
        Ok(session)
    }

    async fn delete_session(&self, name: &str) -> StoreResult<()> {
        let mut objects = self.objects.write().await;
        objects
            .sessions
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(ResourceKind::Session, name))
    }

    async fn list_sessions(&self) -> StoreResult<Vec<Session>> {
        let objects = self.objects.read().await;
        Ok(objects.sessions.values().cloned().collect())
    }
}

/// A wrapper that adds tracing to a resource store.
pub struct TracingStore<S: ResourceStore> {
    inner: S,
}

impl<S: ResourceStore> TracingStore<S> {
    /// Create a new tracing store.
    pub const fn new(inner: S) -> Self {
        Self { inner }
    }

    /// Get the wrapped store.
    pub const fn inner(&self) -> &S {
        &self.inner
    }
}

fn trace_outcome<T>(operation: &str, name: &str, result: &StoreResult<T>) {
    match result {
        Ok(_) => tracing::trace!(operation, name, "Store call succeeded"),
        Err(e) => tracing::debug!(operation, name, error = %e, "Store call failed"),
    }
}

#[async_trait]
impl<S: ResourceStore> ResourceStore for TracingStore<S> {
    async fn get_environment(&self, name: &str) -> StoreResult<Environment> {
        tracing::debug!(name, "Getting environment");
        let result = self.inner.get_environment(name).await;
        trace_outcome("get_environment", name, &result);
        result
    }

    async fn create_environment(&self, environment: Environment) -> StoreResult<Environment> {
        let name = environment.metadata.name.clone();
        tracing::debug!(name = %name, "Creating environment");
        let result = self.inner.create_environment(environment).await;
        trace_outcome("create_environment", &name, &result);
        result
    }

    async fn delete_environment(&self, name: &str) -> StoreResult<()> {
        tracing::debug!(name, "Deleting environment");
        let result = self.inner.delete_environment(name).await;
        trace_outcome("delete_environment", name, &result);
        result
    }

    async fn get_request(&self, name: &str) -> StoreResult<Request> {
        tracing::debug!(name, "Getting request");
        let result = self.inner.get_request(name).await;
        trace_outcome("get_request", name, &result);
        result
    }

    async fn create_request(&self, request: Request) -> StoreResult<Request> {
        let name = request.metadata.name.clone();
        tracing::debug!(name = %name, "Creating request");
        let result = self.inner.create_request(request).await;
        trace_outcome("create_request", &name, &result);
        result
    }

    async fn update_request_status(
        &self,
        name: &str,
        status: RequestStatus,
    ) -> StoreResult<Request> {
        tracing::debug!(name, "Updating request status");
        let result = self.inner.update_request_status(name, status).await;
        trace_outcome("update_request_status", name, &result);
        result
    }

    async fn delete_request(&self, name: &str) -> StoreResult<()> {
        tracing::debug!(name, "Deleting request");
        let result = self.inner.delete_request(name).await;
        trace_outcome("delete_request", name, &result);
        result
    }

    async fn get_session(&self, name: &str) -> StoreResult<Session> {
        tracing::debug!(name, "Getting session");
        let result = self.inner.get_session(name).await;
        trace_outcome("get_session", name, &result);
        result
    }

    async fn create_session(&self, session: Session) -> StoreResult<Session> {
        let name = session.metadata.name.clone();
        tracing::debug!(name = %name, "Creating session");
        let result = self.inner.create_session(session).await;
        trace_outcome("create_session", &name, &result);
        result
    }

    async fn delete_session(&self, name: &str) -> StoreResult<()> {
        tracing::debug!(name, "Deleting session");
        let result = self.inner.delete_session(name).await;
        trace_outcome("delete_session", name, &result);
        result
    }

    async fn list_sessions(&self) -> StoreResult<Vec<Session>> {
        self.inner.list_sessions().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use workshop_core::{
        EnvironmentName, ObjectMeta, OwnerReference, SessionDetails, SessionSpec,
    };

    fn session(name: &str, owner_uid: &str) -> Session {
        Session {
            metadata: ObjectMeta {
                name: name.to_string(),
                owner_references: vec![OwnerReference {
                    api_version: workshop_core::API_VERSION.to_string(),
                    kind: "WorkshopEnvironment".to_string(),
                    name: "training-env".to_string(),
                    uid: owner_uid.to_string(),
                    controller: true,
                    block_owner_deletion: true,
                }],
                ..ObjectMeta::default()
            },
            spec: SessionSpec {
                environment: EnvironmentName {
                    name: "training-env".to_string(),
                },
                session: SessionDetails::default(),
                request: None,
            },
        }
    }

    #[tokio::test]
    async fn test_create_assigns_uid() {
        let store = InMemoryStore::new();
        let created = store.create_environment(Environment::new("training-env")).await;
        assert!(created.as_ref().is_ok_and(|e| !e.metadata.uid.is_empty()));
    }

    #[tokio::test]
    async fn test_create_conflicts_on_duplicate_name() {
        let store = InMemoryStore::new();
        assert!(store.create_session(session("env-aaaaa", "u")).await.is_ok());

        let second = store.create_session(session("env-aaaaa", "u")).await;
        assert!(second.as_ref().is_err_and(StoreError::is_conflict));
    }

    #[tokio::test]
    async fn test_get_and_delete_missing_report_not_found() {
        let store = InMemoryStore::new();
        assert!(store.get_session("nope").await.is_err_and(|e| e.is_not_found()));
        assert!(store.delete_session("nope").await.is_err_and(|e| e.is_not_found()));
        assert!(store.get_environment("nope").await.is_err_and(|e| e.is_not_found()));
    }

    #[tokio::test]
    async fn test_delete_environment_collects_owned_sessions() {
        let store = InMemoryStore::new();
        let env = store.create_environment(Environment::new("training-env")).await;
        let env_uid = env.map(|e| e.metadata.uid).unwrap_or_default();

        store.create_session(session("training-env-aaaaa", &env_uid)).await.ok();
        store.create_session(session("other-bbbbb", "someone-else")).await.ok();

        assert!(store.delete_environment("training-env").await.is_ok());

        let remaining = store.list_sessions().await.unwrap_or_default();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining.first().map(Session::name), Some("other-bbbbb"));
    }

    #[tokio::test]
    async fn test_update_request_status() {
        let store = InMemoryStore::new();
        store
            .create_request(Request::new("req", "uid-1", "team-a", "training-env"))
            .await
            .ok();

        let updated = store
            .update_request_status("req", RequestStatus::default())
            .await;
        assert!(updated.is_ok_and(|r| r.status.is_some()));
    }

    #[tokio::test]
    async fn test_tracing_store_delegates() {
        let store = TracingStore::new(InMemoryStore::new());
        assert!(store.create_environment(Environment::new("env")).await.is_ok());
        assert!(store.inner().get_environment("env").await.is_ok());
    }
}
