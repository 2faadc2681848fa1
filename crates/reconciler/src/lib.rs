//! Reconciliation of workshop requests into workshop sessions.
//!
//! A `WorkshopRequest` asks for a session against a `WorkshopEnvironment`.
//! On create the request is checked against the environment's access
//! policy, credentials are resolved, and a uniquely named
//! `WorkshopSession` is claimed in the store. On delete the session is
//! torn down again, but only if the deleting request is its recorded
//! creator.
//!
//! # Components
//!
//! - [`AuthorizationGate`] - namespace allow-list and token checks
//! - [`CredentialResolver`] - username and password for a new session
//! - [`SessionAllocator`] - collision-tolerant session name allocation
//! - [`OwnershipLinker`] - owner reference from session to environment
//! - [`CreateReconciler`] / [`DeleteReconciler`] - the two event handlers
//! - [`Dispatcher`] - explicit (kind, event) to handler registry
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use workshop_core::{Environment, Request, ResourceKind};
//! use workshop_reconciler::{EventKind, InMemoryStore, ReconcilerBuilder, ResourceStore};
//!
//! #[tokio::main]
//! async fn main() -> workshop_reconciler::Result<()> {
//!     let store = InMemoryStore::new_arc();
//!     store
//!         .create_environment(Environment::new("training-env").with_namespaces(["team-a"]))
//!         .await?;
//!
//!     let dispatcher = ReconcilerBuilder::new()
//!         .with_store(store.clone())
//!         .ingress_domain("example.com")
//!         .build()?
//!         .into_dispatcher()?;
//!
//!     let request = Request::new("my-request", "uid-1", "team-a", "training-env");
//!     let output = dispatcher
//!         .dispatch(ResourceKind::Request, EventKind::Create, &request)
//!         .await?;
//!     println!("{output:?}");
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod allocator;
pub mod credentials;
pub mod dispatch;
pub mod entropy;
pub mod error;
pub mod gate;
pub mod ownership;
pub mod reconciler;
pub mod store;

// Re-export main types
pub use allocator::{
    DEFAULT_MAX_ATTEMPTS, SESSION_ID_ALPHABET, SESSION_ID_LENGTH, SessionAllocator,
    SessionTemplate, generate_session_id, session_name,
};
pub use credentials::{CredentialResolver, Credentials, PASSWORD_LENGTH, generate_password};
pub use dispatch::{Dispatcher, EventKind, Handler, HandlerOutput};
pub use entropy::Entropy;
pub use error::{Disposition, Error, PolicyViolation, Result};
pub use gate::{AuthorizationGate, NAMESPACE_PLACEHOLDER};
pub use ownership::{OwnershipLinker, owner_reference};
pub use reconciler::{
    CreateOutcome, CreateReconciler, DeleteOutcome, DeleteReconciler, INGRESS_DOMAIN_ENV,
    ReconcilerBuilder, ReconcilerConfig, RequestReconcilers,
};
pub use store::{InMemoryStore, ResourceStore, StoreError, StoreResult, TracingStore};
