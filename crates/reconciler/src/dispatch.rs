//! Explicit registration of event handlers.
//!
//! Handlers are registered once at startup against a resource kind and an
//! event kind; the event source calls [`Dispatcher::dispatch`] for every
//! observed event and applies backoff according to the returned error's
//! disposition.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use workshop_core::{Request, ResourceKind};

use crate::error::{Error, Result};
use crate::reconciler::{
    CreateOutcome, CreateReconciler, DeleteOutcome, DeleteReconciler, RequestReconcilers,
};

/// Lifecycle events the handlers react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Create,
    Delete,
}

impl EventKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Delete => "delete",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a handler produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HandlerOutput {
    Created(CreateOutcome),
    Deleted(DeleteOutcome),
}

/// A function invoked for one kind of event.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Handle an event for `request`.
    async fn handle(&self, request: &Request) -> Result<HandlerOutput>;
}

#[async_trait]
impl Handler for CreateReconciler {
    async fn handle(&self, request: &Request) -> Result<HandlerOutput> {
        self.reconcile(request).await.map(HandlerOutput::Created)
    }
}

#[async_trait]
impl Handler for DeleteReconciler {
    async fn handle(&self, request: &Request) -> Result<HandlerOutput> {
        self.reconcile(request).await.map(HandlerOutput::Deleted)
    }
}

type HandlerKey = (ResourceKind, EventKind);

/// Maps (resource kind, event kind) to a handler.
#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<HandlerKey, Arc<dyn Handler>>,
}

impl Dispatcher {
    /// Create an empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `event` on `kind`.
    ///
    /// # Errors
    ///
    /// Returns `HandlerAlreadyRegistered` if the key is taken.
    pub fn register(
        &mut self,
        kind: ResourceKind,
        event: EventKind,
        handler: Arc<dyn Handler>,
    ) -> Result<()> {
        if self.handlers.contains_key(&(kind, event)) {
            return Err(Error::HandlerAlreadyRegistered {
                kind,
                event: event.to_string(),
            });
        }
        debug!(%kind, %event, "Registering handler");
        self.handlers.insert((kind, event), handler);
        Ok(())
    }

    /// Whether a handler exists for the key.
    pub fn is_registered(&self, kind: ResourceKind, event: EventKind) -> bool {
        self.handlers.contains_key(&(kind, event))
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Invoke the handler registered for `event` on `kind`.
    ///
    /// # Errors
    ///
    /// Returns `HandlerNotRegistered` when no handler matches, otherwise
    /// whatever the handler returns.
    pub async fn dispatch(
        &self,
        kind: ResourceKind,
        event: EventKind,
        request: &Request,
    ) -> Result<HandlerOutput> {
        let handler = self
            .handlers
            .get(&(kind, event))
            .ok_or_else(|| Error::HandlerNotRegistered {
                kind,
                event: event.to_string(),
            })?;

        debug!(%kind, %event, name = request.name(), "Dispatching event");
        handler.handle(request).await
    }
}

impl RequestReconcilers {
    /// Register the create and delete reconcilers for workshop requests.
    ///
    /// # Errors
    ///
    /// Never fails on a fresh dispatcher; the registration result is
    /// propagated for uniformity.
    pub fn into_dispatcher(self) -> Result<Dispatcher> {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(ResourceKind::Request, EventKind::Create, Arc::new(self.create))?;
        dispatcher.register(ResourceKind::Request, EventKind::Delete, Arc::new(self.delete))?;
        Ok(dispatcher)
    }
}
