//! Replays scenario events through the dispatcher.
//!
//! The runner plays the part of the surrounding platform: it stores
//! requests, records the create outcome on the request status, and retries
//! retryable failures with backoff. Fatal failures stop the run.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};
use workshop_core::{Environment, Request, ResourceKind};
use workshop_reconciler::{
    Dispatcher, Entropy, EventKind, HandlerOutput, InMemoryStore, ReconcilerBuilder,
    ReconcilerConfig, RequestReconcilers, ResourceStore, StoreError, TracingStore,
};

use crate::retry::RetryPolicy;
use crate::scenario::ScenarioEvent;

/// Outcome of one replayed event.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EventResult {
    Succeeded { output: HandlerOutput },
    Failed { error: String, retryable: bool },
}

/// Report line printed for each event.
#[derive(Debug, Clone, Serialize)]
pub struct EventReport {
    pub index: usize,
    pub event: EventKind,
    pub request: String,
    pub attempts: u32,
    #[serde(flatten)]
    pub result: EventResult,
}

impl EventReport {
    pub const fn succeeded(&self) -> bool {
        matches!(self.result, EventResult::Succeeded { .. })
    }
}

/// Drives request events against a resource store.
pub struct Runner {
    store: Arc<dyn ResourceStore>,
    dispatcher: Dispatcher,
    retry: RetryPolicy,
}

impl Runner {
    /// Build a runner over a fresh in-memory store.
    ///
    /// # Errors
    ///
    /// Fails when the configuration is invalid.
    pub fn new(config: ReconcilerConfig, entropy: Entropy, retry: RetryPolicy) -> Result<Self> {
        let store = Arc::new(TracingStore::new(InMemoryStore::new()));
        Self::with_store(store, config, entropy, retry)
    }

    /// Build a runner over `store` with the request reconcilers registered.
    ///
    /// # Errors
    ///
    /// Fails when the configuration is invalid.
    pub fn with_store(
        store: Arc<dyn ResourceStore>,
        config: ReconcilerConfig,
        entropy: Entropy,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let dispatcher = ReconcilerBuilder::new()
            .with_store(Arc::clone(&store))
            .with_entropy(Arc::new(entropy))
            .with_config(config)
            .build()
            .and_then(RequestReconcilers::into_dispatcher)
            .context("Failed to build reconcilers")?;

        Ok(Self {
            store,
            dispatcher,
            retry,
        })
    }

    /// The store the runner writes to.
    pub fn store(&self) -> &dyn ResourceStore {
        self.store.as_ref()
    }

    /// Create the given environments.
    ///
    /// # Errors
    ///
    /// Fails when an environment cannot be created.
    pub async fn seed(&self, environments: &[Environment]) -> Result<()> {
        for environment in environments {
            self.store
                .create_environment(environment.clone())
                .await
                .with_context(|| format!("Failed to seed environment {}", environment.name()))?;
        }
        info!(count = environments.len(), "Seeded environments");
        Ok(())
    }

    /// Replay events in order, handing each report to `on_report` as soon
    /// as its event finishes.
    ///
    /// # Errors
    ///
    /// Stops at the first fatal failure or the first error from `on_report`.
    pub async fn run(
        &self,
        events: &[ScenarioEvent],
        mut on_report: impl FnMut(&EventReport) -> Result<()>,
    ) -> Result<Vec<EventReport>> {
        let mut reports = Vec::with_capacity(events.len());
        for (index, event) in events.iter().enumerate() {
            let report = self.replay(index, event).await?;
            on_report(&report)?;
            reports.push(report);
        }
        Ok(reports)
    }

    async fn replay(&self, index: usize, event: &ScenarioEvent) -> Result<EventReport> {
        let request = self.prepare(event).await?;

        let mut attempt = 0;
        let result = loop {
            match self
                .dispatcher
                .dispatch(ResourceKind::Request, event.event, &request)
                .await
            {
                Ok(output) => break Ok(output),
                Err(e) if self.retry.should_retry(&e, attempt) => {
                    let delay = self.retry.calculate_delay(attempt);
                    warn!(
                        request = request.name(),
                        event = %event.event,
                        attempt,
                        error = %e,
                        ?delay,
                        "Retryable failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt = attempt.saturating_add(1);
                }
                Err(e) => break Err(e),
            }
        };

        let attempts = attempt.saturating_add(1);
        let result = match result {
            Ok(output) => {
                self.record(&request, &output).await?;
                EventResult::Succeeded { output }
            }
            Err(e) if e.is_retryable() => EventResult::Failed {
                error: e.to_string(),
                retryable: true,
            },
            Err(e) => {
                let context = format!("event {index} for request {} failed", request.name());
                return Err(anyhow::Error::new(e).context(context));
            }
        };

        Ok(EventReport {
            index,
            event: event.event,
            request: request.name().to_string(),
            attempts,
            result,
        })
    }

    /// Store a new request, or pick up the stored status of a deleted one.
    async fn prepare(&self, event: &ScenarioEvent) -> Result<Request> {
        let request = event.request.clone();
        match event.event {
            EventKind::Create => match self.store.create_request(request.clone()).await {
                Ok(stored) => Ok(stored),
                Err(StoreError::Conflict { .. }) => Ok(request),
                Err(e) => Err(e).context("Failed to store request"),
            },
            EventKind::Delete => {
                if request.session_pointer().is_some() {
                    return Ok(request);
                }
                match self.store.get_request(request.name()).await {
                    Ok(stored) if stored.uid() == request.uid() => {
                        Ok(Request {
                            status: stored.status,
                            ..request
                        })
                    }
                    Ok(_) | Err(StoreError::NotFound { .. }) => Ok(request),
                    Err(e) => Err(e).context("Failed to read request"),
                }
            }
        }
    }

    /// Apply a handler's output to the stored request.
    async fn record(&self, request: &Request, output: &HandlerOutput) -> Result<()> {
        let stored = match output {
            HandlerOutput::Created(outcome) => {
                self.store
                    .update_request_status(request.name(), outcome.status())
                    .await
                    .map(|_| ())
            }
            HandlerOutput::Deleted(_) => self.store.delete_request(request.name()).await,
        };
        match stored {
            Ok(()) | Err(StoreError::NotFound { .. }) => Ok(()),
            Err(e) => Err(e).context("Failed to record handler output"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use workshop_core::{RequestStatus, Session};
    use workshop_reconciler::{DeleteOutcome, StoreResult};

    const UNREACHABLE_ENV: &str = "unreachable-env";

    /// In-memory store that cannot read one environment.
    #[derive(Default)]
    struct PartitionedStore {
        inner: InMemoryStore,
    }

    #[async_trait]
    impl ResourceStore for PartitionedStore {
        async fn get_environment(&self, name: &str) -> StoreResult<Environment> {
            if name == UNREACHABLE_ENV {
                return Err(StoreError::unavailable("get_environment", "connection reset"));
            }
            self.inner.get_environment(name).await
        }
        async fn create_environment(&self, e: Environment) -> StoreResult<Environment> {
            self.inner.create_environment(e).await
        }
        async fn delete_environment(&self, name: &str) -> StoreResult<()> {
            self.inner.delete_environment(name).await
        }
        async fn get_request(&self, name: &str) -> StoreResult<Request> {
            self.inner.get_request(name).await
        }
        async fn create_request(&self, r: Request) -> StoreResult<Request> {
            self.inner.create_request(r).await
        }
        async fn update_request_status(
            &self,
            name: &str,
            status: RequestStatus,
        ) -> StoreResult<Request> {
            self.inner.update_request_status(name, status).await
        }
        async fn delete_request(&self, name: &str) -> StoreResult<()> {
            self.inner.delete_request(name).await
        }
        async fn get_session(&self, name: &str) -> StoreResult<Session> {
            self.inner.get_session(name).await
        }
        async fn create_session(&self, s: Session) -> StoreResult<Session> {
            self.inner.create_session(s).await
        }
        async fn delete_session(&self, name: &str) -> StoreResult<()> {
            self.inner.delete_session(name).await
        }
        async fn list_sessions(&self) -> StoreResult<Vec<Session>> {
            self.inner.list_sessions().await
        }
    }

    fn runner() -> Runner {
        match Runner::new(
            ReconcilerConfig::default(),
            Entropy::seeded(17),
            RetryPolicy::new(1, 0, 0),
        ) {
            Ok(runner) => runner,
            Err(e) => panic!("runner should build: {e}"),
        }
    }

    fn event(kind: EventKind, request: &Request) -> ScenarioEvent {
        ScenarioEvent {
            event: kind,
            request: request.clone(),
        }
    }

    #[tokio::test]
    async fn test_create_then_delete_uses_recorded_status() {
        let runner = runner();
        runner
            .seed(&[Environment::new("training-env")])
            .await
            .ok();
        let request = Request::new("alice", "uid-1", "team-a", "training-env");

        let reports = runner
            .run(
                &[
                    event(EventKind::Create, &request),
                    event(EventKind::Delete, &request),
                ],
                |_| Ok(()),
            )
            .await
            .unwrap_or_default();

        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(EventReport::succeeded));
        assert!(matches!(
            reports.get(1).map(|r| &r.result),
            Some(EventResult::Succeeded {
                output: HandlerOutput::Deleted(DeleteOutcome::Deleted { .. })
            })
        ));
        assert!(
            runner
                .store()
                .list_sessions()
                .await
                .is_ok_and(|s| s.is_empty())
        );
    }

    #[tokio::test]
    async fn test_retryable_failure_is_reported_after_retries() {
        let runner = runner();
        let request = Request::new("alice", "uid-1", "team-a", "missing-env");

        let reports = runner
            .run(&[event(EventKind::Create, &request)], |_| Ok(()))
            .await
            .unwrap_or_default();

        let report = reports.first();
        assert_eq!(report.map(|r| r.attempts), Some(2));
        assert!(matches!(
            report.map(|r| &r.result),
            Some(EventResult::Failed {
                retryable: true,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_reports_before_fatal_failure_are_delivered() {
        let runner = match Runner::with_store(
            Arc::new(PartitionedStore::default()),
            ReconcilerConfig::default(),
            Entropy::seeded(17),
            RetryPolicy::new(1, 0, 0),
        ) {
            Ok(runner) => runner,
            Err(e) => panic!("runner should build: {e}"),
        };
        runner
            .seed(&[Environment::new("training-env")])
            .await
            .ok();
        let alice = Request::new("alice", "uid-1", "team-a", "training-env");
        let bob = Request::new("bob", "uid-2", "team-a", UNREACHABLE_ENV);

        let mut delivered = Vec::new();
        let result = runner
            .run(
                &[event(EventKind::Create, &alice), event(EventKind::Create, &bob)],
                |report| {
                    delivered.push(report.clone());
                    Ok(())
                },
            )
            .await;

        assert!(result.is_err());
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered.first().map(|r| r.request.as_str()), Some("alice"));
        assert!(delivered.first().is_some_and(EventReport::succeeded));
    }
}
