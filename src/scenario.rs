//! Scenario files: environments to seed and request events to replay.
//!
//! ```yaml
//! environments:
//!   - metadata: { name: training-env }
//!     spec:
//!       request: { namespaces: [team-a] }
//!       session: { domain: example.com }
//! events:
//!   - event: create
//!     request:
//!       metadata: { name: alice, uid: u-1, namespace: team-a }
//!       spec: { environment: { name: training-env } }
//!   - event: delete
//!     request:
//!       metadata: { name: alice, uid: u-1, namespace: team-a }
//!       spec: { environment: { name: training-env } }
//! ```

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use workshop_core::{Environment, Error, Request, ResourceKind, Result, read_document};
use workshop_reconciler::EventKind;

/// One observed event on a workshop request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioEvent {
    pub event: EventKind,
    pub request: Request,
}

/// Environments to seed and the events to replay against them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub environments: Vec<Environment>,
    #[serde(default)]
    pub events: Vec<ScenarioEvent>,
}

impl Scenario {
    /// Read and validate a scenario file.
    ///
    /// # Errors
    ///
    /// Returns a read or parse error, or `InvalidResource` when a resource
    /// fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let scenario: Self = read_document(path)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Check every resource and reject duplicate environment names.
    ///
    /// # Errors
    ///
    /// Returns `InvalidResource` for the first offending resource.
    pub fn validate(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for environment in &self.environments {
            environment.validate()?;
            if !seen.insert(environment.name()) {
                return Err(Error::invalid_resource(
                    ResourceKind::Environment.as_str(),
                    environment.name(),
                    "declared more than once",
                ));
            }
        }

        self.events
            .iter()
            .try_for_each(|event| event.request.validate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use workshop_core::from_yaml;

    const SCENARIO: &str = r"
environments:
  - metadata: { name: training-env }
    spec:
      request: { namespaces: [team-a] }
      session: { domain: example.com }
events:
  - event: create
    request:
      metadata: { name: alice, uid: u-1, namespace: team-a }
      spec: { environment: { name: training-env } }
  - event: delete
    request:
      metadata: { name: alice, uid: u-1, namespace: team-a }
      spec: { environment: { name: training-env } }
";

    #[test]
    fn test_scenario_decodes() {
        let scenario: Result<Scenario> = from_yaml(SCENARIO);
        let scenario = scenario.unwrap_or_default();
        assert_eq!(scenario.environments.len(), 1);
        assert_eq!(
            scenario.events.iter().map(|e| e.event).collect::<Vec<_>>(),
            vec![EventKind::Create, EventKind::Delete]
        );
        assert!(scenario.validate().is_ok());
    }

    #[test]
    fn test_duplicate_environments_rejected() {
        let scenario = Scenario {
            environments: vec![Environment::new("a"), Environment::new("a")],
            events: Vec::new(),
        };
        assert!(matches!(
            scenario.validate(),
            Err(Error::InvalidResource { .. })
        ));
    }

    #[test]
    fn test_request_without_uid_rejected() {
        let scenario = Scenario {
            environments: Vec::new(),
            events: vec![ScenarioEvent {
                event: EventKind::Create,
                request: Request::new("alice", "", "team-a", "training-env"),
            }],
        };
        assert!(scenario.validate().is_err());
    }
}
