//! Resource model for workshop environments, requests and sessions.
//!
//! Field names follow the camelCase wire format of the platform's custom
//! resources so that documents round-trip through YAML and JSON unchanged.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// API group and version shared by all workshop resources.
pub const API_VERSION: &str = "training.eduk8s.io/v1alpha1";

/// Label attached to every session naming the environment it belongs to.
pub const ENVIRONMENT_LABEL: &str = "workshop-environment";

/// Username given to sessions whose environment does not set one.
pub const DEFAULT_USERNAME: &str = "eduk8s";

/// Fallback ingress domain when neither the environment nor configuration set one.
pub const DEFAULT_INGRESS_DOMAIN: &str = "training.eduk8s.io";

/// The three resource kinds the operator reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    #[serde(rename = "WorkshopEnvironment")]
    Environment,
    #[serde(rename = "WorkshopRequest")]
    Request,
    #[serde(rename = "WorkshopSession")]
    Session,
}

impl ResourceKind {
    /// Kind name as it appears on the wire.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Environment => "WorkshopEnvironment",
            Self::Request => "WorkshopRequest",
            Self::Session => "WorkshopSession",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference from a child object to the object that owns it.
///
/// The store's garbage collector deletes the child once the owner is gone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub uid: String,
    #[serde(default)]
    pub controller: bool,
    #[serde(default)]
    pub block_owner_deletion: bool,
}

/// Metadata common to every resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    /// Assigned by the store on create when empty.
    #[serde(default)]
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owner_references: Vec<OwnerReference>,
}

impl ObjectMeta {
    /// Metadata carrying only a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Pointer to another resource, stored on a request's status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectPointer {
    pub kind: String,
    pub api_version: String,
    pub name: String,
    pub uid: String,
}

// ============================================================================
// WorkshopEnvironment
// ============================================================================

/// A routing entry exposed for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressRule {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    /// Keys the operator does not interpret, carried to the session as written.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Environment variable injected into a session.
///
/// Variables sourced elsewhere (`valueFrom`) have no `value`; the source
/// reference lives in `extra`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Who may request sessions against an environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPolicy {
    /// Allowed origin namespaces; empty means any namespace.
    #[serde(default)]
    pub namespaces: Vec<String>,
    /// Shared token a request must present; absent or empty means none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Defaults applied to every session created from an environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDefaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default)]
    pub ingress: Vec<IngressRule>,
    #[serde(default)]
    pub env: Vec<EnvVar>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<AccessPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionDefaults>,
}

/// Template describing a shared workspace: access policy and session defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: EnvironmentSpec,
}

impl Environment {
    /// Create an environment with no policy and no session defaults.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta::named(name),
            spec: EnvironmentSpec::default(),
        }
    }

    /// Restrict requests to the given namespaces.
    #[must_use]
    pub fn with_namespaces<I, S>(mut self, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec.request.get_or_insert_with(AccessPolicy::default).namespaces =
            namespaces.into_iter().map(Into::into).collect();
        self
    }

    /// Require requests to present the given token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.spec.request.get_or_insert_with(AccessPolicy::default).token = Some(token.into());
        self
    }

    /// Replace the session defaults.
    #[must_use]
    pub fn with_session_defaults(mut self, defaults: SessionDefaults) -> Self {
        self.spec.session = Some(defaults);
        self
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Access policy, if one is configured.
    pub const fn policy(&self) -> Option<&AccessPolicy> {
        self.spec.request.as_ref()
    }

    /// Session defaults, if any are configured.
    pub const fn session_defaults(&self) -> Option<&SessionDefaults> {
        self.spec.session.as_ref()
    }

    /// Check the fields the operator relies on.
    ///
    /// # Errors
    ///
    /// Returns `InvalidResource` when the name is empty.
    pub fn validate(&self) -> Result<()> {
        if self.metadata.name.trim().is_empty() {
            return Err(Error::invalid_resource(
                ResourceKind::Environment.as_str(),
                &self.metadata.name,
                "name must not be empty",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// WorkshopRequest
// ============================================================================

/// The environment a request targets, and the token it presents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentTarget {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSpec {
    pub environment: EnvironmentTarget,
}

/// Status recorded by the platform after a successful create.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<ObjectPointer>,
}

/// A user's intent to obtain a session against an environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub metadata: ObjectMeta,
    pub spec: RequestSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RequestStatus>,
}

impl Request {
    /// Create a request from `namespace` targeting `environment`.
    pub fn new(
        name: impl Into<String>,
        uid: impl Into<String>,
        namespace: impl Into<String>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            metadata: ObjectMeta {
                name: name.into(),
                uid: uid.into(),
                namespace: Some(namespace.into()),
                ..ObjectMeta::default()
            },
            spec: RequestSpec {
                environment: EnvironmentTarget {
                    name: environment.into(),
                    token: None,
                },
            },
            status: None,
        }
    }

    /// Present an access token with the request.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.spec.environment.token = Some(token.into());
        self
    }

    /// Record the session produced for this request.
    #[must_use]
    pub fn with_session(mut self, session: ObjectPointer) -> Self {
        self.status = Some(RequestStatus {
            session: Some(session),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn uid(&self) -> &str {
        &self.metadata.uid
    }

    /// Origin namespace; empty when the request carries none.
    pub fn namespace(&self) -> &str {
        self.metadata.namespace.as_deref().unwrap_or_default()
    }

    pub fn environment_name(&self) -> &str {
        &self.spec.environment.name
    }

    pub fn token(&self) -> Option<&str> {
        self.spec.environment.token.as_deref()
    }

    /// Session pointer recorded on the status, if the create path completed.
    pub fn session_pointer(&self) -> Option<&ObjectPointer> {
        self.status.as_ref().and_then(|s| s.session.as_ref())
    }

    /// Reference to this request, as embedded in the sessions it creates.
    pub fn reference(&self) -> RequestReference {
        RequestReference {
            namespace: self.namespace().to_string(),
            kind: ResourceKind::Request.as_str().to_string(),
            api_version: API_VERSION.to_string(),
            name: self.metadata.name.clone(),
            uid: self.metadata.uid.clone(),
        }
    }

    /// Check the fields the operator relies on.
    ///
    /// # Errors
    ///
    /// Returns `InvalidResource` when the name, uid, namespace or target
    /// environment is missing.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| -> Result<()> {
            Err(Error::invalid_resource(
                ResourceKind::Request.as_str(),
                &self.metadata.name,
                reason,
            ))
        };

        if self.metadata.name.trim().is_empty() {
            return invalid("name must not be empty");
        }
        if self.metadata.uid.trim().is_empty() {
            return invalid("uid must not be empty");
        }
        if self.namespace().trim().is_empty() {
            return invalid("namespace must not be empty");
        }
        if self.spec.environment.name.trim().is_empty() {
            return invalid("spec.environment.name must not be empty");
        }
        Ok(())
    }
}

// ============================================================================
// WorkshopSession
// ============================================================================

/// Back-reference from a session to the request that created it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestReference {
    pub namespace: String,
    pub kind: String,
    pub api_version: String,
    pub name: String,
    pub uid: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentName {
    pub name: String,
}

/// Credentials and routing of an allocated session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDetails {
    pub id: String,
    pub username: String,
    pub password: String,
    pub domain: String,
    #[serde(default)]
    pub ingress: Vec<IngressRule>,
    #[serde(default)]
    pub env: Vec<EnvVar>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSpec {
    pub environment: EnvironmentName,
    pub session: SessionDetails,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<RequestReference>,
}

/// An allocated, credentialed workspace instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub metadata: ObjectMeta,
    pub spec: SessionSpec,
}

impl Session {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn uid(&self) -> &str {
        &self.metadata.uid
    }

    /// Public hostname: `{name}.{domain}`.
    pub fn hostname(&self) -> String {
        format!("{}.{}", self.metadata.name, self.spec.session.domain)
    }

    /// Request that created this session, if recorded.
    pub const fn request_reference(&self) -> Option<&RequestReference> {
        self.spec.request.as_ref()
    }

    /// Whether `request` is the recorded creator of this session.
    ///
    /// Namespace, name and uid must all match; a session without a
    /// back-reference is owned by nobody.
    pub fn is_created_by(&self, request: &Request) -> bool {
        self.spec.request.as_ref().is_some_and(|r| {
            r.namespace == request.namespace()
                && r.name == request.name()
                && r.uid == request.uid()
        })
    }

    /// Pointer to this session, for storing on a request's status.
    pub fn pointer(&self) -> ObjectPointer {
        ObjectPointer {
            kind: ResourceKind::Session.as_str().to_string(),
            api_version: API_VERSION.to_string(),
            name: self.metadata.name.clone(),
            uid: self.metadata.uid.clone(),
        }
    }
}
