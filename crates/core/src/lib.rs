//! Resource model for the workshop request operator.
//!
//! Three resource kinds take part in reconciliation:
//!
//! - **WorkshopEnvironment**: template with an access policy and session defaults
//! - **WorkshopRequest**: short-lived intent to obtain a session
//! - **WorkshopSession**: the allocated, credentialed workspace instance
//!
//! This crate only describes and decodes them; the reconciliation logic
//! lives in `workshop-reconciler`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod decode;
pub mod error;
pub mod resources;

pub use decode::{Format, decode, from_json, from_yaml, read_document};
pub use error::{Error, Result};
pub use resources::{
    API_VERSION, AccessPolicy, DEFAULT_INGRESS_DOMAIN, DEFAULT_USERNAME, ENVIRONMENT_LABEL,
    EnvVar, Environment, EnvironmentName, EnvironmentSpec, EnvironmentTarget, IngressRule,
    ObjectMeta, ObjectPointer, OwnerReference, Request, RequestReference, RequestSpec,
    RequestStatus, ResourceKind, Session, SessionDefaults, SessionDetails, SessionSpec,
};
