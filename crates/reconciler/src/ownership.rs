//! Ownership links from sessions to their environment.

use workshop_core::{API_VERSION, Environment, OwnerReference, ResourceKind, Session};

/// Attaches an owner reference so that deleting an environment cascades to
/// its sessions through the store's garbage collector.
#[derive(Debug, Clone, Copy, Default)]
pub struct OwnershipLinker;

impl OwnershipLinker {
    pub const fn new() -> Self {
        Self
    }

    /// Make `owner` the controlling owner of `session`.
    ///
    /// Linking the same owner twice leaves a single reference.
    pub fn link(&self, session: &mut Session, owner: &Environment) {
        let reference = owner_reference(owner);
        let owners = &mut session.metadata.owner_references;
        if !owners.iter().any(|r| r.uid == reference.uid && r.kind == reference.kind) {
            owners.push(reference);
        }
    }
}

/// Controller reference pointing at `environment`.
pub fn owner_reference(environment: &Environment) -> OwnerReference {
    OwnerReference {
        api_version: API_VERSION.to_string(),
        kind: ResourceKind::Environment.as_str().to_string(),
        name: environment.metadata.name.clone(),
        uid: environment.metadata.uid.clone(),
        controller: true,
        block_owner_deletion: true,
    }
}
