//! Shared descriptors threaded through every component.
//!
//! These are provider-resource descriptors, not in-process state: each one
//! names or references something the cloud side owns.

use serde::{Deserialize, Serialize};

/// Fully qualified Google API service name, e.g. `run.googleapis.com`.
pub type ServiceApi = String;

/// Digest-qualified container image reference
/// (`<registry>/<repo>/<name>@sha256:<digest>`).
pub type ImageRef = String;

/// The managed-service identifier an API Gateway API exposes
/// (used both for key restrictions and for the post-deploy enable command).
pub type ManagedService = String;

/// Immutable project context, read once at startup and passed explicitly to
/// every component constructor. Never looked up ambiently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectContext {
    /// GCP project id (not the numeric project number).
    pub project: String,
    /// Deployment region, e.g. `asia-northeast1`.
    pub region: String,
}

impl ProjectContext {
    pub fn new(project: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            region: region.into(),
        }
    }
}

/// Handle to a deployed Cloud Run service, resolved after the deploy
/// completes. Carries everything a downstream grant or route needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunService {
    pub project: String,
    pub location: String,
    pub name: String,
    /// Externally resolvable HTTPS URI assigned by the provider.
    pub uri: String,
}

/// Handle to an API Gateway API definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiDefinition {
    pub api_id: String,
    /// Managed service backing this API; becomes valid once the API exists.
    pub managed_service: ManagedService,
}
