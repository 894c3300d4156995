//! The provider boundary.
//!
//! Every cloud mutation the components need, as one async trait. The crate
//! ships [`crate::SimulatedGcp`]; real API clients implement the same trait
//! outside this crate. All operations are idempotent on re-apply: creating
//! something that already exists with identical inputs is a no-op.

use std::path::Path;

use async_trait::async_trait;

use gantry_core::{ApiDefinition, ImageRef, RunService};

use crate::error::ProviderResult;
use crate::template::EncodedDocument;

/// Deployment spec for a managed container service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunServiceSpec {
    pub project: String,
    pub location: String,
    pub name: String,
    /// Digest-qualified image reference; deployments never pin mutable tags.
    pub image: ImageRef,
    pub cpu_limit: String,
    pub memory_limit: String,
    pub container_port: u16,
    /// Allow traffic from all sources when true (INGRESS_TRAFFIC_ALL).
    pub ingress_all: bool,
}

impl RunServiceSpec {
    /// The fixed shape this stack deploys: 1 CPU, 1Gi, port 8080, open
    /// ingress.
    pub fn standard(project: &str, location: &str, name: &str, image: ImageRef) -> Self {
        RunServiceSpec {
            project: project.to_string(),
            location: location.to_string(),
            name: name.to_string(),
            image,
            cpu_limit: "1".to_string(),
            memory_limit: "1Gi".to_string(),
            container_port: 8080,
            ingress_all: true,
        }
    }
}

#[async_trait]
pub trait GcpApi: Send + Sync {
    // ── Project services ───────────────────────────────────────────

    /// Enable a project-level API. Re-enabling is a no-op.
    async fn enable_service(&self, project: &str, service: &str) -> ProviderResult<()>;

    /// Disable a project-level API (only used by the post-deploy command's
    /// inverse; normal teardown never disables shared services).
    async fn disable_service(&self, project: &str, service: &str) -> ProviderResult<()>;

    // ── Artifact registry / images ─────────────────────────────────

    /// Ensure a docker-format repository exists in the given region.
    async fn create_repository(
        &self,
        project: &str,
        region: &str,
        repository_id: &str,
    ) -> ProviderResult<()>;

    async fn delete_repository(
        &self,
        project: &str,
        region: &str,
        repository_id: &str,
    ) -> ProviderResult<()>;

    /// Build the image from `context_dir`, push it under `base_name`, and
    /// return the digest-qualified reference. Resolves only after the push
    /// completes.
    async fn build_and_push_image(
        &self,
        base_name: &str,
        context_dir: &Path,
    ) -> ProviderResult<ImageRef>;

    // ── Cloud Run ──────────────────────────────────────────────────

    /// Deploy the service; the returned handle carries the URI assigned by
    /// the provider.
    async fn deploy_service(&self, spec: &RunServiceSpec) -> ProviderResult<RunService>;

    async fn delete_service(
        &self,
        project: &str,
        location: &str,
        name: &str,
    ) -> ProviderResult<()>;

    /// Grant `member` permission to invoke the service (roles/run.invoker).
    async fn grant_run_invoker(
        &self,
        project: &str,
        location: &str,
        service_name: &str,
        member: &str,
    ) -> ProviderResult<()>;

    async fn revoke_run_invoker(
        &self,
        project: &str,
        location: &str,
        service_name: &str,
        member: &str,
    ) -> ProviderResult<()>;

    // ── API Gateway ────────────────────────────────────────────────

    /// Create the API definition; the returned handle carries the managed
    /// service identifier the key restriction and the post-deploy enable
    /// command both need.
    async fn create_api(&self, project: &str, api_id: &str) -> ProviderResult<ApiDefinition>;

    async fn delete_api(&self, project: &str, api_id: &str) -> ProviderResult<()>;

    /// Resolve an API definition without creating it (teardown paths need
    /// the managed-service id when no create has run in this process).
    async fn lookup_api(&self, project: &str, api_id: &str) -> ProviderResult<ApiDefinition>;

    /// Create a versioned API config from an encoded OpenAPI document.
    async fn create_api_config(
        &self,
        project: &str,
        api_id: &str,
        config_id: &str,
        document: &EncodedDocument,
    ) -> ProviderResult<()>;

    async fn delete_api_config(
        &self,
        project: &str,
        api_id: &str,
        config_id: &str,
    ) -> ProviderResult<()>;

    /// Create the gateway bound to a config; returns the default hostname.
    async fn create_gateway(
        &self,
        project: &str,
        region: &str,
        gateway_id: &str,
        api_id: &str,
        config_id: &str,
    ) -> ProviderResult<String>;

    async fn delete_gateway(
        &self,
        project: &str,
        region: &str,
        gateway_id: &str,
    ) -> ProviderResult<()>;

    // ── Keys / project metadata / commands ─────────────────────────

    /// Create an API key restricted to `target_service`; returns the raw
    /// key secret.
    async fn create_api_key(
        &self,
        project: &str,
        name: &str,
        display_name: &str,
        target_service: &str,
    ) -> ProviderResult<String>;

    async fn delete_api_key(&self, project: &str, name: &str) -> ProviderResult<()>;

    /// Find a live key whose name starts with `prefix`; returns its name and
    /// secret. Re-apply reuses the key a previous apply created instead of
    /// minting another one under a fresh suffix.
    async fn lookup_api_key_by_prefix(
        &self,
        project: &str,
        prefix: &str,
    ) -> ProviderResult<Option<(String, String)>>;

    /// Delete every key whose name starts with `prefix`. Teardown paths use
    /// this because the random suffix of a key created in another process is
    /// unknowable here; returns how many keys were deleted.
    async fn delete_api_keys_by_prefix(&self, project: &str, prefix: &str) -> ProviderResult<u32>;

    /// Resolve a project id to its numeric project number.
    async fn project_number(&self, project: &str) -> ProviderResult<u64>;

    /// Run one external shell-style command (the post-deploy boundary).
    async fn run_command(&self, command: &str) -> ProviderResult<()>;
}
