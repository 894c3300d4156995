//! Deterministic in-memory provider.
//!
//! Stands in for the real cloud APIs behind [`GcpApi`]: every create is
//! idempotent (identical inputs are recorded as non-mutating), derived
//! values are content-addressed (the image digest hashes the build context,
//! URIs and hostnames hash the resource coordinates), and key names honor
//! the provider's soft-delete reservation so the randomized-suffix behavior
//! is actually exercised. Records every call for assertions and supports
//! per-method failure injection.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use rand::Rng;
use rand::distributions::Alphanumeric;
use sha2::{Digest, Sha256};
use tracing::debug;
use walkdir::WalkDir;

use gantry_core::{ApiDefinition, ImageRef, RunService};

use crate::api::{GcpApi, RunServiceSpec};
use crate::error::{ProviderError, ProviderResult};
use crate::template::EncodedDocument;

/// One provider call, as observed by tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRecord {
    pub method: String,
    pub resource: String,
    /// False when the call found the resource already in the desired state.
    pub mutated: bool,
}

#[derive(Default)]
struct SimState {
    enabled: BTreeSet<String>,
    repositories: BTreeSet<String>,
    images: BTreeMap<String, ImageRef>,
    services: BTreeMap<String, RunService>,
    grants: BTreeSet<String>,
    apis: BTreeMap<String, ApiDefinition>,
    api_configs: BTreeMap<String, EncodedDocument>,
    gateways: BTreeMap<String, String>,
    api_keys: BTreeMap<String, String>,
    /// Deleted key names stay reserved (30-day soft delete).
    soft_deleted_keys: BTreeSet<String>,
    commands: Vec<String>,
    calls: Vec<CallRecord>,
    fail: HashMap<String, String>,
}

/// In-memory [`GcpApi`] implementation.
#[derive(Default)]
pub struct SimulatedGcp {
    state: Mutex<SimState>,
}

impl SimulatedGcp {
    pub fn new() -> Self {
        SimulatedGcp::default()
    }

    /// Make the next call to `method` fail with `message`.
    pub fn fail_method(&self, method: &str, message: &str) {
        let mut state = self.state.lock().unwrap();
        state.fail.insert(method.to_string(), message.to_string());
    }

    /// All recorded calls, in order.
    pub fn calls(&self) -> Vec<CallRecord> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Number of calls that actually changed provider state.
    pub fn mutation_count(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.mutated)
            .count()
    }

    /// Commands issued through the post-deploy boundary, in order.
    pub fn commands(&self) -> Vec<String> {
        self.state.lock().unwrap().commands.clone()
    }

    pub fn enabled_services(&self, project: &str) -> Vec<String> {
        let prefix = format!("{project}/");
        self.state
            .lock()
            .unwrap()
            .enabled
            .iter()
            .filter_map(|k| k.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    /// Members granted run.invoker on the named service.
    pub fn invoker_grants(&self, service_name: &str) -> Vec<String> {
        let prefix = format!("{service_name}:");
        self.state
            .lock()
            .unwrap()
            .grants
            .iter()
            .filter_map(|k| k.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    pub fn live_key_names(&self) -> Vec<String> {
        self.state.lock().unwrap().api_keys.keys().cloned().collect()
    }

    /// Decoded OpenAPI document of a stored API config, if present.
    pub fn api_config_document(
        &self,
        project: &str,
        api_id: &str,
        config_id: &str,
    ) -> Option<String> {
        let key = format!("{project}/{api_id}/{config_id}");
        let state = self.state.lock().unwrap();
        let document = state.api_configs.get(&key)?;
        let bytes = STANDARD.decode(&document.contents).ok()?;
        String::from_utf8(bytes).ok()
    }

    fn begin(&self, method: &str) -> ProviderResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(message) = state.fail.remove(method) {
            debug!(method, "injected failure");
            return Err(ProviderError::Api(message));
        }
        Ok(())
    }

    fn record(&self, method: &str, resource: &str, mutated: bool) {
        let mut state = self.state.lock().unwrap();
        state.calls.push(CallRecord {
            method: method.to_string(),
            resource: resource.to_string(),
            mutated,
        });
    }
}

/// Short content hash used for derived hostnames and URIs.
fn short_hash(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))[..8].to_string()
}

/// Hash the build context: relative paths plus file contents, in sorted
/// order, so an unchanged context always yields the same digest.
fn context_digest(context_dir: &Path) -> ProviderResult<String> {
    let mut hasher = Sha256::new();
    for entry in WalkDir::new(context_dir).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.file_type().is_file() {
            let rel = entry.path().strip_prefix(context_dir).unwrap_or(entry.path());
            hasher.update(rel.to_string_lossy().as_bytes());
            hasher.update(std::fs::read(entry.path())?);
        }
    }
    Ok(hex::encode(hasher.finalize()))
}

#[async_trait]
impl GcpApi for SimulatedGcp {
    async fn enable_service(&self, project: &str, service: &str) -> ProviderResult<()> {
        self.begin("enable_service")?;
        let key = format!("{project}/{service}");
        let mutated = self.state.lock().unwrap().enabled.insert(key);
        self.record("enable_service", service, mutated);
        Ok(())
    }

    async fn disable_service(&self, project: &str, service: &str) -> ProviderResult<()> {
        self.begin("disable_service")?;
        let key = format!("{project}/{service}");
        let mutated = self.state.lock().unwrap().enabled.remove(&key);
        self.record("disable_service", service, mutated);
        Ok(())
    }

    async fn create_repository(
        &self,
        project: &str,
        region: &str,
        repository_id: &str,
    ) -> ProviderResult<()> {
        self.begin("create_repository")?;
        let key = format!("{project}/{region}/{repository_id}");
        let mutated = self.state.lock().unwrap().repositories.insert(key);
        self.record("create_repository", repository_id, mutated);
        Ok(())
    }

    async fn delete_repository(
        &self,
        project: &str,
        region: &str,
        repository_id: &str,
    ) -> ProviderResult<()> {
        self.begin("delete_repository")?;
        let key = format!("{project}/{region}/{repository_id}");
        let mutated = self.state.lock().unwrap().repositories.remove(&key);
        self.record("delete_repository", repository_id, mutated);
        Ok(())
    }

    async fn build_and_push_image(
        &self,
        base_name: &str,
        context_dir: &Path,
    ) -> ProviderResult<ImageRef> {
        self.begin("build_and_push_image")?;
        let digest = context_digest(context_dir)?;
        let image_ref = format!("{base_name}@sha256:{digest}");
        let mutated = {
            let mut state = self.state.lock().unwrap();
            state.images.insert(base_name.to_string(), image_ref.clone())
                != Some(image_ref.clone())
        };
        self.record("build_and_push_image", base_name, mutated);
        Ok(image_ref)
    }

    async fn deploy_service(&self, spec: &RunServiceSpec) -> ProviderResult<RunService> {
        self.begin("deploy_service")?;
        if !spec.image.contains("@sha256:") {
            return Err(ProviderError::InvalidImage(spec.image.clone()));
        }
        let suffix = short_hash(&format!("{}/{}", spec.project, spec.name));
        let service = RunService {
            project: spec.project.clone(),
            location: spec.location.clone(),
            name: spec.name.clone(),
            uri: format!("https://{}-{suffix}.{}.run.app", spec.name, spec.location),
        };
        let mutated = {
            let mut state = self.state.lock().unwrap();
            let key = format!("{}/{}/{}", spec.project, spec.location, spec.name);
            state.services.insert(key, service.clone()) != Some(service.clone())
        };
        self.record("deploy_service", &spec.name, mutated);
        Ok(service)
    }

    async fn delete_service(
        &self,
        project: &str,
        location: &str,
        name: &str,
    ) -> ProviderResult<()> {
        self.begin("delete_service")?;
        let key = format!("{project}/{location}/{name}");
        let mutated = self.state.lock().unwrap().services.remove(&key).is_some();
        self.record("delete_service", name, mutated);
        Ok(())
    }

    async fn grant_run_invoker(
        &self,
        _project: &str,
        _location: &str,
        service_name: &str,
        member: &str,
    ) -> ProviderResult<()> {
        self.begin("grant_run_invoker")?;
        let key = format!("{service_name}:{member}");
        let mutated = self.state.lock().unwrap().grants.insert(key);
        self.record("grant_run_invoker", member, mutated);
        Ok(())
    }

    async fn revoke_run_invoker(
        &self,
        _project: &str,
        _location: &str,
        service_name: &str,
        member: &str,
    ) -> ProviderResult<()> {
        self.begin("revoke_run_invoker")?;
        let key = format!("{service_name}:{member}");
        let mutated = self.state.lock().unwrap().grants.remove(&key);
        self.record("revoke_run_invoker", member, mutated);
        Ok(())
    }

    async fn create_api(&self, project: &str, api_id: &str) -> ProviderResult<ApiDefinition> {
        self.begin("create_api")?;
        let api = ApiDefinition {
            api_id: api_id.to_string(),
            managed_service: format!(
                "{api_id}-{}.apigateway.{project}.cloud.goog",
                short_hash(&format!("{project}/{api_id}"))
            ),
        };
        let mutated = {
            let mut state = self.state.lock().unwrap();
            let key = format!("{project}/{api_id}");
            state.apis.insert(key, api.clone()) != Some(api.clone())
        };
        self.record("create_api", api_id, mutated);
        Ok(api)
    }

    async fn lookup_api(&self, project: &str, api_id: &str) -> ProviderResult<ApiDefinition> {
        self.begin("lookup_api")?;
        let key = format!("{project}/{api_id}");
        if let Some(api) = self.state.lock().unwrap().apis.get(&key) {
            return Ok(api.clone());
        }
        // The managed-service name is derivable; teardown must work even in
        // a process that never ran the create.
        Ok(ApiDefinition {
            api_id: api_id.to_string(),
            managed_service: format!(
                "{api_id}-{}.apigateway.{project}.cloud.goog",
                short_hash(&format!("{project}/{api_id}"))
            ),
        })
    }

    async fn delete_api(&self, project: &str, api_id: &str) -> ProviderResult<()> {
        self.begin("delete_api")?;
        let key = format!("{project}/{api_id}");
        let mutated = self.state.lock().unwrap().apis.remove(&key).is_some();
        self.record("delete_api", api_id, mutated);
        Ok(())
    }

    async fn create_api_config(
        &self,
        project: &str,
        api_id: &str,
        config_id: &str,
        document: &EncodedDocument,
    ) -> ProviderResult<()> {
        self.begin("create_api_config")?;
        let key = format!("{project}/{api_id}/{config_id}");
        let mutated = {
            let mut state = self.state.lock().unwrap();
            state.api_configs.insert(key, document.clone()) != Some(document.clone())
        };
        self.record("create_api_config", config_id, mutated);
        Ok(())
    }

    async fn delete_api_config(
        &self,
        project: &str,
        api_id: &str,
        config_id: &str,
    ) -> ProviderResult<()> {
        self.begin("delete_api_config")?;
        let key = format!("{project}/{api_id}/{config_id}");
        let mutated = self.state.lock().unwrap().api_configs.remove(&key).is_some();
        self.record("delete_api_config", config_id, mutated);
        Ok(())
    }

    async fn create_gateway(
        &self,
        project: &str,
        region: &str,
        gateway_id: &str,
        api_id: &str,
        config_id: &str,
    ) -> ProviderResult<String> {
        self.begin("create_gateway")?;
        {
            let state = self.state.lock().unwrap();
            let config_key = format!("{project}/{api_id}/{config_id}");
            if !state.api_configs.contains_key(&config_key) {
                return Err(ProviderError::NotFound(config_key));
            }
        }
        let hostname = format!(
            "{gateway_id}-{}.{region}.gateway.dev",
            short_hash(&format!("{project}/{region}/{gateway_id}"))
        );
        let mutated = {
            let mut state = self.state.lock().unwrap();
            let key = format!("{project}/{region}/{gateway_id}");
            state.gateways.insert(key, hostname.clone()) != Some(hostname.clone())
        };
        self.record("create_gateway", gateway_id, mutated);
        Ok(hostname)
    }

    async fn delete_gateway(
        &self,
        project: &str,
        region: &str,
        gateway_id: &str,
    ) -> ProviderResult<()> {
        self.begin("delete_gateway")?;
        let key = format!("{project}/{region}/{gateway_id}");
        let mutated = self.state.lock().unwrap().gateways.remove(&key).is_some();
        self.record("delete_gateway", gateway_id, mutated);
        Ok(())
    }

    async fn create_api_key(
        &self,
        project: &str,
        name: &str,
        _display_name: &str,
        target_service: &str,
    ) -> ProviderResult<String> {
        self.begin("create_api_key")?;
        let key = format!("{project}/{name}");
        let secret = {
            let mut state = self.state.lock().unwrap();
            if state.soft_deleted_keys.contains(&key) {
                return Err(ProviderError::Api(format!(
                    "key name {name} is reserved by a soft-deleted key"
                )));
            }
            if let Some(existing) = state.api_keys.get(&key) {
                let existing = existing.clone();
                drop(state);
                self.record("create_api_key", name, false);
                return Ok(existing);
            }
            let mut secret = String::from("AIza");
            secret.extend(
                rand::thread_rng()
                    .sample_iter(&Alphanumeric)
                    .take(35)
                    .map(char::from),
            );
            state.api_keys.insert(key, secret.clone());
            debug!(name, target_service, "api key created");
            secret
        };
        self.record("create_api_key", name, true);
        Ok(secret)
    }

    async fn delete_api_key(&self, project: &str, name: &str) -> ProviderResult<()> {
        self.begin("delete_api_key")?;
        let key = format!("{project}/{name}");
        let mutated = {
            let mut state = self.state.lock().unwrap();
            let existed = state.api_keys.remove(&key).is_some();
            if existed {
                state.soft_deleted_keys.insert(key);
            }
            existed
        };
        self.record("delete_api_key", name, mutated);
        Ok(())
    }

    async fn lookup_api_key_by_prefix(
        &self,
        project: &str,
        prefix: &str,
    ) -> ProviderResult<Option<(String, String)>> {
        self.begin("lookup_api_key_by_prefix")?;
        let full_prefix = format!("{project}/{prefix}");
        let scope = format!("{project}/");
        let state = self.state.lock().unwrap();
        Ok(state
            .api_keys
            .iter()
            .find(|(name, _)| name.starts_with(&full_prefix))
            .map(|(name, secret)| {
                let name = name.strip_prefix(&scope).unwrap_or(name).to_string();
                (name, secret.clone())
            }))
    }

    async fn delete_api_keys_by_prefix(&self, project: &str, prefix: &str) -> ProviderResult<u32> {
        self.begin("delete_api_keys_by_prefix")?;
        let full_prefix = format!("{project}/{prefix}");
        let deleted = {
            let mut state = self.state.lock().unwrap();
            let doomed: Vec<String> = state
                .api_keys
                .keys()
                .filter(|k| k.starts_with(&full_prefix))
                .cloned()
                .collect();
            for key in &doomed {
                state.api_keys.remove(key);
                state.soft_deleted_keys.insert(key.clone());
            }
            doomed.len() as u32
        };
        self.record("delete_api_keys_by_prefix", prefix, deleted > 0);
        Ok(deleted)
    }

    async fn project_number(&self, project: &str) -> ProviderResult<u64> {
        self.begin("project_number")?;
        let digest = Sha256::digest(project.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        Ok(u64::from_be_bytes(bytes) % 1_000_000_000_000)
    }

    async fn run_command(&self, command: &str) -> ProviderResult<()> {
        self.begin("run_command")?;
        self.state.lock().unwrap().commands.push(command.to_string());
        self.record("run_command", command, true);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn context_with(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (name, contents) in files {
            let mut f = std::fs::File::create(dir.path().join(name)).unwrap();
            write!(f, "{contents}").unwrap();
        }
        dir
    }

    #[tokio::test]
    async fn image_reference_is_digest_qualified() {
        let gcp = SimulatedGcp::new();
        let ctx = context_with(&[("Dockerfile", "FROM scratch\n")]);
        let image = gcp
            .build_and_push_image("r-docker.pkg.dev/p/repo/svc", ctx.path())
            .await
            .unwrap();
        assert!(image.contains("@sha256:"));
        assert!(!image.ends_with(":latest"));
    }

    #[tokio::test]
    async fn unchanged_context_yields_same_digest() {
        let gcp = SimulatedGcp::new();
        let ctx = context_with(&[("Dockerfile", "FROM scratch\n"), ("main.py", "print()\n")]);
        let a = gcp
            .build_and_push_image("base", ctx.path())
            .await
            .unwrap();
        let b = gcp
            .build_and_push_image("base", ctx.path())
            .await
            .unwrap();
        assert_eq!(a, b);
        // Second push found the identical image already there.
        assert!(!gcp.calls().last().unwrap().mutated);
    }

    #[tokio::test]
    async fn changed_context_changes_digest() {
        let gcp = SimulatedGcp::new();
        let ctx = context_with(&[("Dockerfile", "FROM scratch\n")]);
        let a = gcp.build_and_push_image("base", ctx.path()).await.unwrap();
        std::fs::write(ctx.path().join("Dockerfile"), "FROM alpine\n").unwrap();
        let b = gcp.build_and_push_image("base", ctx.path()).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn deploy_rejects_tagged_image() {
        let gcp = SimulatedGcp::new();
        let spec = RunServiceSpec::standard("p", "asia-northeast1", "svc", "repo/svc:latest".into());
        assert!(matches!(
            gcp.deploy_service(&spec).await,
            Err(ProviderError::InvalidImage(_))
        ));
    }

    #[tokio::test]
    async fn soft_deleted_key_name_is_reserved() {
        let gcp = SimulatedGcp::new();
        gcp.create_api_key("p", "svc-key-abc123", "API Key", "svc.goog")
            .await
            .unwrap();
        gcp.delete_api_key("p", "svc-key-abc123").await.unwrap();
        // Same name: blocked for the retention window.
        assert!(gcp
            .create_api_key("p", "svc-key-abc123", "API Key", "svc.goog")
            .await
            .is_err());
        // Fresh suffix: fine.
        assert!(gcp
            .create_api_key("p", "svc-key-xyz789", "API Key", "svc.goog")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn injected_failure_fires_once() {
        let gcp = SimulatedGcp::new();
        gcp.fail_method("enable_service", "quota");
        assert!(gcp.enable_service("p", "run.googleapis.com").await.is_err());
        assert!(gcp.enable_service("p", "run.googleapis.com").await.is_ok());
    }
}
