//! Restricted API key issuance.
//!
//! The provider soft-deletes keys by name for 30 days, so a fixed name would
//! make destroy-then-recreate fail with a collision. A random
//! lowercase-alphanumeric suffix sidesteps the reservation, but only a
//! destroy consumes it: re-apply first looks for a live key under the
//! `<serviceName>-key-` prefix and reuses it, so unchanged inputs never
//! accumulate keys. The key is restricted to the target API's managed
//! service only.

use std::sync::Arc;

use rand::Rng;
use tracing::debug;

use gantry_core::ApiDefinition;
use gantry_graph::{Graph, GraphResult, Output, ResourceHandle};

use crate::api::GcpApi;

/// Length of the random name suffix (collision odds ≈ 1/36^6 per pair).
pub const SUFFIX_LEN: usize = 6;

const SUFFIX_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// A fresh lowercase-alphanumeric suffix.
pub fn random_suffix(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| SUFFIX_CHARSET[rng.gen_range(0..SUFFIX_CHARSET.len())] as char)
        .collect()
}

pub struct ApiKey {
    /// The raw key secret. Sensitive.
    pub key_string: Output<String>,
    /// The resource name actually in use, `<serviceName>-key-<suffix>`;
    /// resolves to the reused name on re-apply, a fresh one otherwise.
    pub name: Output<String>,
    pub handle: ResourceHandle,
}

impl ApiKey {
    pub fn register(
        graph: &mut Graph,
        gcp: Arc<dyn GcpApi>,
        project: &str,
        service_name: &str,
        api: Output<ApiDefinition>,
        depends_on: &[ResourceHandle],
    ) -> GraphResult<Self> {
        let prefix = format!("{service_name}-key-");
        let display_name = format!("API Key for {service_name}");

        let (secret_slot, key_string) = Output::pending();
        let (name_slot, name) = Output::pending();
        let handle = {
            let gcp = gcp.clone();
            let project = project.to_string();
            let prefix = prefix.clone();
            graph.resource(
                &format!("{service_name}-api-key"),
                "projects.ApiKey",
                depends_on,
                move || async move {
                    let definition = api.get().await?;
                    // A previous apply's key stays good; only a destroy
                    // retires the name and forces a fresh suffix.
                    if let Some((existing, secret)) =
                        gcp.lookup_api_key_by_prefix(&project, &prefix).await?
                    {
                        debug!(name = %existing, "reusing live api key");
                        name_slot.set(existing);
                        secret_slot.set(secret);
                        return Ok(());
                    }
                    let key_name = format!("{prefix}{}", random_suffix(SUFFIX_LEN));
                    // Least privilege: this key opens the target API only.
                    let secret = gcp
                        .create_api_key(
                            &project,
                            &key_name,
                            &display_name,
                            &definition.managed_service,
                        )
                        .await?;
                    name_slot.set(key_name);
                    secret_slot.set(secret);
                    Ok(())
                },
            )?
        };
        {
            let project = project.to_string();
            // A destroy runs in a fresh process that never saw the suffix a
            // previous apply drew, so teardown sweeps by prefix.
            graph.set_delete(handle, move || async move {
                gcp.delete_api_keys_by_prefix(&project, &prefix).await?;
                Ok(())
            });
        }

        Ok(ApiKey {
            key_string,
            name,
            handle,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulated::SimulatedGcp;
    use gantry_graph::Engine;

    #[test]
    fn suffix_has_requested_length_and_charset() {
        let suffix = random_suffix(SUFFIX_LEN);
        assert_eq!(suffix.len(), SUFFIX_LEN);
        assert!(
            suffix
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
        );
    }

    #[test]
    fn independent_suffixes_differ() {
        // 1/36^6 collision odds; a flake here means the generator is broken.
        assert_ne!(random_suffix(SUFFIX_LEN), random_suffix(SUFFIX_LEN));
    }

    #[test]
    fn key_name_satisfies_resource_constraints() {
        let name = format!("mcp-on-cloudrun-key-{}", random_suffix(SUFFIX_LEN));
        assert!(name.len() <= 63);
        assert!(
            name.bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
        );
    }

    /// Declare and apply just the key node; returns (name, secret).
    async fn issue_key(gcp: Arc<SimulatedGcp>) -> (String, String) {
        let mut graph = Graph::new();
        let api = Output::resolved(ApiDefinition {
            api_id: "svc".to_string(),
            managed_service: "svc-abc.apigateway.p.cloud.goog".to_string(),
        });
        let key = ApiKey::register(&mut graph, gcp, "p", "svc", api, &[]).unwrap();
        let report = Engine::apply(graph).await.unwrap();
        assert!(report.is_clean());
        (
            key.name.get().await.unwrap(),
            key.key_string.get().await.unwrap(),
        )
    }

    #[tokio::test]
    async fn first_apply_mints_a_suffixed_name() {
        let gcp = Arc::new(SimulatedGcp::new());
        let (name, secret) = issue_key(gcp.clone()).await;
        assert!(name.starts_with("svc-key-"));
        assert_eq!(name.len(), "svc-key-".len() + SUFFIX_LEN);
        assert!(secret.starts_with("AIza"));
    }

    #[tokio::test]
    async fn reapply_reuses_the_live_key() {
        let gcp = Arc::new(SimulatedGcp::new());
        let first = issue_key(gcp.clone()).await;
        let second = issue_key(gcp.clone()).await;
        assert_eq!(first, second);
        assert_eq!(gcp.live_key_names().len(), 1);
        // Exactly one create ever reached the provider.
        let creates = gcp
            .calls()
            .iter()
            .filter(|c| c.method == "create_api_key")
            .count();
        assert_eq!(creates, 1);
    }
}
