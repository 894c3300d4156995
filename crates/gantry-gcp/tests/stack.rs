//! End-to-end stack scenarios against the simulated provider.

use std::sync::Arc;

use gantry_core::StackConfig;
use gantry_gcp::{SimulatedGcp, Stack};

const TEMPLATE: &str = "\
swagger: '2.0'
info:
  title: mcp-on-cloudrun
  version: 1.0.0
x-google-backend:
  address: ${cloud_run_url}
paths:
  /mcp:
    post:
      operationId: mcp
      x-google-backend:
        address: ${cloud_run_url}/mcp
      security:
        - api_key: []
";

/// A build context and template on disk, plus a config pointing at them.
fn fixture() -> (tempfile::TempDir, StackConfig) {
    let dir = tempfile::tempdir().unwrap();
    let context = dir.path().join("mcp-server");
    std::fs::create_dir(&context).unwrap();
    std::fs::write(context.join("Dockerfile"), "FROM python:3.13-slim\n").unwrap();
    std::fs::write(context.join("server.py"), "app = build_app()\n").unwrap();
    let template = dir.path().join("openapi.yaml");
    std::fs::write(&template, TEMPLATE).unwrap();

    let config = StackConfig {
        project: "demo-proj".into(),
        build_context: context.display().to_string(),
        openapi_template: template.display().to_string(),
        ..StackConfig::default()
    };
    (dir, config)
}

#[tokio::test]
async fn end_to_end_outputs() {
    let (_dir, config) = fixture();
    // Region left unset: defaults to asia-northeast1.
    assert_eq!(config.region, "asia-northeast1");

    let gcp = Arc::new(SimulatedGcp::new());
    let stack = Stack::declare(gcp.clone(), &config).unwrap();
    let outputs = stack.up().await.unwrap();

    assert!(outputs.gateway_url.starts_with("https://"));
    assert!(outputs.gateway_url.ends_with(".gateway.dev"));
    assert!(outputs.cloud_run_url.starts_with("https://mcp-on-cloudrun-"));
    assert!(outputs.cloud_run_url.ends_with(".run.app"));
    assert!(!outputs.api_key.is_empty());
    assert!(outputs.image_name.contains("@sha256:"));
    assert!(
        outputs
            .image_name
            .starts_with("asia-northeast1-docker.pkg.dev/demo-proj/mcp-on-cloudrun-repo/")
    );

    // All nine project-level activations happened.
    assert_eq!(gcp.enabled_services("demo-proj").len(), 9);

    // Exactly one key, under the suffixed name the component generated.
    let keys = gcp.live_key_names();
    assert_eq!(keys.len(), 1);
    assert!(keys[0].starts_with("demo-proj/mcp-on-cloudrun-key-"));

    // The post-deploy command enabled the API's managed service.
    let commands = gcp.commands();
    assert_eq!(commands.len(), 1);
    assert!(commands[0].starts_with("gcloud services enable mcp-on-cloudrun-"));
    assert!(commands[0].contains(".apigateway.demo-proj.cloud.goog"));
    assert!(commands[0].ends_with("--project=demo-proj"));
}

#[tokio::test]
async fn substituted_config_reaches_the_provider() {
    let (_dir, config) = fixture();
    let gcp = Arc::new(SimulatedGcp::new());
    let outputs = Stack::declare(gcp.clone(), &config)
        .unwrap()
        .up()
        .await
        .unwrap();

    let document = gcp
        .api_config_document("demo-proj", "mcp-on-cloudrun", "mcp-on-cloudrun-config")
        .unwrap();
    assert!(!document.contains("${cloud_run_url}"));
    assert_eq!(document.matches(&outputs.cloud_run_url).count(), 2);
    // Untouched parts of the template survive byte-for-byte.
    assert!(document.contains("title: mcp-on-cloudrun"));
}

#[tokio::test]
async fn reapply_with_unchanged_inputs_does_not_churn() {
    let (_dir, config) = fixture();
    let gcp = Arc::new(SimulatedGcp::new());

    let first = Stack::declare(gcp.clone(), &config)
        .unwrap()
        .up()
        .await
        .unwrap();
    let calls_before = gcp.calls().len();

    let second = Stack::declare(gcp.clone(), &config)
        .unwrap()
        .up()
        .await
        .unwrap();

    assert_eq!(first.image_name, second.image_name);
    assert_eq!(first.cloud_run_url, second.cloud_run_url);
    assert_eq!(first.gateway_url, second.gateway_url);
    // The live key is reused, secret and all; no second key appears.
    assert_eq!(first.api_key, second.api_key);
    assert_eq!(gcp.live_key_names().len(), 1);

    // No resource was modified on the second pass; only the activation
    // command re-ran.
    let second_pass = &gcp.calls()[calls_before..];
    for call in second_pass {
        if call.method == "run_command" {
            continue;
        }
        assert!(
            !call.mutated,
            "{} on {} mutated during re-apply",
            call.method, call.resource
        );
    }
}

#[tokio::test]
async fn destroy_then_recreate_issues_a_distinct_key() {
    let (_dir, config) = fixture();
    let gcp = Arc::new(SimulatedGcp::new());

    let first = Stack::declare(gcp.clone(), &config)
        .unwrap()
        .up()
        .await
        .unwrap();

    Stack::declare(gcp.clone(), &config)
        .unwrap()
        .down()
        .await
        .unwrap();
    assert!(gcp.live_key_names().is_empty());

    // Recreate: the soft-deleted name stays reserved, but the fresh suffix
    // sidesteps it.
    let second = Stack::declare(gcp.clone(), &config)
        .unwrap()
        .up()
        .await
        .unwrap();
    assert_ne!(first.api_key, second.api_key);
    assert_eq!(gcp.live_key_names().len(), 1);
}

#[tokio::test]
async fn destroy_retains_project_activations_and_disables_managed_service() {
    let (_dir, config) = fixture();
    let gcp = Arc::new(SimulatedGcp::new());

    Stack::declare(gcp.clone(), &config)
        .unwrap()
        .up()
        .await
        .unwrap();
    Stack::declare(gcp.clone(), &config)
        .unwrap()
        .down()
        .await
        .unwrap();

    // Shared project-level APIs survive teardown.
    assert_eq!(gcp.enabled_services("demo-proj").len(), 9);

    let commands = gcp.commands();
    assert_eq!(commands.len(), 2);
    assert!(commands[1].starts_with("gcloud services disable "));
}

#[tokio::test]
async fn failed_deploy_leaves_upstream_intact_and_skips_downstream() {
    let (_dir, config) = fixture();
    let gcp = Arc::new(SimulatedGcp::new());
    gcp.fail_method("deploy_service", "quota exceeded");

    let result = Stack::declare(gcp.clone(), &config).unwrap().up().await;
    assert!(result.is_err());

    let methods: Vec<String> = gcp.calls().iter().map(|c| c.method.clone()).collect();
    // Upstream finished and stays put for the retry.
    assert!(methods.contains(&"create_repository".to_string()));
    assert!(methods.contains(&"build_and_push_image".to_string()));
    // Everything downstream of the deploy never ran.
    assert!(!methods.contains(&"create_api_config".to_string()));
    assert!(!methods.contains(&"create_gateway".to_string()));
    assert!(!methods.contains(&"create_api_key".to_string()));
    assert!(!methods.contains(&"run_command".to_string()));

    // A clean retry succeeds against the surviving resources.
    let outputs = Stack::declare(gcp.clone(), &config)
        .unwrap()
        .up()
        .await
        .unwrap();
    assert!(outputs.image_name.contains("@sha256:"));
}

#[tokio::test]
async fn invoker_grant_lands_even_though_it_is_unordered() {
    let (_dir, config) = fixture();
    let gcp = Arc::new(SimulatedGcp::new());
    Stack::declare(gcp.clone(), &config)
        .unwrap()
        .up()
        .await
        .unwrap();

    let grants = gcp.invoker_grants("mcp-on-cloudrun");
    assert_eq!(grants.len(), 1);
    assert!(grants[0].starts_with("serviceAccount:service-"));
    assert!(grants[0].ends_with("@gcp-sa-apigateway.iam.gserviceaccount.com"));
}
