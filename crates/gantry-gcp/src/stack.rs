//! The composition root: the whole pipeline as one declared graph.
//!
//! Activator → image → backend → gateway → key, plus a final per-API
//! managed-service activation command that waits for everything else. The
//! four stack outputs (gateway URL, key secret, backend URI, image
//! reference) resolve during apply.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use gantry_core::{ImageRef, ProjectContext, StackConfig};
use gantry_graph::{Engine, Graph, GraphError, NodeInfo, Output};

use crate::api::GcpApi;
use crate::components::{
    ApiGatewayForCloudRun, ApiKey, BackendService, ContainerImage, ProjectServices,
};
use crate::error::StackError;

/// Project-level APIs the stack needs enabled before anything is created.
pub const REQUIRED_SERVICES: [&str; 9] = [
    "iam.googleapis.com",
    "cloudresourcemanager.googleapis.com",
    "artifactregistry.googleapis.com",
    "run.googleapis.com",
    "apigateway.googleapis.com",
    "servicecontrol.googleapis.com",
    "servicemanagement.googleapis.com",
    "compute.googleapis.com",
    "apikeys.googleapis.com",
];

/// Everything the stack exports once applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackOutputs {
    /// `https://<gateway default hostname>`.
    pub gateway_url: String,
    /// Raw key secret. Sensitive; redact before display.
    pub api_key: String,
    /// The backend's assigned HTTPS URI.
    pub cloud_run_url: String,
    /// Digest-qualified image reference the backend runs.
    pub image_name: String,
}

struct PendingOutputs {
    hostname: Output<String>,
    key: Output<String>,
    uri: Output<String>,
    image: Output<ImageRef>,
}

/// A declared (not yet applied) stack.
pub struct Stack {
    graph: Graph,
    outputs: PendingOutputs,
}

impl Stack {
    /// Declare every resource. Validates config first; nothing is declared
    /// on invalid input.
    pub fn declare(gcp: Arc<dyn GcpApi>, config: &StackConfig) -> Result<Stack, StackError> {
        config.validate()?;
        let ctx = ProjectContext::new(&config.project, &config.region);
        info!(
            project = %ctx.project,
            region = %ctx.region,
            service = %config.service_name,
            "declaring stack"
        );

        let mut graph = Graph::new();

        let services =
            ProjectServices::register(&mut graph, gcp.clone(), &ctx.project, &REQUIRED_SERVICES)?;

        let image = ContainerImage::register(
            &mut graph,
            gcp.clone(),
            &ctx,
            &config.service_name,
            Path::new(&config.build_context),
            services.all(),
        )?;

        let mut backend_deps = services.all().to_vec();
        backend_deps.push(image.handle);
        let backend = BackendService::register(
            &mut graph,
            gcp.clone(),
            &ctx,
            &config.service_name,
            image.image_name.clone(),
            &backend_deps,
        )?;

        let gateway = ApiGatewayForCloudRun::register(
            &mut graph,
            gcp.clone(),
            &ctx,
            &config.service_name,
            backend.service.clone(),
            backend.handle,
            Path::new(&config.openapi_template),
            services.all(),
        )?;

        let key = ApiKey::register(
            &mut graph,
            gcp.clone(),
            &ctx.project,
            &config.service_name,
            gateway.api.clone(),
            &[gateway.gateway],
        )?;

        // Per-API managed-service activation: distinct from the project-level
        // enables above, and only valid once the gateway's API exists. Gated
        // on gateway, key, and backend all being ready.
        let command = {
            let gcp = gcp.clone();
            let project = ctx.project.clone();
            let api = gateway.api.clone();
            graph.resource(
                "run-after-all-resources-are-ready",
                "command.local",
                &[gateway.gateway, key.handle, backend.handle],
                move || async move {
                    let definition = api.get().await?;
                    gcp.run_command(&format!(
                        "gcloud services enable {} --project={}",
                        definition.managed_service, project
                    ))
                    .await?;
                    Ok(())
                },
            )?
        };
        {
            let project = ctx.project.clone();
            let api_id = config.service_name.clone();
            graph.set_delete(command, move || async move {
                let definition = gcp.lookup_api(&project, &api_id).await?;
                gcp.run_command(&format!(
                    "gcloud services disable {} --project={}",
                    definition.managed_service, project
                ))
                .await?;
                Ok(())
            });
        }

        Ok(Stack {
            graph,
            outputs: PendingOutputs {
                hostname: gateway.hostname,
                key: key.key_string,
                uri: backend.uri,
                image: image.image_name,
            },
        })
    }

    /// Declared nodes with their dependency edges, for previews.
    pub fn nodes(&self) -> Vec<NodeInfo> {
        self.graph.nodes()
    }

    /// Apply the graph and collect the resolved outputs.
    pub async fn up(self) -> Result<StackOutputs, StackError> {
        let outputs = self.outputs;
        let report = Engine::apply(self.graph).await?;
        report.into_apply_result()?;
        Ok(StackOutputs {
            gateway_url: format!("https://{}", outputs.hostname.get().await?),
            api_key: outputs.key.get().await?,
            cloud_run_url: outputs.uri.get().await?,
            image_name: outputs.image.get().await?,
        })
    }

    /// Tear down in reverse dependency order. Service activations are
    /// retained.
    pub async fn down(self) -> Result<(), StackError> {
        let report = Engine::destroy(self.graph).await?;
        let failed = report.failed();
        if failed > 0 {
            return Err(GraphError::DestroyFailed { failed }.into());
        }
        Ok(())
    }
}
