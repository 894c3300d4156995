//! API Gateway publishing for a Cloud Run backend.
//!
//! Declares the api → config → gateway chain (one definition, one versioned
//! config, one deployed gateway) and grants the gateway's Google-managed
//! invoking identity permission to call the backend. The OpenAPI template is
//! read and substituted inside the config node's create closure, i.e. only
//! once the backend URI has resolved.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use gantry_core::{ApiDefinition, ProjectContext, RunService};
use gantry_graph::{Graph, GraphResult, Output, ResourceHandle};

use crate::api::GcpApi;
use crate::template::{self, EncodedDocument};

/// Domain of the Google-managed API Gateway service identity.
pub const GATEWAY_SA_DOMAIN: &str = "gcp-sa-apigateway.iam.gserviceaccount.com";

/// The invoking identity's email, derived from the numeric project number.
pub fn gateway_service_account(project_number: u64) -> String {
    format!("service-{project_number}@{GATEWAY_SA_DOMAIN}")
}

pub struct ApiGatewayForCloudRun {
    /// API definition handle; the key issuer restricts against its managed
    /// service.
    pub api: Output<ApiDefinition>,
    /// The gateway's externally reachable default hostname.
    pub hostname: Output<String>,
    /// The gateway node, for downstream `depends_on` lists.
    pub gateway: ResourceHandle,
}

impl ApiGatewayForCloudRun {
    pub fn register(
        graph: &mut Graph,
        gcp: Arc<dyn GcpApi>,
        ctx: &ProjectContext,
        service_name: &str,
        service: Output<RunService>,
        backend: ResourceHandle,
        template_path: &Path,
        depends_on: &[ResourceHandle],
    ) -> GraphResult<Self> {
        let api_id = service_name.to_string();
        let config_id = format!("{service_name}-config");

        // API definition: the unit that scopes configs and key restrictions.
        let (api_slot, api) = Output::pending();
        let api_node = {
            let gcp = gcp.clone();
            let project = ctx.project.clone();
            let api_id = api_id.clone();
            graph.resource(
                &format!("{service_name}-api"),
                "apigateway.Api",
                depends_on,
                move || async move {
                    let definition = gcp.create_api(&project, &api_id).await?;
                    api_slot.set(definition);
                    Ok(())
                },
            )?
        };
        {
            let gcp = gcp.clone();
            let project = ctx.project.clone();
            let api_id = api_id.clone();
            graph.set_delete(api_node, move || async move {
                gcp.delete_api(&project, &api_id).await?;
                Ok(())
            });
        }

        // Versioned config: template substitution happens here, after the
        // backend URI is known.
        let config_node = {
            let gcp = gcp.clone();
            let project = ctx.project.clone();
            let api_id = api_id.clone();
            let config_id = config_id.clone();
            let template_path: PathBuf = template_path.to_path_buf();
            let service = service.clone();
            graph.resource(
                &format!("{service_name}-api-config"),
                "apigateway.ApiConfig",
                &[api_node, backend],
                move || async move {
                    let uri = service.get().await?.uri;
                    let raw = std::fs::read_to_string(&template_path)?;
                    let substituted = template::substitute(&raw, &uri);
                    debug!(%uri, "openapi template substituted");
                    let document = EncodedDocument::new("openapi.yaml", &substituted);
                    gcp.create_api_config(&project, &api_id, &config_id, &document)
                        .await?;
                    Ok(())
                },
            )?
        };
        {
            let gcp = gcp.clone();
            let project = ctx.project.clone();
            let api_id = api_id.clone();
            let config_id = config_id.clone();
            graph.set_delete(config_node, move || async move {
                gcp.delete_api_config(&project, &api_id, &config_id).await?;
                Ok(())
            });
        }

        // The gateway is the resource with the externally reachable hostname.
        let (hostname_slot, hostname) = Output::pending();
        let gateway = {
            let gcp = gcp.clone();
            let ctx = ctx.clone();
            let gateway_id = service_name.to_string();
            let api_id = api_id.clone();
            let config_id = config_id.clone();
            graph.resource(
                &format!("{service_name}-gateway"),
                "apigateway.Gateway",
                &[config_node],
                move || async move {
                    let host = gcp
                        .create_gateway(&ctx.project, &ctx.region, &gateway_id, &api_id, &config_id)
                        .await?;
                    hostname_slot.set(host);
                    Ok(())
                },
            )?
        };
        {
            let gcp = gcp.clone();
            let ctx = ctx.clone();
            let gateway_id = service_name.to_string();
            graph.set_delete(gateway, move || async move {
                gcp.delete_gateway(&ctx.project, &ctx.region, &gateway_id)
                    .await?;
                Ok(())
            });
        }

        // Invoker grant. Deliberately NOT an upstream dependency of the
        // gateway: the two may complete in either order, and a gateway that
        // exists before the grant propagates will see transient 403s from
        // the backend until it does.
        let invoker = {
            let gcp = gcp.clone();
            let ctx = ctx.clone();
            graph.resource(
                &format!("{service_name}-gateway-invoker"),
                "run.ServiceIamMember",
                &[backend],
                move || async move {
                    let deployed = service.get().await?;
                    let number = gcp.project_number(&ctx.project).await?;
                    let member = format!("serviceAccount:{}", gateway_service_account(number));
                    gcp.grant_run_invoker(
                        &deployed.project,
                        &deployed.location,
                        &deployed.name,
                        &member,
                    )
                    .await?;
                    Ok(())
                },
            )?
        };
        {
            let ctx = ctx.clone();
            let service_name = service_name.to_string();
            graph.set_delete(invoker, move || async move {
                let number = gcp.project_number(&ctx.project).await?;
                let member = format!("serviceAccount:{}", gateway_service_account(number));
                gcp.revoke_run_invoker(&ctx.project, &ctx.region, &service_name, &member)
                    .await?;
                Ok(())
            });
        }

        Ok(ApiGatewayForCloudRun {
            api,
            hostname,
            gateway,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_account_follows_fixed_pattern() {
        assert_eq!(
            gateway_service_account(123456789012),
            "service-123456789012@gcp-sa-apigateway.iam.gserviceaccount.com"
        );
    }
}
