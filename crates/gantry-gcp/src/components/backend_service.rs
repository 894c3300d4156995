//! Managed container service deployment (Cloud Run).
//!
//! One container, fixed limits (1 CPU / 1Gi), port 8080, open ingress. The
//! URI is assigned by the provider and resolves only after the deploy
//! completes; everything that routes to the backend consumes it as a
//! deferred output.

use std::sync::Arc;

use gantry_core::{ImageRef, ProjectContext, RunService};
use gantry_graph::{Graph, GraphResult, Output, ResourceHandle};

use crate::api::{GcpApi, RunServiceSpec};

pub struct BackendService {
    /// Full service handle (name, location, assigned URI).
    pub service: Output<RunService>,
    /// The assigned HTTPS URI alone.
    pub uri: Output<String>,
    pub handle: ResourceHandle,
}

impl BackendService {
    pub fn register(
        graph: &mut Graph,
        gcp: Arc<dyn GcpApi>,
        ctx: &ProjectContext,
        service_name: &str,
        image_name: Output<ImageRef>,
        depends_on: &[ResourceHandle],
    ) -> GraphResult<Self> {
        let (service_slot, service) = Output::pending();
        let (uri_slot, uri) = Output::pending();

        let handle = {
            let gcp = gcp.clone();
            let ctx = ctx.clone();
            let service_name = service_name.to_string();
            graph.resource(
                &format!("{service_name}-service"),
                "run.Service",
                depends_on,
                move || async move {
                    // Resolved by the image push; the dependency edge makes
                    // this await return immediately.
                    let image = image_name.get().await?;
                    let spec =
                        RunServiceSpec::standard(&ctx.project, &ctx.region, &service_name, image);
                    let deployed = gcp.deploy_service(&spec).await?;
                    uri_slot.set(deployed.uri.clone());
                    service_slot.set(deployed);
                    Ok(())
                },
            )?
        };
        {
            let ctx = ctx.clone();
            let service_name = service_name.to_string();
            graph.set_delete(handle, move || async move {
                gcp.delete_service(&ctx.project, &ctx.region, &service_name)
                    .await?;
                Ok(())
            });
        }

        Ok(BackendService {
            service,
            uri,
            handle,
        })
    }
}
