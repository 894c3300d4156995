//! Image repository plus container build/push.
//!
//! The output is the digest-qualified image reference, resolved only after
//! the push completes. Downstream consumers therefore always pin an exact,
//! immutable image version, never a mutable tag.

use std::path::Path;
use std::sync::Arc;

use gantry_core::{ImageRef, ProjectContext};
use gantry_graph::{Graph, GraphResult, Output, ResourceHandle};

use crate::api::GcpApi;

pub struct ContainerImage {
    /// Digest-qualified reference; pending until the push finishes.
    pub image_name: Output<ImageRef>,
    /// The push node, for downstream `depends_on` lists.
    pub handle: ResourceHandle,
}

impl ContainerImage {
    pub fn register(
        graph: &mut Graph,
        gcp: Arc<dyn GcpApi>,
        ctx: &ProjectContext,
        service_name: &str,
        build_context: &Path,
        depends_on: &[ResourceHandle],
    ) -> GraphResult<Self> {
        let repository_id = format!("{service_name}-repo");

        let repo = {
            let gcp = gcp.clone();
            let ctx = ctx.clone();
            let repository_id = repository_id.clone();
            graph.resource(
                &format!("{service_name}-repo"),
                "artifactregistry.Repository",
                depends_on,
                move || async move {
                    gcp.create_repository(&ctx.project, &ctx.region, &repository_id)
                        .await?;
                    Ok(())
                },
            )?
        };
        {
            let gcp = gcp.clone();
            let ctx = ctx.clone();
            let repository_id = repository_id.clone();
            graph.set_delete(repo, move || async move {
                gcp.delete_repository(&ctx.project, &ctx.region, &repository_id)
                    .await?;
                Ok(())
            });
        }

        let base_name = format!(
            "{region}-docker.pkg.dev/{project}/{repository_id}/{service_name}",
            region = ctx.region,
            project = ctx.project,
        );
        let (slot, image_name) = Output::pending();
        let handle = {
            let build_context = build_context.to_path_buf();
            graph.resource(
                &format!("{service_name}-image"),
                "docker.Image",
                &[repo],
                move || async move {
                    let image_ref = gcp.build_and_push_image(&base_name, &build_context).await?;
                    slot.set(image_ref);
                    Ok(())
                },
            )?
        };

        Ok(ContainerImage { image_name, handle })
    }
}
