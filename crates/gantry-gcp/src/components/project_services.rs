//! Project-level API activation.
//!
//! Enables each named cloud API for the project, one activation record per
//! name. Activations register no delete closure: disabling a shared API on
//! stack destroy would break unrelated dependents still using it
//! (`disable_on_destroy = false` in provider terms).

use std::sync::Arc;

use gantry_graph::{Graph, GraphResult, ResourceHandle};

use crate::api::GcpApi;

pub struct ProjectServices {
    handles: Vec<ResourceHandle>,
}

impl ProjectServices {
    pub fn register(
        graph: &mut Graph,
        gcp: Arc<dyn GcpApi>,
        project: &str,
        services: &[&str],
    ) -> GraphResult<Self> {
        let mut handles = Vec::with_capacity(services.len());
        for service in services {
            let gcp = gcp.clone();
            let project = project.to_string();
            let service = service.to_string();
            let name = format!("enable-{service}");
            let handle = graph.resource(&name, "projects.Service", &[], move || async move {
                gcp.enable_service(&project, &service).await?;
                Ok(())
            })?;
            handles.push(handle);
        }
        Ok(ProjectServices { handles })
    }

    /// Handles for downstream `depends_on` lists.
    pub fn all(&self) -> &[ResourceHandle] {
        &self.handles
    }
}
