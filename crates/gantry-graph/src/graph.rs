//! Resource declarations: named nodes with explicit dependency edges.
//!
//! Handles are only minted by [`Graph::resource`], so an edge can only point
//! at an already-registered node and cycles cannot be constructed.
//! Ordering guarantees come exclusively from declared edges; two nodes with
//! no edge between them may run in either order or concurrently.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;

use crate::error::{GraphError, GraphResult};

/// Boxed future returned by a resource's create or delete closure.
pub type ResourceFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'static>>;

type StepFn = Box<dyn FnOnce() -> ResourceFuture + Send + 'static>;

/// Opaque handle to a registered resource, used to declare edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceHandle(pub(crate) usize);

pub(crate) struct ResourceNode {
    pub(crate) name: String,
    pub(crate) kind: String,
    pub(crate) deps: Vec<usize>,
    pub(crate) create: StepFn,
    pub(crate) delete: Option<StepFn>,
}

/// Read-only view of a declared node, for previews and assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub name: String,
    pub kind: String,
    pub deps: Vec<String>,
}

/// A set of declared resources awaiting apply or destroy.
#[derive(Default)]
pub struct Graph {
    pub(crate) nodes: Vec<ResourceNode>,
    names: HashSet<String>,
}

impl Graph {
    pub fn new() -> Self {
        Graph::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Register a resource. `deps` are the nodes whose creation must finish
    /// before this one starts. Names must be unique across the graph.
    pub fn resource<F, Fut>(
        &mut self,
        name: &str,
        kind: &str,
        deps: &[ResourceHandle],
        create: F,
    ) -> GraphResult<ResourceHandle>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        if !self.names.insert(name.to_string()) {
            return Err(GraphError::DuplicateName(name.to_string()));
        }
        let mut dep_ids: Vec<usize> = deps.iter().map(|h| h.0).collect();
        dep_ids.sort_unstable();
        dep_ids.dedup();
        let idx = self.nodes.len();
        self.nodes.push(ResourceNode {
            name: name.to_string(),
            kind: kind.to_string(),
            deps: dep_ids,
            create: Box::new(move || Box::pin(create()) as ResourceFuture),
            delete: None,
        });
        Ok(ResourceHandle(idx))
    }

    /// Attach a delete closure, run on destroy in reverse dependency order.
    /// Nodes without one are left alone on teardown (e.g. service
    /// activations that must survive a stack destroy).
    pub fn set_delete<F, Fut>(&mut self, handle: ResourceHandle, delete: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.nodes[handle.0].delete = Some(Box::new(move || Box::pin(delete()) as ResourceFuture));
    }

    /// Snapshot of the declared nodes in registration order.
    pub fn nodes(&self) -> Vec<NodeInfo> {
        self.nodes
            .iter()
            .map(|n| NodeInfo {
                name: n.name.clone(),
                kind: n.kind.clone(),
                deps: n.deps.iter().map(|&d| self.nodes[d].name.clone()).collect(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_names_rejected() {
        let mut graph = Graph::new();
        graph
            .resource("svc", "run.Service", &[], || async { Ok(()) })
            .unwrap();
        let err = graph.resource("svc", "run.Service", &[], || async { Ok(()) });
        assert!(matches!(err, Err(GraphError::DuplicateName(_))));
    }

    #[test]
    fn edges_resolve_to_names() {
        let mut graph = Graph::new();
        let a = graph
            .resource("repo", "artifactregistry.Repository", &[], || async {
                Ok(())
            })
            .unwrap();
        graph
            .resource("image", "docker.Image", &[a], || async { Ok(()) })
            .unwrap();

        let nodes = graph.nodes();
        assert_eq!(nodes[1].deps, vec!["repo".to_string()]);
    }

    #[test]
    fn duplicate_edges_are_collapsed() {
        let mut graph = Graph::new();
        let a = graph
            .resource("a", "test", &[], || async { Ok(()) })
            .unwrap();
        graph
            .resource("b", "test", &[a, a], || async { Ok(()) })
            .unwrap();
        assert_eq!(graph.nodes()[1].deps.len(), 1);
    }
}
