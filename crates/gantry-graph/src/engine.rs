//! Graph execution: parallel apply and reverse-order destroy.
//!
//! One tokio task per node. Apply gates each task on its dependencies'
//! completion; destroy gates each task on its dependents' completion. A
//! failed node marks its transitive dependents skipped and leaves everything
//! already created untouched, so a subsequent re-apply can pick up where the
//! failure happened. No in-process retries; the provider boundary owns
//! retry semantics.

use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::{GraphError, GraphResult};
use crate::graph::Graph;

/// Outcome of one node during apply or destroy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeStatus {
    Created,
    Deleted,
    /// No delete closure registered; left alone on destroy.
    Retained,
    Failed(String),
    /// Not attempted because a dependency (apply) or dependent (destroy)
    /// failed or was itself skipped.
    Skipped,
}

/// Per-node outcomes in registration order.
#[derive(Debug)]
pub struct ApplyReport {
    pub entries: Vec<(String, NodeStatus)>,
}

impl ApplyReport {
    pub fn failed(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, s)| matches!(s, NodeStatus::Failed(_)))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, s)| matches!(s, NodeStatus::Skipped))
            .count()
    }

    pub fn is_clean(&self) -> bool {
        self.failed() == 0 && self.skipped() == 0
    }

    pub fn status_of(&self, name: &str) -> Option<&NodeStatus> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    /// Error if anything failed or was skipped during apply.
    pub fn into_apply_result(self) -> GraphResult<ApplyReport> {
        if self.is_clean() {
            Ok(self)
        } else {
            Err(GraphError::ApplyFailed {
                failed: self.failed(),
                skipped: self.skipped(),
            })
        }
    }
}

/// The graph executor. Stateless; consumes the graph it runs.
pub struct Engine;

impl Engine {
    /// Create every declared resource, respecting dependency edges.
    /// Independent branches run concurrently.
    pub async fn apply(graph: Graph) -> GraphResult<ApplyReport> {
        let count = graph.nodes.len();
        info!(resources = count, "applying resource graph");

        // Completion channel per node: None = pending, Some(ok) = finished.
        let mut txs = Vec::with_capacity(count);
        let mut rxs = Vec::with_capacity(count);
        for _ in 0..count {
            let (tx, rx) = watch::channel(None::<bool>);
            txs.push(tx);
            rxs.push(rx);
        }

        let mut set = JoinSet::new();
        for (idx, node) in graph.nodes.into_iter().enumerate() {
            let dep_rxs: Vec<_> = node.deps.iter().map(|&d| rxs[d].clone()).collect();
            let done = txs[idx].clone();
            let name = node.name;
            let kind = node.kind;
            let create = node.create;

            set.spawn(async move {
                let deps_ok = wait_all(dep_rxs).await;
                if !deps_ok {
                    debug!(resource = %name, "skipped: upstream failure");
                    let _ = done.send(Some(false));
                    return (idx, name, NodeStatus::Skipped);
                }
                debug!(resource = %name, kind = %kind, "creating");
                match (create)().await {
                    Ok(()) => {
                        info!(resource = %name, kind = %kind, "created");
                        let _ = done.send(Some(true));
                        (idx, name, NodeStatus::Created)
                    }
                    Err(e) => {
                        warn!(resource = %name, kind = %kind, error = %e, "create failed");
                        let _ = done.send(Some(false));
                        (idx, name, NodeStatus::Failed(e.to_string()))
                    }
                }
            });
        }
        drop(txs);

        collect(set, count).await
    }

    /// Delete resources in reverse dependency order: a node's delete runs
    /// only after every node that depends on it has finished tearing down.
    pub async fn destroy(graph: Graph) -> GraphResult<ApplyReport> {
        let count = graph.nodes.len();
        info!(resources = count, "destroying resource graph");

        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];
        for (idx, node) in graph.nodes.iter().enumerate() {
            for &dep in &node.deps {
                dependents[dep].push(idx);
            }
        }

        let mut txs = Vec::with_capacity(count);
        let mut rxs = Vec::with_capacity(count);
        for _ in 0..count {
            let (tx, rx) = watch::channel(None::<bool>);
            txs.push(tx);
            rxs.push(rx);
        }

        let mut set = JoinSet::new();
        for (idx, node) in graph.nodes.into_iter().enumerate() {
            let gate_rxs: Vec<_> = dependents[idx].iter().map(|&d| rxs[d].clone()).collect();
            let done = txs[idx].clone();
            let name = node.name;
            let delete = node.delete;

            set.spawn(async move {
                // Wait for dependents regardless of their outcome; a failed
                // child delete must not strand the parent forever, only
                // order it.
                wait_all(gate_rxs).await;
                match delete {
                    None => {
                        debug!(resource = %name, "retained on destroy");
                        let _ = done.send(Some(true));
                        (idx, name, NodeStatus::Retained)
                    }
                    Some(f) => match f().await {
                        Ok(()) => {
                            info!(resource = %name, "deleted");
                            let _ = done.send(Some(true));
                            (idx, name, NodeStatus::Deleted)
                        }
                        Err(e) => {
                            warn!(resource = %name, error = %e, "delete failed");
                            let _ = done.send(Some(false));
                            (idx, name, NodeStatus::Failed(e.to_string()))
                        }
                    },
                }
            });
        }
        drop(txs);

        collect(set, count).await
    }
}

/// Await every channel reaching a finished state; true iff all succeeded.
async fn wait_all(gates: Vec<watch::Receiver<Option<bool>>>) -> bool {
    let mut all_ok = true;
    for mut rx in gates {
        match rx.wait_for(|v| v.is_some()).await {
            Ok(guard) => {
                if *guard != Some(true) {
                    all_ok = false;
                }
            }
            // Sender dropped without finishing: counts as failure.
            Err(_) => all_ok = false,
        }
    }
    all_ok
}

async fn collect(
    mut set: JoinSet<(usize, String, NodeStatus)>,
    count: usize,
) -> GraphResult<ApplyReport> {
    let mut slots: Vec<Option<(String, NodeStatus)>> = (0..count).map(|_| None).collect();
    while let Some(joined) = set.join_next().await {
        let (idx, name, status) = joined.map_err(|e| GraphError::ResourceFailed {
            name: "<task>".to_string(),
            source: e.into(),
        })?;
        slots[idx] = Some((name, status));
    }
    Ok(ApplyReport {
        entries: slots.into_iter().flatten().collect(),
    })
}
