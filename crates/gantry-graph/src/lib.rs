//! gantry-graph — declarative resource graph with deferred outputs.
//!
//! Resources are declared as named nodes with explicit dependency edges and
//! async create/delete closures. The engine:
//!
//! - Runs independent branches concurrently (one tokio task per node)
//! - Serializes dependent nodes (a node starts only after its declared
//!   dependencies have been created)
//! - Skips the transitive dependents of a failed node, leaving everything
//!   already created intact for a later re-apply
//! - Tears down in reverse dependency order
//!
//! Cross-resource values (a URI assigned on deploy, a digest known after a
//! push) are modeled as [`Output`] deferred values: consumers `get().await`
//! them inside their own create closure, never synchronously at declaration
//! time.
//!
//! # Architecture
//!
//! ```text
//! Graph (declaration time)
//!   ├── ResourceNode { name, kind, deps, create, delete }
//!   └── Output/OutputSlot pairs wiring producer → consumer
//! Engine (apply time)
//!   └── JoinSet: one task per node, gated on dependency completion
//! ```

pub mod engine;
pub mod error;
pub mod graph;
pub mod output;

pub use engine::{ApplyReport, Engine, NodeStatus};
pub use error::{GraphError, GraphResult};
pub use graph::{Graph, NodeInfo, ResourceHandle};
pub use output::{Output, OutputSlot};
