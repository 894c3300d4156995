//! gantry-gcp — declarative GCP components over the resource graph.
//!
//! Five components, composed in a fixed pipeline by [`stack::Stack`]:
//!
//! 1. [`components::ProjectServices`] — enable the required cloud APIs
//! 2. [`components::ContainerImage`] — repository + build/push, digest-pinned
//! 3. [`components::BackendService`] — Cloud Run deployment
//! 4. [`components::ApiGatewayForCloudRun`] — api / config / gateway chain
//!    plus the run-invoker IAM grant
//! 5. [`components::ApiKey`] — restricted key with a randomized name suffix
//!
//! All cloud mutations go through the [`api::GcpApi`] trait. The shipped
//! implementation is [`simulated::SimulatedGcp`], a deterministic in-memory
//! provider; real API clients live outside this crate, behind the same
//! trait.

pub mod api;
pub mod components;
pub mod error;
pub mod simulated;
pub mod stack;
pub mod template;

pub use api::{GcpApi, RunServiceSpec};
pub use error::{ProviderError, ProviderResult, StackError};
pub use simulated::SimulatedGcp;
pub use stack::{Stack, StackOutputs, REQUIRED_SERVICES};
