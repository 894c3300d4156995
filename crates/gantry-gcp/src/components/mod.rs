//! The declarative components, one per provider concern.

pub mod api_gateway;
pub mod api_key;
pub mod backend_service;
pub mod container_image;
pub mod project_services;

pub use api_gateway::ApiGatewayForCloudRun;
pub use api_key::ApiKey;
pub use backend_service::BackendService;
pub use container_image::ContainerImage;
pub use project_services::ProjectServices;
