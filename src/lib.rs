//! Hemmer AWS Provider
//!
//! This crate implements the Hemmer provider for three AWS resource types:
//!
//! - `aws_apprunner_vpc_connector`
//! - `aws_docdb_cluster_parameter_group`
//! - `aws_docdb_event_subscription`
//!
//! # Overview
//!
//! The crate provides:
//!
//! - **ProviderService trait**: The operations a host drives (schema,
//!   configure, plan, CRUD, import)
//! - **AwsProvider**: Dispatches those operations by resource type to a
//!   [`resources::ResourceHandler`]
//! - **API traits**: [`api::AppRunnerApi`] and [`api::DocDbApi`], the seam to
//!   the remote services
//! - **Schema types**: Types for describing provider and resource schemas
//! - **Validation**: Schema validation plus the name validators
//! - **Error types**: [`ProviderError`] for the host, [`ApiError`] for the seam
//! - **Logging**: Integration with `tracing` for structured logging
//! - **Testing**: A tester, an in-memory cloud and an acceptance harness
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use hemmer_provider_aws::{AwsProvider, ProviderService};
//! use hemmer_provider_aws::testing::MemoryCloud;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     hemmer_provider_aws::init_logging();
//!
//!     let cloud = Arc::new(MemoryCloud::new());
//!     let provider = AwsProvider::new(cloud.clone(), cloud);
//!     provider.configure(json!({"region": "us-west-2"})).await?;
//!
//!     let config = json!({
//!         "name": "my-connector",
//!         "subnets": ["subnet-0123"],
//!         "security_groups": ["sg-0123"]
//!     });
//!     let plan = provider
//!         .plan("aws_apprunner_vpc_connector", None, config.clone(), config)
//!         .await?;
//!     let state = provider
//!         .create("aws_apprunner_vpc_connector", plan.planned_state)
//!         .await?;
//!     println!("{}", state["arn"]);
//!     Ok(())
//! }
//! ```
//!
//! # Resource Lifecycle
//!
//! - **Create**: decode the planned state, call the service, wait for the
//!   resource to settle, then read it back
//! - **Read**: rebuild state from the service. A missing resource reads as
//!   `null` so the host plans to create it again
//! - **Update**: in place where the service allows it, otherwise the plan
//!   requires replacement
//! - **Delete**: a resource that is already gone counts as deleted
//! - **Import**: read by identifier (ARN for the connector, name for DocumentDB)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod naming;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod tags;
pub mod testing;
pub mod types;
pub mod validation;
pub mod wait;

// Re-export main types at crate root
pub use config::ProviderConfig;
pub use error::{ApiError, ApiResult, ProviderError};
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::{AwsProvider, ProviderService};
pub use schema::ProviderSchema;
pub use types::{AttributeChange, ImportedResource, PlanAction, PlanResult, ProviderMetadata};
pub use validation::validate;

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tracing;
