//! The remote management API seam.
//!
//! Resource handlers talk to AWS only through the traits in this module.
//! Request and response shapes mirror the service APIs; transport, retries
//! and credentials belong to whatever implements the traits.
//!
//! Every call returns [`ApiResult`], so "resource does not exist" is always
//! the distinguished [`ApiError::NotFound`](crate::error::ApiError::NotFound).

pub mod apprunner;
pub mod docdb;

use serde::{Deserialize, Serialize};

pub use apprunner::{
    find_vpc_connector_by_arn, AppRunnerApi, CreateVpcConnectorInput, VpcConnector,
    VpcConnectorStatus,
};
pub use docdb::{
    ApplyMethod, ClusterParameterGroup, CreateClusterParameterGroupInput,
    CreateEventSubscriptionInput, DocDbApi, EventSubscription, ModifyEventSubscriptionInput,
    Parameter, ParameterSource,
};

/// A resource tag as the APIs exchange it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Tag key.
    pub key: String,
    /// Tag value.
    pub value: String,
}

impl Tag {
    /// Create a tag.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}
