//! AWS App Runner VPC connector operations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::Tag;
use crate::error::{ApiError, ApiResult};

/// Lifecycle status App Runner reports for a VPC connector.
///
/// Deleted connectors stay visible as `INACTIVE` for a while.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VpcConnectorStatus {
    /// Usable.
    Active,
    /// Deleted.
    Inactive,
}

impl VpcConnectorStatus {
    /// The wire value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Inactive => "INACTIVE",
        }
    }
}

/// A VPC connector as returned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpcConnector {
    /// Full ARN, `arn:aws:apprunner:<region>:<account>:vpcconnector/<name>/<revision>/<id>`.
    pub arn: String,
    /// User-assigned name.
    pub name: String,
    /// Revision number, bumped when a connector with the same name is recreated.
    pub revision: i64,
    /// Subnet IDs.
    pub subnets: Vec<String>,
    /// Security group IDs.
    pub security_groups: Vec<String>,
    /// Current status.
    pub status: VpcConnectorStatus,
}

/// Request for `CreateVpcConnector`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateVpcConnectorInput {
    /// Connector name.
    pub name: String,
    /// Subnet IDs.
    pub subnets: Vec<String>,
    /// Security group IDs.
    pub security_groups: Vec<String>,
    /// Tags applied at creation.
    pub tags: Vec<Tag>,
}

/// The subset of the App Runner API this provider uses.
#[async_trait]
pub trait AppRunnerApi: Send + Sync {
    /// `CreateVpcConnector`.
    async fn create_vpc_connector(&self, input: CreateVpcConnectorInput)
        -> ApiResult<VpcConnector>;

    /// `DescribeVpcConnector`. Returns inactive connectors too.
    async fn describe_vpc_connector(&self, arn: &str) -> ApiResult<VpcConnector>;

    /// `ListVpcConnectors`.
    async fn list_vpc_connectors(&self) -> ApiResult<Vec<VpcConnector>>;

    /// `DeleteVpcConnector`. Returns the connector as it was marked for deletion.
    async fn delete_vpc_connector(&self, arn: &str) -> ApiResult<VpcConnector>;

    /// `ListTagsForResource`.
    async fn list_tags_for_resource(&self, arn: &str) -> ApiResult<Vec<Tag>>;

    /// `TagResource`. Adds new keys and overwrites existing ones.
    async fn tag_resource(&self, arn: &str, tags: Vec<Tag>) -> ApiResult<()>;

    /// `UntagResource`.
    async fn untag_resource(&self, arn: &str, tag_keys: Vec<String>) -> ApiResult<()>;
}

/// Describe a connector, treating an `INACTIVE` one as not found.
pub async fn find_vpc_connector_by_arn(
    api: &dyn AppRunnerApi,
    arn: &str,
) -> ApiResult<VpcConnector> {
    let connector = api.describe_vpc_connector(arn).await?;
    if connector.status == VpcConnectorStatus::Inactive {
        return Err(ApiError::NotFound(format!(
            "App Runner VPC Connector {} is {}",
            arn,
            connector.status.as_str()
        )));
    }
    Ok(connector)
}
