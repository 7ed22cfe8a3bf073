//! Amazon DocumentDB cluster parameter group and event subscription operations.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::Tag;
use crate::error::ApiResult;

/// When a parameter change takes effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApplyMethod {
    /// Applied right away.
    Immediate,
    /// Applied at the next instance reboot.
    PendingReboot,
}

impl ApplyMethod {
    /// The wire value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::PendingReboot => "pending-reboot",
        }
    }
}

impl fmt::Display for ApplyMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplyMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "immediate" => Ok(Self::Immediate),
            "pending-reboot" => Ok(Self::PendingReboot),
            other => Err(format!(
                "expected one of \"immediate\", \"pending-reboot\", got {:?}",
                other
            )),
        }
    }
}

/// Where a parameter's current value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParameterSource {
    /// Set by a `ModifyDBClusterParameterGroup` call.
    User,
    /// Set by the service.
    System,
    /// The engine's default.
    EngineDefault,
}

/// A cluster parameter.
///
/// In requests `source` is `None`; responses always carry it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter name.
    pub name: String,
    /// Current value. Absent for parameters that have no value set.
    pub value: Option<String>,
    /// When a change takes effect.
    pub apply_method: ApplyMethod,
    /// Origin of the value.
    pub source: Option<ParameterSource>,
}

/// A cluster parameter group as returned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterParameterGroup {
    /// Group name.
    pub name: String,
    /// Parameter group family, e.g. `docdb5.0`.
    pub family: String,
    /// Free-form description.
    pub description: String,
    /// Group ARN.
    pub arn: String,
}

/// Request for `CreateDBClusterParameterGroup`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateClusterParameterGroupInput {
    /// Group name.
    pub name: String,
    /// Parameter group family.
    pub family: String,
    /// Free-form description.
    pub description: String,
    /// Tags applied at creation.
    pub tags: Vec<Tag>,
}

/// An event subscription as returned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSubscription {
    /// Subscription name (`CustSubscriptionId`).
    pub name: String,
    /// Subscription ARN.
    pub arn: String,
    /// Account that owns the subscription.
    pub customer_aws_id: String,
    /// SNS topic notifications are sent to.
    pub sns_topic_arn: String,
    /// Source type filter, e.g. `db-cluster`.
    pub source_type: Option<String>,
    /// Source identifiers filter.
    pub source_ids: Vec<String>,
    /// Event category filter.
    pub event_categories: Vec<String>,
    /// Whether notifications are sent.
    pub enabled: bool,
    /// `creating`, `modifying`, `active`, `deleting`, ...
    pub status: String,
}

/// Request for `CreateEventSubscription`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateEventSubscriptionInput {
    /// Subscription name.
    pub name: String,
    /// SNS topic ARN.
    pub sns_topic_arn: String,
    /// Source type filter.
    pub source_type: Option<String>,
    /// Source identifiers filter.
    pub source_ids: Vec<String>,
    /// Event category filter.
    pub event_categories: Vec<String>,
    /// Whether notifications are sent.
    pub enabled: bool,
    /// Tags applied at creation.
    pub tags: Vec<Tag>,
}

/// Request for `ModifyEventSubscription`. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifyEventSubscriptionInput {
    /// Subscription name.
    pub name: String,
    /// New SNS topic ARN.
    pub sns_topic_arn: Option<String>,
    /// New source type filter. An empty string removes the filter.
    pub source_type: Option<String>,
    /// New event category filter.
    pub event_categories: Option<Vec<String>>,
    /// New enabled flag.
    pub enabled: Option<bool>,
}

impl ModifyEventSubscriptionInput {
    /// Whether the request would change anything.
    pub fn is_noop(&self) -> bool {
        self.sns_topic_arn.is_none()
            && self.source_type.is_none()
            && self.event_categories.is_none()
            && self.enabled.is_none()
    }
}

/// The subset of the DocumentDB API this provider uses.
#[async_trait]
pub trait DocDbApi: Send + Sync {
    /// `CreateDBClusterParameterGroup`.
    async fn create_cluster_parameter_group(
        &self,
        input: CreateClusterParameterGroupInput,
    ) -> ApiResult<ClusterParameterGroup>;

    /// `DescribeDBClusterParameterGroups` for a single group.
    async fn describe_cluster_parameter_group(&self, name: &str)
        -> ApiResult<ClusterParameterGroup>;

    /// `DescribeDBClusterParameters`, all sources.
    async fn describe_cluster_parameters(&self, name: &str) -> ApiResult<Vec<Parameter>>;

    /// `ModifyDBClusterParameterGroup`. At most 20 parameters per call.
    async fn modify_cluster_parameter_group(
        &self,
        name: &str,
        parameters: Vec<Parameter>,
    ) -> ApiResult<()>;

    /// `ResetDBClusterParameterGroup` for the named parameters.
    async fn reset_cluster_parameter_group(
        &self,
        name: &str,
        parameters: Vec<Parameter>,
    ) -> ApiResult<()>;

    /// `DeleteDBClusterParameterGroup`.
    async fn delete_cluster_parameter_group(&self, name: &str) -> ApiResult<()>;

    /// `CreateEventSubscription`.
    async fn create_event_subscription(
        &self,
        input: CreateEventSubscriptionInput,
    ) -> ApiResult<EventSubscription>;

    /// `DescribeEventSubscriptions` for a single subscription.
    async fn describe_event_subscription(&self, name: &str) -> ApiResult<EventSubscription>;

    /// `ModifyEventSubscription`.
    async fn modify_event_subscription(
        &self,
        input: ModifyEventSubscriptionInput,
    ) -> ApiResult<EventSubscription>;

    /// `DeleteEventSubscription`.
    async fn delete_event_subscription(&self, name: &str) -> ApiResult<EventSubscription>;

    /// `ListTagsForResource`.
    async fn list_tags_for_resource(&self, arn: &str) -> ApiResult<Vec<Tag>>;

    /// `AddTagsToResource`.
    async fn add_tags_to_resource(&self, arn: &str, tags: Vec<Tag>) -> ApiResult<()>;

    /// `RemoveTagsFromResource`.
    async fn remove_tags_from_resource(&self, arn: &str, tag_keys: Vec<String>)
        -> ApiResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_method_wire_values() {
        assert_eq!(ApplyMethod::PendingReboot.as_str(), "pending-reboot");
        assert_eq!("immediate".parse::<ApplyMethod>(), Ok(ApplyMethod::Immediate));
        assert!("later".parse::<ApplyMethod>().is_err());
        assert_eq!(
            serde_json::to_value(ApplyMethod::PendingReboot).unwrap(),
            "pending-reboot"
        );
    }

    #[test]
    fn test_parameter_source_wire_values() {
        let source: ParameterSource = serde_json::from_value("engine-default".into()).unwrap();
        assert_eq!(source, ParameterSource::EngineDefault);
    }

    #[test]
    fn test_modify_noop() {
        let input = ModifyEventSubscriptionInput {
            name: "events".to_string(),
            ..Default::default()
        };
        assert!(input.is_noop());

        let input = ModifyEventSubscriptionInput {
            enabled: Some(false),
            ..input
        };
        assert!(!input.is_noop());
    }
}
