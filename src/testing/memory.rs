//! An in-memory App Runner and DocumentDB service.
//!
//! [`MemoryCloud`] implements [`AppRunnerApi`] and [`DocDbApi`] closely enough
//! to drive every resource lifecycle without AWS credentials:
//!
//! - deleted VPC connectors stay visible as `INACTIVE`
//! - new parameter groups are seeded with system and engine-default parameters,
//!   and any other parameter name is accepted as a user parameter
//! - event subscriptions pass through `creating`/`modifying`/`deleting`
//! - every mutating call is recorded in an operation log
//!
//! Knobs cover the awkward parts of the real service: eventual consistency
//! after create, slow status transitions and a service that refuses access.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use uuid::Uuid;

use crate::api::{
    AppRunnerApi, ApplyMethod, ClusterParameterGroup, CreateClusterParameterGroupInput,
    CreateEventSubscriptionInput, CreateVpcConnectorInput, DocDbApi, EventSubscription,
    ModifyEventSubscriptionInput, Parameter, ParameterSource, Tag, VpcConnector,
    VpcConnectorStatus,
};
use crate::error::{ApiError, ApiResult};
use crate::tags::Tags;

/// Account every fake ARN belongs to.
pub const ACCOUNT_ID: &str = "123456789012";

/// Region every fake ARN lives in.
pub const REGION: &str = "us-west-2";

/// A mutating call received by [`MemoryCloud`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// `CreateVpcConnector`.
    CreateVpcConnector {
        /// Connector name.
        name: String,
    },
    /// `DeleteVpcConnector`.
    DeleteVpcConnector {
        /// Connector ARN.
        arn: String,
    },
    /// App Runner `TagResource`.
    TagResource {
        /// Resource ARN.
        arn: String,
        /// Tags sent.
        tags: Vec<Tag>,
    },
    /// App Runner `UntagResource`.
    UntagResource {
        /// Resource ARN.
        arn: String,
        /// Keys sent.
        keys: Vec<String>,
    },
    /// `CreateDBClusterParameterGroup`.
    CreateClusterParameterGroup {
        /// Group name.
        name: String,
    },
    /// `ModifyDBClusterParameterGroup`.
    ModifyClusterParameterGroup {
        /// Group name.
        name: String,
        /// Names of the parameters sent.
        parameters: Vec<String>,
    },
    /// `ResetDBClusterParameterGroup`.
    ResetClusterParameterGroup {
        /// Group name.
        name: String,
        /// Names of the parameters sent.
        parameters: Vec<String>,
    },
    /// `DeleteDBClusterParameterGroup`.
    DeleteClusterParameterGroup {
        /// Group name.
        name: String,
    },
    /// `CreateEventSubscription`.
    CreateEventSubscription {
        /// Subscription name.
        name: String,
    },
    /// `ModifyEventSubscription`.
    ModifyEventSubscription {
        /// Subscription name.
        name: String,
    },
    /// `DeleteEventSubscription`.
    DeleteEventSubscription {
        /// Subscription name.
        name: String,
    },
    /// DocumentDB `AddTagsToResource`.
    AddTagsToResource {
        /// Resource ARN.
        arn: String,
        /// Tags sent.
        tags: Vec<Tag>,
    },
    /// DocumentDB `RemoveTagsFromResource`.
    RemoveTagsFromResource {
        /// Resource ARN.
        arn: String,
        /// Keys sent.
        keys: Vec<String>,
    },
}

/// Subnet and security group a VPC connector can attach to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    /// Subnet ID, `subnet-...`.
    pub subnet_id: String,
    /// Security group ID, `sg-...`.
    pub security_group_id: String,
}

#[derive(Debug)]
struct ParameterGroupRecord {
    group: ClusterParameterGroup,
    parameters: BTreeMap<String, Parameter>,
}

#[derive(Debug)]
struct SubscriptionRecord {
    subscription: EventSubscription,
    /// Describes left before the pending status settles.
    pending: u32,
}

#[derive(Debug, Default)]
struct Inner {
    connectors: BTreeMap<String, VpcConnector>,
    revisions: HashMap<String, i64>,
    parameter_groups: BTreeMap<String, ParameterGroupRecord>,
    subscriptions: BTreeMap<String, SubscriptionRecord>,
    tags: HashMap<String, Tags>,
    networks: Vec<Network>,
    operations: Vec<Operation>,
    /// Describes left that report a fresh resource as missing, by ARN or name.
    hidden: HashMap<String, u32>,
    describe_lag: u32,
    transition_polls: u32,
    unavailable: Option<String>,
}

impl Inner {
    fn check_available(&self) -> ApiResult<()> {
        match &self.unavailable {
            Some(message) => Err(ApiError::Fatal(message.clone())),
            None => Ok(()),
        }
    }

    fn hide_for_lag(&mut self, key: &str) {
        if self.describe_lag > 0 {
            self.hidden.insert(key.to_string(), self.describe_lag);
        }
    }

    /// Consume one lagging describe. True while the resource should stay hidden.
    fn still_hidden(&mut self, key: &str) -> bool {
        match self.hidden.get_mut(key) {
            Some(left) if *left > 0 => {
                *left -= 1;
                true
            },
            _ => false,
        }
    }
}

/// In-memory stand-in for the App Runner and DocumentDB services.
#[derive(Debug, Default)]
pub struct MemoryCloud {
    inner: Mutex<Inner>,
}

impl MemoryCloud {
    /// An empty cloud.
    pub fn new() -> Self {
        Self::default()
    }

    /// Report fresh VPC connectors and event subscriptions as missing for the
    /// first `describes` describe calls after create.
    pub fn with_describe_lag(self, describes: u32) -> Self {
        self.lock().describe_lag = describes;
        self
    }

    /// Keep event subscriptions in `creating`, `modifying` or `deleting` for
    /// `describes` describe calls.
    pub fn with_transition_polls(self, describes: u32) -> Self {
        self.lock().transition_polls = describes;
        self
    }

    /// Fail every call with `message`, as a service that denies access would.
    pub fn set_unavailable(&self, message: impl Into<String>) {
        self.lock().unavailable = Some(message.into());
    }

    /// Create a subnet and security group for a test.
    pub fn provision_network(&self) -> Network {
        let network = Network {
            subnet_id: format!("subnet-{}", short_id()),
            security_group_id: format!("sg-{}", short_id()),
        };
        self.lock().networks.push(network.clone());
        network
    }

    /// Networks handed out by [`MemoryCloud::provision_network`].
    pub fn networks(&self) -> Vec<Network> {
        self.lock().networks.clone()
    }

    /// Every mutating call received so far.
    pub fn operations(&self) -> Vec<Operation> {
        self.lock().operations.clone()
    }

    /// Forget recorded operations.
    pub fn clear_operations(&self) {
        self.lock().operations.clear();
    }

    /// Delete a resource behind the provider's back. Returns false if nothing
    /// matched `id` (an ARN or a DocumentDB name).
    pub fn delete_out_of_band(&self, id: &str) -> bool {
        let mut inner = self.lock();
        if let Some(connector) = inner.connectors.get_mut(id) {
            connector.status = VpcConnectorStatus::Inactive;
            return true;
        }
        inner.parameter_groups.remove(id).is_some() || inner.subscriptions.remove(id).is_some()
    }

    /// Set a parameter as if changed outside the provider.
    pub fn set_parameter_out_of_band(&self, group: &str, name: &str, value: &str) -> bool {
        let mut inner = self.lock();
        let Some(parameter) = inner
            .parameter_groups
            .get_mut(group)
            .and_then(|g| g.parameters.get_mut(name))
        else {
            return false;
        };
        parameter.value = Some(value.to_string());
        parameter.source = Some(ParameterSource::User);
        true
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..17].to_string()
}

fn parameter(name: &str, value: Option<&str>, source: ParameterSource) -> Parameter {
    Parameter {
        name: name.to_string(),
        value: value.map(str::to_string),
        apply_method: ApplyMethod::PendingReboot,
        source: Some(source),
    }
}

/// Parameters a new group starts with.
fn default_parameters() -> BTreeMap<String, Parameter> {
    [
        parameter("audit_logs", Some("disabled"), ParameterSource::EngineDefault),
        parameter(
            "change_stream_log_retention_duration",
            Some("10800"),
            ParameterSource::EngineDefault,
        ),
        parameter("profiler", Some("disabled"), ParameterSource::EngineDefault),
        parameter("profiler_sampling_rate", None, ParameterSource::EngineDefault),
        parameter("profiler_threshold_ms", Some("100"), ParameterSource::EngineDefault),
        parameter("tls", Some("enabled"), ParameterSource::System),
        parameter("ttl_monitor", Some("enabled"), ParameterSource::EngineDefault),
    ]
    .into_iter()
    .map(|p| (p.name.clone(), p))
    .collect()
}

fn upsert_tags(inner: &mut Inner, arn: &str, tags: &[Tag]) {
    let entry = inner.tags.entry(arn.to_string()).or_default();
    for tag in tags {
        entry.insert(tag.key.clone(), tag.value.clone());
    }
}

fn remove_tags(inner: &mut Inner, arn: &str, keys: &[String]) {
    if let Some(entry) = inner.tags.get_mut(arn) {
        for key in keys {
            entry.remove(key);
        }
    }
}

fn tags_of(inner: &Inner, arn: &str) -> Vec<Tag> {
    inner
        .tags
        .get(arn)
        .map(|tags| tags.iter().map(|(k, v)| Tag::new(k, v)).collect())
        .unwrap_or_default()
}

fn check_batch(parameters: &[Parameter]) -> ApiResult<()> {
    if parameters.is_empty() || parameters.len() > 20 {
        return Err(ApiError::Fatal(format!(
            "InvalidParameterValue: between 1 and 20 parameters may be sent per call, got {}",
            parameters.len()
        )));
    }
    Ok(())
}

#[async_trait]
impl AppRunnerApi for MemoryCloud {
    async fn create_vpc_connector(&self, input: CreateVpcConnectorInput) -> ApiResult<VpcConnector> {
        let mut inner = self.lock();
        inner.check_available()?;

        let name_taken = inner
            .connectors
            .values()
            .any(|c| c.name == input.name && c.status == VpcConnectorStatus::Active);
        if name_taken {
            return Err(ApiError::Fatal(format!(
                "InvalidRequestException: VPC connector {} already exists",
                input.name
            )));
        }

        let revision = {
            let revision = inner.revisions.entry(input.name.clone()).or_insert(0);
            *revision += 1;
            *revision
        };
        let connector = VpcConnector {
            arn: format!(
                "arn:aws:apprunner:{}:{}:vpcconnector/{}/{}/{}",
                REGION,
                ACCOUNT_ID,
                input.name,
                revision,
                Uuid::new_v4().simple()
            ),
            name: input.name.clone(),
            revision,
            subnets: input.subnets,
            security_groups: input.security_groups,
            status: VpcConnectorStatus::Active,
        };

        upsert_tags(&mut inner, &connector.arn, &input.tags);
        inner.hide_for_lag(&connector.arn);
        inner.connectors.insert(connector.arn.clone(), connector.clone());
        inner
            .operations
            .push(Operation::CreateVpcConnector { name: input.name });
        Ok(connector)
    }

    async fn describe_vpc_connector(&self, arn: &str) -> ApiResult<VpcConnector> {
        let mut inner = self.lock();
        inner.check_available()?;
        if inner.still_hidden(arn) {
            return Err(ApiError::NotFound(format!(
                "ResourceNotFoundException: VPC connector {} not found",
                arn
            )));
        }
        inner.connectors.get(arn).cloned().ok_or_else(|| {
            ApiError::NotFound(format!(
                "ResourceNotFoundException: VPC connector {} not found",
                arn
            ))
        })
    }

    async fn list_vpc_connectors(&self) -> ApiResult<Vec<VpcConnector>> {
        let inner = self.lock();
        inner.check_available()?;
        Ok(inner.connectors.values().cloned().collect())
    }

    async fn delete_vpc_connector(&self, arn: &str) -> ApiResult<VpcConnector> {
        let mut inner = self.lock();
        inner.check_available()?;
        let connector = match inner.connectors.get_mut(arn) {
            Some(c) if c.status == VpcConnectorStatus::Active => {
                c.status = VpcConnectorStatus::Inactive;
                c.clone()
            },
            _ => {
                return Err(ApiError::NotFound(format!(
                    "ResourceNotFoundException: VPC connector {} not found",
                    arn
                )))
            },
        };
        inner.operations.push(Operation::DeleteVpcConnector {
            arn: arn.to_string(),
        });
        Ok(connector)
    }

    async fn list_tags_for_resource(&self, arn: &str) -> ApiResult<Vec<Tag>> {
        let inner = self.lock();
        inner.check_available()?;
        if !inner.connectors.contains_key(arn) {
            return Err(ApiError::NotFound(format!(
                "ResourceNotFoundException: {} not found",
                arn
            )));
        }
        Ok(tags_of(&inner, arn))
    }

    async fn tag_resource(&self, arn: &str, tags: Vec<Tag>) -> ApiResult<()> {
        let mut inner = self.lock();
        inner.check_available()?;
        if !inner.connectors.contains_key(arn) {
            return Err(ApiError::NotFound(format!(
                "ResourceNotFoundException: {} not found",
                arn
            )));
        }
        upsert_tags(&mut inner, arn, &tags);
        inner.operations.push(Operation::TagResource {
            arn: arn.to_string(),
            tags,
        });
        Ok(())
    }

    async fn untag_resource(&self, arn: &str, tag_keys: Vec<String>) -> ApiResult<()> {
        let mut inner = self.lock();
        inner.check_available()?;
        if !inner.connectors.contains_key(arn) {
            return Err(ApiError::NotFound(format!(
                "ResourceNotFoundException: {} not found",
                arn
            )));
        }
        remove_tags(&mut inner, arn, &tag_keys);
        inner.operations.push(Operation::UntagResource {
            arn: arn.to_string(),
            keys: tag_keys,
        });
        Ok(())
    }
}

#[async_trait]
impl DocDbApi for MemoryCloud {
    async fn create_cluster_parameter_group(
        &self,
        input: CreateClusterParameterGroupInput,
    ) -> ApiResult<ClusterParameterGroup> {
        let mut inner = self.lock();
        inner.check_available()?;
        if inner.parameter_groups.contains_key(&input.name) {
            return Err(ApiError::Fatal(format!(
                "DBParameterGroupAlreadyExists: {}",
                input.name
            )));
        }

        let group = ClusterParameterGroup {
            arn: format!("arn:aws:rds:{}:{}:cluster-pg:{}", REGION, ACCOUNT_ID, input.name),
            name: input.name.clone(),
            family: input.family,
            description: input.description,
        };
        upsert_tags(&mut inner, &group.arn, &input.tags);
        inner.parameter_groups.insert(
            input.name.clone(),
            ParameterGroupRecord {
                group: group.clone(),
                parameters: default_parameters(),
            },
        );
        inner
            .operations
            .push(Operation::CreateClusterParameterGroup { name: input.name });
        Ok(group)
    }

    async fn describe_cluster_parameter_group(
        &self,
        name: &str,
    ) -> ApiResult<ClusterParameterGroup> {
        let inner = self.lock();
        inner.check_available()?;
        inner
            .parameter_groups
            .get(name)
            .map(|r| r.group.clone())
            .ok_or_else(|| ApiError::NotFound(format!("DBParameterGroupNotFound: {}", name)))
    }

    async fn describe_cluster_parameters(&self, name: &str) -> ApiResult<Vec<Parameter>> {
        let inner = self.lock();
        inner.check_available()?;
        inner
            .parameter_groups
            .get(name)
            .map(|r| r.parameters.values().cloned().collect())
            .ok_or_else(|| ApiError::NotFound(format!("DBParameterGroupNotFound: {}", name)))
    }

    async fn modify_cluster_parameter_group(
        &self,
        name: &str,
        parameters: Vec<Parameter>,
    ) -> ApiResult<()> {
        let mut inner = self.lock();
        inner.check_available()?;
        check_batch(&parameters)?;
        let record = inner
            .parameter_groups
            .get_mut(name)
            .ok_or_else(|| ApiError::NotFound(format!("DBParameterGroupNotFound: {}", name)))?;

        for p in &parameters {
            record.parameters.insert(
                p.name.clone(),
                Parameter {
                    name: p.name.clone(),
                    value: p.value.clone(),
                    apply_method: p.apply_method,
                    source: Some(ParameterSource::User),
                },
            );
        }
        inner.operations.push(Operation::ModifyClusterParameterGroup {
            name: name.to_string(),
            parameters: parameters.into_iter().map(|p| p.name).collect(),
        });
        Ok(())
    }

    async fn reset_cluster_parameter_group(
        &self,
        name: &str,
        parameters: Vec<Parameter>,
    ) -> ApiResult<()> {
        let mut inner = self.lock();
        inner.check_available()?;
        check_batch(&parameters)?;
        let record = inner
            .parameter_groups
            .get_mut(name)
            .ok_or_else(|| ApiError::NotFound(format!("DBParameterGroupNotFound: {}", name)))?;

        let defaults = default_parameters();
        for p in &parameters {
            match defaults.get(&p.name) {
                Some(default) => record.parameters.insert(p.name.clone(), default.clone()),
                None => record.parameters.remove(&p.name),
            };
        }
        inner.operations.push(Operation::ResetClusterParameterGroup {
            name: name.to_string(),
            parameters: parameters.into_iter().map(|p| p.name).collect(),
        });
        Ok(())
    }

    async fn delete_cluster_parameter_group(&self, name: &str) -> ApiResult<()> {
        let mut inner = self.lock();
        inner.check_available()?;
        let record = inner
            .parameter_groups
            .remove(name)
            .ok_or_else(|| ApiError::NotFound(format!("DBParameterGroupNotFound: {}", name)))?;
        inner.tags.remove(&record.group.arn);
        inner
            .operations
            .push(Operation::DeleteClusterParameterGroup {
                name: name.to_string(),
            });
        Ok(())
    }

    async fn create_event_subscription(
        &self,
        input: CreateEventSubscriptionInput,
    ) -> ApiResult<EventSubscription> {
        let mut inner = self.lock();
        inner.check_available()?;
        if inner.subscriptions.contains_key(&input.name) {
            return Err(ApiError::Fatal(format!(
                "SubscriptionAlreadyExist: {}",
                input.name
            )));
        }

        let pending = inner.transition_polls;
        let subscription = EventSubscription {
            arn: format!("arn:aws:rds:{}:{}:es:{}", REGION, ACCOUNT_ID, input.name),
            name: input.name.clone(),
            customer_aws_id: ACCOUNT_ID.to_string(),
            sns_topic_arn: input.sns_topic_arn,
            source_type: input.source_type,
            source_ids: input.source_ids,
            event_categories: input.event_categories,
            enabled: input.enabled,
            status: if pending > 0 { "creating" } else { "active" }.to_string(),
        };
        upsert_tags(&mut inner, &subscription.arn, &input.tags);
        inner.hide_for_lag(&input.name);
        inner.subscriptions.insert(
            input.name.clone(),
            SubscriptionRecord {
                subscription: subscription.clone(),
                pending,
            },
        );
        inner
            .operations
            .push(Operation::CreateEventSubscription { name: input.name });
        Ok(subscription)
    }

    async fn describe_event_subscription(&self, name: &str) -> ApiResult<EventSubscription> {
        let mut inner = self.lock();
        inner.check_available()?;
        let not_found = || ApiError::NotFound(format!("SubscriptionNotFound: {}", name));
        if inner.still_hidden(name) {
            return Err(not_found());
        }

        let record = inner.subscriptions.get_mut(name).ok_or_else(not_found)?;
        if record.pending > 0 {
            record.pending -= 1;
            return Ok(record.subscription.clone());
        }
        if record.subscription.status == "deleting" {
            inner.subscriptions.remove(name);
            return Err(not_found());
        }
        record.subscription.status = "active".to_string();
        Ok(record.subscription.clone())
    }

    async fn modify_event_subscription(
        &self,
        input: ModifyEventSubscriptionInput,
    ) -> ApiResult<EventSubscription> {
        let mut inner = self.lock();
        inner.check_available()?;
        let pending = inner.transition_polls;
        let record = inner
            .subscriptions
            .get_mut(&input.name)
            .ok_or_else(|| ApiError::NotFound(format!("SubscriptionNotFound: {}", input.name)))?;

        let subscription = &mut record.subscription;
        if let Some(topic) = input.sns_topic_arn {
            subscription.sns_topic_arn = topic;
        }
        if let Some(source_type) = input.source_type {
            subscription.source_type = Some(source_type).filter(|s| !s.is_empty());
        }
        if let Some(categories) = input.event_categories {
            subscription.event_categories = categories;
        }
        if let Some(enabled) = input.enabled {
            subscription.enabled = enabled;
        }
        if pending > 0 {
            subscription.status = "modifying".to_string();
        }
        record.pending = pending;
        let subscription = subscription.clone();

        inner
            .operations
            .push(Operation::ModifyEventSubscription { name: input.name });
        Ok(subscription)
    }

    async fn delete_event_subscription(&self, name: &str) -> ApiResult<EventSubscription> {
        let mut inner = self.lock();
        inner.check_available()?;
        let pending = inner.transition_polls;
        let not_found = || ApiError::NotFound(format!("SubscriptionNotFound: {}", name));

        let record = inner.subscriptions.get_mut(name).ok_or_else(not_found)?;
        if record.subscription.status == "deleting" {
            return Err(not_found());
        }
        record.subscription.status = "deleting".to_string();
        record.pending = pending;
        let subscription = record.subscription.clone();

        inner.tags.remove(&subscription.arn);
        inner.operations.push(Operation::DeleteEventSubscription {
            name: name.to_string(),
        });
        Ok(subscription)
    }

    async fn list_tags_for_resource(&self, arn: &str) -> ApiResult<Vec<Tag>> {
        let inner = self.lock();
        inner.check_available()?;
        Ok(tags_of(&inner, arn))
    }

    async fn add_tags_to_resource(&self, arn: &str, tags: Vec<Tag>) -> ApiResult<()> {
        let mut inner = self.lock();
        inner.check_available()?;
        upsert_tags(&mut inner, arn, &tags);
        inner.operations.push(Operation::AddTagsToResource {
            arn: arn.to_string(),
            tags,
        });
        Ok(())
    }

    async fn remove_tags_from_resource(&self, arn: &str, tag_keys: Vec<String>) -> ApiResult<()> {
        let mut inner = self.lock();
        inner.check_available()?;
        remove_tags(&mut inner, arn, &tag_keys);
        inner.operations.push(Operation::RemoveTagsFromResource {
            arn: arn.to_string(),
            keys: tag_keys,
        });
        Ok(())
    }
}
