//! `aws_apprunner_vpc_connector`.
//!
//! Only tags can change in place. A new name, subnet set or security group
//! set replaces the connector.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::{decode_config, sorted, state_str, Context, ResourceHandler};
use crate::api::{find_vpc_connector_by_arn, CreateVpcConnectorInput, VpcConnector};
use crate::error::{ApiError, ProviderError};
use crate::schema::{Attribute, Diagnostic, Schema};
use crate::tags::{self, TagDiff, Tags};
use crate::validation;
use crate::wait::{wait_until, WaitStatus};

/// Resource type name.
pub const TYPE_NAME: &str = "aws_apprunner_vpc_connector";

/// Handler for App Runner VPC connectors.
#[derive(Debug, Clone, Copy, Default)]
pub struct VpcConnectorResource;

#[derive(Debug, Deserialize)]
struct VpcConnectorConfig {
    name: String,
    subnets: Vec<String>,
    security_groups: Vec<String>,
    #[serde(default)]
    tags: Option<Tags>,
}

impl VpcConnectorResource {
    async fn find(&self, ctx: &Context, arn: &str) -> Result<Option<Value>, ProviderError> {
        let connector = match ctx
            .call(
                "DescribeVpcConnector",
                find_vpc_connector_by_arn(ctx.apprunner.as_ref(), arn),
            )
            .await
        {
            Ok(connector) => connector,
            Err(ApiError::NotFound(msg)) => {
                debug!(arn = %arn, reason = %msg, "VPC connector not found");
                return Ok(None);
            },
            Err(e) => return Err(e.into()),
        };

        let tags = ctx
            .call(
                "ListTagsForResource",
                ctx.apprunner.list_tags_for_resource(&connector.arn),
            )
            .await?;

        Ok(Some(to_state(&connector, &tags::from_api(&tags))))
    }
}

fn to_state(connector: &VpcConnector, tags: &Tags) -> Value {
    json!({
        "id": connector.arn,
        "arn": connector.arn,
        "name": connector.name,
        "subnets": sorted(connector.subnets.clone()),
        "security_groups": sorted(connector.security_groups.clone()),
        "tags": tags,
        "vpc_connector_revision": connector.revision,
        "status": connector.status.as_str(),
    })
}

#[async_trait]
impl ResourceHandler for VpcConnectorResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute(
                "id",
                Attribute::computed_string().with_description("Same as arn"),
            )
            .with_attribute("arn", Attribute::computed_string())
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("Name of the VPC connector"),
            )
            .with_attribute(
                "subnets",
                Attribute::required_string_set()
                    .with_force_new()
                    .with_description("Subnet IDs the connector attaches to"),
            )
            .with_attribute(
                "security_groups",
                Attribute::required_string_set()
                    .with_force_new()
                    .with_description("Security group IDs for the connector's interfaces"),
            )
            .with_attribute("tags", Attribute::tags())
            .with_attribute("vpc_connector_revision", Attribute::computed_int64())
            .with_attribute("status", Attribute::computed_string())
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let mut diagnostics = validation::validate(&self.schema(), config);
        if let Some(name) = config.get("name").and_then(Value::as_str) {
            diagnostics.extend(validation::valid_vpc_connector_name(name, "name"));
        }
        diagnostics
    }

    async fn create(&self, ctx: &Context, planned: &Value) -> Result<Value, ProviderError> {
        let config: VpcConnectorConfig = decode_config(&self.schema(), planned)?;
        let input = CreateVpcConnectorInput {
            name: config.name.clone(),
            subnets: sorted(config.subnets),
            security_groups: sorted(config.security_groups),
            tags: tags::to_api(&config.tags.unwrap_or_default()),
        };

        let connector = ctx
            .call(
                "CreateVpcConnector",
                ctx.apprunner.create_vpc_connector(input),
            )
            .await?;
        let arn = connector.arn;
        info!(name = %config.name, arn = %arn, "created VPC connector");

        wait_until(
            "VPC connector ACTIVE",
            ctx.config.timeouts.create(),
            ctx.config.backoff(),
            || async {
                match ctx
                    .call(
                        "DescribeVpcConnector",
                        find_vpc_connector_by_arn(ctx.apprunner.as_ref(), &arn),
                    )
                    .await
                {
                    Ok(_) => Ok(WaitStatus::Done(())),
                    Err(ApiError::NotFound(_)) => Ok(WaitStatus::Pending("not found".to_string())),
                    Err(e) => Err(e.into()),
                }
            },
        )
        .await?;

        self.find(ctx, &arn).await?.ok_or_else(|| {
            ProviderError::NotFound(format!("App Runner VPC Connector {} vanished after create", arn))
        })
    }

    async fn read(&self, ctx: &Context, current: &Value) -> Result<Option<Value>, ProviderError> {
        let arn = state_str(current, "arn").or_else(|_| state_str(current, "id"))?;
        let state = self.find(ctx, arn).await?;
        if state.is_none() {
            warn!(arn = %arn, "App Runner VPC Connector not found, removing from state");
        }
        Ok(state)
    }

    async fn update(
        &self,
        ctx: &Context,
        prior: &Value,
        planned: &Value,
    ) -> Result<Value, ProviderError> {
        let arn = state_str(prior, "arn")?;
        let diff = TagDiff::between(&tags::from_state(prior), &tags::from_state(planned));

        if !diff.remove.is_empty() {
            debug!(arn = %arn, keys = ?diff.remove, "untagging VPC connector");
            ctx.call(
                "UntagResource",
                ctx.apprunner.untag_resource(arn, diff.remove.clone()),
            )
            .await?;
        }
        if !diff.upsert.is_empty() {
            debug!(arn = %arn, keys = ?diff.upsert.keys().collect::<Vec<_>>(), "tagging VPC connector");
            ctx.call(
                "TagResource",
                ctx.apprunner.tag_resource(arn, diff.upsert_tags()),
            )
            .await?;
        }

        self.find(ctx, arn).await?.ok_or_else(|| {
            ProviderError::NotFound(format!("App Runner VPC Connector {} not found", arn))
        })
    }

    async fn delete(&self, ctx: &Context, current: &Value) -> Result<(), ProviderError> {
        let arn = state_str(current, "arn").or_else(|_| state_str(current, "id"))?;

        match ctx
            .call("DeleteVpcConnector", ctx.apprunner.delete_vpc_connector(arn))
            .await
        {
            Ok(_) => info!(arn = %arn, "deleting VPC connector"),
            Err(ApiError::NotFound(_)) => {
                debug!(arn = %arn, "VPC connector already gone");
                return Ok(());
            },
            Err(e) => return Err(e.into()),
        }

        wait_until(
            "VPC connector INACTIVE",
            ctx.config.timeouts.delete(),
            ctx.config.backoff(),
            || async {
                match ctx
                    .call(
                        "DescribeVpcConnector",
                        find_vpc_connector_by_arn(ctx.apprunner.as_ref(), arn),
                    )
                    .await
                {
                    Ok(connector) => Ok(WaitStatus::Pending(connector.status.as_str().to_string())),
                    Err(ApiError::NotFound(_)) => Ok(WaitStatus::Done(())),
                    Err(e) => Err(e.into()),
                }
            },
        )
        .await
    }

    async fn import(&self, ctx: &Context, id: &str) -> Result<Value, ProviderError> {
        self.find(ctx, id).await?.ok_or_else(|| {
            ProviderError::NotFound(format!(
                "Cannot import non-existent remote object: App Runner VPC Connector {}",
                id
            ))
        })
    }
}
