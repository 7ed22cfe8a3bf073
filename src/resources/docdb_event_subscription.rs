//! `aws_docdb_event_subscription`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::{check_name_conflict, decode_config, sorted, state_str, Context, ResourceHandler};
use crate::api::{CreateEventSubscriptionInput, EventSubscription, ModifyEventSubscriptionInput};
use crate::error::{ApiError, ProviderError};
use crate::naming::{name_prefix_from_name, resolve_name};
use crate::schema::{Attribute, Diagnostic, Schema};
use crate::tags::{self, TagDiff, Tags};
use crate::validation;
use crate::wait::{wait_until, WaitStatus};

/// Resource type name.
pub const TYPE_NAME: &str = "aws_docdb_event_subscription";

const STATUS_ACTIVE: &str = "active";

/// Handler for DocumentDB event subscriptions.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventSubscriptionResource;

#[derive(Debug, Deserialize)]
struct EventSubscriptionConfig {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    name_prefix: Option<String>,
    sns_topic_arn: String,
    #[serde(default)]
    source_type: Option<String>,
    #[serde(default)]
    source_ids: Option<Vec<String>>,
    #[serde(default)]
    event_categories: Option<Vec<String>>,
    #[serde(default)]
    enabled: Option<bool>,
    #[serde(default)]
    tags: Option<Tags>,
}

fn to_state(subscription: &EventSubscription, name_prefix: &Value, tags: &Tags) -> Value {
    json!({
        "id": subscription.name,
        "arn": subscription.arn,
        "customer_aws_id": subscription.customer_aws_id,
        "name": subscription.name,
        "name_prefix": name_prefix,
        "sns_topic_arn": subscription.sns_topic_arn,
        "source_type": subscription.source_type,
        "source_ids": sorted(subscription.source_ids.clone()),
        "event_categories": sorted(subscription.event_categories.clone()),
        "enabled": subscription.enabled,
        "tags": tags,
    })
}

/// Modify request for the fields that differ between two configurations.
fn modify_input(name: &str, prior: &Value, planned: &Value) -> ModifyEventSubscriptionInput {
    let changed = |key: &str| prior.get(key) != planned.get(key);
    let string = |key: &str| planned.get(key).and_then(Value::as_str).map(str::to_string);
    let prior_string = |key: &str| prior.get(key).and_then(Value::as_str).map(str::to_string);

    let categories = |v: Option<&Value>| {
        sorted(
            v.and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        )
    };
    let new_categories = categories(planned.get("event_categories"));

    ModifyEventSubscriptionInput {
        name: name.to_string(),
        sns_topic_arn: changed("sns_topic_arn").then(|| string("sns_topic_arn")).flatten(),
        // An empty source type clears the filter.
        source_type: (prior_string("source_type") != string("source_type"))
            .then(|| string("source_type").unwrap_or_default()),
        event_categories: (categories(prior.get("event_categories")) != new_categories)
            .then_some(new_categories),
        enabled: changed("enabled")
            .then(|| planned.get("enabled").and_then(Value::as_bool))
            .flatten(),
    }
}

impl EventSubscriptionResource {
    async fn find(
        &self,
        ctx: &Context,
        name: &str,
        name_prefix: &Value,
    ) -> Result<Option<Value>, ProviderError> {
        let subscription = match ctx
            .call(
                "DescribeEventSubscriptions",
                ctx.docdb.describe_event_subscription(name),
            )
            .await
        {
            Ok(subscription) => subscription,
            Err(ApiError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let tags = ctx
            .call(
                "ListTagsForResource",
                ctx.docdb.list_tags_for_resource(&subscription.arn),
            )
            .await?;
        Ok(Some(to_state(
            &subscription,
            name_prefix,
            &tags::from_api(&tags),
        )))
    }

    async fn wait_active(&self, ctx: &Context, name: &str) -> Result<(), ProviderError> {
        wait_until(
            "event subscription active",
            ctx.config.timeouts.create(),
            ctx.config.backoff(),
            || async {
                match ctx
                    .call(
                        "DescribeEventSubscriptions",
                        ctx.docdb.describe_event_subscription(name),
                    )
                    .await
                {
                    Ok(s) if s.status == STATUS_ACTIVE => Ok(WaitStatus::Done(())),
                    Ok(s) => Ok(WaitStatus::Pending(s.status)),
                    Err(ApiError::NotFound(_)) => Ok(WaitStatus::Pending("not found".to_string())),
                    Err(e) => Err(e.into()),
                }
            },
        )
        .await
    }
}

#[async_trait]
impl ResourceHandler for EventSubscriptionResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("arn", Attribute::computed_string())
            .with_attribute("customer_aws_id", Attribute::computed_string())
            .with_attribute(
                "name",
                Attribute::optional_computed_string().with_force_new(),
            )
            .with_attribute(
                "name_prefix",
                Attribute::optional_computed_string().with_force_new(),
            )
            .with_attribute("sns_topic_arn", Attribute::required_string())
            .with_attribute(
                "source_type",
                Attribute::optional_string()
                    .with_description("db-instance, db-cluster, db-parameter-group, ..."),
            )
            .with_attribute(
                "source_ids",
                Attribute::optional_string_set().with_force_new(),
            )
            .with_attribute("event_categories", Attribute::optional_string_set())
            .with_attribute(
                "enabled",
                Attribute::optional_bool().with_default(json!(true)),
            )
            .with_attribute("tags", Attribute::tags())
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let mut diagnostics = validation::validate(&self.schema(), config);
        if let Some(name) = config.get("name").and_then(Value::as_str) {
            diagnostics.extend(validation::valid_event_subscription_name(name, "name"));
        }
        if let Some(prefix) = config.get("name_prefix").and_then(Value::as_str) {
            diagnostics.extend(validation::valid_event_subscription_name_prefix(
                prefix,
                "name_prefix",
            ));
        }
        diagnostics.extend(check_name_conflict(config));
        diagnostics
    }

    async fn create(&self, ctx: &Context, planned: &Value) -> Result<Value, ProviderError> {
        let config: EventSubscriptionConfig = decode_config(&self.schema(), planned)?;
        let name = resolve_name(config.name.as_deref(), config.name_prefix.as_deref());

        let subscription = ctx
            .call(
                "CreateEventSubscription",
                ctx.docdb.create_event_subscription(CreateEventSubscriptionInput {
                    name: name.clone(),
                    sns_topic_arn: config.sns_topic_arn,
                    source_type: config.source_type,
                    source_ids: sorted(config.source_ids.unwrap_or_default()),
                    event_categories: sorted(config.event_categories.unwrap_or_default()),
                    enabled: config.enabled.unwrap_or(true),
                    tags: tags::to_api(&config.tags.unwrap_or_default()),
                }),
            )
            .await?;
        info!(name = %name, arn = %subscription.arn, "created event subscription");

        self.wait_active(ctx, &name).await?;

        self.find(ctx, &name, &json!(config.name_prefix))
            .await?
            .ok_or_else(|| {
                ProviderError::NotFound(format!(
                    "DocumentDB Event Subscription {} vanished after create",
                    name
                ))
            })
    }

    async fn read(&self, ctx: &Context, current: &Value) -> Result<Option<Value>, ProviderError> {
        let name = state_str(current, "id").or_else(|_| state_str(current, "name"))?;
        let name_prefix = current.get("name_prefix").cloned().unwrap_or(Value::Null);
        let state = self.find(ctx, name, &name_prefix).await?;
        if state.is_none() {
            warn!(name = %name, "DocumentDB Event Subscription not found, removing from state");
        }
        Ok(state)
    }

    async fn update(
        &self,
        ctx: &Context,
        prior: &Value,
        planned: &Value,
    ) -> Result<Value, ProviderError> {
        let name = state_str(prior, "id")?;
        let arn = state_str(prior, "arn")?;

        let input = modify_input(name, prior, planned);
        if !input.is_noop() {
            debug!(name = %name, "modifying event subscription");
            ctx.call(
                "ModifyEventSubscription",
                ctx.docdb.modify_event_subscription(input),
            )
            .await?;
            self.wait_active(ctx, name).await?;
        }

        let diff = TagDiff::between(&tags::from_state(prior), &tags::from_state(planned));
        if !diff.remove.is_empty() {
            ctx.call(
                "RemoveTagsFromResource",
                ctx.docdb.remove_tags_from_resource(arn, diff.remove.clone()),
            )
            .await?;
        }
        if !diff.upsert.is_empty() {
            ctx.call(
                "AddTagsToResource",
                ctx.docdb.add_tags_to_resource(arn, diff.upsert_tags()),
            )
            .await?;
        }

        let name_prefix = planned.get("name_prefix").cloned().unwrap_or(Value::Null);
        self.find(ctx, name, &name_prefix).await?.ok_or_else(|| {
            ProviderError::NotFound(format!("DocumentDB Event Subscription {} not found", name))
        })
    }

    async fn delete(&self, ctx: &Context, current: &Value) -> Result<(), ProviderError> {
        let name = state_str(current, "id").or_else(|_| state_str(current, "name"))?;

        match ctx
            .call(
                "DeleteEventSubscription",
                ctx.docdb.delete_event_subscription(name),
            )
            .await
        {
            Ok(_) => info!(name = %name, "deleting event subscription"),
            Err(ApiError::NotFound(_)) => return Ok(()),
            Err(e) => return Err(e.into()),
        }

        wait_until(
            "event subscription deleted",
            ctx.config.timeouts.delete(),
            ctx.config.backoff(),
            || async {
                match ctx
                    .call(
                        "DescribeEventSubscriptions",
                        ctx.docdb.describe_event_subscription(name),
                    )
                    .await
                {
                    Ok(s) => Ok(WaitStatus::Pending(s.status)),
                    Err(ApiError::NotFound(_)) => Ok(WaitStatus::Done(())),
                    Err(e) => Err(e.into()),
                }
            },
        )
        .await
    }

    async fn import(&self, ctx: &Context, id: &str) -> Result<Value, ProviderError> {
        let name_prefix = json!(name_prefix_from_name(id));
        self.find(ctx, id, &name_prefix).await?.ok_or_else(|| {
            ProviderError::NotFound(format!(
                "Cannot import non-existent remote object: DocumentDB Event Subscription {}",
                id
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_names() {
        let resource = EventSubscriptionResource;
        let topic = "arn:aws:sns:us-west-2:123456789012:events";

        assert!(resource
            .validate(&json!({"name": "tf-acc-test-1", "sns_topic_arn": topic}))
            .is_empty());

        let diagnostics = resource.validate(&json!({
            "name": format!("bad_{}", "x".repeat(260)),
            "sns_topic_arn": topic
        }));
        assert_eq!(diagnostics.len(), 2);

        let diagnostics = resource.validate(&json!({
            "name_prefix": "x".repeat(230),
            "sns_topic_arn": topic
        }));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("229"));
    }

    #[test]
    fn test_modify_input_only_changed_fields() {
        let prior = json!({
            "sns_topic_arn": "arn:a",
            "source_type": "db-cluster",
            "event_categories": ["failover", "creation"],
            "enabled": true
        });
        let planned = json!({
            "sns_topic_arn": "arn:a",
            "source_type": "db-cluster",
            "event_categories": ["creation", "failover"],
            "enabled": false
        });

        let input = modify_input("events", &prior, &planned);
        assert_eq!(input.enabled, Some(false));
        assert!(input.event_categories.is_none());
        assert!(input.sns_topic_arn.is_none());
        assert!(input.source_type.is_none());

        assert!(modify_input("events", &prior, &prior).is_noop());
    }

    #[test]
    fn test_modify_input_clears_source_type() {
        let prior = json!({"sns_topic_arn": "arn:a", "source_type": "db-cluster"});
        let planned = json!({"sns_topic_arn": "arn:a", "source_type": null});

        let input = modify_input("events", &prior, &planned);
        assert_eq!(input.source_type.as_deref(), Some(""));
        assert!(!input.is_noop());

        let unset = json!({"sns_topic_arn": "arn:a", "source_type": null});
        assert!(modify_input("events", &unset, &json!({"sns_topic_arn": "arn:a"})).is_noop());
    }
}
