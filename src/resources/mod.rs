//! Resource lifecycle handlers.
//!
//! Each supported resource type implements [`ResourceHandler`]. The provider
//! looks handlers up by type name and forwards every lifecycle call with a
//! [`Context`] holding the remote clients and a snapshot of the provider
//! configuration.
//!
//! Handlers never diff state in memory. Create, update and import all finish
//! by reading the resource back, so the returned state is always what the
//! remote service reports.

pub mod apprunner_vpc_connector;
pub mod docdb_cluster_parameter_group;
pub mod docdb_event_subscription;
pub mod docdb_flex;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::api::{AppRunnerApi, DocDbApi};
use crate::config::ProviderConfig;
use crate::error::{ApiResult, ProviderError};
use crate::schema::{AttributeType, Block, BlockNestingMode, Diagnostic, Schema};
use crate::types::{AttributeChange, PlanResult};
use crate::validation;
use crate::wait::with_deadline;

pub use apprunner_vpc_connector::VpcConnectorResource;
pub use docdb_cluster_parameter_group::ClusterParameterGroupResource;
pub use docdb_event_subscription::EventSubscriptionResource;

/// What a handler needs to talk to AWS.
#[derive(Clone)]
pub struct Context {
    /// Provider configuration at the time the operation started.
    pub config: ProviderConfig,
    /// App Runner client.
    pub apprunner: Arc<dyn AppRunnerApi>,
    /// DocumentDB client.
    pub docdb: Arc<dyn DocDbApi>,
}

impl Context {
    /// Run one remote call under the configured per-call deadline.
    pub async fn call<T, Fut>(&self, operation: &str, call: Fut) -> ApiResult<T>
    where
        Fut: Future<Output = ApiResult<T>>,
    {
        with_deadline(self.config.timeouts.operation(), operation, call).await
    }
}

/// Lifecycle of one resource type.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    /// The resource type name, e.g. `aws_apprunner_vpc_connector`.
    fn type_name(&self) -> &'static str;

    /// The resource schema.
    fn schema(&self) -> Schema;

    /// Check a configuration before planning. No remote calls.
    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        validation::validate(&self.schema(), config)
    }

    /// Compute the planned state.
    fn plan(&self, prior: Option<&Value>, proposed: &Value) -> Result<PlanResult, ProviderError> {
        plan_resource(&self.schema(), prior, proposed)
    }

    /// Create the resource and return its state.
    async fn create(&self, ctx: &Context, planned: &Value) -> Result<Value, ProviderError>;

    /// Refresh state. `None` means the resource no longer exists.
    async fn read(&self, ctx: &Context, current: &Value) -> Result<Option<Value>, ProviderError>;

    /// Update the resource in place and return its new state.
    async fn update(
        &self,
        ctx: &Context,
        prior: &Value,
        planned: &Value,
    ) -> Result<Value, ProviderError>;

    /// Delete the resource. Deleting a resource that is already gone succeeds.
    async fn delete(&self, ctx: &Context, current: &Value) -> Result<(), ProviderError>;

    /// Build full state from an identifier alone.
    async fn import(&self, ctx: &Context, id: &str) -> Result<Value, ProviderError>;
}

/// Every resource type this provider manages.
pub fn handlers() -> Vec<Arc<dyn ResourceHandler>> {
    vec![
        Arc::new(VpcConnectorResource),
        Arc::new(ClusterParameterGroupResource),
        Arc::new(EventSubscriptionResource),
    ]
}

/// Validate `value` against `schema` and decode it into `T`.
///
/// Shape problems are reported with their attribute paths. Values that pass
/// the schema but still do not fit `T` (an unknown enum value, say) are
/// reported as a single diagnostic.
pub fn decode_config<T: DeserializeOwned>(schema: &Schema, value: &Value) -> Result<T, ProviderError> {
    let diagnostics: Vec<_> = validation::validate(schema, value)
        .into_iter()
        .filter(Diagnostic::is_error)
        .collect();
    if !diagnostics.is_empty() {
        return Err(ProviderError::Decode(diagnostics));
    }
    serde_json::from_value(value.clone())
        .map_err(|e| ProviderError::Decode(vec![Diagnostic::error(e.to_string())]))
}

/// Plan a resource against its schema.
///
/// - `proposed == null` plans a delete.
/// - Unset attributes take their schema default, and computed attributes
///   keep their prior value.
/// - Sets and set blocks compare without regard to order. A missing
///   collection equals an empty one.
/// - A change to a `force_new` attribute or block requires replacement, in
///   which case read-only attributes become unknown (`null`).
pub fn plan_resource(
    schema: &Schema,
    prior: Option<&Value>,
    proposed: &Value,
) -> Result<PlanResult, ProviderError> {
    let prior = prior.filter(|p| !p.is_null());

    if proposed.is_null() {
        let changes = match prior {
            Some(Value::Object(obj)) => obj
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| AttributeChange::removed(k, v.clone()))
                .collect(),
            _ => Vec::new(),
        };
        return Ok(PlanResult::with_changes(Value::Null, changes, false));
    }

    let proposed_obj = proposed.as_object().ok_or_else(|| {
        ProviderError::InvalidRequest("proposed state must be an object".to_string())
    })?;
    let mut planned = normalize_block(&schema.block, proposed_obj);

    let Some(prior_obj) = prior.and_then(Value::as_object) else {
        let changes = planned
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| AttributeChange::added(k, v.clone()))
            .collect();
        return Ok(PlanResult::with_changes(
            Value::Object(planned),
            changes,
            false,
        ));
    };

    // Carry computed values the configuration leaves unset.
    for (name, attr) in &schema.block.attributes {
        if attr.flags.computed && planned.get(name).map_or(true, Value::is_null) {
            if let Some(value) = prior_obj.get(name) {
                planned.insert(name.clone(), value.clone());
            }
        }
    }

    let mut changes = Vec::new();
    let mut requires_replace = false;

    for (name, attr) in &schema.block.attributes {
        if attr.flags.is_read_only() {
            continue;
        }
        let before = prior_obj.get(name).unwrap_or(&Value::Null);
        let after = planned.get(name).unwrap_or(&Value::Null);
        if values_equal(&attr.attr_type, before, after) {
            continue;
        }
        requires_replace |= attr.force_new;
        attribute_changes(name, &attr.attr_type, before, after, &mut changes);
    }

    for (name, nested) in &schema.block.blocks {
        let before = prior_obj.get(name).unwrap_or(&Value::Null);
        let after = planned.get(name).unwrap_or(&Value::Null);
        if blocks_equal(nested.nesting_mode, before, after) {
            continue;
        }
        requires_replace |= nested.force_new;
        changes.push(AttributeChange::new(
            name.clone(),
            non_null(before),
            non_null(after),
        ));
    }

    if requires_replace {
        for (name, attr) in &schema.block.attributes {
            if attr.flags.is_read_only() {
                planned.insert(name.clone(), Value::Null);
            }
        }
    }

    Ok(PlanResult::with_changes(
        Value::Object(planned),
        changes,
        requires_replace,
    ))
}

/// Fill defaults and drop keys the block does not declare.
fn normalize_block(block: &Block, value: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    for (name, attr) in &block.attributes {
        let value = value.get(name).filter(|v| !v.is_null()).cloned();
        out.insert(
            name.clone(),
            value.or_else(|| attr.default.clone()).unwrap_or(Value::Null),
        );
    }
    for (name, nested) in &block.blocks {
        let normalized = match (nested.nesting_mode, value.get(name)) {
            (BlockNestingMode::Single, Some(Value::Object(obj))) => {
                Value::Object(normalize_block(&nested.block, obj))
            },
            (BlockNestingMode::Single, _) => Value::Null,
            (_, Some(Value::Array(items))) => Value::Array(
                items
                    .iter()
                    .map(|item| match item {
                        Value::Object(obj) => Value::Object(normalize_block(&nested.block, obj)),
                        other => other.clone(),
                    })
                    .collect(),
            ),
            (_, _) => Value::Array(Vec::new()),
        };
        out.insert(name.clone(), normalized);
    }
    out
}

fn values_equal(attr_type: &AttributeType, a: &Value, b: &Value) -> bool {
    match attr_type {
        AttributeType::Set(_) => sorted_items(a) == sorted_items(b),
        AttributeType::List(_) => collection_items(a) == collection_items(b),
        AttributeType::Map(_) => map_or_empty(a) == map_or_empty(b),
        _ => a == b,
    }
}

fn blocks_equal(mode: BlockNestingMode, a: &Value, b: &Value) -> bool {
    match mode {
        BlockNestingMode::Single => a == b,
        BlockNestingMode::List => collection_items(a) == collection_items(b),
        BlockNestingMode::Set => sorted_items(a) == sorted_items(b),
    }
}

fn collection_items(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| items.iter().map(Value::to_string).collect())
        .unwrap_or_default()
}

fn sorted_items(value: &Value) -> Vec<String> {
    let mut items = collection_items(value);
    items.sort();
    items.dedup();
    items
}

fn map_or_empty(value: &Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

fn non_null(value: &Value) -> Option<Value> {
    (!value.is_null()).then(|| value.clone())
}

/// Maps are reported per key so a plan shows exactly which tags move.
fn attribute_changes(
    name: &str,
    attr_type: &AttributeType,
    before: &Value,
    after: &Value,
    changes: &mut Vec<AttributeChange>,
) {
    if !matches!(attr_type, AttributeType::Map(_)) {
        changes.push(AttributeChange::new(name, non_null(before), non_null(after)));
        return;
    }

    let before = map_or_empty(before);
    let after = map_or_empty(after);
    for (key, old) in &before {
        let path = format!("{}.{}", name, key);
        match after.get(key) {
            None => changes.push(AttributeChange::removed(path, old.clone())),
            Some(new) if new != old => {
                changes.push(AttributeChange::modified(path, old.clone(), new.clone()))
            },
            Some(_) => {},
        }
    }
    for (key, new) in &after {
        if !before.contains_key(key) {
            changes.push(AttributeChange::added(
                format!("{}.{}", name, key),
                new.clone(),
            ));
        }
    }
}

/// A required string attribute out of a state object.
pub(crate) fn state_str<'a>(state: &'a Value, key: &str) -> Result<&'a str, ProviderError> {
    state
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ProviderError::InvalidRequest(format!("state has no {:?}", key)))
}

/// A set of strings in a stable order.
pub(crate) fn sorted(mut values: Vec<String>) -> Vec<String> {
    values.sort();
    values.dedup();
    values
}

/// Report `name` and `name_prefix` set together.
pub(crate) fn check_name_conflict(config: &Value) -> Option<Diagnostic> {
    let set = |key: &str| config.get(key).is_some_and(|v| !v.is_null());
    (set("name") && set("name_prefix")).then(|| {
        Diagnostic::error("\"name\": conflicts with name_prefix").with_attribute("name")
    })
}
