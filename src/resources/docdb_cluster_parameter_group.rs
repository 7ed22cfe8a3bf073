//! `aws_docdb_cluster_parameter_group`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::docdb_flex::{
    decode_parameters, expand_parameters, flatten_parameters, parameter_block,
    parameters_to_value, ParameterConfig, PARAMETER_BLOCK,
};
use super::{check_name_conflict, decode_config, state_str, Context, ResourceHandler};
use crate::api::{CreateClusterParameterGroupInput, Parameter};
use crate::error::{ApiError, ProviderError};
use crate::naming::{name_prefix_from_name, resolve_name};
use crate::schema::{Attribute, Diagnostic, Schema};
use crate::tags::{self, TagDiff, Tags};
use crate::validation;

/// Resource type name.
pub const TYPE_NAME: &str = "aws_docdb_cluster_parameter_group";

/// Description used when none is configured.
pub const DEFAULT_DESCRIPTION: &str = "Managed by Hemmer";

/// Most parameters a single modify or reset call accepts.
pub const MAX_PARAMETERS_PER_CALL: usize = 20;

/// Handler for DocumentDB cluster parameter groups.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClusterParameterGroupResource;

#[derive(Debug, Deserialize)]
struct ClusterParameterGroupConfig {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    name_prefix: Option<String>,
    family: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    tags: Option<Tags>,
}

impl ClusterParameterGroupResource {
    async fn find(
        &self,
        ctx: &Context,
        name: &str,
        reference: &[ParameterConfig],
        name_prefix: &Value,
    ) -> Result<Option<Value>, ProviderError> {
        let group = match ctx
            .call(
                "DescribeDBClusterParameterGroups",
                ctx.docdb.describe_cluster_parameter_group(name),
            )
            .await
        {
            Ok(group) => group,
            Err(ApiError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let parameters = ctx
            .call(
                "DescribeDBClusterParameters",
                ctx.docdb.describe_cluster_parameters(name),
            )
            .await?;
        let tags = ctx
            .call(
                "ListTagsForResource",
                ctx.docdb.list_tags_for_resource(&group.arn),
            )
            .await?;

        Ok(Some(json!({
            "id": group.name,
            "arn": group.arn,
            "name": group.name,
            "name_prefix": name_prefix,
            "family": group.family,
            "description": group.description,
            PARAMETER_BLOCK: parameters_to_value(&flatten_parameters(&parameters, reference)),
            "tags": tags::from_api(&tags),
        })))
    }

    async fn modify(
        &self,
        ctx: &Context,
        name: &str,
        parameters: Vec<Parameter>,
    ) -> Result<(), ProviderError> {
        for batch in parameters.chunks(MAX_PARAMETERS_PER_CALL) {
            debug!(name = %name, count = batch.len(), "modifying cluster parameters");
            ctx.call(
                "ModifyDBClusterParameterGroup",
                ctx.docdb.modify_cluster_parameter_group(name, batch.to_vec()),
            )
            .await?;
        }
        Ok(())
    }

    async fn reset(
        &self,
        ctx: &Context,
        name: &str,
        parameters: Vec<Parameter>,
    ) -> Result<(), ProviderError> {
        for batch in parameters.chunks(MAX_PARAMETERS_PER_CALL) {
            debug!(name = %name, count = batch.len(), "resetting cluster parameters");
            ctx.call(
                "ResetDBClusterParameterGroup",
                ctx.docdb.reset_cluster_parameter_group(name, batch.to_vec()),
            )
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceHandler for ClusterParameterGroupResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("arn", Attribute::computed_string())
            .with_attribute(
                "name",
                Attribute::optional_computed_string().with_force_new(),
            )
            .with_attribute(
                "name_prefix",
                Attribute::optional_computed_string().with_force_new(),
            )
            .with_attribute(
                "family",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("Parameter group family, e.g. docdb5.0"),
            )
            .with_attribute(
                "description",
                Attribute::optional_string()
                    .with_force_new()
                    .with_default(json!(DEFAULT_DESCRIPTION)),
            )
            .with_attribute("tags", Attribute::tags())
            .with_block(PARAMETER_BLOCK, parameter_block())
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let mut diagnostics = validation::validate(&self.schema(), config);
        // Shape errors are already reported; only look for bad values.
        if diagnostics.is_empty() {
            if let Err(ProviderError::Decode(errors)) =
                decode_parameters(config.get(PARAMETER_BLOCK).unwrap_or(&Value::Null))
            {
                diagnostics.extend(errors);
            }
        }
        diagnostics.extend(check_name_conflict(config));
        diagnostics
    }

    async fn create(&self, ctx: &Context, planned: &Value) -> Result<Value, ProviderError> {
        let config: ClusterParameterGroupConfig = decode_config(&self.schema(), planned)?;
        let parameters = decode_parameters(planned.get(PARAMETER_BLOCK).unwrap_or(&Value::Null))?;
        let name = resolve_name(config.name.as_deref(), config.name_prefix.as_deref());

        let group = ctx
            .call(
                "CreateDBClusterParameterGroup",
                ctx.docdb
                    .create_cluster_parameter_group(CreateClusterParameterGroupInput {
                        name: name.clone(),
                        family: config.family,
                        description: config
                            .description
                            .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
                        tags: tags::to_api(&config.tags.unwrap_or_default()),
                    }),
            )
            .await?;
        info!(name = %group.name, arn = %group.arn, "created cluster parameter group");

        if !parameters.is_empty() {
            self.modify(ctx, &name, expand_parameters(&parameters)).await?;
        }

        let name_prefix = json!(config.name_prefix);
        self.find(ctx, &name, &parameters, &name_prefix)
            .await?
            .ok_or_else(|| {
                ProviderError::NotFound(format!(
                    "DocumentDB Cluster Parameter Group {} vanished after create",
                    name
                ))
            })
    }

    async fn read(&self, ctx: &Context, current: &Value) -> Result<Option<Value>, ProviderError> {
        let name = state_str(current, "id").or_else(|_| state_str(current, "name"))?;
        let reference = decode_parameters(current.get(PARAMETER_BLOCK).unwrap_or(&Value::Null))?;
        let name_prefix = current.get("name_prefix").cloned().unwrap_or(Value::Null);

        let state = self.find(ctx, name, &reference, &name_prefix).await?;
        if state.is_none() {
            warn!(name = %name, "DocumentDB Cluster Parameter Group not found, removing from state");
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
        let old = decode_parameters(prior.get(PARAMETER_BLOCK).unwrap_or(&Value::Null))?;
        let new = decode_parameters(planned.get(PARAMETER_BLOCK).unwrap_or(&Value::Null))?;

        let changed: Vec<_> = new.iter().filter(|p| !old.contains(p)).cloned().collect();
        let removed: Vec<_> = old
            .iter()
            .filter(|o| !new.iter().any(|n| n.name == o.name))
            .cloned()
            .collect();

        if !removed.is_empty() {
            self.reset(ctx, name, expand_parameters(&removed)).await?;
        }
        if !changed.is_empty() {
            self.modify(ctx, name, expand_parameters(&changed)).await?;
        }

        let arn = state_str(prior, "arn")?;
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
        self.find(ctx, name, &new, &name_prefix)
            .await?
            .ok_or_else(|| {
                ProviderError::NotFound(format!(
                    "DocumentDB Cluster Parameter Group {} not found",
                    name
                ))
            })
    }

    async fn delete(&self, ctx: &Context, current: &Value) -> Result<(), ProviderError> {
        let name = state_str(current, "id").or_else(|_| state_str(current, "name"))?;
        match ctx
            .call(
                "DeleteDBClusterParameterGroup",
                ctx.docdb.delete_cluster_parameter_group(name),
            )
            .await
        {
            Ok(()) => {
                info!(name = %name, "deleted cluster parameter group");
                Ok(())
            },
            Err(ApiError::NotFound(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn import(&self, ctx: &Context, id: &str) -> Result<Value, ProviderError> {
        let name_prefix = json!(name_prefix_from_name(id));
        self.find(ctx, id, &[], &name_prefix).await?.ok_or_else(|| {
            ProviderError::NotFound(format!(
                "Cannot import non-existent remote object: DocumentDB Cluster Parameter Group {}",
                id
            ))
        })
    }
}
