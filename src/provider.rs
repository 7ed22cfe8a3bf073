//! The provider surface.
//!
//! [`ProviderService`] is the set of operations a host drives: schema,
//! configuration, planning and the resource lifecycle. [`AwsProvider`]
//! implements it by dispatching on the resource type to a
//! [`ResourceHandler`].

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};

use crate::api::{AppRunnerApi, DocDbApi};
use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::resources::{self, Context, ResourceHandler};
use crate::schema::{Diagnostic, ProviderSchema};
use crate::types::{ImportedResource, PlanResult, ProviderMetadata};
use crate::validation;

/// Operations a provider exposes to its host.
///
/// # Example
///
/// ```ignore
/// use hemmer_provider_aws::{AwsProvider, ProviderService};
/// use serde_json::json;
///
/// let provider = AwsProvider::new(apprunner_client, docdb_client);
/// provider.configure(json!({"region": "us-west-2"})).await?;
///
/// let config = json!({"name": "conn", "subnets": ["subnet-1"], "security_groups": ["sg-1"]});
/// let plan = provider
///     .plan("aws_apprunner_vpc_connector", None, config.clone(), config)
///     .await?;
/// let state = provider
///     .create("aws_apprunner_vpc_connector", plan.planned_state)
///     .await?;
/// ```
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    // =========================================================================
    // Schema & Metadata
    // =========================================================================

    /// Return the provider's schema including all resources.
    fn schema(&self) -> ProviderSchema;

    /// Return provider metadata. By default, this is derived from the schema.
    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            resources: self.schema().resources.keys().cloned().collect(),
        }
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Validate the provider configuration before configuring.
    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = config;
        Ok(vec![])
    }

    /// Configure the provider. Returns diagnostics (errors and warnings).
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Stop the provider gracefully.
    async fn stop(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Validate a resource's configuration before planning.
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (resource_type, config);
        Ok(vec![])
    }

    /// Plan changes for a resource.
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError>;

    /// Create a new resource.
    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError>;

    /// Read the current state of a resource. `Value::Null` means it is gone.
    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError>;

    /// Update an existing resource.
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete a resource.
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError>;

    /// Import existing infrastructure into management.
    async fn import_resource(
        &self,
        resource_type: &str,
        _id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        Err(ProviderError::Unimplemented(format!(
            "Import not supported for resource type: {}",
            resource_type
        )))
    }
}

/// The AWS provider.
pub struct AwsProvider {
    apprunner: Arc<dyn AppRunnerApi>,
    docdb: Arc<dyn DocDbApi>,
    config: RwLock<ProviderConfig>,
    handlers: BTreeMap<&'static str, Arc<dyn ResourceHandler>>,
}

impl AwsProvider {
    /// Create a provider talking to the given clients, with default configuration.
    pub fn new(apprunner: Arc<dyn AppRunnerApi>, docdb: Arc<dyn DocDbApi>) -> Self {
        let handlers = resources::handlers()
            .into_iter()
            .map(|h| (h.type_name(), h))
            .collect();
        Self {
            apprunner,
            docdb,
            config: RwLock::new(ProviderConfig::default()),
            handlers,
        }
    }

    /// The configuration currently in effect.
    pub async fn config(&self) -> ProviderConfig {
        self.config.read().await.clone()
    }

    fn handler(&self, resource_type: &str) -> Result<&Arc<dyn ResourceHandler>, ProviderError> {
        self.handlers
            .get(resource_type)
            .ok_or_else(|| ProviderError::UnknownResource(resource_type.to_string()))
    }

    async fn context(&self) -> Context {
        Context {
            config: self.config.read().await.clone(),
            apprunner: Arc::clone(&self.apprunner),
            docdb: Arc::clone(&self.docdb),
        }
    }
}

#[async_trait::async_trait]
impl ProviderService for AwsProvider {
    fn schema(&self) -> ProviderSchema {
        self.handlers.values().fold(
            ProviderSchema::new().with_provider_config(ProviderConfig::schema()),
            |schema, handler| schema.with_resource(handler.type_name(), handler.schema()),
        )
    }

    #[instrument(skip(self, config), name = "provider.validate_provider_config")]
    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let mut diagnostics = validation::validate(&ProviderConfig::schema(), &config);
        if diagnostics.is_empty() {
            if let Err(e) = ProviderConfig::from_value(config) {
                diagnostics.push(Diagnostic::error(e.message()));
            }
        }
        if diagnostics.is_empty() {
            debug!("provider configuration is valid");
        } else {
            warn!(diagnostics = diagnostics.len(), "provider configuration has errors");
        }
        Ok(diagnostics)
    }

    #[instrument(skip(self, config), name = "provider.configure")]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let diagnostics = self.validate_provider_config(config.clone()).await?;
        if diagnostics.iter().any(Diagnostic::is_error) {
            return Ok(diagnostics);
        }

        let config = ProviderConfig::from_value(config)?;
        info!(region = %config.region, "provider configured");
        *self.config.write().await = config;
        Ok(diagnostics)
    }

    #[instrument(skip(self), name = "provider.stop")]
    async fn stop(&self) -> Result<(), ProviderError> {
        info!("provider stopping");
        Ok(())
    }

    #[instrument(skip(self, config), name = "provider.validate_resource_config")]
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let diagnostics = self.handler(resource_type)?.validate(&config);
        if diagnostics.is_empty() {
            debug!(resource_type = %resource_type, "resource configuration is valid");
        } else {
            warn!(
                resource_type = %resource_type,
                diagnostics = diagnostics.len(),
                "resource configuration has errors"
            );
        }
        Ok(diagnostics)
    }

    #[instrument(skip(self, prior_state, proposed_state, config), name = "provider.plan")]
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let handler = self.handler(resource_type)?;

        let diagnostics: Vec<_> = handler
            .validate(&config)
            .into_iter()
            .filter(Diagnostic::is_error)
            .collect();
        if !diagnostics.is_empty() {
            error!(resource_type = %resource_type, diagnostics = diagnostics.len(), "Plan failed");
            return Err(ProviderError::Decode(diagnostics));
        }

        let result = handler.plan(prior_state.as_ref(), &proposed_state)?;
        info!(
            resource_type = %resource_type,
            changes = result.changes.len(),
            requires_replace = result.requires_replace,
            "Plan completed"
        );
        Ok(result)
    }

    #[instrument(skip(self, planned_state), name = "provider.create")]
    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        info!(resource_type = %resource_type, "Create called");
        let ctx = self.context().await;
        match self.handler(resource_type)?.create(&ctx, &planned_state).await {
            Ok(state) => {
                info!(resource_type = %resource_type, "Create completed successfully");
                Ok(state)
            },
            Err(e) => {
                error!(resource_type = %resource_type, error = %e, "Create failed");
                Err(e)
            },
        }
    }

    #[instrument(skip(self, current_state), name = "provider.read")]
    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        debug!(resource_type = %resource_type, "Read called");
        let ctx = self.context().await;
        match self.handler(resource_type)?.read(&ctx, &current_state).await {
            Ok(state) => {
                debug!(
                    resource_type = %resource_type,
                    exists = state.is_some(),
                    "Read completed successfully"
                );
                Ok(state.unwrap_or(Value::Null))
            },
            Err(e) => {
                error!(resource_type = %resource_type, error = %e, "Read failed");
                Err(e)
            },
        }
    }

    #[instrument(skip(self, prior_state, planned_state), name = "provider.update")]
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        info!(resource_type = %resource_type, "Update called");
        let ctx = self.context().await;
        match self
            .handler(resource_type)?
            .update(&ctx, &prior_state, &planned_state)
            .await
        {
            Ok(state) => {
                info!(resource_type = %resource_type, "Update completed successfully");
                Ok(state)
            },
            Err(e) => {
                error!(resource_type = %resource_type, error = %e, "Update failed");
                Err(e)
            },
        }
    }

    #[instrument(skip(self, current_state), name = "provider.delete")]
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        info!(resource_type = %resource_type, "Delete called");
        let ctx = self.context().await;
        match self.handler(resource_type)?.delete(&ctx, &current_state).await {
            Ok(()) => {
                info!(resource_type = %resource_type, "Delete completed successfully");
                Ok(())
            },
            Err(e) => {
                error!(resource_type = %resource_type, error = %e, "Delete failed");
                Err(e)
            },
        }
    }

    #[instrument(skip(self), name = "provider.import_resource")]
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        info!(resource_type = %resource_type, id = %id, "ImportResource called");
        let ctx = self.context().await;
        match self.handler(resource_type)?.import(&ctx, id).await {
            Ok(state) => {
                info!(resource_type = %resource_type, id = %id, "ImportResource completed");
                Ok(vec![ImportedResource::new(resource_type, state)])
            },
            Err(e) => {
                error!(resource_type = %resource_type, id = %id, error = %e, "ImportResource failed");
                Err(e)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryCloud;
    use serde_json::json;

    fn provider() -> AwsProvider {
        let cloud = Arc::new(MemoryCloud::new());
        AwsProvider::new(cloud.clone(), cloud)
    }

    #[test]
    fn test_schema_lists_every_resource() {
        let provider = provider();
        let schema = provider.schema();
        assert!(schema.resources.contains_key("aws_apprunner_vpc_connector"));
        assert!(schema.resources.contains_key("aws_docdb_cluster_parameter_group"));
        assert!(schema.resources.contains_key("aws_docdb_event_subscription"));
        assert!(schema.provider.attribute("region").is_some());
        assert_eq!(provider.metadata().resources.len(), 3);
    }

    #[tokio::test]
    async fn test_configure() {
        let provider = provider();
        let diagnostics = provider
            .configure(json!({"region": "eu-west-1", "timeouts": {"create": 30}}))
            .await
            .unwrap();
        assert!(diagnostics.is_empty());

        let config = provider.config().await;
        assert_eq!(config.region, "eu-west-1");
        assert_eq!(config.timeouts.create, 30);
        assert_eq!(config.timeouts.delete, 600);
    }

    #[tokio::test]
    async fn test_configure_rejects_unknown_keys() {
        let provider = provider();
        let diagnostics = provider
            .configure(json!({"region": "eu-west-1", "profile": "dev"}))
            .await
            .unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Unsupported argument 'profile'"));
        assert_ne!(provider.config().await.region, "");
    }

    #[tokio::test]
    async fn test_configure_rejects_bad_polling() {
        let provider = provider();
        let diagnostics = provider
            .validate_provider_config(json!({"polling": {"multiplier": 0.5}}))
            .await
            .unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("multiplier"));
    }

    #[tokio::test]
    async fn test_unknown_resource_type() {
        let provider = provider();
        let err = provider
            .create("aws_s3_bucket", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));
    }

    #[tokio::test]
    async fn test_plan_rejects_invalid_config() {
        let provider = provider();
        let config = json!({"name": "x", "subnets": ["s1"], "security_groups": ["g1"]});
        let err = provider
            .plan("aws_apprunner_vpc_connector", None, config.clone(), config)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Decode(_)));
    }
}
