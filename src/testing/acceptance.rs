//! Multi-step acceptance scenarios against [`MemoryCloud`].
//!
//! An [`AcceptanceTest`] applies a sequence of [`TestStep`]s to one resource
//! through the provider, the way a host would:
//!
//! 1. validate the configuration, refresh the prior state, plan and apply
//! 2. read the result back and run the step's [`Check`]s
//! 3. refresh and plan again; the plan must be empty unless the step says
//!    otherwise
//!
//! Import steps import the resource by ID and compare the result with the
//! applied state. After the last step the resource is destroyed and every
//! object the scenario created must be gone remotely.

use std::sync::Arc;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use super::{MemoryCloud, ProviderTester};
use crate::api::{find_vpc_connector_by_arn, AppRunnerApi, DocDbApi};
use crate::error::{ApiError, ApiResult, ProviderError};
use crate::provider::AwsProvider;
use crate::resources::{
    apprunner_vpc_connector, docdb_cluster_parameter_group, docdb_event_subscription,
};
use crate::types::PlanAction;

/// How a scenario ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Every step passed and the destroy check found nothing left behind.
    Passed,
    /// The pre-check found the service unavailable.
    Skipped(String),
}

/// A failed scenario. Steps are numbered from 1.
#[derive(Debug, Error)]
pub enum AcceptanceError {
    /// The pre-check failed with an error that does not mean "skip".
    #[error("pre-check failed: {0}")]
    PreCheck(ApiError),

    /// The provider could not be configured.
    #[error("provider configuration rejected: {0}")]
    Configure(String),

    /// The step's configuration did not validate.
    #[error("step {step}: invalid configuration: {message}")]
    Invalid {
        /// Step number.
        step: usize,
        /// Rendered diagnostics.
        message: String,
    },

    /// A provider operation failed.
    #[error("step {step}: {source}")]
    Provider {
        /// Step number.
        step: usize,
        /// The provider's error.
        #[source]
        source: ProviderError,
    },

    /// A post-apply check failed.
    #[error("step {step}: check failed: {message}")]
    Check {
        /// Step number.
        step: usize,
        /// What was expected and what was found.
        message: String,
    },

    /// The plan after apply was not what the step expected.
    #[error("step {step}: {message}")]
    Plan {
        /// Step number.
        step: usize,
        /// Description of the plan.
        message: String,
    },

    /// The imported state differs from the applied state.
    #[error("step {step}: import mismatch: {message}")]
    Import {
        /// Step number.
        step: usize,
        /// The differing attributes.
        message: String,
    },

    /// A resource survived destroy.
    #[error("destroy check failed: {0}")]
    Destroy(String),
}

/// A check run against the state read back after an apply step.
#[derive(Debug, Clone)]
pub enum Check {
    /// The resource exists remotely.
    Exists,
    /// The attribute at a dotted path equals a value.
    Attr(String, Value),
    /// The list, set or map at a dotted path has this many elements.
    Count(String, usize),
    /// The string at a dotted path matches a pattern.
    Matches(String, Regex),
    /// Delete the resource behind the configuration's back.
    Disappears,
}

impl Check {
    /// [`Check::Attr`].
    pub fn attr(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Attr(path.into(), value.into())
    }

    /// [`Check::Count`].
    pub fn count(path: impl Into<String>, n: usize) -> Self {
        Self::Count(path.into(), n)
    }

    /// [`Check::Matches`].
    pub fn matches(path: impl Into<String>, pattern: Regex) -> Self {
        Self::Matches(path.into(), pattern)
    }
}

/// One step of a scenario.
#[derive(Debug, Clone)]
pub enum TestStep {
    /// Apply a configuration and check the result.
    Apply {
        /// The resource configuration.
        config: Value,
        /// Checks run after apply.
        checks: Vec<Check>,
        /// The plan after apply is expected to be non-empty.
        expect_non_empty_plan: bool,
    },
    /// Import the current resource by ID and compare with the applied state.
    Import {
        /// Attributes the import cannot reconstruct.
        ignore: Vec<String>,
    },
}

impl TestStep {
    /// Apply `config` and run `checks`.
    pub fn apply(config: Value, checks: Vec<Check>) -> Self {
        Self::Apply {
            config,
            checks,
            expect_non_empty_plan: false,
        }
    }

    /// Import and compare every attribute.
    pub fn import() -> Self {
        Self::Import { ignore: Vec::new() }
    }

    /// Import and compare all attributes but `ignore`.
    pub fn import_ignoring(ignore: &[&str]) -> Self {
        Self::Import {
            ignore: ignore.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Allow a non-empty plan after this step.
    pub fn expect_non_empty_plan(mut self) -> Self {
        if let Self::Apply {
            expect_non_empty_plan,
            ..
        } = &mut self
        {
            *expect_non_empty_plan = true;
        }
        self
    }
}

/// A scenario for one resource type.
#[derive(Debug, Clone)]
pub struct AcceptanceTest {
    resource_type: String,
    provider_config: Value,
    pre_check: bool,
    steps: Vec<TestStep>,
}

struct Run {
    tester: ProviderTester<AwsProvider>,
    cloud: Arc<MemoryCloud>,
    resource_type: String,
    state: Option<Value>,
    config: Value,
    created: Vec<Value>,
}

impl AcceptanceTest {
    /// A scenario for `resource_type` with fast polling.
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            provider_config: serde_json::json!({
                "polling": {"initial_delay_ms": 1, "max_delay_ms": 10, "multiplier": 2.0},
                "timeouts": {"create": 5, "delete": 5, "operation": 5}
            }),
            pre_check: false,
            steps: Vec::new(),
        }
    }

    /// Provider configuration applied before the first step.
    pub fn provider_config(mut self, config: Value) -> Self {
        self.provider_config = config;
        self
    }

    /// Probe the service before running and skip if it is unavailable.
    pub fn pre_check(mut self) -> Self {
        self.pre_check = true;
        self
    }

    /// Append a step.
    pub fn step(mut self, step: TestStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Run the scenario.
    ///
    /// The resource is destroyed even if a step fails. A step failure is
    /// reported in preference to a destroy failure.
    pub async fn run(self, cloud: Arc<MemoryCloud>) -> Result<Outcome, AcceptanceError> {
        if self.pre_check {
            if let Err(e) = pre_check(cloud.as_ref(), &self.resource_type).await {
                return match e {
                    ApiError::Fatal(msg) if is_pre_check_skip_error(&msg) => {
                        info!(resource_type = %self.resource_type, reason = %msg, "skipping acceptance test");
                        Ok(Outcome::Skipped(msg))
                    },
                    other => Err(AcceptanceError::PreCheck(other)),
                };
            }
        }

        let tester = ProviderTester::new(AwsProvider::new(cloud.clone(), cloud.clone()));
        tester
            .configure(self.provider_config.clone())
            .await
            .map_err(|e| AcceptanceError::Configure(e.to_string()))?;

        let mut run = Run {
            tester,
            cloud,
            resource_type: self.resource_type.clone(),
            state: None,
            config: Value::Null,
            created: Vec::new(),
        };

        let mut result = Ok(());
        for (i, step) in self.steps.iter().enumerate() {
            let n = i + 1;
            debug!(resource_type = %run.resource_type, step = n, "running step");
            result = match step {
                TestStep::Apply {
                    config,
                    checks,
                    expect_non_empty_plan,
                } => run.apply(n, config, checks, *expect_non_empty_plan).await,
                TestStep::Import { ignore } => run.import(n, ignore).await,
            };
            if result.is_err() {
                break;
            }
        }

        let destroyed = run.destroy().await;
        result?;
        destroyed?;
        Ok(Outcome::Passed)
    }
}

impl Run {
    async fn apply(
        &mut self,
        step: usize,
        config: &Value,
        checks: &[Check],
        expect_non_empty_plan: bool,
    ) -> Result<(), AcceptanceError> {
        let provider_err = |source| AcceptanceError::Provider { step, source };

        self.tester
            .validate_resource_config(&self.resource_type, config.clone())
            .await
            .map_err(|e| AcceptanceError::Invalid {
                step,
                message: e.to_string(),
            })?;
        self.config = config.clone();

        self.refresh().await.map_err(provider_err)?;
        let prior = self.state.clone();
        let plan = match &prior {
            Some(prior) => {
                self.tester
                    .plan_update(&self.resource_type, prior.clone(), config.clone())
                    .await
            },
            None => self.tester.plan_create(&self.resource_type, config.clone()).await,
        }
        .map_err(provider_err)?;

        let action = plan.action(prior.is_some());
        debug!(resource_type = %self.resource_type, step, action = ?action, "applying plan");
        let applied = match (action, prior) {
            (PlanAction::Create, _) => Some(self.create(plan.planned_state).await),
            (PlanAction::Update, Some(prior)) => Some(
                self.tester
                    .update(&self.resource_type, prior, plan.planned_state)
                    .await,
            ),
            (PlanAction::Replace, Some(prior)) => {
                match self.tester.delete(&self.resource_type, prior).await {
                    Ok(()) => Some(self.create(plan.planned_state).await),
                    Err(e) => Some(Err(e)),
                }
            },
            _ => None,
        };
        if let Some(applied) = applied {
            self.state = Some(applied.map_err(provider_err)?);
        }
        self.refresh().await.map_err(provider_err)?;

        let Some(state) = self.state.clone() else {
            return Err(AcceptanceError::Check {
                step,
                message: "resource not found after apply".to_string(),
            });
        };
        for check in checks {
            self.check(step, check, &state).await?;
        }

        self.refresh().await.map_err(provider_err)?;
        let plan = match self.state.clone() {
            Some(state) => {
                self.tester
                    .plan_update(&self.resource_type, state, config.clone())
                    .await
            },
            None => self.tester.plan_create(&self.resource_type, config.clone()).await,
        }
        .map_err(provider_err)?;

        match (plan.is_empty(), expect_non_empty_plan) {
            (false, false) => Err(AcceptanceError::Plan {
                step,
                message: format!(
                    "after applying this step, the plan was not empty: {:?}",
                    plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
                ),
            }),
            (true, true) => Err(AcceptanceError::Plan {
                step,
                message: "expected a non-empty plan, but got an empty plan".to_string(),
            }),
            _ => Ok(()),
        }
    }

    async fn import(&mut self, step: usize, ignore: &[String]) -> Result<(), AcceptanceError> {
        let provider_err = |source| AcceptanceError::Provider { step, source };

        let Some(state) = self.state.clone() else {
            return Err(AcceptanceError::Import {
                step,
                message: "nothing to import".to_string(),
            });
        };
        let id = state
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| AcceptanceError::Import {
                step,
                message: "state has no id".to_string(),
            })?;

        let mut imported = self
            .tester
            .import_state(&self.resource_type, id)
            .await
            .map_err(provider_err)?;

        let mismatched: Vec<String> = state
            .as_object()
            .into_iter()
            .flatten()
            .filter(|(key, _)| !ignore.contains(*key))
            .filter(|(key, value)| imported.get(key.as_str()).unwrap_or(&Value::Null) != *value)
            .map(|(key, value)| {
                format!(
                    "{}: applied {} imported {}",
                    key,
                    value,
                    imported.get(key.as_str()).unwrap_or(&Value::Null)
                )
            })
            .collect();
        if !mismatched.is_empty() {
            return Err(AcceptanceError::Import {
                step,
                message: mismatched.join("; "),
            });
        }

        // Ignored attributes are not reconstructible, so plan against what was applied.
        if let Some(obj) = imported.as_object_mut() {
            for key in ignore {
                if let Some(value) = state.get(key) {
                    obj.insert(key.clone(), value.clone());
                }
            }
        }
        let plan = self
            .tester
            .plan_update(&self.resource_type, imported, self.config.clone())
            .await
            .map_err(provider_err)?;
        if !plan.is_empty() {
            return Err(AcceptanceError::Import {
                step,
                message: format!(
                    "imported state does not match configuration: {:?}",
                    plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
                ),
            });
        }
        Ok(())
    }

    async fn create(&mut self, planned: Value) -> Result<Value, ProviderError> {
        let state = self.tester.create(&self.resource_type, planned).await?;
        self.created.push(state.clone());
        Ok(state)
    }

    async fn refresh(&mut self) -> Result<(), ProviderError> {
        if let Some(state) = self.state.take() {
            let current = self.tester.read(&self.resource_type, state).await?;
            self.state = (!current.is_null()).then_some(current);
        }
        Ok(())
    }

    async fn check(&self, step: usize, check: &Check, state: &Value) -> Result<(), AcceptanceError> {
        let fail = |message: String| Err(AcceptanceError::Check { step, message });

        match check {
            Check::Exists => match remote_exists(self.cloud.as_ref(), &self.resource_type, state).await {
                Ok(true) => Ok(()),
                Ok(false) => fail(format!("{} does not exist remotely", self.resource_type)),
                Err(e) => fail(format!("checking existence: {}", e)),
            },
            Check::Attr(path, expected) => match lookup(state, path) {
                Some(actual) if actual == expected => Ok(()),
                actual => fail(format!("{}: expected {}, got {:?}", path, expected, actual)),
            },
            Check::Count(path, expected) => {
                let actual = match lookup(state, path) {
                    Some(Value::Array(items)) => items.len(),
                    Some(Value::Object(map)) => map.len(),
                    None | Some(Value::Null) => 0,
                    Some(other) => return fail(format!("{}: {} is not a collection", path, other)),
                };
                if actual == *expected {
                    Ok(())
                } else {
                    fail(format!("{}: expected {} elements, got {}", path, expected, actual))
                }
            },
            Check::Matches(path, pattern) => match lookup(state, path).and_then(Value::as_str) {
                Some(actual) if pattern.is_match(actual) => Ok(()),
                actual => fail(format!("{}: {:?} does not match {}", path, actual, pattern)),
            },
            Check::Disappears => self
                .tester
                .delete(&self.resource_type, state.clone())
                .await
                .map_err(|source| AcceptanceError::Provider { step, source }),
        }
    }

    async fn destroy(&mut self) -> Result<(), AcceptanceError> {
        if let Some(state) = self.state.take() {
            self.tester
                .delete(&self.resource_type, state)
                .await
                .map_err(|e| AcceptanceError::Destroy(e.to_string()))?;
        }

        for state in &self.created {
            match remote_exists(self.cloud.as_ref(), &self.resource_type, state).await {
                Ok(false) => {},
                Ok(true) => {
                    return Err(AcceptanceError::Destroy(format!(
                        "{} {} still exists",
                        self.resource_type,
                        state.get("id").unwrap_or(&Value::Null)
                    )))
                },
                Err(e) => return Err(AcceptanceError::Destroy(e.to_string())),
            }
        }
        Ok(())
    }
}

/// Look up a dotted path. Numeric segments index lists.
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Whether the resource behind `state` still exists remotely.
pub async fn remote_exists(
    cloud: &MemoryCloud,
    resource_type: &str,
    state: &Value,
) -> ApiResult<bool> {
    let id = state
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::Fatal("state has no id".to_string()))?;

    let found = match resource_type {
        apprunner_vpc_connector::TYPE_NAME => find_vpc_connector_by_arn(cloud, id).await.map(|_| ()),
        docdb_cluster_parameter_group::TYPE_NAME => {
            cloud.describe_cluster_parameter_group(id).await.map(|_| ())
        },
        docdb_event_subscription::TYPE_NAME => cloud.describe_event_subscription(id).await.map(|_| ()),
        other => return Err(ApiError::Fatal(format!("no probe for {}", other))),
    };
    match found {
        Ok(()) => Ok(true),
        Err(ApiError::NotFound(_)) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Probe the service a resource type needs.
async fn pre_check(cloud: &MemoryCloud, resource_type: &str) -> ApiResult<()> {
    if resource_type == apprunner_vpc_connector::TYPE_NAME {
        return cloud.list_vpc_connectors().await.map(|_| ());
    }
    let probe = format!("tf-acc-pre-check-{}", Uuid::new_v4().simple());
    match cloud.describe_cluster_parameter_group(&probe).await {
        Ok(_) | Err(ApiError::NotFound(_)) => Ok(()),
        Err(e) => Err(e),
    }
}

/// Errors meaning the service is not usable from this account or region.
pub fn is_pre_check_skip_error(message: &str) -> bool {
    const MARKERS: &[&str] = &[
        "AccessDenied",
        "UnauthorizedOperation",
        "UnsupportedOperation",
        "UnknownOperation",
        "InvalidAction",
        "is not supported in this region",
        "Service is not available",
    ];
    MARKERS.iter().any(|marker| message.contains(marker))
}
