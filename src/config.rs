//! Provider configuration.
//!
//! The host passes the `provider` block as JSON to
//! [`ProviderService::configure`](crate::ProviderService::configure). It is
//! decoded here into [`ProviderConfig`]; every field has a default so an empty
//! object is a valid configuration.
//!
//! ```json
//! {
//!   "region": "us-west-2",
//!   "timeouts": { "create": 600, "delete": 600, "operation": 60 },
//!   "polling": { "initial_delay_ms": 500, "max_delay_ms": 10000, "multiplier": 2.0 }
//! }
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Block, NestedBlock, Schema};
use crate::wait::Backoff;

/// Region used when neither configuration nor environment name one.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Largest accepted `polling.multiplier`.
pub const MAX_MULTIPLIER: f64 = 10.0;

/// Largest accepted timeout, one week.
pub const MAX_TIMEOUT_SECS: u64 = 7 * 24 * 60 * 60;

/// Decoded provider configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// AWS region every client talks to.
    #[serde(default = "default_region")]
    pub region: String,
    /// Deadlines for lifecycle operations.
    #[serde(default)]
    pub timeouts: Timeouts,
    /// Poll settings for waiting on remote state transitions.
    #[serde(default)]
    pub polling: Polling,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            timeouts: Timeouts::default(),
            polling: Polling::default(),
        }
    }
}

impl ProviderConfig {
    /// Decode configuration from the host's JSON.
    ///
    /// `null` is treated as an empty object.
    pub fn from_value(value: Value) -> Result<Self, ProviderError> {
        let value = if value.is_null() {
            Value::Object(Default::default())
        } else {
            value
        };
        let config: Self = serde_json::from_value(value)
            .map_err(|e| ProviderError::Configuration(e.to_string()))?;
        config.check()?;
        Ok(config)
    }

    /// Schema of the provider block.
    pub fn schema() -> Schema {
        Schema::v0()
            .with_attribute(
                "region",
                Attribute::optional_string()
                    .with_description("AWS region; falls back to AWS_REGION, then us-east-1"),
            )
            .with_block(
                "timeouts",
                NestedBlock::single(
                    Block::new()
                        .with_attribute("create", optional_int())
                        .with_attribute("delete", optional_int())
                        .with_attribute("operation", optional_int()),
                ),
            )
            .with_block(
                "polling",
                NestedBlock::single(
                    Block::new()
                        .with_attribute("initial_delay_ms", optional_int())
                        .with_attribute("max_delay_ms", optional_int())
                        .with_attribute(
                            "multiplier",
                            Attribute::new(AttributeType::Float64, AttributeFlags::optional()),
                        ),
                ),
            )
    }

    fn check(&self) -> Result<(), ProviderError> {
        if self.region.is_empty() {
            return Err(ProviderError::Configuration(
                "region must not be empty".to_string(),
            ));
        }
        let multiplier = self.polling.multiplier;
        if !(1.0..=MAX_MULTIPLIER).contains(&multiplier) {
            return Err(ProviderError::Configuration(format!(
                "polling.multiplier must be between 1.0 and {}, got {}",
                MAX_MULTIPLIER, multiplier
            )));
        }
        for (key, secs) in [
            ("create", self.timeouts.create),
            ("delete", self.timeouts.delete),
            ("operation", self.timeouts.operation),
        ] {
            if secs > MAX_TIMEOUT_SECS {
                return Err(ProviderError::Configuration(format!(
                    "timeouts.{} must be at most {} seconds, got {}",
                    key, MAX_TIMEOUT_SECS, secs
                )));
            }
        }
        if self.polling.initial_delay_ms > self.polling.max_delay_ms {
            return Err(ProviderError::Configuration(
                "polling.initial_delay_ms must not exceed polling.max_delay_ms".to_string(),
            ));
        }
        Ok(())
    }

    /// Backoff used while waiting on a state transition.
    pub fn backoff(&self) -> Backoff {
        Backoff {
            initial_delay: Duration::from_millis(self.polling.initial_delay_ms),
            max_delay: Duration::from_millis(self.polling.max_delay_ms),
            multiplier: self.polling.multiplier,
        }
    }
}

fn optional_int() -> Attribute {
    Attribute::new(AttributeType::Int64, AttributeFlags::optional())
}

fn default_region() -> String {
    std::env::var("AWS_REGION")
        .or_else(|_| std::env::var("AWS_DEFAULT_REGION"))
        .ok()
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| DEFAULT_REGION.to_string())
}

/// Operation deadlines, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Timeouts {
    /// Upper bound on create, including the wait for the resource to settle.
    pub create: u64,
    /// Upper bound on delete, including the wait for the resource to go away.
    pub delete: u64,
    /// Deadline for any single remote call.
    pub operation: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create: 600,
            delete: 600,
            operation: 60,
        }
    }
}

impl Timeouts {
    /// Create deadline.
    pub fn create(&self) -> Duration {
        Duration::from_secs(self.create)
    }

    /// Delete deadline.
    pub fn delete(&self) -> Duration {
        Duration::from_secs(self.delete)
    }

    /// Per-call deadline.
    pub fn operation(&self) -> Duration {
        Duration::from_secs(self.operation)
    }
}

/// Poll settings for state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Polling {
    /// First delay between polls.
    pub initial_delay_ms: u64,
    /// Ceiling for the delay between polls.
    pub max_delay_ms: u64,
    /// Growth factor applied after every unsuccessful poll.
    pub multiplier: f64,
}

impl Default for Polling {
    fn default() -> Self {
        Self {
            initial_delay_ms: 500,
            max_delay_ms: 10_000,
            multiplier: 2.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_from_empty_object() {
        let config = ProviderConfig::from_value(json!({"region": "eu-west-1"})).unwrap();
        assert_eq!(config.region, "eu-west-1");
        assert_eq!(config.timeouts, Timeouts::default());
        assert_eq!(config.polling, Polling::default());
        assert_eq!(config.timeouts.create(), Duration::from_secs(600));
    }

    #[test]
    fn test_null_is_empty_config() {
        let config = ProviderConfig::from_value(Value::Null).unwrap();
        assert!(!config.region.is_empty());
    }

    #[test]
    fn test_partial_nested_sections() {
        let config = ProviderConfig::from_value(json!({
            "region": "us-west-2",
            "timeouts": {"create": 5},
            "polling": {"initial_delay_ms": 1, "max_delay_ms": 4}
        }))
        .unwrap();

        assert_eq!(config.timeouts.create, 5);
        assert_eq!(config.timeouts.delete, 600);
        assert_eq!(config.polling.multiplier, 2.0);

        let backoff = config.backoff();
        assert_eq!(backoff.initial_delay, Duration::from_millis(1));
        assert_eq!(backoff.max_delay, Duration::from_millis(4));
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let err = ProviderConfig::from_value(json!({"regoin": "us-west-2"})).unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
        assert!(err.message().contains("regoin"));
    }

    #[test]
    fn test_inconsistent_polling_rejected() {
        let err = ProviderConfig::from_value(json!({
            "region": "us-west-2",
            "polling": {"initial_delay_ms": 100, "max_delay_ms": 10}
        }))
        .unwrap_err();
        assert!(err.message().contains("initial_delay_ms"));

        let err = ProviderConfig::from_value(json!({
            "region": "us-west-2",
            "polling": {"multiplier": 0.5}
        }))
        .unwrap_err();
        assert!(err.message().contains("multiplier"));
    }

    #[test]
    fn test_out_of_range_multiplier_rejected() {
        for multiplier in [1e300, 10.5] {
            let err = ProviderConfig::from_value(json!({
                "region": "us-west-2",
                "polling": {"multiplier": multiplier}
            }))
            .unwrap_err();
            assert!(err.message().contains("between 1.0 and 10"), "{}", err);
        }

        let config = ProviderConfig {
            polling: Polling {
                multiplier: f64::NAN,
                ..Polling::default()
            },
            ..ProviderConfig::from_value(json!({"region": "us-west-2"})).unwrap()
        };
        assert!(config.check().is_err());
    }

    #[test]
    fn test_huge_timeouts_rejected() {
        let err = ProviderConfig::from_value(json!({
            "region": "us-west-2",
            "timeouts": {"delete": 9_223_372_036_854_775_807u64}
        }))
        .unwrap_err();
        assert!(err.message().contains("timeouts.delete"), "{}", err);

        let config = ProviderConfig::from_value(json!({
            "region": "us-west-2",
            "timeouts": {"create": MAX_TIMEOUT_SECS}
        }))
        .unwrap();
        assert_eq!(config.timeouts.create, MAX_TIMEOUT_SECS);
    }

    #[test]
    fn test_empty_region_rejected() {
        assert!(ProviderConfig::from_value(json!({"region": ""})).is_err());
    }
}
