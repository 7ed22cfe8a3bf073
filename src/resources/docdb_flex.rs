//! Conversions between `parameter` blocks and DocumentDB parameters.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::api::{ApplyMethod, Parameter, ParameterSource};
use crate::error::ProviderError;
use crate::schema::{Attribute, Block, Diagnostic, NestedBlock, Schema};
use crate::validation;

/// Name of the block holding parameters.
pub const PARAMETER_BLOCK: &str = "parameter";

/// One configured `parameter` block.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParameterConfig {
    /// Parameter name.
    pub name: String,
    /// Desired value.
    pub value: String,
    /// When the change takes effect.
    #[serde(default = "default_apply_method")]
    pub apply_method: ApplyMethod,
}

impl ParameterConfig {
    /// Create a parameter applied at the next reboot.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            apply_method: default_apply_method(),
        }
    }

    /// Set the apply method.
    pub fn with_apply_method(mut self, apply_method: ApplyMethod) -> Self {
        self.apply_method = apply_method;
        self
    }
}

fn default_apply_method() -> ApplyMethod {
    ApplyMethod::PendingReboot
}

/// Schema of the `parameter` set block.
pub fn parameter_block() -> NestedBlock {
    NestedBlock::set(
        Block::new()
            .with_attribute("name", Attribute::required_string())
            .with_attribute("value", Attribute::required_string())
            .with_attribute(
                "apply_method",
                Attribute::optional_string()
                    .with_default(json!(ApplyMethod::PendingReboot.as_str()))
                    .with_description("\"immediate\" or \"pending-reboot\""),
            ),
    )
}

/// Decode the generic `parameter` attribute.
///
/// `null` decodes to no parameters. Every missing or mistyped field is
/// reported with its path, e.g. `parameter.1.value`.
pub fn decode_parameters(value: &Value) -> Result<Vec<ParameterConfig>, ProviderError> {
    if value.is_null() {
        return Ok(Vec::new());
    }

    let wrapper = Schema::v0().with_block(PARAMETER_BLOCK, parameter_block());
    let document = json!({ PARAMETER_BLOCK: value });
    let mut diagnostics: Vec<_> = validation::validate(&wrapper, &document)
        .into_iter()
        .filter(Diagnostic::is_error)
        .collect();
    if !diagnostics.is_empty() {
        return Err(ProviderError::Decode(diagnostics));
    }

    let items = value.as_array().map(Vec::as_slice).unwrap_or_default();
    let mut parameters = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        if let Some(method) = item.get("apply_method").and_then(Value::as_str) {
            if let Err(e) = method.parse::<ApplyMethod>() {
                diagnostics.push(
                    Diagnostic::error(e)
                        .with_attribute(format!("{}.{}.apply_method", PARAMETER_BLOCK, i)),
                );
                continue;
            }
        }
        match ParameterConfig::deserialize(item) {
            Ok(parameter) => parameters.push(parameter),
            Err(e) => diagnostics.push(
                Diagnostic::error(e.to_string())
                    .with_attribute(format!("{}.{}", PARAMETER_BLOCK, i)),
            ),
        }
    }

    if diagnostics.is_empty() {
        Ok(parameters)
    } else {
        Err(ProviderError::Decode(diagnostics))
    }
}

/// Build request parameters.
pub fn expand_parameters(configured: &[ParameterConfig]) -> Vec<Parameter> {
    configured
        .iter()
        .map(|p| Parameter {
            name: p.name.clone(),
            value: Some(p.value.clone()),
            apply_method: p.apply_method,
            source: None,
        })
        .collect()
}

/// Turn described parameters back into configuration.
///
/// Parameters without a value are dropped. System and engine-default
/// parameters are dropped too, unless `reference` names them.
pub fn flatten_parameters(
    parameters: &[Parameter],
    reference: &[ParameterConfig],
) -> Vec<ParameterConfig> {
    parameters
        .iter()
        .filter_map(|p| {
            let value = p.value.as_ref()?;
            let configured = reference.iter().any(|r| r.name == p.name);
            if p.source != Some(ParameterSource::User) && !configured {
                return None;
            }
            Some(ParameterConfig {
                name: p.name.clone(),
                value: value.clone(),
                apply_method: p.apply_method,
            })
        })
        .collect()
}

/// Render parameters as the state value, ordered by name.
pub fn parameters_to_value(parameters: &[ParameterConfig]) -> Value {
    let mut parameters = parameters.to_vec();
    parameters.sort();
    Value::Array(
        parameters
            .iter()
            .map(|p| {
                json!({
                    "name": p.name,
                    "value": p.value,
                    "apply_method": p.apply_method.as_str(),
                })
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn described(name: &str, value: Option<&str>, source: ParameterSource) -> Parameter {
        Parameter {
            name: name.to_string(),
            value: value.map(str::to_string),
            apply_method: ApplyMethod::PendingReboot,
            source: Some(source),
        }
    }

    #[test]
    fn test_decode_defaults_apply_method() {
        let decoded = decode_parameters(&json!([
            {"name": "tls", "value": "disabled"},
            {"name": "audit_logs", "value": "enabled", "apply_method": "immediate"}
        ]))
        .unwrap();

        assert_eq!(
            decoded,
            vec![
                ParameterConfig::new("tls", "disabled"),
                ParameterConfig::new("audit_logs", "enabled")
                    .with_apply_method(ApplyMethod::Immediate),
            ]
        );
        assert!(decode_parameters(&Value::Null).unwrap().is_empty());
    }

    #[test]
    fn test_decode_reports_every_bad_field() {
        let err = decode_parameters(&json!([
            {"name": "tls", "value": "disabled"},
            {"name": "audit_logs"},
            {"name": 3, "value": "x"}
        ]))
        .unwrap_err();

        let ProviderError::Decode(diagnostics) = err else {
            panic!("expected decode error");
        };
        let paths: Vec<_> = diagnostics
            .iter()
            .filter_map(|d| d.attribute.as_deref())
            .collect();
        assert!(paths.contains(&"parameter.1.value"));
        assert!(paths.contains(&"parameter.2.name"));
    }

    #[test]
    fn test_decode_rejects_unknown_apply_method() {
        let err = decode_parameters(&json!([
            {"name": "tls", "value": "disabled", "apply_method": "later"}
        ]))
        .unwrap_err();

        let ProviderError::Decode(diagnostics) = err else {
            panic!("expected decode error");
        };
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].attribute.as_deref(),
            Some("parameter.0.apply_method")
        );
        assert!(diagnostics[0].summary.contains("\"pending-reboot\""));
    }

    #[test]
    fn test_decode_rejects_non_list() {
        assert!(decode_parameters(&json!({"name": "tls"})).is_err());
    }

    #[test]
    fn test_expand() {
        let expanded = expand_parameters(&[ParameterConfig::new("tls", "disabled")]);
        assert_eq!(expanded.len(), 1);
        assert_eq!(expanded[0].value.as_deref(), Some("disabled"));
        assert_eq!(expanded[0].apply_method, ApplyMethod::PendingReboot);
        assert!(expanded[0].source.is_none());
    }

    #[test]
    fn test_flatten_round_trip() {
        let configured = vec![
            ParameterConfig::new("tls", "disabled"),
            ParameterConfig::new("profiler", "enabled").with_apply_method(ApplyMethod::Immediate),
        ];
        assert_eq!(
            flatten_parameters(&expand_parameters(&configured), &configured),
            configured
        );
    }

    #[test]
    fn test_flatten_filters_system_parameters() {
        let described = vec![
            described("tls", Some("enabled"), ParameterSource::System),
            described("audit_logs", Some("enabled"), ParameterSource::User),
            described("profiler", Some("disabled"), ParameterSource::EngineDefault),
            described("profiler_threshold_ms", None, ParameterSource::User),
        ];

        let flattened = flatten_parameters(&described, &[]);
        assert_eq!(flattened, vec![ParameterConfig::new("audit_logs", "enabled")]);

        // A configured system parameter is surfaced, matched by name only.
        let reference = vec![ParameterConfig::new("tls", "disabled")];
        let flattened = flatten_parameters(&described, &reference);
        assert_eq!(
            flattened,
            vec![
                ParameterConfig::new("tls", "enabled"),
                ParameterConfig::new("audit_logs", "enabled"),
            ]
        );
    }

    #[test]
    fn test_parameters_to_value_is_sorted() {
        let value = parameters_to_value(&[
            ParameterConfig::new("tls", "disabled"),
            ParameterConfig::new("audit_logs", "enabled"),
        ]);
        assert_eq!(value[0]["name"], "audit_logs");
        assert_eq!(value[1]["apply_method"], "pending-reboot");
    }
}
