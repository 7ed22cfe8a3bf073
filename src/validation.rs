//! Configuration validation.
//!
//! Two kinds of checks live here:
//!
//! - [`validate`] checks a `serde_json::Value` against a [`Schema`]: presence
//!   of required attributes, value types and nested block counts.
//! - Name validators check literal constraints on user-supplied strings. They
//!   are pure and report every violation at once rather than stopping at the
//!   first one.
//!
//! Both run before any remote call is made.
//!
//! # Example
//!
//! ```
//! use hemmer_provider_aws::validation::valid_event_subscription_name;
//!
//! assert!(valid_event_subscription_name("tf-acc-test-1", "name").is_empty());
//! assert_eq!(valid_event_subscription_name("bad_name!", "name").len(), 1);
//! ```

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::naming::UNIQUE_ID_SUFFIX_LENGTH;
use crate::schema::{
    Attribute, AttributeType, Block, BlockNestingMode, Diagnostic, NestedBlock, Schema,
};

/// Longest name DocumentDB accepts for an event subscription.
pub const EVENT_SUBSCRIPTION_NAME_MAX_LENGTH: usize = 255;

/// Validate a JSON value against a schema.
///
/// Returns a list of diagnostics for any validation errors found.
/// An empty list means the value is valid.
///
/// - Required attributes must be present and non-null
/// - Computed-only attributes are skipped (the provider sets these)
/// - Attribute types must match the schema
/// - Nested blocks are validated recursively with min/max item constraints
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    validate_block(&schema.block, value, "", &mut diagnostics);
    diagnostics
}

/// Validate a DocumentDB event subscription name.
pub fn valid_event_subscription_name(value: &str, key: &str) -> Vec<Diagnostic> {
    check_alphanumeric_hyphen(value, key, EVENT_SUBSCRIPTION_NAME_MAX_LENGTH)
}

/// Validate a DocumentDB event subscription name prefix.
///
/// The prefix has a generated unique suffix appended later, so its length
/// budget is reduced by [`UNIQUE_ID_SUFFIX_LENGTH`].
pub fn valid_event_subscription_name_prefix(value: &str, key: &str) -> Vec<Diagnostic> {
    check_alphanumeric_hyphen(
        value,
        key,
        EVENT_SUBSCRIPTION_NAME_MAX_LENGTH - UNIQUE_ID_SUFFIX_LENGTH,
    )
}

/// Validate an App Runner VPC connector name.
///
/// Names are 4 to 40 characters, start with a letter or digit and may
/// otherwise contain letters, digits, hyphens and underscores. These are the
/// App Runner service limits, so a shorter name such as `r1` is rejected at
/// plan time rather than by `CreateVpcConnector`.
pub fn valid_vpc_connector_name(value: &str, key: &str) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    if !vpc_connector_name_pattern().is_match(value) {
        diagnostics.push(
            Diagnostic::error(format!(
                "{:?} must start with a letter or digit and contain only letters, digits, hyphens and underscores",
                key
            ))
            .with_attribute(key),
        );
    }
    if !(4..=40).contains(&value.len()) {
        diagnostics.push(
            Diagnostic::error(format!("{:?} must be between 4 and 40 characters", key))
                .with_attribute(key),
        );
    }
    diagnostics
}

fn check_alphanumeric_hyphen(value: &str, key: &str, max_length: usize) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    if !alphanumeric_hyphen_pattern().is_match(value) {
        diagnostics.push(
            Diagnostic::error(format!(
                "only alphanumeric characters and hyphens allowed in {:?}",
                key
            ))
            .with_attribute(key),
        );
    }
    if value.len() > max_length {
        diagnostics.push(
            Diagnostic::error(format!(
                "{:?} cannot be greater than {} characters",
                key, max_length
            ))
            .with_attribute(key),
        );
    }
    diagnostics
}

fn alphanumeric_hyphen_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[0-9A-Za-z-]+$").expect("literal pattern compiles"))
}

fn vpc_connector_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*$").expect("literal pattern compiles")
    })
}

fn validate_block(block: &Block, value: &Value, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    let obj = match value {
        Value::Object(map) => map,
        Value::Null => return,
        _ => {
            let mut diagnostic =
                Diagnostic::error("Expected object").with_detail(format!("Got {}", type_name(value)));
            if !path.is_empty() {
                diagnostic = diagnostic.with_attribute(path);
            }
            diagnostics.push(diagnostic);
            return;
        },
    };

    for (name, attr) in &block.attributes {
        validate_attribute(attr, obj.get(name), &join_path(path, name), diagnostics);
    }

    for (name, nested) in &block.blocks {
        validate_nested_block(nested, obj.get(name), &join_path(path, name), diagnostics);
    }

    for name in obj.keys() {
        if !block.attributes.contains_key(name) && !block.blocks.contains_key(name) {
            let attr_path = join_path(path, name);
            diagnostics.push(
                Diagnostic::error(format!("Unsupported argument '{}'", attr_path))
                    .with_detail("An argument with this name is not expected here")
                    .with_attribute(attr_path),
            );
        }
    }
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if attr.flags.is_read_only() {
        return;
    }

    match value {
        None | Some(Value::Null) => {
            if attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", path))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(path),
                );
            }
        },
        Some(v) => validate_attribute_type(&attr.attr_type, v, path, diagnostics),
    }
}

fn validate_attribute_type(
    attr_type: &AttributeType,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match attr_type {
        AttributeType::String => {
            if !value.is_string() {
                diagnostics.push(type_error(path, "string", value));
            }
        },
        AttributeType::Int64 => {
            if !value.is_i64() {
                diagnostics.push(type_error(path, "int64", value));
            }
        },
        AttributeType::Float64 => {
            if !value.is_number() {
                diagnostics.push(type_error(path, "float64", value));
            }
        },
        AttributeType::Bool => {
            if !value.is_boolean() {
                diagnostics.push(type_error(path, "bool", value));
            }
        },
        AttributeType::List(element_type) | AttributeType::Set(element_type) => {
            match value.as_array() {
                Some(arr) => {
                    for (i, elem) in arr.iter().enumerate() {
                        let elem_path = format!("{}.{}", path, i);
                        validate_attribute_type(element_type, elem, &elem_path, diagnostics);
                    }
                },
                None => {
                    let expected = if attr_type.is_set() { "set" } else { "list" };
                    diagnostics.push(type_error(path, expected, value));
                },
            }
        },
        AttributeType::Map(value_type) => match value.as_object() {
            Some(obj) => {
                for (key, val) in obj {
                    let key_path = format!("{}.{}", path, key);
                    validate_attribute_type(value_type, val, &key_path, diagnostics);
                }
            },
            None => diagnostics.push(type_error(path, "map", value)),
        },
    }
}

fn validate_nested_block(
    nested: &NestedBlock,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match (nested.nesting_mode, value) {
        (_, None | Some(Value::Null)) => {
            if nested.min_items > 0 {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' requires at least {} item(s)",
                        path, nested.min_items
                    ))
                    .with_attribute(path),
                );
            }
        },
        (BlockNestingMode::Single, Some(v)) => {
            validate_block(&nested.block, v, path, diagnostics);
        },
        (BlockNestingMode::List | BlockNestingMode::Set, Some(Value::Array(arr))) => {
            let len = arr.len() as u32;

            if len < nested.min_items {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' requires at least {} item(s), got {}",
                        path, nested.min_items, len
                    ))
                    .with_attribute(path),
                );
            }

            if nested.max_items > 0 && len > nested.max_items {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' allows at most {} item(s), got {}",
                        path, nested.max_items, len
                    ))
                    .with_attribute(path),
                );
            }

            for (i, item) in arr.iter().enumerate() {
                let item_path = format!("{}.{}", path, i);
                validate_block(&nested.block, item, &item_path, diagnostics);
            }
        },
        (_, Some(v)) => {
            diagnostics.push(
                Diagnostic::error(format!("Expected list for block '{}'", path))
                    .with_detail(format!("Got {}", type_name(v)))
                    .with_attribute(path),
            );
        },
    }
}

fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", base, name)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn type_error(path: &str, expected: &str, got: &Value) -> Diagnostic {
    Diagnostic::error(format!("Invalid type for attribute '{}'", path))
        .with_detail(format!("Expected {}, got {}", expected, type_name(got)))
        .with_attribute(path)
}
