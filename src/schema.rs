//! Schema types for describing provider and resource structure.
//!
//! Every resource handler publishes a [`Schema`]. The planner reads it to apply
//! defaults, carry computed values and decide which changes force replacement,
//! and [`crate::validation`] checks configuration shapes against it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The type of an attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    /// A string value.
    String,
    /// A 64-bit integer.
    Int64,
    /// A 64-bit floating point number.
    Float64,
    /// A boolean value.
    Bool,
    /// A list of values of a single type.
    List(Box<AttributeType>),
    /// A set of unique values of a single type.
    Set(Box<AttributeType>),
    /// A map from string keys to values of a single type.
    Map(Box<AttributeType>),
}

impl AttributeType {
    /// Create a list type.
    pub fn list(element_type: AttributeType) -> Self {
        Self::List(Box::new(element_type))
    }

    /// Create a set type.
    pub fn set(element_type: AttributeType) -> Self {
        Self::Set(Box::new(element_type))
    }

    /// Create a map type.
    pub fn map(element_type: AttributeType) -> Self {
        Self::Map(Box::new(element_type))
    }

    /// Whether values of this type compare without regard to order.
    pub fn is_set(&self) -> bool {
        matches!(self, Self::Set(_))
    }
}

/// Describes how an attribute can be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AttributeFlags {
    /// The attribute is required in configuration.
    pub required: bool,
    /// The attribute is optional in configuration.
    pub optional: bool,
    /// The attribute is computed by the provider (read-only).
    pub computed: bool,
    /// The attribute is sensitive and should be hidden in logs/UI.
    pub sensitive: bool,
}

impl AttributeFlags {
    /// Create flags for a required attribute.
    pub fn required() -> Self {
        Self {
            required: true,
            ..Default::default()
        }
    }

    /// Create flags for an optional attribute.
    pub fn optional() -> Self {
        Self {
            optional: true,
            ..Default::default()
        }
    }

    /// Create flags for a computed attribute (read-only, set by provider).
    pub fn computed() -> Self {
        Self {
            computed: true,
            ..Default::default()
        }
    }

    /// Create flags for an attribute the user may set or leave to the provider.
    pub fn optional_computed() -> Self {
        Self {
            optional: true,
            computed: true,
            ..Default::default()
        }
    }

    /// Only the provider writes this attribute.
    pub fn is_read_only(&self) -> bool {
        self.computed && !self.optional && !self.required
    }
}

/// Describes a single attribute in a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// The type of the attribute.
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
    /// Flags describing how the attribute can be used.
    #[serde(flatten)]
    pub flags: AttributeFlags,
    /// Human-readable description of the attribute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// If set, changing this attribute forces resource replacement.
    #[serde(default)]
    pub force_new: bool,
    /// Value used when configuration leaves the attribute unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

impl Attribute {
    /// Create a new attribute with the given type and flags.
    pub fn new(attr_type: AttributeType, flags: AttributeFlags) -> Self {
        Self {
            attr_type,
            flags,
            description: None,
            force_new: false,
            default: None,
        }
    }

    /// Create a required string attribute.
    pub fn required_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::required())
    }

    /// Create an optional string attribute.
    pub fn optional_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::optional())
    }

    /// Create a computed string attribute.
    pub fn computed_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::computed())
    }

    /// Create a string attribute the provider fills in when unset.
    pub fn optional_computed_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::optional_computed())
    }

    /// Create a computed int64 attribute.
    pub fn computed_int64() -> Self {
        Self::new(AttributeType::Int64, AttributeFlags::computed())
    }

    /// Create an optional bool attribute.
    pub fn optional_bool() -> Self {
        Self::new(AttributeType::Bool, AttributeFlags::optional())
    }

    /// Create a required set-of-strings attribute.
    pub fn required_string_set() -> Self {
        Self::new(
            AttributeType::set(AttributeType::String),
            AttributeFlags::required(),
        )
    }

    /// Create an optional set-of-strings attribute.
    pub fn optional_string_set() -> Self {
        Self::new(
            AttributeType::set(AttributeType::String),
            AttributeFlags::optional(),
        )
    }

    /// Create an optional string-to-string map, defaulting to empty.
    pub fn tags() -> Self {
        Self::new(
            AttributeType::map(AttributeType::String),
            AttributeFlags::optional(),
        )
        .with_default(serde_json::json!({}))
    }

    /// Set the description for this attribute.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Mark this attribute as forcing resource replacement when changed.
    pub fn with_force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    /// Set a default value for this attribute.
    pub fn with_default(mut self, default: serde_json::Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Mark this attribute as sensitive.
    pub fn sensitive(mut self) -> Self {
        self.flags.sensitive = true;
        self
    }
}

/// The nesting mode for a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BlockNestingMode {
    /// A single nested block (at most one).
    #[default]
    Single,
    /// A list of nested blocks (zero or more, ordered).
    List,
    /// A set of nested blocks (zero or more, unordered, unique).
    Set,
}

/// A nested block within a schema, e.g. the `parameter` entries of a
/// parameter group.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Block {
    /// The attributes within this block.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Attribute>,
    /// Nested blocks within this block.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub blocks: BTreeMap<String, NestedBlock>,
    /// Human-readable description of the block.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Block {
    /// Create a new empty block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an attribute to this block.
    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.attributes.insert(name.into(), attr);
        self
    }

    /// Add a nested block to this block.
    pub fn with_block(mut self, name: impl Into<String>, block: NestedBlock) -> Self {
        self.blocks.insert(name.into(), block);
        self
    }

    /// Set the description for this block.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A nested block with its nesting mode and constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedBlock {
    /// The block definition.
    #[serde(flatten)]
    pub block: Block,
    /// How the block is nested.
    #[serde(default)]
    pub nesting_mode: BlockNestingMode,
    /// Minimum number of blocks required.
    #[serde(default)]
    pub min_items: u32,
    /// Maximum number of blocks allowed (0 = unlimited).
    #[serde(default)]
    pub max_items: u32,
    /// If set, changing these blocks forces resource replacement.
    #[serde(default)]
    pub force_new: bool,
}

impl NestedBlock {
    fn with_mode(block: Block, nesting_mode: BlockNestingMode, max_items: u32) -> Self {
        Self {
            block,
            nesting_mode,
            min_items: 0,
            max_items,
            force_new: false,
        }
    }

    /// Create a single nested block (0 or 1 allowed).
    pub fn single(block: Block) -> Self {
        Self::with_mode(block, BlockNestingMode::Single, 1)
    }

    /// Create a list of nested blocks.
    pub fn list(block: Block) -> Self {
        Self::with_mode(block, BlockNestingMode::List, 0)
    }

    /// Create a set of nested blocks.
    pub fn set(block: Block) -> Self {
        Self::with_mode(block, BlockNestingMode::Set, 0)
    }

    /// Set the minimum number of blocks required.
    pub fn with_min_items(mut self, min: u32) -> Self {
        self.min_items = min;
        self
    }

    /// Set the maximum number of blocks allowed.
    pub fn with_max_items(mut self, max: u32) -> Self {
        self.max_items = max;
        self
    }

    /// Mark these blocks as forcing resource replacement when changed.
    pub fn with_force_new(mut self) -> Self {
        self.force_new = true;
        self
    }
}

/// Schema for a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// The version of this schema (for state upgrades).
    #[serde(default)]
    pub version: u64,
    /// The root block containing all attributes and nested blocks.
    #[serde(flatten)]
    pub block: Block,
}

impl Schema {
    /// Create a new schema with the given version.
    pub fn new(version: u64) -> Self {
        Self {
            version,
            block: Block::new(),
        }
    }

    /// Create a schema at version 0.
    pub fn v0() -> Self {
        Self::new(0)
    }

    /// Add an attribute to the schema.
    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.block.attributes.insert(name.into(), attr);
        self
    }

    /// Add a nested block to the schema.
    pub fn with_block(mut self, name: impl Into<String>, block: NestedBlock) -> Self {
        self.block.blocks.insert(name.into(), block);
        self
    }

    /// Look up a top-level attribute.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.block.attributes.get(name)
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::v0()
    }
}

/// Schema for the whole provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProviderSchema {
    /// Schema for provider configuration.
    #[serde(default)]
    pub provider: Schema,
    /// Schemas for each resource type.
    #[serde(default)]
    pub resources: BTreeMap<String, Schema>,
}

impl ProviderSchema {
    /// Create a new empty provider schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the provider configuration schema.
    pub fn with_provider_config(mut self, schema: Schema) -> Self {
        self.provider = schema;
        self
    }

    /// Add a resource schema.
    pub fn with_resource(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.resources.insert(name.into(), schema);
        self
    }
}

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    /// An error that prevents the operation from completing.
    Error,
    /// A warning that doesn't prevent the operation but should be addressed.
    Warning,
}

/// A diagnostic message from the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The severity of the diagnostic.
    pub severity: DiagnosticSeverity,
    /// A short summary of the issue.
    pub summary: String,
    /// A detailed description of the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// The attribute path where the issue occurred.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Diagnostic {
    /// Create an error diagnostic.
    pub fn error(summary: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    /// Create a warning diagnostic.
    pub fn warning(summary: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    /// Add detail to this diagnostic.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Set the attribute path for this diagnostic.
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    /// Whether this diagnostic blocks the operation.
    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_flags() {
        let computed = AttributeFlags::computed();
        assert!(computed.is_read_only());

        let optional_computed = AttributeFlags::optional_computed();
        assert!(!optional_computed.is_read_only());
        assert!(optional_computed.optional);
        assert!(optional_computed.computed);

        assert!(!AttributeFlags::required().is_read_only());
    }

    #[test]
    fn test_tags_attribute_defaults_to_empty_map() {
        let tags = Attribute::tags();
        assert_eq!(tags.attr_type, AttributeType::map(AttributeType::String));
        assert!(tags.flags.optional);
        assert_eq!(tags.default, Some(serde_json::json!({})));
    }

    #[test]
    fn test_string_set_is_unordered() {
        let subnets = Attribute::required_string_set().with_force_new();
        assert!(subnets.attr_type.is_set());
        assert!(subnets.force_new);
        assert!(!AttributeType::list(AttributeType::String).is_set());
    }

    #[test]
    fn test_schema_builder() {
        let schema = Schema::v0()
            .with_attribute("name", Attribute::required_string().with_force_new())
            .with_attribute("arn", Attribute::computed_string())
            .with_block(
                "parameter",
                NestedBlock::set(
                    Block::new()
                        .with_attribute("name", Attribute::required_string())
                        .with_attribute("value", Attribute::required_string()),
                ),
            );

        assert!(schema.attribute("name").is_some_and(|a| a.force_new));
        assert!(schema.attribute("arn").is_some());
        assert!(schema.attribute("missing").is_none());
        assert_eq!(
            schema.block.blocks["parameter"].nesting_mode,
            BlockNestingMode::Set
        );
    }

    #[test]
    fn test_schema_serializes_flags_inline() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());
        let json = serde_json::to_value(&schema).unwrap();
        assert_eq!(json["attributes"]["name"]["required"], true);
        assert_eq!(json["attributes"]["name"]["type"], "string");
    }

    #[test]
    fn test_diagnostic() {
        let err = Diagnostic::error("Invalid configuration")
            .with_detail("only alphanumeric characters and hyphens allowed")
            .with_attribute("name");

        assert!(err.is_error());
        assert_eq!(err.attribute, Some("name".to_string()));
        assert!(!Diagnostic::warning("heads up").is_error());
    }

    #[test]
    fn test_nested_block_modes() {
        let single = NestedBlock::single(Block::new());
        assert_eq!(single.nesting_mode, BlockNestingMode::Single);
        assert_eq!(single.max_items, 1);

        let list = NestedBlock::list(Block::new())
            .with_min_items(1)
            .with_max_items(5);
        assert_eq!(list.nesting_mode, BlockNestingMode::List);
        assert_eq!(list.min_items, 1);
        assert_eq!(list.max_items, 5);
    }
}
