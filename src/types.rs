//! Convenience types exchanged between the host and the provider.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A change to a single attribute during a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    /// The path to the attribute that changed.
    pub path: String,
    /// The value before the change (None if creating).
    pub before: Option<Value>,
    /// The value after the change (None if deleting).
    pub after: Option<Value>,
}

impl AttributeChange {
    /// Create a new attribute change.
    pub fn new(path: impl Into<String>, before: Option<Value>, after: Option<Value>) -> Self {
        Self {
            path: path.into(),
            before,
            after,
        }
    }

    /// Create a change for a new attribute.
    pub fn added(path: impl Into<String>, value: Value) -> Self {
        Self::new(path, None, Some(value))
    }

    /// Create a change for a removed attribute.
    pub fn removed(path: impl Into<String>, value: Value) -> Self {
        Self::new(path, Some(value), None)
    }

    /// Create a change for a modified attribute.
    pub fn modified(path: impl Into<String>, before: Value, after: Value) -> Self {
        Self::new(path, Some(before), Some(after))
    }
}

/// What applying a plan will do to the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanAction {
    /// Nothing to do.
    NoOp,
    /// The resource does not exist yet.
    Create,
    /// The resource is changed in place.
    Update,
    /// The resource is destroyed and created again.
    Replace,
    /// The resource is destroyed.
    Delete,
}

/// The result of a plan operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// The planned state after the operation.
    pub planned_state: Value,
    /// The list of attribute changes.
    pub changes: Vec<AttributeChange>,
    /// Whether the resource requires replacement.
    pub requires_replace: bool,
}

impl PlanResult {
    /// Create a plan result with no changes.
    pub fn no_change(state: Value) -> Self {
        Self {
            planned_state: state,
            changes: Vec::new(),
            requires_replace: false,
        }
    }

    /// Create a plan result with changes.
    pub fn with_changes(
        planned_state: Value,
        changes: Vec<AttributeChange>,
        requires_replace: bool,
    ) -> Self {
        Self {
            planned_state,
            changes,
            requires_replace,
        }
    }

    /// Whether applying this plan changes nothing.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && !self.requires_replace
    }

    /// Classify the plan given whether a prior state existed.
    pub fn action(&self, had_prior: bool) -> PlanAction {
        match (had_prior, self.planned_state.is_null()) {
            (false, true) => PlanAction::NoOp,
            (false, false) => PlanAction::Create,
            (true, true) => PlanAction::Delete,
            (true, false) if self.requires_replace => PlanAction::Replace,
            (true, false) if self.changes.is_empty() => PlanAction::NoOp,
            (true, false) => PlanAction::Update,
        }
    }
}

/// An imported resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    /// The resource type.
    pub resource_type: String,
    /// The imported state.
    pub state: Value,
}

impl ImportedResource {
    /// Create a new imported resource.
    pub fn new(resource_type: impl Into<String>, state: Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            state,
        }
    }
}

/// Provider metadata returned by GetMetadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    /// List of resource type names.
    pub resources: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attribute_change_constructors() {
        let added = AttributeChange::added("tags.key2", json!("value2"));
        assert!(added.before.is_none());
        assert_eq!(added.after, Some(json!("value2")));

        let removed = AttributeChange::removed("tags.key1", json!("value1"));
        assert_eq!(removed.before, Some(json!("value1")));
        assert!(removed.after.is_none());

        let modified = AttributeChange::modified("enabled", json!(true), json!(false));
        assert_eq!(modified.before, Some(json!(true)));
        assert_eq!(modified.after, Some(json!(false)));
    }

    #[test]
    fn test_plan_actions() {
        let state = json!({"id": "arn:1"});

        let plan = PlanResult::no_change(state.clone());
        assert!(plan.is_empty());
        assert_eq!(plan.action(true), PlanAction::NoOp);
        assert_eq!(plan.action(false), PlanAction::Create);

        let plan = PlanResult::with_changes(
            state.clone(),
            vec![AttributeChange::modified("name", json!("a"), json!("b"))],
            true,
        );
        assert!(!plan.is_empty());
        assert_eq!(plan.action(true), PlanAction::Replace);

        let plan = PlanResult::with_changes(
            state,
            vec![AttributeChange::added("tags.k", json!("v"))],
            false,
        );
        assert_eq!(plan.action(true), PlanAction::Update);

        let plan = PlanResult::with_changes(Value::Null, vec![], false);
        assert_eq!(plan.action(true), PlanAction::Delete);
        assert_eq!(plan.action(false), PlanAction::NoOp);
    }

    #[test]
    fn test_imported_resource() {
        let imported = ImportedResource::new(
            "aws_apprunner_vpc_connector",
            json!({"id": "arn:aws:apprunner:us-west-2:123456789012:vpcconnector/c/1/abc"}),
        );
        assert_eq!(imported.resource_type, "aws_apprunner_vpc_connector");
        assert!(imported.state["id"].as_str().unwrap().contains("vpcconnector/c/1/"));
    }
}
