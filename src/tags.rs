//! Tag maps and tag reconciliation.
//!
//! Tags are updated by difference: keys that disappeared are untagged, keys
//! that are new or changed are tagged, and everything else is left alone so
//! tags set outside this provider survive.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::api::Tag;

/// Key/value tags. Ordered for deterministic output.
pub type Tags = BTreeMap<String, String>;

/// The calls needed to move a resource from one tag map to another.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagDiff {
    /// Keys that are new or whose value changed.
    pub upsert: Tags,
    /// Keys that are no longer wanted.
    pub remove: Vec<String>,
}

impl TagDiff {
    /// Compute the difference from `old` to `new`.
    pub fn between(old: &Tags, new: &Tags) -> Self {
        let upsert = new
            .iter()
            .filter(|(k, v)| old.get(*k) != Some(*v))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let remove = old
            .keys()
            .filter(|k| !new.contains_key(*k))
            .cloned()
            .collect();
        Self { upsert, remove }
    }

    /// Nothing to do.
    pub fn is_empty(&self) -> bool {
        self.upsert.is_empty() && self.remove.is_empty()
    }

    /// The upserts as API tags.
    pub fn upsert_tags(&self) -> Vec<Tag> {
        to_api(&self.upsert)
    }
}

/// Convert a tag map to API tags.
pub fn to_api(tags: &Tags) -> Vec<Tag> {
    tags.iter().map(|(k, v)| Tag::new(k, v)).collect()
}

/// Convert API tags to a tag map. Later duplicates win.
pub fn from_api(tags: &[Tag]) -> Tags {
    tags.iter()
        .map(|t| (t.key.clone(), t.value.clone()))
        .collect()
}

/// Read a tag map out of a resource state or configuration.
///
/// A missing or null `tags` attribute is the empty map.
pub fn from_state(state: &Value) -> Tags {
    state
        .get("tags")
        .and_then(Value::as_object)
        .map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                .collect()
        })
        .unwrap_or_default()
}
