//! Resource configurations for acceptance scenarios.
//!
//! Each builder renders the configuration one scenario applies. Network
//! dependent configurations take a [`Network`] from
//! [`MemoryCloud::provision_network`](super::MemoryCloud::provision_network).

use serde_json::{json, Map, Value};

use super::Network;

/// SNS topic event subscriptions publish to in fixtures.
pub const SNS_TOPIC_ARN: &str = "arn:aws:sns:us-west-2:123456789012:tf-acc-test-events";

/// Parameter group family used by fixtures.
pub const PARAMETER_GROUP_FAMILY: &str = "docdb5.0";

fn tags(pairs: &[(&str, &str)]) -> Value {
    let map: Map<String, Value> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), json!(v)))
        .collect();
    Value::Object(map)
}

/// A VPC connector with one subnet and one security group.
pub fn vpc_connector_basic(name: &str, network: &Network) -> Value {
    json!({
        "name": name,
        "subnets": [network.subnet_id],
        "security_groups": [network.security_group_id],
    })
}

/// [`vpc_connector_basic`] with one tag.
pub fn vpc_connector_tags1(name: &str, network: &Network, key1: &str, value1: &str) -> Value {
    let mut config = vpc_connector_basic(name, network);
    config["tags"] = tags(&[(key1, value1)]);
    config
}

/// [`vpc_connector_basic`] with two tags.
pub fn vpc_connector_tags2(
    name: &str,
    network: &Network,
    key1: &str,
    value1: &str,
    key2: &str,
    value2: &str,
) -> Value {
    let mut config = vpc_connector_basic(name, network);
    config["tags"] = tags(&[(key1, value1), (key2, value2)]);
    config
}

/// A cluster parameter group without parameters.
pub fn cluster_parameter_group_basic(name: &str) -> Value {
    json!({
        "name": name,
        "family": PARAMETER_GROUP_FAMILY,
    })
}

/// A cluster parameter group named from a prefix.
pub fn cluster_parameter_group_name_prefix(prefix: &str) -> Value {
    json!({
        "name_prefix": prefix,
        "family": PARAMETER_GROUP_FAMILY,
    })
}

/// A cluster parameter group setting `(name, value)` parameters with the
/// default apply method.
pub fn cluster_parameter_group_parameters(name: &str, parameters: &[(&str, &str)]) -> Value {
    let mut config = cluster_parameter_group_basic(name);
    config["parameter"] = parameters
        .iter()
        .map(|(n, v)| json!({"name": n, "value": v}))
        .collect();
    config
}

/// [`cluster_parameter_group_basic`] with one tag.
pub fn cluster_parameter_group_tags1(name: &str, key1: &str, value1: &str) -> Value {
    let mut config = cluster_parameter_group_basic(name);
    config["tags"] = tags(&[(key1, value1)]);
    config
}

/// An event subscription for cluster events.
pub fn event_subscription_basic(name: &str) -> Value {
    json!({
        "name": name,
        "sns_topic_arn": SNS_TOPIC_ARN,
        "source_type": "db-cluster",
        "event_categories": ["creation", "failure"],
    })
}

/// [`event_subscription_basic`] with `enabled` and categories set.
pub fn event_subscription_updated(name: &str, enabled: bool, categories: &[&str]) -> Value {
    let mut config = event_subscription_basic(name);
    config["enabled"] = json!(enabled);
    config["event_categories"] = json!(categories);
    config
}

/// [`event_subscription_basic`] without a source type filter.
pub fn event_subscription_all_sources(name: &str) -> Value {
    json!({
        "name": name,
        "sns_topic_arn": SNS_TOPIC_ARN,
        "event_categories": ["creation", "failure"],
    })
}

/// An event subscription watching specific clusters.
pub fn event_subscription_source_ids(name: &str, source_ids: &[&str]) -> Value {
    let mut config = event_subscription_basic(name);
    config["source_ids"] = json!(source_ids);
    config
}

/// An event subscription named from a prefix.
pub fn event_subscription_name_prefix(prefix: &str) -> Value {
    json!({
        "name_prefix": prefix,
        "sns_topic_arn": SNS_TOPIC_ARN,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network() -> Network {
        Network {
            subnet_id: "subnet-1".to_string(),
            security_group_id: "sg-1".to_string(),
        }
    }

    #[test]
    fn test_vpc_connector_tags() {
        let config = vpc_connector_tags2("conn", &network(), "key1", "value1", "key2", "value2");
        assert_eq!(config["subnets"], json!(["subnet-1"]));
        assert_eq!(config["tags"], json!({"key1": "value1", "key2": "value2"}));
        assert!(vpc_connector_basic("conn", &network()).get("tags").is_none());
    }

    #[test]
    fn test_parameters() {
        let config = cluster_parameter_group_parameters("pg", &[("tls", "disabled")]);
        assert_eq!(config["parameter"], json!([{"name": "tls", "value": "disabled"}]));
    }
}
