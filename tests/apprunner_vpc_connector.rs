//! Acceptance tests for `aws_apprunner_vpc_connector`.

use std::sync::Arc;

use hemmer_provider_aws::api::Tag;
use hemmer_provider_aws::logging::try_init_test_logging;
use hemmer_provider_aws::resources::apprunner_vpc_connector::TYPE_NAME;
use hemmer_provider_aws::testing::acceptance::{AcceptanceTest, Check, Outcome, TestStep};
use hemmer_provider_aws::testing::{
    fixtures, random_name, MemoryCloud, Operation, ProviderTester, RESOURCE_PREFIX,
};
use hemmer_provider_aws::{AwsProvider, ProviderService};
use regex::Regex;
use serde_json::json;
use tokio_test::assert_ok;

async fn tester(cloud: &Arc<MemoryCloud>) -> ProviderTester<AwsProvider> {
    let tester = ProviderTester::new(AwsProvider::new(cloud.clone(), cloud.clone()));
    assert_ok!(
        tester
            .configure(json!({"polling": {"initial_delay_ms": 1, "max_delay_ms": 10}}))
            .await
    );
    tester
}

#[tokio::test]
async fn test_basic() {
    try_init_test_logging();
    let cloud = Arc::new(MemoryCloud::new());
    let network = cloud.provision_network();
    let name = random_name(RESOURCE_PREFIX);
    let arn = Regex::new(&format!(
        r"^arn:aws:apprunner:us-west-2:\d{{12}}:vpcconnector/{}/1/.+$",
        name
    ))
    .unwrap();

    let outcome = AcceptanceTest::new(TYPE_NAME)
        .pre_check()
        .step(TestStep::apply(
            fixtures::vpc_connector_basic(&name, &network),
            vec![
                Check::Exists,
                Check::matches("arn", arn),
                Check::attr("name", name.as_str()),
                Check::count("subnets", 1),
                Check::count("security_groups", 1),
                Check::attr("status", "ACTIVE"),
                Check::attr("vpc_connector_revision", 1),
                Check::count("tags", 0),
            ],
        ))
        .step(TestStep::import())
        .run(cloud.clone())
        .await;

    assert_eq!(assert_ok!(outcome), Outcome::Passed);
}

#[tokio::test]
async fn test_disappears() {
    let cloud = Arc::new(MemoryCloud::new());
    let network = cloud.provision_network();
    let name = random_name(RESOURCE_PREFIX);

    let outcome = AcceptanceTest::new(TYPE_NAME)
        .pre_check()
        .step(
            TestStep::apply(
                fixtures::vpc_connector_basic(&name, &network),
                vec![Check::Exists, Check::Disappears],
            )
            .expect_non_empty_plan(),
        )
        .run(cloud)
        .await;

    assert_eq!(assert_ok!(outcome), Outcome::Passed);
}

#[tokio::test]
async fn test_disappears_requires_flag() {
    let cloud = Arc::new(MemoryCloud::new());
    let network = cloud.provision_network();
    let name = random_name(RESOURCE_PREFIX);

    let result = AcceptanceTest::new(TYPE_NAME)
        .step(TestStep::apply(
            fixtures::vpc_connector_basic(&name, &network),
            vec![Check::Disappears],
        ))
        .run(cloud)
        .await;

    assert!(result.unwrap_err().to_string().contains("plan was not empty"));
}

#[tokio::test]
async fn test_tags() {
    let cloud = Arc::new(MemoryCloud::new());
    let network = cloud.provision_network();
    let name = random_name(RESOURCE_PREFIX);

    let outcome = AcceptanceTest::new(TYPE_NAME)
        .pre_check()
        .step(TestStep::apply(
            fixtures::vpc_connector_tags1(&name, &network, "key1", "value1"),
            vec![
                Check::Exists,
                Check::count("tags", 1),
                Check::attr("tags.key1", "value1"),
            ],
        ))
        .step(TestStep::import())
        .step(TestStep::apply(
            fixtures::vpc_connector_tags2(
                &name,
                &network,
                "key1",
                "value1updated",
                "key2",
                "value2",
            ),
            vec![
                Check::count("tags", 2),
                Check::attr("tags.key1", "value1updated"),
                Check::attr("tags.key2", "value2"),
            ],
        ))
        .step(TestStep::apply(
            fixtures::vpc_connector_tags1(&name, &network, "key2", "value2"),
            vec![Check::count("tags", 1), Check::attr("tags.key2", "value2")],
        ))
        .run(cloud.clone())
        .await;
    assert_eq!(assert_ok!(outcome), Outcome::Passed);

    let operations = cloud.operations();
    let tag_calls: Vec<_> = operations
        .iter()
        .filter_map(|op| match op {
            Operation::TagResource { tags, .. } => Some(tags.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(
        tag_calls,
        vec![vec![
            Tag::new("key1", "value1updated"),
            Tag::new("key2", "value2"),
        ]]
    );

    let untag_calls: Vec<_> = operations
        .iter()
        .filter_map(|op| match op {
            Operation::UntagResource { keys, .. } => Some(keys.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(untag_calls, vec![vec!["key1".to_string()]]);

    let creates = operations
        .iter()
        .filter(|op| matches!(op, Operation::CreateVpcConnector { .. }))
        .count();
    assert_eq!(creates, 1, "tag changes must not replace the connector");
}

#[tokio::test]
async fn test_network_change_replaces() {
    let cloud = Arc::new(MemoryCloud::new());
    let first = cloud.provision_network();
    let second = cloud.provision_network();
    let name = random_name(RESOURCE_PREFIX);

    let outcome = AcceptanceTest::new(TYPE_NAME)
        .step(TestStep::apply(
            fixtures::vpc_connector_basic(&name, &first),
            vec![Check::attr("vpc_connector_revision", 1)],
        ))
        .step(TestStep::apply(
            fixtures::vpc_connector_basic(&name, &second),
            vec![
                Check::Exists,
                Check::attr("vpc_connector_revision", 2),
                Check::attr("subnets.0", second.subnet_id.as_str()),
            ],
        ))
        .run(cloud.clone())
        .await;

    assert_eq!(assert_ok!(outcome), Outcome::Passed);
    let deletes = cloud
        .operations()
        .iter()
        .filter(|op| matches!(op, Operation::DeleteVpcConnector { .. }))
        .count();
    assert_eq!(deletes, 2);
}

#[tokio::test]
async fn test_create_waits_for_visibility() {
    let cloud = Arc::new(MemoryCloud::new().with_describe_lag(3));
    let network = cloud.provision_network();
    let tester = tester(&cloud).await;

    let state = assert_ok!(
        tester
            .lifecycle_create(
                TYPE_NAME,
                fixtures::vpc_connector_basic("lagging-connector", &network)
            )
            .await
    );
    assert_eq!(state["status"], "ACTIVE");
}

#[tokio::test]
async fn test_delete_twice() {
    let cloud = Arc::new(MemoryCloud::new());
    let network = cloud.provision_network();
    let tester = tester(&cloud).await;

    let state = assert_ok!(
        tester
            .lifecycle_create(TYPE_NAME, fixtures::vpc_connector_basic("twice", &network))
            .await
    );
    assert_ok!(tester.delete(TYPE_NAME, state.clone()).await);
    assert_ok!(tester.delete(TYPE_NAME, state.clone()).await);

    let deletes = cloud
        .operations()
        .iter()
        .filter(|op| matches!(op, Operation::DeleteVpcConnector { .. }))
        .count();
    assert_eq!(deletes, 1);
    assert!(assert_ok!(tester.read(TYPE_NAME, state).await).is_null());
}

#[tokio::test]
async fn test_import_reencodes_configuration() {
    let cloud = Arc::new(MemoryCloud::new());
    let tester = tester(&cloud).await;
    let config = json!({
        "name": "r1",
        "subnets": ["s1"],
        "security_groups": ["g1"],
        "tags": {}
    });

    // `r1` is below the connector name minimum, so go straight to create.
    let created = assert_ok!(tester.create(TYPE_NAME, config.clone()).await);
    let arn = created["arn"].as_str().unwrap();
    let imported = assert_ok!(tester.import_state(TYPE_NAME, arn).await);

    let reencoded = json!({
        "name": imported["name"],
        "subnets": imported["subnets"],
        "security_groups": imported["security_groups"],
        "tags": imported["tags"],
    });
    assert_eq!(reencoded, config);
    assert_eq!(imported["id"], created["id"]);
}

#[tokio::test]
async fn test_import_missing() {
    let cloud = Arc::new(MemoryCloud::new());
    let tester = tester(&cloud).await;

    let err = tester
        .import_state(
            TYPE_NAME,
            "arn:aws:apprunner:us-west-2:123456789012:vpcconnector/nope/1/abc",
        )
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().contains("Cannot import non-existent remote object"));
}

#[tokio::test]
async fn test_invalid_name_rejected_before_any_call() {
    let cloud = Arc::new(MemoryCloud::new());
    let network = cloud.provision_network();
    let provider = AwsProvider::new(cloud.clone(), cloud.clone());

    let diagnostics = assert_ok!(
        provider
            .validate_resource_config(
                TYPE_NAME,
                fixtures::vpc_connector_basic("-bad", &network)
            )
            .await
    );
    assert_eq!(diagnostics.len(), 1);
    assert!(cloud.operations().is_empty());
}

#[tokio::test]
async fn test_pre_check_skips_when_denied() {
    let cloud = Arc::new(MemoryCloud::new());
    cloud.set_unavailable("AccessDeniedException: User is not authorized to perform apprunner:ListVpcConnectors");

    let outcome = AcceptanceTest::new(TYPE_NAME)
        .pre_check()
        .step(TestStep::apply(json!({}), vec![]))
        .run(cloud)
        .await;
    assert!(matches!(assert_ok!(outcome), Outcome::Skipped(_)));
}
