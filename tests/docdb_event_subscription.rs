//! Acceptance tests for `aws_docdb_event_subscription`.

use std::sync::Arc;

use hemmer_provider_aws::logging::try_init_test_logging;
use hemmer_provider_aws::resources::docdb_event_subscription::TYPE_NAME;
use hemmer_provider_aws::testing::acceptance::{AcceptanceTest, Check, Outcome, TestStep};
use hemmer_provider_aws::testing::{
    assert_plan_replaces, fixtures, random_name, MemoryCloud, Operation, ProviderTester,
    RESOURCE_PREFIX,
};
use hemmer_provider_aws::{AwsProvider, ProviderError};
use regex::Regex;
use serde_json::json;
use tokio_test::assert_ok;

fn count_ops(cloud: &MemoryCloud, pred: impl Fn(&Operation) -> bool) -> usize {
    cloud.operations().iter().filter(|op| pred(op)).count()
}

#[tokio::test]
async fn test_basic() {
    try_init_test_logging();
    let cloud = Arc::new(MemoryCloud::new().with_describe_lag(1).with_transition_polls(2));
    let name = random_name(RESOURCE_PREFIX);
    let arn = Regex::new(&format!(r"^arn:aws:rds:us-west-2:\d{{12}}:es:{}$", name)).unwrap();

    let outcome = AcceptanceTest::new(TYPE_NAME)
        .pre_check()
        .step(TestStep::apply(
            fixtures::event_subscription_basic(&name),
            vec![
                Check::Exists,
                Check::matches("arn", arn),
                Check::attr("name", name.as_str()),
                Check::attr("enabled", true),
                Check::attr("source_type", "db-cluster"),
                Check::attr("sns_topic_arn", fixtures::SNS_TOPIC_ARN),
                Check::attr("customer_aws_id", "123456789012"),
                Check::count("event_categories", 2),
                Check::count("source_ids", 0),
            ],
        ))
        .step(TestStep::import())
        .run(cloud)
        .await;

    assert_eq!(assert_ok!(outcome), Outcome::Passed);
}

#[tokio::test]
async fn test_update_in_place() {
    let cloud = Arc::new(MemoryCloud::new().with_transition_polls(1));
    let name = random_name(RESOURCE_PREFIX);

    let outcome = AcceptanceTest::new(TYPE_NAME)
        .step(TestStep::apply(
            fixtures::event_subscription_basic(&name),
            vec![Check::attr("enabled", true)],
        ))
        .step(TestStep::apply(
            fixtures::event_subscription_updated(&name, false, &["maintenance", "creation"]),
            vec![
                Check::attr("enabled", false),
                Check::attr("event_categories.0", "creation"),
                Check::attr("event_categories.1", "maintenance"),
            ],
        ))
        .step(TestStep::import())
        .run(cloud.clone())
        .await;
    assert_eq!(assert_ok!(outcome), Outcome::Passed);

    assert_eq!(
        count_ops(&cloud, |op| matches!(op, Operation::CreateEventSubscription { .. })),
        1
    );
    assert_eq!(
        count_ops(&cloud, |op| matches!(op, Operation::ModifyEventSubscription { .. })),
        1
    );
}

#[tokio::test]
async fn test_source_type_cleared() {
    let cloud = Arc::new(MemoryCloud::new().with_transition_polls(1));
    let name = random_name(RESOURCE_PREFIX);

    let outcome = AcceptanceTest::new(TYPE_NAME)
        .step(TestStep::apply(
            fixtures::event_subscription_basic(&name),
            vec![Check::attr("source_type", "db-cluster")],
        ))
        .step(TestStep::apply(
            fixtures::event_subscription_all_sources(&name),
            vec![Check::attr("source_type", serde_json::Value::Null)],
        ))
        .step(TestStep::import())
        .run(cloud.clone())
        .await;
    assert_eq!(assert_ok!(outcome), Outcome::Passed);

    assert_eq!(
        count_ops(&cloud, |op| matches!(op, Operation::ModifyEventSubscription { .. })),
        1
    );
}

#[tokio::test]
async fn test_source_ids_change_replaces() {
    let cloud = Arc::new(MemoryCloud::new());
    let tester = ProviderTester::new(AwsProvider::new(cloud.clone(), cloud.clone()));
    assert_ok!(
        tester
            .configure(json!({"polling": {"initial_delay_ms": 1, "max_delay_ms": 10}}))
            .await
    );

    let state = assert_ok!(
        tester
            .lifecycle_create(
                TYPE_NAME,
                fixtures::event_subscription_source_ids("replaced", &["cluster-a"])
            )
            .await
    );
    let plan = assert_ok!(
        tester
            .plan_update(
                TYPE_NAME,
                state.clone(),
                fixtures::event_subscription_source_ids("replaced", &["cluster-b"])
            )
            .await
    );
    assert_plan_replaces(&plan);

    let replaced = assert_ok!(
        tester
            .lifecycle_update(
                TYPE_NAME,
                state,
                fixtures::event_subscription_source_ids("replaced", &["cluster-b"])
            )
            .await
    );
    assert_eq!(replaced["source_ids"], json!(["cluster-b"]));
    assert_eq!(
        count_ops(&cloud, |op| matches!(op, Operation::DeleteEventSubscription { .. })),
        1
    );
}

#[tokio::test]
async fn test_name_prefix() {
    let cloud = Arc::new(MemoryCloud::new());
    let name = Regex::new(r"^tf-acc-test-events-\d{18}[0-9a-f]{8}$").unwrap();

    let outcome = AcceptanceTest::new(TYPE_NAME)
        .step(TestStep::apply(
            fixtures::event_subscription_name_prefix("tf-acc-test-events-"),
            vec![Check::Exists, Check::matches("name", name)],
        ))
        .step(TestStep::import())
        .run(cloud)
        .await;

    assert_eq!(assert_ok!(outcome), Outcome::Passed);
}

#[tokio::test]
async fn test_disappears() {
    let cloud = Arc::new(MemoryCloud::new().with_transition_polls(2));
    let name = random_name(RESOURCE_PREFIX);

    let outcome = AcceptanceTest::new(TYPE_NAME)
        .step(
            TestStep::apply(
                fixtures::event_subscription_basic(&name),
                vec![Check::Exists, Check::Disappears],
            )
            .expect_non_empty_plan(),
        )
        .run(cloud)
        .await;

    assert_eq!(assert_ok!(outcome), Outcome::Passed);
}

#[tokio::test]
async fn test_create_times_out() {
    let cloud = Arc::new(MemoryCloud::new().with_transition_polls(u32::MAX));
    let tester = ProviderTester::new(AwsProvider::new(cloud.clone(), cloud.clone()));
    assert_ok!(
        tester
            .configure(json!({
                "timeouts": {"create": 0},
                "polling": {"initial_delay_ms": 1, "max_delay_ms": 5}
            }))
            .await
    );

    let err = tester
        .lifecycle_create(TYPE_NAME, fixtures::event_subscription_basic("stuck"))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::DeadlineExceeded(_)), "{}", err);
}

#[tokio::test]
async fn test_invalid_names() {
    let cloud = Arc::new(MemoryCloud::new());
    let tester = ProviderTester::new(AwsProvider::new(cloud.clone(), cloud.clone()));

    let err = tester
        .validate_resource_config(
            TYPE_NAME,
            json!({
                "name": "events",
                "name_prefix": "events-",
                "sns_topic_arn": fixtures::SNS_TOPIC_ARN
            }),
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("conflicts with name_prefix"));

    let err = tester
        .validate_resource_config(
            TYPE_NAME,
            json!({"name": "under_score", "sns_topic_arn": fixtures::SNS_TOPIC_ARN}),
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("only alphanumeric characters and hyphens"));
    assert!(cloud.operations().is_empty());
}
