use infra_recipe::config::AppConfig;
use infra_recipe::error::DeployError;
use infra_recipe::lifecycle::Deployer;
use stack_framework::{NotFound, ReconcileError, StackStatus};

fn local_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.waiter.initial_delay_ms = 1;
    config.waiter.max_delay_ms = 5;
    config.waiter.timeout_ms = 5_000;
    config
}

#[tokio::test]
async fn test_up_then_rerun_then_teardown() {
    let deployer = Deployer::local(local_config());

    // --- First run creates both stacks ---
    let records = deployer.deploy_all().await.unwrap();
    let (network, fleet) = (&records[0], &records[1]);

    assert_eq!(network.name, "dev-vpc-stack");
    assert_eq!(network.status, StackStatus::CreateComplete);
    let vpc_id = network.output("VpcId").unwrap().to_string();
    assert!(vpc_id.starts_with("vpc-"));
    assert!(network.output("SecurityGroupId").unwrap().starts_with("sg-"));

    assert_eq!(fleet.name, "dev-ec2-stack");
    assert_eq!(fleet.status, StackStatus::CreateComplete);
    assert_eq!(fleet.outputs.len(), 5);

    // Fleet lookups resolve what the network stack registered
    let placement = deployer.locate_fleet_placement().await.unwrap();
    assert_eq!(
        Some(placement.public_subnet.as_str()),
        network.output("PublicWebSubnet1aId")
    );
    assert_eq!(
        Some(placement.private_subnet.as_str()),
        network.output("PrivateDbSubnet1aId")
    );

    // --- Second run submits identical documents ---
    let rerun = deployer.deploy_all().await.unwrap();
    assert_eq!(rerun[0].status, StackStatus::CreateComplete);
    assert_eq!(rerun[0].output("VpcId"), Some(vpc_id.as_str()));
    assert_eq!(rerun[1].outputs, fleet.outputs);

    // --- Teardown, fleet first ---
    deployer.teardown("dev-ec2-stack").await.unwrap();
    deployer.teardown("dev-vpc-stack").await.unwrap();
    assert!(!deployer.locator().find_vpc("dev").await.unwrap().is_found());

    // Tearing down an absent stack is a no-op
    deployer.teardown("dev-vpc-stack").await.unwrap();

    deployer.shutdown().await;
}

#[tokio::test]
async fn test_fleet_without_network_is_missing_prerequisite() {
    let deployer = Deployer::local(local_config());

    let err = deployer.deploy_fleet().await.unwrap_err();
    assert!(matches!(err, DeployError::NotFound(NotFound { ref tag, .. }) if tag == "dev"));

    deployer.shutdown().await;
}

#[tokio::test]
async fn test_failing_network_stack_reports_reason() {
    let mut config = local_config();
    config.local.failing_stacks = vec!["dev-vpc-stack".to_string()];
    let deployer = Deployer::local(config);

    let err = deployer.deploy_network().await.unwrap_err();
    assert!(matches!(
        err,
        DeployError::Reconcile(ReconcileError::ReconciliationFailed {
            status: StackStatus::CreateFailed,
            ..
        })
    ));

    // A failed create is not updatable
    let err = deployer.deploy_network().await.unwrap_err();
    assert!(matches!(
        err,
        DeployError::Reconcile(ReconcileError::NotUpdatable { .. })
    ));

    deployer.shutdown().await;
}

#[tokio::test]
async fn test_instance_type_listing_walks_every_page() {
    let deployer = Deployer::local(local_config());

    let types = deployer.instance_types().await.unwrap();
    assert_eq!(types.len(), 10);
    assert!(types.contains("t2.small"));

    deployer.shutdown().await;
}
