use crate::config::AppConfig;
use crate::error::DeployError;
use crate::fleet::{build_fleet_template, FleetConfig, FleetPlacement};
use crate::network::{build_network_template, NetworkConfig};
use stack_framework::{
    InventoryApi, LocalOrchestrator, Reconciler, ResourceLocator, StackApi, StackRecord, Template,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument};

/// The deployment context: one locator and one reconciler over a backend.
///
/// Replaces module-level clients. Every command gets its collaborators from
/// here, and tests build it over mocks or the local orchestrator.
///
/// # Example
///
/// ```ignore
/// let deployer = Deployer::local(AppConfig::default());
/// deployer.deploy_network().await?;
/// deployer.deploy_fleet().await?;
/// deployer.shutdown().await;
/// ```
pub struct Deployer {
    config: AppConfig,
    locator: ResourceLocator,
    reconciler: Reconciler,
    /// Background tasks owned by this context (the local orchestrator).
    handles: Vec<JoinHandle<()>>,
}

impl Deployer {
    /// Wires a context over explicit backends.
    pub fn new(
        config: AppConfig,
        inventory: Arc<dyn InventoryApi>,
        stacks: Arc<dyn StackApi>,
    ) -> Self {
        let reconciler = Reconciler::new(stacks).with_waiter(config.waiter.to_waiter());
        Self {
            locator: ResourceLocator::new(inventory),
            reconciler,
            config,
            handles: Vec::new(),
        }
    }

    /// Spawns an in-process orchestrator and wires a context over it.
    pub fn local(config: AppConfig) -> Self {
        let (orchestrator, client) = LocalOrchestrator::new(32, config.local.to_settings());
        let handle = tokio::spawn(orchestrator.run());
        info!("Using local orchestrator");

        let mut deployer = Self::new(config, Arc::new(client.clone()), Arc::new(client));
        deployer.handles.push(handle);
        deployer
    }

    /// Wires a context over CloudFormation and EC2 in the configured region.
    #[cfg(feature = "aws")]
    pub async fn aws(config: AppConfig) -> Self {
        let sdk_config = crate::aws::load_sdk_config(&config.region).await;
        info!(region = %config.region, "Using AWS");
        Self::new(
            config,
            Arc::new(crate::aws::Ec2Inventory::new(&sdk_config)),
            Arc::new(crate::aws::CloudFormationStacks::new(&sdk_config)),
        )
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn locator(&self) -> &ResourceLocator {
        &self.locator
    }

    pub fn network_template(&self) -> Result<Template, DeployError> {
        let network = NetworkConfig::from_settings(&self.config.network, &self.config.region);
        Ok(build_network_template(&network)?)
    }

    /// Resolves the subnets and security group the fleet is placed into.
    /// Any of them missing is a [`DeployError::NotFound`].
    #[instrument(skip(self))]
    pub async fn locate_fleet_placement(&self) -> Result<FleetPlacement, DeployError> {
        let vpc_name = &self.config.network.vpc_name;
        let fleet = &self.config.fleet;

        let vpc_id = self.locator.find_vpc(vpc_name).await?.required()?;
        let public_subnet = self
            .locator
            .find_subnet(vpc_name, &fleet.public_subnet)
            .await?
            .required()?;
        let private_subnet = self
            .locator
            .find_subnet(vpc_name, &fleet.private_subnet)
            .await?
            .required()?;
        let security_group = self
            .locator
            .find_security_group(&self.config.network.security_group_name)
            .await?
            .required()?;

        info!(%vpc_id, %public_subnet, %private_subnet, %security_group, "Located fleet placement");
        Ok(FleetPlacement {
            public_subnet,
            private_subnet,
            security_group,
        })
    }

    /// Checks the instance type, locates the placement and builds the fleet template.
    pub async fn fleet_template(&self) -> Result<Template, DeployError> {
        let instance_type = &self.config.fleet.instance_type;
        if !self.locator.is_known_instance_type(instance_type).await? {
            return Err(DeployError::UnknownInstanceType(instance_type.clone()));
        }
        let placement = self.locate_fleet_placement().await?;
        let fleet = FleetConfig::from_settings(&self.config.network, &self.config.fleet);
        Ok(build_fleet_template(&fleet, &placement)?)
    }

    pub async fn deploy_network(&self) -> Result<StackRecord, DeployError> {
        let document = self.network_template()?.render()?;
        debug!(body = document.body(), "Network template");
        let stack_name = &self.config.network.stack_name;
        Ok(self.reconciler.reconcile(stack_name, &document).await?)
    }

    pub async fn deploy_fleet(&self) -> Result<StackRecord, DeployError> {
        let document = self.fleet_template().await?.render()?;
        debug!(body = document.body(), "Fleet template");
        let stack_name = &self.config.fleet.stack_name;
        Ok(self.reconciler.reconcile(stack_name, &document).await?)
    }

    /// Network first, then the fleet that depends on it.
    pub async fn deploy_all(&self) -> Result<Vec<StackRecord>, DeployError> {
        let network = self.deploy_network().await?;
        let fleet = self.deploy_fleet().await?;
        Ok(vec![network, fleet])
    }

    pub async fn instance_types(&self) -> Result<Arc<BTreeSet<String>>, DeployError> {
        Ok(self.locator.instance_types().await?)
    }

    pub async fn teardown(&self, stack_name: &str) -> Result<(), DeployError> {
        Ok(self.reconciler.destroy(stack_name).await?)
    }

    /// Drops the backend clients and waits for owned background tasks.
    pub async fn shutdown(self) {
        let Self {
            locator,
            reconciler,
            handles,
            ..
        } = self;
        // The local orchestrator stops once its last client is gone.
        drop(locator);
        drop(reconciler);

        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Background task failed");
            }
        }
        info!("Shutdown complete");
    }
}
