//! # infra-recipe
//!
//! Command-line entry point. Every command loads the configuration, builds a
//! [`Deployer`] over the selected backend, runs and shuts the context down.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use infra_recipe::config::AppConfig;
use infra_recipe::lifecycle::Deployer;
use stack_framework::tracing::setup_tracing;
use stack_framework::StackRecord;
use std::path::PathBuf;
use tracing::{error, info, info_span, Instrument};

#[derive(Debug, Parser)]
#[command(name = "infra-recipe", version, about = "Reconcile the dev network and instance fleet")]
struct Cli {
    /// TOML settings file; defaults apply when omitted.
    #[arg(long, global = true, env = "INFRA_RECIPE_CONFIG")]
    config: Option<PathBuf>,

    /// Overrides the configured region.
    #[arg(long, global = true, env = "AWS_REGION")]
    region: Option<String>,

    /// Use the in-process orchestrator instead of AWS.
    #[arg(long, global = true)]
    local: bool,

    /// Debug logging when RUST_LOG is unset.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Reconcile the network stack.
    Network,
    /// Reconcile the instance stack into the existing network.
    Instances,
    /// Network, then instances.
    Up,
    /// List the instance types offered in the region.
    InstanceTypes,
    /// Delete a stack and wait until it is gone.
    Teardown { stack: String },
    /// Print a rendered template without submitting it.
    Render {
        #[arg(value_enum)]
        stack: RenderTarget,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RenderTarget {
    Network,
    Instances,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_tracing(cli.verbose);

    let mut config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(region) = cli.region {
        config.region = region;
    }

    let deployer = connect(config, cli.local).await?;
    let span = info_span!("command", command = ?cli.command);
    let result = run(&deployer, cli.command).instrument(span).await;
    deployer.shutdown().await;

    if let Err(e) = &result {
        error!(error = %e, "Command failed");
    }
    result
}

#[cfg(feature = "aws")]
async fn connect(config: AppConfig, local: bool) -> Result<Deployer> {
    if local {
        Ok(Deployer::local(config))
    } else {
        Ok(Deployer::aws(config).await)
    }
}

#[cfg(not(feature = "aws"))]
async fn connect(config: AppConfig, local: bool) -> Result<Deployer> {
    if !local {
        bail!("built without the `aws` feature; pass --local");
    }
    Ok(Deployer::local(config))
}

async fn run(deployer: &Deployer, command: Command) -> Result<()> {
    match command {
        Command::Network => report(&deployer.deploy_network().await?),
        Command::Instances => report(&deployer.deploy_fleet().await?),
        Command::Up => {
            for record in deployer.deploy_all().await? {
                report(&record);
            }
        }
        Command::InstanceTypes => {
            let types = deployer.instance_types().await?;
            info!(count = types.len(), "Instance types available");
            for instance_type in types.iter() {
                println!("{instance_type}");
            }
        }
        Command::Teardown { stack } => {
            if stack.trim().is_empty() {
                bail!("stack name must not be empty");
            }
            deployer.teardown(&stack).await?;
            info!(stack = %stack, "Stack removed");
        }
        Command::Render { stack } => {
            let template = match stack {
                RenderTarget::Network => deployer.network_template()?,
                RenderTarget::Instances => deployer.fleet_template().await?,
            };
            print!("{}", template.render()?.body());
        }
    }
    Ok(())
}

fn report(record: &StackRecord) {
    info!(stack = %record.name, status = %record.status, "Stack reconciled");
    for (key, value) in &record.outputs {
        println!("{}\t{key}\t{value}", record.name);
    }
}
