//! albind: bind versioned Lambda deployments to a shared Application Load
//! Balancer
//!
//! Three commands: `init` configures (and optionally provisions) the binding
//! for a project, `update` deploys a version behind a path-based route, and
//! `deregister` tears the route down again.

use albind::aws::{AwsContext, Ec2Client, ElbClient, IamClient, LambdaClient};
use albind::orchestrator::{self, InitAnswers};
use albind::wait::RetryPolicy;
use anyhow::Result;
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "albind")]
#[command(about = "Manage ALB routes for versioned Lambda deployments")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

/// Flags shared by every command
#[derive(ClapArgs, Debug)]
struct CommonArgs {
    /// Path to the project directory
    #[arg(short = 'p', long, default_value = ".")]
    project_directory: PathBuf,

    /// AWS region to operate in
    #[arg(short = 'r', long, env = "AWS_REGION", default_value = "us-east-1")]
    region: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Initialize the binding: resolve or create the load balancer, optionally
    /// create the function, and save the configuration
    Init {
        #[command(flatten)]
        common: CommonArgs,

        /// Name of the load balancer to use; created when it does not exist
        #[arg(long)]
        load_balancer: String,

        /// Subnet for a newly created balancer; repeat for each subnet,
        /// at least 2 in distinct availability zones
        #[arg(long = "subnet")]
        subnets: Vec<String>,

        /// Security group for a newly created balancer; repeat for each group
        #[arg(long = "security-group")]
        security_groups: Vec<String>,

        /// Service name, usable in the path template
        #[arg(long)]
        service_name: String,

        /// Route path template; placeholders: service, stage, version
        #[arg(long, default_value = "/{service}/{stage}/{version}")]
        path_template: String,

        /// Lambda function name
        #[arg(long)]
        function_name: String,

        /// Directory containing the deployable artifact, relative to the
        /// project directory
        #[arg(long)]
        package_dir: String,

        /// File containing the handler, inside the packaging directory
        #[arg(long)]
        entry_module: String,

        /// Skip creating and uploading the function now
        #[arg(long)]
        no_deploy: bool,
    },

    /// Publish a version and route it: function code, alias, target group,
    /// permission, and listener rule
    Update {
        #[command(flatten)]
        common: CommonArgs,

        /// Deployment stage, e.g. dev
        #[arg(short = 's', long)]
        stage: String,

        /// Service version being deployed, e.g. 1.2.3
        #[arg(long)]
        service_version: String,
    },

    /// Remove the route, target group, and invoke permission of a deployment
    Deregister {
        #[command(flatten)]
        common: CommonArgs,

        /// Deployment stage, e.g. dev
        #[arg(short = 's', long)]
        stage: String,

        /// Service version to deregister, e.g. 1.2.3
        #[arg(long)]
        service_version: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    match args.command {
        Command::Init {
            common,
            load_balancer,
            subnets,
            security_groups,
            service_name,
            path_template,
            function_name,
            package_dir,
            entry_module,
            no_deploy,
        } => {
            let ctx = AwsContext::new(&common.region).await;
            let elb = ElbClient::from_context(&ctx);
            let ec2 = Ec2Client::from_context(&ctx);
            let iam = IamClient::from_context(&ctx);
            let lambda = LambdaClient::from_context(&ctx);

            let answers = InitAnswers {
                load_balancer,
                subnet_ids: subnets,
                security_group_ids: security_groups,
                service_name,
                path_template,
                function_name,
                package_dir,
                entry_module,
                deploy_now: !no_deploy,
            };

            let binding = orchestrator::initialize(
                &common.project_directory,
                &common.region,
                &answers,
                &elb,
                &ec2,
                &iam,
                &lambda,
                &RetryPolicy::default(),
            )
            .await?;

            info!(
                load_balancer = %binding.load_balancer,
                service = %binding.service_name,
                "Binding initialized"
            );
        }

        Command::Update {
            common,
            stage,
            service_version,
        } => {
            let ctx = AwsContext::new(&common.region).await;
            let elb = ElbClient::from_context(&ctx);
            let lambda = LambdaClient::from_context(&ctx);

            let outcome = orchestrator::deploy(
                &common.project_directory,
                &stage,
                &service_version,
                &elb,
                &lambda,
            )
            .await?;

            match outcome.route {
                Some(route) => info!(
                    version = %outcome.version,
                    priority = route.priority,
                    "Deployed; accessible at {}",
                    route.url
                ),
                None => info!(
                    version = %outcome.version,
                    path = %outcome.route_path,
                    "Deployed to the existing route"
                ),
            }
        }

        Command::Deregister {
            common,
            stage,
            service_version,
        } => {
            let ctx = AwsContext::new(&common.region).await;
            let elb = ElbClient::from_context(&ctx);
            let lambda = LambdaClient::from_context(&ctx);

            orchestrator::deregister(
                &common.project_directory,
                &stage,
                &service_version,
                &elb,
                &lambda,
            )
            .await?;

            info!(stage = %stage, version = %service_version, "Deployment deregistered");
        }
    }

    Ok(())
}
