//! loadgenctl deploys a load generator and a Grafana stack to GKE
#![deny(missing_docs)]

use std::{process::ExitCode, time::Duration};

use clap::{Parser, Subcommand};
use kube::Client;
use loadgen_common::telemetry::{self, LogFormat};
use loadgen_deployer::{
    cleanup,
    cluster::KubeCluster,
    configure::{self, Configurator},
    deploy,
    exec::SystemRunner,
    prereq::{check_tools, CLUSTER_TOOLS},
    prompt::Terminal,
    status,
    store::ConfigMapStore,
    Result,
};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Format of the log lines written to stderr.
    #[arg(long, value_enum, default_value_t, env = "LOADGEN_LOG_FORMAT", global = true)]
    log_format: LogFormat,
}

/// Available Subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build and push the image, then deploy the load generator and Grafana
    Deploy(deploy::Opts),
    /// Edit the load configuration interactively
    Configure(configure::Opts),
    /// Delete everything deploy created
    Cleanup(cleanup::Opts),
    /// Show what is deployed and the current configuration
    Status,
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Deploy(_) => "deploy",
            Command::Configure(_) => "configure",
            Command::Cleanup(_) => "cleanup",
            Command::Status => "status",
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Cli::parse();
    if let Err(err) = telemetry::init(args.log_format) {
        eprintln!("failed to initialize logging: {err:#}");
        return ExitCode::FAILURE;
    }

    info!(command = args.command.name(), "starting loadgenctl");
    match run(args.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(severity = ?err.severity(), %err, "command failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> Result<()> {
    let runner = SystemRunner;
    let mut prompt = Terminal;
    if !matches!(command, Command::Deploy(_)) {
        check_tools(&runner, &CLUSTER_TOOLS).await?;
    }
    match command {
        Command::Deploy(opts) => {
            deploy::run(&runner, &mut prompt, &opts).await?;
        }
        Command::Configure(opts) => {
            let client = Client::try_default().await?;
            let store = ConfigMapStore::new(client.clone());
            let cluster = KubeCluster::new(client);
            Configurator::new(&store, &cluster, Duration::from_secs(opts.timeout_secs))
                .run(&mut prompt)
                .await?;
        }
        Command::Cleanup(opts) => {
            let cluster = KubeCluster::new(Client::try_default().await?);
            let outcome = cleanup::run(&cluster, &runner, &mut prompt, &opts).await?;
            println!("{outcome}");
        }
        Command::Status => {
            let client = Client::try_default().await?;
            let report =
                status::collect(&KubeCluster::new(client.clone()), &ConfigMapStore::new(client))
                    .await?;
            println!("{report}");
        }
    }
    Ok(())
}
