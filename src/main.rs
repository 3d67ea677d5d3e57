/// Shiftops - OpenShift application operations
///
/// Runs assistant tool calls (list, inspect, restart, scale, upgrade, deploy, health checks)
/// against the applications of a single OpenShift namespace.
mod apps;
mod config;
mod health;
mod k8s;
mod telemetry;
mod tools;
mod utils;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::apps::lifecycle;
use crate::config::{AssistantConfig, ToolDefaults, TOKEN_ENV_VAR};
use crate::k8s::ClusterClient;
use crate::tools::dispatch::render_result;
use crate::tools::{Dispatcher, OutputFormat, ToolArgs, ToolCall, ToolName};

#[derive(Parser)]
#[command(name = "shiftops")]
#[command(about = "Operate OpenShift applications through assistant tool calls", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (defaults are used when it does not exist)
    #[arg(short, long, default_value = "shiftops.yaml")]
    config: PathBuf,

    /// Namespace to operate in, overriding the configuration
    #[arg(short, long)]
    namespace: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Render every result as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate example configuration file
    Init,

    /// List the available tools and their arguments
    Tools,

    /// Run a raw tool request (JSON object with `tool_name`), `-` reads it from stdin
    Call { request: String },

    /// List applications in the namespace
    Apps,

    /// Per-application overview: replicas, pods and resource usage
    Overview,

    /// Pods of an application and their status
    Pods { app: String },

    /// Deployment configuration of an application
    Config { app: String },

    /// Recent logs of every pod of an application
    Logs {
        app: String,

        /// Lines to fetch from the end of each pod's log
        #[arg(long)]
        tail: Option<i64>,
    },

    /// Current CPU and memory usage of an application's containers
    Telemetry { app: String },

    /// CPU and memory usage of every container in the namespace
    Metrics,

    /// Restart every pod of an application
    Restart {
        app: String,

        /// Wait up to SECS for the rollout to complete
        #[arg(long, value_name = "SECS")]
        wait: Option<u64>,
    },

    /// Scale an application
    Scale {
        app: String,

        #[arg(allow_negative_numbers = true)]
        replicas: i64,

        /// Wait up to SECS for the rollout to complete
        #[arg(long, value_name = "SECS")]
        wait: Option<u64>,
    },

    /// Move every container of an application to a new image
    Upgrade {
        app: String,
        image: String,

        /// Wait up to SECS for the rollout to complete
        #[arg(long, value_name = "SECS")]
        wait: Option<u64>,
    },

    /// Deploy a new application
    Deploy {
        app: String,
        image: String,

        #[arg(long, allow_negative_numbers = true)]
        replicas: Option<i64>,

        /// Container port, also exposed through a ClusterIP service
        #[arg(long, conflicts_with = "no_service")]
        port: Option<u16>,

        /// Do not expose a port or create a service
        #[arg(long)]
        no_service: bool,

        /// Wait up to SECS for the rollout to complete
        #[arg(long, value_name = "SECS")]
        wait: Option<u64>,
    },

    /// Cluster health checks
    Health {
        #[arg(value_enum)]
        check: HealthCheck,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum HealthCheck {
    /// API server health endpoint
    Components,
    /// Ready condition of every node
    Nodes,
    /// Node and container CPU/memory against the configured thresholds
    Resources,
}

impl Commands {
    /// The tool and arguments a subcommand stands for
    fn tool_request(&self) -> Option<(ToolName, Map<String, Value>)> {
        let request = match self {
            Commands::Init | Commands::Tools | Commands::Call { .. } => return None,
            Commands::Apps => (ToolName::GetApplications, Map::new()),
            Commands::Overview => (ToolName::GetApplicationsOverview, Map::new()),
            Commands::Pods { app } => (
                ToolName::GetPodsAndStatusHealthForApplication,
                object(json!({ "app_name": app })),
            ),
            Commands::Config { app } => (
                ToolName::GetDeploymentConfigs,
                object(json!({ "app_name": app })),
            ),
            Commands::Logs { app, tail } => {
                let mut args = object(json!({ "app_name": app }));
                if let Some(tail) = tail {
                    args.insert("tail_lines".to_string(), json!(tail));
                }
                (ToolName::GetApplicationLogs, args)
            }
            Commands::Telemetry { app } => (
                ToolName::GetApplicationTelemetryData,
                object(json!({ "app_name": app })),
            ),
            Commands::Metrics => (ToolName::GetNamespaceMetrics, Map::new()),
            Commands::Restart { app, .. } => (
                ToolName::RestartApplication,
                object(json!({ "app_name": app })),
            ),
            Commands::Scale { app, replicas, .. } => (
                ToolName::ScaleApplicationPods,
                object(json!({ "app_name": app, "replicas": replicas })),
            ),
            Commands::Upgrade { app, image, .. } => (
                ToolName::UpgradeApplication,
                object(json!({ "app_name": app, "new_image": image })),
            ),
            Commands::Deploy {
                app,
                image,
                replicas,
                port,
                no_service,
                ..
            } => {
                let mut args = object(json!({ "app_name": app, "container_image": image }));
                if let Some(replicas) = replicas {
                    args.insert("replicas".to_string(), json!(replicas));
                }
                if *no_service {
                    args.insert("port".to_string(), Value::Null);
                } else if let Some(port) = port {
                    args.insert("port".to_string(), json!(port));
                }
                (ToolName::DeployNewApplication, args)
            }
            Commands::Health { check } => {
                let name = match check {
                    HealthCheck::Components => ToolName::CheckCriticalComponentsHealth,
                    HealthCheck::Nodes => ToolName::CheckClusterNodesHealth,
                    HealthCheck::Resources => ToolName::CheckResourceUtilizationHealth,
                };
                (name, Map::new())
            }
        };
        Some(request)
    }

    /// Rollout wait requested on a mutating subcommand
    fn wait(&self) -> Option<u64> {
        match self {
            Commands::Restart { wait, .. }
            | Commands::Scale { wait, .. }
            | Commands::Upgrade { wait, .. }
            | Commands::Deploy { wait, .. } => *wait,
            _ => None,
        }
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr, tool output to stdout
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("shiftops={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let succeeded = match run(&cli).await {
        Ok(succeeded) => succeeded,
        Err(e) => {
            error!("Error: {:#}", e);
            false
        }
    };

    if !succeeded {
        std::process::exit(1);
    }
}

/// Execute the selected command, returning whether the tool call succeeded
async fn run(cli: &Cli) -> Result<bool> {
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    match &cli.command {
        Commands::Init => {
            init_config(cli).await?;
            return Ok(true);
        }
        Commands::Tools => {
            println!("{}", render_catalog(format)?);
            return Ok(true);
        }
        _ => {}
    }

    let config = load_config(cli)?;

    // Raw requests follow the string contract: failures are part of the output
    if let Commands::Call { request } = &cli.command {
        let raw = read_request(request).await?;
        if let Some(rejected) = rejected_request(&raw, &config.defaults, format) {
            println!("{}", rejected);
            return Ok(true);
        }
        let dispatcher = connect(config).await?;
        println!("{}", dispatcher.handle(&raw, format).await);
        return Ok(true);
    }

    let Some((name, args)) = cli.command.tool_request() else {
        anyhow::bail!("Subcommand does not map to a tool");
    };
    // Arguments are validated before any cluster connection is made
    let call = match ToolCall::from_args(name, &ToolArgs::new(args), &config.defaults) {
        Ok(call) => call,
        Err(err) => {
            println!("{}", render_result(Err(err), format));
            return Ok(false);
        }
    };
    let app_name = call.app_name().map(str::to_string);

    let dispatcher = connect(config).await?;
    let result = dispatcher.dispatch(call).await;
    let succeeded = result.is_ok();
    println!("{}", render_result(result, format));

    if let (true, Some(timeout_secs), Some(app_name)) = (succeeded, cli.command.wait(), app_name) {
        lifecycle::wait_for_rollout(dispatcher.cluster(), &app_name, timeout_secs).await?;
    }

    Ok(succeeded)
}

async fn connect(config: AssistantConfig) -> Result<Dispatcher> {
    let cluster = ClusterClient::connect(&config)
        .await
        .context("Failed to connect to the cluster")?;
    Ok(Dispatcher::new(Arc::new(cluster), config))
}

/// The rendered error for a raw request that fails to parse, if it does
fn rejected_request(raw: &str, defaults: &ToolDefaults, format: OutputFormat) -> Option<String> {
    ToolCall::parse(raw, defaults)
        .err()
        .map(|err| render_result(Err(err), format))
}

/// Load the configuration file, falling back to defaults when it is absent
fn load_config(cli: &Cli) -> Result<AssistantConfig> {
    let mut config = if cli.config.exists() {
        AssistantConfig::from_file(&cli.config)
            .with_context(|| format!("Failed to load configuration: {}", cli.config.display()))?
    } else {
        debug!(
            "No configuration file at {}, using defaults",
            cli.config.display()
        );
        AssistantConfig::default()
    };

    if let Some(namespace) = &cli.namespace {
        config.namespace = namespace.clone();
        config.validate()?;
    }

    info!("Namespace: {}", config.namespace);
    Ok(config)
}

async fn read_request(request: &str) -> Result<String> {
    if request != "-" {
        return Ok(request.to_string());
    }

    let mut raw = String::new();
    tokio::io::stdin()
        .read_to_string(&mut raw)
        .await
        .context("Failed to read tool request from stdin")?;
    Ok(raw)
}

fn render_catalog(format: OutputFormat) -> Result<String> {
    let catalog = tools::catalog();
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(&catalog)?);
    }

    let mut lines = Vec::new();
    for tool in catalog {
        lines.push(format!("{}: {}", tool.name, tool.description));
        for arg in tool.arguments {
            let required = if arg.required { "required" } else { "optional" };
            lines.push(format!(
                "    {} ({}, {}): {}",
                arg.name, arg.kind, required, arg.description
            ));
        }
    }
    Ok(lines.join("\n"))
}

/// Generate example configuration
async fn init_config(cli: &Cli) -> Result<()> {
    if cli.config.exists() {
        anyhow::bail!(
            "Configuration file already exists: {}",
            cli.config.display()
        );
    }

    let example_config = AssistantConfig::example();
    let yaml = serde_yaml::to_string(&example_config)?;

    tokio::fs::write(&cli.config, yaml)
        .await
        .context("Failed to write configuration file")?;

    info!("Example configuration created: {}", cli.config.display());
    info!("");
    info!("Next steps:");
    info!("  1. Set cluster.server and the namespace to operate in");
    info!("  2. Set your cluster API token:");
    info!("     export {}=your-token-here", TOKEN_ENV_VAR);
    info!("  3. List the applications:");
    info!("     shiftops apps");

    Ok(())
}
