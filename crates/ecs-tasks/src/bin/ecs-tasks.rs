//! ecs-tasks CLI - inspect and stop the tasks of an ECS service.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ecs_tasks::config::ClusterArgs;
use ecs_tasks::providers::aws::AwsControlPlane;
use ecs_tasks::{server, ClusterConfig, ClusterTasks, StopOutcome};

/// ecs-tasks CLI - inspect and stop the tasks of an ECS service.
#[derive(Parser)]
#[command(name = "ecs-tasks")]
#[command(about = "List, inspect and stop the running tasks of an ECS service")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    cluster: ClusterArgs,

    /// Enable verbose logging.
    #[arg(short, long, default_value = "false", global = true)]
    verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long, env = "ECS_TASKS_JSON_LOGS", default_value = "false", global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List running task ARNs of the service.
    List {
        /// Print all ARNs as one comma-joined line.
        #[arg(long, default_value = "false")]
        joined: bool,
    },

    /// Show the lifecycle state of a task.
    Describe {
        /// Task ARN or id.
        #[arg(long)]
        task: String,
    },

    /// Resolve the public DNS name of the EC2 host running a task.
    Dns {
        /// Task ARN or id.
        #[arg(long)]
        task: String,

        /// Print the flat value only: DNS name, empty line, or the not-found sentinel.
        #[arg(long, default_value = "false")]
        legacy: bool,
    },

    /// Stop a task.
    Stop {
        /// Task ARN or id.
        #[arg(long)]
        task: String,
    },

    /// Stop every running task of the service.
    Drain,

    /// Serve the same operations over HTTP.
    Serve {
        /// Listen address.
        #[arg(long, env = "ECS_TASKS_LISTEN", default_value = "0.0.0.0:8080")]
        listen: SocketAddr,
    },
}

fn init_tracing(verbose: bool, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    // Logs go to stderr so stdout stays parseable by calling automation.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json_logs);

    let config = ClusterConfig::try_from(cli.cluster).context("Invalid cluster configuration")?;
    info!(
        cluster = %config.cluster_name,
        service = %config.service_name,
        region = %config.region,
        stop_failures = %config.stop_failure_policy,
        "Using cluster"
    );

    let plane = AwsControlPlane::from_config(&config).await;
    let tasks = ClusterTasks::new(Arc::new(plane), config);

    match cli.command {
        Commands::List { joined } => {
            let arns = tasks
                .list_running_tasks()
                .await
                .context("Failed to list cluster tasks")?;
            if joined {
                println!("{arns}");
            } else {
                for arn in arns.iter() {
                    println!("{arn}");
                }
            }
        }

        Commands::Describe { task } => {
            let record = tasks
                .describe_task(&task)
                .await
                .context("Failed to describe task")?
                .with_context(|| format!("Task not found: {task}"))?;
            println!("\nTask Details:");
            println!("  ARN:              {}", record.task_arn);
            println!("  Service:          {}", record.service_name.unwrap_or_default());
            println!("  Last status:      {}", record.last_status);
            println!("  Desired status:   {}", record.desired_status);
            println!("  Launch type:      {}", record.launch_type.unwrap_or_default());
            println!(
                "  Container inst.:  {}",
                record.container_instance_arn.unwrap_or_default()
            );
            if let Some(started_at) = record.started_at {
                println!("  Started at:       {}", started_at.to_rfc3339());
            }
        }

        Commands::Dns { task, legacy } => {
            let resolution = tasks
                .resolve_task_instance_dns(&task)
                .await
                .context("Failed to resolve task instance DNS")?;
            if legacy {
                println!("{resolution}");
            } else {
                println!("{}", serde_json::to_string_pretty(&resolution)?);
            }
        }

        Commands::Stop { task } => {
            let outcome = tasks
                .stop_task(&tasks.cluster_arn(), &task)
                .await
                .context("Failed to stop task")?;
            print_outcome(&outcome);
        }

        Commands::Drain => {
            let report = tasks
                .drain_service()
                .await
                .context("Failed to drain service")?;
            for outcome in &report.outcomes {
                print_outcome(outcome);
            }
            println!(
                "\nStopped {}/{} tasks of {} in {}",
                report.stopped(),
                report.outcomes.len(),
                report.service_name,
                report.cluster_arn
            );
        }

        Commands::Serve { listen } => {
            let app = server::build_router(Arc::new(tasks));
            let listener = tokio::net::TcpListener::bind(listen)
                .await
                .with_context(|| format!("Failed to bind {listen}"))?;
            info!(addr = %listen, "Serving task API");
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = tokio::signal::ctrl_c().await;
                })
                .await
                .context("HTTP server failed")?;
        }
    }

    Ok(())
}

fn print_outcome(outcome: &StopOutcome) {
    match outcome {
        StopOutcome::Stopping { task } => {
            println!("stopping  {}  ({})", task.task_arn, task.last_status);
        }
        StopOutcome::FailureIgnored { task, error } => {
            println!("ignored   {task}  ({error})");
        }
    }
}
