//! ECS service task inspection for deployment automation.
//!
//! This crate talks to the ECS and EC2 control planes to:
//!
//! - **List** the running tasks of a cluster's service
//! - **Resolve** the public DNS name of the EC2 host behind a task
//! - **Stop** a task, or drain every task of the service
//!
//! The control plane sits behind the [`ControlPlane`] trait, so
//! [`ClusterTasks`] can be driven by the AWS SDK ([`providers::aws::AwsControlPlane`])
//! or by any other implementation.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ecs_tasks::{ClusterConfig, ClusterTasks};
//! use ecs_tasks::providers::aws::AwsControlPlane;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ClusterConfig::new("demo-cluster", "demo-service", "123456789012", "us-east-1")?;
//!     let plane = AwsControlPlane::from_config(&config).await;
//!     let tasks = ClusterTasks::new(Arc::new(plane), config);
//!
//!     for arn in tasks.list_running_tasks().await?.iter() {
//!         println!("{arn} -> {}", tasks.resolve_task_instance_dns(arn).await?);
//!     }
//!     Ok(())
//! }
//! ```

#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod inspector;
pub mod providers;
pub mod server;

pub use config::{ClusterArn, ClusterConfig, ConfigError, StopFailurePolicy};
pub use inspector::{
    ClusterTasks, DnsResolution, DrainReport, InspectError, StopOutcome, TaskArnSet,
    NOT_FOUND_SENTINEL,
};
pub use providers::{
    ComputeInstance, ContainerInstance, ControlPlane, ControlPlaneError, Operation, TaskRecord,
    TaskStatus,
};
