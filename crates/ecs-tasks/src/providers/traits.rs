//! Control plane trait and common types.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while talking to the control plane.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControlPlaneError {
    /// Credentials missing, expired or not allowed to perform the call.
    #[error("Authentication error: {code} - {message}")]
    Auth { code: String, message: String },

    /// Cluster, service, task or instance does not exist.
    #[error("Resource not found: {code} - {message}")]
    NotFound { code: String, message: String },

    /// Request did not complete within the configured timeout.
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Request never produced a response (DNS, connect, TLS, ...).
    #[error("Transport error: {0}")]
    Transport(String),

    /// API returned an error response.
    #[error("API error: {code} - {message}")]
    Api { code: String, message: String },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl ControlPlaneError {
    /// Whether the provider reported the target as missing.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Provider calls made by this crate, used to tag failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    ListTasks,
    DescribeTasks,
    DescribeContainerInstances,
    DescribeInstances,
    StopTask,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ListTasks => write!(f, "ListTasks"),
            Self::DescribeTasks => write!(f, "DescribeTasks"),
            Self::DescribeContainerInstances => write!(f, "DescribeContainerInstances"),
            Self::DescribeInstances => write!(f, "DescribeInstances"),
            Self::StopTask => write!(f, "StopTask"),
        }
    }
}

// ============================================================================
// Task types
// ============================================================================

/// Task lifecycle status as reported by ECS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Provisioning,
    Pending,
    Activating,
    Running,
    Deactivating,
    Stopping,
    Deprovisioning,
    Stopped,
    Deleted,
    /// Unknown status.
    #[serde(other)]
    Unknown,
}

impl TaskStatus {
    /// Parse the upper-case status string ECS uses (`RUNNING`, `STOPPED`, ...).
    #[must_use]
    pub fn from_provider(status: &str) -> Self {
        match status {
            "PROVISIONING" => Self::Provisioning,
            "PENDING" => Self::Pending,
            "ACTIVATING" => Self::Activating,
            "RUNNING" => Self::Running,
            "DEACTIVATING" => Self::Deactivating,
            "STOPPING" => Self::Stopping,
            "DEPROVISIONING" => Self::Deprovisioning,
            "STOPPED" => Self::Stopped,
            "DELETED" => Self::Deleted,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Provisioning => write!(f, "provisioning"),
            Self::Pending => write!(f, "pending"),
            Self::Activating => write!(f, "activating"),
            Self::Running => write!(f, "running"),
            Self::Deactivating => write!(f, "deactivating"),
            Self::Stopping => write!(f, "stopping"),
            Self::Deprovisioning => write!(f, "deprovisioning"),
            Self::Stopped => write!(f, "stopped"),
            Self::Deleted => write!(f, "deleted"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// A task as described by the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Task ARN.
    pub task_arn: String,
    /// ARN of the owning cluster.
    pub cluster_arn: Option<String>,
    /// Owning service, derived from the task group (`service:<name>`).
    pub service_name: Option<String>,
    /// Container instance hosting the task. `None` for Fargate tasks.
    pub container_instance_arn: Option<String>,
    /// Last status reported by the agent.
    pub last_status: TaskStatus,
    /// Status the scheduler is driving the task towards.
    pub desired_status: TaskStatus,
    /// `EC2`, `FARGATE` or `EXTERNAL`.
    pub launch_type: Option<String>,
    /// When the task started running.
    pub started_at: Option<DateTime<Utc>>,
}

impl TaskRecord {
    /// Short task id, the last path segment of the ARN.
    #[must_use]
    pub fn task_id(&self) -> &str {
        short_id(&self.task_arn)
    }

    /// Whether `reference` names this task, either by full ARN or by id.
    #[must_use]
    pub fn matches(&self, reference: &str) -> bool {
        self.task_arn == reference || self.task_id() == short_id(reference)
    }
}

/// Service name from an ECS task group such as `service:demo-service`.
#[must_use]
pub fn service_from_group(group: &str) -> Option<String> {
    group.strip_prefix("service:").map(ToString::to_string)
}

/// Last `/` separated segment of an ARN, or the input if it has none.
#[must_use]
pub fn short_id(reference: &str) -> &str {
    reference.rsplit('/').next().unwrap_or(reference)
}

// ============================================================================
// Instance types
// ============================================================================

/// The control plane's record of an EC2 host registered into a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInstance {
    /// Container instance ARN.
    pub container_instance_arn: String,
    /// Backing EC2 instance id.
    pub ec2_instance_id: Option<String>,
}

/// An EC2 instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeInstance {
    /// Instance id (`i-...`).
    pub instance_id: String,
    /// Public DNS name. `None` when the instance has none assigned.
    pub public_dns_name: Option<String>,
}

/// Trait for container orchestration control planes.
///
/// Every call is a fresh round trip. Implementations must not cache.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// List ARNs of running tasks started by `service` in `cluster`.
    async fn list_tasks(
        &self,
        cluster: &str,
        service: &str,
    ) -> Result<Vec<String>, ControlPlaneError>;

    /// Describe tasks by ARN or id. Unknown tasks are left out of the result.
    async fn describe_tasks(
        &self,
        cluster: &str,
        tasks: &[String],
    ) -> Result<Vec<TaskRecord>, ControlPlaneError>;

    /// Describe container instances by ARN or id.
    async fn describe_container_instances(
        &self,
        cluster: &str,
        container_instances: &[String],
    ) -> Result<Vec<ContainerInstance>, ControlPlaneError>;

    /// Describe EC2 instances by id.
    async fn describe_instances(
        &self,
        instance_ids: &[String],
    ) -> Result<Vec<ComputeInstance>, ControlPlaneError>;

    /// Ask the scheduler to stop a task. `cluster` is the full cluster ARN.
    async fn stop_task(
        &self,
        cluster: &str,
        task: &str,
        reason: &str,
    ) -> Result<TaskRecord, ControlPlaneError>;
}
