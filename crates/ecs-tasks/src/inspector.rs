//! Task inspection and stop workflow for one cluster/service.
//!
//! Every operation is a short sequential chain of control plane calls. Nothing
//! is cached between calls and no local state is kept.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{ClusterArn, ClusterConfig, StopFailurePolicy};
use crate::providers::{ControlPlane, ControlPlaneError, Operation, TaskRecord};

/// Flat value reported when no task matched a DNS lookup.
pub const NOT_FOUND_SENTINEL: &str = "undefined: not found dns";

/// Errors returned by [`ClusterTasks`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InspectError {
    /// A control plane call failed.
    #[error("{operation} failed: {source}")]
    Provider {
        operation: Operation,
        #[source]
        source: ControlPlaneError,
    },

    /// The task is not placed on a container instance (Fargate).
    #[error("Task {task_arn} has no container instance")]
    NoContainerInstance { task_arn: String },

    /// The container instance referenced by the task was not returned.
    #[error("Container instance not found: {0}")]
    ContainerInstanceNotFound(String),

    /// The container instance has no backing EC2 instance id.
    #[error("Container instance {0} has no EC2 instance id")]
    MissingInstanceId(String),

    /// The EC2 instance behind the container instance was not returned.
    #[error("Compute instance not found: {0}")]
    ComputeInstanceNotFound(String),
}

impl InspectError {
    fn provider(operation: Operation) -> impl FnOnce(ControlPlaneError) -> Self {
        move |source| Self::Provider { operation, source }
    }
}

/// Running task ARNs of a service, in provider order, each listed once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TaskArnSet(Vec<String>);

impl TaskArnSet {
    /// Build from provider output, dropping repeats.
    #[must_use]
    pub fn from_arns(arns: impl IntoIterator<Item = String>) -> Self {
        let mut unique: Vec<String> = Vec::new();
        for arn in arns {
            if !unique.contains(&arn) {
                unique.push(arn);
            }
        }
        Self(unique)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn contains(&self, arn: &str) -> bool {
        self.0.iter().any(|a| a == arn)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Comma-joined single string, the shape older automation consumed.
    /// Empty when there are no tasks.
    #[must_use]
    pub fn joined(&self) -> String {
        self.0.join(",")
    }
}

impl std::fmt::Display for TaskArnSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.joined())
    }
}

impl IntoIterator for TaskArnSet {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Result of resolving the public DNS of a task's host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum DnsResolution {
    /// Host found with a public DNS name.
    Resolved {
        task_arn: String,
        instance_id: String,
        dns_name: String,
    },
    /// Host found but it has no public DNS name.
    NoPublicDns {
        task_arn: String,
        instance_id: String,
    },
    /// No task matched the reference.
    TaskNotFound { task_arn: String },
}

impl DnsResolution {
    /// DNS name if one was resolved.
    #[must_use]
    pub fn dns_name(&self) -> Option<&str> {
        match self {
            Self::Resolved { dns_name, .. } => Some(dns_name),
            _ => None,
        }
    }

    /// Flat string form: the DNS name, `""` without public DNS, or
    /// [`NOT_FOUND_SENTINEL`] when the task does not exist.
    #[must_use]
    pub fn legacy_value(&self) -> &str {
        match self {
            Self::Resolved { dns_name, .. } => dns_name,
            Self::NoPublicDns { .. } => "",
            Self::TaskNotFound { .. } => NOT_FOUND_SENTINEL,
        }
    }
}

impl std::fmt::Display for DnsResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.legacy_value())
    }
}

/// Outcome of a stop request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StopOutcome {
    /// The control plane accepted the request.
    Stopping { task: TaskRecord },
    /// The request failed and [`StopFailurePolicy::Ignore`] swallowed it.
    FailureIgnored {
        task: String,
        #[serde(serialize_with = "serialize_display")]
        error: ControlPlaneError,
    },
}

impl StopOutcome {
    #[must_use]
    pub fn is_stopping(&self) -> bool {
        matches!(self, Self::Stopping { .. })
    }
}

fn serialize_display<S: serde::Serializer>(
    error: &ControlPlaneError,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

/// Result of stopping every task of the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    pub cluster_arn: ClusterArn,
    pub service_name: String,
    pub outcomes: Vec<StopOutcome>,
}

impl DrainReport {
    /// Number of tasks the control plane accepted a stop for.
    #[must_use]
    pub fn stopped(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_stopping()).count()
    }
}

/// Inspector/stopper bound to one configured cluster and service.
pub struct ClusterTasks {
    plane: Arc<dyn ControlPlane>,
    config: ClusterConfig,
}

impl ClusterTasks {
    #[must_use]
    pub fn new(plane: Arc<dyn ControlPlane>, config: ClusterConfig) -> Self {
        Self { plane, config }
    }

    #[must_use]
    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// ARN of the configured cluster, used for stop requests.
    #[must_use]
    pub fn cluster_arn(&self) -> ClusterArn {
        self.config.cluster_arn()
    }

    /// List running tasks of the configured service.
    ///
    /// # Errors
    /// Returns [`InspectError::Provider`] if ListTasks fails.
    pub async fn list_running_tasks(&self) -> Result<TaskArnSet, InspectError> {
        let arns = self
            .plane
            .list_tasks(&self.config.cluster_name, &self.config.service_name)
            .await
            .map_err(InspectError::provider(Operation::ListTasks))?;

        let set = TaskArnSet::from_arns(arns);
        debug!(
            cluster = %self.config.cluster_name,
            service = %self.config.service_name,
            count = set.len(),
            "Listed running tasks"
        );
        Ok(set)
    }

    /// Describe a single task by ARN or id. `None` if it does not exist.
    ///
    /// # Errors
    /// Returns [`InspectError::Provider`] if DescribeTasks fails.
    pub async fn describe_task(&self, task: &str) -> Result<Option<TaskRecord>, InspectError> {
        let tasks = self
            .plane
            .describe_tasks(&self.config.cluster_name, &[task.to_string()])
            .await
            .map_err(InspectError::provider(Operation::DescribeTasks))?;

        Ok(tasks.into_iter().find(|t| t.matches(task)))
    }

    /// Request a stop of `task` in `cluster_arn`.
    ///
    /// Under [`StopFailurePolicy::Ignore`] a failed request is logged and
    /// returned as [`StopOutcome::FailureIgnored`].
    ///
    /// # Errors
    /// Only under [`StopFailurePolicy::Propagate`], when StopTask fails.
    pub async fn stop_task(
        &self,
        cluster_arn: &ClusterArn,
        task: &str,
    ) -> Result<StopOutcome, InspectError> {
        match self
            .plane
            .stop_task(cluster_arn.as_str(), task, &self.config.stop_reason)
            .await
        {
            Ok(record) => {
                info!(
                    cluster = %cluster_arn,
                    task = %record.task_arn,
                    last_status = %record.last_status,
                    "Task is stopping"
                );
                Ok(StopOutcome::Stopping { task: record })
            }
            Err(error) => match self.config.stop_failure_policy {
                StopFailurePolicy::Ignore => {
                    warn!(
                        cluster = %cluster_arn,
                        task = %task,
                        error = %error,
                        "Failed to stop task, ignoring"
                    );
                    Ok(StopOutcome::FailureIgnored {
                        task: task.to_string(),
                        error,
                    })
                }
                StopFailurePolicy::Propagate => Err(InspectError::Provider {
                    operation: Operation::StopTask,
                    source: error,
                }),
            },
        }
    }

    /// Resolve the public DNS name of the EC2 host running `task`.
    ///
    /// Walks task → container instance → EC2 instance, one call at a time.
    ///
    /// # Errors
    /// Returns the step that failed; a missing task is not an error.
    pub async fn resolve_task_instance_dns(
        &self,
        task: &str,
    ) -> Result<DnsResolution, InspectError> {
        let cluster = &self.config.cluster_name;

        let Some(record) = self.describe_task(task).await? else {
            debug!(cluster = %cluster, task = %task, "No task matched");
            return Ok(DnsResolution::TaskNotFound {
                task_arn: task.to_string(),
            });
        };

        let container_instance_arn =
            record
                .container_instance_arn
                .clone()
                .ok_or_else(|| InspectError::NoContainerInstance {
                    task_arn: record.task_arn.clone(),
                })?;

        let container_instance = self
            .plane
            .describe_container_instances(cluster, &[container_instance_arn.clone()])
            .await
            .map_err(InspectError::provider(Operation::DescribeContainerInstances))?
            .into_iter()
            .next()
            .ok_or_else(|| {
                InspectError::ContainerInstanceNotFound(container_instance_arn.clone())
            })?;

        let instance_id = container_instance
            .ec2_instance_id
            .ok_or(InspectError::MissingInstanceId(container_instance_arn))?;

        let instance = self
            .plane
            .describe_instances(&[instance_id.clone()])
            .await
            .map_err(InspectError::provider(Operation::DescribeInstances))?
            .into_iter()
            .find(|i| i.instance_id == instance_id)
            .ok_or_else(|| InspectError::ComputeInstanceNotFound(instance_id.clone()))?;

        let resolution = match instance.public_dns_name {
            Some(dns_name) => DnsResolution::Resolved {
                task_arn: record.task_arn,
                instance_id,
                dns_name,
            },
            None => DnsResolution::NoPublicDns {
                task_arn: record.task_arn,
                instance_id,
            },
        };

        info!(task = %task, dns = %resolution, "Resolved task instance DNS");
        Ok(resolution)
    }

    /// Stop every running task of the configured service.
    ///
    /// # Errors
    /// Returns an error if listing fails, or on the first failed stop under
    /// [`StopFailurePolicy::Propagate`].
    pub async fn drain_service(&self) -> Result<DrainReport, InspectError> {
        let cluster_arn = self.cluster_arn();
        let tasks = self.list_running_tasks().await?;

        info!(
            cluster = %cluster_arn,
            service = %self.config.service_name,
            tasks = tasks.len(),
            "Draining service"
        );

        let mut outcomes = Vec::with_capacity(tasks.len());
        for task in tasks.iter() {
            outcomes.push(self.stop_task(&cluster_arn, task).await?);
        }

        let report = DrainReport {
            cluster_arn,
            service_name: self.config.service_name.clone(),
            outcomes,
        };
        info!(
            stopped = report.stopped(),
            total = report.outcomes.len(),
            "Drain finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::memory::InMemoryControlPlane;
    use crate::providers::TaskStatus;

    const DNS: &str = "ec2-1-2-3-4.compute.amazonaws.com";

    fn config() -> ClusterConfig {
        ClusterConfig::new("demo-cluster", "demo-service", "123456789012", "us-east-1").unwrap()
    }

    fn demo_plane() -> InMemoryControlPlane {
        InMemoryControlPlane::new("demo-cluster")
            .with_task("task/abc123", "demo-service", Some("ci-1"))
            .with_container_instance("ci-1", Some("i-0001"))
            .with_instance("i-0001", Some(DNS))
    }

    fn inspector(plane: InMemoryControlPlane) -> (Arc<InMemoryControlPlane>, ClusterTasks) {
        let plane = Arc::new(plane);
        let tasks = ClusterTasks::new(plane.clone(), config());
        (plane, tasks)
    }

    fn auth_error() -> ControlPlaneError {
        ControlPlaneError::Auth {
            code: "AccessDeniedException".to_string(),
            message: "not authorized to perform ecs:StopTask".to_string(),
        }
    }

    #[tokio::test]
    async fn test_demo_cluster_end_to_end() {
        let (plane, tasks) = inspector(demo_plane());

        let listed = tasks.list_running_tasks().await.unwrap();
        assert_eq!(listed.joined(), "task/abc123");

        let dns = tasks.resolve_task_instance_dns("task/abc123").await.unwrap();
        assert_eq!(dns.dns_name(), Some(DNS));
        assert_eq!(dns.to_string(), DNS);

        let outcome = tasks
            .stop_task(&tasks.cluster_arn(), "task/abc123")
            .await
            .unwrap();
        assert!(outcome.is_stopping());

        let stopped = plane.task("task/abc123").unwrap();
        assert_eq!(stopped.last_status, TaskStatus::Stopping);
        assert_eq!(stopped.desired_status, TaskStatus::Stopped);
        assert_eq!(plane.stop_reasons(), vec![crate::config::DEFAULT_STOP_REASON]);
    }

    #[tokio::test]
    async fn test_empty_service() {
        let (_, tasks) = inspector(InMemoryControlPlane::new("demo-cluster"));

        let listed = tasks.list_running_tasks().await.unwrap();
        assert!(listed.is_empty());
        assert_eq!(listed.joined(), "");

        let dns = tasks.resolve_task_instance_dns("task/anything").await.unwrap();
        assert_eq!(
            dns,
            DnsResolution::TaskNotFound {
                task_arn: "task/anything".to_string()
            }
        );
        assert_eq!(dns.legacy_value(), NOT_FOUND_SENTINEL);
    }

    #[tokio::test]
    async fn test_list_contains_each_task_once() {
        let plane = (0..5).fold(InMemoryControlPlane::new("demo-cluster"), |plane, i| {
            plane.with_task(&format!("task/t{i}"), "demo-service", None)
        });
        let plane = plane.with_task("task/other", "other-service", None);
        let (_, tasks) = inspector(plane);

        let first = tasks.list_running_tasks().await.unwrap();
        assert_eq!(first.len(), 5);
        for i in 0..5 {
            assert!(first.contains(&format!("task/t{i}")));
        }
        assert!(!first.contains("task/other"));
        assert_eq!(first.joined(), "task/t0,task/t1,task/t2,task/t3,task/t4");

        let second = tasks.list_running_tasks().await.unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_task_arn_set_drops_repeats() {
        let set = TaskArnSet::from_arns(
            ["task/a", "task/b", "task/a"].into_iter().map(String::from),
        );
        assert_eq!(set.as_slice(), ["task/a", "task/b"]);
    }

    #[tokio::test]
    async fn test_list_failure_embeds_cause() {
        let plane = demo_plane().failing(
            Operation::ListTasks,
            ControlPlaneError::Transport("connection refused".to_string()),
        );
        let (_, tasks) = inspector(plane);

        let err = tasks.list_running_tasks().await.unwrap_err();
        assert!(matches!(
            err,
            InspectError::Provider {
                operation: Operation::ListTasks,
                ..
            }
        ));
        assert!(err.to_string().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_stop_failures_are_ignored_by_default() {
        let failures = [
            auth_error(),
            ControlPlaneError::Timeout("operation timeout (all attempts) after 30s".to_string()),
            ControlPlaneError::NotFound {
                code: "ClusterNotFoundException".to_string(),
                message: "Cluster not found.".to_string(),
            },
        ];

        for failure in failures {
            let (_, tasks) = inspector(demo_plane().failing(Operation::StopTask, failure.clone()));
            let outcome = tasks
                .stop_task(&tasks.cluster_arn(), "task/abc123")
                .await
                .unwrap();
            assert_eq!(
                outcome,
                StopOutcome::FailureIgnored {
                    task: "task/abc123".to_string(),
                    error: failure,
                }
            );
        }
    }

    #[tokio::test]
    async fn test_stop_failure_propagates_when_configured() {
        let plane = Arc::new(demo_plane().failing(Operation::StopTask, auth_error()));
        let tasks = ClusterTasks::new(
            plane,
            config().with_stop_failure_policy(StopFailurePolicy::Propagate),
        );

        let err = tasks
            .stop_task(&tasks.cluster_arn(), "task/abc123")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            InspectError::Provider {
                operation: Operation::StopTask,
                source: auth_error(),
            }
        );
    }

    #[tokio::test]
    async fn test_stop_with_wrong_cluster_is_ignored() {
        let (plane, tasks) = inspector(demo_plane());
        let other = ClusterArn::new("aws", "us-east-1", "123456789012", "elsewhere");

        let outcome = tasks.stop_task(&other, "task/abc123").await.unwrap();
        assert!(!outcome.is_stopping());
        assert_eq!(
            plane.task("task/abc123").unwrap().desired_status,
            TaskStatus::Running
        );
    }

    #[tokio::test]
    async fn test_no_public_dns_is_empty_not_error() {
        let plane = InMemoryControlPlane::new("demo-cluster")
            .with_task("task/abc123", "demo-service", Some("ci-1"))
            .with_container_instance("ci-1", Some("i-0001"))
            .with_instance("i-0001", None);
        let (_, tasks) = inspector(plane);

        let dns = tasks.resolve_task_instance_dns("task/abc123").await.unwrap();
        assert_eq!(
            dns,
            DnsResolution::NoPublicDns {
                task_arn: "task/abc123".to_string(),
                instance_id: "i-0001".to_string(),
            }
        );
        assert_eq!(dns.legacy_value(), "");
    }

    #[tokio::test]
    async fn test_dns_chain_failures_are_distinguishable() {
        let (_, tasks) = inspector(
            InMemoryControlPlane::new("demo-cluster").with_task("task/f1", "demo-service", None),
        );
        assert_eq!(
            tasks.resolve_task_instance_dns("task/f1").await.unwrap_err(),
            InspectError::NoContainerInstance {
                task_arn: "task/f1".to_string()
            }
        );

        let (_, tasks) = inspector(
            InMemoryControlPlane::new("demo-cluster").with_task(
                "task/abc123",
                "demo-service",
                Some("ci-gone"),
            ),
        );
        assert_eq!(
            tasks.resolve_task_instance_dns("task/abc123").await.unwrap_err(),
            InspectError::ContainerInstanceNotFound("ci-gone".to_string())
        );

        let (_, tasks) = inspector(
            InMemoryControlPlane::new("demo-cluster")
                .with_task("task/abc123", "demo-service", Some("ci-1"))
                .with_container_instance("ci-1", None),
        );
        assert_eq!(
            tasks.resolve_task_instance_dns("task/abc123").await.unwrap_err(),
            InspectError::MissingInstanceId("ci-1".to_string())
        );

        let (_, tasks) = inspector(
            InMemoryControlPlane::new("demo-cluster")
                .with_task("task/abc123", "demo-service", Some("ci-1"))
                .with_container_instance("ci-1", Some("i-0001")),
        );
        assert_eq!(
            tasks.resolve_task_instance_dns("task/abc123").await.unwrap_err(),
            InspectError::ComputeInstanceNotFound("i-0001".to_string())
        );

        let (plane, tasks) = inspector(demo_plane().failing(
            Operation::DescribeInstances,
            ControlPlaneError::Timeout("after 30s".to_string()),
        ));
        let err = tasks.resolve_task_instance_dns("task/abc123").await.unwrap_err();
        assert!(matches!(
            err,
            InspectError::Provider {
                operation: Operation::DescribeInstances,
                source: ControlPlaneError::Timeout(_),
            }
        ));
        assert_eq!(
            plane.calls(),
            vec![
                Operation::DescribeTasks,
                Operation::DescribeContainerInstances,
                Operation::DescribeInstances,
            ]
        );
    }

    #[tokio::test]
    async fn test_drain_stops_every_task() {
        let plane = demo_plane()
            .with_task("task/def456", "demo-service", Some("ci-1"))
            .with_task("task/zzz999", "other-service", Some("ci-1"));
        let (plane, tasks) = inspector(plane);

        let report = tasks.drain_service().await.unwrap();
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.stopped(), 2);
        assert_eq!(report.cluster_arn, tasks.cluster_arn());

        assert!(tasks.list_running_tasks().await.unwrap().is_empty());
        assert_eq!(
            plane.task("task/zzz999").unwrap().desired_status,
            TaskStatus::Running
        );
    }

    #[tokio::test]
    async fn test_drain_propagates_first_failure_when_configured() {
        let plane = Arc::new(
            demo_plane()
                .with_task("task/def456", "demo-service", Some("ci-1"))
                .failing(Operation::StopTask, auth_error()),
        );
        let tasks = ClusterTasks::new(
            plane.clone(),
            config().with_stop_failure_policy(StopFailurePolicy::Propagate),
        );

        assert!(tasks.drain_service().await.is_err());
        let stop_calls = plane
            .calls()
            .into_iter()
            .filter(|op| *op == Operation::StopTask)
            .count();
        assert_eq!(stop_calls, 1);
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = StopOutcome::FailureIgnored {
            task: "task/abc123".to_string(),
            error: auth_error(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["outcome"], "failure_ignored");
        assert_eq!(
            json["error"],
            "Authentication error: AccessDeniedException - not authorized to perform ecs:StopTask"
        );

        let json = serde_json::to_value(DnsResolution::TaskNotFound {
            task_arn: "task/x".to_string(),
        })
        .unwrap();
        assert_eq!(json["result"], "task_not_found");
    }
}
