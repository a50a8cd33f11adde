//! In-memory control plane for unit tests.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::traits::{
    short_id, ComputeInstance, ContainerInstance, ControlPlane, ControlPlaneError, Operation,
    TaskRecord, TaskStatus,
};

#[derive(Default)]
struct State {
    cluster: String,
    tasks: Vec<TaskRecord>,
    container_instances: Vec<ContainerInstance>,
    instances: Vec<ComputeInstance>,
    failures: HashMap<Operation, ControlPlaneError>,
    calls: Vec<Operation>,
    stop_reasons: Vec<String>,
}

/// Single-cluster fake that mimics ECS lookups by ARN or short id.
pub(crate) struct InMemoryControlPlane {
    state: Mutex<State>,
}

impl InMemoryControlPlane {
    pub(crate) fn new(cluster: &str) -> Self {
        Self {
            state: Mutex::new(State {
                cluster: cluster.to_string(),
                ..State::default()
            }),
        }
    }

    /// Add a running task of `service`, optionally placed on a container instance.
    pub(crate) fn with_task(
        self,
        task_arn: &str,
        service: &str,
        container_instance: Option<&str>,
    ) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let cluster_arn = format!(
                "arn:aws:ecs:us-east-1:123456789012:cluster/{}",
                state.cluster
            );
            let launch_type = if container_instance.is_some() {
                "EC2"
            } else {
                "FARGATE"
            };
            state.tasks.push(TaskRecord {
                task_arn: task_arn.to_string(),
                cluster_arn: Some(cluster_arn),
                service_name: Some(service.to_string()),
                container_instance_arn: container_instance.map(ToString::to_string),
                last_status: TaskStatus::Running,
                desired_status: TaskStatus::Running,
                launch_type: Some(launch_type.to_string()),
                started_at: None,
            });
        }
        self
    }

    pub(crate) fn with_container_instance(self, arn: &str, instance_id: Option<&str>) -> Self {
        self.state.lock().unwrap().container_instances.push(ContainerInstance {
            container_instance_arn: arn.to_string(),
            ec2_instance_id: instance_id.map(ToString::to_string),
        });
        self
    }

    pub(crate) fn with_instance(self, instance_id: &str, public_dns_name: Option<&str>) -> Self {
        self.state.lock().unwrap().instances.push(ComputeInstance {
            instance_id: instance_id.to_string(),
            public_dns_name: public_dns_name.map(ToString::to_string),
        });
        self
    }

    /// Make every call of `operation` fail with `error`.
    pub(crate) fn failing(self, operation: Operation, error: ControlPlaneError) -> Self {
        self.state.lock().unwrap().failures.insert(operation, error);
        self
    }

    pub(crate) fn task(&self, reference: &str) -> Option<TaskRecord> {
        let state = self.state.lock().unwrap();
        state.tasks.iter().find(|t| t.matches(reference)).cloned()
    }

    pub(crate) fn calls(&self) -> Vec<Operation> {
        self.state.lock().unwrap().calls.clone()
    }

    pub(crate) fn stop_reasons(&self) -> Vec<String> {
        self.state.lock().unwrap().stop_reasons.clone()
    }

    fn begin(&self, operation: Operation) -> Result<MutexGuard<'_, State>, ControlPlaneError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(operation);
        if let Some(error) = state.failures.get(&operation).cloned() {
            return Err(error);
        }
        Ok(state)
    }

    fn check_cluster(state: &State, cluster: &str) -> Result<(), ControlPlaneError> {
        if cluster == state.cluster || cluster.ends_with(&format!("cluster/{}", state.cluster)) {
            Ok(())
        } else {
            Err(ControlPlaneError::NotFound {
                code: "ClusterNotFoundException".to_string(),
                message: "Cluster not found.".to_string(),
            })
        }
    }
}

#[async_trait]
impl ControlPlane for InMemoryControlPlane {
    async fn list_tasks(
        &self,
        cluster: &str,
        service: &str,
    ) -> Result<Vec<String>, ControlPlaneError> {
        let state = self.begin(Operation::ListTasks)?;
        Self::check_cluster(&state, cluster)?;
        Ok(state
            .tasks
            .iter()
            .filter(|t| t.service_name.as_deref() == Some(service))
            .filter(|t| t.desired_status == TaskStatus::Running)
            .map(|t| t.task_arn.clone())
            .collect())
    }

    async fn describe_tasks(
        &self,
        cluster: &str,
        tasks: &[String],
    ) -> Result<Vec<TaskRecord>, ControlPlaneError> {
        let state = self.begin(Operation::DescribeTasks)?;
        Self::check_cluster(&state, cluster)?;
        Ok(tasks
            .iter()
            .filter_map(|r| state.tasks.iter().find(|t| t.matches(r)).cloned())
            .collect())
    }

    async fn describe_container_instances(
        &self,
        cluster: &str,
        container_instances: &[String],
    ) -> Result<Vec<ContainerInstance>, ControlPlaneError> {
        let state = self.begin(Operation::DescribeContainerInstances)?;
        Self::check_cluster(&state, cluster)?;
        Ok(container_instances
            .iter()
            .filter_map(|r| {
                state
                    .container_instances
                    .iter()
                    .find(|ci| short_id(&ci.container_instance_arn) == short_id(r))
                    .cloned()
            })
            .collect())
    }

    async fn describe_instances(
        &self,
        instance_ids: &[String],
    ) -> Result<Vec<ComputeInstance>, ControlPlaneError> {
        let state = self.begin(Operation::DescribeInstances)?;
        Ok(instance_ids
            .iter()
            .filter_map(|id| state.instances.iter().find(|i| &i.instance_id == id).cloned())
            .collect())
    }

    async fn stop_task(
        &self,
        cluster: &str,
        task: &str,
        reason: &str,
    ) -> Result<TaskRecord, ControlPlaneError> {
        let mut state = self.begin(Operation::StopTask)?;
        Self::check_cluster(&state, cluster)?;
        state.stop_reasons.push(reason.to_string());
        let record = state
            .tasks
            .iter_mut()
            .find(|t| t.matches(task))
            .ok_or_else(|| ControlPlaneError::Api {
                code: "InvalidParameterException".to_string(),
                message: "The referenced task was not found.".to_string(),
            })?;
        record.desired_status = TaskStatus::Stopped;
        record.last_status = TaskStatus::Stopping;
        Ok(record.clone())
    }
}
