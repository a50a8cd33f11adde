//! AWS SDK backed control plane.

use async_trait::async_trait;
use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_ecs::types::DesiredStatus;
use tracing::{debug, info};

use super::models::{classify_sdk_error, to_compute_instance, to_container_instance, to_task};
use crate::config::ClusterConfig;
use crate::providers::traits::{
    ComputeInstance, ContainerInstance, ControlPlane, ControlPlaneError, TaskRecord,
};

/// Page size for ListTasks.
const LIST_PAGE_SIZE: i32 = 100;

/// ECS + EC2 control plane.
#[derive(Clone, Debug)]
pub struct AwsControlPlane {
    ecs: aws_sdk_ecs::Client,
    ec2: aws_sdk_ec2::Client,
}

impl AwsControlPlane {
    /// Wrap already configured SDK clients.
    #[must_use]
    pub fn new(ecs: aws_sdk_ecs::Client, ec2: aws_sdk_ec2::Client) -> Self {
        Self { ecs, ec2 }
    }

    /// Load credentials from the default provider chain and apply the
    /// configured region and per-operation timeout.
    pub async fn from_config(config: &ClusterConfig) -> Self {
        let timeouts = TimeoutConfig::builder()
            .operation_timeout(config.request_timeout)
            .build();

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .timeout_config(timeouts)
            .load()
            .await;

        debug!(
            region = %config.region,
            timeout_secs = config.request_timeout.as_secs(),
            "Loaded AWS SDK configuration"
        );

        Self::new(
            aws_sdk_ecs::Client::new(&sdk_config),
            aws_sdk_ec2::Client::new(&sdk_config),
        )
    }
}

#[async_trait]
impl ControlPlane for AwsControlPlane {
    async fn list_tasks(
        &self,
        cluster: &str,
        service: &str,
    ) -> Result<Vec<String>, ControlPlaneError> {
        let mut task_arns = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let response = self
                .ecs
                .list_tasks()
                .cluster(cluster)
                .service_name(service)
                .desired_status(DesiredStatus::Running)
                .max_results(LIST_PAGE_SIZE)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| classify_sdk_error(&e))?;

            task_arns.extend(response.task_arns().iter().cloned());

            match response.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }

        debug!(cluster = %cluster, service = %service, count = task_arns.len(), "Listed tasks");
        Ok(task_arns)
    }

    async fn describe_tasks(
        &self,
        cluster: &str,
        tasks: &[String],
    ) -> Result<Vec<TaskRecord>, ControlPlaneError> {
        let response = self
            .ecs
            .describe_tasks()
            .cluster(cluster)
            .set_tasks(Some(tasks.to_vec()))
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;

        for failure in response.failures() {
            debug!(
                arn = failure.arn().unwrap_or_default(),
                reason = failure.reason().unwrap_or_default(),
                "DescribeTasks reported a failure"
            );
        }

        Ok(response.tasks().iter().map(to_task).collect())
    }

    async fn describe_container_instances(
        &self,
        cluster: &str,
        container_instances: &[String],
    ) -> Result<Vec<ContainerInstance>, ControlPlaneError> {
        let response = self
            .ecs
            .describe_container_instances()
            .cluster(cluster)
            .set_container_instances(Some(container_instances.to_vec()))
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;

        Ok(response
            .container_instances()
            .iter()
            .map(to_container_instance)
            .collect())
    }

    async fn describe_instances(
        &self,
        instance_ids: &[String],
    ) -> Result<Vec<ComputeInstance>, ControlPlaneError> {
        let response = self
            .ec2
            .describe_instances()
            .set_instance_ids(Some(instance_ids.to_vec()))
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;

        Ok(response
            .reservations()
            .iter()
            .flat_map(|r| r.instances())
            .map(to_compute_instance)
            .collect())
    }

    async fn stop_task(
        &self,
        cluster: &str,
        task: &str,
        reason: &str,
    ) -> Result<TaskRecord, ControlPlaneError> {
        info!(cluster = %cluster, task = %task, "Stopping task");

        let response = self
            .ecs
            .stop_task()
            .cluster(cluster)
            .task(task)
            .reason(reason)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;

        let record = response.task().map(to_task).ok_or_else(|| ControlPlaneError::Api {
            code: "EmptyResponse".to_string(),
            message: format!("StopTask returned no task for {task}"),
        })?;

        info!(
            task = %record.task_arn,
            last_status = %record.last_status,
            desired_status = %record.desired_status,
            "Task stop requested"
        );
        Ok(record)
    }
}
