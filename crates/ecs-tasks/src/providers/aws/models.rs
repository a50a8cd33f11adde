//! Conversions from SDK shapes and errors to our types.

use aws_sdk_ec2::types::Instance as Ec2Instance;
use aws_sdk_ecs::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_ecs::primitives::DateTime as SmithyDateTime;
use aws_sdk_ecs::types::{ContainerInstance as EcsContainerInstance, Task as EcsTask};
use chrono::{DateTime, Utc};

use crate::providers::traits::{
    service_from_group, ComputeInstance, ContainerInstance, ControlPlaneError, TaskRecord,
    TaskStatus,
};

/// Error codes meaning the caller's credentials were rejected.
const AUTH_CODES: &[&str] = &[
    "AccessDenied",
    "AccessDeniedException",
    "AuthFailure",
    "ExpiredToken",
    "ExpiredTokenException",
    "InvalidClientTokenId",
    "InvalidSignatureException",
    "MissingAuthenticationToken",
    "SignatureDoesNotMatch",
    "UnauthorizedOperation",
    "UnrecognizedClientException",
];

/// Map an SDK failure to a [`ControlPlaneError`].
///
/// ECS and EC2 share the same smithy error types, so this works for both.
pub fn classify_sdk_error<E, R>(error: &SdkError<E, R>) -> ControlPlaneError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let context = DisplayErrorContext(error).to_string();
    match error {
        SdkError::TimeoutError(_) => ControlPlaneError::Timeout(context),
        SdkError::DispatchFailure(failure) if failure.is_timeout() => {
            ControlPlaneError::Timeout(context)
        }
        SdkError::DispatchFailure(_) => ControlPlaneError::Transport(context),
        SdkError::ConstructionFailure(_) => ControlPlaneError::Config(context),
        _ => match error.as_service_error() {
            Some(service) => {
                let code = service.code().unwrap_or("Unknown").to_string();
                let message = service.message().map_or(context, ToString::to_string);
                classify_code(code, message)
            }
            None => ControlPlaneError::Api {
                code: "MalformedResponse".to_string(),
                message: context,
            },
        },
    }
}

fn classify_code(code: String, message: String) -> ControlPlaneError {
    if AUTH_CODES.contains(&code.as_str()) {
        ControlPlaneError::Auth { code, message }
    } else if code.ends_with("NotFoundException") || code.ends_with(".NotFound") {
        ControlPlaneError::NotFound { code, message }
    } else {
        ControlPlaneError::Api { code, message }
    }
}

/// Convert an ECS task to our type.
pub(crate) fn to_task(task: &EcsTask) -> TaskRecord {
    TaskRecord {
        task_arn: task.task_arn().unwrap_or_default().to_string(),
        cluster_arn: task.cluster_arn().map(ToString::to_string),
        service_name: task.group().and_then(service_from_group),
        container_instance_arn: task.container_instance_arn().map(ToString::to_string),
        last_status: task
            .last_status()
            .map_or(TaskStatus::Unknown, TaskStatus::from_provider),
        desired_status: task
            .desired_status()
            .map_or(TaskStatus::Unknown, TaskStatus::from_provider),
        launch_type: task.launch_type().map(|lt| lt.as_str().to_string()),
        started_at: task.started_at().and_then(to_utc),
    }
}

/// Convert an ECS container instance to our type.
pub(crate) fn to_container_instance(instance: &EcsContainerInstance) -> ContainerInstance {
    ContainerInstance {
        container_instance_arn: instance
            .container_instance_arn()
            .unwrap_or_default()
            .to_string(),
        ec2_instance_id: instance
            .ec2_instance_id()
            .filter(|id| !id.is_empty())
            .map(ToString::to_string),
    }
}

/// Convert an EC2 instance to our type.
///
/// EC2 reports a missing public DNS name as an empty string.
pub(crate) fn to_compute_instance(instance: &Ec2Instance) -> ComputeInstance {
    ComputeInstance {
        instance_id: instance.instance_id().unwrap_or_default().to_string(),
        public_dns_name: instance
            .public_dns_name()
            .filter(|dns| !dns.is_empty())
            .map(ToString::to_string),
    }
}

fn to_utc(timestamp: &SmithyDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(timestamp.secs(), timestamp.subsec_nanos())
}
