//! Control plane abstractions.
//!
//! This module defines the provider trait and the records it hands back.

pub mod aws;
#[cfg(test)]
pub(crate) mod memory;
mod traits;

pub use traits::{
    service_from_group, short_id, ComputeInstance, ContainerInstance, ControlPlane,
    ControlPlaneError, Operation, TaskRecord, TaskStatus,
};

// Re-export provider clients
pub use aws::AwsControlPlane;
