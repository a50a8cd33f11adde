//! AWS control plane.
//!
//! Implements the [`ControlPlane`](super::ControlPlane) trait on top of the
//! official SDK.
//!
//! ## Services
//!
//! - **ECS** (Elastic Container Service) - tasks, container instances, stop requests
//! - **EC2** (Elastic Compute Cloud) - public DNS of the hosts behind container instances

mod client;
mod models;

pub use client::AwsControlPlane;
pub use models::classify_sdk_error;
