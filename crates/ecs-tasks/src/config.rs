//! Cluster configuration.
//!
//! Everything deployment specific (cluster, service, account, region) comes
//! from flags or the environment. The cluster ARN is assembled from those
//! parts, never written out as a literal.

use std::time::Duration;

use clap::{Args, ValueEnum};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default per-operation timeout for control plane calls.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Reason recorded on tasks stopped by this tool.
pub const DEFAULT_STOP_REASON: &str = "Stopped by ecs-tasks";

/// Errors raised while validating configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required value was empty.
    #[error("{0} must not be empty")]
    Empty(&'static str),

    /// Account id is not a 12 digit number.
    #[error("Invalid account id '{0}': expected 12 digits")]
    AccountId(String),

    /// Timeout of zero seconds.
    #[error("Request timeout must be greater than zero")]
    ZeroTimeout,
}

/// What to do when a stop request fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum StopFailurePolicy {
    /// Log the failure and report it as an ignored outcome.
    #[default]
    Ignore,
    /// Return the failure to the caller.
    Propagate,
}

impl std::fmt::Display for StopFailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ignore => write!(f, "ignore"),
            Self::Propagate => write!(f, "propagate"),
        }
    }
}

/// Fully-qualified ECS cluster ARN.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterArn(String);

impl ClusterArn {
    /// Build `arn:{partition}:ecs:{region}:{account_id}:cluster/{cluster_name}`.
    #[must_use]
    pub fn new(partition: &str, region: &str, account_id: &str, cluster_name: &str) -> Self {
        Self(format!(
            "arn:{partition}:ecs:{region}:{account_id}:cluster/{cluster_name}"
        ))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ClusterArn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validated configuration for one cluster/service pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterConfig {
    pub cluster_name: String,
    pub service_name: String,
    pub account_id: String,
    pub region: String,
    pub partition: String,
    pub request_timeout: Duration,
    pub stop_failure_policy: StopFailurePolicy,
    pub stop_reason: String,
}

impl ClusterConfig {
    /// Create a configuration with default partition, timeout and stop policy.
    ///
    /// # Errors
    /// Returns error if a value is empty or the account id is malformed.
    pub fn new(
        cluster_name: impl Into<String>,
        service_name: impl Into<String>,
        account_id: impl Into<String>,
        region: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            cluster_name: cluster_name.into(),
            service_name: service_name.into(),
            account_id: account_id.into(),
            region: region.into(),
            partition: "aws".to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            stop_failure_policy: StopFailurePolicy::default(),
            stop_reason: DEFAULT_STOP_REASON.to_string(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Set the stop failure policy.
    #[must_use]
    pub fn with_stop_failure_policy(mut self, policy: StopFailurePolicy) -> Self {
        self.stop_failure_policy = policy;
        self
    }

    /// Set the per-operation timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Check every field.
    ///
    /// # Errors
    /// Returns the first invalid field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("cluster name", &self.cluster_name),
            ("service name", &self.service_name),
            ("region", &self.region),
            ("partition", &self.partition),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Empty(name));
            }
        }

        if self.account_id.len() != 12 || !self.account_id.chars().all(|c| c.is_ascii_digit()) {
            return Err(ConfigError::AccountId(self.account_id.clone()));
        }

        if self.request_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }

        Ok(())
    }

    /// ARN of the configured cluster.
    #[must_use]
    pub fn cluster_arn(&self) -> ClusterArn {
        ClusterArn::new(
            &self.partition,
            &self.region,
            &self.account_id,
            &self.cluster_name,
        )
    }
}

/// Command line / environment view of [`ClusterConfig`].
#[derive(Debug, Clone, Args)]
pub struct ClusterArgs {
    /// ECS cluster name (or set `INFRA_CLUSTER` env var).
    #[arg(long, env = "INFRA_CLUSTER")]
    pub cluster: String,

    /// ECS service name (or set `ECR_REPOSITORY` env var).
    #[arg(long, env = "ECR_REPOSITORY")]
    pub service: String,

    /// AWS account id owning the cluster (or set `AWS_ACCOUNT_ID` env var).
    #[arg(long, env = "AWS_ACCOUNT_ID")]
    pub account_id: String,

    /// AWS region (or set `AWS_REGION` env var).
    #[arg(long, env = "AWS_REGION")]
    pub region: String,

    /// ARN partition (aws, aws-cn, aws-us-gov).
    #[arg(long, env = "AWS_PARTITION", default_value = "aws")]
    pub partition: String,

    /// Per-operation timeout in seconds.
    #[arg(long = "timeout", env = "ECS_TASKS_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// Whether failed stop requests are ignored or returned as errors.
    #[arg(long, env = "ECS_TASKS_STOP_FAILURES", value_enum, default_value_t = StopFailurePolicy::Ignore)]
    pub stop_failures: StopFailurePolicy,

    /// Reason recorded on stopped tasks.
    #[arg(long, env = "ECS_TASKS_STOP_REASON", default_value = DEFAULT_STOP_REASON)]
    pub stop_reason: String,
}

impl TryFrom<ClusterArgs> for ClusterConfig {
    type Error = ConfigError;

    fn try_from(args: ClusterArgs) -> Result<Self, Self::Error> {
        let config = Self {
            cluster_name: args.cluster,
            service_name: args.service,
            account_id: args.account_id,
            region: args.region,
            partition: args.partition,
            request_timeout: Duration::from_secs(args.timeout_secs),
            stop_failure_policy: args.stop_failures,
            stop_reason: args.stop_reason,
        };
        config.validate()?;
        Ok(config)
    }
}
