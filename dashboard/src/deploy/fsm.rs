//! Step state machine for application deployments

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Deployment step, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStep {
    Cloning,
    Installing,
    Building,
    Starting,
}

impl DeploymentStep {
    pub const ALL: [DeploymentStep; 4] = [
        DeploymentStep::Cloning,
        DeploymentStep::Installing,
        DeploymentStep::Building,
        DeploymentStep::Starting,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentStep::Cloning => "cloning",
            DeploymentStep::Installing => "installing",
            DeploymentStep::Building => "building",
            DeploymentStep::Starting => "starting",
        }
    }
}

impl std::fmt::Display for DeploymentStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a single step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    Pending,
    InProgress,
    Success,
    Error,
}

impl StepStatus {
    /// Success and error are final for an attempt
    pub fn is_terminal(&self) -> bool {
        matches!(self, StepStatus::Success | StepStatus::Error)
    }
}

/// Per-step statuses
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepStatuses {
    pub cloning: StepStatus,
    pub installing: StepStatus,
    pub building: StepStatus,
    pub starting: StepStatus,
}

impl StepStatuses {
    pub fn get(&self, step: DeploymentStep) -> StepStatus {
        match step {
            DeploymentStep::Cloning => self.cloning,
            DeploymentStep::Installing => self.installing,
            DeploymentStep::Building => self.building,
            DeploymentStep::Starting => self.starting,
        }
    }

    fn set(&mut self, step: DeploymentStep, status: StepStatus) {
        match step {
            DeploymentStep::Cloning => self.cloning = status,
            DeploymentStep::Installing => self.installing = status,
            DeploymentStep::Building => self.building = status,
            DeploymentStep::Starting => self.starting = status,
        }
    }

    pub fn all_terminal(&self) -> bool {
        DeploymentStep::ALL.iter().all(|s| self.get(*s).is_terminal())
    }
}

/// Failure recorded against a step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepError {
    pub step: DeploymentStep,
    pub message: String,
}

/// Deployment status of one application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentStatus {
    pub current_step: DeploymentStep,
    pub steps: StepStatuses,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StepError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Default for DeploymentStatus {
    fn default() -> Self {
        Self {
            current_step: DeploymentStep::Cloning,
            steps: StepStatuses::default(),
            error: None,
            completed_at: None,
        }
    }
}

impl DeploymentStatus {
    /// Record a step outcome.
    ///
    /// An error with a message replaces the top-level error. The completion
    /// time is stamped once, the first time every step is terminal.
    pub fn apply(
        &mut self,
        step: DeploymentStep,
        status: StepStatus,
        message: Option<&str>,
        now: DateTime<Utc>,
    ) {
        self.current_step = step;
        self.steps.set(step, status);

        if status == StepStatus::Error {
            if let Some(message) = message {
                self.error = Some(StepError {
                    step,
                    message: message.to_string(),
                });
            }
        }

        if self.completed_at.is_none() && self.steps.all_terminal() {
            self.completed_at = Some(now);
        }
    }

    /// Whether every step reached a terminal status
    pub fn is_complete(&self) -> bool {
        self.steps.all_terminal()
    }
}
