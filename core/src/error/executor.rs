use thiserror::Error;

use crate::executor::types::StackExecutionReport;

/// Executor-specific errors for stack graph construction and execution
#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Duplicate unit ID: {0}")]
    DuplicateUnitId(String),

    #[error("Dependency not found: unit '{unit_id}' depends on '{missing_dep}'")]
    UnresolvedDependency { unit_id: String, missing_dep: String },

    #[error("Circular dependency detected: {cycle} (unresolved units: {})", units.join(", "))]
    CyclicDependency { units: Vec<String>, cycle: String },

    #[error("Invalid execution policy: {0}")]
    InvalidPolicy(String),

    #[error("Stack run {} cancelled by caller", report.run_id)]
    Cancelled { report: Box<StackExecutionReport> },
}

impl ExecutorError {
    /// Construction errors abort before any unit runs.
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            Self::DuplicateUnitId(_)
                | Self::UnresolvedDependency { .. }
                | Self::CyclicDependency { .. }
                | Self::InvalidPolicy(_)
        )
    }

    /// Partial report carried by a cancelled run.
    pub fn report(&self) -> Option<&StackExecutionReport> {
        match self {
            Self::Cancelled { report } => Some(report),
            _ => None,
        }
    }
}
