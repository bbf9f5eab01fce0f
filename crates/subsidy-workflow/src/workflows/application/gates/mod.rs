mod requirements;
mod rules;

pub use requirements::{GateRequirement, GateRequirementTable, REQUIRED_CONTROL_PHOTOS};

use super::domain::{ArtifactStatus, WorkflowState};
use serde::{Deserialize, Serialize};

/// Stateless evaluator that applies the requirement table to an application's artifacts.
#[derive(Debug, Clone)]
pub struct GateEvaluator {
    table: GateRequirementTable,
}

impl GateEvaluator {
    pub fn new(table: GateRequirementTable) -> Self {
        Self { table }
    }

    /// Check every requirement for `target`, collecting all failures rather than the first.
    pub fn evaluate(&self, target: WorkflowState, artifacts: &ArtifactStatus) -> GateVerdict {
        let reasons: Vec<String> = self
            .table
            .requirements_for(target)
            .iter()
            .filter_map(|requirement| rules::check(requirement, artifacts))
            .collect();

        GateVerdict {
            allowed: reasons.is_empty(),
            reasons,
        }
    }

    pub fn table(&self) -> &GateRequirementTable {
        &self.table
    }
}

impl Default for GateEvaluator {
    fn default() -> Self {
        Self::new(GateRequirementTable::standard(4))
    }
}

/// Outcome of a gate evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateVerdict {
    pub allowed: bool,
    pub reasons: Vec<String>,
}
