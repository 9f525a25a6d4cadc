use serde::{Deserialize, Serialize};

use crate::model::Workflow;

pub const MIN_SELECTORS: usize = 2;
const LOW_SUCCESS_RATE: f64 = 80.0;
const SLOW_COMPLETION_MS: u64 = 600_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationKind {
    LowSuccessRate,
    SlowCompletion,
    InsufficientSelectors,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Optimization {
    pub kind: OptimizationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    pub message: String,
}

/// Aggregated outcomes of past runs, when the caller has them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub total_runs: u64,
    /// Percentage, 0..=100.
    pub success_rate: f64,
    pub average_duration_ms: u64,
}

/// Authoring hints for a workflow.
pub fn optimize(workflow: &Workflow, stats: Option<&RunStats>) -> Vec<Optimization> {
    let mut hints = Vec::new();

    if let Some(stats) = stats.filter(|s| s.total_runs > 0) {
        if stats.success_rate < LOW_SUCCESS_RATE {
            hints.push(Optimization {
                kind: OptimizationKind::LowSuccessRate,
                step_id: None,
                message: "Consider adding more robust selectors or validation steps".into(),
            });
        }
        if stats.average_duration_ms > SLOW_COMPLETION_MS {
            hints.push(Optimization {
                kind: OptimizationKind::SlowCompletion,
                step_id: None,
                message: "Workflow takes too long, consider breaking into smaller workflows".into(),
            });
        }
    }

    for step in &workflow.steps {
        if step.selectors.len() < MIN_SELECTORS {
            hints.push(Optimization {
                kind: OptimizationKind::InsufficientSelectors,
                step_id: Some(step.id.clone()),
                message: format!("Step \"{}\" should have multiple selector fallbacks", step.id),
            });
        }
    }

    hints
}
