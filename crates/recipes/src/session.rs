//! Step navigation for one running workflow.

use std::sync::Arc;

use guidepath_core_types::{ResolutionTicket, StepClock, StepIntent, WorkflowContext};
use serde::Serialize;
use tracing::debug;

use crate::errors::{RecipeErrorKind, Result};
use crate::model::{Workflow, WorkflowStep};

/// Cursor over a validated workflow.
///
/// Every move bumps the shared [`StepClock`], so results requested for an
/// earlier step are recognised as stale when they arrive.
#[derive(Debug)]
pub struct WorkflowSession {
    workflow: Arc<Workflow>,
    index: usize,
    history: Vec<usize>,
    clock: StepClock,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StepPosition {
    pub index: usize,
    pub total: usize,
    pub step_id: String,
    pub instruction: String,
}

impl WorkflowSession {
    pub fn start(workflow: Arc<Workflow>, clock: StepClock) -> Result<Self> {
        workflow.validate()?;
        clock.advance();
        debug!(workflow = %workflow.id, "workflow session started");
        Ok(Self {
            workflow,
            index: 0,
            history: vec![0],
            clock,
        })
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    pub fn clock(&self) -> &StepClock {
        &self.clock
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current(&self) -> &WorkflowStep {
        &self.workflow.steps[self.index]
    }

    pub fn is_last(&self) -> bool {
        self.index + 1 == self.workflow.steps.len()
    }

    /// Indices visited, oldest first.
    pub fn history(&self) -> &[usize] {
        &self.history
    }

    pub fn position(&self) -> StepPosition {
        let step = self.current();
        StepPosition {
            index: self.index,
            total: self.workflow.steps.len(),
            step_id: step.id.clone(),
            instruction: step.instruction.clone(),
        }
    }

    /// Advance; `None` when already on the last step.
    pub fn next(&mut self) -> Option<&WorkflowStep> {
        if self.is_last() {
            return None;
        }
        self.move_to(self.index + 1);
        Some(self.current())
    }

    /// Go back; `None` when already on the first step.
    pub fn previous(&mut self) -> Option<&WorkflowStep> {
        if self.index == 0 {
            return None;
        }
        self.move_to(self.index - 1);
        Some(self.current())
    }

    pub fn jump(&mut self, index: usize) -> Result<&WorkflowStep> {
        let len = self.workflow.steps.len();
        if index >= len {
            return Err(RecipeErrorKind::StepOutOfRange { index, len }.into());
        }
        self.move_to(index);
        Ok(self.current())
    }

    pub fn intent(&self) -> StepIntent {
        self.current().intent()
    }

    /// Ticket for a resolution of the current step.
    pub fn ticket(&self) -> ResolutionTicket {
        self.clock.ticket(self.current().id.clone())
    }

    /// Previous, current and next instructions for the disambiguation prompt.
    pub fn context(&self) -> WorkflowContext {
        let steps = &self.workflow.steps;
        WorkflowContext {
            workflow_name: Some(self.workflow.name.clone()),
            previous_steps: steps[..self.index]
                .iter()
                .map(|step| step.instruction.clone())
                .collect(),
            current_step: self.current().instruction.clone(),
            next_step: steps.get(self.index + 1).map(|step| step.instruction.clone()),
        }
    }

    fn move_to(&mut self, index: usize) {
        self.index = index;
        self.history.push(index);
        let generation = self.clock.advance();
        debug!(
            workflow = %self.workflow.id,
            step = %self.current().id,
            generation,
            "moved to step"
        );
    }
}
