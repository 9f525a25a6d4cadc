//! Fixed interpreter for the closed set of step validations.

use perceiver_structural::{query_selector, DocumentHandle, DomSnapshot};
use tracing::debug;

use crate::errors::Result;
use crate::model::{Validation, ValidationSpec, WorkflowStep};

/// Evaluate `validation` against the current document.
pub fn evaluate(validation: &Validation, snapshot: &DomSnapshot) -> Result<bool> {
    let passed = match validation {
        Validation::ElementExists { selector } => query_selector(snapshot, selector)?.is_some(),
        Validation::ElementContainsText { selector, text } => query_selector(snapshot, selector)?
            .map_or(false, |node| snapshot.text_content(node).contains(text.as_str())),
        Validation::UrlMatches { pattern } => pattern.is_match(&snapshot.url),
    };
    Ok(passed)
}

pub fn evaluate_spec(spec: &ValidationSpec, document: &dyn DocumentHandle) -> Result<bool> {
    let validation = spec.compile()?;
    evaluate(&validation, &document.snapshot())
}

/// A step without a validation is complete as soon as it is reached.
pub fn step_complete(step: &WorkflowStep, document: &dyn DocumentHandle) -> Result<bool> {
    let Some(spec) = step.validation.as_ref() else {
        return Ok(true);
    };
    let passed = evaluate_spec(spec, document)?;
    debug!(step = %step.id, kind = %spec.kind, passed, "step validation evaluated");
    Ok(passed)
}
