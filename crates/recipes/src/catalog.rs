use chrono::Utc;
use dashmap::DashMap;
use tracing::info;

use crate::errors::{RecipeErrorKind, Result};
use crate::model::{default_version, generate_id, Workflow, WorkflowFormat};

/// In-memory registry of validated workflows.
#[derive(Default)]
pub struct WorkflowCatalog {
    workflows: DashMap<String, Workflow>,
}

impl WorkflowCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and store; a workflow with the same id is replaced.
    pub fn create(&self, workflow: Workflow) -> Result<Workflow> {
        let now = Utc::now();
        let mut workflow = workflow.normalized();
        workflow.created_at = Some(now);
        workflow.updated_at = Some(now);
        workflow.validate()?;
        info!(workflow = %workflow.id, steps = workflow.steps.len(), "workflow stored");
        self.workflows.insert(workflow.id.clone(), workflow.clone());
        Ok(workflow)
    }

    pub fn get(&self, id: &str) -> Option<Workflow> {
        self.workflows.get(id).map(|entry| entry.value().clone())
    }

    pub fn list(&self, platform: Option<&str>) -> Vec<Workflow> {
        let mut items: Vec<Workflow> = self
            .workflows
            .iter()
            .filter(|entry| platform.map_or(true, |p| entry.value().platform == p))
            .map(|entry| entry.value().clone())
            .collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        items
    }

    /// Apply `edit` to a copy; the stored workflow changes only if the
    /// result still validates.
    pub fn update<F>(&self, id: &str, edit: F) -> Result<Workflow>
    where
        F: FnOnce(&mut Workflow),
    {
        let mut entry = self
            .workflows
            .get_mut(id)
            .ok_or_else(|| RecipeErrorKind::NotFound(id.to_string()))?;
        let mut updated = entry.value().clone();
        edit(&mut updated);
        updated.id = id.to_string();
        updated.updated_at = Some(Utc::now());
        updated.validate()?;
        *entry.value_mut() = updated.clone();
        Ok(updated)
    }

    pub fn clone_workflow(&self, id: &str, name: Option<&str>) -> Result<Workflow> {
        let original = self
            .get(id)
            .ok_or_else(|| RecipeErrorKind::NotFound(id.to_string()))?;
        let mut copy = original.clone();
        copy.name = name
            .map(str::to_string)
            .unwrap_or_else(|| format!("{} (Copy)", original.name));
        copy.id = generate_id(&copy.name);
        copy.version = default_version();
        copy.parent_id = Some(original.id);
        self.create(copy)
    }

    pub fn remove(&self, id: &str) -> Option<Workflow> {
        self.workflows.remove(id).map(|(_, workflow)| workflow)
    }

    pub fn export(&self, id: &str, format: WorkflowFormat) -> Result<String> {
        let workflow = self
            .get(id)
            .ok_or_else(|| RecipeErrorKind::NotFound(id.to_string()))?;
        workflow.to_format(format)
    }

    pub fn import(&self, raw: &str, format: WorkflowFormat) -> Result<Workflow> {
        let workflow = match format {
            WorkflowFormat::Json => Workflow::from_json_str(raw)?,
            WorkflowFormat::Yaml => Workflow::from_yaml_str(raw)?,
        };
        self.create(workflow)
    }

    pub fn len(&self) -> usize {
        self.workflows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workflows.is_empty()
    }
}
