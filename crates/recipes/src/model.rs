use std::path::Path;

use chrono::{DateTime, Utc};
use guidepath_core_types::StepIntent;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::{RecipeError, RecipeErrorKind, Result};

pub const DEFAULT_VERSION: &str = "1.0.0";

/// An author-defined sequence of guided steps.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub platform: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub steps: Vec<WorkflowStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

pub(crate) fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    #[serde(default)]
    pub id: String,
    /// Short machine-friendly intent, e.g. `create_playlist`.
    #[serde(default)]
    pub intent: String,
    #[serde(default)]
    pub instruction: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Literal selector hints, tried before any scoring.
    #[serde(default)]
    pub selectors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationSpec>,
}

impl WorkflowStep {
    pub fn new(
        id: impl Into<String>,
        intent: impl Into<String>,
        instruction: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            intent: intent.into(),
            instruction: instruction.into(),
            target: None,
            selectors: Vec::new(),
            validation: None,
        }
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selectors.push(selector.into());
        self
    }

    pub fn with_validation(mut self, validation: ValidationSpec) -> Self {
        self.validation = Some(validation);
        self
    }

    /// What the resolver needs to find this step's element.
    pub fn intent(&self) -> StepIntent {
        StepIntent {
            id: self.id.clone(),
            instruction: self.instruction.clone(),
            target: self.target.clone(),
            selector_hints: self.selectors.clone(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("id", &self.id),
            ("intent", &self.intent),
            ("instruction", &self.instruction),
        ] {
            if value.trim().is_empty() {
                return Err(RecipeErrorKind::StepMissingField {
                    step: self.id.clone(),
                    field: field.to_string(),
                }
                .into());
            }
        }
        if let Some(spec) = self.validation.as_ref() {
            spec.compile()?;
        }
        Ok(())
    }
}

/// Stored form of a step validation, as authors write it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationSpec {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl ValidationSpec {
    pub fn element_exists(selector: impl Into<String>) -> Self {
        Self {
            kind: "element_exists".into(),
            selector: Some(selector.into()),
            ..Self::default()
        }
    }

    pub fn element_contains_text(selector: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            kind: "element_contains_text".into(),
            selector: Some(selector.into()),
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn url_matches(pattern: impl Into<String>) -> Self {
        Self {
            kind: "url_matches".into(),
            pattern: Some(pattern.into()),
            ..Self::default()
        }
    }

    /// Turn the stored spec into one of the closed validation kinds.
    ///
    /// `custom` and unknown kinds are rejected; stored data never runs as code.
    pub fn compile(&self) -> Result<Validation> {
        let required = |value: &Option<String>, field: &str| {
            value
                .as_deref()
                .filter(|v| !v.trim().is_empty())
                .map(str::to_string)
                .ok_or_else(|| {
                    RecipeError::invalid_input(format!("{} validation requires '{field}'", self.kind))
                })
        };

        match self.kind.as_str() {
            "element_exists" => Ok(Validation::ElementExists {
                selector: required(&self.selector, "selector")?,
            }),
            "element_contains_text" => Ok(Validation::ElementContainsText {
                selector: required(&self.selector, "selector")?,
                text: required(&self.text, "text")?,
            }),
            "url_matches" => {
                let pattern = required(&self.pattern, "pattern")?;
                Ok(Validation::UrlMatches {
                    pattern: Regex::new(&pattern)?,
                })
            }
            other => Err(RecipeErrorKind::InvalidValidation(other.to_string()).into()),
        }
    }
}

/// A validated step check, evaluated by [`crate::interpreter`].
#[derive(Clone, Debug)]
pub enum Validation {
    ElementExists { selector: String },
    ElementContainsText { selector: String, text: String },
    UrlMatches { pattern: Regex },
}

impl Workflow {
    pub fn new(name: impl Into<String>, platform: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: generate_id(&name),
            name,
            platform: platform.into(),
            description: None,
            version: default_version(),
            parent_id: None,
            steps: Vec::new(),
            created_at: None,
            updated_at: None,
        }
    }

    pub fn with_step(mut self, step: WorkflowStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Fill a missing id from the name.
    pub fn normalized(mut self) -> Self {
        if self.id.trim().is_empty() {
            self.id = generate_id(&self.name);
        }
        if self.version.trim().is_empty() {
            self.version = default_version();
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("id", &self.id),
            ("name", &self.name),
            ("platform", &self.platform),
        ] {
            if value.trim().is_empty() {
                return Err(RecipeErrorKind::MissingField(field.to_string()).into());
            }
        }
        if self.steps.is_empty() {
            return Err(RecipeErrorKind::NoSteps.into());
        }
        for step in &self.steps {
            step.validate()?;
        }
        Ok(())
    }

    pub fn step(&self, id: &str) -> Option<&WorkflowStep> {
        self.steps.iter().find(|step| step.id == id)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        Self::accept(serde_json::from_str(raw)?)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        Self::accept(serde_yaml::from_str(raw)?)
    }

    /// Load by extension: `.yaml`/`.yml` as YAML, anything else as JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&raw),
            _ => Self::from_json_str(&raw),
        }
    }

    pub fn to_format(&self, format: WorkflowFormat) -> Result<String> {
        Ok(match format {
            WorkflowFormat::Json => serde_json::to_string_pretty(self)?,
            WorkflowFormat::Yaml => serde_yaml::to_string(self)?,
        })
    }

    fn accept(workflow: Workflow) -> Result<Self> {
        let workflow = workflow.normalized();
        workflow.validate()?;
        Ok(workflow)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkflowFormat {
    Json,
    Yaml,
}

impl std::str::FromStr for WorkflowFormat {
    type Err = RecipeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(WorkflowFormat::Json),
            "yaml" | "yml" => Ok(WorkflowFormat::Yaml),
            other => Err(RecipeErrorKind::UnsupportedFormat(other.to_string()).into()),
        }
    }
}

/// Lowercase slug: non-alphanumeric runs become `_`, edges trimmed.
pub fn generate_id(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_sep = false;
    for ch in name.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            slug.push(ch);
        } else {
            pending_sep = true;
        }
    }
    slug
}
