use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use guidepath_cli::service::{GuideReply, GuideRequest, GuideService, DEFAULT_BUFFER};
use guidepath_core_types::StepClock;
use guidepath_recipes::{
    optimize, step_complete, RunStats, Workflow, WorkflowCatalog, WorkflowFormat, WorkflowSession,
};
use serde::Serialize;
use tokio::fs;

use crate::cli::context::CliContext;
use crate::cli::output::{emit, OutputFormat};
use crate::cli::resolve::{load_page, parse_scope};

#[derive(Args, Clone, Debug)]
pub struct WorkflowArgs {
    #[command(subcommand)]
    pub action: WorkflowAction,
}

#[derive(Subcommand, Clone, Debug)]
pub enum WorkflowAction {
    /// Check workflow files (YAML or JSON)
    Validate {
        #[arg(required = true, value_name = "FILE")]
        files: Vec<PathBuf>,
    },

    /// Suggest authoring improvements
    Optimize {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Run statistics as JSON: {total_runs, success_rate, average_duration_ms}
        #[arg(long, value_name = "FILE")]
        stats: Option<PathBuf>,
    },

    /// Re-encode a workflow as JSON or YAML
    Convert {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[arg(long, default_value = "yaml")]
        to: WorkflowFormat,
    },

    /// Walk every step against a page fixture
    Guide {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[arg(long, value_name = "FILE")]
        page: PathBuf,

        #[arg(long)]
        scope: Option<String>,
    },
}

#[derive(Debug, Serialize)]
struct StepOutcome {
    step_id: String,
    instruction: String,
    selector: Option<String>,
    strategy: Option<String>,
    complete: bool,
}

pub async fn cmd_workflow(args: WorkflowArgs, ctx: &CliContext, output: OutputFormat) -> Result<()> {
    match args.action {
        WorkflowAction::Validate { files } => {
            let catalog = WorkflowCatalog::new();
            let mut failures = 0usize;
            for file in &files {
                match load_workflow(file).and_then(|wf| catalog.create(wf).map_err(Into::into)) {
                    Ok(workflow) => println!(
                        "{}: ok ({} '{}', {} step(s))",
                        file.display(),
                        workflow.id,
                        workflow.name,
                        workflow.steps.len()
                    ),
                    Err(err) => {
                        failures += 1;
                        println!("{}: {err:#}", file.display());
                    }
                }
            }
            if failures > 0 {
                bail!("{failures} of {} workflow file(s) are invalid", files.len());
            }
        }
        WorkflowAction::Optimize { file, stats } => {
            let workflow = load_workflow(&file)?;
            let stats = match stats {
                Some(path) => {
                    let raw = fs::read_to_string(&path)
                        .await
                        .with_context(|| format!("reading {}", path.display()))?;
                    Some(
                        serde_json::from_str::<RunStats>(&raw)
                            .with_context(|| format!("parsing {}", path.display()))?,
                    )
                }
                None => None,
            };
            let hints = optimize(&workflow, stats.as_ref());
            emit(&hints, &output, |hints| {
                if hints.is_empty() {
                    println!("No suggestions for {}", workflow.id);
                }
                for hint in hints {
                    println!("- {}", hint.message);
                }
            })?;
        }
        WorkflowAction::Convert { file, to } => {
            let catalog = WorkflowCatalog::new();
            let workflow = catalog.create(load_workflow(&file)?)?;
            print!("{}", catalog.export(&workflow.id, to)?);
        }
        WorkflowAction::Guide { file, page, scope } => {
            let workflow = Arc::new(load_workflow(&file)?);
            let document = load_page(&page).await?;
            let app = ctx.app_context().await?;
            let session = WorkflowSession::start(Arc::clone(&workflow), StepClock::new())?;
            let (handle, task) =
                GuideService::new(Arc::clone(app.locator()), Arc::clone(&document))
                    .with_session(session)
                    .with_scope(parse_scope(scope.as_deref())?)
                    .spawn(DEFAULT_BUFFER);

            let mut outcomes = Vec::with_capacity(workflow.steps.len());
            for step in &workflow.steps {
                let reply = handle
                    .send(GuideRequest::Resolve {
                        instruction: None,
                        target: None,
                        selector: None,
                    })
                    .await?;
                let (selector, strategy) = match reply {
                    GuideReply::Resolved { result } => (
                        result.selector().map(str::to_string),
                        result.strategy().map(|kind| kind.name().to_string()),
                    ),
                    GuideReply::Error { message } => bail!("step {} failed: {message}", step.id),
                    _ => (None, None),
                };
                outcomes.push(StepOutcome {
                    step_id: step.id.clone(),
                    instruction: step.instruction.clone(),
                    selector,
                    strategy,
                    complete: step_complete(step, document.as_ref())?,
                });
                handle.send(GuideRequest::Advance).await?;
            }
            drop(handle);
            task.await.context("guide service task panicked")?;

            emit(&outcomes, &output, |outcomes| {
                for outcome in outcomes {
                    let found = match (&outcome.selector, &outcome.strategy) {
                        (Some(selector), Some(strategy)) => format!("{selector} ({strategy})"),
                        _ => "not found".to_string(),
                    };
                    let check = if outcome.complete { "done" } else { "pending" };
                    println!("[{check:<7}] {}: {found}", outcome.instruction);
                }
            })?;
        }
    }

    Ok(())
}

fn load_workflow(path: &Path) -> Result<Workflow> {
    Workflow::load(path).with_context(|| format!("loading workflow {}", path.display()))
}
