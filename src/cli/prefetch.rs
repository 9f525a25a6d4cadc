use anyhow::{anyhow, Result};
use clap::Args;
use guidepath_core_types::WorkflowContext;

use crate::cli::context::CliContext;
use crate::cli::output::{emit, OutputFormat};
use crate::cli::resolve::parse_scope;

#[derive(Args, Clone, Debug)]
pub struct PrefetchArgs {
    /// Step instruction
    #[arg(long)]
    pub instruction: String,

    /// Page the step will run on
    #[arg(long)]
    pub url: String,

    #[arg(long)]
    pub scope: Option<String>,

    /// Workflow name sent as context
    #[arg(long)]
    pub workflow: Option<String>,
}

/// Ask the backend element finder about a page that is not loaded yet.
pub async fn cmd_prefetch(args: PrefetchArgs, ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let app = ctx.app_context().await?;
    let backend = app
        .backend()
        .ok_or_else(|| anyhow!("backend is disabled; set backend.enabled or GUIDEPATH_BACKEND_URL"))?;
    let scope = parse_scope(args.scope.as_deref())?;
    let context = args.workflow.map(|name| WorkflowContext {
        workflow_name: Some(name),
        current_step: args.instruction.clone(),
        ..WorkflowContext::default()
    });

    let hint = backend
        .find_element(&args.instruction, context.as_ref(), &args.url, &scope)
        .await?;
    emit(&hint, &output, |hint| match &hint.selector {
        Some(selector) => println!(
            "{selector} (confidence {:.2}, source {})",
            hint.confidence,
            hint.source.as_deref().unwrap_or("unknown")
        ),
        None => println!("Backend has no suggestion for '{}'", args.instruction),
    })
}
