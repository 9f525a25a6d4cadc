use std::path::{Path, PathBuf};
use std::sync::Arc;

use action_locator::{AttemptOutcome, ResolutionReport, ResolutionResult, ResolveRequest};
use anyhow::{Context, Result};
use clap::Args;
use guidepath_core_types::{PatternScope, StepIntent};
use perceiver_structural::{DocumentHandle, PageSpec, StaticDocument};
use tokio::fs;

use crate::cli::context::CliContext;
use crate::cli::output::{emit, OutputFormat};

#[derive(Args, Clone, Debug)]
pub struct ResolveArgs {
    /// Serialized page fixture (JSON)
    #[arg(long, value_name = "FILE")]
    pub page: PathBuf,

    /// Step instruction, e.g. "Click the Save button"
    #[arg(long)]
    pub instruction: String,

    /// Explicit target label
    #[arg(long)]
    pub target: Option<String>,

    /// Author selector hint (repeatable)
    #[arg(long = "selector", value_name = "SELECTOR")]
    pub selectors: Vec<String>,

    /// Pattern scope as `page` or `company/page`; global when omitted
    #[arg(long)]
    pub scope: Option<String>,

    /// Print every strategy attempt
    #[arg(long)]
    pub report: bool,
}

#[derive(Args, Clone, Debug)]
pub struct TeachArgs {
    /// Serialized page fixture (JSON)
    #[arg(long, value_name = "FILE")]
    pub page: PathBuf,

    #[arg(long)]
    pub instruction: String,

    /// Selector of the element the step refers to
    #[arg(long)]
    pub selector: String,

    #[arg(long)]
    pub scope: Option<String>,
}

pub async fn cmd_resolve(args: ResolveArgs, ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let document = load_page(&args.page).await?;
    let app = ctx.app_context().await?;

    let mut intent = StepIntent::adhoc(&args.instruction);
    if let Some(target) = &args.target {
        intent = intent.with_target(target);
    }
    for selector in &args.selectors {
        intent = intent.with_hint(selector);
    }
    let request = ResolveRequest::new(intent, document).with_scope(parse_scope(args.scope.as_deref())?);

    let report = app.locator().resolve_detailed(request).await?;
    if args.report {
        emit(&report, &output, print_report)
    } else {
        emit(&report.result, &output, print_result)
    }
}

pub async fn cmd_teach(args: TeachArgs, ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let document = load_page(&args.page).await?;
    let app = ctx.app_context().await?;
    let scope = parse_scope(args.scope.as_deref())?;
    let intent = StepIntent::adhoc(&args.instruction);

    let pattern = app
        .locator()
        .teach_selector(&intent, document.as_ref(), &args.selector, &scope)
        .await?;
    emit(&pattern, &output, |pattern| {
        println!(
            "Taught pattern {} ({} -> {}, scope {})",
            pattern.id, pattern.intent, pattern.selector, pattern.scope
        );
    })
}

pub(crate) async fn load_page(path: &Path) -> Result<Arc<dyn DocumentHandle>> {
    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let page: PageSpec = serde_json::from_str(&raw)
        .with_context(|| format!("parsing page fixture {}", path.display()))?;
    Ok(Arc::new(StaticDocument::from_page(page)))
}

pub(crate) fn parse_scope(raw: Option<&str>) -> Result<PatternScope> {
    match raw {
        Some(raw) => PatternScope::parse(raw).with_context(|| format!("invalid scope '{raw}'")),
        None => Ok(PatternScope::global()),
    }
}

fn print_result(result: &ResolutionResult) {
    match result {
        ResolutionResult::Found {
            element,
            selector,
            strategy,
            confidence,
            pattern_id,
        } => {
            println!("Found <{}> via {strategy} (confidence {confidence:.2})", element.tag);
            println!("  selector: {selector}");
            if !element.accessible_name.is_empty() {
                println!("  name:     {}", element.accessible_name);
            }
            if let Some(id) = pattern_id {
                println!("  pattern:  {id}");
            }
        }
        ResolutionResult::NotFound { guidance } => {
            println!("No element found; teach it with `guidepath teach`.");
            if let Some(guidance) = guidance {
                println!("  hint: {guidance}");
            }
        }
    }
}

fn print_report(report: &ResolutionReport) {
    for attempt in &report.attempts {
        let outcome = match &attempt.outcome {
            AttemptOutcome::Matched { confidence } => format!("matched ({confidence:.2})"),
            AttemptOutcome::Missed => "missed".to_string(),
            AttemptOutcome::BelowThreshold { score } => format!("below threshold ({score:.2})"),
            AttemptOutcome::Fault { reason } => format!("fault: {reason}"),
            AttemptOutcome::Stale => "stale".to_string(),
        };
        println!(
            "{:<16} {:>5}ms  {}",
            attempt.strategy.name(),
            attempt.elapsed_ms,
            outcome
        );
    }
    print_result(&report.result);
}
