use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::Duration;
use clap::{Args, Subcommand};
use memory_center::{LearnedPattern, PatternExport};
use tokio::fs;
use tracing::info;

use crate::cli::context::CliContext;
use crate::cli::output::{emit, OutputFormat};
use crate::cli::resolve::parse_scope;

#[derive(Args, Clone, Debug)]
pub struct FeedbackArgs {
    #[arg(value_name = "PATTERN_ID")]
    pub pattern_id: String,

    /// The element worked for the user
    #[arg(long, conflicts_with = "failure")]
    pub success: bool,

    /// The element was wrong
    #[arg(long)]
    pub failure: bool,
}

#[derive(Args, Clone, Debug)]
pub struct PatternsArgs {
    #[command(subcommand)]
    pub action: PatternsAction,
}

#[derive(Subcommand, Clone, Debug)]
pub enum PatternsAction {
    /// List learned patterns
    List {
        #[arg(long)]
        scope: Option<String>,
    },

    /// Drop old patterns that never proved themselves
    Prune {
        /// Maximum age in days (defaults to patterns.prune_days)
        #[arg(long)]
        days: Option<i64>,

        /// Patterns with at least this many successes are kept regardless of age
        #[arg(long)]
        min_successes: Option<u64>,
    },

    /// Write patterns to a JSON file
    Export {
        #[arg(long)]
        scope: Option<String>,

        #[arg(long, value_name = "FILE")]
        file: PathBuf,
    },

    /// Load patterns from an export file
    Import {
        #[arg(long, value_name = "FILE")]
        file: PathBuf,

        /// Re-scope every imported pattern
        #[arg(long)]
        into: Option<String>,
    },

    /// Move every pattern from one scope into another
    Merge {
        #[arg(long)]
        from: String,

        #[arg(long)]
        into: String,
    },

    /// Cache counters
    Stats,

    /// Effectiveness of the patterns for one instruction
    Analyze {
        #[arg(long)]
        instruction: String,

        #[arg(long)]
        scope: Option<String>,
    },
}

pub async fn cmd_feedback(args: FeedbackArgs, ctx: &CliContext, output: OutputFormat) -> Result<()> {
    if args.success == args.failure {
        bail!("pass exactly one of --success or --failure");
    }
    let app = ctx.app_context().await?;
    let pattern = app.locator().feedback(&args.pattern_id, args.success)?;
    emit(&pattern, &output, |pattern| {
        println!(
            "Pattern {}: {} successes, {} failures, confidence {:.2}",
            pattern.id, pattern.success_count, pattern.failure_count, pattern.confidence
        );
    })
}

pub async fn cmd_patterns(args: PatternsArgs, ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let app = ctx.app_context().await?;
    let cache = app.cache();

    match args.action {
        PatternsAction::List { scope } => {
            let scope = scope.as_deref().map(|raw| parse_scope(Some(raw))).transpose()?;
            let patterns = cache.list(scope.as_ref());
            emit(&patterns, &output, |patterns| print_pattern_table(patterns))?;
        }
        PatternsAction::Prune {
            days,
            min_successes,
        } => {
            let days = days.unwrap_or(ctx.config().patterns.prune_days);
            let min_successes = min_successes.unwrap_or(ctx.config().patterns.prune_min_successes);
            let removed = cache.prune(Duration::days(days), min_successes);
            info!(removed, days, min_successes, "pruned patterns");
            println!("Pruned {removed} pattern(s) older than {days} days");
        }
        PatternsAction::Export { scope, file } => {
            let scope = scope.as_deref().map(|raw| parse_scope(Some(raw))).transpose()?;
            let export = cache.export(scope.as_ref());
            let json = serde_json::to_string_pretty(&export)?;
            fs::write(&file, json)
                .await
                .with_context(|| format!("writing {}", file.display()))?;
            println!(
                "Exported {} pattern(s) to {}",
                export.patterns.len(),
                file.display()
            );
        }
        PatternsAction::Import { file, into } => {
            let raw = fs::read_to_string(&file)
                .await
                .with_context(|| format!("reading {}", file.display()))?;
            let export: PatternExport = serde_json::from_str(&raw)
                .with_context(|| format!("parsing {}", file.display()))?;
            let into = into.as_deref().map(|raw| parse_scope(Some(raw))).transpose()?;
            let summary = cache.import(export, into.as_ref());
            emit(&summary, &output, |summary| {
                println!(
                    "Imported {} new and merged {} of {} pattern(s)",
                    summary.imported, summary.merged, summary.total
                );
            })?;
        }
        PatternsAction::Merge { from, into } => {
            let from = parse_scope(Some(&from))?;
            let into = parse_scope(Some(&into))?;
            let moved = cache.merge(&from, &into);
            println!("Moved {moved} pattern(s) from {from} into {into}");
        }
        PatternsAction::Stats => {
            let stats = cache.stats();
            emit(&stats, &output, |stats| {
                println!(
                    "Patterns:   {} in {} scope(s), capacity {}",
                    stats.total_patterns, stats.scopes, stats.capacity
                );
                println!(
                    "Lookups:    {} ({} hits, {} misses, hit rate {:.1}%)",
                    stats.total_lookups,
                    stats.hit_lookups,
                    stats.miss_lookups,
                    stats.hit_rate * 100.0
                );
                println!("Recorded:   {}", stats.recorded_patterns);
                println!("Feedback:   {}", stats.feedback_events);
                println!("Evictions:  {}", stats.evictions);
                println!("Remote errors: {}", stats.remote_failures);
                println!("Avg confidence: {:.2}", stats.average_confidence);
            })?;
        }
        PatternsAction::Analyze { instruction, scope } => {
            let scope = parse_scope(scope.as_deref())?;
            let reports = cache.analyze(&instruction, &scope);
            emit(&reports, &output, |reports| {
                if reports.is_empty() {
                    println!("No patterns recorded for '{instruction}' in {scope}");
                    return;
                }
                for report in reports {
                    println!(
                        "{:<38} {:>6.1}% {:>5} uses  {:?}  {}",
                        report.pattern_id,
                        report.success_rate * 100.0,
                        report.total_uses,
                        report.recommendation,
                        report.selector
                    );
                }
            })?;
        }
    }

    Ok(())
}

fn print_pattern_table(patterns: &[LearnedPattern]) {
    if patterns.is_empty() {
        println!("No patterns recorded.");
        return;
    }
    println!(
        "{:<38} {:<20} {:>6} {:>4} {:>4}  {}",
        "ID", "SCOPE", "CONF", "OK", "FAIL", "INTENT -> SELECTOR"
    );
    for pattern in patterns {
        println!(
            "{:<38} {:<20} {:>6.2} {:>4} {:>4}  {} -> {}",
            pattern.id,
            pattern.scope.key(),
            pattern.confidence,
            pattern.success_count,
            pattern.failure_count,
            pattern.intent,
            pattern.selector
        );
    }
}
