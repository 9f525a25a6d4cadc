use super::config::cmd_config;
use super::env::CliArgs;
use super::patterns::{cmd_feedback, cmd_patterns};
use super::prefetch::cmd_prefetch;
use super::resolve::{cmd_resolve, cmd_teach};
use super::workflow::cmd_workflow;
use crate::cli::commands::Commands;
use crate::cli::context::CliContext;
use anyhow::Result;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<()> {
    let output = cli.output.clone();
    match cli.command.clone() {
        Commands::Resolve(args) => cmd_resolve(args, ctx, output).await,
        Commands::Teach(args) => cmd_teach(args, ctx, output).await,
        Commands::Feedback(args) => cmd_feedback(args, ctx, output).await,
        Commands::Patterns(args) => cmd_patterns(args, ctx, output).await,
        Commands::Workflow(args) => cmd_workflow(args, ctx, output).await,
        Commands::Config(args) => cmd_config(args, ctx, output).await,
        Commands::Prefetch(args) => cmd_prefetch(args, ctx, output).await,
    }
}
