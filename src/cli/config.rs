use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use tokio::fs;

use crate::cli::context::CliContext;
use crate::cli::output::{emit, OutputFormat};
use crate::cli::runtime::read_config_file;

#[derive(Args, Clone, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Clone, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration (file plus environment overrides)
    Show,

    /// Validate configuration
    Validate,
}

pub async fn cmd_config(args: ConfigArgs, ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let path = ctx.config_path();
    match args.action {
        ConfigAction::Show => {
            emit(ctx.config(), &output, |config| {
                println!("Current configuration ({}):", path.display());
                match serde_yaml::to_string(config) {
                    Ok(yaml) => print!("{yaml}"),
                    Err(err) => eprintln!("failed to render configuration: {err}"),
                }
            })?;
        }
        ConfigAction::Validate => {
            if fs::try_exists(path).await? {
                // Parse errors surface here with the file name attached.
                read_config_file(path).await?;
            } else {
                println!("No configuration file at {}; checking defaults", path.display());
            }
            let problems = ctx.config().problems();
            if !problems.is_empty() {
                for problem in &problems {
                    println!("- {problem}");
                }
                bail!("configuration has {} problem(s)", problems.len());
            }
            println!("Configuration {} is valid", path.display());
        }
    }

    Ok(())
}
