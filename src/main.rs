//! guidepath - multi-strategy element resolution for guided workflows

mod cli;

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    cli::app::run().await
}
