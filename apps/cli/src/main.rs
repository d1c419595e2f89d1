//! cadkb CLI: builds a local CAD knowledge base from API reference pages
//! and step-by-step instruction PDFs.
//!
//! The store pairs documented creation methods with the construction steps
//! harvested from worked examples.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
