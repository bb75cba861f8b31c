//! SchemaConsole CLI: operator console for the schema-intelligence backend.
//!
//! Connects a source database and Neo4j, runs metadata and mapping jobs,
//! and chats with the knowledge graph, all over the backend's REST API.

mod chat;
mod commands;
mod output;
mod workspace;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
