// SPDX-License-Identifier: MIT

//! `ash`: the command-line client for `ashd` (§6.1).

mod client;
mod commands;
mod output;

use client::AshClient;
use clap::{Parser, Subcommand};
use commands::{agent, session};
use output::OutputFormat;

#[derive(Parser)]
#[command(name = "ash", about = "Client for the ash sandbox control plane")]
struct Cli {
    /// Base URL of the ashd server. Overrides ASH_SERVER_URL.
    #[arg(long, global = true)]
    server_url: Option<String>,

    /// Bearer token sent as `ASH_API_KEY`. Overrides the environment variable.
    #[arg(long, global = true)]
    api_key: Option<String>,

    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage deployed agents.
    Agent(agent::AgentArgs),
    /// Manage sessions.
    Session(session::SessionArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let server_url = cli
        .server_url
        .or_else(|| std::env::var("ASH_SERVER_URL").ok())
        .unwrap_or_else(|| "http://127.0.0.1:8080".to_string());
    let api_key = cli.api_key.or_else(|| std::env::var("ASH_API_KEY").ok());
    let client = AshClient::new(server_url, api_key);

    match cli.command {
        Commands::Agent(args) => agent::handle(args.command, &client, cli.format).await?,
        Commands::Session(args) => session::handle(args.command, &client, cli.format).await?,
    }

    Ok(())
}
