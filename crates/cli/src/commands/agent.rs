// SPDX-License-Identifier: MIT

//! `ash agent` — deploy/list/remove agents (§6.1 `/api/agents`).

use crate::client::AshClient;
use crate::output::{print_one, OutputFormat};
use anyhow::Result;
use clap::{Args, Subcommand};

#[derive(Args)]
pub struct AgentArgs {
    #[command(subcommand)]
    pub command: AgentCommand,
}

#[derive(Subcommand)]
pub enum AgentCommand {
    /// Deploy (or re-deploy) an agent from a local directory.
    Deploy {
        /// Name to deploy under.
        name: String,
        /// Directory containing CLAUDE.md.
        path: String,
    },
    /// List deployed agents.
    List,
    /// Remove a deployed agent.
    Remove {
        name: String,
    },
}

pub async fn handle(command: AgentCommand, client: &AshClient, format: OutputFormat) -> Result<()> {
    match command {
        AgentCommand::Deploy { name, path } => {
            let agent = client.deploy_agent(&name, &path).await?;
            print_one(format, &agent, || {
                println!("deployed {} (version {})", agent.name, agent.version);
            });
        }
        AgentCommand::List => {
            let agents = client.list_agents().await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&agents)?),
                OutputFormat::Text => {
                    if agents.is_empty() {
                        println!("No agents");
                    } else {
                        for agent in &agents {
                            println!("{}\tv{}\t{}", agent.name, agent.version, agent.path.display());
                        }
                    }
                }
            }
        }
        AgentCommand::Remove { name } => {
            client.delete_agent(&name).await?;
            println!("removed {name}");
        }
    }
    Ok(())
}
