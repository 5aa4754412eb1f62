// SPDX-License-Identifier: MIT

//! `ash session` — create/list/pause/resume/end sessions and send messages
//! (§6.1 `/api/sessions`). `send` is the one streaming command: it prints
//! each SSE frame as it arrives rather than buffering the whole reply.

use crate::client::AshClient;
use crate::output::OutputFormat;
use anyhow::Result;
use clap::{Args, Subcommand};

#[derive(Args)]
pub struct SessionArgs {
    #[command(subcommand)]
    pub command: SessionCommand,
}

#[derive(Subcommand)]
pub enum SessionCommand {
    /// Start a new session against a deployed agent.
    Create {
        agent: String,
    },
    /// List sessions, optionally filtered by agent.
    List {
        #[arg(long)]
        agent: Option<String>,
    },
    /// Show one session.
    Get {
        id: String,
    },
    /// Send a message and stream the reply.
    Send {
        id: String,
        content: String,
    },
    Pause {
        id: String,
    },
    Resume {
        id: String,
    },
    End {
        id: String,
    },
}

pub async fn handle(command: SessionCommand, client: &AshClient, format: OutputFormat) -> Result<()> {
    match command {
        SessionCommand::Create { agent } => {
            let session = client.create_session(&agent).await?;
            print_session(format, &session);
        }
        SessionCommand::List { agent } => {
            let sessions = client.list_sessions(agent.as_deref()).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&sessions)?),
                OutputFormat::Text => {
                    if sessions.is_empty() {
                        println!("No sessions");
                    } else {
                        for session in &sessions {
                            println!("{}\t{}\t{}", session.id, session.agent_name, session.status);
                        }
                    }
                }
            }
        }
        SessionCommand::Get { id } => {
            let session = client.get_session(&id).await?;
            print_session(format, &session);
        }
        SessionCommand::Send { id, content } => {
            client
                .send_message(&id, &content, |event, data| match event {
                    "error" => eprintln!("error: {data}"),
                    "done" => {}
                    _ => println!("{data}"),
                })
                .await?;
        }
        SessionCommand::Pause { id } => {
            client.pause_session(&id).await?;
            println!("paused {id}");
        }
        SessionCommand::Resume { id } => {
            let session = client.resume_session(&id).await?;
            print_session(format, &session);
        }
        SessionCommand::End { id } => {
            client.end_session(&id).await?;
            println!("ended {id}");
        }
    }
    Ok(())
}

fn print_session(format: OutputFormat, session: &ash_core::session::Session) {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(session).unwrap_or_default()),
        OutputFormat::Text => println!("{}\t{}\t{}", session.id, session.agent_name, session.status),
    }
}
