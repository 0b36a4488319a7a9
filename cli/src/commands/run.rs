// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! One-shot interaction streamed to the terminal
//!
//! Ctrl+C cancels the run immediately; the stream still ends with its
//! sentinel so the transcript stays consistent.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use futures::StreamExt;
use std::io::Write;
use std::path::PathBuf;
use switchboard_core::application::RunRequest;
use switchboard_core::domain::events::RunEvent;
use switchboard_core::domain::run::CancelMode;

use super::load_agency;

#[derive(Args)]
pub struct RunArgs {
    /// Message sent to the entry-point agent
    #[arg(value_name = "MESSAGE")]
    pub message: String,

    /// Entry-point agent (default: first entry point of the chart)
    #[arg(short, long)]
    pub agent: Option<String>,

    /// Conversation to continue
    #[arg(short, long)]
    pub conversation: Option<String>,

    /// Print raw SSE frames instead of formatted output
    #[arg(long)]
    pub raw: bool,
}

pub async fn execute(args: RunArgs, config_override: Option<PathBuf>) -> Result<()> {
    let (_, agency) = load_agency(config_override)?;

    let mut request = RunRequest::new(args.message);
    if let Some(agent) = args.agent {
        request = request.recipient(agent);
    }
    if let Some(conversation) = args.conversation {
        request = request.conversation(conversation);
    }

    let mut stream = agency.get_response_stream(request).await?;
    let run_id = stream.run_id();
    let mut failure = None;
    let mut cancelled = false;

    loop {
        let event = tokio::select! {
            event = stream.next() => event,
            _ = tokio::signal::ctrl_c(), if !cancelled => {
                cancelled = true;
                eprintln!("\n{}", "Cancelling run...".yellow());
                agency.cancel(run_id, Some(CancelMode::Immediate));
                continue;
            }
        };
        let Some(event) = event else { break };

        if args.raw {
            print!("{}", event.sse_frame());
        } else {
            render(&event);
        }
        std::io::stdout().flush()?;

        match event {
            RunEvent::Error { error } => failure = Some(error),
            RunEvent::Done => break,
            _ => {}
        }
    }

    if let Some(error) = failure {
        anyhow::bail!("Run {} failed: {}", run_id, error);
    }
    if cancelled {
        eprintln!("{}", format!("Run {} cancelled", run_id).yellow());
    }
    Ok(())
}

fn render(event: &RunEvent) {
    match event {
        RunEvent::Meta {
            run_id,
            conversation_id,
            agent,
        } => {
            println!(
                "{}",
                format!("run {run_id} · conversation {conversation_id} · {agent}").dimmed()
            );
        }
        RunEvent::TurnStarted {
            agent,
            caller_agent,
            turn,
            ..
        } => {
            let header = match caller_agent {
                Some(caller) => format!("[{caller} → {agent} #{turn}]").cyan(),
                None => format!("[{agent} #{turn}]").bold(),
            };
            print!("\n{header} ");
        }
        RunEvent::TextDelta { delta, .. } => print!("{delta}"),
        RunEvent::ToolCall {
            tool_name,
            arguments,
            ..
        } => {
            print!("\n  {} {}({})", "⚙".yellow(), tool_name.yellow(), arguments);
        }
        RunEvent::ToolResult { output, .. } => {
            let preview: String = output.chars().take(160).collect();
            print!("\n  {} {}", "↳".dimmed(), preview.dimmed());
        }
        RunEvent::Completed { .. } => println!(),
        RunEvent::Error { error } => eprintln!("\n{} {}", "✗".red(), error.red()),
        RunEvent::Done => {}
    }
}
