//! Sprint commands.

use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;

use taskdeck_core::board::{BoardCommand, SprintStatus};
use taskdeck_core::config::TaskdeckConfig;

use super::{open_board, settle};
use crate::output;

#[derive(Subcommand)]
pub enum SprintCommands {
    /// List sprints in order
    List,

    /// Move a sprint to a new position
    Reorder(ReorderArgs),

    /// Set a sprint's status (planned, active, completed)
    Status(StatusArgs),
}

#[derive(Args)]
pub struct ReorderArgs {
    /// Sprint ID
    pub sprint_id: String,

    /// New position (0 = first)
    pub position: u32,
}

#[derive(Args)]
pub struct StatusArgs {
    /// Sprint ID
    pub sprint_id: String,

    /// New status
    pub status: String,
}

pub async fn execute(cmd: SprintCommands, config: &TaskdeckConfig, project_id: &str) -> Result<()> {
    let context = open_board(config, project_id).await?;

    match cmd {
        SprintCommands::List => {
            output::print_sprints(&context.store().sprints());
            context.dispose();
        }

        SprintCommands::Reorder(args) => {
            let handle = context.submit(BoardCommand::ReorderSprint {
                sprint_id: args.sprint_id.clone(),
                position: args.position,
            });
            let sprints = context.store().sprints();
            settle(&context, handle).await?;
            println!("{} Moved sprint {}", "✓".green().bold(), args.sprint_id.dimmed());
            output::print_sprints(&sprints);
        }

        SprintCommands::Status(args) => {
            let status = SprintStatus::from_str(&args.status).ok_or_else(|| {
                anyhow::anyhow!("Unknown status '{}'. Use planned, active or completed.", args.status)
            })?;
            let handle = context.submit(BoardCommand::SetSprintStatus {
                sprint_id: args.sprint_id.clone(),
                status,
            });
            settle(&context, handle).await?;
            println!(
                "{} Sprint {} is now {}",
                "✓".green().bold(),
                args.sprint_id.dimmed(),
                status.as_str().cyan()
            );
        }
    }

    Ok(())
}
