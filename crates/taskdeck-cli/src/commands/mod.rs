//! CLI command definitions and handlers.

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use taskdeck_core::board::{BoardContext, ContextOptions, MutationHandle, MutationReceipt};
use taskdeck_core::config::TaskdeckConfig;

pub mod board;
pub mod select;
pub mod sprint;
pub mod task;

/// Taskdeck - optimistic project boards
#[derive(Parser)]
#[command(name = "taskdeck")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory holding `.taskdeck/config.toml` (defaults to current directory)
    #[arg(short, long, global = true)]
    pub dir: Option<PathBuf>,

    /// Project whose board to work on
    #[arg(short, long, global = true, env = "TASKDECK_PROJECT", default_value = "default")]
    pub project: String,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show or import a whole board
    #[command(subcommand)]
    Board(board::BoardCommands),

    /// Create, move, edit and delete tasks
    #[command(subcommand)]
    Task(task::TaskCommands),

    /// Order and start/complete sprints
    #[command(subcommand)]
    Sprint(sprint::SprintCommands),

    /// Session selection (open company, project or ticket)
    #[command(subcommand)]
    Select(select::SelectCommands),
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let dir = match self.dir {
            Some(dir) => dir,
            None => std::env::current_dir().context("Cannot determine current directory")?,
        };
        let config = TaskdeckConfig::load(&dir)?;

        match self.command {
            Commands::Board(cmd) => board::execute(cmd, &config, &self.project).await,
            Commands::Task(cmd) => task::execute(cmd, &config, &self.project).await,
            Commands::Sprint(cmd) => sprint::execute(cmd, &config, &self.project).await,
            Commands::Select(cmd) => select::execute(cmd, &config).await,
        }
    }
}

/// Mount the board of `project_id` against the configured backend.
pub(crate) async fn open_board(config: &TaskdeckConfig, project_id: &str) -> Result<BoardContext> {
    let gateway = taskdeck_core::gateway::connect(config).await?;
    let context = BoardContext::mount(project_id, None, gateway, &ContextOptions::from(config)).await?;
    if let Some(reason) = context.store().last_error() {
        anyhow::bail!("Could not load board '{}': {}", project_id, reason);
    }
    Ok(context)
}

/// Wait for a submitted command and release the board.
pub(crate) async fn settle(context: &BoardContext, handle: MutationHandle) -> Result<MutationReceipt> {
    let outcome = handle.outcome().await;
    context.dispose();
    Ok(outcome?)
}
