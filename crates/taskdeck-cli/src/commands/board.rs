//! Whole-board commands.

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use taskdeck_core::board::BoardSnapshot;
use taskdeck_core::config::{Backend, TaskdeckConfig};
use taskdeck_core::gateway::RedisBoardGateway;

use super::open_board;
use crate::output;

#[derive(Subcommand)]
pub enum BoardCommands {
    /// Display the board, one section per sprint plus the backlog
    Show(ShowArgs),

    /// Replace the stored board with a JSON snapshot (redis backend only)
    Import(ImportArgs),

    /// Print the board as a JSON snapshot
    Export,
}

#[derive(Args)]
pub struct ShowArgs {
    /// Only show this sprint ("backlog" for tasks outside any sprint)
    #[arg(short, long)]
    pub sprint: Option<String>,
}

#[derive(Args)]
pub struct ImportArgs {
    /// Path to a JSON board snapshot
    pub file: PathBuf,
}

pub async fn execute(cmd: BoardCommands, config: &TaskdeckConfig, project_id: &str) -> Result<()> {
    match cmd {
        BoardCommands::Show(args) => {
            let context = open_board(config, project_id).await?;
            let store = context.store();
            let sprints = store.sprints();

            match args.sprint.as_deref() {
                Some("backlog") => output::print_board("Backlog", &store.tasks_by_sprint(None)),
                Some(sprint_id) => {
                    let sprint = sprints
                        .iter()
                        .find(|s| s.id == sprint_id)
                        .ok_or_else(|| anyhow::anyhow!("Sprint '{}' not found", sprint_id))?;
                    output::print_board(&sprint.name, &store.tasks_by_sprint(Some(&sprint.id)));
                }
                None => {
                    if sprints.is_empty() && store.snapshot().tasks.is_empty() {
                        println!(
                            "{}",
                            "Board is empty. Create tasks with 'taskdeck task new <title>'.".dimmed()
                        );
                    } else {
                        for sprint in &sprints {
                            let heading = format!("{} [{}]", sprint.name, sprint.status.as_str());
                            output::print_board(&heading, &store.tasks_by_sprint(Some(&sprint.id)));
                        }
                        output::print_board("Backlog", &store.tasks_by_sprint(None));
                    }
                }
            }
            context.dispose();
        }

        BoardCommands::Import(args) => {
            if config.backend != Backend::Redis {
                anyhow::bail!("Import writes to Redis directly; set backend = \"redis\".");
            }
            let raw = std::fs::read_to_string(&args.file)
                .with_context(|| format!("Cannot read {}", args.file.display()))?;
            let mut snapshot: BoardSnapshot = serde_json::from_str(&raw)?;
            if snapshot.project_id != project_id {
                tracing::warn!(
                    file_project = %snapshot.project_id,
                    project_id = %project_id,
                    "Snapshot project differs; importing under the selected project"
                );
                snapshot.project_id = project_id.to_string();
                for sprint in &mut snapshot.sprints {
                    sprint.project_id = project_id.to_string();
                }
                for task in &mut snapshot.tasks {
                    task.project_id = project_id.to_string();
                }
            }

            let gateway = RedisBoardGateway::connect(&config.redis_url).await?;
            gateway.import(&snapshot).await?;
            println!(
                "{} Imported {} sprint(s) and {} task(s) into {}",
                "✓".green().bold(),
                snapshot.sprints.len(),
                snapshot.tasks.len(),
                project_id.cyan()
            );
        }

        BoardCommands::Export => {
            let context = open_board(config, project_id).await?;
            println!("{}", serde_json::to_string_pretty(&context.store().snapshot())?);
            context.dispose();
        }
    }

    Ok(())
}
