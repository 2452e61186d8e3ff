//! Task commands.

use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;

use taskdeck_core::board::{BoardCommand, FieldEdit, Priority, TaskDraft};
use taskdeck_core::config::TaskdeckConfig;

use super::{open_board, settle};
use crate::output;

#[derive(Subcommand)]
pub enum TaskCommands {
    /// Create a new task
    New(NewTaskArgs),

    /// Move a task to another column, sprint or position
    Move(MoveTaskArgs),

    /// Change one field of a task
    Edit(EditTaskArgs),

    /// Delete a task
    Delete(TaskIdArg),

    /// Show one task
    Show(TaskIdArg),
}

#[derive(Args)]
pub struct NewTaskArgs {
    /// Task title
    pub title: String,

    /// Column (todo, in_progress, review, done)
    #[arg(short, long, default_value = "todo")]
    pub status: String,

    /// Sprint ID (omit for the backlog)
    #[arg(long)]
    pub sprint: Option<String>,

    /// Position in the column (defaults to the end)
    #[arg(long)]
    pub position: Option<u32>,

    /// Task description
    #[arg(long)]
    pub description: Option<String>,

    /// Assignee
    #[arg(short, long)]
    pub assignee: Option<String>,

    /// Priority (low, medium, high, critical)
    #[arg(long)]
    pub priority: Option<String>,
}

#[derive(Args)]
pub struct MoveTaskArgs {
    /// Task ID
    pub task_id: String,

    /// Target column
    pub status: String,

    /// Target sprint (omit for the backlog)
    #[arg(long)]
    pub sprint: Option<String>,

    /// Target position (clamped to the end of the column)
    #[arg(long, default_value_t = 0)]
    pub position: u32,
}

#[derive(Args)]
pub struct EditTaskArgs {
    /// Task ID
    pub task_id: String,

    /// Field to change (title, description, assignee, priority)
    pub field: String,

    /// New value; omit to clear an optional field
    pub value: Option<String>,
}

#[derive(Args)]
pub struct TaskIdArg {
    /// Task ID
    pub task_id: String,
}

fn parse_priority(value: &str) -> Result<Priority> {
    Priority::from_str(value)
        .ok_or_else(|| anyhow::anyhow!("Unknown priority '{}'. Use low, medium, high or critical.", value))
}

fn field_edit(field: &str, value: Option<String>) -> Result<FieldEdit> {
    Ok(match field {
        "title" => FieldEdit::Title(value.ok_or_else(|| anyhow::anyhow!("A title is required"))?),
        "description" => FieldEdit::Description(value),
        "assignee" => FieldEdit::Assignee(value),
        "priority" => FieldEdit::Priority(value.as_deref().map(parse_priority).transpose()?),
        other => anyhow::bail!(
            "Unknown field '{}'. Use title, description, assignee or priority.",
            other
        ),
    })
}

pub async fn execute(cmd: TaskCommands, config: &TaskdeckConfig, project_id: &str) -> Result<()> {
    let context = open_board(config, project_id).await?;

    match cmd {
        TaskCommands::New(args) => {
            let mut draft = TaskDraft::new(&args.title, &args.status);
            draft.sprint_id = args.sprint;
            draft.position = args.position;
            draft.description = args.description;
            draft.assignee = args.assignee;
            draft.priority = args.priority.as_deref().map(parse_priority).transpose()?;

            let handle = context.submit(BoardCommand::CreateTask { draft });
            let receipt = settle(&context, handle).await?;
            println!(
                "{} Created task: {} ({})",
                "✓".green().bold(),
                args.title.cyan(),
                receipt.task_id.unwrap_or_default().dimmed()
            );
        }

        TaskCommands::Move(args) => {
            let handle = context.submit(BoardCommand::MoveTask {
                task_id: args.task_id.clone(),
                status: args.status.clone(),
                sprint_id: args.sprint.clone(),
                position: args.position,
            });
            let moved = context.store().task(&args.task_id);
            settle(&context, handle).await?;
            let position = moved.map(|t| t.position).unwrap_or(args.position);
            println!(
                "{} Moved task {} to {} @ {}",
                "✓".green().bold(),
                args.task_id.dimmed(),
                args.status.cyan(),
                position
            );
        }

        TaskCommands::Edit(args) => {
            let edit = field_edit(&args.field, args.value)?;
            let field = edit.field_name();
            let handle = context.submit(BoardCommand::EditTaskField {
                task_id: args.task_id.clone(),
                edit,
            });
            settle(&context, handle).await?;
            println!(
                "{} Updated {} of task {}",
                "✓".green().bold(),
                field.cyan(),
                args.task_id.dimmed()
            );
        }

        TaskCommands::Delete(args) => {
            let handle = context.submit(BoardCommand::DeleteTask {
                task_id: args.task_id.clone(),
            });
            settle(&context, handle).await?;
            println!("{} Deleted task {}", "✓".green().bold(), args.task_id.dimmed());
        }

        TaskCommands::Show(args) => {
            let task = context.store().task(&args.task_id);
            context.dispose();
            match task {
                Some(task) => output::print_task(&task),
                None => anyhow::bail!("Task '{}' not found", args.task_id),
            }
        }
    }

    Ok(())
}
