//! Terminal output formatting.

use colored::{ColoredString, Colorize};
use taskdeck_core::board::{Priority, Sprint, SprintStatus, Task};
use taskdeck_core::selection::{EntityKind, SelectionEntry};
use unicode_width::UnicodeWidthStr;

/// Well-known columns, in board order. Other statuses follow alphabetically.
const COLUMN_ORDER: [&str; 4] = ["todo", "in_progress", "review", "done"];

struct Column<'a> {
    name: String,
    tasks: Vec<&'a Task>,
}

/// Group tasks (already ordered by status, then position) into columns.
fn columns(tasks: &[Task]) -> Vec<Column<'_>> {
    let mut columns: Vec<Column<'_>> = Vec::new();
    for task in tasks {
        match columns.iter_mut().find(|c| c.name == task.status) {
            Some(column) => column.tasks.push(task),
            None => columns.push(Column {
                name: task.status.clone(),
                tasks: vec![task],
            }),
        }
    }
    let rank = |name: &str| COLUMN_ORDER.iter().position(|c| *c == name).unwrap_or(COLUMN_ORDER.len());
    columns.sort_by(|a, b| rank(&a.name).cmp(&rank(&b.name)).then_with(|| a.name.cmp(&b.name)));
    columns
}

/// Get terminal width, defaulting to 80.
fn term_width() -> usize {
    terminal_size::terminal_size()
        .map(|(w, _)| w.0 as usize)
        .unwrap_or(80)
}

/// Pad a plain string to a given visual width (right-padded).
fn pad_right(s: &str, width: usize) -> String {
    let visual = UnicodeWidthStr::width(s);
    if visual >= width {
        s.to_string()
    } else {
        format!("{}{}", s, " ".repeat(width - visual))
    }
}

/// Truncate a string respecting visual width.
fn truncate_visual(s: &str, max_width: usize) -> String {
    if UnicodeWidthStr::width(s) <= max_width {
        return s.to_string();
    }
    if max_width <= 3 {
        return ".".repeat(max_width);
    }
    let mut result = String::new();
    let mut current_width = 0;
    for ch in s.chars() {
        let ch_width = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
        if current_width + ch_width > max_width - 2 {
            break;
        }
        result.push(ch);
        current_width += ch_width;
    }
    result.push_str("..");
    result
}

/// Column header text (plain, for width calculation).
fn column_header_plain(name: &str, count: usize, max_width: usize) -> String {
    let mut full = name.to_uppercase();
    if name == "in_progress" && UnicodeWidthStr::width(full.as_str()) + 3 > max_width {
        full = "IN_PROG".to_string();
    }
    let full = format!("{} {}", full, count);
    truncate_visual(&full, max_width)
}

fn column_header_colored(name: &str, count: usize, max_width: usize) -> ColoredString {
    let label = column_header_plain(name, count, max_width);
    match name {
        "todo" => label.blue().bold(),
        "in_progress" => label.yellow().bold(),
        "review" => label.magenta().bold(),
        "done" => label.green().bold(),
        _ => label.normal(),
    }
}

fn priority_indicator(priority: Option<Priority>) -> ColoredString {
    match priority {
        Some(Priority::Critical) => "!!".red().bold(),
        Some(Priority::High) => "! ".yellow(),
        Some(Priority::Medium) => "· ".dimmed(),
        Some(Priority::Low) | None => "  ".normal(),
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// One task card, exactly `width` columns wide.
fn format_task_card(task: &Task, column: &str, width: usize) -> String {
    let title_width = if width > 4 { width - 3 } else { 1 };
    let title = pad_right(&truncate_visual(&task.title, title_width), title_width);
    match column {
        "in_progress" => format!("{} {}", priority_indicator(task.priority), title.yellow()),
        "review" => format!("{} {}", priority_indicator(task.priority), title.magenta()),
        "done" => format!("{} {}", "✓ ".green(), title.green().dimmed()),
        _ => format!("{} {}", priority_indicator(task.priority), title),
    }
}

/// Print one bucket group (a sprint or the backlog) as a board.
pub fn print_board(heading: &str, tasks: &[Task]) {
    println!("{}", heading.bold());
    if tasks.is_empty() {
        println!("  {}", "No tasks.".dimmed());
        println!();
        return;
    }

    let columns = columns(tasks);
    let width = term_width();
    if width < 60 {
        print_board_compact(&columns);
    } else {
        print_board_wide(&columns, width);
    }
    println!();
}

fn print_rule(left: &str, mid: &str, right: &str, num_cols: usize, col_width: usize) {
    print!("{}", left.dimmed());
    for i in 0..num_cols {
        print!("{}", "─".repeat(col_width).dimmed());
        if i < num_cols - 1 {
            print!("{}", mid.dimmed());
        }
    }
    println!("{}", right.dimmed());
}

/// Columns side by side.
fn print_board_wide(columns: &[Column<'_>], term_w: usize) {
    let num_cols = columns.len();
    let available = if term_w > num_cols + 1 {
        term_w - num_cols - 1
    } else {
        num_cols * 10
    };
    let col_width = (available / num_cols).clamp(12, 35);

    print_rule("┌", "┬", "┐", num_cols, col_width);

    print!("{}", "│".dimmed());
    for (i, col) in columns.iter().enumerate() {
        let header = column_header_colored(&col.name, col.tasks.len(), col_width);
        let header_plain = column_header_plain(&col.name, col.tasks.len(), col_width);
        let padding = col_width.saturating_sub(UnicodeWidthStr::width(header_plain.as_str()));
        let left_pad = padding / 2;
        print!("{}{}{}", " ".repeat(left_pad), header, " ".repeat(padding - left_pad));
        if i < num_cols - 1 {
            print!("{}", "│".dimmed());
        }
    }
    println!("{}", "│".dimmed());

    print_rule("├", "┼", "┤", num_cols, col_width);

    let max_tasks = columns.iter().map(|c| c.tasks.len()).max().unwrap_or(0);
    for row in 0..max_tasks {
        print!("{}", "│".dimmed());
        for (ci, col) in columns.iter().enumerate() {
            match col.tasks.get(row) {
                Some(task) => print!("{}", format_task_card(task, &col.name, col_width)),
                None => print!("{}", " ".repeat(col_width)),
            }
            if ci < num_cols - 1 {
                print!("{}", "│".dimmed());
            }
        }
        println!("{}", "│".dimmed());
    }

    print_rule("└", "┴", "┘", num_cols, col_width);

    let total: usize = columns.iter().map(|c| c.tasks.len()).sum();
    let done = columns
        .iter()
        .find(|c| c.name == "done")
        .map(|c| c.tasks.len())
        .unwrap_or(0);
    println!(
        " {} {} tasks {} {} done ({}%)",
        "■".cyan(),
        total.to_string().bold(),
        "·".dimmed(),
        done.to_string().green(),
        (done * 100) / total.max(1)
    );
}

/// Vertical layout for narrow terminals.
fn print_board_compact(columns: &[Column<'_>]) {
    for col in columns {
        println!(" {} {}", "▸".dimmed(), column_header_colored(&col.name, col.tasks.len(), 30));
        for task in &col.tasks {
            let title: ColoredString = match col.name.as_str() {
                "in_progress" => task.title.as_str().yellow(),
                "done" => task.title.as_str().green().dimmed(),
                "review" => task.title.as_str().magenta(),
                _ => task.title.as_str().normal(),
            };
            println!(
                "   {} {} {}",
                priority_indicator(task.priority),
                title,
                short_id(&task.id).dimmed()
            );
        }
    }
}

fn sprint_status_colored(status: SprintStatus) -> ColoredString {
    match status {
        SprintStatus::Planned => "planned".dimmed(),
        SprintStatus::Active => "active".yellow().bold(),
        SprintStatus::Completed => "completed".green(),
    }
}

/// Print sprints as a table.
pub fn print_sprints(sprints: &[Sprint]) {
    if sprints.is_empty() {
        println!("{}", "No sprints found.".dimmed());
        return;
    }

    println!("{:<4} {:<10} {:<30} {:<10}", "#", "ID", "Name", "Status");
    println!("{}", "─".repeat(58));
    for sprint in sprints {
        println!(
            "{:<4} {:<10} {:<30} {:<10}",
            sprint.position,
            short_id(&sprint.id),
            truncate_visual(&sprint.name, 28),
            sprint_status_colored(sprint.status)
        );
    }
}

/// Print one task with all its fields.
pub fn print_task(task: &Task) {
    println!("{} {}", task.title.cyan().bold(), format!("({})", task.id).dimmed());
    println!(
        "  {}: {} @ {}",
        "Bucket".bold(),
        task.bucket(),
        task.position
    );
    if let Some(assignee) = &task.assignee {
        println!("  {}: {}", "Assignee".bold(), assignee);
    }
    if let Some(priority) = task.priority {
        println!("  {}: {}", "Priority".bold(), priority.as_str());
    }
    if let Some(description) = &task.description {
        println!("  {}", description.dimmed());
    }
}

/// Print the selection slot of one kind.
pub fn print_selection(kind: EntityKind, entry: Option<&SelectionEntry>) {
    match entry {
        Some(entry) => println!(
            "  {:<8} {} {}",
            kind.as_str().bold(),
            entry.entity_id.cyan(),
            format!("(since {})", entry.entered_at.format("%Y-%m-%d %H:%M:%S")).dimmed()
        ),
        None => println!("  {:<8} {}", kind.as_str().bold(), "none".dimmed()),
    }
}
