//! Session selection commands.

use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;
use std::sync::Arc;

use taskdeck_core::config::TaskdeckConfig;
use taskdeck_core::selection::{EntityKind, RedisSideStore, SectionScope, SelectionCache};

use crate::output;

#[derive(Subcommand)]
pub enum SelectCommands {
    /// Open an entity
    Set(SetArgs),

    /// Show the current selection
    Show(KindArg),

    /// Close the selection of a kind
    Clear(KindArg),

    /// Replay a sequence of route paths and clear the selection on section exit
    Navigate(NavigateArgs),
}

#[derive(Args)]
pub struct SetArgs {
    /// Entity kind (company, project, ticket)
    pub kind: String,

    /// Entity ID
    pub id: String,
}

#[derive(Args)]
pub struct KindArg {
    /// Entity kind (company, project, ticket); all kinds when omitted
    pub kind: Option<String>,
}

#[derive(Args)]
pub struct NavigateArgs {
    /// Route paths, in visit order
    #[arg(required = true)]
    pub paths: Vec<String>,

    /// Entity kind the section owns
    #[arg(short, long, default_value = "company")]
    pub kind: String,

    /// Section marker segment (defaults to the configured one)
    #[arg(short, long)]
    pub marker: Option<String>,
}

fn parse_kind(kind: &str) -> Result<EntityKind> {
    EntityKind::from_str(kind)
        .ok_or_else(|| anyhow::anyhow!("Unknown kind '{}'. Use company, project or ticket.", kind))
}

fn kinds(kind: Option<&str>) -> Result<Vec<EntityKind>> {
    match kind {
        Some(kind) => Ok(vec![parse_kind(kind)?]),
        None => Ok(EntityKind::ALL.to_vec()),
    }
}

pub async fn execute(cmd: SelectCommands, config: &TaskdeckConfig) -> Result<()> {
    let side_store = RedisSideStore::connect(&config.redis_url).await?;
    let cache = Arc::new(SelectionCache::new(Arc::new(side_store)));

    match cmd {
        SelectCommands::Set(args) => {
            let kind = parse_kind(&args.kind)?;
            cache.select(kind, &args.id);
            println!("{} Opened {} {}", "✓".green().bold(), kind.as_str(), args.id.cyan());
        }

        SelectCommands::Show(args) => {
            println!("{}", "Selection".bold());
            for kind in kinds(args.kind.as_deref())? {
                let entry = cache.restore(kind).await;
                output::print_selection(kind, entry.as_ref());
            }
        }

        SelectCommands::Clear(args) => {
            for kind in kinds(args.kind.as_deref())? {
                cache.restore(kind).await;
                match cache.clear(kind) {
                    Some(entry) => println!(
                        "{} Closed {} {}",
                        "✓".green().bold(),
                        kind.as_str(),
                        entry.entity_id.dimmed()
                    ),
                    None => println!("{}", format!("No {} selected.", kind.as_str()).dimmed()),
                }
            }
        }

        SelectCommands::Navigate(args) => {
            let kind = parse_kind(&args.kind)?;
            let marker = args.marker.unwrap_or_else(|| config.section_marker.clone());
            cache.restore(kind).await;

            let mut scope = SectionScope::new(Arc::clone(&cache), kind, &marker);
            for path in &args.paths {
                let cleared = scope.observe(path);
                let mark = if cleared { "✗".red() } else { "·".dimmed() };
                println!("  {} {}", mark, path);
            }
            output::print_selection(kind, cache.current(kind).as_ref());
        }
    }

    cache.flush().await;
    Ok(())
}
