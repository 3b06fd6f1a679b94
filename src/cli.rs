//! One-shot commands that work on the same storage as the terminal UI.

use crate::reminder::Trigger;
use crate::storage::{Storage, THEME_KEY, WALLPAPER_KEY};
use crate::task::{parse_due, Repeat, TaskDraft};
use crate::task_list::{Filter, TaskList};
use crate::theme::Theme;
use crate::wallpaper::Wallpaper;
use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use log::info;
use std::io::Write;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "tasklist", version, about = "Keep a short list of tasks with reminders")]
pub struct Cli {
    /// Config file (defaults to the platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding storage.json and logs
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// trace|debug|info|warn|error|off
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Open the interactive list (default)
    Tui,
    /// Add a task
    Add {
        text: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        important: bool,
        /// YYYY-MM-DD [HH:MM] or HH:MM
        #[arg(long)]
        due: Option<String>,
        /// none|daily|weekly
        #[arg(long, default_value = "none")]
        repeat: Repeat,
    },
    /// Print tasks
    List {
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        important: bool,
    },
    /// Delete a task by id
    Remove { id: String },
    /// Delete every task
    Clear {
        #[arg(long)]
        yes: bool,
    },
    /// Show or change the theme: toggle|light|dark
    Theme { value: Option<String> },
    /// Show or change the background: none|<preset>|#rrggbb
    Wallpaper { value: Option<String> },
}

pub fn add(
    storage: &mut Storage,
    mut draft: TaskDraft,
    due: Option<&str>,
    notifications_enabled: bool,
    now: NaiveDateTime,
    out: &mut impl Write,
) -> Result<String> {
    if let Some(due) = due {
        draft.due = Some(parse_due(due, now)?);
    }
    let mut list = TaskList::with_tasks(storage.load_tasks());
    let task = list.add(draft, now)?.clone();
    storage.save_tasks(&list.tasks).context("saving tasks")?;
    info!("event=task_added module=cli status=ok id={}", task.id);
    writeln!(out, "added {}  {}", task.id, task.text)?;

    if let Some(trigger) = Trigger::for_task(&task) {
        if !notifications_enabled {
            writeln!(out, "notifications are not permitted; no reminder will fire")?;
        } else if let Some(next) = trigger.next_fire(now) {
            writeln!(out, "reminder at {}", next.format("%Y-%m-%d %H:%M"))?;
        } else {
            writeln!(out, "due time has passed; no reminder will fire")?;
        }
    }
    Ok(task.id)
}

pub fn list(storage: &Storage, filter: &Filter, out: &mut impl Write) -> Result<()> {
    let list = TaskList::with_tasks(storage.load_tasks());
    let tasks = list.filtered(filter);
    if tasks.is_empty() {
        writeln!(out, "no tasks")?;
        return Ok(());
    }
    for task in tasks {
        let mut line = format!("{}  {}{}", task.id, if task.important { "! " } else { "" }, task.text);
        if let Some(category) = &task.category {
            line.push_str(&format!("  #{category}"));
        }
        if let Some(due) = task.due_label() {
            line.push_str(&format!("  ({due})"));
        }
        writeln!(out, "{line}")?;
    }
    Ok(())
}

pub fn remove(storage: &mut Storage, id: &str, out: &mut impl Write) -> Result<()> {
    let mut list = TaskList::with_tasks(storage.load_tasks());
    let Some(task) = list.remove(id) else {
        bail!("no task with id `{id}`");
    };
    storage.save_tasks(&list.tasks).context("saving tasks")?;
    info!("event=task_removed module=cli status=ok id={id}");
    writeln!(out, "removed {}  {}", task.id, task.text)?;
    Ok(())
}

pub fn clear(storage: &mut Storage, yes: bool, out: &mut impl Write) -> Result<()> {
    let count = storage.load_tasks().len();
    if !yes {
        bail!("refusing to delete {count} tasks without --yes");
    }
    storage.save_tasks(&[]).context("saving tasks")?;
    info!("event=tasks_cleared module=cli status=ok count={count}");
    writeln!(out, "removed {count} tasks")?;
    Ok(())
}

pub fn theme(
    storage: &mut Storage,
    value: Option<&str>,
    default: Theme,
    out: &mut impl Write,
) -> Result<Theme> {
    let current = storage.get_value(THEME_KEY).unwrap_or(default);
    let next = match value {
        None => current,
        Some("toggle") => current.toggle(),
        Some(name) => name.parse::<Theme>().map_err(anyhow::Error::msg)?,
    };
    if value.is_some() {
        storage.set_value(THEME_KEY, &next)?;
    }
    writeln!(out, "{next}")?;
    Ok(next)
}

pub fn wallpaper(storage: &mut Storage, value: Option<&str>, out: &mut impl Write) -> Result<Wallpaper> {
    let current: Wallpaper = storage.get_value(WALLPAPER_KEY).unwrap_or_default();
    let Some(value) = value else {
        writeln!(out, "{current}")?;
        return Ok(current);
    };
    let next = value.parse::<Wallpaper>().map_err(anyhow::Error::msg)?;
    match next {
        Wallpaper::None => storage.remove_item(WALLPAPER_KEY)?,
        _ => storage.set_value(WALLPAPER_KEY, &next)?,
    }
    writeln!(out, "{next}")?;
    Ok(next)
}
