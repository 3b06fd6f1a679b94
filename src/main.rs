use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::{error, info};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use tasklist::cli::{self, Cli, Command};
use tasklist::reminder::BellNotifier;
use tasklist::task::local_now;
use tasklist::{logging, ui, App, Config, Filter, Storage, TaskDraft};

fn main() -> Result<()> {
    let args = Cli::parse();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(dir) = &args.data_dir {
        config.data_dir = Some(dir.clone());
    }
    let data_dir = config.resolve_data_dir()?;

    let level = args
        .log_level
        .clone()
        .or_else(|| config.log_level.clone())
        .unwrap_or_else(|| logging::default_log_level().to_string());
    let _logger = logging::init_logging(&level, &config.log_dir()?)
        .map_err(anyhow::Error::msg)
        .context("starting logger")?;

    let mut storage = Storage::open(&data_dir);
    info!(
        "event=storage_ready module=main status=ok path={}",
        storage.path().display()
    );

    let mut out = io::stdout();
    match args.command.unwrap_or(Command::Tui) {
        Command::Tui => run_tui(storage, &config),
        Command::Add {
            text,
            category,
            important,
            due,
            repeat,
        } => {
            let draft = TaskDraft {
                text,
                category,
                important,
                due: None,
                repeat,
            };
            cli::add(
                &mut storage,
                draft,
                due.as_deref(),
                config.notifications.enabled,
                local_now(),
                &mut out,
            )
            .map(|_| ())
        }
        Command::List {
            category,
            important,
        } => {
            let filter = Filter {
                category,
                important_only: important,
            };
            cli::list(&storage, &filter, &mut out)
        }
        Command::Remove { id } => cli::remove(&mut storage, &id, &mut out),
        Command::Clear { yes } => cli::clear(&mut storage, yes, &mut out),
        Command::Theme { value } => {
            cli::theme(&mut storage, value.as_deref(), config.default_theme, &mut out).map(|_| ())
        }
        Command::Wallpaper { value } => {
            cli::wallpaper(&mut storage, value.as_deref(), &mut out).map(|_| ())
        }
    }
}

fn run_tui(storage: Storage, config: &Config) -> Result<()> {
    let mut app = App::new(storage, config, Box::new(BellNotifier::stdout()), local_now());

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = ui::run_app(&mut terminal, &mut app, config.tick());

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = &result {
        error!("event=app_exit module=main status=error reason={err}");
    } else {
        info!("event=app_exit module=main status=ok tasks={}", app.list.len());
    }
    result.context("running terminal ui")
}
