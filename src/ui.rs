use crate::app::{App, DetailField, Mode};
use crate::task::local_now;
use crossterm::event::{self, Event, KeyEventKind};
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};
use std::io;
use std::time::{Duration, Instant};

pub fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    tick: Duration,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| draw(f, app))?;

        if event::poll(tick)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key, local_now());
                }
            }
        }
        app.tick(local_now(), Instant::now());

        if app.should_quit {
            return Ok(());
        }
    }
}

pub fn draw(f: &mut Frame, app: &App) {
    let palette = app.theme.palette();
    let mut base = palette.base();
    if let Some(bg) = app.wallpaper.background() {
        base = base.bg(bg);
    }
    f.render_widget(Block::default().style(base), f.area());

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![
            Constraint::Length(1),
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(f.area());

    draw_header(f, app, chunks[0]);
    draw_input(f, app, chunks[1]);
    draw_tasks(f, app, chunks[2]);
    draw_footer(f, app, chunks[3]);

    match &app.mode {
        Mode::Details => draw_details(f, app),
        Mode::Alert(message) => draw_modal(f, app, "Alert", vec![
            Line::from(message.as_str()),
            Line::from(""),
            Line::from(Span::styled("Enter to dismiss", palette.muted())),
        ]),
        Mode::ConfirmClear => draw_modal(f, app, "Clear all tasks?", vec![
            Line::from(format!("Delete all {} tasks?", app.list.len())),
            Line::from(""),
            Line::from(Span::styled("y to confirm, any other key to cancel", palette.muted())),
        ]),
        Mode::Help => draw_modal(f, app, "Keys", help_lines()),
        Mode::Normal | Mode::Editing => {}
    }

    draw_toasts(f, app);
}

fn draw_header(f: &mut Frame, app: &App, area: Rect) {
    let palette = app.theme.palette();
    let filter = &app.list.filter;
    let mut spans = vec![
        Span::styled(" Tasks ", palette.header()),
        Span::raw(format!("{} total", app.list.len())),
    ];
    if let Some(category) = &filter.category {
        spans.push(Span::styled(format!("  [{category}]"), palette.muted()));
    }
    if filter.important_only {
        spans.push(Span::styled("  [important]", palette.important()));
    }
    spans.push(Span::styled(format!("  theme: {}", app.theme), palette.muted()));
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_input(f: &mut Frame, app: &App, area: Rect) {
    let palette = app.theme.palette();
    let editing = matches!(app.mode, Mode::Editing | Mode::Details);
    let input = Paragraph::new(app.input.as_str()).block(
        Block::default()
            .title("New task")
            .borders(Borders::ALL)
            .border_style(palette.border(editing)),
    );
    f.render_widget(input, area);
    if app.mode == Mode::Editing {
        let typed = u16::try_from(app.input.chars().count()).unwrap_or(u16::MAX);
        let x = area.x.saturating_add(1).saturating_add(typed);
        f.set_cursor_position((x.min(area.right().saturating_sub(2)), area.y.saturating_add(1)));
    }
}

fn draw_tasks(f: &mut Frame, app: &App, area: Rect) {
    let palette = app.theme.palette();
    let visible = app.list.visible();
    let items: Vec<ListItem> = visible
        .iter()
        .map(|t| {
            let mut spans = Vec::new();
            if t.important {
                spans.push(Span::styled("! ", palette.important()));
            } else {
                spans.push(Span::raw("  "));
            }
            spans.push(Span::raw(t.text.as_str()));
            if let Some(category) = &t.category {
                spans.push(Span::styled(format!("  #{category}"), palette.muted()));
            }
            if let Some(due) = t.due_label() {
                spans.push(Span::styled(format!("  ({due})"), palette.muted()));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();

    let title = if visible.is_empty() && !app.list.is_empty() {
        "No tasks match the filter"
    } else if visible.is_empty() {
        "No tasks yet, press i to add one"
    } else {
        "Tasks"
    };
    let list = List::new(items)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(palette.border(app.mode == Mode::Normal)),
        )
        .highlight_style(palette.highlight())
        .highlight_symbol("> ");

    let mut state = ListState::default();
    if !visible.is_empty() {
        state.select(Some(app.list.selected));
    }
    f.render_stateful_widget(list, area, &mut state);
}

fn draw_footer(f: &mut Frame, app: &App, area: Rect) {
    let hint = match app.mode {
        Mode::Editing => "Enter add  Tab details  Esc cancel",
        Mode::Details => "Tab/Up/Down field  Space toggle  Enter add  Esc back",
        _ => "i add  d delete  t theme  w wallpaper  f category  ! important  ? help  q quit",
    };
    let footer = Paragraph::new(hint).style(app.theme.palette().muted());
    f.render_widget(footer, area);
}

fn draw_details(f: &mut Frame, app: &App) {
    let palette = app.theme.palette();
    let form = &app.form;
    let row = |field: DetailField, label: &str, value: String| {
        let style = if form.field == field {
            palette.highlight()
        } else {
            Style::default()
        };
        Line::from(vec![
            Span::styled(format!("{label:<10}"), style),
            Span::raw(value),
        ])
    };
    let lines = vec![
        row(DetailField::Category, "Category", form.category.clone()),
        row(
            DetailField::Important,
            "Important",
            if form.important { "[x]" } else { "[ ]" }.to_string(),
        ),
        row(DetailField::Due, "Due", form.due.clone()),
        row(DetailField::Repeat, "Repeat", form.repeat.to_string()),
        Line::from(""),
        Line::from(Span::styled(
            "Due: YYYY-MM-DD [HH:MM] or HH:MM",
            palette.muted(),
        )),
    ];
    draw_modal(f, app, "Details", lines);
}

fn draw_modal(f: &mut Frame, app: &App, title: &str, lines: Vec<Line>) {
    let palette = app.theme.palette();
    let area = centered_rect(60, 40, f.area());
    f.render_widget(Clear, area);
    let modal = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .style(palette.base())
        .block(
            Block::default()
                .title(title.to_string())
                .borders(Borders::ALL)
                .border_style(palette.border(true)),
        );
    f.render_widget(modal, area);
}

fn draw_toasts(f: &mut Frame, app: &App) {
    let palette = app.theme.palette();
    let area = f.area();
    let width = area.width.min(40);
    for (i, toast) in app.toasts.iter().rev().enumerate() {
        let y = area.y + 1 + (i as u16) * 4;
        if y + 4 > area.bottom() {
            break;
        }
        let rect = Rect::new(area.right().saturating_sub(width), y, width, 4);
        f.render_widget(Clear, rect);
        let body = Paragraph::new(toast.body.as_str())
            .wrap(Wrap { trim: true })
            .style(palette.base())
            .alignment(Alignment::Left)
            .block(
                Block::default()
                    .title(Span::styled(
                        toast.title.as_str(),
                        palette.header().add_modifier(Modifier::ITALIC),
                    ))
                    .borders(Borders::ALL)
                    .border_style(palette.border(true)),
            );
        f.render_widget(body, rect);
    }
}

fn help_lines() -> Vec<Line<'static>> {
    [
        "i / a      type a new task",
        "Tab        task details (category, due, repeat)",
        "Enter      add task",
        "d / x / Del  delete selected",
        "C          clear all tasks",
        "t          toggle light/dark theme",
        "w          cycle wallpaper",
        "f          cycle category filter",
        "!          show important only",
        "q / Esc    quit",
    ]
    .into_iter()
    .map(Line::from)
    .collect()
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(vec![
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::reminder::BellNotifier;
    use crate::storage::Storage;
    use crate::task::TaskDraft;
    use chrono::NaiveDateTime;
    use ratatui::backend::TestBackend;

    fn now() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2024-05-01 08:00", "%Y-%m-%d %H:%M").unwrap()
    }

    fn screen(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(80, 20)).unwrap();
        terminal.draw(|f| draw(f, app)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    fn app(dir: &std::path::Path) -> App {
        App::new(
            Storage::open(dir),
            &Config::default(),
            Box::new(BellNotifier::new(io::sink())),
            now(),
        )
    }

    #[test]
    fn renders_tasks_with_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        let mut draft = TaskDraft::new("renew passport");
        draft.category = Some("errands".to_string());
        draft.important = true;
        app.list.add(draft, now()).unwrap();

        let text = screen(&app);
        assert!(text.contains("renew passport"));
        assert!(text.contains("#errands"));
        assert!(text.contains("1 total"));
        assert!(text.contains("theme: light"));
    }

    #[test]
    fn very_long_input_keeps_cursor_inside_the_box() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        app.mode = Mode::Editing;
        app.input = "x".repeat(usize::from(u16::MAX) + 10);

        let mut terminal = Terminal::new(TestBackend::new(80, 20)).unwrap();
        terminal.draw(|f| draw(f, &app)).unwrap();
        let cursor = terminal.get_cursor_position().unwrap();
        assert_eq!(cursor.x, 78);
        assert_eq!(cursor.y, 2);
    }

    #[test]
    fn renders_empty_hint_and_alert() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        assert!(screen(&app).contains("No tasks yet"));

        app.mode = Mode::Alert("Reminder not scheduled".to_string());
        assert!(screen(&app).contains("Reminder not scheduled"));
    }
}
