//! Interactive app state.
//!
//! Holds the task list, storage and scheduler, and maps key presses onto
//! them. Every mutation is written back to storage immediately.

use crate::config::Config;
use crate::reminder::{Notifier, NotifyError, Scheduler};
use crate::storage::{Storage, THEME_KEY, WALLPAPER_KEY};
use crate::task::{parse_due, Repeat, TaskDraft};
use crate::task_list::TaskList;
use crate::theme::Theme;
use crate::wallpaper::Wallpaper;
use chrono::NaiveDateTime;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use log::{error, info, warn};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Normal,
    Editing,
    Details,
    Alert(String),
    ConfirmClear,
    Help,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DetailField {
    #[default]
    Category,
    Important,
    Due,
    Repeat,
}

impl DetailField {
    const ORDER: [DetailField; 4] = [
        DetailField::Category,
        DetailField::Important,
        DetailField::Due,
        DetailField::Repeat,
    ];

    fn step(self, forward: bool) -> Self {
        let i = Self::ORDER.iter().position(|f| *f == self).unwrap_or(0);
        let len = Self::ORDER.len();
        let next = if forward { (i + 1) % len } else { (i + len - 1) % len };
        Self::ORDER[next]
    }
}

/// Optional metadata for the task being typed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailsForm {
    pub category: String,
    pub important: bool,
    pub due: String,
    pub repeat: Repeat,
    pub field: DetailField,
}

#[derive(Debug, Clone)]
pub struct Toast {
    pub title: String,
    pub body: String,
    pub shown_at: Instant,
}

pub struct App {
    pub list: TaskList,
    pub storage: Storage,
    pub scheduler: Scheduler,
    notifier: Box<dyn Notifier>,
    pub theme: Theme,
    pub wallpaper: Wallpaper,
    pub mode: Mode,
    pub input: String,
    pub form: DetailsForm,
    pub toasts: Vec<Toast>,
    toast_duration: Duration,
    pub should_quit: bool,
}

impl App {
    /// Reads tasks, theme and wallpaper from storage and arms reminders.
    pub fn new(
        storage: Storage,
        config: &Config,
        notifier: Box<dyn Notifier>,
        now: NaiveDateTime,
    ) -> Self {
        let tasks = storage.load_tasks();
        let theme = storage
            .get_value(THEME_KEY)
            .unwrap_or(config.default_theme);
        let wallpaper = storage
            .get_value(WALLPAPER_KEY)
            .unwrap_or_default();

        let mut scheduler = Scheduler::new(config.notifications.enabled);
        let armed = scheduler.sync(&tasks, now);
        info!(
            "event=app_loaded module=app status=ok tasks={} reminders={armed} theme={theme}",
            tasks.len()
        );

        Self {
            list: TaskList::with_tasks(tasks),
            storage,
            scheduler,
            notifier,
            theme,
            wallpaper,
            mode: Mode::Normal,
            input: String::new(),
            form: DetailsForm::default(),
            toasts: Vec::new(),
            toast_duration: config.toast_duration(),
            should_quit: false,
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent, now: NaiveDateTime) {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }
        match self.mode.clone() {
            Mode::Normal => self.handle_normal(key),
            Mode::Editing => self.handle_editing(key, now),
            Mode::Details => self.handle_details(key, now),
            Mode::Alert(_) | Mode::Help => {
                if matches!(key.code, KeyCode::Enter | KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('?')) {
                    self.mode = Mode::Normal;
                }
            }
            Mode::ConfirmClear => {
                if matches!(key.code, KeyCode::Char('y') | KeyCode::Char('Y')) {
                    self.clear_all();
                }
                if !matches!(self.mode, Mode::Alert(_)) {
                    self.mode = Mode::Normal;
                }
            }
        }
    }

    fn handle_normal(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('i') | KeyCode::Char('a') => self.mode = Mode::Editing,
            KeyCode::Up | KeyCode::Char('k') => self.list.select_previous(),
            KeyCode::Down | KeyCode::Char('j') => self.list.select_next(),
            KeyCode::Char('d') | KeyCode::Char('x') | KeyCode::Delete => {
                self.remove_selected()
            }
            KeyCode::Char('C') => {
                if !self.list.is_empty() {
                    self.mode = Mode::ConfirmClear;
                }
            }
            KeyCode::Char('t') => self.toggle_theme(),
            KeyCode::Char('w') => self.set_wallpaper(self.wallpaper.cycle()),
            KeyCode::Char('f') => self.list.cycle_category_filter(),
            KeyCode::Char('!') => self.list.toggle_important_filter(),
            KeyCode::Char('?') => self.mode = Mode::Help,
            _ => {}
        }
    }

    fn handle_editing(&mut self, key: KeyEvent, now: NaiveDateTime) {
        match key.code {
            KeyCode::Enter => self.submit(now),
            KeyCode::Tab => self.mode = Mode::Details,
            KeyCode::Esc => self.mode = Mode::Normal,
            KeyCode::Backspace => {
                self.input.pop();
            }
            KeyCode::Char(c) => self.input.push(c),
            _ => {}
        }
    }

    fn handle_details(&mut self, key: KeyEvent, now: NaiveDateTime) {
        if key.code == KeyCode::Enter {
            self.submit(now);
            return;
        }
        if key.code == KeyCode::Esc {
            self.mode = Mode::Editing;
            return;
        }
        let form = &mut self.form;
        match key.code {
            KeyCode::Tab | KeyCode::Down => form.field = form.field.step(true),
            KeyCode::BackTab | KeyCode::Up => form.field = form.field.step(false),
            KeyCode::Char(' ') if form.field == DetailField::Important => {
                form.important = !form.important
            }
            KeyCode::Char(' ') if form.field == DetailField::Repeat => {
                form.repeat = form.repeat.cycle()
            }
            KeyCode::Backspace => match form.field {
                DetailField::Category => {
                    form.category.pop();
                }
                DetailField::Due => {
                    form.due.pop();
                }
                _ => {}
            },
            KeyCode::Char(c) => match form.field {
                DetailField::Category => form.category.push(c),
                DetailField::Due => form.due.push(c),
                _ => {}
            },
            _ => {}
        }
    }

    /// Adds the typed task. Empty input is ignored.
    pub fn submit(&mut self, now: NaiveDateTime) {
        if self.input.trim().is_empty() {
            self.mode = Mode::Editing;
            return;
        }
        let due = if self.form.due.trim().is_empty() {
            None
        } else {
            match parse_due(&self.form.due, now) {
                Ok(due) => Some(due),
                Err(err) => {
                    self.mode = Mode::Alert(err.to_string());
                    return;
                }
            }
        };
        let draft = TaskDraft {
            text: self.input.clone(),
            category: Some(self.form.category.clone()),
            important: self.form.important,
            due,
            repeat: self.form.repeat,
        };
        let task = match self.list.add(draft, now) {
            Ok(task) => task.clone(),
            Err(err) => {
                self.mode = Mode::Alert(err.to_string());
                return;
            }
        };
        info!("event=task_added module=app status=ok id={}", task.id);
        self.input.clear();
        self.form = DetailsForm::default();
        self.mode = Mode::Normal;
        self.persist();

        match self.scheduler.schedule_task(&task, now) {
            Ok(_) => {}
            Err(NotifyError::PermissionDenied) => {
                warn!("event=reminder_denied module=app status=denied id={}", task.id);
                self.mode = Mode::Alert(
                    "Notifications are not permitted; the task was saved without a reminder."
                        .to_string(),
                );
            }
            Err(err) => {
                warn!("event=reminder_failed module=app status=error id={} reason={err}", task.id);
                self.mode = Mode::Alert(format!("Reminder not scheduled: {err}"));
            }
        }
    }

    pub fn remove_selected(&mut self) {
        if let Some(task) = self.list.remove_selected() {
            self.scheduler.cancel(&task.id);
            info!("event=task_removed module=app status=ok id={}", task.id);
            self.persist();
        }
    }

    pub fn clear_all(&mut self) {
        let removed = self.list.clear();
        self.scheduler.cancel_all();
        info!("event=tasks_cleared module=app status=ok count={}", removed.len());
        self.persist();
    }

    pub fn toggle_theme(&mut self) {
        self.theme = self.theme.toggle();
        if let Err(err) = self.storage.set_value(THEME_KEY, &self.theme) {
            self.storage_failed(err);
        }
    }

    pub fn set_wallpaper(&mut self, wallpaper: Wallpaper) {
        self.wallpaper = wallpaper;
        let result = match self.wallpaper {
            Wallpaper::None => self.storage.remove_item(WALLPAPER_KEY),
            _ => self.storage.set_value(WALLPAPER_KEY, &self.wallpaper),
        };
        if let Err(err) = result {
            self.storage_failed(err);
        }
    }

    /// Fires due reminders and expires old toasts.
    pub fn tick(&mut self, now: NaiveDateTime, instant: Instant) {
        for reminder in self.scheduler.fire_due(now) {
            if let Err(err) = self.notifier.deliver(&reminder) {
                warn!(
                    "event=reminder_delivery module=app status=error task_id={} reason={err}",
                    reminder.task_id
                );
            }
            self.toasts.push(Toast {
                title: reminder.title,
                body: reminder.body,
                shown_at: instant,
            });
        }
        let ttl = self.toast_duration;
        self.toasts
            .retain(|toast| instant.saturating_duration_since(toast.shown_at) < ttl);
    }

    fn persist(&mut self) {
        if let Err(err) = self.storage.save_tasks(&self.list.tasks) {
            self.storage_failed(err);
        }
    }

    fn storage_failed(&mut self, err: crate::storage::StorageError) {
        error!("event=storage_write module=app status=error reason={err}");
        self.mode = Mode::Alert(format!("Could not save: {err}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reminder::Reminder;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct Recorder(Rc<RefCell<Vec<String>>>);

    impl Notifier for Recorder {
        fn deliver(&mut self, reminder: &Reminder) -> Result<(), NotifyError> {
            self.0.borrow_mut().push(reminder.body.clone());
            Ok(())
        }
    }

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(app: &mut App, text: &str, now: NaiveDateTime) {
        for c in text.chars() {
            app.handle_key(press(KeyCode::Char(c)), now);
        }
    }

    fn app_in(dir: &std::path::Path, config: &Config, recorder: Recorder) -> App {
        App::new(Storage::open(dir), config, Box::new(recorder), at("2024-05-01 08:00"))
    }

    #[test]
    fn typing_and_enter_adds_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let now = at("2024-05-01 08:00");
        let mut app = app_in(dir.path(), &Config::default(), Recorder::default());

        app.handle_key(press(KeyCode::Char('i')), now);
        type_text(&mut app, "buy bread", now);
        app.handle_key(press(KeyCode::Enter), now);

        assert_eq!(app.mode, Mode::Normal);
        assert_eq!(app.list.len(), 1);
        assert_eq!(app.list.tasks[0].text, "buy bread");
        assert!(app.input.is_empty());

        let reloaded = Storage::open(dir.path()).load_tasks();
        assert_eq!(reloaded, app.list.tasks);
    }

    #[test]
    fn details_form_sets_metadata_and_schedules() {
        let dir = tempfile::tempdir().unwrap();
        let now = at("2024-05-01 08:00");
        let recorder = Recorder::default();
        let mut app = app_in(dir.path(), &Config::default(), recorder.clone());

        app.handle_key(press(KeyCode::Char('a')), now);
        type_text(&mut app, "stretch", now);
        app.handle_key(press(KeyCode::Tab), now);
        type_text(&mut app, "health", now);
        app.handle_key(press(KeyCode::Tab), now);
        app.handle_key(press(KeyCode::Char(' ')), now);
        app.handle_key(press(KeyCode::Tab), now);
        type_text(&mut app, "09:30", now);
        app.handle_key(press(KeyCode::Tab), now);
        app.handle_key(press(KeyCode::Char(' ')), now);
        app.handle_key(press(KeyCode::Enter), now);

        let task = &app.list.tasks[0];
        assert_eq!(task.category.as_deref(), Some("health"));
        assert!(task.important);
        assert_eq!(task.due, Some(at("2024-05-01 09:30")));
        assert_eq!(task.repeat, Repeat::Daily);
        assert_eq!(app.scheduler.pending().len(), 1);

        app.tick(at("2024-05-01 09:30"), Instant::now());
        assert_eq!(*recorder.0.borrow(), vec!["stretch".to_string()]);
        assert_eq!(app.toasts.len(), 1);
        assert_eq!(app.toasts[0].title, crate::reminder::IMPORTANT_REMINDER_TITLE);
    }

    #[test]
    fn denied_permission_alerts_once_and_keeps_task() {
        let dir = tempfile::tempdir().unwrap();
        let now = at("2024-05-01 08:00");
        let mut config = Config::default();
        config.notifications.enabled = false;
        let mut app = app_in(dir.path(), &config, Recorder::default());

        app.input = "call bank".to_string();
        app.form.due = "2024-05-02 10:00".to_string();
        app.submit(now);

        assert!(matches!(app.mode, Mode::Alert(ref msg) if msg.contains("not permitted")));
        assert_eq!(app.list.len(), 1);
        app.handle_key(press(KeyCode::Enter), now);
        assert_eq!(app.mode, Mode::Normal);
    }

    #[test]
    fn invalid_due_keeps_input_and_alerts() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_in(dir.path(), &Config::default(), Recorder::default());
        app.input = "report".to_string();
        app.form.due = "someday".to_string();
        app.submit(at("2024-05-01 08:00"));

        assert!(matches!(app.mode, Mode::Alert(_)));
        assert!(app.list.is_empty());
        assert_eq!(app.input, "report");
    }

    #[test]
    fn delete_key_removes_selected_and_cancels_reminder() {
        let dir = tempfile::tempdir().unwrap();
        let now = at("2024-05-01 08:00");
        let mut app = app_in(dir.path(), &Config::default(), Recorder::default());
        app.input = "first".to_string();
        app.form.due = "12:00".to_string();
        app.submit(now);
        app.input = "second".to_string();
        app.submit(now);

        app.handle_key(press(KeyCode::Up), now);
        app.handle_key(press(KeyCode::Char('d')), now);

        let texts: Vec<&str> = app.list.tasks.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["second"]);
        assert!(app.scheduler.pending().is_empty());
        assert_eq!(Storage::open(dir.path()).load_tasks().len(), 1);
    }

    #[test]
    fn clear_requires_confirmation() {
        let dir = tempfile::tempdir().unwrap();
        let now = at("2024-05-01 08:00");
        let mut app = app_in(dir.path(), &Config::default(), Recorder::default());
        app.input = "one".to_string();
        app.submit(now);

        app.handle_key(press(KeyCode::Char('C')), now);
        app.handle_key(press(KeyCode::Char('n')), now);
        assert_eq!(app.list.len(), 1);

        app.handle_key(press(KeyCode::Char('C')), now);
        app.handle_key(press(KeyCode::Char('y')), now);
        assert!(app.list.is_empty());
        assert_eq!(app.mode, Mode::Normal);
    }

    #[test]
    fn theme_and_wallpaper_survive_restart() {
        let dir = tempfile::tempdir().unwrap();
        let now = at("2024-05-01 08:00");
        let mut app = app_in(dir.path(), &Config::default(), Recorder::default());
        let original = app.theme;

        app.handle_key(press(KeyCode::Char('t')), now);
        app.handle_key(press(KeyCode::Char('w')), now);
        assert_eq!(app.theme, original.toggle());

        let restarted = app_in(dir.path(), &Config::default(), Recorder::default());
        assert_eq!(restarted.theme, original.toggle());
        assert_eq!(restarted.wallpaper, Wallpaper::Preset("ocean".to_string()));

        app.handle_key(press(KeyCode::Char('t')), now);
        assert_eq!(app.theme, original);
    }

    #[test]
    fn double_enter_after_typing_keeps_task() {
        let dir = tempfile::tempdir().unwrap();
        let now = at("2024-05-01 08:00");
        let mut app = app_in(dir.path(), &Config::default(), Recorder::default());

        app.handle_key(press(KeyCode::Char('i')), now);
        type_text(&mut app, "buy milk", now);
        app.handle_key(press(KeyCode::Enter), now);
        app.handle_key(press(KeyCode::Enter), now);

        assert_eq!(app.list.len(), 1);
        assert_eq!(Storage::open(dir.path()).load_tasks().len(), 1);
    }

    #[test]
    fn delete_hits_the_selected_row_with_legacy_entries() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = Storage::open(dir.path());
        storage
            .set_item(
                crate::storage::TASKS_KEY,
                r#"["from browser", {"id":"legacy-0","text":"record"}]"#,
            )
            .unwrap();
        let now = at("2024-05-01 08:00");
        let mut app = app_in(dir.path(), &Config::default(), Recorder::default());

        app.handle_key(press(KeyCode::Down), now);
        app.handle_key(press(KeyCode::Char('d')), now);

        let texts: Vec<&str> = app.list.tasks.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["from browser"]);
    }

    #[test]
    fn failed_write_alerts_and_keeps_task_in_memory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("storage.json.tmp")).unwrap();
        let now = at("2024-05-01 08:00");
        let mut app = app_in(dir.path(), &Config::default(), Recorder::default());

        app.input = "survives".to_string();
        app.submit(now);

        assert!(matches!(app.mode, Mode::Alert(ref msg) if msg.starts_with("Could not save")));
        assert_eq!(app.list.len(), 1);
        assert_eq!(app.list.tasks[0].text, "survives");
    }

    #[test]
    fn toasts_expire() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_in(dir.path(), &Config::default(), Recorder::default());
        let start = Instant::now();
        app.toasts.push(Toast {
            title: "t".into(),
            body: "b".into(),
            shown_at: start,
        });
        app.tick(at("2024-05-01 08:00"), start + Duration::from_secs(1));
        assert_eq!(app.toasts.len(), 1);
        app.tick(at("2024-05-01 08:00"), start + Duration::from_secs(6));
        assert!(app.toasts.is_empty());
    }
}
