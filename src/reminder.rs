//! Reminder scheduling.
//!
//! Triggers are descriptors (an absolute time, or a recurring hour/minute with
//! an optional weekday). The scheduler keeps one pending reminder per task and
//! hands due reminders to a `Notifier`.

use crate::task::{Repeat, Task};
use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime, Timelike, Weekday};
use log::{debug, info};
use std::io::{self, Write};
use thiserror::Error;

pub const REMINDER_TITLE: &str = "Task reminder";
pub const IMPORTANT_REMINDER_TITLE: &str = "Important task";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification permission denied")]
    PermissionDenied,
    #[error("reminder time {0} has already passed")]
    TriggerInPast(NaiveDateTime),
    #[error("failed to deliver notification: {0}")]
    Delivery(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    At(NaiveDateTime),
    Daily { hour: u32, minute: u32 },
    Weekly { weekday: Weekday, hour: u32, minute: u32 },
}

impl Trigger {
    /// Builds the trigger for a task's due date and repeat mode.
    pub fn for_task(task: &Task) -> Option<Self> {
        let due = task.due?;
        Some(match task.repeat {
            Repeat::None => Trigger::At(due),
            Repeat::Daily => Trigger::Daily {
                hour: due.hour(),
                minute: due.minute(),
            },
            Repeat::Weekly => Trigger::Weekly {
                weekday: due.weekday(),
                hour: due.hour(),
                minute: due.minute(),
            },
        })
    }

    pub fn is_recurring(&self) -> bool {
        !matches!(self, Trigger::At(_))
    }

    /// First fire time strictly after `after`.
    pub fn next_fire(&self, after: NaiveDateTime) -> Option<NaiveDateTime> {
        match *self {
            Trigger::At(at) => (at > after).then_some(at),
            Trigger::Daily { hour, minute } => {
                let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
                let candidate = after.date().and_time(time);
                Some(if candidate > after {
                    candidate
                } else {
                    candidate + Duration::days(1)
                })
            }
            Trigger::Weekly {
                weekday,
                hour,
                minute,
            } => {
                let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
                let ahead = (7 + weekday.num_days_from_monday()
                    - after.weekday().num_days_from_monday())
                    % 7;
                let candidate = (after.date() + Duration::days(i64::from(ahead))).and_time(time);
                Some(if candidate > after {
                    candidate
                } else {
                    candidate + Duration::days(7)
                })
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub task_id: String,
    pub title: String,
    pub body: String,
    pub trigger: Trigger,
    pub next_fire: NaiveDateTime,
}

/// Delivery seam for fired reminders.
pub trait Notifier {
    fn deliver(&mut self, reminder: &Reminder) -> Result<(), NotifyError>;
}

/// Rings the terminal bell.
pub struct BellNotifier<W: Write> {
    out: W,
}

impl BellNotifier<io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> BellNotifier<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> Notifier for BellNotifier<W> {
    fn deliver(&mut self, reminder: &Reminder) -> Result<(), NotifyError> {
        self.out.write_all(b"\x07")?;
        self.out.flush()?;
        info!(
            "event=reminder_delivered module=reminder status=ok task_id={}",
            reminder.task_id
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct Scheduler {
    enabled: bool,
    pending: Vec<Reminder>,
}

impl Scheduler {
    /// `enabled = false` behaves like a denied notification permission.
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            pending: Vec::new(),
        }
    }

    pub fn pending(&self) -> &[Reminder] {
        &self.pending
    }

    /// Schedules (or reschedules) the reminder for `task_id`.
    pub fn schedule(
        &mut self,
        task_id: &str,
        trigger: Trigger,
        title: &str,
        body: &str,
        now: NaiveDateTime,
    ) -> Result<NaiveDateTime, NotifyError> {
        if !self.enabled {
            return Err(NotifyError::PermissionDenied);
        }
        let next_fire = match (trigger, trigger.next_fire(now)) {
            (_, Some(next)) => next,
            (Trigger::At(at), None) => return Err(NotifyError::TriggerInPast(at)),
            (_, None) => return Err(NotifyError::TriggerInPast(now)),
        };
        self.cancel(task_id);
        self.pending.push(Reminder {
            task_id: task_id.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            trigger,
            next_fire,
        });
        debug!("event=reminder_scheduled module=reminder status=ok task_id={task_id} next_fire={next_fire}");
        Ok(next_fire)
    }

    /// Schedules the reminder described by a task's due date, if it has one.
    pub fn schedule_task(
        &mut self,
        task: &Task,
        now: NaiveDateTime,
    ) -> Result<Option<NaiveDateTime>, NotifyError> {
        let Some(trigger) = Trigger::for_task(task) else {
            return Ok(None);
        };
        let title = if task.important {
            IMPORTANT_REMINDER_TITLE
        } else {
            REMINDER_TITLE
        };
        self.schedule(&task.id, trigger, title, &task.text, now)
            .map(Some)
    }

    pub fn cancel(&mut self, task_id: &str) -> bool {
        let before = self.pending.len();
        self.pending.retain(|r| r.task_id != task_id);
        before != self.pending.len()
    }

    pub fn cancel_all(&mut self) {
        self.pending.clear();
    }

    /// Rebuilds pending reminders from a freshly loaded list. Past one-shot
    /// reminders are skipped. Returns how many were scheduled.
    pub fn sync(&mut self, tasks: &[Task], now: NaiveDateTime) -> usize {
        self.cancel_all();
        if !self.enabled {
            return 0;
        }
        tasks
            .iter()
            .filter(|task| matches!(self.schedule_task(task, now), Ok(Some(_))))
            .count()
    }

    /// Takes every reminder due at `now`. Recurring reminders are re-armed,
    /// one-shot reminders are dropped.
    pub fn fire_due(&mut self, now: NaiveDateTime) -> Vec<Reminder> {
        let mut fired = Vec::new();
        self.pending.retain_mut(|reminder| {
            if reminder.next_fire > now {
                return true;
            }
            fired.push(reminder.clone());
            match reminder.trigger.next_fire(now) {
                Some(next) if reminder.trigger.is_recurring() => {
                    reminder.next_fire = next;
                    true
                }
                _ => false,
            }
        });
        fired
    }
}
