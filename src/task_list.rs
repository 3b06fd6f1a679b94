use crate::task::{epoch_millis, Task, TaskDraft, TaskError};
use chrono::NaiveDateTime;

/// Narrows the visible rows. Empty filter shows everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    pub category: Option<String>,
    pub important_only: bool,
}

impl Filter {
    pub fn matches(&self, task: &Task) -> bool {
        if self.important_only && !task.important {
            return false;
        }
        match &self.category {
            Some(category) => task.category.as_deref() == Some(category.as_str()),
            None => true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.category.is_none() && !self.important_only
    }
}

#[derive(Debug, Default)]
pub struct TaskList {
    pub tasks: Vec<Task>,
    pub filter: Filter,
    pub selected: usize,
}

impl TaskList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        Self {
            tasks,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Appends a task whose id is the creation time in epoch milliseconds,
    /// bumped until it is unique within the list.
    pub fn add(&mut self, draft: TaskDraft, now: NaiveDateTime) -> Result<&Task, TaskError> {
        let draft = draft.validate()?;
        let mut seed = epoch_millis(now);
        while self.contains(&seed.to_string()) {
            seed += 1;
        }
        self.tasks.push(Task::from_draft(seed.to_string(), draft));
        self.selected = self.visible().len().saturating_sub(1);
        Ok(&self.tasks[self.tasks.len() - 1])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tasks.iter().any(|t| t.id == id)
    }

    pub fn remove(&mut self, id: &str) -> Option<Task> {
        let index = self.tasks.iter().position(|t| t.id == id)?;
        let removed = self.tasks.remove(index);
        self.clamp_selection();
        Some(removed)
    }

    /// Removes the row under the cursor in the filtered view.
    pub fn remove_selected(&mut self) -> Option<Task> {
        let id = self.selected_task()?.id.clone();
        self.remove(&id)
    }

    pub fn clear(&mut self) -> Vec<Task> {
        self.selected = 0;
        std::mem::take(&mut self.tasks)
    }

    pub fn filtered(&self, filter: &Filter) -> Vec<&Task> {
        self.tasks.iter().filter(|t| filter.matches(t)).collect()
    }

    /// Rows shown under the active filter.
    pub fn visible(&self) -> Vec<&Task> {
        self.filtered(&self.filter)
    }

    pub fn selected_task(&self) -> Option<&Task> {
        self.visible().get(self.selected).copied()
    }

    /// Distinct categories in first-seen order.
    pub fn categories(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for category in self.tasks.iter().filter_map(|t| t.category.as_deref()) {
            if !seen.contains(&category) {
                seen.push(category);
            }
        }
        seen
    }

    /// Steps the category filter: all -> first category -> ... -> all.
    pub fn cycle_category_filter(&mut self) {
        let categories = self.categories();
        let next = match &self.filter.category {
            None => categories.first().map(|c| c.to_string()),
            Some(current) => categories
                .iter()
                .position(|c| c == current)
                .and_then(|i| categories.get(i + 1))
                .map(|c| c.to_string()),
        };
        self.filter.category = next;
        self.clamp_selection();
    }

    pub fn toggle_important_filter(&mut self) {
        self.filter.important_only = !self.filter.important_only;
        self.clamp_selection();
    }

    pub fn select_next(&mut self) {
        let count = self.visible().len();
        if count > 0 && self.selected < count - 1 {
            self.selected += 1;
        }
    }

    pub fn select_previous(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    fn clamp_selection(&mut self) {
        let count = self.visible().len();
        if self.selected >= count {
            self.selected = count.saturating_sub(1);
        }
    }
}
