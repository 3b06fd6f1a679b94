pub mod app;
pub mod cli;
pub mod config;
pub mod logging;
pub mod reminder;
pub mod storage;
pub mod task;
pub mod task_list;
pub mod theme;
pub mod ui;
pub mod wallpaper;

pub use app::App;
pub use config::Config;
pub use storage::Storage;
pub use task::{Repeat, Task, TaskDraft};
pub use task_list::{Filter, TaskList};
pub use theme::Theme;
