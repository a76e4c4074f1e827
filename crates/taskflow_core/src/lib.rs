//! Core domain logic for the Taskflow task manager.
//! Lists, tasks and projects over a record store, plus the pure filter/sort
//! engine used by the task views.

pub mod config;
pub mod dates;
pub mod db;
pub mod logging;
pub mod model;
pub mod notify;
pub mod service;
pub mod store;
pub mod view;

pub use config::{open_connection, AppConfig, ConfigError};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status};
pub use model::attachment::{Attachment, AttachmentError};
pub use model::list::{ListDraft, ListId, ListPatch, TaskList};
pub use model::project::{
    Project, ProjectDraft, ProjectId, ProjectPatch, ProjectPriority, ProjectStatus,
};
pub use model::task::{Priority, Task, TaskDraft, TaskId, TaskPatch};
pub use model::ValidationError;
pub use notify::{LogNotifier, Notice, NoticeLevel, NoticeQueue, Notifier};
pub use service::context::{AppContext, CascadeReport};
pub use service::list_service::ListService;
pub use service::project_service::ProjectService;
pub use service::task_service::TaskService;
pub use service::seed::seed_starter_data;
pub use service::{BulkOutcome, ServiceError, ServiceResult};
pub use store::{open_store, Backend, Collection, RecordStore, StoreError};
pub use view::{filter_tasks, TaskBoard, TaskQuery, TaskView};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
