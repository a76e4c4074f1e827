//! Explicit application context.
//!
//! Built once at startup from a store handle and a notifier and passed to
//! views; owns one service per collection.

use crate::model::list::ListId;
use crate::model::task::TaskId;
use crate::notify::{Notice, Notifier};
use crate::service::list_service::ListService;
use crate::service::project_service::ProjectService;
use crate::service::task_service::TaskService;
use crate::service::ServiceResult;
use crate::store::RecordStore;
use log::{info, warn};
use std::rc::Rc;

/// Result of deleting a list together with its tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeReport {
    pub list_id: ListId,
    pub deleted_tasks: Vec<TaskId>,
    /// Tasks left behind, with the reason their delete failed.
    pub failed_tasks: Vec<(TaskId, String)>,
}

impl CascadeReport {
    pub fn is_complete(&self) -> bool {
        self.failed_tasks.is_empty()
    }
}

pub struct AppContext<S: RecordStore + Clone> {
    pub lists: ListService<S>,
    pub tasks: TaskService<S>,
    pub projects: ProjectService<S>,
    notifier: Rc<dyn Notifier>,
}

impl<S: RecordStore + Clone> AppContext<S> {
    pub fn new(store: S, notifier: Rc<dyn Notifier>) -> Self {
        Self {
            lists: ListService::new(store.clone(), Rc::clone(&notifier)),
            tasks: TaskService::new(store.clone(), Rc::clone(&notifier)),
            projects: ProjectService::new(store, Rc::clone(&notifier)),
            notifier,
        }
    }

    /// Applies one page size to every service.
    pub fn with_page_limit(self, limit: Option<u32>) -> Self {
        Self {
            lists: self.lists.with_page_limit(limit),
            tasks: self.tasks.with_page_limit(limit),
            projects: self.projects.with_page_limit(limit),
            notifier: self.notifier,
        }
    }

    pub fn notifier(&self) -> &Rc<dyn Notifier> {
        &self.notifier
    }

    /// Deletes a list, then each of its tasks one by one.
    ///
    /// Once the list is gone the call succeeds; tasks that could not be
    /// deleted are reported in `failed_tasks` and are not rolled back.
    pub fn delete_list_cascade(&self, list_id: ListId) -> ServiceResult<CascadeReport> {
        let tasks = self.tasks.get_by_list(list_id)?;
        self.lists.delete(list_id)?;

        let mut report = CascadeReport {
            list_id,
            deleted_tasks: Vec::with_capacity(tasks.len()),
            failed_tasks: Vec::new(),
        };
        for task in &tasks {
            match self.tasks.delete(task.id) {
                Ok(()) => report.deleted_tasks.push(task.id),
                Err(err) => report.failed_tasks.push((task.id, err.to_string())),
            }
        }

        if report.is_complete() {
            info!(
                "event=list_delete_cascade module=service status=ok list_id={list_id} tasks_deleted={}",
                report.deleted_tasks.len()
            );
            self.notifier
                .notify(Notice::success("List deleted successfully!"));
        } else {
            warn!(
                "event=list_delete_cascade module=service status=error list_id={list_id} tasks_deleted={} tasks_failed={}",
                report.deleted_tasks.len(),
                report.failed_tasks.len()
            );
            self.notifier.notify(Notice::error(format!(
                "List deleted, but {} of {} tasks could not be removed",
                report.failed_tasks.len(),
                tasks.len()
            )));
        }
        Ok(report)
    }
}
