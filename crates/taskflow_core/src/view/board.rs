//! Task board state for the task manager page.
//!
//! # Responsibility
//! - Hold the page's own copy of lists, tasks and projects.
//! - Track the selected list scope and the active query.
//! - Derive visible tasks and sidebar badges through `filter_tasks`.
//!
//! # Invariants
//! - Nothing is shared between boards; `reload` refetches everything.
//! - A scope pointing at a list that no longer exists falls back to `All`.
//! - Sidebar counts are computed from loaded tasks, never from the advisory
//!   `task_count` field.

use crate::model::list::{ListId, TaskList};
use crate::model::project::Project;
use crate::model::task::{Task, TaskId};
use crate::service::context::AppContext;
use crate::service::ServiceResult;
use crate::store::RecordStore;
use crate::view::task_filter::{
    filter_tasks, ListScope, PriorityFilter, SortKey, StatusFilter, TaskQuery, TaskView,
};
use log::debug;
use std::collections::HashMap;

/// Badge numbers for the sidebar: every loaded task, and tasks per list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SidebarCounts {
    pub all: usize,
    pub per_list: HashMap<ListId, usize>,
}

impl SidebarCounts {
    pub fn for_list(&self, list_id: ListId) -> usize {
        self.per_list.get(&list_id).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TaskBoard {
    lists: Vec<TaskList>,
    tasks: Vec<Task>,
    projects: Vec<Project>,
    query: TaskQuery,
}

impl TaskBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refetches lists, tasks and projects. On error the previous copy is
    /// kept.
    pub fn reload<S: RecordStore + Clone>(&mut self, context: &AppContext<S>) -> ServiceResult<()> {
        let lists = context.lists.get_all()?;
        let tasks = context.tasks.get_all()?;
        let projects = context.projects.get_all()?;

        self.lists = lists;
        self.tasks = tasks;
        self.projects = projects;
        self.ensure_scope();

        debug!(
            "event=board_reload module=view status=ok lists={} tasks={} projects={}",
            self.lists.len(),
            self.tasks.len(),
            self.projects.len()
        );
        Ok(())
    }

    pub fn lists(&self) -> &[TaskList] {
        &self.lists
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn query(&self) -> &TaskQuery {
        &self.query
    }

    pub fn select_scope(&mut self, scope: ListScope) {
        self.query.scope = scope;
        self.ensure_scope();
    }

    pub fn set_status(&mut self, status: StatusFilter) {
        self.query.status = status;
    }

    pub fn set_priority(&mut self, priority: PriorityFilter) {
        self.query.priority = priority;
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.query.search = search.into();
    }

    pub fn set_sort(&mut self, sort: SortKey) {
        self.query.sort = sort;
    }

    pub fn selected_list(&self) -> Option<&TaskList> {
        match self.query.scope {
            ListScope::All => None,
            ListScope::List(list_id) => self.lists.iter().find(|list| list.id == list_id),
        }
    }

    /// Page heading for the current scope.
    pub fn heading(&self) -> &str {
        match (self.query.scope, self.selected_list()) {
            (ListScope::All, _) => "All Tasks",
            (_, Some(list)) => &list.name,
            (_, None) => "Tasks",
        }
    }

    pub fn visible(&self) -> TaskView<'_> {
        filter_tasks(&self.tasks, &self.query)
    }

    pub fn sidebar_counts(&self) -> SidebarCounts {
        let mut per_list: HashMap<ListId, usize> =
            self.lists.iter().map(|list| (list.id, 0)).collect();
        for task in &self.tasks {
            *per_list.entry(task.list_id).or_insert(0) += 1;
        }
        SidebarCounts {
            all: self.tasks.len(),
            per_list,
        }
    }

    /// Inserts or replaces a task after a successful write.
    pub fn upsert_task(&mut self, task: Task) {
        match self.tasks.iter_mut().find(|current| current.id == task.id) {
            Some(current) => *current = task,
            None => self.tasks.insert(0, task),
        }
    }

    pub fn remove_task(&mut self, task_id: TaskId) {
        self.tasks.retain(|task| task.id != task_id);
    }

    pub fn upsert_list(&mut self, list: TaskList) {
        match self.lists.iter_mut().find(|current| current.id == list.id) {
            Some(current) => *current = list,
            None => self.lists.push(list),
        }
        self.lists.sort_by_key(|list| list.order);
    }

    /// Drops a deleted list and the tasks removed with it.
    pub fn remove_list(&mut self, list_id: ListId, removed_tasks: &[TaskId]) {
        self.lists.retain(|list| list.id != list_id);
        self.tasks.retain(|task| !removed_tasks.contains(&task.id));
        self.ensure_scope();
    }

    fn ensure_scope(&mut self) {
        if let ListScope::List(list_id) = self.query.scope {
            if !self.lists.iter().any(|list| list.id == list_id) {
                self.query.scope = ListScope::All;
            }
        }
    }
}
