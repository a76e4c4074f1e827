//! View-layer state that is independent of rendering.
//!
//! `task_filter` is the pure filter/sort engine; `board` holds one page's
//! loaded data and query and re-derives what to show.

pub mod board;
pub mod task_filter;

pub use board::{SidebarCounts, TaskBoard};
pub use task_filter::{
    filter_tasks, ListScope, PriorityFilter, SortKey, StatusFilter, TaskCounts, TaskQuery,
    TaskView,
};
