//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `taskflow_core` wiring end to end: config, database, store,
//!   services and the filter engine.
//! - Seed starter lists and tasks into an empty local store.
//! - Keep output deterministic for quick local sanity checks.
//!
//! Usage: `taskflow_cli [config.json]`

use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;
use taskflow_core::store::{LocalRecordStore, SqliteKeyValueStore};
use taskflow_core::view::task_filter::{StatusFilter, TaskQuery};
use taskflow_core::{
    filter_tasks, init_from_config, open_connection, open_store, seed_starter_data, AppConfig,
    AppContext, Backend, LogNotifier,
};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("event=cli_run module=cli status=error error={err}");
            eprintln!("taskflow_cli error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = AppConfig::load(config_path.as_deref())?;
    init_from_config(&config)?;

    println!("taskflow_core ping={}", taskflow_core::ping());
    println!("taskflow_core version={}", taskflow_core::core_version());

    let conn = open_connection(&config)?;
    if config.backend == Backend::Local {
        let seeded = seed_starter_data(&LocalRecordStore::new(SqliteKeyValueStore::try_new(
            &conn,
        )?))?;
        println!("seeded={seeded}");
    }
    let store = open_store(&conn, config.backend)?;
    let context =
        AppContext::new(store, Rc::new(LogNotifier)).with_page_limit(Some(config.page_limit));

    let lists = context.lists.get_all()?;
    let tasks = context.tasks.get_all()?;
    let projects = context.projects.get_all()?;
    let active = filter_tasks(
        &tasks,
        &TaskQuery {
            status: StatusFilter::Active,
            ..TaskQuery::default()
        },
    );

    println!("backend={:?}", config.backend);
    println!("lists={} projects={}", lists.len(), projects.len());
    println!(
        "tasks all={} active={} completed={}",
        active.counts.all, active.counts.active, active.counts.completed
    );
    Ok(())
}
