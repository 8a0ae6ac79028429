//! CLI subcommands.

pub mod auth;
pub mod calendar;
pub mod card;
pub mod new;
pub mod row;
pub mod show;
pub mod watch;

use anyhow::{Context, Result};

use kansync_core::controller::{CalendarController, CalendarOptions, CalendarView};
use kansync_core::remote::ProcessStore;

use crate::config::GlobalConfig;

/// Spawn the configured store provider and connect to it.
pub fn open_store(config: &GlobalConfig) -> Result<ProcessStore> {
    ProcessStore::spawn(&config.store.provider, config.store.store_config())
        .context("Failed to start the store provider")
}

/// Mount the calendar controller and reduce the initial row snapshot.
pub async fn mount_calendar(
    config: &GlobalConfig,
    store: ProcessStore,
    calendar_id: &str,
) -> CalendarController<ProcessStore> {
    let mut controller = CalendarController::mount(
        store,
        config.current_user(),
        calendar_id,
        CalendarOptions::default(),
    )
    .await;
    controller.drain_changes();
    controller
}

/// Commands that edit a calendar need its board to be visible: someone
/// else's calendar and a missing calendar both refuse here.
pub fn require_board(controller: &CalendarController<ProcessStore>) -> Result<()> {
    match controller.view() {
        CalendarView::Board { .. } => Ok(()),
        CalendarView::NotFound(message) => anyhow::bail!("{}", message),
        CalendarView::Hidden => anyhow::bail!("Nothing to show here."),
    }
}
