//! Rename and delete calendars.

use anyhow::Result;

use kansync_core::controller::CalendarView;

use crate::commands::{mount_calendar, open_store, require_board};
use crate::config::GlobalConfig;

pub async fn rename(config: &GlobalConfig, calendar_id: &str, title: &str) -> Result<()> {
    let store = open_store(config)?;
    let controller = mount_calendar(config, store, calendar_id).await;
    require_board(&controller)?;

    if controller.rename(title).await? {
        println!("Renamed calendar {}", calendar_id);
    } else {
        anyhow::bail!("Calendar title is empty");
    }
    Ok(())
}

pub async fn rm(config: &GlobalConfig, calendar_id: &str) -> Result<()> {
    let store = open_store(config)?;
    let mut controller = mount_calendar(config, store, calendar_id).await;
    require_board(&controller)?;

    controller.delete().await;

    // The controller now shows the replacement message, whatever the
    // remote outcome was.
    if let CalendarView::NotFound(message) = controller.view() {
        println!("{}", message);
    }
    Ok(())
}
