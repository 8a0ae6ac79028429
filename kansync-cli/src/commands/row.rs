//! Row operations: add, rename, delete.

use anyhow::Result;

use kansync_core::controller::RowController;
use kansync_core::document::RowView;
use kansync_core::ops;

use crate::commands::{mount_calendar, open_store, require_board};
use crate::config::GlobalConfig;

pub async fn add(config: &GlobalConfig, calendar_id: &str, title: &str) -> Result<()> {
    let store = open_store(config)?;
    let controller = mount_calendar(config, store, calendar_id).await;
    require_board(&controller)?;

    match controller.create_row(title).await? {
        Some(id) => println!("Created row {}", id),
        None => anyhow::bail!("Row title is empty"),
    }
    Ok(())
}

pub async fn rename(config: &GlobalConfig, row_id: &str, title: &str) -> Result<()> {
    let store = open_store(config)?;
    // One-shot edit: type the new title, then blur.
    let mut controller = RowController::mount(
        store,
        config.current_user(),
        RowView {
            id: row_id.to_string(),
            title: String::new(),
        },
    )
    .await;

    controller.edit_title(title);
    controller.commit_title().await?;
    println!("Renamed row {}", row_id);
    Ok(())
}

pub async fn rm(config: &GlobalConfig, row_id: &str) -> Result<()> {
    let store = open_store(config)?;
    ops::delete_row(&store, row_id).await?;
    println!("Deleted row {}", row_id);
    Ok(())
}
