//! Card operations.

use anyhow::Result;

use kansync_core::controller::RowController;
use kansync_core::document::RowView;

use crate::commands::open_store;
use crate::config::GlobalConfig;

pub async fn add(config: &GlobalConfig, row_id: &str, text: &str) -> Result<()> {
    let store = open_store(config)?;
    let controller = RowController::mount(
        store,
        config.current_user(),
        RowView {
            id: row_id.to_string(),
            title: String::new(),
        },
    )
    .await;

    match controller.create_card(text).await? {
        Some(id) => println!("Created card {}", id),
        None => anyhow::bail!("Card text is empty"),
    }
    Ok(())
}
