//! Create a calendar.

use anyhow::Result;

use kansync_core::ops;

use crate::commands::open_store;
use crate::config::GlobalConfig;

pub async fn run(config: &GlobalConfig, title: &str, background: &str) -> Result<()> {
    let store = open_store(config)?;
    let id = ops::create_calendar(&store, &config.current_user(), title, background).await?;
    println!("Created calendar {}", id);
    Ok(())
}
