//! Render a calendar's rows and cards once.

use anyhow::Result;
use owo_colors::OwoColorize;

use kansync_core::controller::{CalendarView, RowController};

use crate::commands::{mount_calendar, open_store};
use crate::config::GlobalConfig;
use crate::render::Render;

pub async fn run(config: &GlobalConfig, calendar_id: &str) -> Result<()> {
    let store = open_store(config)?;
    let controller = mount_calendar(config, store.clone(), calendar_id).await;

    match controller.view() {
        // Someone else's calendar: render nothing at all.
        CalendarView::Hidden => Ok(()),
        CalendarView::NotFound(message) => {
            println!("{}", message);
            Ok(())
        }
        CalendarView::Board { meta, rows } => {
            println!("📅 {} {}", meta.title.bold(), meta.background.dimmed());

            for row in rows {
                println!("{}", row.render());
                let mut cards = RowController::mount(
                    store.clone(),
                    config.current_user(),
                    row.clone(),
                )
                .await;
                cards.drain_changes();
                for card in cards.cards() {
                    println!("{}", card.render());
                }
            }
            Ok(())
        }
    }
}
