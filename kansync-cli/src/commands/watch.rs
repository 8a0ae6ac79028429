//! Stream a calendar's changes until interrupted.
//!
//! Mirrors the component tree: the calendar controller streams row
//! changes, and one row watcher per row streams that row's card
//! changes into a shared channel. Row watchers are spawned when a row
//! arrives and aborted when it is removed, which drops the row
//! controller and releases its subscription.

use std::collections::HashMap;

use anyhow::Result;
use owo_colors::OwoColorize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use kansync_core::controller::{
    CalendarController, CalendarOptions, CalendarView, RowController,
};
use kansync_core::document::RowView;
use kansync_core::remote::ProcessStore;
use kansync_core::{Change, ChangeKind, CurrentUser};

use crate::commands::open_store;
use crate::config::GlobalConfig;
use crate::render::Render;

pub async fn run(config: &GlobalConfig, calendar_id: &str) -> Result<()> {
    let store = open_store(config)?;
    // Mount without draining: the initial snapshot streams out as
    // Added events like any other change.
    let mut calendar = CalendarController::mount(
        store.clone(),
        config.current_user(),
        calendar_id,
        CalendarOptions::default(),
    )
    .await;

    match calendar.view() {
        CalendarView::Hidden => return Ok(()),
        CalendarView::NotFound(message) => {
            println!("{}", message);
            return Ok(());
        }
        CalendarView::Board { meta, .. } => {
            println!(
                "📅 {} {}",
                meta.title.bold(),
                "(Ctrl-C to stop)".dimmed()
            );
        }
    }

    let (card_events_tx, mut card_events) = mpsc::unbounded_channel::<Change>();
    let mut row_watchers: HashMap<String, JoinHandle<()>> = HashMap::new();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            change = calendar.next_change() => {
                let Some(change) = change else { break };
                println!("row  {}", change.render());
                match change.kind {
                    ChangeKind::Added => {
                        if let Some(row) = RowView::from_doc(&change.doc) {
                            let watcher = spawn_row_watcher(
                                store.clone(),
                                config.current_user(),
                                row,
                                card_events_tx.clone(),
                            );
                            row_watchers.insert(change.doc.id.clone(), watcher);
                        }
                    }
                    ChangeKind::Removed => {
                        if let Some(watcher) = row_watchers.remove(&change.doc.id) {
                            watcher.abort();
                        }
                    }
                    ChangeKind::Modified => {}
                }
            }
            Some(change) = card_events.recv() => {
                println!("card {}", change.render());
            }
        }
    }

    for watcher in row_watchers.into_values() {
        watcher.abort();
    }
    Ok(())
}

fn spawn_row_watcher(
    store: ProcessStore,
    auth: CurrentUser,
    row: RowView,
    events: mpsc::UnboundedSender<Change>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut controller = RowController::mount(store, auth, row).await;
        while let Some(change) = controller.next_change().await {
            if events.send(change).is_err() {
                break;
            }
        }
    })
}
