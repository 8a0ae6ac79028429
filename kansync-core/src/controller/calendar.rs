//! Calendar controller: one board's metadata, live row list, and
//! operations, gated on ownership.

use crate::auth::CurrentUser;
use crate::change::{Change, ChangeKind, Filter};
use crate::document::{CalendarMeta, Collection, Row, RowView};
use crate::error::{KanSyncError, KanSyncResult};
use crate::ops;
use crate::retry::with_retry;
use crate::store::{Store, Subscription};
use chrono::Utc;
use serde_json::json;

pub const NOT_FOUND_MESSAGE: &str = "Calendar not found...";

/// Mount-time options.
#[derive(Debug, Clone, Copy, Default)]
pub struct CalendarOptions {
    /// Whether Modified events for rows are reduced into the local list.
    ///
    /// The shipped behavior ignores them: a row title changed by another
    /// session is only observed after a remount, even though cards do
    /// propagate live edits. Both behaviors are kept until the
    /// asymmetry gets a product decision; see DESIGN.md.
    pub apply_row_edits: bool,
}

/// Reducer state for one calendar: metadata from the mount-time point
/// read, the row list projected from the rows subscription, and the
/// replacement message shown when the calendar is gone.
#[derive(Debug, Default)]
pub struct CalendarState {
    meta: Option<CalendarMeta>,
    rows: Vec<RowView>,
    message: Option<String>,
    apply_row_edits: bool,
}

impl CalendarState {
    pub fn rows(&self) -> &[RowView] {
        &self.rows
    }

    pub fn meta(&self) -> Option<&CalendarMeta> {
        self.meta.as_ref()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Reduce one rows-subscription change into the list.
    pub fn apply(&mut self, change: &Change) {
        match change.kind {
            ChangeKind::Added => match RowView::from_doc(&change.doc) {
                Some(row) => self.rows.push(row),
                None => tracing::warn!(doc = %change.doc.id, "skipping unparseable row"),
            },
            ChangeKind::Removed => {
                self.rows.retain(|row| row.id != change.doc.id);
            }
            ChangeKind::Modified => {
                if !self.apply_row_edits {
                    return;
                }
                let Some(index) = self.rows.iter().position(|row| row.id == change.doc.id)
                else {
                    return;
                };
                if let Some(row) = RowView::from_doc(&change.doc) {
                    self.rows[index] = row;
                }
            }
        }
    }
}

/// What the calendar renders as, after the ownership gate.
#[derive(Debug, PartialEq)]
pub enum CalendarView<'a> {
    /// Someone else's calendar: render nothing at all. Access denial,
    /// not an error state.
    Hidden,
    /// The calendar is gone (never existed, or was deleted locally);
    /// the replacement message is all that renders.
    NotFound(&'a str),
    /// The owner's live board.
    Board {
        meta: &'a CalendarMeta,
        rows: &'a [RowView],
    },
}

/// Owns the rows subscription and state for one calendar. Dropping the
/// controller drops the subscription.
pub struct CalendarController<S: Store> {
    store: S,
    auth: CurrentUser,
    calendar_id: String,
    state: CalendarState,
    changes: Option<Subscription>,
}

impl<S: Store> CalendarController<S> {
    /// Mount the controller: one point read of calendar metadata, then
    /// the rows subscription. A failed read sets the not-found state
    /// (mount still succeeds, editable content stays suppressed); a
    /// failed subscribe is logged and leaves the controller without
    /// live updates.
    pub async fn mount(
        store: S,
        auth: CurrentUser,
        calendar_id: impl Into<String>,
        options: CalendarOptions,
    ) -> Self {
        let calendar_id = calendar_id.into();

        let mut state = CalendarState {
            apply_row_edits: options.apply_row_edits,
            ..CalendarState::default()
        };

        match store.get(Collection::Calendars, &calendar_id).await {
            Ok(doc) => match CalendarMeta::from_doc(&doc) {
                Some(meta) => state.meta = Some(meta),
                None => {
                    tracing::warn!(calendar = %calendar_id, "calendar document is malformed");
                    state.message = Some(NOT_FOUND_MESSAGE.to_string());
                }
            },
            Err(err) => {
                tracing::debug!(calendar = %calendar_id, error = %err, "calendar read failed");
                state.message = Some(NOT_FOUND_MESSAGE.to_string());
            }
        }

        let changes = match store
            .subscribe(Collection::Rows, Filter::field_eq("calendar_id", &calendar_id))
            .await
        {
            Ok(sub) => Some(sub),
            Err(err) => {
                tracing::warn!(calendar = %calendar_id, error = %err, "rows subscription failed");
                None
            }
        };

        CalendarController {
            store,
            auth,
            calendar_id,
            state,
            changes,
        }
    }

    pub fn calendar_id(&self) -> &str {
        &self.calendar_id
    }

    pub fn state(&self) -> &CalendarState {
        &self.state
    }

    /// The ownership-gated view of this calendar.
    ///
    /// A known owner other than the current user hides everything,
    /// including the not-found message. An unknown owner (the metadata
    /// read failed) surfaces the message: there is nobody to deny.
    pub fn view(&self) -> CalendarView<'_> {
        match (&self.state.meta, &self.state.message) {
            (Some(meta), _) if !self.auth.owns(&meta.user) => CalendarView::Hidden,
            (_, Some(message)) => CalendarView::NotFound(message),
            (Some(meta), None) => CalendarView::Board {
                meta,
                rows: &self.state.rows,
            },
            (None, None) => CalendarView::NotFound(NOT_FOUND_MESSAGE),
        }
    }

    /// Reduce one change into the local row list.
    pub fn apply(&mut self, change: &Change) {
        self.state.apply(change);
    }

    /// Apply every already-delivered change, returning how many there were.
    pub fn drain_changes(&mut self) -> usize {
        let Some(changes) = self.changes.as_mut() else {
            return 0;
        };
        let pending = changes.drain();
        for change in &pending {
            self.state.apply(change);
        }
        pending.len()
    }

    /// Wait for the next change, apply it, and return it.
    pub async fn next_change(&mut self) -> Option<Change> {
        let change = self.changes.as_mut()?.recv().await?;
        self.state.apply(&change);
        Some(change)
    }

    /// Rename this calendar. The local metadata is NOT refreshed: the
    /// rows subscription cannot observe calendar-document changes, so
    /// the stale title persists until remount. Known inconsistency,
    /// preserved deliberately.
    pub async fn rename(&self, title: &str) -> KanSyncResult<bool> {
        ops::rename_calendar(&self.store, &self.calendar_id, title).await
    }

    /// Create a row in this calendar. Empty titles issue no remote
    /// write; the local list only changes when the Added event arrives.
    pub async fn create_row(&self, title: &str) -> KanSyncResult<Option<String>> {
        if title.trim().is_empty() || self.calendar_id.is_empty() {
            return Ok(None);
        }

        let row = Row {
            title: title.to_string(),
            calendar_id: self.calendar_id.clone(),
            user: self.auth.id().unwrap_or_default().to_string(),
            created_at: Utc::now(),
        };
        let data =
            serde_json::to_value(&row).map_err(|e| KanSyncError::Serialization(e.to_string()))?;

        let id = with_retry(|| self.store.add(Collection::Rows, data.clone())).await?;
        tracing::debug!(calendar = %self.calendar_id, row = %id, "created row");
        Ok(Some(id))
    }

    /// Delete this calendar (cascading through rows and cards), then
    /// show the not-found state regardless of how the delete went.
    /// Optimistic-but-unconfirmed: the outcome is only logged.
    pub async fn delete(&mut self) {
        if let Err(err) = ops::delete_calendar(&self.store, &self.calendar_id).await {
            tracing::warn!(calendar = %self.calendar_id, error = %err, "calendar delete failed");
        }
        self.state.message = Some(NOT_FOUND_MESSAGE.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::store::memory::MemoryStore;

    fn owner() -> CurrentUser {
        CurrentUser::signed_in("u1", None)
    }

    async fn seed_calendar(store: &MemoryStore, user: &str) -> String {
        store
            .add(
                Collection::Calendars,
                json!({ "title": "Groceries", "background": "#6a8caf", "user": user }),
            )
            .await
            .unwrap()
    }

    async fn add_row(store: &MemoryStore, calendar_id: &str, title: &str) -> String {
        store
            .add(
                Collection::Rows,
                json!({ "title": title, "calendar_id": calendar_id, "user": "u1" }),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn missing_calendar_shows_not_found() {
        let store = MemoryStore::new();
        let controller =
            CalendarController::mount(store, owner(), "nope", CalendarOptions::default()).await;

        assert_eq!(controller.view(), CalendarView::NotFound(NOT_FOUND_MESSAGE));
    }

    #[tokio::test]
    async fn rows_arrive_and_leave_via_subscription() {
        let store = MemoryStore::new();
        let calendar_id = seed_calendar(&store, "u1").await;
        let mut controller = CalendarController::mount(
            store.clone(),
            owner(),
            calendar_id.clone(),
            CalendarOptions::default(),
        )
        .await;

        let todo = add_row(&store, &calendar_id, "Todo").await;
        let doing = add_row(&store, &calendar_id, "Doing").await;
        add_row(&store, "other-calendar", "Elsewhere").await;
        controller.drain_changes();

        let titles: Vec<&str> = controller.state().rows().iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Todo", "Doing"]);

        store.delete(Collection::Rows, &todo).await.unwrap();
        controller.drain_changes();

        assert_eq!(controller.state().rows().len(), 1);
        assert_eq!(controller.state().rows()[0].id, doing);
    }

    #[tokio::test]
    async fn row_modifications_are_ignored_by_default() {
        let store = MemoryStore::new();
        let calendar_id = seed_calendar(&store, "u1").await;
        let mut controller = CalendarController::mount(
            store.clone(),
            owner(),
            calendar_id.clone(),
            CalendarOptions::default(),
        )
        .await;

        let row_id = add_row(&store, &calendar_id, "Todo").await;
        controller.drain_changes();

        store
            .update(Collection::Rows, &row_id, "title", json!("Renamed"))
            .await
            .unwrap();
        controller.drain_changes();

        // Another session's rename is invisible until remount.
        assert_eq!(controller.state().rows()[0].title, "Todo");
    }

    #[tokio::test]
    async fn row_modifications_apply_in_place_when_enabled() {
        let store = MemoryStore::new();
        let calendar_id = seed_calendar(&store, "u1").await;
        let mut controller = CalendarController::mount(
            store.clone(),
            owner(),
            calendar_id.clone(),
            CalendarOptions {
                apply_row_edits: true,
            },
        )
        .await;

        add_row(&store, &calendar_id, "Todo").await;
        let middle = add_row(&store, &calendar_id, "Doing").await;
        add_row(&store, &calendar_id, "Done").await;
        controller.drain_changes();

        store
            .update(Collection::Rows, &middle, "title", json!("In review"))
            .await
            .unwrap();
        controller.drain_changes();

        let titles: Vec<&str> = controller.state().rows().iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Todo", "In review", "Done"]);
    }

    #[tokio::test]
    async fn someone_elses_calendar_renders_nothing() {
        let store = MemoryStore::new();
        let calendar_id = seed_calendar(&store, "u2").await;
        let controller = CalendarController::mount(
            store,
            CurrentUser::signed_in("u1", None),
            calendar_id,
            CalendarOptions::default(),
        )
        .await;

        assert_eq!(controller.view(), CalendarView::Hidden);
    }

    #[tokio::test]
    async fn hidden_wins_over_not_found_message() {
        let store = MemoryStore::new();
        let calendar_id = seed_calendar(&store, "u2").await;
        let mut controller = CalendarController::mount(
            store,
            CurrentUser::signed_in("u1", None),
            calendar_id,
            CalendarOptions::default(),
        )
        .await;

        controller.delete().await;
        assert_eq!(controller.view(), CalendarView::Hidden);
    }

    #[tokio::test]
    async fn anonymous_user_sees_nothing() {
        let store = MemoryStore::new();
        let calendar_id = seed_calendar(&store, "u1").await;
        let controller = CalendarController::mount(
            store,
            CurrentUser::Anonymous,
            calendar_id,
            CalendarOptions::default(),
        )
        .await;

        assert_eq!(controller.view(), CalendarView::Hidden);
    }

    #[tokio::test]
    async fn delete_shows_not_found_when_already_deleted_remotely() {
        let store = MemoryStore::new();
        let calendar_id = seed_calendar(&store, "u1").await;
        let mut controller = CalendarController::mount(
            store.clone(),
            owner(),
            calendar_id.clone(),
            CalendarOptions::default(),
        )
        .await;

        store.delete(Collection::Calendars, &calendar_id).await.unwrap();
        controller.delete().await;

        assert_eq!(controller.view(), CalendarView::NotFound(NOT_FOUND_MESSAGE));
    }

    /// Store wrapper whose deletes always fail, for the literal
    /// behavior: the display transitions no matter what the store said.
    #[derive(Clone)]
    struct FailingDeletes(MemoryStore);

    impl Store for FailingDeletes {
        async fn get(&self, collection: Collection, id: &str) -> KanSyncResult<Document> {
            self.0.get(collection, id).await
        }

        async fn add(&self, collection: Collection, data: serde_json::Value) -> KanSyncResult<String> {
            self.0.add(collection, data).await
        }

        async fn update(
            &self,
            collection: Collection,
            id: &str,
            field: &str,
            value: serde_json::Value,
        ) -> KanSyncResult<()> {
            self.0.update(collection, id, field, value).await
        }

        async fn delete(&self, _collection: Collection, _id: &str) -> KanSyncResult<()> {
            Err(KanSyncError::StoreUnavailable("store is down".to_string()))
        }

        async fn subscribe(
            &self,
            collection: Collection,
            filter: Filter,
        ) -> KanSyncResult<Subscription> {
            self.0.subscribe(collection, filter).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn delete_shows_not_found_even_when_remote_delete_fails() {
        let inner = MemoryStore::new();
        let calendar_id = seed_calendar(&inner, "u1").await;
        let mut controller = CalendarController::mount(
            FailingDeletes(inner.clone()),
            owner(),
            calendar_id.clone(),
            CalendarOptions::default(),
        )
        .await;

        controller.delete().await;

        // The remote document survived; the local view gave up on it.
        assert_eq!(controller.view(), CalendarView::NotFound(NOT_FOUND_MESSAGE));
        assert_eq!(inner.len(Collection::Calendars), 1);
    }

    #[tokio::test]
    async fn delete_cascades_and_shows_not_found() {
        let store = MemoryStore::new();
        let calendar_id = seed_calendar(&store, "u1").await;
        add_row(&store, &calendar_id, "Todo").await;
        let mut controller = CalendarController::mount(
            store.clone(),
            owner(),
            calendar_id,
            CalendarOptions::default(),
        )
        .await;

        controller.delete().await;

        assert_eq!(controller.view(), CalendarView::NotFound(NOT_FOUND_MESSAGE));
        assert_eq!(store.len(Collection::Calendars), 0);
        assert_eq!(store.len(Collection::Rows), 0);
    }

    #[tokio::test]
    async fn rename_does_not_refresh_local_metadata() {
        let store = MemoryStore::new();
        let calendar_id = seed_calendar(&store, "u1").await;
        let mut controller = CalendarController::mount(
            store.clone(),
            owner(),
            calendar_id.clone(),
            CalendarOptions::default(),
        )
        .await;

        assert!(controller.rename("Weekly shop").await.unwrap());
        controller.drain_changes();

        // The store has the new title; the local copy is stale until
        // remount because the rows subscription cannot see it.
        let doc = store.get(Collection::Calendars, &calendar_id).await.unwrap();
        assert_eq!(doc.str_field("title"), Some("Weekly shop"));
        assert_eq!(controller.state().meta().unwrap().title, "Groceries");
    }

    #[tokio::test]
    async fn create_row_with_empty_title_issues_no_write() {
        let store = MemoryStore::new();
        let calendar_id = seed_calendar(&store, "u1").await;
        let controller = CalendarController::mount(
            store.clone(),
            owner(),
            calendar_id,
            CalendarOptions::default(),
        )
        .await;

        assert_eq!(controller.create_row("  ").await.unwrap(), None);
        assert_eq!(store.len(Collection::Rows), 0);
    }

    #[tokio::test]
    async fn created_row_appears_via_subscription_only() {
        let store = MemoryStore::new();
        let calendar_id = seed_calendar(&store, "u1").await;
        let mut controller = CalendarController::mount(
            store.clone(),
            owner(),
            calendar_id,
            CalendarOptions::default(),
        )
        .await;

        let id = controller.create_row("Todo").await.unwrap().unwrap();

        assert!(controller.state().rows().is_empty());
        controller.drain_changes();
        assert_eq!(controller.state().rows().len(), 1);
        assert_eq!(controller.state().rows()[0].id, id);
    }
}
