//! Row controller: one row's live card list and its operations.
//!
//! The controller owns the cards subscription for a single row and a
//! `CardList` the subscription's changes are reduced into. The row's own
//! view-model is handed down by the owning calendar controller; rows are
//! never point-read here.

use std::time::Instant;

use chrono::Utc;
use serde_json::json;

use crate::auth::CurrentUser;
use crate::change::{Change, ChangeKind, Filter};
use crate::controller::editor::TitleEditor;
use crate::document::{Card, CardView, Collection, RowView};
use crate::error::{KanSyncError, KanSyncResult};
use crate::retry::with_retry;
use crate::store::{Store, Subscription};

/// The local projection of one row's cards, in change arrival order.
///
/// Arrival order is the only order there is: no rank field exists, and
/// the initial snapshot's order is unspecified.
#[derive(Debug, Default)]
pub struct CardList {
    cards: Vec<CardView>,
}

impl CardList {
    pub fn cards(&self) -> &[CardView] {
        &self.cards
    }

    /// Reduce one change event into the list.
    ///
    /// Added appends, Removed deletes by id keeping relative order, and
    /// Modified replaces in place without moving the entry. A Modified
    /// event for an id we never saw is a no-op.
    pub fn apply(&mut self, change: &Change) {
        match change.kind {
            ChangeKind::Added => match CardView::from_doc(&change.doc) {
                Some(card) => self.cards.push(card),
                None => tracing::warn!(doc = %change.doc.id, "skipping unparseable card"),
            },
            ChangeKind::Removed => {
                self.cards.retain(|card| card.id != change.doc.id);
            }
            ChangeKind::Modified => {
                let Some(index) = self.cards.iter().position(|card| card.id == change.doc.id)
                else {
                    return;
                };
                match CardView::from_doc(&change.doc) {
                    Some(card) => self.cards[index] = card,
                    None => tracing::warn!(doc = %change.doc.id, "skipping unparseable card"),
                }
            }
        }
    }
}

/// Live view of one row: cards subscription, reducer state, and the
/// create/rename operations. Dropping the controller drops the
/// subscription.
pub struct RowController<S: Store> {
    store: S,
    auth: CurrentUser,
    row: RowView,
    list: CardList,
    editor: TitleEditor,
    changes: Option<Subscription>,
}

impl<S: Store> RowController<S> {
    /// Mount the controller: open the cards subscription filtered to
    /// this row. A subscription failure is logged and leaves the
    /// controller without live updates.
    pub async fn mount(store: S, auth: CurrentUser, row: RowView) -> Self {
        let changes = match store
            .subscribe(Collection::Cards, Filter::field_eq("row_id", &row.id))
            .await
        {
            Ok(sub) => Some(sub),
            Err(err) => {
                tracing::warn!(row = %row.id, error = %err, "cards subscription failed");
                None
            }
        };

        RowController {
            store,
            auth,
            row,
            list: CardList::default(),
            editor: TitleEditor::default(),
            changes,
        }
    }

    pub fn row(&self) -> &RowView {
        &self.row
    }

    pub fn cards(&self) -> &[CardView] {
        self.list.cards()
    }

    /// Reduce one change into the local card list.
    pub fn apply(&mut self, change: &Change) {
        self.list.apply(change);
    }

    /// Apply every already-delivered change, returning how many there were.
    pub fn drain_changes(&mut self) -> usize {
        let Some(changes) = self.changes.as_mut() else {
            return 0;
        };
        let pending = changes.drain();
        for change in &pending {
            self.list.apply(change);
        }
        pending.len()
    }

    /// Wait for the next change, apply it, and return it. `None` when
    /// live updates are unavailable or the store side is gone.
    pub async fn next_change(&mut self) -> Option<Change> {
        let change = self.changes.as_mut()?.recv().await?;
        self.list.apply(&change);
        Some(change)
    }

    /// Create a card in this row. Empty text issues no remote write and
    /// returns `None`; otherwise the generated card id is returned. The
    /// local list only changes when the Added event arrives.
    pub async fn create_card(&self, text: &str) -> KanSyncResult<Option<String>> {
        if text.trim().is_empty() || self.row.id.is_empty() {
            return Ok(None);
        }

        let card = Card {
            text: text.to_string(),
            body: String::new(),
            labels: Vec::new(),
            row_id: self.row.id.clone(),
            user: self.auth.id().unwrap_or_default().to_string(),
            created_at: Utc::now(),
        };
        let data =
            serde_json::to_value(&card).map_err(|e| KanSyncError::Serialization(e.to_string()))?;

        let id = with_retry(|| self.store.add(Collection::Cards, data.clone())).await?;
        tracing::debug!(row = %self.row.id, card = %id, "created card");
        Ok(Some(id))
    }

    // ------------------------------------------------------------------
    // Title editing (debounced)
    // ------------------------------------------------------------------

    /// Record a keystroke's resulting title. Nothing is written until
    /// the quiet period elapses or the edit is committed.
    pub fn edit_title(&mut self, text: &str) {
        self.editor.input(text, Instant::now());
    }

    /// When the pending title should be flushed, if one is pending.
    pub fn title_deadline(&self) -> Option<Instant> {
        self.editor.deadline()
    }

    /// Write the pending title if its quiet period has elapsed.
    pub async fn flush_due_title(&mut self) -> KanSyncResult<bool> {
        match self.editor.take_due(Instant::now()) {
            Some(title) => self.write_title(&title).await.map(|()| true),
            None => Ok(false),
        }
    }

    /// Blur: write the pending title immediately, due or not.
    pub async fn commit_title(&mut self) -> KanSyncResult<bool> {
        match self.editor.commit() {
            Some(title) => self.write_title(&title).await.map(|()| true),
            None => Ok(false),
        }
    }

    async fn write_title(&self, title: &str) -> KanSyncResult<()> {
        with_retry(|| self.store.update(Collection::Rows, &self.row.id, "title", json!(title)))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use std::collections::BTreeSet;
    use std::time::Duration;

    fn user() -> CurrentUser {
        CurrentUser::signed_in("u1", Some("Uma".to_string()))
    }

    fn row() -> RowView {
        RowView {
            id: "r1".to_string(),
            title: "Todo".to_string(),
        }
    }

    async fn add_card(store: &MemoryStore, row_id: &str, text: &str) -> String {
        store
            .add(
                Collection::Cards,
                json!({ "text": text, "body": "", "labels": [], "row_id": row_id, "user": "u1" }),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn added_modified_removed_scenario() {
        let store = MemoryStore::new();
        let mut controller = RowController::mount(store.clone(), user(), row()).await;

        let id = add_card(&store, "r1", "buy milk").await;
        controller.drain_changes();
        assert_eq!(controller.cards().len(), 1);
        assert_eq!(controller.cards()[0].id, id);
        assert_eq!(controller.cards()[0].text, "buy milk");

        store
            .update(Collection::Cards, &id, "text", json!("buy milk 2%"))
            .await
            .unwrap();
        controller.drain_changes();
        assert_eq!(controller.cards().len(), 1);
        assert_eq!(controller.cards()[0].text, "buy milk 2%");

        store.delete(Collection::Cards, &id).await.unwrap();
        controller.drain_changes();
        assert!(controller.cards().is_empty());
    }

    #[tokio::test]
    async fn modified_preserves_position() {
        let store = MemoryStore::new();
        let mut controller = RowController::mount(store.clone(), user(), row()).await;

        add_card(&store, "r1", "first").await;
        let middle = add_card(&store, "r1", "second").await;
        add_card(&store, "r1", "third").await;
        controller.drain_changes();

        store
            .update(Collection::Cards, &middle, "text", json!("second, edited"))
            .await
            .unwrap();
        controller.drain_changes();

        let texts: Vec<&str> = controller.cards().iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second, edited", "third"]);
    }

    #[test]
    fn modified_for_unknown_id_is_a_noop() {
        let mut list = CardList::default();
        list.apply(&Change {
            kind: ChangeKind::Modified,
            doc: crate::document::Document::new("ghost", json!({ "text": "boo" })),
        });
        assert!(list.cards().is_empty());
    }

    #[tokio::test]
    async fn list_tracks_store_membership() {
        let store = MemoryStore::new();
        let mut controller = RowController::mount(store.clone(), user(), row()).await;

        let a = add_card(&store, "r1", "a").await;
        let _b = add_card(&store, "r1", "b").await;
        let c = add_card(&store, "r1", "c").await;
        add_card(&store, "r2", "other row").await;
        store.delete(Collection::Cards, &a).await.unwrap();
        controller.drain_changes();

        // Length is added-minus-removed for this row's filter.
        assert_eq!(controller.cards().len(), 2);

        // Id set equality with the store's filtered collection.
        let local: BTreeSet<String> =
            controller.cards().iter().map(|card| card.id.clone()).collect();
        let remote: BTreeSet<String> = store
            .dump_collection(Collection::Cards)
            .into_iter()
            .filter(|(_, data)| data["row_id"] == json!("r1"))
            .map(|(id, _)| id)
            .collect();
        assert_eq!(local, remote);
        assert!(local.contains(&c));
    }

    #[tokio::test]
    async fn create_card_with_empty_text_issues_no_write() {
        let store = MemoryStore::new();
        let controller = RowController::mount(store.clone(), user(), row()).await;

        assert_eq!(controller.create_card("").await.unwrap(), None);
        assert_eq!(controller.create_card("   ").await.unwrap(), None);
        assert_eq!(store.len(Collection::Cards), 0);
    }

    #[tokio::test]
    async fn create_card_appears_via_subscription_only() {
        let store = MemoryStore::new();
        let mut controller = RowController::mount(store.clone(), user(), row()).await;

        let id = controller.create_card("write tests").await.unwrap().unwrap();

        // No optimistic insert: the list is empty until the Added event
        // is drained.
        assert!(controller.cards().is_empty());
        controller.drain_changes();
        assert_eq!(controller.cards().len(), 1);
        assert_eq!(controller.cards()[0].id, id);

        let doc = store.get(Collection::Cards, &id).await.unwrap();
        assert_eq!(doc.str_field("user"), Some("u1"));
    }

    #[tokio::test]
    async fn committed_title_is_written_once() {
        let store = MemoryStore::new();
        let row_id = store
            .add(
                Collection::Rows,
                json!({ "title": "Todo", "calendar_id": "cal1", "user": "u1" }),
            )
            .await
            .unwrap();
        let mut controller = RowController::mount(
            store.clone(),
            user(),
            RowView {
                id: row_id.clone(),
                title: "Todo".to_string(),
            },
        )
        .await;

        controller.edit_title("T");
        controller.edit_title("Tr");
        controller.edit_title("Triage");
        assert!(controller.commit_title().await.unwrap());

        let doc = store.get(Collection::Rows, &row_id).await.unwrap();
        assert_eq!(doc.str_field("title"), Some("Triage"));

        // Nothing left to commit.
        assert!(!controller.commit_title().await.unwrap());
    }

    #[tokio::test]
    async fn flush_waits_for_quiet_period() {
        let store = MemoryStore::new();
        let row_id = store
            .add(
                Collection::Rows,
                json!({ "title": "Todo", "calendar_id": "cal1", "user": "u1" }),
            )
            .await
            .unwrap();
        let mut controller = RowController::mount(
            store.clone(),
            user(),
            RowView {
                id: row_id.clone(),
                title: "Todo".to_string(),
            },
        )
        .await;

        controller.edit_title("Done");
        assert!(!controller.flush_due_title().await.unwrap());

        tokio::time::sleep(Duration::from_millis(450)).await;
        assert!(controller.flush_due_title().await.unwrap());

        let doc = store.get(Collection::Rows, &row_id).await.unwrap();
        assert_eq!(doc.str_field("title"), Some("Done"));
    }
}
