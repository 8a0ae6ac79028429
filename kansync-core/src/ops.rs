//! Application-level store operations.
//!
//! Creating and renaming calendars, and the cascading deletes, live
//! here rather than on a controller: they span collections no single
//! controller owns. Cascades are application logic, not store
//! transactions: children are deleted one document at a time, and a
//! crash mid-cascade leaves orphans (the store offers nothing
//! stronger).

use serde_json::json;

use crate::auth::CurrentUser;
use crate::change::{ChangeKind, Filter};
use crate::document::{Calendar, Collection};
use crate::error::{KanSyncError, KanSyncResult};
use crate::retry::with_retry;
use crate::store::Store;

/// Create a calendar owned by the current user, returning its id.
pub async fn create_calendar<S: Store>(
    store: &S,
    auth: &CurrentUser,
    title: &str,
    background: &str,
) -> KanSyncResult<String> {
    let Some(user) = auth.id() else {
        return Err(KanSyncError::PermissionDenied(
            "sign in to create a calendar".to_string(),
        ));
    };
    if title.trim().is_empty() {
        return Err(KanSyncError::Invalid("calendar title is empty".to_string()));
    }

    let calendar = Calendar {
        title: title.to_string(),
        background: background.to_string(),
        user: user.to_string(),
    };
    let data = serde_json::to_value(&calendar)
        .map_err(|e| KanSyncError::Serialization(e.to_string()))?;

    let id = with_retry(|| store.add(Collection::Calendars, data.clone())).await?;
    tracing::debug!(calendar = %id, "created calendar");
    Ok(id)
}

/// Rename a calendar by field update. Returns whether a write was
/// issued; empty titles and ids are dropped without touching the store.
pub async fn rename_calendar<S: Store>(
    store: &S,
    calendar_id: &str,
    title: &str,
) -> KanSyncResult<bool> {
    if calendar_id.is_empty() || title.trim().is_empty() {
        return Ok(false);
    }
    with_retry(|| store.update(Collection::Calendars, calendar_id, "title", json!(title))).await?;
    Ok(true)
}

/// Delete a row and its cards.
pub async fn delete_row<S: Store>(store: &S, row_id: &str) -> KanSyncResult<()> {
    for card_id in member_ids(store, Collection::Cards, "row_id", row_id).await? {
        delete_ignoring_missing(store, Collection::Cards, &card_id).await?;
    }
    delete_ignoring_missing(store, Collection::Rows, row_id).await?;
    tracing::debug!(row = %row_id, "deleted row");
    Ok(())
}

/// Delete a calendar, its rows, and their cards.
pub async fn delete_calendar<S: Store>(store: &S, calendar_id: &str) -> KanSyncResult<()> {
    for row_id in member_ids(store, Collection::Rows, "calendar_id", calendar_id).await? {
        delete_row(store, &row_id).await?;
    }
    delete_ignoring_missing(store, Collection::Calendars, calendar_id).await?;
    tracing::debug!(calendar = %calendar_id, "deleted calendar");
    Ok(())
}

/// Enumerate the ids of a parent's children via a scoped subscription:
/// open, drain the initial snapshot, drop. The subscription mechanism is
/// the only read path for collection membership.
async fn member_ids<S: Store>(
    store: &S,
    collection: Collection,
    fk_field: &str,
    parent_id: &str,
) -> KanSyncResult<Vec<String>> {
    let mut sub = store
        .subscribe(collection, Filter::field_eq(fk_field, parent_id))
        .await?;
    Ok(sub
        .drain()
        .into_iter()
        .filter(|change| change.kind == ChangeKind::Added)
        .map(|change| change.doc.id)
        .collect())
}

/// A concurrent session may have deleted the document already; that
/// counts as done for a cascade.
async fn delete_ignoring_missing<S: Store>(
    store: &S,
    collection: Collection,
    id: &str,
) -> KanSyncResult<()> {
    match with_retry(|| store.delete(collection, id)).await {
        Ok(()) => Ok(()),
        Err(KanSyncError::NotFound(_)) => Ok(()),
        Err(err) => Err(err),
    }
}
