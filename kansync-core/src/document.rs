//! Store-neutral document types.
//!
//! These types describe what kansync persists: three collections of JSON
//! documents keyed by generated ids, each child carrying the id of its
//! parent. View-model types are the denormalized projections the
//! controllers keep locally; they parse leniently because the store is
//! schema-flexible and other writers may omit fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The collections kansync stores documents in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Calendars,
    Rows,
    Cards,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Calendars => "calendars",
            Collection::Rows => "rows",
            Collection::Cards => "cards",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted document: generated id plus schema-flexible payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

impl Document {
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        Document {
            id: id.into(),
            data,
        }
    }

    /// String field accessor, `None` when absent or not a string.
    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.data.get(field).and_then(Value::as_str)
    }
}

// ============================================================================
// Persisted payloads
// ============================================================================

/// A kanban board. Boards are called calendars throughout kansync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calendar {
    pub title: String,
    /// Display background color, e.g. `#6a8caf`.
    pub background: String,
    /// Owning user id. Only the owner may view or edit the calendar.
    pub user: String,
}

/// A list of cards within one calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub title: String,
    pub calendar_id: String,
    /// Creating user id. Recorded but not used as a visibility gate.
    pub user: String,
    pub created_at: DateTime<Utc>,
}

/// A single card within one row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub text: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub labels: Vec<String>,
    pub row_id: String,
    pub user: String,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// View-models
// ============================================================================

/// Calendar metadata held by the calendar controller after its point read.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarMeta {
    pub title: String,
    pub background: String,
    pub user: String,
}

impl CalendarMeta {
    pub fn from_doc(doc: &Document) -> Option<Self> {
        Some(CalendarMeta {
            title: doc.str_field("title")?.to_string(),
            background: doc.str_field("background").unwrap_or_default().to_string(),
            user: doc.str_field("user")?.to_string(),
        })
    }
}

/// The slice of a row document the calendar controller keeps per entry.
#[derive(Debug, Clone, PartialEq)]
pub struct RowView {
    pub id: String,
    pub title: String,
}

impl RowView {
    pub fn from_doc(doc: &Document) -> Option<Self> {
        Some(RowView {
            id: doc.id.clone(),
            title: doc.str_field("title")?.to_string(),
        })
    }
}

/// The slice of a card document the row controller keeps per entry.
#[derive(Debug, Clone, PartialEq)]
pub struct CardView {
    pub id: String,
    pub text: String,
    pub body: String,
    pub labels: Vec<String>,
}

impl CardView {
    pub fn from_doc(doc: &Document) -> Option<Self> {
        let labels = doc
            .data
            .get("labels")
            .and_then(Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Some(CardView {
            id: doc.id.clone(),
            text: doc.str_field("text")?.to_string(),
            body: doc.str_field("body").unwrap_or_default().to_string(),
            labels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn card_view_parses_full_document() {
        let doc = Document::new(
            "c1",
            json!({
                "text": "buy milk",
                "body": "2% if they have it",
                "labels": ["errand", "food"],
                "row_id": "r1",
                "user": "u1",
            }),
        );

        let view = CardView::from_doc(&doc).unwrap();
        assert_eq!(view.id, "c1");
        assert_eq!(view.text, "buy milk");
        assert_eq!(view.body, "2% if they have it");
        assert_eq!(view.labels, vec!["errand", "food"]);
    }

    #[test]
    fn card_view_defaults_optional_fields() {
        let doc = Document::new("c2", json!({ "text": "call mom" }));

        let view = CardView::from_doc(&doc).unwrap();
        assert_eq!(view.body, "");
        assert!(view.labels.is_empty());
    }

    #[test]
    fn card_view_rejects_missing_text() {
        let doc = Document::new("c3", json!({ "body": "no text here" }));
        assert!(CardView::from_doc(&doc).is_none());
    }

    #[test]
    fn row_document_roundtrips() {
        let row = Row {
            title: "Doing".to_string(),
            calendar_id: "cal1".to_string(),
            user: "u1".to_string(),
            created_at: Utc::now(),
        };

        let value = serde_json::to_value(&row).unwrap();
        let back: Row = serde_json::from_value(value).unwrap();
        assert_eq!(back, row);
    }
}
