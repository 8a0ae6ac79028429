//! Incremental change events delivered by live subscriptions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::document::Document;

/// What happened to a document matching a subscription's filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
}

impl ChangeKind {
    pub fn symbol(&self) -> &'static str {
        match self {
            ChangeKind::Added => "+",
            ChangeKind::Removed => "-",
            ChangeKind::Modified => "~",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A single change event. `doc` carries the document's state after the
/// change (for `Removed`, its last known state).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub kind: ChangeKind,
    pub doc: Document,
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.doc.id)
    }
}

/// Single-field equality filter, the only query shape subscriptions
/// support: child documents are selected by their foreign-key field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub value: String,
}

impl Filter {
    pub fn field_eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Filter {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Whether a document matches this filter.
    pub fn matches(&self, doc: &Document) -> bool {
        doc.str_field(&self.field) == Some(self.value.as_str())
    }
}
