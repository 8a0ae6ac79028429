//! Authenticated-user context.
//!
//! Sign-in itself happens outside kansync; the controllers only ever read
//! who the current user is. The context is passed explicitly into each
//! controller at mount rather than consulted as ambient state.

use serde::{Deserialize, Serialize};

/// A signed-in user's identity and profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    /// Display name, when the identity system provides one.
    pub name: Option<String>,
}

/// The current authenticated user, or anonymous.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CurrentUser {
    #[default]
    Anonymous,
    SignedIn(User),
}

impl CurrentUser {
    pub fn signed_in(id: impl Into<String>, name: Option<String>) -> Self {
        CurrentUser::SignedIn(User {
            id: id.into(),
            name,
        })
    }

    /// The user id, `None` when anonymous.
    pub fn id(&self) -> Option<&str> {
        match self {
            CurrentUser::Anonymous => None,
            CurrentUser::SignedIn(user) => Some(user.id.as_str()),
        }
    }

    /// Whether this user owns a document with the given owner id.
    /// Anonymous users own nothing.
    pub fn owns(&self, owner: &str) -> bool {
        self.id() == Some(owner)
    }
}
