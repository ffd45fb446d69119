//! Referenced records owned by other parts of the application.
//!
//! The ticket core only stores identifiers for these and expands them on
//! read; it never validates or mutates them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub username: String,
    pub full_name: Option<String>,
    pub email: Option<String>,
}

/// A group of accounts; tickets are scoped to exactly one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub member_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketType {
    pub id: String,
    pub name: String,
}

/// A comment embedded in a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub owner: String,
    pub body: String,
    pub date: DateTime<Utc>,
}

impl Comment {
    /// A new comment stamped now with a fresh `cm-` id.
    pub fn new(owner: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: super::generate_id("cm"),
            owner: owner.into(),
            body: body.into(),
            date: super::now(),
        }
    }
}
