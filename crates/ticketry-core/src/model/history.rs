//! Append-only audit trail attached to every ticket.
//!
//! Each mutator on [`super::ticket::Ticket`] pushes exactly one
//! [`HistoryEntry`]. Entries are never edited, reordered, or removed; the
//! store only inserts rows past the persisted length.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fixed vocabulary of audit actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum HistoryAction {
    SetStatus,
    SetAssignee,
    SetType,
    SetPriority,
    SetGroup,
    DeleteComment,
    AddComment,
}

/// Error returned when parsing an unknown action tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownAction {
    pub raw: String,
}

impl fmt::Display for UnknownAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown history action '{}'", self.raw)
    }
}

impl std::error::Error for UnknownAction {}

impl HistoryAction {
    /// All known actions in catalog order.
    pub const ALL: [Self; 7] = [
        Self::SetStatus,
        Self::SetAssignee,
        Self::SetType,
        Self::SetPriority,
        Self::SetGroup,
        Self::DeleteComment,
        Self::AddComment,
    ];

    /// Return the canonical `ticket:<verb>:<noun>` tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SetStatus => "ticket:set:status",
            Self::SetAssignee => "ticket:set:assignee",
            Self::SetType => "ticket:set:type",
            Self::SetPriority => "ticket:set:priority",
            Self::SetGroup => "ticket:set:group",
            Self::DeleteComment => "ticket:delete:comment",
            Self::AddComment => "ticket:comment:added",
        }
    }
}

impl fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HistoryAction {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| UnknownAction { raw: s.to_string() })
    }
}

impl TryFrom<String> for HistoryAction {
    type Error = UnknownAction;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HistoryAction> for String {
    fn from(action: HistoryAction) -> Self {
        action.as_str().to_string()
    }
}

/// One audit record: what happened, in words, and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub action: HistoryAction,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

/// Ordered, append-only sequence of [`HistoryEntry`] values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditTrail(Vec<HistoryEntry>);

impl AuditTrail {
    /// Rebuild a trail from persisted entries, preserving their order.
    #[must_use]
    pub const fn from_entries(entries: Vec<HistoryEntry>) -> Self {
        Self(entries)
    }

    pub(crate) fn record(&mut self, action: HistoryAction, description: String) {
        self.0.push(HistoryEntry {
            action,
            description,
            timestamp: super::now(),
        });
    }

    #[must_use]
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn last(&self) -> Option<&HistoryEntry> {
        self.0.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, HistoryEntry> {
        self.0.iter()
    }
}

impl<'a> IntoIterator for &'a AuditTrail {
    type Item = &'a HistoryEntry;
    type IntoIter = std::slice::Iter<'a, HistoryEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::{AuditTrail, HistoryAction};

    #[test]
    fn action_tags_parse_back() {
        for action in HistoryAction::ALL {
            assert_eq!(action.as_str().parse::<HistoryAction>(), Ok(action));
        }
        assert!("ticket:set:title".parse::<HistoryAction>().is_err());
    }

    #[test]
    fn actions_serialize_as_tags() {
        let json = serde_json::to_string(&HistoryAction::DeleteComment).unwrap();
        assert_eq!(json, "\"ticket:delete:comment\"");
        let back: HistoryAction = serde_json::from_str("\"ticket:set:group\"").unwrap();
        assert_eq!(back, HistoryAction::SetGroup);
    }

    #[test]
    fn record_appends_in_call_order() {
        let mut trail = AuditTrail::default();
        trail.record(HistoryAction::SetStatus, "Ticket Status set to: 1".into());
        trail.record(HistoryAction::SetStatus, "Ticket Status set to: 1".into());
        trail.record(HistoryAction::SetPriority, "Ticket Priority set to: 2".into());

        let actions: Vec<_> = trail.iter().map(|e| e.action).collect();
        assert_eq!(
            actions,
            [
                HistoryAction::SetStatus,
                HistoryAction::SetStatus,
                HistoryAction::SetPriority
            ]
        );
        assert!(trail.entries()[0].timestamp <= trail.entries()[2].timestamp);
    }
}
