use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::generate_id;
use super::history::{AuditTrail, HistoryAction};
use super::refs::{Comment, TicketType};
use crate::alloc::IdentifierAllocator;
use crate::error::{Result, TicketError};

/// Ticket lifecycle status, stored and exchanged as its integer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum TicketStatus {
    New,
    Open,
    Pending,
    Closed,
}

impl TicketStatus {
    pub const ALL: [Self; 4] = [Self::New, Self::Open, Self::Pending, Self::Closed];

    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::New => 0,
            Self::Open => 1,
            Self::Pending => 2,
            Self::Closed => 3,
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Open => "open",
            Self::Pending => "pending",
            Self::Closed => "closed",
        }
    }

    /// Resolve an integer status code.
    ///
    /// # Errors
    ///
    /// Returns [`TicketError::InvalidArgument`] if `code` is not a defined status.
    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            0 => Ok(Self::New),
            1 => Ok(Self::Open),
            2 => Ok(Self::Pending),
            3 => Ok(Self::Closed),
            other => Err(TicketError::invalid(
                "status",
                format!("{other} is not a defined status code (expected 0-3)"),
            )),
        }
    }

    #[must_use]
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = TicketError;

    /// Accepts either the integer code or the lowercase name.
    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase();
        if let Ok(code) = normalized.parse::<i64>() {
            return Self::from_code(code);
        }
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| TicketError::invalid("status", format!("unknown status '{s}'")))
    }
}

impl TryFrom<i64> for TicketStatus {
    type Error = TicketError;

    fn try_from(code: i64) -> Result<Self> {
        Self::from_code(code)
    }
}

impl From<TicketStatus> for i64 {
    fn from(status: TicketStatus) -> Self {
        status.code()
    }
}

/// Caller-supplied fields for opening a ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTicket {
    pub owner: String,
    pub group: String,
    pub ticket_type: String,
    pub status: TicketStatus,
    pub priority: i64,
    pub subject: String,
    pub issue: String,
    pub tags: Vec<String>,
}

impl NewTicket {
    fn validate(&self) -> Result<()> {
        for (param, value) in [
            ("owner", &self.owner),
            ("group", &self.group),
            ("type", &self.ticket_type),
            ("subject", &self.subject),
            ("issue", &self.issue),
        ] {
            if value.trim().is_empty() {
                return Err(TicketError::invalid(param, "must not be empty"));
            }
        }
        Ok(())
    }
}

/// All persisted fields of a ticket.
///
/// Stores hydrate tickets from this shape via [`Ticket::hydrate`]; callers
/// mutate only through [`Ticket`] so every change is audited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketRecord {
    pub id: String,
    pub display_number: Option<i64>,
    pub owner: String,
    pub group: String,
    pub assignee: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted: bool,
    #[serde(rename = "type")]
    pub ticket_type: String,
    pub status: TicketStatus,
    pub priority: i64,
    pub tags: Vec<String>,
    pub subject: String,
    pub issue: String,
    pub closed_date: Option<DateTime<Utc>>,
    pub comments: Vec<Comment>,
    pub history: AuditTrail,
    /// Optimistic concurrency version; 0 means never persisted.
    pub version: u64,
}

/// The ticket aggregate: a record plus its audited mutators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Ticket {
    record: TicketRecord,
}

impl Ticket {
    /// Build a new, unpersisted ticket. The display number is allocated later
    /// by [`Ticket::ensure_display_number`].
    ///
    /// # Errors
    ///
    /// Returns [`TicketError::InvalidArgument`] if a required text field is blank.
    pub fn open(new: NewTicket) -> Result<Self> {
        new.validate()?;
        let now = super::now();
        Ok(Self {
            record: TicketRecord {
                id: generate_id("tk"),
                display_number: None,
                owner: new.owner,
                group: new.group,
                assignee: None,
                created_at: now,
                updated_at: None,
                deleted: false,
                ticket_type: new.ticket_type,
                status: new.status,
                priority: new.priority,
                tags: new.tags,
                subject: new.subject,
                issue: new.issue,
                closed_date: new.status.is_closed().then_some(now),
                comments: Vec::new(),
                history: AuditTrail::default(),
                version: 0,
            },
        })
    }

    /// Rehydrate a ticket loaded from a store.
    #[must_use]
    pub const fn hydrate(record: TicketRecord) -> Self {
        Self { record }
    }

    #[must_use]
    pub const fn record(&self) -> &TicketRecord {
        &self.record
    }

    #[must_use]
    pub fn into_record(self) -> TicketRecord {
        self.record
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.record.id
    }

    #[must_use]
    pub const fn display_number(&self) -> Option<i64> {
        self.record.display_number
    }

    #[must_use]
    pub const fn status(&self) -> TicketStatus {
        self.record.status
    }

    #[must_use]
    pub const fn priority(&self) -> i64 {
        self.record.priority
    }

    #[must_use]
    pub fn assignee(&self) -> Option<&str> {
        self.record.assignee.as_deref()
    }

    #[must_use]
    pub fn group(&self) -> &str {
        &self.record.group
    }

    #[must_use]
    pub fn ticket_type(&self) -> &str {
        &self.record.ticket_type
    }

    #[must_use]
    pub const fn closed_date(&self) -> Option<DateTime<Utc>> {
        self.record.closed_date
    }

    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.record.deleted
    }

    #[must_use]
    pub fn comments(&self) -> &[Comment] {
        &self.record.comments
    }

    #[must_use]
    pub const fn history(&self) -> &AuditTrail {
        &self.record.history
    }

    #[must_use]
    pub const fn version(&self) -> u64 {
        self.record.version
    }

    /// Allocate a display number unless one is already assigned.
    ///
    /// # Errors
    ///
    /// Propagates the allocator's [`crate::error::AllocationError`].
    pub fn ensure_display_number(&mut self, allocator: &dyn IdentifierAllocator) -> Result<i64> {
        if let Some(number) = self.record.display_number {
            return Ok(number);
        }
        let number = allocator.next_ticket_number()?;
        self.record.display_number = Some(number);
        Ok(number)
    }

    /// Set the status code. Entering closed stamps `closed_date` with the
    /// current time; any other status clears it.
    ///
    /// # Errors
    ///
    /// Returns [`TicketError::InvalidArgument`] if `code` is not a defined status.
    pub fn set_status(&mut self, code: i64) -> Result<&mut Self> {
        let status = TicketStatus::from_code(code)?;
        self.record.closed_date = status.is_closed().then(super::now);
        self.record.status = status;
        self.record.history.record(
            HistoryAction::SetStatus,
            format!("Ticket Status set to: {code}"),
        );
        Ok(self)
    }

    /// # Errors
    ///
    /// Returns [`TicketError::InvalidArgument`] if `user_id` is blank.
    pub fn set_assignee(&mut self, user_id: &str) -> Result<&mut Self> {
        if user_id.trim().is_empty() {
            return Err(TicketError::invalid("user id", "must not be empty"));
        }
        self.record.assignee = Some(user_id.to_string());
        self.record.history.record(
            HistoryAction::SetAssignee,
            format!("{user_id} was set as assignee"),
        );
        Ok(self)
    }

    pub fn clear_assignee(&mut self) -> &mut Self {
        self.record.assignee = None;
        self.record
            .history
            .record(HistoryAction::SetAssignee, "Assignee was cleared".to_string());
        self
    }

    pub fn set_type(&mut self, ticket_type: &TicketType) -> &mut Self {
        self.record.ticket_type.clone_from(&ticket_type.id);
        self.record.history.record(
            HistoryAction::SetType,
            format!("Ticket type set to: {}", ticket_type.name),
        );
        self
    }

    pub fn set_priority(&mut self, priority: i64) -> &mut Self {
        self.record.priority = priority;
        self.record.history.record(
            HistoryAction::SetPriority,
            format!("Ticket Priority set to: {priority}"),
        );
        self
    }

    pub fn set_group(&mut self, group_id: &str) -> &mut Self {
        self.record.group = group_id.to_string();
        self.record.history.record(
            HistoryAction::SetGroup,
            format!("Ticket Group set to: {group_id}"),
        );
        self
    }

    pub fn add_comment(&mut self, comment: Comment) -> &mut Self {
        let description = format!("Comment was added: {}", comment.id);
        self.record.comments.push(comment);
        self.record
            .history
            .record(HistoryAction::AddComment, description);
        self
    }

    /// Remove every comment whose id equals `comment_id`. Audited even when
    /// nothing matched.
    pub fn remove_comment(&mut self, comment_id: &str) -> &mut Self {
        self.record.comments.retain(|c| c.id != comment_id);
        self.record.history.record(
            HistoryAction::DeleteComment,
            format!("Comment was deleted: {comment_id}"),
        );
        self
    }

    /// `updated_at` is never maintained by the mutators; callers stamp it.
    pub fn set_updated_at(&mut self, at: DateTime<Utc>) -> &mut Self {
        self.record.updated_at = Some(at);
        self
    }

    pub(crate) fn mark_persisted(&mut self, version: u64) {
        self.record.version = version;
    }
}

#[allow(clippy::cast_possible_truncation)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::MemoryAllocator;
    use crate::error::{AllocationError, ErrorCode};
    use crate::model::history::HistoryAction;
    use chrono::Duration;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn new_ticket() -> NewTicket {
        NewTicket {
            owner: "acct-alice".into(),
            group: "grp-support".into(),
            ticket_type: "type-issue".into(),
            status: TicketStatus::Open,
            priority: 2,
            subject: "Printer on fire".into(),
            issue: "Third floor printer emits smoke".into(),
            tags: vec!["hardware".into()],
        }
    }

    fn comment(id: &str) -> Comment {
        Comment {
            id: id.into(),
            owner: "acct-bob".into(),
            body: format!("body of {id}"),
            date: Utc::now(),
        }
    }

    #[test]
    fn status_codes_round_trip() {
        for status in TicketStatus::ALL {
            assert_eq!(TicketStatus::from_code(status.code()).unwrap(), status);
            assert_eq!(status.to_string().parse::<TicketStatus>().unwrap(), status);
        }
        assert_eq!("3".parse::<TicketStatus>().unwrap(), TicketStatus::Closed);
        assert_eq!(serde_json::to_string(&TicketStatus::Pending).unwrap(), "2");
    }

    #[test]
    fn open_rejects_blank_required_fields() {
        let mut new = new_ticket();
        new.subject = "  ".into();
        let err = Ticket::open(new).unwrap_err();
        assert!(matches!(
            err,
            TicketError::InvalidArgument {
                param: "subject",
                ..
            }
        ));
    }

    #[test]
    fn open_starts_unnumbered_with_empty_history() {
        let ticket = Ticket::open(new_ticket()).unwrap();
        assert!(ticket.id().starts_with("tk-"));
        assert_eq!(ticket.id().len(), 15);
        assert_eq!(ticket.display_number(), None);
        assert!(ticket.history().is_empty());
        assert!(ticket.closed_date().is_none());
        assert!(ticket.record().updated_at.is_none());
        assert!(!ticket.is_deleted());
        assert_eq!(ticket.version(), 0);
    }

    #[test]
    fn open_closed_ticket_carries_closed_date() {
        let mut new = new_ticket();
        new.status = TicketStatus::Closed;
        let ticket = Ticket::open(new).unwrap();
        assert!(ticket.closed_date().is_some());
    }

    #[test]
    fn close_then_reopen_scenario() {
        let mut ticket = Ticket::open(new_ticket()).unwrap();

        ticket.set_status(3).unwrap();
        assert!(ticket.closed_date().is_some());
        assert_eq!(ticket.history().len(), 1);
        assert_eq!(ticket.history().entries()[0].action, HistoryAction::SetStatus);
        assert_eq!(
            ticket.history().entries()[0].description,
            "Ticket Status set to: 3"
        );

        ticket.set_status(1).unwrap();
        assert!(ticket.closed_date().is_none());
        assert_eq!(ticket.status(), TicketStatus::Open);
        assert_eq!(ticket.history().len(), 2);
    }

    #[test]
    fn reclosing_refreshes_closed_date() {
        let mut ticket = Ticket::open(new_ticket()).unwrap();
        ticket.set_status(3).unwrap();
        let first = ticket.closed_date().unwrap();

        ticket.set_status(1).unwrap();
        ticket.set_status(3).unwrap();
        let second = ticket.closed_date().unwrap();
        assert!(second >= first);

        // A second consecutive close still counts as a transition into closed.
        ticket.set_status(3).unwrap();
        assert!(ticket.closed_date().unwrap() >= second);
        assert_eq!(ticket.history().len(), 4);
    }

    #[test]
    fn undefined_status_is_rejected_without_side_effects() {
        let mut ticket = Ticket::open(new_ticket()).unwrap();
        let err = ticket.set_status(9).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
        assert_eq!(ticket.status(), TicketStatus::Open);
        assert!(ticket.history().is_empty());
    }

    #[test]
    fn assignee_set_and_clear() {
        let mut ticket = Ticket::open(new_ticket()).unwrap();
        ticket.set_assignee("acct-carol").unwrap();
        assert_eq!(ticket.assignee(), Some("acct-carol"));
        assert_eq!(
            ticket.history().last().unwrap().description,
            "acct-carol was set as assignee"
        );

        ticket.clear_assignee();
        assert_eq!(ticket.assignee(), None);
        let last = ticket.history().last().unwrap();
        assert_eq!(last.action, HistoryAction::SetAssignee);
        assert_eq!(last.description, "Assignee was cleared");
    }

    #[test]
    fn blank_assignee_is_rejected() {
        let mut ticket = Ticket::open(new_ticket()).unwrap();
        assert!(matches!(
            ticket.set_assignee(""),
            Err(TicketError::InvalidArgument { .. })
        ));
        assert!(ticket.history().is_empty());
    }

    #[test]
    fn type_priority_group_are_audited() {
        let mut ticket = Ticket::open(new_ticket()).unwrap();
        let task = TicketType {
            id: "type-task".into(),
            name: "Task".into(),
        };
        ticket
            .set_type(&task)
            .set_priority(5)
            .set_group("grp-billing");

        assert_eq!(ticket.ticket_type(), "type-task");
        assert_eq!(ticket.priority(), 5);
        assert_eq!(ticket.group(), "grp-billing");

        let descriptions: Vec<_> = ticket
            .history()
            .iter()
            .map(|e| (e.action, e.description.as_str()))
            .collect();
        assert_eq!(
            descriptions,
            [
                (HistoryAction::SetType, "Ticket type set to: Task"),
                (HistoryAction::SetPriority, "Ticket Priority set to: 5"),
                (HistoryAction::SetGroup, "Ticket Group set to: grp-billing"),
            ]
        );
    }

    #[test]
    fn remove_one_of_three_comments() {
        let mut ticket = Ticket::hydrate(TicketRecord {
            comments: vec![comment("c1"), comment("c2"), comment("c3")],
            ..Ticket::open(new_ticket()).unwrap().into_record()
        });

        ticket.remove_comment("c2");
        let ids: Vec<_> = ticket.comments().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["c1", "c3"]);
        assert_eq!(ticket.history().len(), 1);
        assert_eq!(
            ticket.history().last().unwrap().action,
            HistoryAction::DeleteComment
        );
    }

    #[test]
    fn remove_missing_comment_is_audited_noop() {
        let mut ticket = Ticket::open(new_ticket()).unwrap();
        ticket.add_comment(comment("c1"));
        ticket.remove_comment("nope");
        assert_eq!(ticket.comments().len(), 1);
        assert_eq!(ticket.history().len(), 2);
        assert_eq!(
            ticket.history().last().unwrap().description,
            "Comment was deleted: nope"
        );
    }

    #[test]
    fn remove_comment_drops_every_match() {
        let mut ticket = Ticket::open(new_ticket()).unwrap();
        ticket
            .add_comment(comment("dup"))
            .add_comment(comment("keep"))
            .add_comment(comment("dup"));
        ticket.remove_comment("dup");
        assert_eq!(ticket.comments().len(), 1);
        assert_eq!(ticket.comments()[0].id, "keep");
    }

    #[test]
    fn updated_at_is_caller_maintained() {
        let mut ticket = Ticket::open(new_ticket()).unwrap();
        ticket.set_priority(1).set_group("grp-x");
        assert!(ticket.record().updated_at.is_none());

        let stamp = Utc::now() + Duration::minutes(5);
        ticket.set_updated_at(stamp);
        assert_eq!(ticket.record().updated_at, Some(stamp));
        assert_eq!(ticket.history().len(), 2);
    }

    #[test]
    fn display_number_is_allocated_once() {
        struct Counting(AtomicUsize, MemoryAllocator);
        impl IdentifierAllocator for Counting {
            fn next_ticket_number(&self) -> std::result::Result<i64, AllocationError> {
                self.0.fetch_add(1, Ordering::SeqCst);
                self.1.next_ticket_number()
            }
        }

        let allocator = Counting(AtomicUsize::new(0), MemoryAllocator::default());
        let mut ticket = Ticket::open(new_ticket()).unwrap();
        assert_eq!(ticket.ensure_display_number(&allocator).unwrap(), 1);
        assert_eq!(ticket.ensure_display_number(&allocator).unwrap(), 1);
        assert_eq!(allocator.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn allocation_failure_leaves_ticket_unnumbered() {
        struct Offline;
        impl IdentifierAllocator for Offline {
            fn next_ticket_number(&self) -> std::result::Result<i64, AllocationError> {
                Err(AllocationError::missing("tickets"))
            }
        }

        let mut ticket = Ticket::open(new_ticket()).unwrap();
        let err = ticket.ensure_display_number(&Offline).unwrap_err();
        assert_eq!(err.code(), ErrorCode::AllocationFailed);
        assert_eq!(ticket.display_number(), None);
    }

    proptest! {
        #[test]
        fn closed_date_tracks_closed_status(codes in prop::collection::vec(0_i64..4, 1..40)) {
            let mut ticket = Ticket::open(new_ticket()).unwrap();
            for (n, code) in codes.iter().enumerate() {
                ticket.set_status(*code).unwrap();
                prop_assert_eq!(ticket.closed_date().is_some(), *code == 3);
                prop_assert_eq!(ticket.history().len(), n + 1);
                prop_assert_eq!(ticket.history().last().unwrap().action, HistoryAction::SetStatus);
            }
        }

        #[test]
        fn every_mutator_appends_exactly_one_entry(ops in prop::collection::vec(0_u8..7, 0..30)) {
            let mut ticket = Ticket::open(new_ticket()).unwrap();
            let kind = TicketType { id: "type-q".into(), name: "Question".into() };
            for (n, op) in ops.iter().enumerate() {
                let expected = match op {
                    0 => { ticket.set_status(2).unwrap(); HistoryAction::SetStatus }
                    1 => { ticket.set_assignee("acct-dan").unwrap(); HistoryAction::SetAssignee }
                    2 => { ticket.clear_assignee(); HistoryAction::SetAssignee }
                    3 => { ticket.set_type(&kind); HistoryAction::SetType }
                    4 => { ticket.set_priority(3); HistoryAction::SetPriority }
                    5 => { ticket.set_group("grp-ops"); HistoryAction::SetGroup }
                    _ => { ticket.remove_comment("c-none"); HistoryAction::DeleteComment }
                };
                prop_assert_eq!(ticket.history().len(), n + 1);
                prop_assert_eq!(ticket.history().last().unwrap().action, expected);
            }
        }
    }
}
