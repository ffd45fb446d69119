//! Persistence contract consumed by the lifecycle manager and query engine.
//!
//! A [`TicketStore`] executes filters, counts, one atomic patch operation,
//! versioned saves, and batched lookups of referenced records. The SQLite
//! implementation lives in [`crate::db::SqliteStore`].

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::error::Result;
use crate::model::{Account, Group, Ticket, TicketStatus, TicketType};

/// Which timestamp a [`DateWindow`] applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateField {
    /// The ticket's creation date.
    Created,
    /// The ticket's `closed_date`.
    Closed,
}

/// A time range matched inclusively on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub field: DateField,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateWindow {
    #[must_use]
    pub const fn new(field: DateField, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { field, start, end }
    }

    /// True when `at` lies within `[start, end]`.
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }
}

/// Filter criteria for ticket reads.
///
/// All fields are optional and combine with AND semantics. Soft-deleted
/// tickets are excluded unless `include_deleted` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketFilter {
    /// Exact ticket id.
    pub id: Option<String>,
    /// Exact display number.
    pub display_number: Option<i64>,
    /// Group membership (`group IN groups`).
    pub groups: Option<Vec<String>>,
    /// Exact status.
    pub status: Option<TicketStatus>,
    /// Status to exclude.
    pub exclude_status: Option<TicketStatus>,
    /// Exact assignee.
    pub assignee: Option<String>,
    /// Inclusive date window.
    pub window: Option<DateWindow>,
    /// Include soft-deleted tickets (default: false).
    pub include_deleted: bool,
}

impl TicketFilter {
    #[must_use]
    pub fn by_id(id: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            ..Self::default()
        }
    }

    /// Evaluate the filter against an in-memory ticket.
    #[must_use]
    pub fn matches(&self, ticket: &Ticket) -> bool {
        let record = ticket.record();
        if record.deleted && !self.include_deleted {
            return false;
        }
        if self.id.as_deref().is_some_and(|id| id != record.id) {
            return false;
        }
        if self
            .display_number
            .is_some_and(|n| record.display_number != Some(n))
        {
            return false;
        }
        if self
            .groups
            .as_ref()
            .is_some_and(|groups| !groups.contains(&record.group))
        {
            return false;
        }
        if self.status.is_some_and(|s| s != record.status) {
            return false;
        }
        if self.exclude_status.is_some_and(|s| s == record.status) {
            return false;
        }
        if self
            .assignee
            .as_deref()
            .is_some_and(|a| record.assignee.as_deref() != Some(a))
        {
            return false;
        }
        match self.window {
            Some(window) => {
                let at = match window.field {
                    DateField::Created => Some(record.created_at),
                    DateField::Closed => record.closed_date,
                };
                at.is_some_and(|at| window.contains(at))
            }
            None => true,
        }
    }
}

/// Sort order for list reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Status ascending, ties in natural store order.
    #[default]
    StatusAsc,
    /// Natural store order.
    Natural,
}

/// Field changes applied by [`TicketStore::update_one`] as one atomic write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TicketPatch {
    pub deleted: Option<bool>,
}

impl TicketPatch {
    pub const SOFT_DELETE: Self = Self {
        deleted: Some(true),
    };

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.deleted.is_none()
    }
}

/// Persistence collaborator for tickets and their referenced records.
pub trait TicketStore {
    /// Tickets matching `filter` in `sort` order, at most `limit` of them.
    ///
    /// # Errors
    ///
    /// Returns a store error if the query fails.
    fn find(&self, filter: &TicketFilter, sort: SortOrder, limit: Option<u32>)
    -> Result<Vec<Ticket>>;

    /// The first ticket matching `filter`, if any.
    ///
    /// # Errors
    ///
    /// Returns a store error if the query fails.
    fn find_one(&self, filter: &TicketFilter) -> Result<Option<Ticket>>;

    /// Apply `patch` to the first ticket matching `filter` in a single write
    /// and return the updated ticket.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when nothing matches, or a store error.
    fn update_one(&self, filter: &TicketFilter, patch: &TicketPatch) -> Result<Ticket>;

    /// Number of tickets matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns a store error if the query fails.
    fn count(&self, filter: &TicketFilter) -> Result<u64>;

    /// Persist the aggregate and return its new version.
    ///
    /// A ticket with version 0 is inserted; otherwise the stored version must
    /// equal `ticket.version()`. History rows already stored are never
    /// rewritten. A soft-deleted row is never written.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` on a version mismatch, `NotFound` if the stored
    /// ticket is soft-deleted, `InvalidArgument` if the ticket has no display
    /// number, or a store error.
    fn save(&self, ticket: &Ticket) -> Result<u64>;

    /// Batched account lookup; unknown ids are absent from the map.
    ///
    /// # Errors
    ///
    /// Returns a store error if the query fails.
    fn accounts(&self, ids: &[&str]) -> Result<HashMap<String, Account>>;

    /// Batched group lookup including member ids.
    ///
    /// # Errors
    ///
    /// Returns a store error if the query fails.
    fn groups(&self, ids: &[&str]) -> Result<HashMap<String, Group>>;

    /// Batched ticket type lookup.
    ///
    /// # Errors
    ///
    /// Returns a store error if the query fails.
    fn ticket_types(&self, ids: &[&str]) -> Result<HashMap<String, TicketType>>;
}

impl<T: TicketStore + ?Sized> TicketStore for &T {
    fn find(
        &self,
        filter: &TicketFilter,
        sort: SortOrder,
        limit: Option<u32>,
    ) -> Result<Vec<Ticket>> {
        (**self).find(filter, sort, limit)
    }

    fn find_one(&self, filter: &TicketFilter) -> Result<Option<Ticket>> {
        (**self).find_one(filter)
    }

    fn update_one(&self, filter: &TicketFilter, patch: &TicketPatch) -> Result<Ticket> {
        (**self).update_one(filter, patch)
    }

    fn count(&self, filter: &TicketFilter) -> Result<u64> {
        (**self).count(filter)
    }

    fn save(&self, ticket: &Ticket) -> Result<u64> {
        (**self).save(ticket)
    }

    fn accounts(&self, ids: &[&str]) -> Result<HashMap<String, Account>> {
        (**self).accounts(ids)
    }

    fn groups(&self, ids: &[&str]) -> Result<HashMap<String, Group>> {
        (**self).groups(ids)
    }

    fn ticket_types(&self, ids: &[&str]) -> Result<HashMap<String, TicketType>> {
        (**self).ticket_types(ids)
    }
}
