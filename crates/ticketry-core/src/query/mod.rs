//! Read and reporting operations over the ticket store.
//!
//! Every read excludes soft-deleted tickets. List reads sort by status
//! ascending (ties in store order) and are capped at the list limit, except
//! [`QueryEngine::get_all`]. Counts use inclusive date windows from
//! [`window`].

pub mod expand;
pub mod window;

pub use expand::{CommentView, ExpandPath, Expansion, GroupView, TicketView, expand};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{Result, TicketError};
use crate::model::TicketStatus;
use crate::store::{DateField, SortOrder, TicketFilter, TicketStore};

/// Default cap for list reads.
pub const DEFAULT_LIST_LIMIT: u32 = 100;

pub struct QueryEngine<S> {
    store: S,
    list_limit: u32,
}

impl<S: TicketStore> QueryEngine<S> {
    pub const fn new(store: S) -> Self {
        Self {
            store,
            list_limit: DEFAULT_LIST_LIMIT,
        }
    }

    #[must_use]
    pub const fn with_list_limit(mut self, list_limit: u32) -> Self {
        self.list_limit = list_limit;
        self
    }

    #[must_use]
    pub const fn list_limit(&self) -> u32 {
        self.list_limit
    }

    // -----------------------------------------------------------------------
    // Lists
    // -----------------------------------------------------------------------

    /// Every non-deleted ticket, uncapped.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub fn get_all(&self) -> Result<Vec<TicketView>> {
        self.list(&TicketFilter::default(), None)
    }

    /// Tickets whose group is one of `groups`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `groups` is empty, or a store error.
    pub fn get_by_groups<G: AsRef<str>>(&self, groups: &[G]) -> Result<Vec<TicketView>> {
        let filter = TicketFilter {
            groups: Some(require_groups(groups)?),
            ..TicketFilter::default()
        };
        self.list(&filter, Some(self.list_limit))
    }

    /// # Errors
    ///
    /// Returns `InvalidArgument` if `groups` is empty, or a store error.
    pub fn get_by_groups_and_status<G: AsRef<str>>(
        &self,
        groups: &[G],
        status: TicketStatus,
    ) -> Result<Vec<TicketView>> {
        let filter = TicketFilter {
            groups: Some(require_groups(groups)?),
            status: Some(status),
            ..TicketFilter::default()
        };
        self.list(&filter, Some(self.list_limit))
    }

    /// Open (not closed) tickets assigned to `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a blank user id, or a store error.
    pub fn get_assigned_to(&self, user_id: &str) -> Result<Vec<TicketView>> {
        if user_id.trim().is_empty() {
            return Err(TicketError::invalid("user id", "must not be empty"));
        }
        let filter = TicketFilter {
            assignee: Some(user_id.to_string()),
            exclude_status: Some(TicketStatus::Closed),
            ..TicketFilter::default()
        };
        self.list(&filter, Some(self.list_limit))
    }

    fn list(&self, filter: &TicketFilter, limit: Option<u32>) -> Result<Vec<TicketView>> {
        let tickets = self.store.find(filter, SortOrder::StatusAsc, limit)?;
        tracing::debug!(returned = tickets.len(), ?limit, "listed tickets");
        expand(&self.store, tickets, Expansion::FULL)
    }

    // -----------------------------------------------------------------------
    // Single lookups
    // -----------------------------------------------------------------------

    /// # Errors
    ///
    /// Returns `InvalidArgument` if `number <= 0`, `NotFound` if no live
    /// ticket carries it, or a store error.
    pub fn get_by_display_number(&self, number: i64) -> Result<TicketView> {
        if number <= 0 {
            return Err(TicketError::invalid(
                "display number",
                format!("{number} is not a positive number"),
            ));
        }
        let filter = TicketFilter {
            display_number: Some(number),
            ..TicketFilter::default()
        };
        self.single(&filter, Expansion::FULL)
            .and_then(|found| found.ok_or_else(|| TicketError::not_found(format!("#{number}"))))
    }

    /// # Errors
    ///
    /// Returns `InvalidArgument` for a blank id, `NotFound` if no live ticket
    /// has it, or a store error.
    pub fn get_by_id(&self, id: &str) -> Result<TicketView> {
        require_id(id)?;
        self.single(&TicketFilter::by_id(id), Expansion::FULL)
            .and_then(|found| found.ok_or_else(|| TicketError::not_found(id)))
    }

    /// The ticket's comments with their authors, and nothing else expanded.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a blank id, `NotFound` if no live ticket
    /// has it, or a store error.
    pub fn get_comments(&self, id: &str) -> Result<Vec<CommentView>> {
        require_id(id)?;
        let view = self
            .single(&TicketFilter::by_id(id), Expansion::COMMENTS)?
            .ok_or_else(|| TicketError::not_found(id))?;
        Ok(view.comments)
    }

    fn single(&self, filter: &TicketFilter, expansion: Expansion) -> Result<Option<TicketView>> {
        let Some(ticket) = self.store.find_one(filter)? else {
            return Ok(None);
        };
        Ok(expand(&self.store, vec![ticket], expansion)?.pop())
    }

    // -----------------------------------------------------------------------
    // Counts
    // -----------------------------------------------------------------------

    /// # Errors
    ///
    /// Returns a store error.
    pub fn count_all(&self) -> Result<u64> {
        self.count(&TicketFilter::default())
    }

    /// # Errors
    ///
    /// Returns a store error.
    pub fn count_by_status(&self, status: TicketStatus) -> Result<u64> {
        self.count(&TicketFilter {
            status: Some(status),
            ..TicketFilter::default()
        })
    }

    /// Tickets with `status` in the day ending at `date`; closed tickets are
    /// matched on their closed date, all others on creation date.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub fn count_by_status_and_date(
        &self,
        status: TicketStatus,
        date: DateTime<Utc>,
    ) -> Result<u64> {
        let field = if status.is_closed() {
            DateField::Closed
        } else {
            DateField::Created
        };
        self.count(&TicketFilter {
            status: Some(status),
            window: Some(window::day(field, date)),
            ..TicketFilter::default()
        })
    }

    /// Tickets created in the day ending at `date`.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub fn count_by_date(&self, date: DateTime<Utc>) -> Result<u64> {
        self.count(&TicketFilter {
            window: Some(window::day(DateField::Created, date)),
            ..TicketFilter::default()
        })
    }

    /// Count for zero-based `month` of the current UTC year.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `month > 11`, or a store error.
    pub fn count_by_month(&self, month: u32, status: Option<TicketStatus>) -> Result<u64> {
        self.count_by_month_in(window::current_year(), month, status)
    }

    /// Count for zero-based `month` of `year`.
    ///
    /// With no status (or `New`) every ticket created in the month counts.
    /// `Closed` counts closed tickets by closed date; any other status
    /// counts tickets with that status by creation date.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `month > 11` or `year` is out of range,
    /// or a store error.
    pub fn count_by_month_in(
        &self,
        year: i32,
        month: u32,
        status: Option<TicketStatus>,
    ) -> Result<u64> {
        let filter = match status {
            None | Some(TicketStatus::New) => TicketFilter {
                window: Some(window::month(DateField::Created, year, month)?),
                ..TicketFilter::default()
            },
            Some(TicketStatus::Closed) => TicketFilter {
                status: Some(TicketStatus::Closed),
                window: Some(window::month(DateField::Closed, year, month)?),
                ..TicketFilter::default()
            },
            Some(other) => TicketFilter {
                status: Some(other),
                window: Some(window::month(DateField::Created, year, month)?),
                ..TicketFilter::default()
            },
        };
        self.count(&filter)
    }

    /// Tickets created in `year`, optionally restricted to one status.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `year` is out of range, or a store error.
    pub fn count_by_year(&self, year: i32, status: Option<TicketStatus>) -> Result<u64> {
        self.count(&TicketFilter {
            status,
            window: Some(window::year(year)?),
            ..TicketFilter::default()
        })
    }

    fn count(&self, filter: &TicketFilter) -> Result<u64> {
        let count = self.store.count(filter)?;
        tracing::debug!(
            count,
            status = filter.status.map(TicketStatus::code),
            window = ?filter.window,
            "counted tickets"
        );
        Ok(count)
    }

    // -----------------------------------------------------------------------
    // Dashboard
    // -----------------------------------------------------------------------

    /// Headline numbers and a monthly created/closed series for `year`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `year` is out of range, or a store error.
    pub fn dashboard_summary(&self, year: i32) -> Result<DashboardSummary> {
        let created_in_year = self.count_by_year(year, None)?;
        let total = self.count_all()?;
        let by_status = TicketStatus::ALL
            .into_iter()
            .map(|status| {
                Ok(StatusCount {
                    status,
                    count: self.count_by_status(status)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let months = (0..12)
            .map(|month| {
                Ok(MonthBucket {
                    month,
                    created: self.count_by_month_in(year, month, None)?,
                    closed: self.count_by_month_in(year, month, Some(TicketStatus::Closed))?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(DashboardSummary {
            year,
            total,
            created_in_year,
            by_status,
            months,
        })
    }
}

/// Output of [`QueryEngine::dashboard_summary`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardSummary {
    pub year: i32,
    /// All live tickets.
    pub total: u64,
    pub created_in_year: u64,
    /// Live tickets per current status.
    pub by_status: Vec<StatusCount>,
    /// Twelve buckets, zero-based month.
    pub months: Vec<MonthBucket>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    pub status: TicketStatus,
    pub count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonthBucket {
    pub month: u32,
    pub created: u64,
    pub closed: u64,
}

fn require_groups<G: AsRef<str>>(groups: &[G]) -> Result<Vec<String>> {
    if groups.is_empty() {
        return Err(TicketError::invalid("groups", "at least one group is required"));
    }
    Ok(groups.iter().map(|g| g.as_ref().to_string()).collect())
}

fn require_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(TicketError::invalid("ticket id", "must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::QueryEngine;
    use crate::db::SqliteStore;
    use crate::error::{ErrorCode, TicketError};
    use crate::lifecycle::LifecycleManager;
    use crate::model::{Comment, NewTicket, Ticket, TicketStatus};

    fn new_ticket(group: &str, status: TicketStatus) -> NewTicket {
        NewTicket {
            owner: "acct-owner".into(),
            group: group.into(),
            ticket_type: "type-issue".into(),
            status,
            priority: 1,
            subject: "Monitor flickers".into(),
            issue: "Flicker at 60Hz".into(),
            tags: Vec::new(),
        }
    }

    fn create(store: &SqliteStore, group: &str, status: TicketStatus) -> Ticket {
        LifecycleManager::new(store, store)
            .create(new_ticket(group, status))
            .unwrap()
    }

    #[test]
    fn empty_group_list_is_invalid() {
        let store = SqliteStore::open_in_memory().unwrap();
        let engine = QueryEngine::new(&store);
        let none: [&str; 0] = [];
        assert!(matches!(
            engine.get_by_groups(&none),
            Err(TicketError::InvalidArgument { param: "groups", .. })
        ));
        assert!(matches!(
            engine.get_by_groups_and_status(&none, TicketStatus::Open),
            Err(TicketError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn group_lists_sort_by_status_and_cap() {
        let store = SqliteStore::open_in_memory().unwrap();
        create(&store, "grp-a", TicketStatus::Pending);
        create(&store, "grp-a", TicketStatus::New);
        create(&store, "grp-b", TicketStatus::Open);
        create(&store, "grp-c", TicketStatus::New);

        let engine = QueryEngine::new(&store);
        let views = engine.get_by_groups(&["grp-a", "grp-b"]).unwrap();
        let statuses: Vec<_> = views.iter().map(|v| v.ticket.status()).collect();
        assert_eq!(
            statuses,
            [TicketStatus::New, TicketStatus::Open, TicketStatus::Pending]
        );

        let capped = QueryEngine::new(&store).with_list_limit(2);
        assert_eq!(capped.get_by_groups(&["grp-a", "grp-b"]).unwrap().len(), 2);
        assert_eq!(capped.get_all().unwrap().len(), 4);

        let pending = engine
            .get_by_groups_and_status(&["grp-a"], TicketStatus::Pending)
            .unwrap();
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn single_lookups_validate_and_report_missing() {
        let store = SqliteStore::open_in_memory().unwrap();
        let ticket = create(&store, "grp-a", TicketStatus::New);
        let engine = QueryEngine::new(&store);

        assert_eq!(engine.get_by_id(ticket.id()).unwrap().ticket.id(), ticket.id());
        assert_eq!(
            engine.get_by_display_number(1).unwrap().ticket.id(),
            ticket.id()
        );
        assert_eq!(
            engine.get_by_display_number(0).unwrap_err().code(),
            ErrorCode::InvalidArgument
        );
        assert_eq!(
            engine.get_by_display_number(-4).unwrap_err().code(),
            ErrorCode::InvalidArgument
        );
        assert_eq!(
            engine.get_by_display_number(2).unwrap_err().code(),
            ErrorCode::TicketNotFound
        );
        assert_eq!(
            engine.get_by_id("").unwrap_err().code(),
            ErrorCode::InvalidArgument
        );
        assert_eq!(
            engine.get_comments("tk-missing").unwrap_err().code(),
            ErrorCode::TicketNotFound
        );
    }

    #[test]
    fn assigned_to_skips_closed_tickets() {
        let store = SqliteStore::open_in_memory().unwrap();
        let manager = LifecycleManager::new(&store, &store);
        for status in [TicketStatus::Open, TicketStatus::Closed, TicketStatus::Pending] {
            let mut ticket = manager.create(new_ticket("grp-a", status)).unwrap();
            ticket.set_assignee("acct-dana").unwrap();
            manager.save(&mut ticket).unwrap();
        }
        create(&store, "grp-a", TicketStatus::Open);

        let engine = QueryEngine::new(&store);
        let assigned = engine.get_assigned_to("acct-dana").unwrap();
        assert_eq!(assigned.len(), 2);
        assert!(assigned.iter().all(|v| !v.ticket.status().is_closed()));
        assert_eq!(
            engine.get_assigned_to(" ").unwrap_err().code(),
            ErrorCode::InvalidArgument
        );
    }

    #[test]
    fn get_comments_returns_comment_subtree() {
        let store = SqliteStore::open_in_memory().unwrap();
        let manager = LifecycleManager::new(&store, &store);
        let mut ticket = manager.create(new_ticket("grp-a", TicketStatus::Open)).unwrap();
        ticket.add_comment(Comment {
            id: "c1".into(),
            owner: "acct-owner".into(),
            body: "Still flickering".into(),
            date: crate::model::now(),
        });
        manager.save(&mut ticket).unwrap();

        let comments = QueryEngine::new(&store).get_comments(ticket.id()).unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].comment.body, "Still flickering");
        assert!(comments[0].owner_account.is_none());
    }

    #[test]
    fn soft_deleted_tickets_vanish_from_reads_and_counts() {
        let store = SqliteStore::open_in_memory().unwrap();
        let keep = create(&store, "grp-a", TicketStatus::Open);
        let gone = create(&store, "grp-a", TicketStatus::Open);
        LifecycleManager::new(&store, &store)
            .soft_delete(gone.id())
            .unwrap();

        let engine = QueryEngine::new(&store);
        assert_eq!(engine.count_all().unwrap(), 1);
        assert_eq!(engine.count_by_status(TicketStatus::Open).unwrap(), 1);
        let ids: Vec<_> = engine
            .get_all()
            .unwrap()
            .into_iter()
            .map(|v| v.ticket.id().to_string())
            .collect();
        assert_eq!(ids, [keep.id().to_string()]);
        assert_eq!(
            engine.get_by_id(gone.id()).unwrap_err().code(),
            ErrorCode::TicketNotFound
        );
        assert_eq!(
            engine.get_by_display_number(2).unwrap_err().code(),
            ErrorCode::TicketNotFound
        );
    }

    #[test]
    fn month_twelve_is_invalid() {
        let store = SqliteStore::open_in_memory().unwrap();
        let engine = QueryEngine::new(&store);
        assert_eq!(
            engine.count_by_month(12, None).unwrap_err().code(),
            ErrorCode::InvalidArgument
        );
    }

    #[test]
    fn dashboard_summary_has_twelve_buckets() {
        let store = SqliteStore::open_in_memory().unwrap();
        create(&store, "grp-a", TicketStatus::Open);
        create(&store, "grp-a", TicketStatus::Closed);

        let engine = QueryEngine::new(&store);
        let year = super::window::current_year();
        let summary = engine.dashboard_summary(year).unwrap();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.created_in_year, 2);
        assert_eq!(summary.months.len(), 12);
        let created: u64 = summary.months.iter().map(|m| m.created).sum();
        let closed: u64 = summary.months.iter().map(|m| m.closed).sum();
        assert!(created >= 2);
        assert!(closed >= 1);
        let open = summary
            .by_status
            .iter()
            .find(|s| s.status == TicketStatus::Open)
            .unwrap();
        assert_eq!(open.count, 1);
    }
}
