//! [`TicketStore`] and [`IdentifierAllocator`] backed by one SQLite connection.

use chrono::{DateTime, Utc};
use rusqlite::{
    Connection, OptionalExtension, TransactionBehavior, params, params_from_iter, types::ToSql,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use super::{DEFAULT_BUSY_TIMEOUT, open_connection, open_memory_connection};
use crate::alloc::{IdentifierAllocator, TICKET_COUNTER};
use crate::error::{AllocationError, Result, SqlResultExt, StoreError, TicketError};
use crate::model::{
    Account, AuditTrail, Comment, Group, HistoryAction, HistoryEntry, Ticket, TicketRecord,
    TicketStatus, TicketType,
};
use crate::store::{DateField, SortOrder, TicketFilter, TicketPatch, TicketStore};

/// Maximum bound parameters per `IN (...)` lookup.
const LOOKUP_CHUNK: usize = 500;

const TICKET_COLUMNS: &str = "t.ticket_id, t.display_number, t.owner_id, t.group_id, \
     t.assignee_id, t.type_id, t.status, t.priority, t.subject, t.issue, t.tags_json, \
     t.closed_at_us, t.created_at_us, t.updated_at_us, t.is_deleted, t.version";

/// SQLite-backed ticket store.
///
/// Each instance owns one connection. Several instances (or processes) may
/// share a database file; writes serialize through SQLite's write lock.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (or create) a store file with the default busy timeout.
    ///
    /// # Errors
    ///
    /// Returns a store error if the database cannot be opened or migrated.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// # Errors
    ///
    /// Returns a store error if the database cannot be opened or migrated.
    pub fn open_with_timeout(path: &Path, busy_timeout: Duration) -> Result<Self> {
        let conn = open_connection(path, busy_timeout)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// A private in-memory store, mainly for tests.
    ///
    /// # Errors
    ///
    /// Returns a store error if SQLite cannot create the database.
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Mutex::new(open_memory_connection()?),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Insert or replace an account used for owner/assignee expansion.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a blank id or username, or a store error.
    pub fn upsert_account(&self, account: &Account) -> Result<()> {
        require_id("account id", &account.id)?;
        if account.username.trim().is_empty() {
            return Err(TicketError::invalid("username", "must not be empty"));
        }
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO accounts (account_id, username, full_name, email)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(account_id) DO UPDATE SET
                username = excluded.username,
                full_name = excluded.full_name,
                email = excluded.email",
            params![account.id, account.username, account.full_name, account.email],
        )
        .op("upsert account")?;
        Ok(())
    }

    /// Insert or replace a group and its ordered member list.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a blank id, or a store error.
    pub fn upsert_group(&self, group: &Group) -> Result<()> {
        require_id("group id", &group.id)?;
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .op("begin group upsert")?;
        tx.execute(
            "INSERT INTO groups (group_id, name) VALUES (?1, ?2)
             ON CONFLICT(group_id) DO UPDATE SET name = excluded.name",
            params![group.id, group.name],
        )
        .op("upsert group")?;
        tx.execute(
            "DELETE FROM group_members WHERE group_id = ?1",
            [&group.id],
        )
        .op("clear group members")?;
        {
            let mut insert = tx
                .prepare(
                    "INSERT OR IGNORE INTO group_members (group_id, account_id, position)
                     VALUES (?1, ?2, ?3)",
                )
                .op("prepare group member insert")?;
            for (position, member) in group.member_ids.iter().enumerate() {
                insert
                    .execute(params![group.id, member, position_value(position)])
                    .op("insert group member")?;
            }
        }
        tx.commit().op("commit group upsert")?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `InvalidArgument` for a blank id, or a store error.
    pub fn upsert_ticket_type(&self, ticket_type: &TicketType) -> Result<()> {
        require_id("type id", &ticket_type.id)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO ticket_types (type_id, name) VALUES (?1, ?2)
             ON CONFLICT(type_id) DO UPDATE SET name = excluded.name",
            params![ticket_type.id, ticket_type.name],
        )
        .op("upsert ticket type")?;
        Ok(())
    }
}

impl TicketStore for SqliteStore {
    fn find(
        &self,
        filter: &TicketFilter,
        sort: SortOrder,
        limit: Option<u32>,
    ) -> Result<Vec<Ticket>> {
        let conn = self.lock()?;
        Ok(select_tickets(&conn, filter, sort, limit)?)
    }

    fn find_one(&self, filter: &TicketFilter) -> Result<Option<Ticket>> {
        let conn = self.lock()?;
        Ok(select_tickets(&conn, filter, SortOrder::Natural, Some(1))?
            .into_iter()
            .next())
    }

    fn update_one(&self, filter: &TicketFilter, patch: &TicketPatch) -> Result<Ticket> {
        let Some(deleted) = patch.deleted else {
            return Err(TicketError::invalid("patch", "no fields to update"));
        };

        let conn = self.lock()?;
        let (where_clause, mut param_values) = build_where(filter);
        param_values.push(Box::new(deleted));
        let sql = format!(
            "UPDATE tickets SET is_deleted = ?{n}
             WHERE rowid = (SELECT t.rowid FROM tickets t{where_clause} ORDER BY t.rowid LIMIT 1)
             RETURNING ticket_id",
            n = param_values.len()
        );
        let params_ref: Vec<&dyn ToSql> = param_values.iter().map(AsRef::as_ref).collect();
        let updated: Option<String> = conn
            .query_row(&sql, params_from_iter(params_ref), |row| row.get(0))
            .optional()
            .op("update ticket")?;

        let Some(ticket_id) = updated else {
            return Err(TicketError::not_found(describe_key(filter)));
        };
        tracing::debug!(ticket_id = %ticket_id, deleted, "patched ticket");

        let reread = TicketFilter {
            id: Some(ticket_id.clone()),
            include_deleted: true,
            ..TicketFilter::default()
        };
        select_tickets(&conn, &reread, SortOrder::Natural, Some(1))?
            .into_iter()
            .next()
            .ok_or_else(|| TicketError::not_found(ticket_id))
    }

    fn count(&self, filter: &TicketFilter) -> Result<u64> {
        let conn = self.lock()?;
        let (where_clause, param_values) = build_where(filter);
        let sql = format!("SELECT COUNT(*) FROM tickets t{where_clause}");
        let params_ref: Vec<&dyn ToSql> = param_values.iter().map(AsRef::as_ref).collect();
        let count: i64 = conn
            .query_row(&sql, params_from_iter(params_ref), |row| row.get(0))
            .op("count tickets")?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    fn save(&self, ticket: &Ticket) -> Result<u64> {
        let record = ticket.record();
        let display_number = record.display_number.ok_or_else(|| {
            TicketError::invalid("display number", "must be allocated before the first save")
        })?;
        let tags_json = serde_json::to_string(&record.tags).map_err(|e| StoreError::Corrupt {
            ticket_id: record.id.clone(),
            reason: format!("encode tags: {e}"),
        })?;

        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .op("begin ticket save")?;

        let stored: Option<(i64, bool)> = tx
            .query_row(
                "SELECT version, is_deleted FROM tickets WHERE ticket_id = ?1",
                [&record.id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .op("read ticket version")?;

        // Deleted rows are frozen; only update_one may touch them.
        if matches!(stored, Some((_, true))) {
            return Err(TicketError::not_found(record.id.clone()));
        }

        let expected = record.version;
        let next = match stored.map(|(version, _)| version) {
            None if expected == 0 => {
                tx.execute(
                    "INSERT INTO tickets (
                        ticket_id, display_number, owner_id, group_id, assignee_id,
                        type_id, status, priority, subject, issue, tags_json,
                        closed_at_us, created_at_us, updated_at_us, is_deleted, version
                     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, 1)",
                    params![
                        record.id,
                        display_number,
                        record.owner,
                        record.group,
                        record.assignee,
                        record.ticket_type,
                        record.status.code(),
                        record.priority,
                        record.subject,
                        record.issue,
                        tags_json,
                        record.closed_date.map(|at| at.timestamp_micros()),
                        record.created_at.timestamp_micros(),
                        record.updated_at.map(|at| at.timestamp_micros()),
                        record.deleted,
                    ],
                )
                .op("insert ticket")?;
                1
            }
            Some(current) if expected > 0 && u64::try_from(current).ok() == Some(expected) => {
                tx.execute(
                    "UPDATE tickets SET
                        display_number = ?2, owner_id = ?3, group_id = ?4, assignee_id = ?5,
                        type_id = ?6, status = ?7, priority = ?8, subject = ?9, issue = ?10,
                        tags_json = ?11, closed_at_us = ?12, updated_at_us = ?13,
                        version = version + 1
                     WHERE ticket_id = ?1 AND version = ?14 AND is_deleted = 0",
                    params![
                        record.id,
                        display_number,
                        record.owner,
                        record.group,
                        record.assignee,
                        record.ticket_type,
                        record.status.code(),
                        record.priority,
                        record.subject,
                        record.issue,
                        tags_json,
                        record.closed_date.map(|at| at.timestamp_micros()),
                        record.updated_at.map(|at| at.timestamp_micros()),
                        current,
                    ],
                )
                .op("update ticket")?;
                expected + 1
            }
            _ => {
                return Err(TicketError::Conflict {
                    ticket_id: record.id.clone(),
                    expected,
                });
            }
        };

        write_comments(&tx, &record.id, &record.comments)?;
        append_history(&tx, &record.id, &record.history)?;
        tx.commit().op("commit ticket save")?;

        tracing::debug!(
            ticket_id = %record.id,
            display_number,
            version = next,
            "saved ticket"
        );
        Ok(next)
    }

    fn accounts(&self, ids: &[&str]) -> Result<HashMap<String, Account>> {
        let conn = self.lock()?;
        let mut found = HashMap::new();
        for chunk in ids.chunks(LOOKUP_CHUNK) {
            let sql = format!(
                "SELECT account_id, username, full_name, email FROM accounts
                 WHERE account_id IN ({})",
                placeholders(chunk.len())
            );
            let mut stmt = conn.prepare(&sql).op("prepare account lookup")?;
            let rows = stmt
                .query_map(params_from_iter(chunk.iter()), |row| {
                    Ok(Account {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        full_name: row.get(2)?,
                        email: row.get(3)?,
                    })
                })
                .op("lookup accounts")?;
            for account in rows {
                let account = account.op("read account row")?;
                found.insert(account.id.clone(), account);
            }
        }
        Ok(found)
    }

    fn groups(&self, ids: &[&str]) -> Result<HashMap<String, Group>> {
        let conn = self.lock()?;
        let mut found: HashMap<String, Group> = HashMap::new();
        for chunk in ids.chunks(LOOKUP_CHUNK) {
            let marks = placeholders(chunk.len());
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT group_id, name FROM groups WHERE group_id IN ({marks})"
                ))
                .op("prepare group lookup")?;
            let rows = stmt
                .query_map(params_from_iter(chunk.iter()), |row| {
                    Ok(Group {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        member_ids: Vec::new(),
                    })
                })
                .op("lookup groups")?;
            for group in rows {
                let group = group.op("read group row")?;
                found.insert(group.id.clone(), group);
            }

            let mut members = conn
                .prepare(&format!(
                    "SELECT group_id, account_id FROM group_members
                     WHERE group_id IN ({marks})
                     ORDER BY group_id, position"
                ))
                .op("prepare group member lookup")?;
            let rows = members
                .query_map(params_from_iter(chunk.iter()), |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })
                .op("lookup group members")?;
            for member in rows {
                let (group_id, account_id) = member.op("read group member row")?;
                if let Some(group) = found.get_mut(&group_id) {
                    group.member_ids.push(account_id);
                }
            }
        }
        Ok(found)
    }

    fn ticket_types(&self, ids: &[&str]) -> Result<HashMap<String, TicketType>> {
        let conn = self.lock()?;
        let mut found = HashMap::new();
        for chunk in ids.chunks(LOOKUP_CHUNK) {
            let sql = format!(
                "SELECT type_id, name FROM ticket_types WHERE type_id IN ({})",
                placeholders(chunk.len())
            );
            let mut stmt = conn.prepare(&sql).op("prepare ticket type lookup")?;
            let rows = stmt
                .query_map(params_from_iter(chunk.iter()), |row| {
                    Ok(TicketType {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                })
                .op("lookup ticket types")?;
            for kind in rows {
                let kind = kind.op("read ticket type row")?;
                found.insert(kind.id.clone(), kind);
            }
        }
        Ok(found)
    }
}

impl IdentifierAllocator for SqliteStore {
    fn next_ticket_number(&self) -> std::result::Result<i64, AllocationError> {
        let conn = self
            .lock()
            .map_err(|e| AllocationError::new(TICKET_COUNTER, e))?;
        let next: Option<i64> = conn
            .query_row(
                "UPDATE counters SET next = next + 1 WHERE name = ?1 RETURNING next",
                [TICKET_COUNTER],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| AllocationError::new(TICKET_COUNTER, e))?;
        next.ok_or_else(|| AllocationError::missing(TICKET_COUNTER))
    }
}

// ---------------------------------------------------------------------------
// Query building
// ---------------------------------------------------------------------------

type ParamValues = Vec<Box<dyn ToSql>>;

fn build_where(filter: &TicketFilter) -> (String, ParamValues) {
    let mut conditions: Vec<String> = Vec::new();
    let mut param_values: ParamValues = Vec::new();

    if !filter.include_deleted {
        conditions.push("t.is_deleted = 0".to_string());
    }

    if let Some(ref id) = filter.id {
        param_values.push(Box::new(id.clone()));
        conditions.push(format!("t.ticket_id = ?{}", param_values.len()));
    }

    if let Some(number) = filter.display_number {
        param_values.push(Box::new(number));
        conditions.push(format!("t.display_number = ?{}", param_values.len()));
    }

    if let Some(ref groups) = filter.groups {
        if groups.is_empty() {
            conditions.push("0".to_string());
        } else {
            let mut marks = Vec::with_capacity(groups.len());
            for group in groups {
                param_values.push(Box::new(group.clone()));
                marks.push(format!("?{}", param_values.len()));
            }
            conditions.push(format!("t.group_id IN ({})", marks.join(", ")));
        }
    }

    if let Some(status) = filter.status {
        param_values.push(Box::new(status.code()));
        conditions.push(format!("t.status = ?{}", param_values.len()));
    }

    if let Some(status) = filter.exclude_status {
        param_values.push(Box::new(status.code()));
        conditions.push(format!("t.status <> ?{}", param_values.len()));
    }

    if let Some(ref assignee) = filter.assignee {
        param_values.push(Box::new(assignee.clone()));
        conditions.push(format!("t.assignee_id = ?{}", param_values.len()));
    }

    if let Some(window) = filter.window {
        let column = match window.field {
            DateField::Created => "t.created_at_us",
            DateField::Closed => "t.closed_at_us",
        };
        param_values.push(Box::new(window.start.timestamp_micros()));
        let start = param_values.len();
        param_values.push(Box::new(window.end.timestamp_micros()));
        let end = param_values.len();
        conditions.push(format!("{column} >= ?{start} AND {column} <= ?{end}"));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };
    (where_clause, param_values)
}

const fn sort_clause(sort: SortOrder) -> &'static str {
    match sort {
        SortOrder::StatusAsc => " ORDER BY t.status ASC, t.rowid ASC",
        SortOrder::Natural => " ORDER BY t.rowid ASC",
    }
}

fn placeholders(n: usize) -> String {
    (1..=n).map(|i| format!("?{i}")).collect::<Vec<_>>().join(", ")
}

fn describe_key(filter: &TicketFilter) -> String {
    filter
        .id
        .clone()
        .or_else(|| filter.display_number.map(|n| format!("#{n}")))
        .unwrap_or_else(|| "matching filter".to_string())
}

fn require_id(param: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(TicketError::invalid(param, "must not be empty"));
    }
    Ok(())
}

fn position_value(position: usize) -> i64 {
    i64::try_from(position).unwrap_or(i64::MAX)
}

// ---------------------------------------------------------------------------
// Row decoding
// ---------------------------------------------------------------------------

struct TicketRow {
    id: String,
    display_number: i64,
    owner: String,
    group: String,
    assignee: Option<String>,
    ticket_type: String,
    status: i64,
    priority: i64,
    subject: String,
    issue: String,
    tags_json: String,
    closed_at_us: Option<i64>,
    created_at_us: i64,
    updated_at_us: Option<i64>,
    deleted: bool,
    version: i64,
}

fn row_to_ticket_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TicketRow> {
    Ok(TicketRow {
        id: row.get(0)?,
        display_number: row.get(1)?,
        owner: row.get(2)?,
        group: row.get(3)?,
        assignee: row.get(4)?,
        ticket_type: row.get(5)?,
        status: row.get(6)?,
        priority: row.get(7)?,
        subject: row.get(8)?,
        issue: row.get(9)?,
        tags_json: row.get(10)?,
        closed_at_us: row.get(11)?,
        created_at_us: row.get(12)?,
        updated_at_us: row.get(13)?,
        deleted: row.get(14)?,
        version: row.get(15)?,
    })
}

fn corrupt(ticket_id: &str, reason: impl Into<String>) -> StoreError {
    StoreError::Corrupt {
        ticket_id: ticket_id.to_string(),
        reason: reason.into(),
    }
}

fn timestamp(ticket_id: &str, column: &str, micros: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| corrupt(ticket_id, format!("{column} {micros} is out of range")))
}

fn select_tickets(
    conn: &Connection,
    filter: &TicketFilter,
    sort: SortOrder,
    limit: Option<u32>,
) -> Result<Vec<Ticket>, StoreError> {
    let (where_clause, param_values) = build_where(filter);
    let limit_clause = limit.map(|n| format!(" LIMIT {n}")).unwrap_or_default();
    let sql = format!(
        "SELECT {TICKET_COLUMNS} FROM tickets t{where_clause}{}{limit_clause}",
        sort_clause(sort)
    );

    let mut stmt = conn.prepare(&sql).op("prepare ticket query")?;
    let params_ref: Vec<&dyn ToSql> = param_values.iter().map(AsRef::as_ref).collect();
    let rows = stmt
        .query_map(params_from_iter(params_ref), row_to_ticket_row)
        .op("query tickets")?;

    let mut ticket_rows = Vec::new();
    for row in rows {
        ticket_rows.push(row.op("read ticket row")?);
    }

    let ids: Vec<&str> = ticket_rows.iter().map(|row| row.id.as_str()).collect();
    let mut comments = load_comments(conn, &ids)?;
    let mut history = load_history(conn, &ids)?;

    ticket_rows
        .into_iter()
        .map(|row| {
            let comments = comments.remove(&row.id).unwrap_or_default();
            let history = history.remove(&row.id).unwrap_or_default();
            hydrate(row, comments, AuditTrail::from_entries(history))
        })
        .collect()
}

fn hydrate(
    row: TicketRow,
    comments: Vec<Comment>,
    history: AuditTrail,
) -> Result<Ticket, StoreError> {
    let status = TicketStatus::from_code(row.status)
        .map_err(|_| corrupt(&row.id, format!("status {} is not defined", row.status)))?;
    let tags: Vec<String> = serde_json::from_str(&row.tags_json)
        .map_err(|e| corrupt(&row.id, format!("tags_json: {e}")))?;
    let created_at = timestamp(&row.id, "created_at_us", row.created_at_us)?;
    let updated_at = row
        .updated_at_us
        .map(|us| timestamp(&row.id, "updated_at_us", us))
        .transpose()?;
    let closed_date = row
        .closed_at_us
        .map(|us| timestamp(&row.id, "closed_at_us", us))
        .transpose()?;
    let version = u64::try_from(row.version)
        .map_err(|_| corrupt(&row.id, format!("version {} is negative", row.version)))?;

    Ok(Ticket::hydrate(TicketRecord {
        id: row.id,
        display_number: Some(row.display_number),
        owner: row.owner,
        group: row.group,
        assignee: row.assignee,
        created_at,
        updated_at,
        deleted: row.deleted,
        ticket_type: row.ticket_type,
        status,
        priority: row.priority,
        tags,
        subject: row.subject,
        issue: row.issue,
        closed_date,
        comments,
        history,
        version,
    }))
}

/// Comments for every ticket in `ids`, keyed by ticket id, in stored order.
fn load_comments(
    conn: &Connection,
    ids: &[&str],
) -> Result<HashMap<String, Vec<Comment>>, StoreError> {
    let mut found: HashMap<String, Vec<Comment>> = HashMap::new();
    for chunk in ids.chunks(LOOKUP_CHUNK) {
        let sql = format!(
            "SELECT ticket_id, comment_id, owner_id, body, created_at_us FROM ticket_comments
             WHERE ticket_id IN ({}) ORDER BY ticket_id, position",
            placeholders(chunk.len())
        );
        let mut stmt = conn.prepare(&sql).op("prepare comment query")?;
        let rows = stmt
            .query_map(params_from_iter(chunk.iter()), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            })
            .op("query comments")?;

        for row in rows {
            let (ticket_id, id, owner, body, at) = row.op("read comment row")?;
            let date = timestamp(&ticket_id, "comment created_at_us", at)?;
            found.entry(ticket_id).or_default().push(Comment {
                id,
                owner,
                body,
                date,
            });
        }
    }
    Ok(found)
}

/// History entries for every ticket in `ids`, keyed by ticket id, in `seq` order.
fn load_history(
    conn: &Connection,
    ids: &[&str],
) -> Result<HashMap<String, Vec<HistoryEntry>>, StoreError> {
    let mut found: HashMap<String, Vec<HistoryEntry>> = HashMap::new();
    for chunk in ids.chunks(LOOKUP_CHUNK) {
        let sql = format!(
            "SELECT ticket_id, action, description, created_at_us FROM ticket_history
             WHERE ticket_id IN ({}) ORDER BY ticket_id, seq",
            placeholders(chunk.len())
        );
        let mut stmt = conn.prepare(&sql).op("prepare history query")?;
        let rows = stmt
            .query_map(params_from_iter(chunk.iter()), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })
            .op("query history")?;

        for row in rows {
            let (ticket_id, action, description, at) = row.op("read history row")?;
            let action: HistoryAction = action.parse().map_err(
                |e: crate::model::history::UnknownAction| corrupt(&ticket_id, e.to_string()),
            )?;
            let when = timestamp(&ticket_id, "history created_at_us", at)?;
            found.entry(ticket_id).or_default().push(HistoryEntry {
                action,
                description,
                timestamp: when,
            });
        }
    }
    Ok(found)
}

// ---------------------------------------------------------------------------
// Child rows
// ---------------------------------------------------------------------------

fn write_comments(
    conn: &Connection,
    ticket_id: &str,
    comments: &[Comment],
) -> Result<(), StoreError> {
    conn.execute(
        "DELETE FROM ticket_comments WHERE ticket_id = ?1",
        [ticket_id],
    )
    .op("clear comments")?;
    let mut insert = conn
        .prepare_cached(
            "INSERT INTO ticket_comments (ticket_id, position, comment_id, owner_id, body, created_at_us)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .op("prepare comment insert")?;
    for (position, comment) in comments.iter().enumerate() {
        insert
            .execute(params![
                ticket_id,
                position_value(position),
                comment.id,
                comment.owner,
                comment.body,
                comment.date.timestamp_micros(),
            ])
            .op("insert comment")?;
    }
    Ok(())
}

fn append_history(
    conn: &Connection,
    ticket_id: &str,
    history: &AuditTrail,
) -> Result<(), StoreError> {
    let persisted: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM ticket_history WHERE ticket_id = ?1",
            [ticket_id],
            |row| row.get(0),
        )
        .op("count history")?;
    let persisted = usize::try_from(persisted).unwrap_or_default();

    let mut insert = conn
        .prepare_cached(
            "INSERT INTO ticket_history (ticket_id, seq, action, description, created_at_us)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .op("prepare history insert")?;
    for (seq, entry) in history.iter().enumerate().skip(persisted) {
        insert
            .execute(params![
                ticket_id,
                position_value(seq),
                entry.action.as_str(),
                entry.description,
                entry.timestamp.timestamp_micros(),
            ])
            .op("append history")?;
    }
    Ok(())
}
