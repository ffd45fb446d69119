//! Command handlers for `tk`.
//!
//! Each handler takes its parsed args, an open [`Session`], and the resolved
//! [`OutputMode`](crate::output::OutputMode).

pub mod comment;
pub mod create;
pub mod delete;
pub mod list;
pub mod refs;
pub mod show;
pub mod stats;
pub mod update;

use std::path::Path;

use anyhow::Context;
use chrono::Utc;
use ticketry_core::config::TicketryConfig;
use ticketry_core::query::TicketView;
use ticketry_core::{LifecycleManager, QueryEngine, SqliteStore, Ticket};

/// An open store plus the settings commands read from config.
pub struct Session {
    pub store: SqliteStore,
    pub list_limit: u32,
}

impl Session {
    /// Open (and migrate) the database at `db`.
    pub fn open(db: &Path, config: &TicketryConfig) -> anyhow::Result<Self> {
        let store = SqliteStore::open_with_timeout(db, config.store.busy_timeout())
            .with_context(|| format!("Failed to open ticket store at {}", db.display()))?;
        tracing::debug!(db = %db.display(), "store opened");
        Ok(Self {
            store,
            list_limit: config.query.list_limit,
        })
    }

    pub const fn manager(&self) -> LifecycleManager<&SqliteStore, &SqliteStore> {
        LifecycleManager::new(&self.store, &self.store)
    }

    pub const fn engine(&self) -> QueryEngine<&SqliteStore> {
        QueryEngine::new(&self.store).with_list_limit(self.list_limit)
    }

    /// Resolve `key` as a ticket id, or as a display number when written
    /// `#N` or as bare digits.
    pub fn view(&self, key: &str) -> anyhow::Result<TicketView> {
        let view = match parse_display_number(key) {
            Some(number) => self.engine().get_by_display_number(number)?,
            None => self.engine().get_by_id(key)?,
        };
        Ok(view)
    }

    /// Load a ticket for mutation.
    pub fn load(&self, key: &str) -> anyhow::Result<Ticket> {
        Ok(self.view(key)?.ticket)
    }

    /// Stamp `updated_at`, save `ticket`, and return its freshly expanded view.
    pub fn save(&self, ticket: &mut Ticket) -> anyhow::Result<TicketView> {
        ticket.set_updated_at(Utc::now());
        self.manager().save(ticket)?;
        Ok(self.engine().get_by_id(ticket.id())?)
    }
}

fn parse_display_number(key: &str) -> Option<i64> {
    let digits = key.trim().strip_prefix('#').unwrap_or_else(|| key.trim());
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_bare_digits_are_display_numbers() {
        assert_eq!(parse_display_number("#12"), Some(12));
        assert_eq!(parse_display_number("7"), Some(7));
        assert_eq!(parse_display_number(" #3 "), Some(3));
    }

    #[test]
    fn ids_are_not_display_numbers() {
        assert_eq!(parse_display_number("tk-abc123"), None);
        assert_eq!(parse_display_number("#"), None);
        assert_eq!(parse_display_number("#-1"), None);
        assert_eq!(parse_display_number(""), None);
    }
}
