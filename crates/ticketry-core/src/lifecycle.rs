//! Creation, persistence, and soft deletion of tickets.
//!
//! The manager is the only place that talks to both the allocator and the
//! store. Mutators on [`Ticket`] stay store-free; callers hand the mutated
//! aggregate back through [`LifecycleManager::save`].

use crate::alloc::IdentifierAllocator;
use crate::error::{Result, TicketError};
use crate::model::{NewTicket, Ticket};
use crate::store::{TicketFilter, TicketPatch, TicketStore};

pub struct LifecycleManager<S, A> {
    store: S,
    allocator: A,
}

impl<S: TicketStore, A: IdentifierAllocator> LifecycleManager<S, A> {
    pub const fn new(store: S, allocator: A) -> Self {
        Self { store, allocator }
    }

    /// Open a ticket, allocate its display number, and persist it.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for blank required fields, an allocation
    /// error if no number can be issued, or a store error.
    pub fn create(&self, new: NewTicket) -> Result<Ticket> {
        let mut ticket = Ticket::open(new)?;
        self.save(&mut ticket)?;
        tracing::info!(
            ticket_id = %ticket.id(),
            display_number = ticket.display_number(),
            group = %ticket.group(),
            status = ticket.status().code(),
            "created ticket"
        );
        Ok(ticket)
    }

    /// Persist a ticket, allocating its display number first if it has none.
    ///
    /// On success the ticket's version is advanced so it can be saved again.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the stored ticket changed since it was loaded,
    /// `NotFound` if it has been soft-deleted, an allocation error, or a
    /// store error.
    pub fn save(&self, ticket: &mut Ticket) -> Result<u64> {
        ticket.ensure_display_number(&self.allocator)?;
        match self.store.save(ticket) {
            Ok(version) => {
                ticket.mark_persisted(version);
                Ok(version)
            }
            Err(err) => {
                if let TicketError::Conflict { expected, .. } = err {
                    tracing::warn!(
                        ticket_id = %ticket.id(),
                        expected,
                        "ticket save lost a concurrent update race"
                    );
                }
                Err(err)
            }
        }
    }

    /// Mark a ticket deleted in one atomic store write and return the
    /// updated record. Deleting an already deleted ticket succeeds again.
    /// No history entry is recorded.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a blank id, `NotFound` if no ticket has
    /// that id, or a store error.
    pub fn soft_delete(&self, id: &str) -> Result<Ticket> {
        require_id(id)?;
        let filter = TicketFilter {
            include_deleted: true,
            ..TicketFilter::by_id(id)
        };
        let ticket = self.store.update_one(&filter, &TicketPatch::SOFT_DELETE)?;
        tracing::info!(
            ticket_id = %ticket.id(),
            display_number = ticket.display_number(),
            "soft-deleted ticket"
        );
        Ok(ticket)
    }

    /// True when a non-deleted ticket with this id exists.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a blank id, or a store error.
    pub fn exists(&self, id: &str) -> Result<bool> {
        require_id(id)?;
        Ok(self.store.count(&TicketFilter::by_id(id))? > 0)
    }
}

fn require_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(TicketError::invalid("ticket id", "must not be empty"));
    }
    Ok(())
}
