use std::sync::atomic::{AtomicI64, Ordering};

use crate::error::AllocationError;

/// Name of the counter row that issues ticket display numbers.
pub const TICKET_COUNTER: &str = "tickets";

/// Issues monotonically increasing, collision-free ticket display numbers.
///
/// Implementations must be safe under concurrent callers: two calls never
/// return the same number, and each call returns a number greater than any
/// number returned before it.
pub trait IdentifierAllocator {
    /// Atomically increment the ticket counter and return the new value.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError`] if the counter store cannot be reached.
    fn next_ticket_number(&self) -> Result<i64, AllocationError>;
}

/// Process-local allocator backed by an atomic integer.
///
/// Only unique within one process; use the SQLite counter when several
/// processes share a database.
#[derive(Debug, Default)]
pub struct MemoryAllocator {
    last: AtomicI64,
}

impl MemoryAllocator {
    /// Start numbering after `last` (the first allocation returns `last + 1`).
    #[must_use]
    pub const fn starting_after(last: i64) -> Self {
        Self {
            last: AtomicI64::new(last),
        }
    }
}

impl IdentifierAllocator for MemoryAllocator {
    fn next_ticket_number(&self) -> Result<i64, AllocationError> {
        Ok(self.last.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

impl<T: IdentifierAllocator + ?Sized> IdentifierAllocator for &T {
    fn next_ticket_number(&self) -> Result<i64, AllocationError> {
        (**self).next_ticket_number()
    }
}
