//! ticketry-core library.
//!
//! A support-ticket aggregate with an append-only audit trail, a soft-delete
//! lifecycle, a collision-free display-number allocator, and a reporting
//! query engine over a SQLite store.
//!
//! # Conventions
//!
//! - **Errors**: library functions return [`error::Result`]; every error
//!   carries a stable [`error::ErrorCode`]. `anyhow` is used only for config
//!   loading.
//! - **Logging**: `tracing` macros with structured fields (`ticket_id`,
//!   `display_number`, ...). `debug!` for reads, `info!` for lifecycle
//!   changes, `warn!` for lost update races.
//! - **Time**: all timestamps are UTC with microsecond precision.

pub mod alloc;
pub mod config;
pub mod db;
pub mod error;
pub mod lifecycle;
pub mod model;
pub mod query;
pub mod store;

pub use alloc::{IdentifierAllocator, MemoryAllocator};
pub use db::SqliteStore;
pub use error::{ErrorCode, Result, TicketError};
pub use lifecycle::LifecycleManager;
pub use model::{NewTicket, Ticket, TicketStatus};
pub use query::QueryEngine;
pub use store::TicketStore;
