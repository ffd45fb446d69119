//! Ticket aggregate, its audit trail, and the referenced records it points at.

pub mod history;
pub mod refs;
pub mod ticket;

pub use history::{AuditTrail, HistoryAction, HistoryEntry};
pub use refs::{Account, Comment, Group, TicketType};
pub use ticket::{NewTicket, Ticket, TicketRecord, TicketStatus};

use chrono::{DateTime, SubsecRound, Utc};

/// Current time truncated to the microsecond precision the store keeps.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// `<prefix>-` followed by 12 random base36 characters.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn generate_id(prefix: &str) -> String {
    const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut value: u64 = rand::random();
    let mut id = String::with_capacity(prefix.len() + 13);
    id.push_str(prefix);
    id.push('-');
    for _ in 0..12 {
        id.push(char::from(ALPHABET[(value % 36) as usize]));
        value /= 36;
    }
    id
}
