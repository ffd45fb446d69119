//! `tk delete`: soft-delete a ticket.
//!
//! The row stays in the store with its history intact; every read and count
//! skips it afterwards. Deleting an already deleted ticket is accepted.


use clap::Args;
use serde::Serialize;

use super::Session;
use crate::output::{OutputMode, render_mode};

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Ticket id, or `#N` while the ticket is still live.
    pub key: String,
}

#[derive(Debug, Serialize)]
struct DeleteOutput {
    id: String,
    display_number: Option<i64>,
    deleted: bool,
}

pub fn run_delete(args: &DeleteArgs, session: &Session, output: OutputMode) -> anyhow::Result<()> {
    // Display numbers resolve through live reads only; ids go straight to the store.
    let id = if args.key.starts_with('#') || args.key.bytes().all(|b| b.is_ascii_digit()) {
        session.load(&args.key)?.id().to_string()
    } else {
        args.key.clone()
    };
    let ticket = session.manager().soft_delete(&id)?;
    let result = DeleteOutput {
        id: ticket.id().to_string(),
        display_number: ticket.display_number(),
        deleted: ticket.is_deleted(),
    };
    render_mode(
        output,
        &result,
        |r, w| writeln!(w, "{}\tdeleted", r.id),
        |r, w| writeln!(w, "Deleted {}", r.id),
    )
}
