//! Field setters: `tk status`, `tk assign`, `tk priority`, `tk group`, `tk type`.
//!
//! Each command loads the ticket, applies one audited change, and saves it.
//! A concurrent writer surfaces as a version conflict rather than a lost update.

use clap::Args;
use ticketry_core::{Ticket, TicketStatus, TicketStore};

use super::Session;
use super::show::render_view;
use crate::output::OutputMode;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Ticket id or `#N`.
    pub key: String,
    /// New status, as a code (0-3) or name.
    pub status: TicketStatus,
}

#[derive(Args, Debug)]
pub struct AssignArgs {
    /// Ticket id or `#N`.
    pub key: String,
    /// Account id to assign.
    #[arg(required_unless_present = "clear")]
    pub user: Option<String>,
    /// Remove the current assignee.
    #[arg(long, conflicts_with = "user")]
    pub clear: bool,
}

#[derive(Args, Debug)]
pub struct PriorityArgs {
    /// Ticket id or `#N`.
    pub key: String,
    #[arg(allow_negative_numbers = true)]
    pub priority: i64,
}

#[derive(Args, Debug)]
pub struct GroupArgs {
    /// Ticket id or `#N`.
    pub key: String,
    /// Group id to move the ticket to.
    pub group: String,
}

#[derive(Args, Debug)]
pub struct TypeArgs {
    /// Ticket id or `#N`.
    pub key: String,
    /// Ticket type id; must be registered with `tk ref type`.
    #[arg(value_name = "TYPE")]
    pub ticket_type: String,
}

fn apply(
    session: &Session,
    key: &str,
    output: OutputMode,
    change: impl FnOnce(&mut Ticket) -> anyhow::Result<()>,
) -> anyhow::Result<()> {
    let mut ticket = session.load(key)?;
    change(&mut ticket)?;
    let view = session.save(&mut ticket)?;
    render_view(output, &view)
}

pub fn run_status(args: &StatusArgs, session: &Session, output: OutputMode) -> anyhow::Result<()> {
    apply(session, &args.key, output, |ticket| {
        ticket.set_status(args.status.code())?;
        Ok(())
    })
}

pub fn run_assign(args: &AssignArgs, session: &Session, output: OutputMode) -> anyhow::Result<()> {
    apply(session, &args.key, output, |ticket| {
        match args.user.as_deref() {
            Some(user) if !args.clear => {
                ticket.set_assignee(user)?;
            }
            _ => {
                ticket.clear_assignee();
            }
        }
        Ok(())
    })
}

pub fn run_priority(
    args: &PriorityArgs,
    session: &Session,
    output: OutputMode,
) -> anyhow::Result<()> {
    apply(session, &args.key, output, |ticket| {
        ticket.set_priority(args.priority);
        Ok(())
    })
}

pub fn run_group(args: &GroupArgs, session: &Session, output: OutputMode) -> anyhow::Result<()> {
    apply(session, &args.key, output, |ticket| {
        ticket.set_group(&args.group);
        Ok(())
    })
}

pub fn run_type(args: &TypeArgs, session: &Session, output: OutputMode) -> anyhow::Result<()> {
    let found = session.store.ticket_types(&[args.ticket_type.as_str()])?;
    let Some(ticket_type) = found.get(&args.ticket_type) else {
        anyhow::bail!(
            "unknown ticket type '{}'; register it with `tk ref type`",
            args.ticket_type
        );
    };
    apply(session, &args.key, output, |ticket| {
        ticket.set_type(ticket_type);
        Ok(())
    })
}
