//! `tk create`: open a new ticket and assign its display number.

use clap::Args;
use ticketry_core::{NewTicket, TicketStatus};

use super::Session;
use super::show::render_view;
use crate::output::OutputMode;

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Account id of the reporter.
    #[arg(long)]
    pub owner: String,

    /// Group id the ticket belongs to.
    #[arg(long)]
    pub group: String,

    /// Ticket type id.
    #[arg(long = "type", value_name = "TYPE")]
    pub ticket_type: String,

    /// One-line summary.
    #[arg(long)]
    pub subject: String,

    /// Full problem description.
    #[arg(long)]
    pub issue: String,

    #[arg(long, default_value_t = 1)]
    pub priority: i64,

    /// Initial status, as a code (0-3) or name.
    #[arg(long, default_value = "new")]
    pub status: TicketStatus,

    /// Tag to attach (repeatable).
    #[arg(long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,
}

pub fn run_create(args: CreateArgs, session: &Session, output: OutputMode) -> anyhow::Result<()> {
    let ticket = session.manager().create(NewTicket {
        owner: args.owner,
        group: args.group,
        ticket_type: args.ticket_type,
        status: args.status,
        priority: args.priority,
        subject: args.subject,
        issue: args.issue,
        tags: args.tags,
    })?;
    let view = session.engine().get_by_id(ticket.id())?;
    render_view(output, &view)
}
