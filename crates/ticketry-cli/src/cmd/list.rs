//! `tk list`: scoped ticket listing.
//!
//! `--assignee` lists open work for one account, `--group` scopes to groups,
//! and with neither every live ticket is listed. Results are sorted by status.


use clap::Args;
use ticketry_core::TicketStatus;
use ticketry_core::query::TicketView;

use super::Session;
use super::show::{ROW_HEADERS, display_number, write_row};
use crate::output::{OutputMode, pretty_rule, render_mode};

#[derive(Args, Debug, Default)]
pub struct ListArgs {
    /// Group id to include (repeatable).
    #[arg(long = "group", value_name = "GROUP")]
    pub groups: Vec<String>,

    /// Only tickets in this status (code or name).
    #[arg(long)]
    pub status: Option<TicketStatus>,

    /// Only non-closed tickets assigned to this account.
    #[arg(long)]
    pub assignee: Option<String>,
}

pub fn run_list(args: &ListArgs, session: &Session, output: OutputMode) -> anyhow::Result<()> {
    let views = fetch(args, session)?;
    render_mode(
        output,
        views.as_slice(),
        |views, w| {
            writeln!(w, "{ROW_HEADERS}")?;
            for view in views {
                write_row(w, view)?;
            }
            Ok(())
        },
        |views, w| {
            if views.is_empty() {
                return writeln!(w, "No tickets.");
            }
            for view in views {
                let record = view.ticket.record();
                writeln!(
                    w,
                    "{:>6}  {:<8} p{:<3} {}",
                    display_number(view),
                    record.status.to_string(),
                    record.priority,
                    record.subject
                )?;
            }
            pretty_rule(w)?;
            writeln!(w, "{} ticket(s)", views.len())
        },
    )
}

fn fetch(args: &ListArgs, session: &Session) -> anyhow::Result<Vec<TicketView>> {
    let engine = session.engine();
    let mut views = if let Some(user) = &args.assignee {
        engine.get_assigned_to(user)?
    } else if args.groups.is_empty() {
        engine.get_all()?
    } else if let Some(status) = args.status {
        engine.get_by_groups_and_status(&args.groups, status)?
    } else {
        engine.get_by_groups(&args.groups)?
    };

    // The assignee and unscoped reads take no group or status filter.
    if args.assignee.is_some() && !args.groups.is_empty() {
        views.retain(|v| args.groups.iter().any(|g| g == v.ticket.group()));
    }
    if let Some(status) = args.status {
        views.retain(|v| v.ticket.status() == status);
    }
    if args.assignee.is_none() && args.groups.is_empty() {
        views.truncate(usize::try_from(session.list_limit).unwrap_or(usize::MAX));
    }
    Ok(views)
}
