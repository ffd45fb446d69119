//! `tk show`: display full details of a single ticket.
//!
//! Accepts a ticket id or a display number (`#12` or `12`).

use std::io::{self, Write};

use chrono::{DateTime, Local, Utc};
use clap::Args;
use ticketry_core::query::TicketView;

use super::Session;
use crate::output::{OutputMode, pretty_kv, pretty_rule, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Ticket id, or display number as `#N`.
    pub key: String,
}

pub fn run_show(args: &ShowArgs, session: &Session, output: OutputMode) -> anyhow::Result<()> {
    let view = session.view(&args.key)?;
    render_view(output, &view)
}

/// Render one expanded ticket in any output mode.
pub fn render_view(output: OutputMode, view: &TicketView) -> anyhow::Result<()> {
    render_mode(
        output,
        view,
        |view, w| write_row(w, view),
        |view, w| write_detail(w, view),
    )
}

pub(crate) fn local_time(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

pub(crate) fn display_number(view: &TicketView) -> String {
    view.ticket
        .display_number()
        .map_or_else(|| "-".to_string(), |n| format!("#{n}"))
}

/// Text header matching [`write_row`].
pub const ROW_HEADERS: &str = "NUMBER\tID\tSTATUS\tPRIORITY\tGROUP\tASSIGNEE\tSUBJECT";

/// One tab-separated line per ticket.
pub fn write_row(w: &mut dyn Write, view: &TicketView) -> io::Result<()> {
    let record = view.ticket.record();
    writeln!(
        w,
        "{}\t{}\t{}\t{}\t{}\t{}\t{}",
        display_number(view),
        record.id,
        record.status,
        record.priority,
        view.group
            .as_ref()
            .map_or(record.group.as_str(), |g| g.group.name.as_str()),
        view.assignee
            .as_ref()
            .map(|a| a.username.as_str())
            .or(record.assignee.as_deref())
            .unwrap_or("-"),
        record.subject,
    )
}

fn write_detail(w: &mut dyn Write, view: &TicketView) -> io::Result<()> {
    let record = view.ticket.record();
    pretty_section(w, &format!("{} {}", display_number(view), record.subject))?;
    pretty_kv(w, "id", &record.id)?;
    pretty_kv(w, "status", record.status.to_string())?;
    pretty_kv(w, "priority", record.priority.to_string())?;
    pretty_kv(
        w,
        "type",
        view.ticket_type
            .as_ref()
            .map_or(record.ticket_type.as_str(), |t| t.name.as_str()),
    )?;
    pretty_kv(
        w,
        "group",
        view.group
            .as_ref()
            .map_or(record.group.as_str(), |g| g.group.name.as_str()),
    )?;
    pretty_kv(
        w,
        "owner",
        view.owner
            .as_ref()
            .map_or(record.owner.as_str(), |a| a.username.as_str()),
    )?;
    if let Some(assignee) = &record.assignee {
        pretty_kv(
            w,
            "assignee",
            view.assignee
                .as_ref()
                .map_or(assignee.as_str(), |a| a.username.as_str()),
        )?;
    }
    if !record.tags.is_empty() {
        pretty_kv(w, "tags", record.tags.join(", "))?;
    }
    pretty_kv(w, "created", local_time(record.created_at))?;
    if let Some(updated) = record.updated_at {
        pretty_kv(w, "updated", local_time(updated))?;
    }
    if let Some(closed) = record.closed_date {
        pretty_kv(w, "closed", local_time(closed))?;
    }

    writeln!(w)?;
    writeln!(w, "{}", record.issue)?;

    if !view.comments.is_empty() {
        writeln!(w)?;
        pretty_section(w, &format!("Comments ({})", view.comments.len()))?;
        for comment in &view.comments {
            let author = comment
                .owner_account
                .as_ref()
                .map_or(comment.comment.owner.as_str(), |a| a.username.as_str());
            writeln!(
                w,
                "[{}] {} ({})",
                local_time(comment.comment.date),
                author,
                comment.comment.id
            )?;
            writeln!(w, "  {}", comment.comment.body)?;
        }
    }

    if !view.ticket.history().is_empty() {
        writeln!(w)?;
        pretty_section(w, "History")?;
        for entry in view.ticket.history().iter() {
            writeln!(
                w,
                "[{}] {}",
                local_time(entry.timestamp),
                entry.description
            )?;
        }
    }
    pretty_rule(w)
}
