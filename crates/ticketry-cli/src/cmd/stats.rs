//! `tk stats`: reporting counts and the yearly dashboard.
//!
//! With no filters, prints the dashboard for `--year` (default: this year).
//! `--month` narrows to one month, `--status` to one status, and
//! `--day-ending` counts the 24 hours ending at an instant.

use std::io::Write;

use chrono::{DateTime, Datelike, Utc};
use clap::Args;
use serde::Serialize;
use ticketry_core::TicketStatus;
use ticketry_core::query::DashboardSummary;

use super::Session;
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

#[derive(Args, Debug, Default)]
pub struct StatsArgs {
    /// Calendar year (defaults to the current UTC year).
    #[arg(long)]
    pub year: Option<i32>,

    /// Month number, 1-12.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
    pub month: Option<u32>,

    /// Restrict counts to one status (code or name).
    #[arg(long)]
    pub status: Option<TicketStatus>,

    /// RFC 3339 instant; counts the preceding 24 hours.
    #[arg(long, value_name = "INSTANT", conflicts_with_all = ["year", "month"])]
    pub day_ending: Option<DateTime<Utc>>,
}

/// A single scoped count.
#[derive(Debug, Serialize)]
struct ScopedCount {
    scope: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<TicketStatus>,
    count: u64,
}

pub fn run_stats(args: &StatsArgs, session: &Session, output: OutputMode) -> anyhow::Result<()> {
    let engine = session.engine();
    let year = args.year.unwrap_or_else(|| Utc::now().year());

    if let Some(instant) = args.day_ending {
        let count = match args.status {
            Some(status) => engine.count_by_status_and_date(status, instant)?,
            None => engine.count_by_date(instant)?,
        };
        return render_count(
            output,
            &ScopedCount {
                scope: format!("24h ending {}", instant.to_rfc3339()),
                status: args.status,
                count,
            },
        );
    }

    if let Some(month) = args.month {
        let count = engine.count_by_month_in(year, month - 1, args.status)?;
        return render_count(
            output,
            &ScopedCount {
                scope: format!("{} {year}", MONTH_NAMES[(month - 1) as usize]),
                status: args.status,
                count,
            },
        );
    }

    if let Some(status) = args.status {
        let count = engine.count_by_year(year, Some(status))?;
        return render_count(
            output,
            &ScopedCount {
                scope: year.to_string(),
                status: Some(status),
                count,
            },
        );
    }

    let summary = engine.dashboard_summary(year)?;
    render_mode(output, &summary, write_summary_text, write_summary_pretty)
}

fn render_count(output: OutputMode, count: &ScopedCount) -> anyhow::Result<()> {
    render_mode(
        output,
        count,
        |c, w| writeln!(w, "{}\t{}", c.scope, c.count),
        |c, w| {
            let label = c
                .status
                .map_or_else(|| "tickets".to_string(), |s| format!("{s} tickets"));
            pretty_kv(w, &c.scope, format!("{} {label}", c.count))
        },
    )
}

fn write_summary_text(summary: &DashboardSummary, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(w, "total\t{}", summary.total)?;
    writeln!(w, "created_in_{}\t{}", summary.year, summary.created_in_year)?;
    for s in &summary.by_status {
        writeln!(w, "status_{}\t{}", s.status, s.count)?;
    }
    writeln!(w, "MONTH\tCREATED\tCLOSED")?;
    for m in &summary.months {
        writeln!(w, "{}\t{}\t{}", m.month + 1, m.created, m.closed)?;
    }
    Ok(())
}

fn write_summary_pretty(summary: &DashboardSummary, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, &format!("Tickets {}", summary.year))?;
    pretty_kv(w, "total", summary.total.to_string())?;
    pretty_kv(w, "this year", summary.created_in_year.to_string())?;
    for s in &summary.by_status {
        pretty_kv(w, &s.status.to_string(), s.count.to_string())?;
    }
    writeln!(w)?;
    writeln!(w, "{:<6} {:>8} {:>8}", "month", "created", "closed")?;
    for (m, name) in summary.months.iter().zip(MONTH_NAMES) {
        writeln!(w, "{name:<6} {:>8} {:>8}", m.created, m.closed)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: StatsArgs,
    }

    #[test]
    fn month_must_be_one_to_twelve() {
        assert!(Wrapper::try_parse_from(["test", "--month", "0"]).is_err());
        assert!(Wrapper::try_parse_from(["test", "--month", "13"]).is_err());
        let w = Wrapper::parse_from(["test", "--month", "12", "--year", "2025"]);
        assert_eq!(w.args.month, Some(12));
        assert_eq!(w.args.year, Some(2025));
    }

    #[test]
    fn day_ending_parses_rfc3339() {
        let w = Wrapper::parse_from(["test", "--day-ending", "2026-04-15T12:00:00Z"]);
        assert_eq!(
            w.args.day_ending.map(|d| d.to_rfc3339()),
            Some("2026-04-15T12:00:00+00:00".to_string())
        );
    }

    #[test]
    fn day_ending_conflicts_with_month() {
        assert!(Wrapper::try_parse_from([
            "test",
            "--day-ending",
            "2026-04-15T12:00:00Z",
            "--month",
            "4"
        ])
        .is_err());
    }

    #[test]
    fn summary_text_uses_one_based_months() {
        let summary = DashboardSummary {
            year: 2026,
            total: 3,
            created_in_year: 2,
            by_status: Vec::new(),
            months: vec![ticketry_core::query::MonthBucket {
                month: 0,
                created: 2,
                closed: 1,
            }],
        };
        let mut buf = Vec::new();
        write_summary_text(&summary, &mut buf).expect("write");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.contains("created_in_2026\t2"));
        assert!(text.contains("\n1\t2\t1\n"));
    }
}
