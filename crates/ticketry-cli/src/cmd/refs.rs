//! `tk ref`: register the accounts, groups, and ticket types tickets point at.
//!
//! Tickets store only ids; these records exist so reads can expand them.


use clap::{Args, Subcommand};
use serde::Serialize;
use ticketry_core::model::{Account, Group, TicketType};

use super::Session;
use crate::output::{OutputMode, pretty_kv, render_mode};

#[derive(Args, Debug)]
pub struct RefArgs {
    #[command(subcommand)]
    pub command: RefCommand,
}

#[derive(Subcommand, Debug)]
pub enum RefCommand {
    /// Create or replace an account.
    Account {
        id: String,
        username: String,
        #[arg(long = "name")]
        full_name: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    /// Create or replace a group and its member list.
    Group {
        id: String,
        name: String,
        /// Member account id (repeatable, order kept).
        #[arg(long = "member", value_name = "ACCOUNT")]
        members: Vec<String>,
    },
    /// Create or replace a ticket type.
    Type { id: String, name: String },
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Registered {
    Account(Account),
    Group(Group),
    Type(TicketType),
}

impl Registered {
    fn describe(&self) -> (&'static str, &str, &str) {
        match self {
            Self::Account(a) => ("account", a.id.as_str(), a.username.as_str()),
            Self::Group(g) => ("group", g.id.as_str(), g.name.as_str()),
            Self::Type(t) => ("type", t.id.as_str(), t.name.as_str()),
        }
    }
}

pub fn run_ref(args: RefArgs, session: &Session, output: OutputMode) -> anyhow::Result<()> {
    let registered = match args.command {
        RefCommand::Account {
            id,
            username,
            full_name,
            email,
        } => {
            let account = Account {
                id,
                username,
                full_name,
                email,
            };
            session.store.upsert_account(&account)?;
            Registered::Account(account)
        }
        RefCommand::Group { id, name, members } => {
            let group = Group {
                id,
                name,
                member_ids: members,
            };
            session.store.upsert_group(&group)?;
            Registered::Group(group)
        }
        RefCommand::Type { id, name } => {
            let ticket_type = TicketType { id, name };
            session.store.upsert_ticket_type(&ticket_type)?;
            Registered::Type(ticket_type)
        }
    };
    let (kind, id, _) = registered.describe();
    tracing::info!(kind, id, "reference saved");

    render_mode(
        output,
        &registered,
        |r, w| {
            let (kind, id, name) = r.describe();
            writeln!(w, "{kind}\t{id}\t{name}")
        },
        |r, w| {
            let (kind, id, name) = r.describe();
            pretty_kv(w, kind, format!("{id} ({name})"))
        },
    )
}
