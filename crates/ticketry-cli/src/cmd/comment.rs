//! `tk comment`, `tk uncomment`, `tk comments`: ticket comment thread.


use clap::Args;
use ticketry_core::model::Comment;
use ticketry_core::query::CommentView;

use super::Session;
use super::show::{local_time, render_view};
use crate::output::{OutputMode, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct CommentArgs {
    /// Ticket id or `#N`.
    pub key: String,
    /// Account id of the author.
    #[arg(long)]
    pub owner: String,
    /// Comment text.
    #[arg(long)]
    pub body: String,
}

#[derive(Args, Debug)]
pub struct UncommentArgs {
    /// Ticket id or `#N`.
    pub key: String,
    /// Id of the comment to remove.
    pub comment_id: String,
}

#[derive(Args, Debug)]
pub struct CommentsArgs {
    /// Ticket id or `#N`.
    pub key: String,
}

pub fn run_comment(args: &CommentArgs, session: &Session, output: OutputMode) -> anyhow::Result<()> {
    if args.body.trim().is_empty() {
        anyhow::bail!("comment body must not be empty");
    }
    let mut ticket = session.load(&args.key)?;
    ticket.add_comment(Comment::new(args.owner.as_str(), args.body.as_str()));
    let view = session.save(&mut ticket)?;
    render_view(output, &view)
}

pub fn run_uncomment(
    args: &UncommentArgs,
    session: &Session,
    output: OutputMode,
) -> anyhow::Result<()> {
    let mut ticket = session.load(&args.key)?;
    ticket.remove_comment(&args.comment_id);
    let view = session.save(&mut ticket)?;
    render_view(output, &view)
}

pub fn run_comments(args: &CommentsArgs, session: &Session, output: OutputMode) -> anyhow::Result<()> {
    let ticket = session.load(&args.key)?;
    let comments = session.engine().get_comments(ticket.id())?;
    render_mode(
        output,
        comments.as_slice(),
        |comments, w| {
            writeln!(w, "ID\tDATE\tAUTHOR\tBODY")?;
            for c in comments {
                writeln!(
                    w,
                    "{}\t{}\t{}\t{}",
                    c.comment.id,
                    c.comment.date.to_rfc3339(),
                    author(c),
                    c.comment.body
                )?;
            }
            Ok(())
        },
        |comments, w| {
            pretty_section(w, &format!("Comments ({})", comments.len()))?;
            for c in comments {
                writeln!(w, "[{}] {} ({})", local_time(c.comment.date), author(c), c.comment.id)?;
                writeln!(w, "  {}", c.comment.body)?;
            }
            Ok(())
        },
    )
}

fn author(view: &CommentView) -> &str {
    view.owner_account
        .as_ref()
        .map_or(view.comment.owner.as_str(), |a| a.username.as_str())
}
