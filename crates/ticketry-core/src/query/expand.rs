//! Reference expansion for read results.
//!
//! Expansion follows a fixed set of named paths and resolves each referenced
//! kind with one batched lookup per read, never one lookup per row. A
//! reference whose target is missing expands to `None` (or is left out of a
//! member list).

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

use crate::error::Result;
use crate::model::{Account, Comment, Group, Ticket, TicketType};
use crate::store::TicketStore;

/// A named reference path that a read may expand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpandPath {
    Owner,
    Assignee,
    Type,
    Group,
    GroupMembers,
    Comments,
    CommentOwners,
}

/// A fixed set of paths to expand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expansion {
    paths: &'static [ExpandPath],
}

impl Expansion {
    /// Every path; used by all ticket reads.
    pub const FULL: Self = Self {
        paths: &[
            ExpandPath::Owner,
            ExpandPath::Assignee,
            ExpandPath::Type,
            ExpandPath::Group,
            ExpandPath::GroupMembers,
            ExpandPath::Comments,
            ExpandPath::CommentOwners,
        ],
    };

    /// Only the comment subtree.
    pub const COMMENTS: Self = Self {
        paths: &[ExpandPath::Comments, ExpandPath::CommentOwners],
    };

    #[must_use]
    pub fn includes(self, path: ExpandPath) -> bool {
        self.paths.contains(&path)
    }
}

/// A group with its member accounts resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupView {
    #[serde(flatten)]
    pub group: Group,
    pub members: Vec<Account>,
}

/// A comment with its author resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: Comment,
    pub owner_account: Option<Account>,
}

/// A ticket with its references resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TicketView {
    pub ticket: Ticket,
    pub owner: Option<Account>,
    pub assignee: Option<Account>,
    #[serde(rename = "type")]
    pub ticket_type: Option<TicketType>,
    pub group: Option<GroupView>,
    pub comments: Vec<CommentView>,
}

/// Resolve references for `tickets` along `expansion`'s paths.
///
/// # Errors
///
/// Propagates store lookup failures.
pub fn expand<S: TicketStore + ?Sized>(
    store: &S,
    tickets: Vec<Ticket>,
    expansion: Expansion,
) -> Result<Vec<TicketView>> {
    let types = if expansion.includes(ExpandPath::Type) {
        let ids: BTreeSet<&str> = tickets.iter().map(Ticket::ticket_type).collect();
        lookup(&ids, |ids| store.ticket_types(ids))?
    } else {
        HashMap::new()
    };

    let groups = if expansion.includes(ExpandPath::Group) {
        let ids: BTreeSet<&str> = tickets.iter().map(Ticket::group).collect();
        lookup(&ids, |ids| store.groups(ids))?
    } else {
        HashMap::new()
    };

    let mut account_ids: BTreeSet<&str> = BTreeSet::new();
    for ticket in &tickets {
        if expansion.includes(ExpandPath::Owner) {
            account_ids.insert(ticket.record().owner.as_str());
        }
        if expansion.includes(ExpandPath::Assignee) {
            account_ids.extend(ticket.assignee());
        }
        if expansion.includes(ExpandPath::Comments) && expansion.includes(ExpandPath::CommentOwners)
        {
            account_ids.extend(ticket.comments().iter().map(|c| c.owner.as_str()));
        }
    }
    if expansion.includes(ExpandPath::GroupMembers) {
        for group in groups.values() {
            account_ids.extend(group.member_ids.iter().map(String::as_str));
        }
    }
    let accounts = lookup(&account_ids, |ids| store.accounts(ids))?;

    tracing::debug!(
        tickets = tickets.len(),
        accounts = accounts.len(),
        groups = groups.len(),
        types = types.len(),
        "expanded ticket references"
    );

    Ok(tickets
        .into_iter()
        .map(|ticket| {
            let resolve = |id: &str| accounts.get(id).cloned();
            let owner = expansion
                .includes(ExpandPath::Owner)
                .then(|| resolve(ticket.record().owner.as_str()))
                .flatten();
            let assignee = if expansion.includes(ExpandPath::Assignee) {
                ticket.assignee().and_then(resolve)
            } else {
                None
            };
            let ticket_type = types.get(ticket.ticket_type()).cloned();
            let group = groups.get(ticket.group()).map(|group| GroupView {
                members: if expansion.includes(ExpandPath::GroupMembers) {
                    group
                        .member_ids
                        .iter()
                        .filter_map(|id| resolve(id.as_str()))
                        .collect()
                } else {
                    Vec::new()
                },
                group: group.clone(),
            });
            let comments = if expansion.includes(ExpandPath::Comments) {
                ticket
                    .comments()
                    .iter()
                    .map(|comment| CommentView {
                        owner_account: if expansion.includes(ExpandPath::CommentOwners) {
                            resolve(comment.owner.as_str())
                        } else {
                            None
                        },
                        comment: comment.clone(),
                    })
                    .collect()
            } else {
                Vec::new()
            };

            TicketView {
                ticket,
                owner,
                assignee,
                ticket_type,
                group,
                comments,
            }
        })
        .collect())
}

fn lookup<'a, T>(
    ids: &BTreeSet<&'a str>,
    fetch: impl FnOnce(&[&'a str]) -> Result<HashMap<String, T>>,
) -> Result<HashMap<String, T>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let ids: Vec<&str> = ids.iter().copied().collect();
    fetch(&ids)
}

#[cfg(test)]
mod tests {
    use super::{Expansion, expand};
    use crate::db::SqliteStore;
    use crate::lifecycle::LifecycleManager;
    use crate::model::{Account, Comment, Group, NewTicket, TicketStatus, TicketType};

    fn seeded() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        for (id, name) in [("acct-owner", "olive"), ("acct-agent", "amir")] {
            store
                .upsert_account(&Account {
                    id: id.into(),
                    username: name.into(),
                    full_name: None,
                    email: None,
                })
                .unwrap();
        }
        store
            .upsert_group(&Group {
                id: "grp-support".into(),
                name: "Support".into(),
                member_ids: vec!["acct-agent".into(), "acct-gone".into()],
            })
            .unwrap();
        store
            .upsert_ticket_type(&TicketType {
                id: "type-issue".into(),
                name: "Issue".into(),
            })
            .unwrap();
        store
    }

    fn new_ticket(ticket_type: &str) -> NewTicket {
        NewTicket {
            owner: "acct-owner".into(),
            group: "grp-support".into(),
            ticket_type: ticket_type.into(),
            status: TicketStatus::Open,
            priority: 1,
            subject: "Laptop battery".into(),
            issue: "Swollen battery".into(),
            tags: Vec::new(),
        }
    }

    #[test]
    fn full_expansion_resolves_every_path() {
        let store = seeded();
        let manager = LifecycleManager::new(&store, &store);
        let mut ticket = manager.create(new_ticket("type-issue")).unwrap();
        ticket.set_assignee("acct-agent").unwrap();
        ticket.add_comment(Comment {
            id: "c1".into(),
            owner: "acct-agent".into(),
            body: "Ordering a replacement".into(),
            date: crate::model::now(),
        });

        let views = expand(&store, vec![ticket], Expansion::FULL).unwrap();
        let view = &views[0];
        assert_eq!(view.owner.as_ref().unwrap().username, "olive");
        assert_eq!(view.assignee.as_ref().unwrap().username, "amir");
        assert_eq!(view.ticket_type.as_ref().unwrap().name, "Issue");
        let group = view.group.as_ref().unwrap();
        assert_eq!(group.group.name, "Support");
        // Unknown members are dropped, known ones keep their order.
        assert_eq!(group.members.len(), 1);
        assert_eq!(group.members[0].id, "acct-agent");
        assert_eq!(
            view.comments[0].owner_account.as_ref().unwrap().username,
            "amir"
        );
    }

    #[test]
    fn dangling_references_expand_to_none() {
        let store = seeded();
        let manager = LifecycleManager::new(&store, &store);
        let mut ticket = manager.create(new_ticket("type-deleted")).unwrap();
        ticket.set_assignee("acct-ghost").unwrap();

        let views = expand(&store, vec![ticket], Expansion::FULL).unwrap();
        assert!(views[0].ticket_type.is_none());
        assert!(views[0].assignee.is_none());
        assert!(views[0].owner.is_some());
    }

    #[test]
    fn comment_expansion_skips_other_paths() {
        let store = seeded();
        let manager = LifecycleManager::new(&store, &store);
        let mut ticket = manager.create(new_ticket("type-issue")).unwrap();
        ticket.add_comment(Comment {
            id: "c1".into(),
            owner: "acct-owner".into(),
            body: "Any update?".into(),
            date: crate::model::now(),
        });

        let views = expand(&store, vec![ticket], Expansion::COMMENTS).unwrap();
        let view = &views[0];
        assert!(view.owner.is_none());
        assert!(view.group.is_none());
        assert!(view.ticket_type.is_none());
        assert_eq!(view.comments.len(), 1);
        assert_eq!(
            view.comments[0].owner_account.as_ref().unwrap().username,
            "olive"
        );
    }

    #[test]
    fn empty_input_makes_no_lookups() {
        let store = seeded();
        assert!(expand(&store, Vec::new(), Expansion::FULL).unwrap().is_empty());
    }
}
