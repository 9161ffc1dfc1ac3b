//! Core domain types for the expense ledger.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::Amount;

/// Member identifier.
pub type MemberId = u32;

/// Group identifier.
pub type GroupId = u32;

/// Expense identifier.
pub type ExpenseId = u32;

/// A person who can belong to groups. Display attributes are optional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub id: MemberId,
    pub name: Option<String>,
    pub email: Option<String>,
}

impl Member {
    /// A member known only by id.
    pub fn new(id: MemberId) -> Self {
        Self {
            id,
            name: None,
            email: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// State of a group invitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InvitationStatus {
    #[default]
    Pending,
    Accepted,
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invitation {
    pub member: MemberId,
    pub status: InvitationStatus,
}

/// A set of members sharing expenses. The creator is always a member.
#[derive(Debug, Clone)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub description: Option<String>,
    pub creator: MemberId,
    pub members: BTreeSet<MemberId>,
    pub invitations: Vec<Invitation>,
}

impl Group {
    pub fn new(id: GroupId, name: impl Into<String>, creator: MemberId) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            creator,
            members: BTreeSet::from([creator]),
            invitations: Vec::new(),
        }
    }

    pub fn is_member(&self, member: MemberId) -> bool {
        self.members.contains(&member)
    }

    /// The pending invitation for `member`, if any.
    pub fn pending_invitation(&self, member: MemberId) -> Option<&Invitation> {
        self.invitations
            .iter()
            .find(|inv| inv.member == member && inv.status == InvitationStatus::Pending)
    }

    pub fn pending_invitation_mut(&mut self, member: MemberId) -> Option<&mut Invitation> {
        self.invitations
            .iter_mut()
            .find(|inv| inv.member == member && inv.status == InvitationStatus::Pending)
    }

    /// Status of the most recent invitation sent to `member`.
    pub fn invitation_status(&self, member: MemberId) -> Option<InvitationStatus> {
        self.invitations
            .iter()
            .rev()
            .find(|inv| inv.member == member)
            .map(|inv| inv.status)
    }

    /// Whether this group shows up in `member`'s list for `filter`.
    pub fn matches(&self, member: MemberId, filter: GroupFilter) -> bool {
        match filter {
            GroupFilter::Created => self.creator == member,
            GroupFilter::Joined => self.creator != member && self.is_member(member),
            GroupFilter::Invited => self.pending_invitation(member).is_some(),
            GroupFilter::Ignored => {
                !self.is_member(member)
                    && self.invitation_status(member) == Some(InvitationStatus::Ignored)
            }
        }
    }
}

/// How a member relates to a group, for listing their groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupFilter {
    /// Groups the member created.
    Created,
    /// Groups the member belongs to but did not create.
    Joined,
    /// Groups with a pending invitation for the member.
    Invited,
    /// Groups whose latest invitation the member declined.
    Ignored,
}

/// What an expense was spent on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Food,
    Travel,
    Entertainment,
    #[serde(alias = "shoping")]
    Shopping,
    #[default]
    Other,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Food => "food",
            Category::Travel => "travel",
            Category::Entertainment => "entertainment",
            Category::Shopping => "shopping",
            Category::Other => "other",
        };
        f.write_str(name)
    }
}

/// Settlement state of a split line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitStatus {
    #[default]
    Pending,
    // Settled is a final state
    Settled,
}

impl fmt::Display for SplitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SplitStatus::Pending => f.write_str("pending"),
            SplitStatus::Settled => f.write_str("settled"),
        }
    }
}

/// One member's share of an expense.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitLine {
    pub member: MemberId,
    pub amount: Amount,
    pub status: SplitStatus,
}

impl SplitLine {
    /// Create a new split line in the `Pending` state.
    pub fn pending(member: MemberId, amount: Amount) -> Self {
        Self {
            member,
            amount,
            status: SplitStatus::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == SplitStatus::Pending
    }

    /// Move `Pending -> Settled`. Returns `false` if the line was already settled.
    pub fn settle(&mut self) -> bool {
        if self.is_pending() {
            self.status = SplitStatus::Settled;
            true
        } else {
            false
        }
    }
}

/// A payment made by one member on behalf of a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expense {
    pub id: ExpenseId,
    pub group: GroupId,
    pub payer: MemberId,
    pub amount: Amount,
    pub title: String,
    pub category: Category,
    pub timestamp: DateTime<Utc>,
    pub splits: Vec<SplitLine>,
}

impl Expense {
    pub fn new(
        id: ExpenseId,
        group: GroupId,
        payer: MemberId,
        amount: Amount,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            group,
            payer,
            amount,
            title: String::new(),
            category: Category::default(),
            timestamp,
            splits: Vec::new(),
        }
    }

    pub fn with_split(mut self, split: SplitLine) -> Self {
        self.splits.push(split);
        self
    }

    pub fn split_for(&self, member: MemberId) -> Option<&SplitLine> {
        self.splits.iter().find(|split| split.member == member)
    }

    /// Pending lines owed by someone other than the payer.
    pub fn pending_debts(&self) -> impl Iterator<Item = &SplitLine> + '_ {
        self.splits
            .iter()
            .filter(move |split| split.is_pending() && split.member != self.payer)
    }
}

/// An input of the ledger.
#[derive(Debug, Clone)]
pub enum Command {
    /// Add a member to a group, creating the group with the member as creator if needed.
    Join { group: GroupId, member: MemberId },
    /// Remove a member from a group.
    Leave { group: GroupId, member: MemberId },
    /// Invite a member to a group.
    Invite { group: GroupId, member: MemberId },
    /// Accept a pending invitation; the member joins the group.
    Accept { group: GroupId, member: MemberId },
    /// Decline a pending invitation.
    Decline { group: GroupId, member: MemberId },
    /// Rename a group; only its creator may.
    Rename {
        group: GroupId,
        member: MemberId,
        name: String,
    },
    /// Validate and store a new expense.
    Record(Expense),
    /// Mark a member's split line on an expense as settled.
    Settle { expense: ExpenseId, member: MemberId },
}
