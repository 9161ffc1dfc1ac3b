//! In-memory expense ledger.
//!
//! The ledger owns groups, members and expenses, applies [`Command`]s on top
//! of its state, and serves snapshots to the balance engine through the
//! [`ExpenseStore`] trait. It also consumes an async stream of commands.

use std::collections::HashMap;

use tokio_stream::{Stream, StreamExt};
use tracing::info;

use crate::engine::{self, MemberTotals, NotFoundError};
use crate::model::{
    Command, Expense, ExpenseId, Group, GroupFilter, GroupId, Invitation, InvitationStatus, Member,
    MemberId, SplitStatus,
};

mod error;
pub use error::LedgerError;

/// Read and settle access to persisted groups and expenses.
pub trait ExpenseStore {
    /// Every expense of a group, in insertion order.
    fn list_expenses(&self, group: GroupId) -> Result<&[Expense], NotFoundError>;

    /// Every member of a group, ordered by id.
    fn list_members(&self, group: GroupId) -> Result<Vec<&Member>, NotFoundError>;

    /// Conditionally move a split line to `status`.
    ///
    /// Only `Pending -> Settled` is a valid transition. Anything else, including
    /// settling an already settled line, is reported as not found and changes
    /// nothing.
    fn update_split_line_status(
        &mut self,
        expense: ExpenseId,
        member: MemberId,
        status: SplitStatus,
    ) -> Result<(), NotFoundError>;
}

/// The expense ledger.
#[derive(Debug, Default)]
pub struct Ledger {
    members: HashMap<MemberId, Member>,
    groups: HashMap<GroupId, Group>,
    expenses: HashMap<GroupId, Vec<Expense>>,
    /// Owning group of each expense, for settlement lookups
    expense_groups: HashMap<ExpenseId, GroupId>,
}

/// Public API
impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the ledger with the given command stream
    pub async fn run(&mut self, mut stream: impl Stream<Item = Command> + Unpin) {
        while let Some(command) = stream.next().await {
            // a rejected command must not stop the ledger; the outcome is already logged
            let _ = self.apply(command);
        }
    }

    /// Apply a single command on top of the current ledger state
    pub fn apply(&mut self, command: Command) -> Result<(), LedgerError> {
        match command {
            Command::Join { group, member } => {
                let result = self.join(group, member);
                Self::log_result("join", Some(group), None, member, &result);
                result
            }
            Command::Leave { group, member } => {
                let result = self.leave(group, member);
                Self::log_result("leave", Some(group), None, member, &result);
                result
            }
            Command::Invite { group, member } => {
                let result = self.invite(group, member);
                Self::log_result("invite", Some(group), None, member, &result);
                result
            }
            Command::Accept { group, member } => {
                let result = self.accept_invitation(group, member);
                Self::log_result("accept", Some(group), None, member, &result);
                result
            }
            Command::Decline { group, member } => {
                let result = self.decline_invitation(group, member);
                Self::log_result("decline", Some(group), None, member, &result);
                result
            }
            Command::Rename {
                group,
                member,
                name,
            } => {
                let result = self.rename_group(group, member, name);
                Self::log_result("rename", Some(group), None, member, &result);
                result
            }
            Command::Record(expense) => {
                let (id, group, payer) = (expense.id, expense.group, expense.payer);
                let result = self.record_expense(expense);
                Self::log_result("expense", Some(group), Some(id), payer, &result);
                result
            }
            Command::Settle { expense, member } => {
                let result = self.settle(expense, member);
                Self::log_result("settle", None, Some(expense), member, &result);
                result
            }
        }
    }

    /// Add a member to the directory, replacing any previous display attributes.
    pub fn register_member(&mut self, member: Member) {
        self.members.insert(member.id, member);
    }

    pub fn member(&self, id: MemberId) -> Option<&Member> {
        self.members.get(&id)
    }

    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.groups.get(&id)
    }

    pub fn groups(&self) -> impl Iterator<Item = &Group> + '_ {
        self.groups.values()
    }

    /// `member`'s groups of one kind, ordered by id.
    pub fn groups_for(&self, member: MemberId, filter: GroupFilter) -> Vec<&Group> {
        let mut groups: Vec<&Group> = self
            .groups
            .values()
            .filter(|group| group.matches(member, filter))
            .collect();
        groups.sort_unstable_by_key(|group| group.id);
        groups
    }

    /// A single expense, whichever group it belongs to.
    pub fn expense(&self, id: ExpenseId) -> Result<&Expense, NotFoundError> {
        self.expense_groups
            .get(&id)
            .and_then(|group| self.expenses.get(group))
            .and_then(|expenses| expenses.iter().find(|e| e.id == id))
            .ok_or(NotFoundError::Expense(id))
    }

    /// Create a new group whose only member is `creator`.
    pub fn create_group(
        &mut self,
        id: GroupId,
        name: impl Into<String>,
        creator: MemberId,
    ) -> Result<(), LedgerError> {
        if self.groups.contains_key(&id) {
            return Err(LedgerError::GroupExists(id));
        }
        self.ensure_member(creator);
        self.groups.insert(id, Group::new(id, name, creator));
        self.expenses.insert(id, Vec::new());
        Ok(())
    }

    /// Add `member` to `group`, creating the group with `member` as creator if it does not exist.
    pub fn join(&mut self, group: GroupId, member: MemberId) -> Result<(), LedgerError> {
        if !self.groups.contains_key(&group) {
            return self.create_group(group, String::new(), member);
        }
        self.add_member(group, member)
    }

    /// Rename `group`. Only its creator may.
    pub fn rename_group(
        &mut self,
        group: GroupId,
        requester: MemberId,
        name: impl Into<String>,
    ) -> Result<(), LedgerError> {
        self.group_as_creator(group, requester)?.name = name.into();
        Ok(())
    }

    /// Set or clear `group`'s description. Only its creator may.
    pub fn describe_group(
        &mut self,
        group: GroupId,
        requester: MemberId,
        description: Option<String>,
    ) -> Result<(), LedgerError> {
        self.group_as_creator(group, requester)?.description = description;
        Ok(())
    }

    /// Remove `member` from `group`. The creator can never leave.
    pub fn leave(&mut self, group: GroupId, member: MemberId) -> Result<(), LedgerError> {
        let entry = self.group_mut(group)?;
        if entry.creator == member {
            return Err(LedgerError::CreatorRemoval(group, member));
        }
        if !entry.members.remove(&member) {
            return Err(LedgerError::NotAMember(group, member));
        }
        Ok(())
    }

    /// Record a pending invitation. Re-inviting while one is pending is a no-op.
    pub fn invite(&mut self, group: GroupId, member: MemberId) -> Result<(), LedgerError> {
        self.ensure_member(member);
        let entry = self.group_mut(group)?;
        if entry.is_member(member) {
            return Err(LedgerError::AlreadyMember(group, member));
        }
        if entry.pending_invitation(member).is_none() {
            entry.invitations.push(Invitation {
                member,
                status: InvitationStatus::Pending,
            });
        }
        Ok(())
    }

    /// Accept a pending invitation and join the group.
    pub fn accept_invitation(&mut self, group: GroupId, member: MemberId) -> Result<(), LedgerError> {
        let entry = self.group_mut(group)?;
        let invitation = entry
            .pending_invitation_mut(member)
            .ok_or(LedgerError::NoPendingInvitation(group, member))?;
        invitation.status = InvitationStatus::Accepted;
        entry.members.insert(member);
        Ok(())
    }

    /// Decline a pending invitation.
    pub fn decline_invitation(&mut self, group: GroupId, member: MemberId) -> Result<(), LedgerError> {
        let entry = self.group_mut(group)?;
        let invitation = entry
            .pending_invitation_mut(member)
            .ok_or(LedgerError::NoPendingInvitation(group, member))?;
        invitation.status = InvitationStatus::Ignored;
        Ok(())
    }

    /// Validate and store a new expense:
    /// - Ensure the expense id is unique
    /// - Ensure the payer and every split member belong to the group
    /// - Ensure the split lines exactly cover the amount
    ///
    /// Nothing is stored unless every check passes.
    pub fn record_expense(&mut self, expense: Expense) -> Result<(), LedgerError> {
        if self.expense_groups.contains_key(&expense.id) {
            return Err(LedgerError::DuplicateExpense(expense.id));
        }

        let group = self
            .groups
            .get(&expense.group)
            .ok_or(NotFoundError::Group(expense.group))?;
        let outsider = std::iter::once(expense.payer)
            .chain(expense.splits.iter().map(|split| split.member))
            .find(|member| !group.is_member(*member));
        if let Some(member) = outsider {
            return Err(LedgerError::NotAMember(expense.group, member));
        }

        engine::validate_split(&expense)?;

        self.expense_groups.insert(expense.id, expense.group);
        self.expenses.entry(expense.group).or_default().push(expense);
        Ok(())
    }

    /// Mark `member`'s split line on `expense` as settled.
    pub fn settle(&mut self, expense: ExpenseId, member: MemberId) -> Result<(), LedgerError> {
        self.update_split_line_status(expense, member, SplitStatus::Settled)?;
        Ok(())
    }

    /// Expenses from every group `member` belongs to, newest first.
    pub fn group_activity(&self, member: MemberId) -> Vec<&Expense> {
        let mut activity: Vec<&Expense> = self
            .groups
            .values()
            .filter(|group| group.is_member(member))
            .filter_map(|group| self.expenses.get(&group.id))
            .flatten()
            .collect();
        Self::newest_first(&mut activity);
        activity
    }

    /// Expenses paid by `member`, newest first.
    pub fn user_activity(&self, member: MemberId) -> Vec<&Expense> {
        let mut activity: Vec<&Expense> = self
            .expenses
            .values()
            .flatten()
            .filter(|expense| expense.payer == member)
            .collect();
        Self::newest_first(&mut activity);
        activity
    }

    /// `member`'s totals across every group in the ledger.
    pub fn member_totals(&self, member: MemberId) -> MemberTotals {
        engine::compute_member_totals(member, self.expenses.values().flatten())
    }
}

/// Private API
impl Ledger {
    /// Small helper to log `apply` results
    fn log_result(
        kind: &str,
        group: Option<GroupId>,
        expense: Option<ExpenseId>,
        member: MemberId,
        result: &Result<(), LedgerError>,
    ) {
        match result {
            Ok(()) => info!(group, expense, member, "{kind} applied"),
            Err(e) => info!(group, expense, member, reason = %e, "{kind} skipped"),
        }
    }

    fn ensure_member(&mut self, id: MemberId) {
        self.members.entry(id).or_insert_with(|| Member::new(id));
    }

    fn group_mut(&mut self, id: GroupId) -> Result<&mut Group, NotFoundError> {
        self.groups.get_mut(&id).ok_or(NotFoundError::Group(id))
    }

    fn group_as_creator(&mut self, id: GroupId, requester: MemberId) -> Result<&mut Group, LedgerError> {
        let group = self.group_mut(id)?;
        if group.creator != requester {
            return Err(LedgerError::NotCreator(id, requester));
        }
        Ok(group)
    }

    fn add_member(&mut self, group: GroupId, member: MemberId) -> Result<(), LedgerError> {
        self.ensure_member(member);
        let entry = self.group_mut(group)?;
        if !entry.members.insert(member) {
            return Err(LedgerError::AlreadyMember(group, member));
        }
        Ok(())
    }

    fn newest_first(expenses: &mut [&Expense]) {
        expenses.sort_by(|a, b| (b.timestamp, b.id).cmp(&(a.timestamp, a.id)));
    }
}

impl ExpenseStore for Ledger {
    fn list_expenses(&self, group: GroupId) -> Result<&[Expense], NotFoundError> {
        if !self.groups.contains_key(&group) {
            return Err(NotFoundError::Group(group));
        }
        Ok(self.expenses.get(&group).map(Vec::as_slice).unwrap_or_default())
    }

    fn list_members(&self, group: GroupId) -> Result<Vec<&Member>, NotFoundError> {
        let entry = self.groups.get(&group).ok_or(NotFoundError::Group(group))?;
        entry
            .members
            .iter()
            .map(|id| self.members.get(id).ok_or(NotFoundError::Member(*id)))
            .collect()
    }

    fn update_split_line_status(
        &mut self,
        expense: ExpenseId,
        member: MemberId,
        status: SplitStatus,
    ) -> Result<(), NotFoundError> {
        let group = self
            .expense_groups
            .get(&expense)
            .ok_or(NotFoundError::Expense(expense))?;
        let record = self
            .expenses
            .get_mut(group)
            .and_then(|expenses| expenses.iter_mut().find(|e| e.id == expense))
            .ok_or(NotFoundError::Expense(expense))?;

        let split = record
            .splits
            .iter_mut()
            .find(|split| split.member == member)
            .ok_or(NotFoundError::SplitLine(expense, member))?;

        // settled lines never reopen, and settling twice is not a second transition
        if status != SplitStatus::Settled || !split.settle() {
            return Err(NotFoundError::SplitLine(expense, member));
        }
        Ok(())
    }
}
