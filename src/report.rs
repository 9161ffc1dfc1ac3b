//! Group report: one snapshot from a store, every engine figure computed on it.

use crate::Amount;
use crate::engine::{
    self, Balance, EngineError, MemberBalance, NotFoundError, Payment, WhoOwesWhom,
};
use crate::ledger::ExpenseStore;
use crate::model::{GroupId, MemberId};

/// Everything a member sees when opening a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupReport {
    pub group: GroupId,
    pub requester: MemberId,
    pub total: Amount,
    pub member_count: usize,
    pub per_person_share: Amount,
    /// The requester's own position.
    pub balance: MemberBalance,
    /// Every member's position, ordered by member id.
    pub balances: Vec<Balance>,
    pub who_paid: Vec<Payment>,
    pub obligations: WhoOwesWhom,
}

/// Build the report for `requester` in `group`.
pub fn group_report(
    store: &impl ExpenseStore,
    group: GroupId,
    requester: MemberId,
) -> Result<GroupReport, EngineError> {
    let members: Vec<MemberId> = store.list_members(group)?.iter().map(|m| m.id).collect();
    let expenses = store.list_expenses(group)?;

    let totals = engine::compute_group_totals(members.iter().copied(), expenses);
    let per_person_share = engine::compute_per_person_share(totals.total, members.len())?;

    Ok(GroupReport {
        group,
        requester,
        total: totals.total,
        member_count: members.len(),
        per_person_share,
        balance: engine::compute_member_balance(requester, expenses),
        balances: engine::compute_group_balances(members.iter().copied(), expenses),
        who_paid: engine::who_paid(expenses),
        obligations: engine::resolve_who_owes_whom(expenses, requester),
    })
}

/// Every member's balance in `group`, ordered by member id.
pub fn group_balances(
    store: &impl ExpenseStore,
    group: GroupId,
) -> Result<Vec<Balance>, NotFoundError> {
    let members = store.list_members(group)?;
    let expenses = store.list_expenses(group)?;
    Ok(engine::compute_group_balances(members.iter().map(|m| m.id), expenses))
}
