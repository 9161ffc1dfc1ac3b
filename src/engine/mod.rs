//! Balance engine.
//!
//! Pure functions over a snapshot of a group's members and expenses. Nothing
//! here performs I/O or keeps state between calls; every function either
//! returns a value or fails synchronously.
//!
//! A payer's own split line counts toward [`validate_split`] but is never a
//! debt: it is left out of every "owes" figure.

use std::collections::{BTreeMap, HashSet};

use crate::Amount;
use crate::model::{Expense, MemberId};

mod balance;
pub use balance::{Balance, GroupTotals, MemberBalance, MemberTotals, Obligation, Payment, WhoOwesWhom};

mod error;
pub use error::{DivisionError, EngineError, NotFoundError, ValidationError};

/// Check that an expense's split lines exactly cover its amount.
///
/// The expense and every line must be positive, and each member may appear
/// at most once.
pub fn validate_split(expense: &Expense) -> Result<(), ValidationError> {
    if expense.splits.is_empty() {
        return Err(ValidationError::EmptySplit(expense.id));
    }
    if !expense.amount.is_positive() {
        return Err(ValidationError::NonPositiveAmount(expense.id, expense.amount));
    }

    let mut seen = HashSet::with_capacity(expense.splits.len());
    for split in &expense.splits {
        if !split.amount.is_positive() {
            return Err(ValidationError::NonPositiveAmount(expense.id, split.amount));
        }
        if !seen.insert(split.member) {
            return Err(ValidationError::DuplicateSplitMember(expense.id, split.member));
        }
    }

    let actual = expense
        .splits
        .iter()
        .try_fold(Amount::ZERO, |acc, split| acc.checked_add(split.amount))
        .ok_or(ValidationError::AmountOverflow(expense.id))?;
    if actual != expense.amount {
        return Err(ValidationError::SplitMismatch {
            expense: expense.id,
            expected: expense.amount,
            actual,
        });
    }

    Ok(())
}

/// Total group spend and gross amount paid per member.
///
/// Sums saturate at the amount bounds rather than wrap.
///
/// Every member appears in `paid`, with zero if they paid nothing, and so
/// does every payer found in `expenses` even if they have since left.
pub fn compute_group_totals(
    members: impl IntoIterator<Item = MemberId>,
    expenses: &[Expense],
) -> GroupTotals {
    let mut totals = GroupTotals {
        total: Amount::ZERO,
        paid: members.into_iter().map(|m| (m, Amount::ZERO)).collect(),
    };

    for expense in expenses {
        totals.total += expense.amount;
        *totals.paid.entry(expense.payer).or_default() += expense.amount;
    }

    debug_assert!(totals.is_conserved());
    totals
}

/// `member`'s pending debts to others and the gross amount they paid.
pub fn compute_member_balance(member: MemberId, expenses: &[Expense]) -> MemberBalance {
    let mut balance = MemberBalance::default();

    for expense in expenses {
        if expense.payer == member {
            balance.you_are_owed += expense.amount;
        }
        balance.you_owe += expense
            .pending_debts()
            .filter(|split| split.member == member)
            .map(|split| split.amount)
            .sum::<Amount>();
    }

    balance
}

/// Even share of `total` across `member_count` members.
pub fn compute_per_person_share(total: Amount, member_count: usize) -> Result<Amount, DivisionError> {
    total.checked_div(member_count).ok_or(DivisionError::ZeroMembers)
}

/// Raw pending obligations relevant to `requester`.
///
/// Lists are ordered by timestamp, then expense id, then debtor id.
pub fn resolve_who_owes_whom(expenses: &[Expense], requester: MemberId) -> WhoOwesWhom {
    let mut report = WhoOwesWhom::default();

    for expense in expenses {
        for split in expense.pending_debts() {
            let obligation = Obligation {
                expense: expense.id,
                debtor: split.member,
                creditor: expense.payer,
                amount: split.amount,
                status: split.status,
                timestamp: expense.timestamp,
            };

            if expense.payer == requester {
                report.owed_to_you.push(obligation);
            } else if split.member == requester {
                report.you_owe.push(obligation);
            } else {
                report.who_gets.push(obligation);
            }
        }
    }

    report.you_owe.sort_by_key(Obligation::sort_key);
    report.who_gets.sort_by_key(Obligation::sort_key);
    report.owed_to_you.sort_by_key(Obligation::sort_key);
    report
}

/// Per-member balance rows for a group, ordered by member id.
///
/// Rows cover the members, every payer, and every pending debtor.
pub fn compute_group_balances(
    members: impl IntoIterator<Item = MemberId>,
    expenses: &[Expense],
) -> Vec<Balance> {
    let totals = compute_group_totals(members, expenses);

    let mut owed: BTreeMap<MemberId, Amount> =
        totals.paid.keys().map(|&m| (m, Amount::ZERO)).collect();
    for expense in expenses {
        for split in expense.pending_debts() {
            *owed.entry(split.member).or_default() += split.amount;
        }
    }

    owed.into_iter()
        .map(|(member, owed)| Balance::new(member, totals.paid_by(member), owed))
        .collect()
}

/// `member`'s totals over any set of expenses, typically across all their groups.
pub fn compute_member_totals<'a>(
    member: MemberId,
    expenses: impl IntoIterator<Item = &'a Expense>,
) -> MemberTotals {
    let mut totals = MemberTotals::default();

    for expense in expenses {
        if expense.payer == member {
            totals.paid += expense.amount;
        }
        if let Some(split) = expense.split_for(member) {
            totals.involved += expense.amount;
            if split.is_pending() {
                totals.pending += split.amount;
            }
        }
    }

    totals
}

/// One entry per expense, ordered by timestamp then expense id.
pub fn who_paid(expenses: &[Expense]) -> Vec<Payment> {
    let mut payments: Vec<Payment> = expenses
        .iter()
        .map(|expense| Payment {
            expense: expense.id,
            payer: expense.payer,
            amount: expense.amount,
            timestamp: expense.timestamp,
        })
        .collect();
    payments.sort_by_key(|p| (p.timestamp, p.expense));
    payments
}
