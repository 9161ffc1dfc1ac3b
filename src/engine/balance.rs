use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::Amount;
use crate::model::{ExpenseId, MemberId, SplitStatus};

/// Group spend and the gross amount each member paid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupTotals {
    pub total: Amount,
    pub paid: BTreeMap<MemberId, Amount>,
}

impl GroupTotals {
    /// `total` equals the sum of every member's paid amount.
    pub fn is_conserved(&self) -> bool {
        self.total == self.paid.values().sum::<Amount>()
    }

    pub fn paid_by(&self, member: MemberId) -> Amount {
        self.paid.get(&member).copied().unwrap_or_default()
    }
}

/// A single member's position, from that member's point of view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemberBalance {
    /// Pending shares the member owes to other payers.
    pub you_owe: Amount,
    /// Gross amount of expenses the member paid.
    pub you_are_owed: Amount,
}

impl MemberBalance {
    pub fn net(&self) -> Amount {
        self.you_are_owed - self.you_owe
    }
}

/// Derived per-member balance inside a group. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Balance {
    pub member: MemberId,
    pub paid: Amount,
    pub owed: Amount,
    pub net: Amount,
}

impl Balance {
    pub fn new(member: MemberId, paid: Amount, owed: Amount) -> Self {
        Self {
            member,
            paid,
            owed,
            net: paid - owed,
        }
    }
}

/// Cross-group totals for one member.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemberTotals {
    /// Gross amount of the expenses the member has a split line in.
    pub involved: Amount,
    /// Gross amount of the expenses the member paid.
    pub paid: Amount,
    /// Every pending split amount the member is listed for.
    pub pending: Amount,
}

/// One raw pending obligation: `debtor` owes `creditor` on `expense`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Obligation {
    pub expense: ExpenseId,
    pub debtor: MemberId,
    pub creditor: MemberId,
    pub amount: Amount,
    pub status: SplitStatus,
    pub timestamp: DateTime<Utc>,
}

impl Obligation {
    pub(crate) fn sort_key(&self) -> (DateTime<Utc>, ExpenseId, MemberId) {
        (self.timestamp, self.expense, self.debtor)
    }
}

/// Pending obligations as seen by one member. No netting is applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WhoOwesWhom {
    /// What the requester owes; the counterparty is `creditor`.
    pub you_owe: Vec<Obligation>,
    /// What other members owe to third parties; the counterparty is `debtor`.
    pub who_gets: Vec<Obligation>,
    /// What other members owe the requester; the counterparty is `debtor`.
    pub owed_to_you: Vec<Obligation>,
}

/// An expense seen from the payer side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payment {
    pub expense: ExpenseId,
    pub payer: MemberId,
    pub amount: Amount,
    pub timestamp: DateTime<Utc>,
}
