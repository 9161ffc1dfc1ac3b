//! Error types for balance computation.

use thiserror::Error;

use crate::Amount;
use crate::model::{ExpenseId, GroupId, MemberId};

/// Top-level error returned by report computations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Division(#[from] DivisionError),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),
}

/// Malformed or inconsistent expense input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("split mismatch: expense {expense} amount {expected}, split lines sum to {actual}")]
    SplitMismatch {
        expense: ExpenseId,
        expected: Amount,
        actual: Amount,
    },
    #[error("empty split: expense {0} has no split lines")]
    EmptySplit(ExpenseId),
    #[error("non-positive amount {1} on expense {0}")]
    NonPositiveAmount(ExpenseId, Amount),
    #[error("member {1} appears more than once in the split of expense {0}")]
    DuplicateSplitMember(ExpenseId, MemberId),
    #[error("split lines of expense {0} overflow the amount range")]
    AmountOverflow(ExpenseId),
}

/// Share computation over an empty member set.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DivisionError {
    #[error("cannot compute a per-person share for zero members")]
    ZeroMembers,
}

/// A referenced record is absent.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NotFoundError {
    #[error("group {0} not found")]
    Group(GroupId),
    #[error("expense {0} not found")]
    Expense(ExpenseId),
    #[error("member {0} not found")]
    Member(MemberId),
    #[error("no pending split line for member {1} on expense {0}")]
    SplitLine(ExpenseId, MemberId),
}
