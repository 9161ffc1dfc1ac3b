//! Error types for ledger mutations.

use thiserror::Error;

use crate::engine::{NotFoundError, ValidationError};
use crate::model::{ExpenseId, GroupId, MemberId};

/// Error returned by [`Ledger::apply`](super::Ledger::apply) and the mutations behind it.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("expense rejected: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error("duplicate expense id {0}")]
    DuplicateExpense(ExpenseId),

    #[error("group {0} already exists")]
    GroupExists(GroupId),

    #[error("member {1} is not in group {0}")]
    NotAMember(GroupId, MemberId),

    #[error("member {1} is already in group {0}")]
    AlreadyMember(GroupId, MemberId),

    #[error("member {1} created group {0} and cannot leave it")]
    CreatorRemoval(GroupId, MemberId),

    #[error("member {1} did not create group {0}")]
    NotCreator(GroupId, MemberId),

    #[error("member {1} has no pending invitation to group {0}")]
    NoPendingInvitation(GroupId, MemberId),
}
