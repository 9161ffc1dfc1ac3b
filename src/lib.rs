pub mod amount;
pub mod csv;
pub mod engine;
pub mod ledger;
pub mod model;
pub mod report;

pub use amount::Amount;
pub use engine::EngineError;
pub use ledger::{ExpenseStore, Ledger, LedgerError};
pub use model::{Command, Expense, ExpenseId, GroupFilter, GroupId, MemberId, SplitLine, SplitStatus};
pub use report::{GroupReport, group_report};
