use std::fs::File;
use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::amount::ParseAmountError;
use crate::engine::{Balance, Obligation};
use crate::model::{Category, Command, Expense, ExpenseId, GroupId, MemberId, SplitLine, SplitStatus};
use crate::report::GroupReport;
use crate::Amount;

/// Errors that can occur when reading commands or writing reports
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("failed to open {path}: {source}")]
    Open { path: String, source: csv::Error },

    #[error("line {line}: failed to parse row: {source}")]
    Parse { line: usize, source: csv::Error },

    #[error("line {line}: unrecognized row type '{kind}'")]
    UnrecognizedType { line: usize, kind: String },

    #[error("line {line}: {kind} missing {field}")]
    MissingField {
        line: usize,
        kind: String,
        field: &'static str,
    },

    #[error("line {line}: {source}")]
    Amount {
        line: usize,
        source: ParseAmountError,
    },

    #[error("line {line}: split for expense {expense} does not follow its expense row")]
    OrphanSplit { line: usize, expense: ExpenseId },

    #[error("failed to write csv: {0}")]
    Write(#[from] csv::Error),

    #[error("failed to flush output: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Deserialize)]
struct InputRow {
    r#type: String,
    #[serde(default)]
    group: Option<GroupId>,
    #[serde(default)]
    expense: Option<ExpenseId>,
    #[serde(default)]
    member: Option<MemberId>,
    #[serde(default)]
    amount: Option<String>,
    #[serde(default)]
    category: Option<Category>,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    status: Option<SplitStatus>,
    #[serde(default)]
    title: Option<String>,
}

/// A parsed row, before expenses are assembled with their split lines.
enum Row {
    Command(Command),
    Expense(Expense),
    Split(ExpenseId, SplitLine),
}

#[derive(Debug, Serialize)]
struct BalanceRow {
    group: GroupId,
    member: MemberId,
    paid: String,
    owed: String,
    net: String,
}

#[derive(Debug, Serialize)]
struct SummaryRow {
    group: GroupId,
    member: MemberId,
    total: String,
    members: usize,
    share: String,
    you_owe: String,
    you_are_owed: String,
    net: String,
}

#[derive(Debug, Serialize)]
struct ObligationRow {
    kind: &'static str,
    expense: ExpenseId,
    debtor: MemberId,
    creditor: MemberId,
    amount: String,
    status: String,
}

/// Iterator over the commands of a csv file.
///
/// An `expense` row and the `split` rows following it are yielded together as
/// one [`Command::Record`]. Bad rows are yielded as errors and reading goes on.
pub struct CommandReader<R> {
    rows: std::iter::Enumerate<csv::DeserializeRecordsIntoIter<R, InputRow>>,
    /// Expense still collecting split rows
    open: Option<Expense>,
    /// Item held back while an open expense is flushed first
    queued: Option<Result<Command, CsvError>>,
}

/// Read commands from a csv file
pub fn read_commands(path: impl AsRef<Path>) -> Result<CommandReader<File>, CsvError> {
    let path = path.as_ref();
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|source| CsvError::Open {
            path: path.display().to_string(),
            source,
        })?;
    Ok(CommandReader::new(reader))
}

impl<R: io::Read> CommandReader<R> {
    pub fn new(reader: csv::Reader<R>) -> Self {
        Self {
            rows: reader.into_deserialize().enumerate(),
            open: None,
            queued: None,
        }
    }

    fn parse_row(line: usize, row: InputRow) -> Result<Row, CsvError> {
        let kind = row.r#type.as_str();
        let required = |value: Option<u32>, field: &'static str| {
            value.ok_or_else(|| CsvError::MissingField {
                line,
                kind: kind.to_string(),
                field,
            })
        };
        let amount = |value: Option<String>| -> Result<Amount, CsvError> {
            let text = value.ok_or_else(|| CsvError::MissingField {
                line,
                kind: kind.to_string(),
                field: "amount",
            })?;
            text.parse()
                .map_err(|source| CsvError::Amount { line, source })
        };

        let membership = |build: fn(GroupId, MemberId) -> Command| -> Result<Row, CsvError> {
            let group = required(row.group, "group")?;
            let member = required(row.member, "member")?;
            Ok(Row::Command(build(group, member)))
        };

        match kind {
            "join" => membership(|group, member| Command::Join { group, member }),
            "leave" => membership(|group, member| Command::Leave { group, member }),
            "invite" => membership(|group, member| Command::Invite { group, member }),
            "accept" => membership(|group, member| Command::Accept { group, member }),
            "decline" => membership(|group, member| Command::Decline { group, member }),
            "expense" => {
                let mut expense = Expense::new(
                    required(row.expense, "expense")?,
                    required(row.group, "group")?,
                    required(row.member, "member")?,
                    amount(row.amount)?,
                    row.timestamp.unwrap_or_else(Utc::now),
                );
                expense.category = row.category.unwrap_or_default();
                expense.title = row.title.unwrap_or_default();
                Ok(Row::Expense(expense))
            }
            "split" => {
                let expense = required(row.expense, "expense")?;
                let split = SplitLine {
                    member: required(row.member, "member")?,
                    amount: amount(row.amount)?,
                    status: row.status.unwrap_or_default(),
                };
                Ok(Row::Split(expense, split))
            }
            "rename" => Ok(Row::Command(Command::Rename {
                group: required(row.group, "group")?,
                member: required(row.member, "member")?,
                name: row.title.ok_or_else(|| CsvError::MissingField {
                    line,
                    kind: kind.to_string(),
                    field: "title",
                })?,
            })),
            "settle" => Ok(Row::Command(Command::Settle {
                expense: required(row.expense, "expense")?,
                member: required(row.member, "member")?,
            })),
            other => Err(CsvError::UnrecognizedType {
                line,
                kind: other.to_string(),
            }),
        }
    }
}

impl<R: io::Read> Iterator for CommandReader<R> {
    type Item = Result<Command, CsvError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.queued.take() {
                return Some(item);
            }

            let Some((idx, result)) = self.rows.next() else {
                return self.open.take().map(|expense| Ok(Command::Record(expense)));
            };
            let line = idx + 2; // 1-indexed, skip header
            let parsed = result
                .map_err(|source| CsvError::Parse { line, source })
                .and_then(|row| Self::parse_row(line, row));

            match parsed {
                Ok(Row::Split(expense, split)) => match self.open.as_mut() {
                    Some(open) if open.id == expense => open.splits.push(split),
                    _ => return Some(Err(CsvError::OrphanSplit { line, expense })),
                },
                Ok(Row::Expense(expense)) => {
                    if let Some(previous) = self.open.replace(expense) {
                        return Some(Ok(Command::Record(previous)));
                    }
                }
                Ok(Row::Command(command)) => match self.open.take() {
                    Some(previous) => {
                        self.queued = Some(Ok(command));
                        return Some(Ok(Command::Record(previous)));
                    }
                    None => return Some(Ok(command)),
                },
                // a bad row inside an expense block leaves the block open
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Write per-member balances in csv format
pub fn write_balances(
    writer: impl io::Write,
    balances: impl IntoIterator<Item = (GroupId, Balance)>,
) -> Result<(), CsvError> {
    let mut writer = csv::Writer::from_writer(writer);

    for (group, balance) in balances {
        writer.serialize(BalanceRow {
            group,
            member: balance.member,
            paid: balance.paid.to_string(),
            owed: balance.owed.to_string(),
            net: balance.net.to_string(),
        })?;
    }

    writer.flush()?;
    Ok(())
}

/// Write a member's group report: a summary table, a blank line, then every pending obligation
pub fn write_report(mut writer: impl io::Write, report: &GroupReport) -> Result<(), CsvError> {
    {
        let mut summary = csv::Writer::from_writer(&mut writer);
        summary.serialize(SummaryRow {
            group: report.group,
            member: report.requester,
            total: report.total.to_string(),
            members: report.member_count,
            share: report.per_person_share.to_string(),
            you_owe: report.balance.you_owe.to_string(),
            you_are_owed: report.balance.you_are_owed.to_string(),
            net: report.balance.net().to_string(),
        })?;
        summary.flush()?;
    }
    writeln!(writer)?;

    let mut obligations = csv::Writer::from_writer(&mut writer);
    let sections: [(&'static str, &[Obligation]); 3] = [
        ("you_owe", &report.obligations.you_owe),
        ("owed_to_you", &report.obligations.owed_to_you),
        ("who_gets", &report.obligations.who_gets),
    ];
    let mut written = 0;
    for (kind, list) in sections {
        for obligation in list {
            obligations.serialize(ObligationRow {
                kind,
                expense: obligation.expense,
                debtor: obligation.debtor,
                creditor: obligation.creditor,
                amount: obligation.amount.to_string(),
                status: obligation.status.to_string(),
            })?;
            written += 1;
        }
    }
    if written == 0 {
        // header only
        obligations.write_record(["kind", "expense", "debtor", "creditor", "amount", "status"])?;
    }
    obligations.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str = "type,group,expense,member,amount,category,timestamp,status\n";

    fn write_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(HEADER.as_bytes()).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn read(content: &str) -> Vec<Result<Command, CsvError>> {
        let file = write_csv(content);
        read_commands(file.path()).unwrap().collect()
    }

    fn read_titled(content: &str) -> Vec<Result<Command, CsvError>> {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(HEADER.replace('\n', ",title\n").as_bytes()).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        read_commands(file.path()).unwrap().collect()
    }

    #[test]
    fn read_membership_rows() {
        let results = read("join,1,,7,,,,\nleave, 1, , 7, , , ,\ninvite,1,,8,,,,\n");
        assert_eq!(results.len(), 3);
        assert!(matches!(results[0], Ok(Command::Join { group: 1, member: 7 })));
        assert!(matches!(results[1], Ok(Command::Leave { group: 1, member: 7 })));
        assert!(matches!(results[2], Ok(Command::Invite { group: 1, member: 8 })));
    }

    #[test]
    fn read_expense_with_splits() {
        let results = read(
            "expense,1,5,7,90.00,food,2024-05-01T12:00:00Z,\n\
             split,,5,7,30,,,\n\
             split,,5,8,30,,,settled\n\
             split,,5,9,30,,,\n",
        );
        assert_eq!(results.len(), 1);

        let Ok(Command::Record(expense)) = &results[0] else {
            panic!("expected expense");
        };
        assert_eq!(expense.id, 5);
        assert_eq!(expense.group, 1);
        assert_eq!(expense.payer, 7);
        assert_eq!(expense.amount, Amount::from_units(90));
        assert_eq!(expense.category, Category::Food);
        assert_eq!(expense.timestamp.to_rfc3339(), "2024-05-01T12:00:00+00:00");
        assert_eq!(expense.splits.len(), 3);
        assert_eq!(expense.splits[1].status, SplitStatus::Settled);
        assert_eq!(expense.splits[2].status, SplitStatus::Pending);
    }

    #[test]
    fn expense_is_flushed_before_next_command() {
        let results = read(
            "expense,1,5,7,10,,,\n\
             split,,5,7,10,,,\n\
             settle,,5,7,,,,\n\
             expense,1,6,7,4,shoping,,\n\
             split,,6,7,4,,,\n",
        );
        assert_eq!(results.len(), 3);
        assert!(matches!(&results[0], Ok(Command::Record(e)) if e.id == 5));
        assert!(matches!(results[1], Ok(Command::Settle { expense: 5, member: 7 })));
        assert!(matches!(&results[2], Ok(Command::Record(e)) if e.id == 6 && e.category == Category::Shopping));
    }

    #[test]
    fn read_rename_and_titles() {
        let results = read_titled(
            "rename,1,,7,,,,,Flat 3B\n\
             rename,1,,7,,,,,\n\
             expense,1,5,7,10,,,,Groceries\n\
             split,,5,7,10,,,,\n",
        );
        assert_eq!(results.len(), 3);
        assert!(matches!(
            &results[0],
            Ok(Command::Rename { group: 1, member: 7, name }) if name == "Flat 3B"
        ));
        assert!(matches!(
            results[1],
            Err(CsvError::MissingField { line: 3, field: "title", .. })
        ));
        assert!(matches!(&results[2], Ok(Command::Record(e)) if e.title == "Groceries"));
    }

    #[test]
    fn consecutive_expenses_are_separate() {
        let results = read("expense,1,5,7,10,,,\nexpense,1,6,7,20,,,\n");
        assert_eq!(results.len(), 2);
        assert!(matches!(&results[0], Ok(Command::Record(e)) if e.id == 5 && e.splits.is_empty()));
        assert!(matches!(&results[1], Ok(Command::Record(e)) if e.id == 6));
    }

    #[test]
    fn read_returns_error_for_unknown_type() {
        let results = read("unknown,1,1,1,10,,,\n");
        assert_eq!(results.len(), 1);
        let err = results[0].as_ref().unwrap_err();
        assert!(matches!(err, CsvError::UnrecognizedType { line: 2, .. }));
    }

    #[test]
    fn read_returns_error_for_missing_field() {
        let results = read("join,,,7,,,,\nexpense,1,5,7,,,,\n");
        assert!(matches!(
            results[0],
            Err(CsvError::MissingField { line: 2, field: "group", .. })
        ));
        assert!(matches!(
            results[1],
            Err(CsvError::MissingField { line: 3, field: "amount", .. })
        ));
    }

    #[test]
    fn read_returns_error_for_bad_amount() {
        let results = read("expense,1,5,7,1.23456,,,\n");
        assert!(matches!(
            &results[0],
            Err(CsvError::Amount { line: 2, source: ParseAmountError::TooPrecise(_) })
        ));
    }

    #[test]
    fn read_returns_error_for_orphan_split() {
        let results = read("split,,5,7,10,,,\nexpense,1,6,7,10,,,\nsplit,,5,7,10,,,\n");
        assert!(matches!(results[0], Err(CsvError::OrphanSplit { line: 2, expense: 5 })));
        assert!(matches!(results[1], Err(CsvError::OrphanSplit { line: 4, expense: 5 })));
        // expense 6 is still flushed at end of input
        assert!(matches!(&results[2], Ok(Command::Record(e)) if e.id == 6));
    }

    #[test]
    fn read_returns_error_for_unparseable_row() {
        let results = read("join,abc,,7,,,,\n");
        assert!(matches!(results[0], Err(CsvError::Parse { line: 2, .. })));
    }

    #[test]
    fn open_missing_file_fails() {
        assert!(matches!(
            read_commands("/nonexistent/commands.csv"),
            Err(CsvError::Open { .. })
        ));
    }

    #[test]
    fn write_balances_rows() {
        let mut out = Vec::new();
        let rows = [
            (1, Balance::new(7, Amount::from_units(90), Amount::ZERO)),
            (1, Balance::new(8, Amount::ZERO, Amount::from_units(30))),
        ];
        write_balances(&mut out, rows).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "group,member,paid,owed,net");
        assert_eq!(lines[1], "1,7,90.0000,0.0000,90.0000");
        assert_eq!(lines[2], "1,8,0.0000,30.0000,-30.0000");
    }
}
