use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use split_eng::csv::{CsvError, read_commands, write_balances, write_report};
use split_eng::engine::NotFoundError;
use split_eng::{EngineError, GroupId, Ledger, MemberId, group_report, report};
use thiserror::Error;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

/// Replay a csv file of group commands and print balances.
#[derive(Debug, Parser)]
#[command(name = "split-eng", version)]
struct Cli {
    /// Commands csv file
    path: PathBuf,

    /// Log every applied and skipped command
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    output: Option<Output>,
}

#[derive(Debug, Clone, Subcommand)]
enum Output {
    /// Balance of every member of every group (default)
    Balances,
    /// Totals and pending obligations for one member of one group
    Report {
        #[arg(long, env = "SPLIT_ENG_GROUP")]
        group: GroupId,
        #[arg(long, env = "SPLIT_ENG_MEMBER")]
        member: MemberId,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Csv(#[from] CsvError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl From<NotFoundError> for CliError {
    fn from(e: NotFoundError) -> Self {
        CliError::Engine(e.into())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();

    if cli.path.extension().is_none_or(|ext| ext != "csv") {
        warn!(path = %cli.path.display(), "input file seems to not be a csv file");
    }

    let reader = match read_commands(&cli.path) {
        Ok(reader) => reader,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let mut ledger = Ledger::new();
    let (command_sender, command_receiver) = tokio::sync::mpsc::channel(16);

    tokio::task::spawn_blocking(move || {
        for result in reader {
            match result {
                Ok(command) => {
                    if command_sender.blocking_send(command).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("{e}");
                }
            }
        }
    });

    ledger.run(ReceiverStream::new(command_receiver)).await;

    match print(&ledger, cli.output.unwrap_or(Output::Balances)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn print(ledger: &Ledger, output: Output) -> Result<(), CliError> {
    let stdout = io::stdout();

    match output {
        Output::Balances => {
            let mut groups: Vec<GroupId> = ledger.groups().map(|g| g.id).collect();
            groups.sort_unstable();

            let mut rows = Vec::new();
            for group in groups {
                let balances = report::group_balances(ledger, group)?;
                rows.extend(balances.into_iter().map(|balance| (group, balance)));
            }
            write_balances(stdout.lock(), rows)?;
        }
        Output::Report { group, member } => {
            let report = group_report(ledger, group, member)?;
            write_report(stdout.lock(), &report)?;
        }
    }

    Ok(())
}
