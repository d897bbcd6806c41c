use std::fs::File;
use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use uuid::Uuid;

use crate::application::{SqliteLedger, Statement};
use crate::config::{DEFAULT_DATABASE, LogFormat, Settings};
use crate::domain::{IntegrityReport, StatementEntry, format_cents, parse_amount};
use crate::io::StatementExporter;
use crate::telemetry;

/// fin-ledger - append-only statement ledger
#[derive(Parser)]
#[command(name = "fin-ledger")]
#[command(about = "Deposits, withdrawals and transfers over an append-only statement log")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, env = "FIN_LEDGER_DATABASE", default_value = DEFAULT_DATABASE, global = true)]
    pub database: String,

    /// Log output format
    #[arg(long, env = "FIN_LEDGER_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty, global = true)]
    pub log_format: LogFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// User directory commands
    #[command(subcommand)]
    User(UserCommands),

    /// Deposit money into a user's account
    Deposit {
        /// Amount (e.g., "50.00" or "50")
        amount: String,

        /// Acting user id
        #[arg(short, long)]
        user: Uuid,

        /// Description of the deposit
        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// Withdraw money from a user's account
    Withdraw {
        /// Amount (e.g., "50.00" or "50")
        amount: String,

        /// Acting user id
        #[arg(short, long)]
        user: Uuid,

        /// Description of the withdrawal
        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// Transfer money to another user
    Transfer {
        /// Amount (e.g., "50.00" or "50")
        amount: String,

        /// Acting (sending) user id
        #[arg(short, long)]
        user: Uuid,

        /// Receiving user id
        #[arg(long)]
        to: Uuid,

        /// Description of the transfer
        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// Show one statement entry
    Show {
        /// Entry id
        id: Uuid,

        /// Acting user id
        #[arg(short, long)]
        user: Uuid,
    },

    /// Show balance and history for a user
    Statement {
        /// Acting user id
        #[arg(short, long)]
        user: Uuid,
    },

    /// Export a user's statement
    Export {
        /// Acting user id
        #[arg(short, long)]
        user: Uuid,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Verify ledger integrity
    Check,
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Register a user in the local directory
    Add {
        /// Display name
        name: String,
    },

    /// List registered users
    List,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl Cli {
    pub fn settings(&self) -> Settings {
        Settings {
            database_path: self.database.clone(),
            log_format: self.log_format,
            verbose: self.verbose,
        }
    }

    pub async fn run(self) -> Result<()> {
        let settings = self.settings();
        telemetry::init(&settings);

        if let Commands::Init = self.command {
            SqliteLedger::init(&settings.database_path).await?;
            println!("Initialized ledger database at {}", settings.database_path);
            return Ok(());
        }

        let service = SqliteLedger::connect(&settings.database_path)
            .await
            .with_context(|| {
                format!(
                    "Could not open {} (run `fin-ledger init` first)",
                    settings.database_path
                )
            })?;

        match self.command {
            // Handled before connecting.
            Commands::Init => {}
            Commands::User(cmd) => match cmd {
                UserCommands::Add { name } => {
                    let user = service.directory().register_user(&name).await?;
                    println!("Registered user '{}' with id {}", user.name, user.id);
                }
                UserCommands::List => {
                    let users = service.directory().list_users().await?;
                    if users.is_empty() {
                        println!("No users registered.");
                    }
                    for user in users {
                        println!("{}  {}", user.id, user.name);
                    }
                }
            },
            Commands::Deposit {
                amount,
                user,
                description,
            } => {
                let amount = parse_amount(&amount)?;
                let entry = service.record_deposit(user, amount, &description).await?;
                print_entry(&entry);
            }
            Commands::Withdraw {
                amount,
                user,
                description,
            } => {
                let amount = parse_amount(&amount)?;
                let entry = service.record_withdraw(user, amount, &description).await?;
                print_entry(&entry);
            }
            Commands::Transfer {
                amount,
                user,
                to,
                description,
            } => {
                let amount = parse_amount(&amount)?;
                let entry = service.transfer(user, to, amount, &description).await?;
                print_entry(&entry);
            }
            Commands::Show { id, user } => {
                let entry = service.get_entry(user, id).await?;
                print_entry(&entry);
            }
            Commands::Statement { user } => {
                let statement = service.get_balance_and_history(user).await?;
                print_statement(&statement);
            }
            Commands::Export {
                user,
                format,
                output,
            } => {
                let writer: Box<dyn Write> = match &output {
                    Some(path) => Box::new(
                        File::create(path).with_context(|| format!("Failed to create {}", path))?,
                    ),
                    None => Box::new(io::stdout()),
                };
                let exporter = StatementExporter::new(&service);
                match format {
                    ExportFormat::Csv => {
                        let rows = exporter.export_csv(user, writer).await?;
                        if output.is_some() {
                            eprintln!("Exported {} entries", rows);
                        }
                    }
                    ExportFormat::Json => exporter.export_json(user, writer).await?,
                }
            }
            Commands::Check => {
                let report = service.check_integrity().await?;
                print_report(&report);
                if !report.is_healthy() {
                    anyhow::bail!("ledger integrity check failed");
                }
            }
        }

        Ok(())
    }
}

fn print_entry(entry: &StatementEntry) {
    print!("{}", format_entry(entry));
}

fn format_entry(entry: &StatementEntry) -> String {
    let mut fields = vec![
        ("Entry:", entry.id.to_string()),
        ("Kind:", entry.kind.to_string()),
        ("Amount:", format_cents(entry.amount)),
        ("Owner:", entry.owner_id.to_string()),
    ];
    if let Some(counterparty) = entry.counterparty_id {
        fields.push(("Counterparty:", counterparty.to_string()));
    }
    if !entry.description.is_empty() {
        fields.push(("Description:", entry.description.clone()));
    }
    fields.push((
        "Created at:",
        entry.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
    ));

    fields
        .into_iter()
        .map(|(label, value)| format!("{:<14}{}\n", label, value))
        .collect()
}

fn print_statement(statement: &Statement) {
    println!("Balance: {}", format_cents(statement.balance));
    if statement.entries.is_empty() {
        println!("No entries.");
        return;
    }
    println!();
    println!("{:<20} {:<16} {:>12}  {}", "DATE", "KIND", "AMOUNT", "DESCRIPTION");
    for entry in &statement.entries {
        println!(
            "{:<20} {:<16} {:>12}  {}",
            entry.created_at.format("%Y-%m-%d %H:%M:%S"),
            entry.kind,
            format_cents(entry.signed_amount()),
            entry.description
        );
    }
}

fn print_report(report: &IntegrityReport) {
    println!("Entries: {}", report.entry_count);
    println!("Owners:  {}", report.owner_count);
    for id in &report.invalid_amounts {
        println!("  invalid amount on entry {}", id);
    }
    for id in &report.unpaired_legs {
        println!("  unpaired transfer leg {}", id);
    }
    for (owner, balance) in &report.negative_balances {
        println!("  negative balance {} for user {}", format_cents(*balance), owner);
    }
    for owner in &report.overflowed_balances {
        println!("  balance out of range for user {}", owner);
    }
    for owner in &report.unknown_owners {
        println!("  entries owned by unknown user {}", owner);
    }
    if report.is_healthy() {
        println!("Ledger is consistent.");
    }
}
