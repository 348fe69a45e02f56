use balance_updater::application::updater::BalanceUpdater;
use balance_updater::domain::account::{Account, AccountId};
use balance_updater::domain::ports::AccountStoreBox;
use balance_updater::infrastructure::in_memory::InMemoryAccountStore;
#[cfg(feature = "storage-sqlite")]
use balance_updater::infrastructure::sqlite::SqliteAccountStore;
use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result, miette};
use serde::Serialize;
use std::fmt::Display;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// SQLite database URL, e.g. `sqlite:accounts.db`. If omitted, an in-memory store is used.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Maximum number of pooled database connections.
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u32).range(1..))]
    max_connections: u32,

    /// Account to create in the in-memory store, as ID=BALANCE. Repeatable.
    #[arg(long = "seed", value_name = "ID=BALANCE", conflicts_with = "database_url")]
    seeds: Vec<Account>,

    /// Print results as JSON.
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Debit AMOUNT from ACCOUNT, keeping the balance non-negative.
    Pay {
        #[arg(allow_negative_numbers = true)]
        account: i64,
        #[arg(allow_negative_numbers = true)]
        amount: i64,
    },
    /// Show the balance of ACCOUNT.
    Balance {
        #[arg(allow_negative_numbers = true)]
        account: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    let updater = BalanceUpdater::new(open_store(&cli)?);

    match cli.command {
        Command::Pay { account, amount } => {
            let outcome = updater
                .update_balance_with_payment(account, amount)
                .await
                .into_diagnostic()?;
            print(&outcome, cli.json)?;
        }
        Command::Balance { account } => {
            let account = AccountId::new(account).into_diagnostic()?;
            let balance = updater
                .balance(account)
                .await
                .into_diagnostic()?
                .ok_or_else(|| miette!("account {account} not found"))?;
            print(&Account::new(account, balance), cli.json)?;
        }
    }

    Ok(())
}

fn open_store(cli: &Cli) -> Result<AccountStoreBox> {
    match &cli.database_url {
        #[cfg(feature = "storage-sqlite")]
        Some(url) => {
            let store =
                SqliteAccountStore::connect_lazy(url, cli.max_connections).into_diagnostic()?;
            Ok(Box::new(store))
        }
        #[cfg(not(feature = "storage-sqlite"))]
        Some(_) => {
            eprintln!(
                "WARNING: Database requested via --database-url, but 'storage-sqlite' feature is not enabled. Falling back to In-Memory storage."
            );
            Ok(Box::new(InMemoryAccountStore::with_accounts(
                cli.seeds.iter().copied(),
            )))
        }
        None => Ok(Box::new(InMemoryAccountStore::with_accounts(
            cli.seeds.iter().copied(),
        ))),
    }
}

fn print<T: Serialize + Display>(value: &T, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(value).into_diagnostic()?);
    } else {
        println!("{value}");
    }
    Ok(())
}
