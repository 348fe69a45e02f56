use crate::domain::account::{AccountId, Amount, Balance};
use crate::domain::ports::{AccountStore, StoreTransaction, StoreTransactionBox};
use crate::error::{BalanceError, Result, StoreError};
use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};

/// DDL for the accounts table. The store never runs it; schema management is
/// left to whoever provisions the database.
pub const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS userbalance (
    id INTEGER PRIMARY KEY,
    balance INTEGER NOT NULL CHECK (balance >= 0)
)";

const DEBIT: &str =
    "UPDATE userbalance SET balance = balance - ? WHERE id = ? AND (balance - ?) >= 0";
const SELECT_BALANCE: &str = "SELECT balance FROM userbalance WHERE id = ?";

// Primary result code for "unable to open database file".
const SQLITE_CANTOPEN: i32 = 14;

/// A relational account store on a SQLite connection pool.
///
/// Every transaction is opened through the pool's native transaction API and
/// holds one pooled connection until it is committed, rolled back or dropped.
#[derive(Clone)]
pub struct SqliteAccountStore {
    pool: SqlitePool,
}

impl SqliteAccountStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Builds a pool for `database_url`. Connections are opened on first use, so
    /// an unreachable database surfaces as `BalanceError::Connection` from the
    /// first operation. `max_connections` must be at least 1.
    pub fn connect_lazy(database_url: &str, max_connections: u32) -> Result<Self> {
        if max_connections == 0 {
            return Err(BalanceError::Validation(
                "max_connections must be at least 1".to_string(),
            ));
        }
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_lazy(database_url)
            .map_err(|e| BalanceError::Connection(e.into()))?;
        Ok(Self::new(pool))
    }
}

/// Whether `err` means no connection could be obtained at all.
fn is_connection_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Configuration(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => true,
        sqlx::Error::Database(db) => db
            .code()
            .and_then(|code| code.parse::<i32>().ok())
            .is_some_and(|code| code & 0xff == SQLITE_CANTOPEN),
        _ => false,
    }
}

fn classify(err: sqlx::Error, otherwise: fn(StoreError) -> BalanceError) -> BalanceError {
    if is_connection_error(&err) {
        BalanceError::Connection(err.into())
    } else {
        otherwise(err.into())
    }
}

fn to_balance(raw: Option<i64>) -> Result<Option<Balance>> {
    raw.map(|value| {
        Balance::new(value).map_err(|e| BalanceError::Execution(Box::new(e)))
    })
    .transpose()
}

#[async_trait]
impl AccountStore for SqliteAccountStore {
    async fn begin(&self) -> Result<StoreTransactionBox> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| classify(e, BalanceError::TransactionBegin))?;
        Ok(Box::new(SqliteTransaction { tx }))
    }

    async fn balance(&self, account: AccountId) -> Result<Option<Balance>> {
        let raw = sqlx::query_scalar::<_, i64>(SELECT_BALANCE)
            .bind(account.value())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| classify(e, BalanceError::Execution))?;
        to_balance(raw)
    }
}

/// An open SQLite transaction. Rolled back by `sqlx` if dropped while open.
pub struct SqliteTransaction {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl StoreTransaction for SqliteTransaction {
    async fn debit(&mut self, account: AccountId, amount: Amount) -> Result<u64> {
        let result = sqlx::query(DEBIT)
            .bind(amount.value())
            .bind(account.value())
            .bind(amount.value())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| BalanceError::Execution(e.into()))?;
        Ok(result.rows_affected())
    }

    async fn balance(&mut self, account: AccountId) -> Result<Option<Balance>> {
        let raw = sqlx::query_scalar::<_, i64>(SELECT_BALANCE)
            .bind(account.value())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| BalanceError::Execution(e.into()))?;
        to_balance(raw)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| BalanceError::Commit(e.into()))
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| BalanceError::Rollback(e.into()))
    }
}
