use super::account::{AccountId, Amount, Balance};
use crate::error::Result;
use async_trait::async_trait;

/// A transactional account store.
///
/// `begin` acquires a connection and opens a transaction on it. Adapters report
/// a failure to reach the store as `BalanceError::Connection` and a failure of
/// the begin itself as `BalanceError::TransactionBegin`.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn begin(&self) -> Result<StoreTransactionBox>;

    /// Reads a balance outside of any caller-visible transaction.
    async fn balance(&self, account: AccountId) -> Result<Option<Balance>>;
}

/// An open transaction against an `AccountStore`.
///
/// Dropping a transaction without calling `commit` or `rollback` rolls it back
/// and releases its connection.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Executes the conditional debit
    /// `balance = balance - amount WHERE id = account AND balance - amount >= 0`
    /// and returns the number of rows affected.
    async fn debit(&mut self, account: AccountId, amount: Amount) -> Result<u64>;

    /// Reads a balance as seen by this transaction.
    async fn balance(&mut self, account: AccountId) -> Result<Option<Balance>>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

pub type AccountStoreBox = Box<dyn AccountStore>;
pub type StoreTransactionBox = Box<dyn StoreTransaction>;
