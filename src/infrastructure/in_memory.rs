use crate::domain::account::{Account, AccountId, Amount, Balance};
use crate::domain::ports::{AccountStore, StoreTransaction, StoreTransactionBox};
use crate::error::{BalanceError, Result, StoreError};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// A store phase that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    Connect,
    Begin,
    Execute,
    Commit,
    Rollback,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match self {
            Fault::Connect => "connect",
            Fault::Begin => "begin",
            Fault::Execute => "execute",
            Fault::Commit => "commit",
            Fault::Rollback => "rollback",
        };
        write!(f, "injected {phase} failure")
    }
}

/// A thread-safe in-memory account table.
///
/// Balances live in an `Arc<Mutex<HashMap<AccountId, Balance>>>`. A transaction
/// owns the lock for its whole lifetime, so transactions are serialised, and its
/// writes are staged until `commit`. Clones share the same table.
///
/// Faults set with [`InMemoryAccountStore::fail_on`] apply only to that handle,
/// which lets tests drive one handle into failure and inspect the table through
/// another.
#[derive(Default, Clone)]
pub struct InMemoryAccountStore {
    accounts: Arc<Mutex<HashMap<AccountId, Balance>>>,
    faults: HashSet<Fault>,
}

impl InMemoryAccountStore {
    /// Creates a new, empty in-memory account store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `accounts`.
    pub fn with_accounts(accounts: impl IntoIterator<Item = Account>) -> Self {
        let table = accounts
            .into_iter()
            .map(|account| (account.id, account.balance))
            .collect();
        Self {
            accounts: Arc::new(Mutex::new(table)),
            faults: HashSet::new(),
        }
    }

    /// Makes this handle fail at `fault`.
    pub fn fail_on(mut self, fault: Fault) -> Self {
        self.faults.insert(fault);
        self
    }
}

fn check(faults: &HashSet<Fault>, fault: Fault) -> std::result::Result<(), StoreError> {
    if faults.contains(&fault) {
        Err(fault.to_string().into())
    } else {
        Ok(())
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn begin(&self) -> Result<StoreTransactionBox> {
        check(&self.faults, Fault::Connect).map_err(BalanceError::Connection)?;
        let accounts = Arc::clone(&self.accounts).lock_owned().await;
        check(&self.faults, Fault::Begin).map_err(BalanceError::TransactionBegin)?;

        Ok(Box::new(InMemoryTransaction {
            accounts,
            staged: HashMap::new(),
            faults: self.faults.clone(),
        }))
    }

    async fn balance(&self, account: AccountId) -> Result<Option<Balance>> {
        check(&self.faults, Fault::Connect).map_err(BalanceError::Connection)?;
        Ok(self.accounts.lock().await.get(&account).copied())
    }
}

/// Transaction over the in-memory table. Holds the table lock until dropped.
pub struct InMemoryTransaction {
    accounts: OwnedMutexGuard<HashMap<AccountId, Balance>>,
    staged: HashMap<AccountId, Balance>,
    faults: HashSet<Fault>,
}

impl InMemoryTransaction {
    fn read(&self, account: AccountId) -> Option<Balance> {
        self.staged
            .get(&account)
            .or_else(|| self.accounts.get(&account))
            .copied()
    }
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn debit(&mut self, account: AccountId, amount: Amount) -> Result<u64> {
        check(&self.faults, Fault::Execute).map_err(BalanceError::Execution)?;

        match self.read(account).and_then(|b| b.checked_debit(amount)) {
            Some(remaining) => {
                self.staged.insert(account, remaining);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn balance(&mut self, account: AccountId) -> Result<Option<Balance>> {
        Ok(self.read(account))
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let mut tx = *self;
        // On failure the staged writes are dropped with the transaction.
        check(&tx.faults, Fault::Commit).map_err(BalanceError::Commit)?;
        let staged = std::mem::take(&mut tx.staged);
        tx.accounts.extend(staged);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        check(&self.faults, Fault::Rollback).map_err(BalanceError::Rollback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(id: i64, balance: i64) -> Account {
        Account::new(AccountId::new(id).unwrap(), Balance::new(balance).unwrap())
    }

    fn id(value: i64) -> AccountId {
        AccountId::new(value).unwrap()
    }

    fn amount(value: i64) -> Amount {
        Amount::new(value).unwrap()
    }

    #[tokio::test]
    async fn test_commit_applies_staged_debit() {
        let store = InMemoryAccountStore::with_accounts([account(1, 100)]);

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.debit(id(1), amount(40)).await.unwrap(), 1);
        assert_eq!(tx.balance(id(1)).await.unwrap(), Some(Balance::new(60).unwrap()));
        tx.commit().await.unwrap();

        assert_eq!(store.balance(id(1)).await.unwrap(), Some(Balance::new(60).unwrap()));
    }

    #[tokio::test]
    async fn test_rollback_discards_staged_debit() {
        let store = InMemoryAccountStore::with_accounts([account(1, 100)]);

        let mut tx = store.begin().await.unwrap();
        tx.debit(id(1), amount(40)).await.unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(store.balance(id(1)).await.unwrap(), Some(Balance::new(100).unwrap()));
    }

    #[tokio::test]
    async fn test_drop_discards_staged_debit() {
        let store = InMemoryAccountStore::with_accounts([account(1, 100)]);

        {
            let mut tx = store.begin().await.unwrap();
            tx.debit(id(1), amount(40)).await.unwrap();
        }

        assert_eq!(store.balance(id(1)).await.unwrap(), Some(Balance::new(100).unwrap()));
    }

    #[tokio::test]
    async fn test_conditional_debit_matches_no_rows() {
        let store = InMemoryAccountStore::with_accounts([account(1, 30)]);

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.debit(id(1), amount(50)).await.unwrap(), 0);
        assert_eq!(tx.debit(id(2), amount(1)).await.unwrap(), 0);
        tx.commit().await.unwrap();

        assert_eq!(store.balance(id(1)).await.unwrap(), Some(Balance::new(30).unwrap()));
        assert_eq!(store.balance(id(2)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_debits_within_transaction_accumulate() {
        let store = InMemoryAccountStore::with_accounts([account(1, 100)]);

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.debit(id(1), amount(60)).await.unwrap(), 1);
        assert_eq!(tx.debit(id(1), amount(60)).await.unwrap(), 0);
        assert_eq!(tx.debit(id(1), amount(40)).await.unwrap(), 1);
        tx.commit().await.unwrap();

        assert_eq!(store.balance(id(1)).await.unwrap(), Some(Balance::ZERO));
    }

    #[tokio::test]
    async fn test_faults_only_affect_their_handle() {
        let store = InMemoryAccountStore::with_accounts([account(1, 100)]);
        let faulty = store.clone().fail_on(Fault::Commit);

        let mut tx = faulty.begin().await.unwrap();
        tx.debit(id(1), amount(10)).await.unwrap();
        assert!(matches!(tx.commit().await, Err(BalanceError::Commit(_))));

        assert_eq!(store.balance(id(1)).await.unwrap(), Some(Balance::new(100).unwrap()));
    }

    #[tokio::test]
    async fn test_connect_and_begin_faults() {
        let store = InMemoryAccountStore::new();

        let connect = store.clone().fail_on(Fault::Connect);
        assert!(matches!(connect.begin().await, Err(BalanceError::Connection(_))));
        assert!(matches!(connect.balance(id(1)).await, Err(BalanceError::Connection(_))));

        let begin = store.fail_on(Fault::Begin);
        assert!(matches!(begin.begin().await, Err(BalanceError::TransactionBegin(_))));
    }
}
