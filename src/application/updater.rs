use crate::domain::account::{AccountId, Amount, Balance, PaymentOutcome};
use crate::domain::ports::{AccountStoreBox, StoreTransactionBox};
use crate::error::{BalanceError, Result};
use log::{debug, info, warn};

/// Debits account balances inside a store transaction.
///
/// Each payment runs as `begin -> conditional debit -> read balance -> commit`.
/// The debit only matches a row whose balance stays non-negative, so the store
/// itself rejects overdrafts. Any failure after `begin` rolls the transaction
/// back before the error is returned.
///
/// There is no retry and no locking here: concurrent payments against the same
/// account are serialised by the store. To bound a call, wrap it in
/// `tokio::time::timeout`; dropping the future drops the open transaction,
/// which rolls it back.
pub struct BalanceUpdater {
    store: AccountStoreBox,
}

impl BalanceUpdater {
    pub fn new(store: AccountStoreBox) -> Self {
        Self { store }
    }

    /// Debits `payment_amount` from the account `user_id`.
    ///
    /// Both values must be positive; otherwise a `BalanceError::Validation` is
    /// returned without touching the store.
    pub async fn update_balance_with_payment(
        &self,
        user_id: i64,
        payment_amount: i64,
    ) -> Result<PaymentOutcome> {
        let account = AccountId::new(user_id)?;
        let amount = Amount::new(payment_amount)?;
        self.apply_payment(account, amount).await
    }

    /// Debits `amount` from `account` exactly once, or leaves it unchanged.
    ///
    /// Returns `Ok(PaymentOutcome::Applied)` with the new balance when the debit
    /// was committed. When the conditional update matches no row the transaction
    /// is rolled back and the outcome says why: `InsufficientFunds` (the balance
    /// is reported unchanged) or `AccountNotFound`. Neither is an error.
    ///
    /// Errors name the phase that failed. If the rollback that follows a failure
    /// fails too, `BalanceError::RollbackFailed` carries both.
    pub async fn apply_payment(&self, account: AccountId, amount: Amount) -> Result<PaymentOutcome> {
        let mut tx = self.store.begin().await?;
        debug!("began transaction for payment of {amount} from account {account}");

        let debited = tx.debit(account, amount).await;
        let rows = match debited {
            Ok(rows) => rows,
            Err(err) => return Err(abort(tx, err).await),
        };
        let read = tx.balance(account).await;
        let balance = match read {
            Ok(balance) => balance,
            Err(err) => return Err(abort(tx, err).await),
        };

        if rows == 0 {
            let outcome = match balance {
                Some(balance) => PaymentOutcome::InsufficientFunds {
                    account,
                    balance,
                    amount,
                },
                None => PaymentOutcome::AccountNotFound { account },
            };
            tx.rollback().await?;
            info!("payment not applied: {outcome}");
            return Ok(outcome);
        }

        let Some(balance) = balance else {
            let err = BalanceError::Execution(
                format!("account {account} vanished after a successful debit").into(),
            );
            return Err(abort(tx, err).await);
        };

        tx.commit().await?;
        let outcome = PaymentOutcome::Applied { account, balance };
        info!("payment committed: {outcome}");
        Ok(outcome)
    }

    /// Reads the current balance of `account`, if it exists.
    pub async fn balance(&self, account: AccountId) -> Result<Option<Balance>> {
        self.store.balance(account).await
    }
}

/// Rolls `tx` back after `cause` and returns the error to report.
async fn abort(tx: StoreTransactionBox, cause: BalanceError) -> BalanceError {
    debug!("rolling back after: {cause}");
    match tx.rollback().await {
        Ok(()) => cause,
        Err(rollback) => {
            warn!("rollback failed: {rollback}");
            BalanceError::RollbackFailed {
                cause: Box::new(cause),
                source: Box::new(rollback),
            }
        }
    }
}
