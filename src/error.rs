use thiserror::Error;

/// Underlying failure reported by a store backend.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced by the balance updater.
///
/// Each store variant names the transaction phase that failed, so callers can
/// tell a connection problem apart from a failed commit.
#[derive(Error, Debug)]
pub enum BalanceError {
    #[error("failed to acquire a store connection: {0}")]
    Connection(#[source] StoreError),
    #[error("failed to begin transaction: {0}")]
    TransactionBegin(#[source] StoreError),
    #[error("failed to execute statement: {0}")]
    Execution(#[source] StoreError),
    #[error("failed to commit transaction: {0}")]
    Commit(#[source] StoreError),
    #[error("failed to roll back transaction: {0}")]
    Rollback(#[source] StoreError),
    /// A rollback attempted after `cause` failed as well.
    #[error("{source} (after: {cause})")]
    RollbackFailed {
        cause: Box<BalanceError>,
        #[source]
        source: Box<BalanceError>,
    },
    #[error("validation error: {0}")]
    Validation(String),
}

impl BalanceError {
    /// The error that started the failure, looking through a failed rollback.
    pub fn root_cause(&self) -> &BalanceError {
        match self {
            BalanceError::RollbackFailed { cause, .. } => cause.root_cause(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, BalanceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_phase() {
        let err = BalanceError::Commit("disk full".into());
        assert_eq!(err.to_string(), "failed to commit transaction: disk full");
    }

    #[test]
    fn test_root_cause_unwraps_rollback_failure() {
        let err = BalanceError::RollbackFailed {
            cause: Box::new(BalanceError::Execution("constraint".into())),
            source: Box::new(BalanceError::Rollback("connection reset".into())),
        };
        assert!(matches!(err.root_cause(), BalanceError::Execution(_)));
        assert_eq!(
            err.to_string(),
            "failed to roll back transaction: connection reset \
             (after: failed to execute statement: constraint)"
        );
    }
}
