use crate::error::BalanceError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Identifier of an account row. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct AccountId(i64);

impl AccountId {
    pub fn new(value: i64) -> Result<Self, BalanceError> {
        if value > 0 {
            Ok(Self(value))
        } else {
            Err(BalanceError::Validation(format!(
                "Account id must be positive, got {value}"
            )))
        }
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A positive amount to debit, in integer currency units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Amount(i64);

impl Amount {
    pub fn new(value: i64) -> Result<Self, BalanceError> {
        if value > 0 {
            Ok(Self(value))
        } else {
            Err(BalanceError::Validation(format!(
                "Amount must be positive, got {value}"
            )))
        }
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stored account balance. Never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
#[serde(transparent)]
pub struct Balance(i64);

impl Balance {
    pub const ZERO: Self = Self(0);

    pub fn new(value: i64) -> Result<Self, BalanceError> {
        if value >= 0 {
            Ok(Self(value))
        } else {
            Err(BalanceError::Validation(format!(
                "Balance must not be negative, got {value}"
            )))
        }
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    /// Subtracts `amount` unless the result would drop below zero.
    pub fn checked_debit(self, amount: Amount) -> Option<Balance> {
        self.0
            .checked_sub(amount.0)
            .filter(|remaining| *remaining >= 0)
            .map(Self)
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An account row: id plus current balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Account {
    pub id: AccountId,
    pub balance: Balance,
}

impl Account {
    pub fn new(id: AccountId, balance: Balance) -> Self {
        Self { id, balance }
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "account {} balance {}", self.id, self.balance)
    }
}

/// Parses the `ID=BALANCE` form used to seed stores from the command line.
impl FromStr for Account {
    type Err = BalanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id, balance) = s.split_once('=').ok_or_else(|| {
            BalanceError::Validation(format!("Expected ID=BALANCE, got '{s}'"))
        })?;
        let parse = |field: &str| {
            field.trim().parse::<i64>().map_err(|e| {
                BalanceError::Validation(format!("Invalid number '{}': {}", field.trim(), e))
            })
        };
        Ok(Self {
            id: AccountId::new(parse(id)?)?,
            balance: Balance::new(parse(balance)?)?,
        })
    }
}

/// What a payment did to the account.
///
/// Only `Applied` mutates the store. The other variants are reported after the
/// transaction has been rolled back.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PaymentOutcome {
    /// The balance was debited; `balance` is the new value.
    Applied { account: AccountId, balance: Balance },
    /// The debit would have made the balance negative; `balance` is unchanged.
    InsufficientFunds {
        account: AccountId,
        balance: Balance,
        amount: Amount,
    },
    AccountNotFound { account: AccountId },
}

impl PaymentOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, PaymentOutcome::Applied { .. })
    }
}

impl fmt::Display for PaymentOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentOutcome::Applied { account, balance } => {
                write!(f, "applied: account {account} balance {balance}")
            }
            PaymentOutcome::InsufficientFunds {
                account,
                balance,
                amount,
            } => write!(
                f,
                "insufficient funds: account {account} balance {balance} amount {amount}"
            ),
            PaymentOutcome::AccountNotFound { account } => {
                write!(f, "account not found: account {account}")
            }
        }
    }
}
