#![allow(dead_code)]

use balance_updater::domain::account::{Account, AccountId, Balance};
use balance_updater::infrastructure::in_memory::InMemoryAccountStore;
use std::path::Path;

pub fn account(id: i64, balance: i64) -> Account {
    Account::new(AccountId::new(id).unwrap(), Balance::new(balance).unwrap())
}

pub fn in_memory(rows: &[(i64, i64)]) -> InMemoryAccountStore {
    InMemoryAccountStore::with_accounts(rows.iter().map(|&(id, balance)| account(id, balance)))
}

pub fn sqlite_url(path: &Path) -> String {
    format!("sqlite://{}", path.display())
}

/// Creates an on-disk SQLite database at `path` holding `rows`.
#[cfg(feature = "storage-sqlite")]
pub async fn create_sqlite_db(path: &Path, rows: &[(i64, i64)]) {
    use balance_updater::infrastructure::sqlite::SCHEMA;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap();

    sqlx::query(SCHEMA).execute(&pool).await.unwrap();
    for &(id, balance) in rows {
        sqlx::query("INSERT INTO userbalance (id, balance) VALUES (?, ?)")
            .bind(id)
            .bind(balance)
            .execute(&pool)
            .await
            .unwrap();
    }
    pool.close().await;
}
