//! Repository for accounts, balances and the transaction ledger

use super::{LedgerRepository, RepoResult};
use crate::error::RepositoryError;
use crate::models::{LedgerPosting, Role, Transaction, TransactionCategory, User, UserStatus};
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

pub(crate) const USER_COLUMNS: &str =
    "id, username, role, status, balance, created_at, updated_at";

pub(crate) const TRANSACTION_COLUMNS: &str = "id, user_id, amount, message, category, balance_after, \
     question_id, entry_id, order_id, provider_order_id, provider_payment_id, provider_signature, created_at";

pub struct PgLedgerRepository {
    pool: PgPool,
}

impl PgLedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Apply a posting on an open connection (normally inside a transaction).
///
/// The balance update is a single conditional statement, so concurrent
/// debits against the same account cannot both pass the funds check.
pub(crate) async fn apply_posting(
    conn: &mut PgConnection,
    posting: &LedgerPosting,
) -> RepoResult<(User, Transaction)> {
    let delta = posting.delta();

    let updated = sqlx::query_as::<_, User>(&format!(
        r#"
        UPDATE users
        SET balance = balance + $2, updated_at = NOW()
        WHERE id = $1 AND balance + $2 >= 0
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(posting.user_id)
    .bind(delta)
    .fetch_optional(&mut *conn)
    .await?;

    let user = match updated {
        Some(user) => user,
        None => {
            let current: Option<(Decimal,)> =
                sqlx::query_as("SELECT balance FROM users WHERE id = $1")
                    .bind(posting.user_id)
                    .fetch_optional(&mut *conn)
                    .await?;

            return Err(match current {
                None => RepositoryError::NotFound(format!("User {} not found", posting.user_id)),
                Some((balance,)) => RepositoryError::InsufficientFunds(format!(
                    "Insufficient balance: available {}, required {}",
                    balance, posting.amount
                )),
            });
        }
    };

    let transaction = posting.clone().into_transaction(user.balance);
    insert_transaction(conn, &transaction).await?;

    Ok((user, transaction))
}

async fn insert_transaction(conn: &mut PgConnection, tx: &Transaction) -> RepoResult<()> {
    sqlx::query(
        r#"
        INSERT INTO transactions
        (id, user_id, amount, message, category, balance_after, question_id, entry_id,
         order_id, provider_order_id, provider_payment_id, provider_signature, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        "#,
    )
    .bind(tx.id)
    .bind(tx.user_id)
    .bind(tx.amount)
    .bind(&tx.message)
    .bind(&tx.category)
    .bind(tx.balance_after)
    .bind(tx.question_id)
    .bind(tx.entry_id)
    .bind(&tx.order_id)
    .bind(&tx.provider_order_id)
    .bind(&tx.provider_payment_id)
    .bind(&tx.provider_signature)
    .bind(tx.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

#[async_trait]
impl LedgerRepository for PgLedgerRepository {
    async fn create_user(&self, username: &str, role: Role) -> RepoResult<User> {
        let user = User::new(username.to_string(), role);
        let created = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, username, role, status, balance, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.role)
        .bind(&user.status)
        .bind(user.balance)
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn find_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn count_users(&self) -> RepoResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn set_user_status(&self, id: Uuid, status: UserStatus) -> RepoResult<User> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RepositoryError::NotFound(format!("User {} not found", id)))
    }

    async fn apply(&self, posting: LedgerPosting) -> RepoResult<(User, Transaction)> {
        let mut tx = self.pool.begin().await?;
        let applied = apply_posting(&mut *tx, &posting).await?;
        tx.commit().await?;
        Ok(applied)
    }

    async fn find_transactions_by_user(
        &self,
        user_id: Uuid,
        limit: Option<i64>,
    ) -> RepoResult<Vec<Transaction>> {
        let transactions = sqlx::query_as::<_, Transaction>(&format!(
            r#"
            SELECT {TRANSACTION_COLUMNS}
            FROM transactions
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(transactions)
    }

    async fn find_all_transactions(&self, limit: Option<i64>) -> RepoResult<Vec<Transaction>> {
        let transactions = sqlx::query_as::<_, Transaction>(&format!(
            r#"
            SELECT {TRANSACTION_COLUMNS}
            FROM transactions
            ORDER BY created_at DESC
            LIMIT $1
            "#
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(transactions)
    }

    async fn totals_by_category(
        &self,
        user_id: Option<Uuid>,
    ) -> RepoResult<HashMap<TransactionCategory, Decimal>> {
        let rows: Vec<(String, Decimal)> = sqlx::query_as(
            r#"
            SELECT category, COALESCE(SUM(amount), 0)
            FROM transactions
            WHERE $1::UUID IS NULL OR user_id = $1
            GROUP BY category
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(category, total)| {
                TransactionCategory::from_str(&category).map(|c| (c, total))
            })
            .collect())
    }
}
