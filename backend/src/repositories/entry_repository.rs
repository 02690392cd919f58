use super::ledger_repository::apply_posting;
use super::{EntryRepository, RepoResult};
use crate::error::RepositoryError;
use crate::models::{Entry, EntryResult, LedgerPosting, Transaction};
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

const ENTRY_COLUMNS: &str =
    "id, user_id, question_id, bet, answer, result, win, created_at, updated_at";

/// Repository for entry (wager) data access
pub struct PgEntryRepository {
    pool: PgPool,
}

impl PgEntryRepository {
    /// Create a new PgEntryRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EntryRepository for PgEntryRepository {
    async fn place(&self, entry: &Entry, posting: LedgerPosting) -> RepoResult<(Entry, Transaction)> {
        let mut tx = self.pool.begin().await?;

        // FOR SHARE conflicts with the pending -> completed UPDATE, so a
        // settlement either sees this entry or this insert sees a completed
        // question.
        let state: Option<(String,)> =
            sqlx::query_as("SELECT state FROM questions WHERE id = $1 FOR SHARE")
                .bind(entry.question_id)
                .fetch_optional(&mut *tx)
                .await?;

        match state {
            None => {
                return Err(RepositoryError::NotFound(format!(
                    "Question {} not found",
                    entry.question_id
                )))
            }
            Some((state,)) if state != "pending" => {
                return Err(RepositoryError::InvalidState(
                    "This question is already completed.".to_string(),
                ))
            }
            Some(_) => {}
        }

        let created = sqlx::query_as::<_, Entry>(&format!(
            r#"
            INSERT INTO entries
            (id, user_id, question_id, bet, answer, result, win, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {ENTRY_COLUMNS}
            "#
        ))
        .bind(entry.id)
        .bind(entry.user_id)
        .bind(entry.question_id)
        .bind(entry.bet)
        .bind(&entry.answer)
        .bind(&entry.result)
        .bind(entry.win)
        .bind(entry.created_at)
        .bind(entry.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        let posting = LedgerPosting {
            entry_id: Some(created.id),
            ..posting
        };
        // Insufficient funds drops `tx`, rolling back the entry insert
        let (_, transaction) = apply_posting(&mut *tx, &posting).await?;

        tx.commit().await?;
        Ok((created, transaction))
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Entry>> {
        let entry = sqlx::query_as::<_, Entry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    async fn find_by_question(&self, question_id: Uuid) -> RepoResult<Vec<Entry>> {
        let entries = sqlx::query_as::<_, Entry>(&format!(
            r#"
            SELECT {ENTRY_COLUMNS}
            FROM entries
            WHERE question_id = $1
            ORDER BY created_at ASC
            "#
        ))
        .bind(question_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    async fn find_unsettled_by_question(&self, question_id: Uuid) -> RepoResult<Vec<Entry>> {
        let entries = sqlx::query_as::<_, Entry>(&format!(
            r#"
            SELECT {ENTRY_COLUMNS}
            FROM entries
            WHERE question_id = $1 AND result = 'pending'
            ORDER BY created_at ASC
            "#
        ))
        .bind(question_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    async fn find_by_user(&self, user_id: Uuid) -> RepoResult<Vec<Entry>> {
        let entries = sqlx::query_as::<_, Entry>(&format!(
            r#"
            SELECT {ENTRY_COLUMNS}
            FROM entries
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    async fn find_all(&self) -> RepoResult<Vec<Entry>> {
        let entries = sqlx::query_as::<_, Entry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    async fn count(&self) -> RepoResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM entries")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn settle_loss(&self, entry_id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE entries
            SET result = $2, updated_at = NOW()
            WHERE id = $1 AND result = 'pending'
            "#,
        )
        .bind(entry_id)
        .bind(EntryResult::Failed.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn settle_win(
        &self,
        entry_id: Uuid,
        win: Decimal,
        posting: LedgerPosting,
    ) -> RepoResult<Option<Transaction>> {
        let mut tx = self.pool.begin().await?;

        // The result column is the fence: only the call that flips it from
        // pending writes the credit.
        let marked = sqlx::query(
            r#"
            UPDATE entries
            SET result = $2, win = $3, updated_at = NOW()
            WHERE id = $1 AND result = 'pending'
            "#,
        )
        .bind(entry_id)
        .bind(EntryResult::Success.as_str())
        .bind(win)
        .execute(&mut *tx)
        .await?;

        if marked.rows_affected() == 0 {
            return Ok(None);
        }

        let posting = LedgerPosting {
            entry_id: Some(entry_id),
            ..posting
        };
        let (_, transaction) = apply_posting(&mut *tx, &posting).await?;

        tx.commit().await?;
        Ok(Some(transaction))
    }
}
