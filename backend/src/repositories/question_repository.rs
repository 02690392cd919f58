use super::{QuestionCounts, QuestionRepository, RepoResult};
use crate::error::RepositoryError;
use crate::models::{Answer, Question, QuestionPatch, QuestionState};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

pub(crate) const QUESTION_COLUMNS: &str = "id, owner_id, category_id, question, min_bet, max_bet, \
     starting, ending, state, answer, created_at, updated_at";

/// Repository for question data access
pub struct PgQuestionRepository {
    pool: PgPool,
}

impl PgQuestionRepository {
    /// Create a new PgQuestionRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Row-lock a question for the rest of the enclosing transaction
    async fn lock(conn: &mut PgConnection, id: Uuid) -> RepoResult<Question> {
        sqlx::query_as::<_, Question>(&format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| RepositoryError::NotFound(format!("Question {} not found", id)))
    }
}

#[async_trait]
impl QuestionRepository for PgQuestionRepository {
    async fn insert(&self, question: &Question) -> RepoResult<Question> {
        let created = sqlx::query_as::<_, Question>(&format!(
            r#"
            INSERT INTO questions
            (id, owner_id, category_id, question, min_bet, max_bet, starting, ending,
             state, answer, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {QUESTION_COLUMNS}
            "#
        ))
        .bind(question.id)
        .bind(question.owner_id)
        .bind(question.category_id)
        .bind(&question.question)
        .bind(question.min_bet)
        .bind(question.max_bet)
        .bind(question.starting)
        .bind(question.ending)
        .bind(&question.state)
        .bind(&question.answer)
        .bind(question.created_at)
        .bind(question.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Question>> {
        let question = sqlx::query_as::<_, Question>(&format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(question)
    }

    async fn find_all(&self) -> RepoResult<Vec<Question>> {
        let questions = sqlx::query_as::<_, Question>(&format!(
            "SELECT {QUESTION_COLUMNS} FROM questions ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(questions)
    }

    async fn find_pending(&self) -> RepoResult<Vec<Question>> {
        let questions = sqlx::query_as::<_, Question>(&format!(
            r#"
            SELECT {QUESTION_COLUMNS}
            FROM questions
            WHERE state = 'pending'
            ORDER BY created_at DESC
            "#
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(questions)
    }

    async fn update(&self, id: Uuid, patch: QuestionPatch) -> RepoResult<Question> {
        let mut tx = self.pool.begin().await?;

        let mut question = Self::lock(&mut *tx, id).await?;
        if question.is_completed() {
            return Err(RepositoryError::InvalidState(
                "This question is already completed.".to_string(),
            ));
        }
        question
            .apply_patch(patch)
            .map_err(RepositoryError::InvalidInput)?;

        let updated = sqlx::query_as::<_, Question>(&format!(
            r#"
            UPDATE questions
            SET category_id = $2, question = $3, min_bet = $4, max_bet = $5,
                starting = $6, ending = $7, updated_at = $8
            WHERE id = $1 AND state = 'pending'
            RETURNING {QUESTION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(question.category_id)
        .bind(&question.question)
        .bind(question.min_bet)
        .bind(question.max_bet)
        .bind(question.starting)
        .bind(question.ending)
        .bind(question.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    async fn delete(&self, id: Uuid, now: NaiveDateTime) -> RepoResult<()> {
        let mut tx = self.pool.begin().await?;

        let question = Self::lock(&mut *tx, id).await?;
        if question.is_completed() {
            return Err(RepositoryError::InvalidState(
                "This question is already completed.".to_string(),
            ));
        }
        if question.has_started(now) {
            return Err(RepositoryError::InvalidState(
                "This question is already started.".to_string(),
            ));
        }

        let (entries,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM entries WHERE question_id = $1")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        if entries > 0 {
            return Err(RepositoryError::InvalidState(
                "This question already has entries.".to_string(),
            ));
        }

        sqlx::query("DELETE FROM questions WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn mark_completed(&self, id: Uuid, answer: Answer) -> RepoResult<Question> {
        // Conditional transition: of two concurrent callers only one matches
        // `state = 'pending'`.
        let completed = sqlx::query_as::<_, Question>(&format!(
            r#"
            UPDATE questions
            SET state = $2, answer = $3, updated_at = NOW()
            WHERE id = $1 AND state = 'pending'
            RETURNING {QUESTION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(QuestionState::Completed.as_str())
        .bind(answer.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match completed {
            Some(question) => Ok(question),
            None => match self.find_by_id(id).await? {
                Some(_) => Err(RepositoryError::InvalidState(
                    "This question is already completed.".to_string(),
                )),
                None => Err(RepositoryError::NotFound(format!("Question {} not found", id))),
            },
        }
    }

    async fn counts(&self) -> RepoResult<QuestionCounts> {
        let (total, pending): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COUNT(*) FILTER (WHERE state = 'pending')
            FROM questions
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(QuestionCounts { total, pending })
    }
}
