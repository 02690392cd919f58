use crate::error::{AppError, AppResult};
use crate::models::{NewQuestion, Question, QuestionPatch};
use crate::repositories::{QuestionCounts, QuestionRepository};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Question lifecycle: creation, edits and deletion while pending
pub struct QuestionService {
    questions: Arc<dyn QuestionRepository>,
}

impl QuestionService {
    pub fn new(questions: Arc<dyn QuestionRepository>) -> Self {
        Self { questions }
    }

    /// Create a pending question owned by `owner_id`
    pub async fn create(&self, owner_id: Uuid, input: NewQuestion) -> AppResult<Question> {
        let question = Question::new(owner_id, input).map_err(AppError::Validation)?;
        let created = self.questions.insert(&question).await?;

        info!("Question {} created by {}", created.id, owner_id);
        Ok(created)
    }

    /// Apply the supplied fields to a pending question
    pub async fn update(&self, id: Uuid, patch: QuestionPatch) -> AppResult<Question> {
        let updated = self.questions.update(id, patch).await?;

        info!("Question {} updated", id);
        Ok(updated)
    }

    /// Delete a pending question before its betting window opens
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        let now = chrono::Utc::now().naive_utc();
        self.questions.delete(id, now).await?;

        info!("Question {} deleted", id);
        Ok(())
    }

    /// Pending questions, the public wagering surface
    pub async fn list_open(&self) -> AppResult<Vec<Question>> {
        Ok(self.questions.find_pending().await?)
    }

    /// A pending question; completed ones are not publicly visible
    pub async fn get_open(&self, id: Uuid) -> AppResult<Question> {
        self.questions
            .find_by_id(id)
            .await?
            .filter(Question::is_pending)
            .ok_or_else(|| AppError::NotFound(format!("Question {} not found", id)))
    }

    pub async fn list_all(&self) -> AppResult<Vec<Question>> {
        Ok(self.questions.find_all().await?)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Question> {
        self.questions
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Question {} not found", id)))
    }

    pub async fn counts(&self) -> AppResult<QuestionCounts> {
        Ok(self.questions.counts().await?)
    }
}
