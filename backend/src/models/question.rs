use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Question lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionState {
    Pending,
    Completed,
}

impl QuestionState {
    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(QuestionState::Pending),
            "completed" => Ok(QuestionState::Completed),
            _ => Err(format!("Invalid question state: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionState::Pending => "pending",
            QuestionState::Completed => "completed",
        }
    }
}

/// Declared or predicted answer to a yes/no question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Answer {
    Yes,
    No,
}

impl Answer {
    /// Parse a client-supplied answer, case-insensitively
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "yes" => Some(Answer::Yes),
            "no" => Some(Answer::No),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Answer::Yes => "yes",
            Answer::No => "no",
        }
    }
}

impl std::fmt::Display for Answer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A yes/no proposition users wager on
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub category_id: Uuid,
    pub question: String,
    pub min_bet: Decimal,
    pub max_bet: Decimal,
    pub starting: NaiveDateTime,
    pub ending: NaiveDateTime,
    pub state: String,          // Stored as TEXT, use QuestionState for type safety
    pub answer: Option<String>, // Set iff state = completed
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Fields supplied by an admin when creating a question
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewQuestion {
    pub category: Option<Uuid>,
    pub question: Option<String>,
    pub min_bet: Option<Decimal>,
    pub max_bet: Option<Decimal>,
    pub starting: Option<NaiveDateTime>,
    pub ending: Option<NaiveDateTime>,
}

/// Partial update; only supplied fields are applied
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPatch {
    pub category: Option<Uuid>,
    pub question: Option<String>,
    pub min_bet: Option<Decimal>,
    pub max_bet: Option<Decimal>,
    pub starting: Option<NaiveDateTime>,
    pub ending: Option<NaiveDateTime>,
}

/// Canonical stored form of question text
pub fn normalize_text(text: &str) -> String {
    text.trim().to_lowercase()
}

impl Question {
    /// Build a pending question from a complete, validated request
    pub fn new(owner_id: Uuid, input: NewQuestion) -> Result<Self, String> {
        let (category_id, text, min_bet, max_bet, starting, ending) = match input {
            NewQuestion {
                category: Some(category),
                question: Some(question),
                min_bet: Some(min_bet),
                max_bet: Some(max_bet),
                starting: Some(starting),
                ending: Some(ending),
            } if !question.trim().is_empty() => {
                (category, question, min_bet, max_bet, starting, ending)
            }
            _ => return Err("Please fill all fields.".to_string()),
        };

        let now = chrono::Utc::now().naive_utc();
        let question = Self {
            id: Uuid::new_v4(),
            owner_id,
            category_id,
            question: normalize_text(&text),
            min_bet,
            max_bet,
            starting,
            ending,
            state: QuestionState::Pending.as_str().to_string(),
            answer: None,
            created_at: now,
            updated_at: now,
        };
        question.validate()?;
        Ok(question)
    }

    /// Check the bet bounds and window ordering
    pub fn validate(&self) -> Result<(), String> {
        if self.min_bet <= Decimal::ZERO || self.max_bet <= Decimal::ZERO {
            return Err("Bet bounds must be greater than zero.".to_string());
        }
        if self.min_bet > self.max_bet {
            return Err("Min bet should be less than max bet.".to_string());
        }
        if self.starting > self.ending {
            return Err("Starting time should be before ending time.".to_string());
        }
        Ok(())
    }

    /// Apply the supplied fields and re-validate the merged record.
    /// Does not compare the window against the current time.
    pub fn apply_patch(&mut self, patch: QuestionPatch) -> Result<(), String> {
        if let Some(category) = patch.category {
            self.category_id = category;
        }
        if let Some(text) = patch.question.filter(|t| !t.trim().is_empty()) {
            self.question = normalize_text(&text);
        }
        if let Some(min_bet) = patch.min_bet {
            self.min_bet = min_bet;
        }
        if let Some(max_bet) = patch.max_bet {
            self.max_bet = max_bet;
        }
        if let Some(starting) = patch.starting {
            self.starting = starting;
        }
        if let Some(ending) = patch.ending {
            self.ending = ending;
        }
        self.updated_at = chrono::Utc::now().naive_utc();
        self.validate()
    }

    /// Get state as an enum
    pub fn state_enum(&self) -> QuestionState {
        QuestionState::from_str(&self.state).unwrap_or(QuestionState::Pending)
    }

    /// Get the declared answer, if any
    pub fn answer_enum(&self) -> Option<Answer> {
        self.answer.as_deref().and_then(Answer::parse)
    }

    pub fn is_pending(&self) -> bool {
        self.state_enum() == QuestionState::Pending
    }

    pub fn is_completed(&self) -> bool {
        self.state_enum() == QuestionState::Completed
    }

    /// Whether `amount` lies within [min_bet, max_bet]
    pub fn accepts_bet(&self, amount: Decimal) -> bool {
        amount >= self.min_bet && amount <= self.max_bet
    }

    /// Whether the betting window is open at `now`
    pub fn is_open_at(&self, now: NaiveDateTime) -> bool {
        now >= self.starting && now <= self.ending
    }

    /// Whether betting has started at `now`
    pub fn has_started(&self, now: NaiveDateTime) -> bool {
        now >= self.starting
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_question_input() -> NewQuestion {
        let now = chrono::Utc::now().naive_utc();
        NewQuestion {
            category: Some(Uuid::new_v4()),
            question: Some("  Will It Rain Tomorrow?  ".to_string()),
            min_bet: Some(Decimal::new(10, 0)),
            max_bet: Some(Decimal::new(100, 0)),
            starting: Some(now - Duration::hours(1)),
            ending: Some(now + Duration::hours(1)),
        }
    }

    #[test]
    fn test_new_question_is_pending_and_normalized() {
        let q = Question::new(Uuid::new_v4(), new_question_input()).unwrap();
        assert_eq!(q.question, "will it rain tomorrow?");
        assert!(q.is_pending());
        assert!(q.answer.is_none());
    }

    #[test]
    fn test_new_question_requires_all_fields() {
        let mut input = new_question_input();
        input.ending = None;
        assert_eq!(
            Question::new(Uuid::new_v4(), input).unwrap_err(),
            "Please fill all fields."
        );
    }

    #[test]
    fn test_min_bet_above_max_bet_rejected() {
        let mut input = new_question_input();
        input.min_bet = Some(Decimal::new(200, 0));
        assert!(Question::new(Uuid::new_v4(), input).is_err());
    }

    #[test]
    fn test_patch_revalidates_merged_bounds() {
        let mut q = Question::new(Uuid::new_v4(), new_question_input()).unwrap();
        let patch = QuestionPatch {
            max_bet: Some(Decimal::new(5, 0)),
            ..Default::default()
        };
        assert!(q.apply_patch(patch).is_err());
    }

    #[test]
    fn test_patch_allows_stale_window() {
        let mut q = Question::new(Uuid::new_v4(), new_question_input()).unwrap();
        let past = chrono::Utc::now().naive_utc() - Duration::days(10);
        let patch = QuestionPatch {
            starting: Some(past),
            ending: Some(past + Duration::hours(1)),
            ..Default::default()
        };
        assert!(q.apply_patch(patch).is_ok());
        assert!(!q.is_open_at(chrono::Utc::now().naive_utc()));
    }

    #[test]
    fn test_answer_parse() {
        assert_eq!(Answer::parse("YES"), Some(Answer::Yes));
        assert_eq!(Answer::parse(" no "), Some(Answer::No));
        assert_eq!(Answer::parse("maybe"), None);
    }

    #[test]
    fn test_bet_bounds_inclusive() {
        let q = Question::new(Uuid::new_v4(), new_question_input()).unwrap();
        assert!(q.accepts_bet(Decimal::new(10, 0)));
        assert!(q.accepts_bet(Decimal::new(100, 0)));
        assert!(!q.accepts_bet(Decimal::new(101, 0)));
        assert!(!q.accepts_bet(Decimal::new(9, 0)));
    }
}
