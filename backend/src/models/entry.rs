use super::question::Answer;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Flat reward for a winning entry, in tenths (1.5x the stake)
pub const PAYOUT_MULTIPLIER_TENTHS: i64 = 15;

/// Payout owed to a winning entry of `bet`
pub fn payout_for(bet: Decimal) -> Decimal {
    bet * Decimal::new(PAYOUT_MULTIPLIER_TENTHS, 1)
}

/// Settlement result of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryResult {
    Pending,
    Success,
    Failed,
}

impl EntryResult {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(EntryResult::Pending),
            "success" => Ok(EntryResult::Success),
            "failed" => Ok(EntryResult::Failed),
            _ => Err(format!("Invalid entry result: {}", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntryResult::Pending => "pending",
            EntryResult::Success => "success",
            EntryResult::Failed => "failed",
        }
    }
}

/// One user's wager on one question
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub question_id: Uuid,
    pub bet: Decimal,
    pub answer: String, // predicted answer as submitted
    pub result: String, // Stored as TEXT, use EntryResult for type safety
    pub win: Decimal,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Entry {
    /// Create a new pending entry
    pub fn new(user_id: Uuid, question_id: Uuid, bet: Decimal, answer: Answer) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id: Uuid::new_v4(),
            user_id,
            question_id,
            bet,
            answer: answer.as_str().to_string(),
            result: EntryResult::Pending.as_str().to_string(),
            win: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn result_enum(&self) -> EntryResult {
        EntryResult::from_str(&self.result).unwrap_or(EntryResult::Pending)
    }

    pub fn is_settled(&self) -> bool {
        self.result_enum() != EntryResult::Pending
    }

    /// Predicted answer, or `None` if the stored value is not a recognized answer
    pub fn predicted(&self) -> Option<Answer> {
        Answer::parse(&self.answer)
    }

    /// An entry wins only when its prediction is a recognized answer equal to `declared`
    pub fn wins_against(&self, declared: Answer) -> bool {
        self.predicted() == Some(declared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payout_is_one_and_a_half_times_bet() {
        assert_eq!(payout_for(Decimal::new(30, 0)), Decimal::new(45, 0));
        assert_eq!(payout_for(Decimal::new(15, 1)), Decimal::new(225, 2));
    }

    #[test]
    fn test_new_entry_is_pending_with_zero_win() {
        let entry = Entry::new(Uuid::new_v4(), Uuid::new_v4(), Decimal::new(30, 0), Answer::Yes);
        assert_eq!(entry.result_enum(), EntryResult::Pending);
        assert_eq!(entry.win, Decimal::ZERO);
        assert!(!entry.is_settled());
    }

    #[test]
    fn test_unrecognized_prediction_never_wins() {
        let mut entry = Entry::new(Uuid::new_v4(), Uuid::new_v4(), Decimal::ONE, Answer::Yes);
        entry.answer = "perhaps".to_string();
        assert!(!entry.wins_against(Answer::Yes));
        assert!(!entry.wins_against(Answer::No));
    }

    #[test]
    fn test_classification_matches_declared_answer() {
        let entry = Entry::new(Uuid::new_v4(), Uuid::new_v4(), Decimal::ONE, Answer::No);
        assert!(entry.wins_against(Answer::No));
        assert!(!entry.wins_against(Answer::Yes));
    }
}
