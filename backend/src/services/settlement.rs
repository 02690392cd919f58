//! Settlement Engine.
//!
//! `declare_result` flips a question pending -> completed (atomically, so a
//! second caller gets `InvalidState`), then settles every entry as an
//! independent task. Each task is fenced on the entry's own `result` column:
//! a winning entry's mark + ledger append + credit commit together, and a
//! task re-run against an already-settled entry is a no-op. Entries left
//! pending by a failed task are finished later by `reconcile`.

use crate::error::{AppError, AppResult};
use crate::models::{payout_for, Answer, Entry, Question};
use crate::repositories::{EntryRepository, QuestionRepository};
use crate::services::{AuditTrailService, BalanceGuard};
use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const NO_ENTRIES_MESSAGE: &str = "No entries found for this question.";
pub const NO_WINNERS_MESSAGE: &str = "No winning entries. Nothing to distribute.";
pub const DISTRIBUTED_MESSAGE: &str = "Result declared and funds distributed successfully.";
pub const NOTHING_TO_RECONCILE_MESSAGE: &str = "All entries are already settled.";

/// Outcome of settling one entry
#[derive(Debug, Clone, PartialEq)]
enum EntryOutcome {
    Won { entry_id: Uuid, payout: Decimal },
    Lost(Uuid),
    AlreadySettled(Uuid),
    Failed(Uuid),
}

/// Summary of one settlement or reconciliation pass
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementReport {
    pub question_id: Uuid,
    pub answer: Answer,
    pub winners: Vec<Uuid>,
    pub losers: Vec<Uuid>,
    pub already_settled: Vec<Uuid>,
    /// Entries still pending after this pass; retry with `reconcile`
    pub failed: Vec<Uuid>,
    pub total_paid: Decimal,
    pub funds_distributed: bool,
    pub message: String,
}

impl SettlementReport {
    fn new(question_id: Uuid, answer: Answer) -> Self {
        Self {
            question_id,
            answer,
            winners: Vec::new(),
            losers: Vec::new(),
            already_settled: Vec::new(),
            failed: Vec::new(),
            total_paid: Decimal::ZERO,
            funds_distributed: false,
            message: String::new(),
        }
    }

    fn record(&mut self, outcome: EntryOutcome) {
        match outcome {
            EntryOutcome::Won { entry_id, payout } => {
                self.winners.push(entry_id);
                self.total_paid += payout;
            }
            EntryOutcome::Lost(id) => self.losers.push(id),
            EntryOutcome::AlreadySettled(id) => self.already_settled.push(id),
            EntryOutcome::Failed(id) => self.failed.push(id),
        }
    }

    /// Whether every entry of the question now carries a final result
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct SettlementEngine {
    questions: Arc<dyn QuestionRepository>,
    entries: Arc<dyn EntryRepository>,
    guard: Arc<BalanceGuard>,
    audit: Arc<AuditTrailService>,
    concurrency: usize,
}

impl SettlementEngine {
    pub fn new(
        questions: Arc<dyn QuestionRepository>,
        entries: Arc<dyn EntryRepository>,
        guard: Arc<BalanceGuard>,
        audit: Arc<AuditTrailService>,
        concurrency: usize,
    ) -> Self {
        Self {
            questions,
            entries,
            guard,
            audit,
            concurrency: concurrency.max(1),
        }
    }

    /// Declare the answer of a pending question and settle its entries
    pub async fn declare_result(
        &self,
        question_id: Uuid,
        answer: &str,
        admin_id: Option<Uuid>,
    ) -> AppResult<SettlementReport> {
        let answer = Answer::parse(answer)
            .ok_or_else(|| AppError::Validation("Answer must be yes or no.".to_string()))?;

        info!("Declaring result '{}' for question {}", answer, question_id);

        // NotFound / InvalidState come straight from the conditional transition
        let question = self.questions.mark_completed(question_id, answer).await?;
        self.audit
            .log_result_declared(question.id, answer, admin_id)
            .await;

        let report = self.settle_entries(&question, answer).await?;
        self.audit
            .log_settlement(question.id, "question_settled", report_details(&report))
            .await;

        Ok(report)
    }

    /// Finish a partial fan-out: settle entries of a completed question that
    /// are still pending. Safe to run any number of times.
    pub async fn reconcile(&self, question_id: Uuid) -> AppResult<SettlementReport> {
        let question = self
            .questions
            .find_by_id(question_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Question {} not found", question_id)))?;

        if !question.is_completed() {
            return Err(AppError::InvalidState(
                "This question has no declared result yet.".to_string(),
            ));
        }
        let answer = question.answer_enum().ok_or_else(|| {
            AppError::InvalidState(format!("Question {} has no recognized answer", question_id))
        })?;

        info!("Reconciling settlement of question {}", question_id);

        let report = self.settle_entries(&question, answer).await?;
        self.audit
            .log_settlement(question.id, "question_reconciled", report_details(&report))
            .await;

        Ok(report)
    }

    async fn settle_entries(&self, question: &Question, answer: Answer) -> AppResult<SettlementReport> {
        let mut report = SettlementReport::new(question.id, answer);

        let pending = self.entries.find_unsettled_by_question(question.id).await?;
        if pending.is_empty() {
            let any = !self.entries.find_by_question(question.id).await?.is_empty();
            report.message = if any {
                NOTHING_TO_RECONCILE_MESSAGE.to_string()
            } else {
                NO_ENTRIES_MESSAGE.to_string()
            };
            info!("Question {}: {}", question.id, report.message);
            return Ok(report);
        }

        let outcomes: Vec<EntryOutcome> = stream::iter(pending)
            .map(|entry| self.settle_entry(question.id, answer, entry))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for outcome in outcomes {
            report.record(outcome);
        }

        report.funds_distributed = !report.winners.is_empty();
        report.message = if !report.failed.is_empty() {
            format!(
                "Result declared; {} entries could not be settled and remain pending for reconciliation.",
                report.failed.len()
            )
        } else if report.winners.is_empty() {
            NO_WINNERS_MESSAGE.to_string()
        } else {
            DISTRIBUTED_MESSAGE.to_string()
        };

        info!(
            "Question {} settled: {} won, {} lost, {} already settled, {} failed, {} paid",
            question.id,
            report.winners.len(),
            report.losers.len(),
            report.already_settled.len(),
            report.failed.len(),
            report.total_paid
        );
        Ok(report)
    }

    async fn settle_entry(
        &self,
        question_id: Uuid,
        answer: Answer,
        entry: Entry,
    ) -> EntryOutcome {
        if !entry.wins_against(answer) {
            return match self.entries.settle_loss(entry.id).await {
                Ok(true) => EntryOutcome::Lost(entry.id),
                Ok(false) => EntryOutcome::AlreadySettled(entry.id),
                Err(e) => {
                    error!("Failed to settle losing entry {}: {}", entry.id, e);
                    EntryOutcome::Failed(entry.id)
                }
            };
        }

        let payout = payout_for(entry.bet);
        let posting = BalanceGuard::win_posting(entry.user_id, question_id, entry.id, payout);

        match self.entries.settle_win(entry.id, payout, posting).await {
            Ok(Some(transaction)) => {
                self.guard.record(&transaction).await;
                EntryOutcome::Won {
                    entry_id: entry.id,
                    payout,
                }
            }
            Ok(None) => {
                warn!("Entry {} was already settled", entry.id);
                EntryOutcome::AlreadySettled(entry.id)
            }
            Err(e) => {
                error!("Failed to settle winning entry {}: {}", entry.id, e);
                EntryOutcome::Failed(entry.id)
            }
        }
    }
}

fn report_details(report: &SettlementReport) -> serde_json::Value {
    serde_json::json!({
        "answer": report.answer.as_str(),
        "winners": report.winners.len(),
        "losers": report.losers.len(),
        "already_settled": report.already_settled.len(),
        "failed": report.failed.iter().map(Uuid::to_string).collect::<Vec<_>>(),
        "total_paid": report.total_paid.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_totals_only_count_winners() {
        let mut report = SettlementReport::new(Uuid::new_v4(), Answer::Yes);
        report.record(EntryOutcome::Won {
            entry_id: Uuid::new_v4(),
            payout: Decimal::new(45, 0),
        });
        report.record(EntryOutcome::Won {
            entry_id: Uuid::new_v4(),
            payout: Decimal::new(15, 0),
        });
        report.record(EntryOutcome::Lost(Uuid::new_v4()));
        report.record(EntryOutcome::AlreadySettled(Uuid::new_v4()));

        assert_eq!(report.winners.len(), 2);
        assert_eq!(report.total_paid, Decimal::new(60, 0));
        assert!(report.is_complete());

        report.record(EntryOutcome::Failed(Uuid::new_v4()));
        assert!(!report.is_complete());
    }
}
