use crate::error::{AppError, AppResult};
use crate::models::{Answer, Entry, Transaction};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

/// Audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub timestamp: i64,
    pub event_type: String, // "entry_placed", "result_declared", "balance_delta", etc.
    pub question_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub details: serde_json::Value,
}

/// Append-only JSON-lines trail of every money-moving action
pub struct AuditTrailService {
    log_file: Option<PathBuf>,
    file_handle: Option<Mutex<std::fs::File>>,
}

impl AuditTrailService {
    /// Open (or create) today's audit file under `log_directory`
    pub fn new(log_directory: &Path) -> AppResult<Self> {
        std::fs::create_dir_all(log_directory)
            .map_err(|e| AppError::Message(format!("Failed to create log directory: {}", e)))?;

        let date = chrono::Utc::now().format("%Y-%m-%d");
        let log_file = log_directory.join(format!("audit_{}.log", date));

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .map_err(|e| AppError::Message(format!("Failed to open audit log file: {}", e)))?;

        info!("Audit trail initialized: {:?}", log_file);

        Ok(Self {
            log_file: Some(log_file),
            file_handle: Some(Mutex::new(file)),
        })
    }

    /// A trail that drops every entry
    pub fn disabled() -> Self {
        Self {
            log_file: None,
            file_handle: None,
        }
    }

    pub fn log_file(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }

    /// Log an audit entry
    pub async fn log(&self, entry: AuditLogEntry) -> AppResult<()> {
        let Some(handle) = &self.file_handle else {
            return Ok(());
        };

        let json = serde_json::to_string(&entry)?;

        let mut file = handle.lock().await;
        writeln!(file, "{}", json)
            .map_err(|e| AppError::Message(format!("Failed to write audit log: {}", e)))?;
        file.flush()
            .map_err(|e| AppError::Message(format!("Failed to flush audit log: {}", e)))?;

        Ok(())
    }

    /// Audit writes never fail the operation they describe
    async fn record(&self, entry: AuditLogEntry) {
        let event_type = entry.event_type.clone();
        if let Err(e) = self.log(entry).await {
            warn!("Failed to record {} audit entry: {}", event_type, e);
        }
    }

    /// Log entry placement
    pub async fn log_entry_placed(&self, entry: &Entry) {
        self.record(AuditLogEntry {
            timestamp: chrono::Utc::now().timestamp(),
            event_type: "entry_placed".to_string(),
            question_id: Some(entry.question_id),
            user_id: Some(entry.user_id),
            details: serde_json::json!({
                "entry_id": entry.id.to_string(),
                "bet": entry.bet.to_string(),
                "answer": entry.answer,
            }),
        })
        .await
    }

    /// Log a result declaration
    pub async fn log_result_declared(&self, question_id: Uuid, answer: Answer, admin_id: Option<Uuid>) {
        self.record(AuditLogEntry {
            timestamp: chrono::Utc::now().timestamp(),
            event_type: "result_declared".to_string(),
            question_id: Some(question_id),
            user_id: admin_id,
            details: serde_json::json!({ "answer": answer.as_str() }),
        })
        .await
    }

    /// Log the outcome of a settlement or reconciliation pass
    pub async fn log_settlement(
        &self,
        question_id: Uuid,
        event_type: &str,
        details: serde_json::Value,
    ) {
        self.record(AuditLogEntry {
            timestamp: chrono::Utc::now().timestamp(),
            event_type: event_type.to_string(),
            question_id: Some(question_id),
            user_id: None,
            details,
        })
        .await
    }

    /// Log an applied balance delta
    pub async fn log_balance_delta(&self, tx: &Transaction) {
        self.record(AuditLogEntry {
            timestamp: chrono::Utc::now().timestamp(),
            event_type: "balance_delta".to_string(),
            question_id: tx.question_id,
            user_id: Some(tx.user_id),
            details: serde_json::json!({
                "transaction_id": tx.id.to_string(),
                "category": tx.category,
                "amount": tx.amount.to_string(),
                "balance_after": tx.balance_after.to_string(),
                "entry_id": tx.entry_id.map(|id| id.to_string()),
            }),
        })
        .await
    }
}
