//! Domain models for the YesNo backend.
//!
//! Database-backed records for questions, entries, ledger transactions and
//! user accounts. Enumerated columns are stored as TEXT; each model exposes
//! typed accessors for them.

pub mod entry;
pub mod question;
pub mod transaction;
pub mod user;

pub use entry::{payout_for, Entry, EntryResult, PAYOUT_MULTIPLIER_TENTHS};
pub use question::{normalize_text, Answer, NewQuestion, Question, QuestionPatch, QuestionState};
pub use transaction::{
    ledger_sum, LedgerPosting, PaymentReference, Transaction, TransactionCategory,
};
pub use user::{Role, User, UserStatus};
