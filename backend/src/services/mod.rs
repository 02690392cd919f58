pub mod audit;
pub mod balance_guard;
pub mod dashboard;
pub mod payment;
pub mod question_service;
pub mod settlement;
pub mod wager_service;
pub mod wallet_service;

pub use audit::AuditTrailService;
pub use balance_guard::{AppliedDelta, BalanceGuard, LedgerAudit};
pub use dashboard::{AdminDashboard, DashboardService, UserDashboard};
pub use payment::{PaymentProvider, PaymentVerifier, ProviderOrder, RazorpayClient};
pub use question_service::QuestionService;
pub use settlement::{SettlementEngine, SettlementReport};
pub use wager_service::{PlaceEntryRequest, PlacedEntry, WagerService};
pub use wallet_service::{DepositVerification, Wallet, WalletService};
