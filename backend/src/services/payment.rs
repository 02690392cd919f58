//! Payment provider boundary: deposit orders and callback verification

use crate::config::PaymentConfig;
use crate::error::{AppError, AppResult};
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{debug, info, warn};

type HmacSha256 = Hmac<Sha256>;

/// Currency every order is created in
pub const CURRENCY: &str = "INR";

/// Order handle returned by the provider, handed back to the client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderOrder {
    pub id: String,
    /// Amount in the smallest currency unit (paise)
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub receipt: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// External payment provider
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_order(&self, amount: Decimal, receipt: &str) -> AppResult<ProviderOrder>;

    /// Look up an order created earlier; the source of truth for its amount
    async fn fetch_order(&self, order_id: &str) -> AppResult<ProviderOrder>;
}

/// Convert a rupee amount into paise
pub fn to_minor_units(amount: Decimal) -> AppResult<i64> {
    amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|minor| minor.round().to_i64())
        .ok_or_else(|| AppError::Validation(format!("Amount {} is out of range.", amount)))
}

/// Convert paise back into rupees
pub fn from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, 2).normalize()
}

/// Verifies provider callback signatures with the shared key secret
pub struct PaymentVerifier {
    secret: String,
}

impl PaymentVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Hex HMAC-SHA256 of `"<order_id>|<payment_id>"`
    pub fn sign(&self, order_id: &str, payment_id: &str) -> AppResult<String> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| AppError::Message(format!("HMAC key error: {}", e)))?;
        mac.update(format!("{}|{}", order_id, payment_id).as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// `Security` error unless `signature` is exactly the expected digest.
    /// An empty secret verifies nothing.
    pub fn verify(&self, order_id: &str, payment_id: &str, signature: &str) -> AppResult<()> {
        if self.secret.is_empty() {
            warn!("Payment secret is not configured; rejecting order {}", order_id);
            return Err(AppError::Security("Transaction not legit!".to_string()));
        }

        let expected = self.sign(order_id, payment_id)?;
        if expected != signature {
            debug!("Signature mismatch for order {}", order_id);
            return Err(AppError::Security("Transaction not legit!".to_string()));
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct CreateOrderRequest<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
}

/// Razorpay Orders API client
pub struct RazorpayClient {
    http: reqwest::Client,
    config: PaymentConfig,
}

impl RazorpayClient {
    pub fn new(config: PaymentConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    async fn post_order(&self, amount: i64, receipt: &str) -> anyhow::Result<ProviderOrder> {
        let url = format!("{}/orders", self.config.api_base.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .json(&CreateOrderRequest {
                amount,
                currency: CURRENCY,
                receipt,
            })
            .send()
            .await
            .context("Failed to reach payment provider")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Payment provider returned {}: {}", status, body));
        }

        response
            .json::<ProviderOrder>()
            .await
            .context("Failed to parse payment provider order")
    }

    async fn get_order(&self, order_id: &str) -> anyhow::Result<ProviderOrder> {
        let url = format!(
            "{}/orders/{}",
            self.config.api_base.trim_end_matches('/'),
            order_id
        );
        let response = self
            .http
            .get(&url)
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .send()
            .await
            .context("Failed to reach payment provider")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Payment provider returned {}: {}", status, body));
        }

        response
            .json::<ProviderOrder>()
            .await
            .context("Failed to parse payment provider order")
    }
}

#[async_trait]
impl PaymentProvider for RazorpayClient {
    async fn create_order(&self, amount: Decimal, receipt: &str) -> AppResult<ProviderOrder> {
        let minor = to_minor_units(amount)?;
        let order = self
            .post_order(minor, receipt)
            .await
            .map_err(|e| AppError::ExternalService(format!("{:#}", e)))?;

        info!("Created provider order {} for {} paise", order.id, order.amount);
        Ok(order)
    }

    async fn fetch_order(&self, order_id: &str) -> AppResult<ProviderOrder> {
        self.get_order(order_id)
            .await
            .map_err(|e| AppError::ExternalService(format!("{:#}", e)))
    }
}
