//! Payment gateway: order creation and checkout signature verification.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::config::RazorpayConfig;

type HmacSha256 = Hmac<Sha256>;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("gateway request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("gateway rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("amount must be greater than zero")]
    ZeroAmount,
    #[error("invalid signing key")]
    InvalidKey,
}

/// Order as opened on the provider side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub receipt: Option<String>,
    #[serde(default)]
    pub status: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Opens a provider order for `amount` minor units.
    async fn create_order(&self, amount: i64, currency: &str, receipt: &str) -> Result<GatewayOrder, GatewayError>;
}

/// Razorpay-compatible REST client.
pub struct RazorpayClient {
    http: reqwest::Client,
    config: RazorpayConfig,
}

impl RazorpayClient {
    pub fn new(http: reqwest::Client, config: RazorpayConfig) -> Self {
        Self { http, config }
    }
}

#[derive(Serialize)]
struct CreateOrderBody<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
    #[instrument(skip(self), fields(gateway = "razorpay"))]
    async fn create_order(&self, amount: i64, currency: &str, receipt: &str) -> Result<GatewayOrder, GatewayError> {
        if amount <= 0 {
            return Err(GatewayError::ZeroAmount);
        }
        let url = format!("{}/v1/orders", self.config.base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(url)
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .json(&CreateOrderBody { amount, currency, receipt })
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected { status: status.as_u16(), body });
        }
        let order: GatewayOrder = response.json().await?;
        info!(gateway_order_id = %order.id, "gateway order created");
        Ok(order)
    }
}

/// Local stand-in used when no gateway credentials are configured.
#[derive(Default)]
pub struct SandboxGateway;

#[async_trait]
impl PaymentGateway for SandboxGateway {
    #[instrument(skip(self), fields(gateway = "sandbox"))]
    async fn create_order(&self, amount: i64, currency: &str, receipt: &str) -> Result<GatewayOrder, GatewayError> {
        if amount <= 0 {
            return Err(GatewayError::ZeroAmount);
        }
        let id = format!("order_sandbox_{}", Uuid::new_v4().simple());
        info!(gateway_order_id = %id, "sandbox gateway order created");
        Ok(GatewayOrder {
            id,
            amount,
            currency: currency.to_string(),
            receipt: Some(receipt.to_string()),
            status: "created".to_string(),
        })
    }
}

/// Checks `HMAC_SHA256(secret, order_id + "|" + payment_id)` signatures.
#[derive(Clone)]
pub struct SignatureVerifier {
    keyed: HmacSha256,
}

impl SignatureVerifier {
    pub fn new(secret: &str) -> Result<Self, GatewayError> {
        let keyed = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| GatewayError::InvalidKey)?;
        Ok(Self { keyed })
    }

    fn mac(&self, order_id: &str, payment_id: &str) -> HmacSha256 {
        let mut mac = self.keyed.clone();
        mac.update(order_id.as_bytes());
        mac.update(b"|");
        mac.update(payment_id.as_bytes());
        mac
    }

    /// Lower-case hex signature, as the gateway sends it.
    pub fn sign(&self, order_id: &str, payment_id: &str) -> String {
        hex::encode(self.mac(order_id, payment_id).finalize().into_bytes())
    }

    /// Constant-time comparison against a hex signature.
    pub fn verify(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        let Ok(expected) = hex::decode(signature.trim()) else {
            return false;
        };
        self.mac(order_id, payment_id).verify_slice(&expected).is_ok()
    }
}
