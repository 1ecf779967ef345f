//! Runtime configuration read from the environment (and `.env`).

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::PricingPolicy;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing environment variable '{0}'")]
    Missing(&'static str),
    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct RazorpayConfig {
    pub key_id: String,
    pub key_secret: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct EmailApiConfig {
    pub url: String,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub razorpay: Option<RazorpayConfig>,
    /// Secret used to check payment signatures. Falls back to a fixed
    /// sandbox value when no gateway is configured.
    pub payment_secret: String,
    pub currency: String,
    pub pricing: PricingPolicy,
    pub invoice_dir: PathBuf,
    pub pdf_renderer_url: Option<String>,
    pub email_api: Option<EmailApiConfig>,
    pub mail_from: String,
    /// Shop name used in customer emails.
    pub store_name: String,
    pub template_dir: Option<PathBuf>,
    pub nats_url: Option<String>,
    pub http_timeout: Duration,
    pub otp_ttl_minutes: i64,
}

pub const SANDBOX_PAYMENT_SECRET: &str = "sandbox_secret";

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let config = Self::from_lookup(|name| std::env::var(name).ok())?;
        tracing::info!(
            port = config.port,
            persistent = config.database_url.is_some(),
            gateway = config.razorpay.is_some(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| get(name).filter(|v| !v.trim().is_empty());

        fn parse<T: FromStr>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
            match raw {
                Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid { name, value }),
                None => Ok(default),
            }
        }

        let jwt_secret = get("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let razorpay = match (get("RAZORPAY_KEY_ID"), get("RAZORPAY_KEY_SECRET")) {
            (Some(key_id), Some(key_secret)) => Some(RazorpayConfig {
                key_id,
                key_secret,
                base_url: get("RAZORPAY_BASE_URL").unwrap_or_else(|| "https://api.razorpay.com".to_string()),
            }),
            _ => None,
        };
        let payment_secret = razorpay
            .as_ref()
            .map(|r| r.key_secret.clone())
            .unwrap_or_else(|| SANDBOX_PAYMENT_SECRET.to_string());

        let email_api = match (get("EMAIL_API_URL"), get("EMAIL_API_KEY")) {
            (Some(url), Some(api_key)) => Some(EmailApiConfig { url, api_key }),
            _ => None,
        };

        let tax_percent: Decimal = parse("TAX_PERCENT", get("TAX_PERCENT"), Decimal::ZERO)?;
        if tax_percent < Decimal::ZERO {
            return Err(ConfigError::Invalid { name: "TAX_PERCENT", value: tax_percent.to_string() });
        }

        Ok(Self {
            port: parse("PORT", get("PORT"), 8083)?,
            database_url: get("DATABASE_URL"),
            jwt_secret,
            jwt_ttl_hours: parse("JWT_TTL_HOURS", get("JWT_TTL_HOURS"), 24)?,
            razorpay,
            payment_secret,
            currency: get("CURRENCY").unwrap_or_else(|| "INR".to_string()),
            pricing: PricingPolicy {
                tax_percent,
                apply_line_discounts: parse("APPLY_LINE_DISCOUNTS", get("APPLY_LINE_DISCOUNTS"), true)?,
            },
            invoice_dir: get("INVOICE_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("./invoices")),
            pdf_renderer_url: get("PDF_RENDERER_URL"),
            email_api,
            mail_from: get("MAIL_FROM").unwrap_or_else(|| "no-reply@storefront.local".to_string()),
            store_name: get("STORE_NAME").unwrap_or_else(|| "Storefront".to_string()),
            template_dir: get("TEMPLATE_DIR").map(PathBuf::from),
            nats_url: get("NATS_URL"),
            http_timeout: Duration::from_secs(parse("HTTP_TIMEOUT_SECS", get("HTTP_TIMEOUT_SECS"), 15)?),
            otp_ttl_minutes: parse("OTP_TTL_MINUTES", get("OTP_TTL_MINUTES"), 10)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults_apply() {
        let config = load(&[("JWT_SECRET", "s3cret")]).unwrap();
        assert_eq!(config.port, 8083);
        assert!(config.database_url.is_none());
        assert!(config.razorpay.is_none());
        assert_eq!(config.payment_secret, SANDBOX_PAYMENT_SECRET);
        assert_eq!(config.currency, "INR");
        assert_eq!(config.pricing, PricingPolicy::default());
        assert_eq!(config.http_timeout, Duration::from_secs(15));
        assert_eq!(config.otp_ttl_minutes, 10);
    }

    #[test]
    fn jwt_secret_is_required() {
        assert!(matches!(load(&[]), Err(ConfigError::Missing("JWT_SECRET"))));
    }

    #[test]
    fn gateway_needs_both_keys() {
        let config = load(&[("JWT_SECRET", "s"), ("RAZORPAY_KEY_ID", "rzp_test")]).unwrap();
        assert!(config.razorpay.is_none());

        let config =
            load(&[("JWT_SECRET", "s"), ("RAZORPAY_KEY_ID", "rzp_test"), ("RAZORPAY_KEY_SECRET", "k")]).unwrap();
        assert_eq!(config.payment_secret, "k");
    }

    #[test]
    fn bad_numbers_are_rejected() {
        let err = load(&[("JWT_SECRET", "s"), ("PORT", "eighty")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "PORT", .. }));
        let err = load(&[("JWT_SECRET", "s"), ("TAX_PERCENT", "-5")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "TAX_PERCENT", .. }));
    }

    #[test]
    fn pricing_from_env() {
        let config =
            load(&[("JWT_SECRET", "s"), ("TAX_PERCENT", "18"), ("APPLY_LINE_DISCOUNTS", "false")]).unwrap();
        assert_eq!(config.pricing.tax_percent, Decimal::from(18));
        assert!(!config.pricing.apply_line_discounts);
    }
}
