//! Server Configuration
//!
//! Read once from the environment (after `.env` is loaded) and injected.

use std::env;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("{set} is set but {missing} is not")]
    Incomplete {
        set: &'static str,
        missing: &'static str,
    },
}

/// Stripe credentials
#[derive(Clone, Debug)]
pub struct StripeConfig {
    pub secret_key: String,
    pub webhook_secret: String,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_addr: String,

    /// Storefront origin used for checkout redirects
    pub client_url: String,

    /// ISO currency code for line items
    pub currency: String,

    /// MongoDB connection string; in-memory stores when absent
    pub database_url: Option<String>,
    pub database_name: String,

    /// Payments are disabled when absent
    pub stripe: Option<StripeConfig>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let client_url = get("CLIENT_URL").unwrap_or_else(|| "http://localhost:5173".into());
        let client_url = client_url.trim_end_matches('/').to_string();
        if client_url.is_empty() {
            return Err(ConfigError::Empty("CLIENT_URL"));
        }

        let stripe = match (get("STRIPE_SECRET_KEY"), get("STRIPE_WEBHOOK_SECRET")) {
            (Some(secret_key), Some(webhook_secret)) => Some(StripeConfig {
                secret_key,
                webhook_secret,
            }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(ConfigError::Incomplete {
                    set: "STRIPE_SECRET_KEY",
                    missing: "STRIPE_WEBHOOK_SECRET",
                });
            }
            (None, Some(_)) => {
                return Err(ConfigError::Incomplete {
                    set: "STRIPE_WEBHOOK_SECRET",
                    missing: "STRIPE_SECRET_KEY",
                });
            }
        };

        Ok(Self {
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:5000".into()),
            client_url,
            currency: get("CURRENCY").unwrap_or_else(|| "usd".into()),
            database_url: get("DATABASE_URL"),
            database_name: get("DATABASE_NAME").unwrap_or_else(|| "shop".into()),
            stripe,
        })
    }

    /// Stripe substitutes the session id into `{CHECKOUT_SESSION_ID}`
    pub fn success_url(&self) -> String {
        format!(
            "{}/purchase-success?session_id={{CHECKOUT_SESSION_ID}}",
            self.client_url
        )
    }

    pub fn cancel_url(&self) -> String {
        format!("{}/cart", self.client_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:5000");
        assert_eq!(config.currency, "usd");
        assert_eq!(config.database_name, "shop");
        assert!(config.database_url.is_none());
        assert!(config.stripe.is_none());
        assert_eq!(
            config.success_url(),
            "http://localhost:5173/purchase-success?session_id={CHECKOUT_SESSION_ID}"
        );
        assert_eq!(config.cancel_url(), "http://localhost:5173/cart");
    }

    #[test]
    fn test_stripe_requires_both_secrets() {
        let both = config(&[("STRIPE_SECRET_KEY", "sk"), ("STRIPE_WEBHOOK_SECRET", "wh")]).unwrap();
        assert_eq!(both.stripe.unwrap().webhook_secret, "wh");

        assert!(matches!(
            config(&[("STRIPE_SECRET_KEY", "sk")]),
            Err(ConfigError::Incomplete { missing: "STRIPE_WEBHOOK_SECRET", .. })
        ));
    }

    #[test]
    fn test_client_url_trailing_slash() {
        let config = config(&[("CLIENT_URL", "https://shop.example/")]).unwrap();
        assert_eq!(config.cancel_url(), "https://shop.example/cart");
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let config = config(&[("DATABASE_URL", "  "), ("BIND_ADDR", "")]).unwrap();
        assert!(config.database_url.is_none());
        assert_eq!(config.bind_addr, "0.0.0.0:5000");
    }
}
