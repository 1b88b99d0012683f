//! Service configuration, read from the environment (and `.env` when present).

use anyhow::{bail, Context, Result};
use std::path::PathBuf;

use crate::domain::pricing::{ShippingPolicy, DEFAULT_CURRENCY, FLAT_SHIPPING_FEE, FREE_SHIPPING_THRESHOLD};

#[derive(Clone)]
pub struct Config {
    /// `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub port: u16,
    pub nats_url: Option<String>,
    pub jwt_secret: String,
    pub currency: String,
    pub free_shipping_threshold: i64,
    pub flat_shipping_fee: i64,
    pub stripe_secret_key: Option<String>,
    pub razorpay: Option<RazorpayKeys>,
    /// JSON catalog upserted into the store at startup.
    pub catalog_seed: Option<PathBuf>,
}

#[derive(Clone)]
pub struct RazorpayKeys {
    pub key_id: String,
    pub key_secret: String,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("database", &self.database_url.is_some())
            .field("port", &self.port)
            .field("nats_url", &self.nats_url)
            .field("currency", &self.currency)
            .field("free_shipping_threshold", &self.free_shipping_threshold)
            .field("flat_shipping_fee", &self.flat_shipping_fee)
            .field("stripe", &self.stripe_secret_key.is_some())
            .field("razorpay", &self.razorpay.as_ref().map(|k| &k.key_id))
            .field("catalog_seed", &self.catalog_seed)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let jwt_secret = get("JWT_SECRET").context("JWT_SECRET must be set")?;
        let port = match get("PORT") {
            Some(p) => p.parse().with_context(|| format!("PORT is not a port number: {p}"))?,
            None => 8083,
        };
        let free_shipping_threshold = amount(get("FREE_SHIPPING_THRESHOLD"), "FREE_SHIPPING_THRESHOLD", FREE_SHIPPING_THRESHOLD)?;
        let flat_shipping_fee = amount(get("FLAT_SHIPPING_FEE"), "FLAT_SHIPPING_FEE", FLAT_SHIPPING_FEE)?;

        let razorpay = match (get("RAZORPAY_KEY_ID"), get("RAZORPAY_KEY_SECRET")) {
            (Some(key_id), Some(key_secret)) => Some(RazorpayKeys { key_id, key_secret }),
            (None, None) => None,
            _ => bail!("RAZORPAY_KEY_ID and RAZORPAY_KEY_SECRET must be set together"),
        };

        Ok(Self {
            database_url: get("DATABASE_URL"),
            port,
            nats_url: get("NATS_URL"),
            jwt_secret,
            currency: get("STORE_CURRENCY").unwrap_or_else(|| DEFAULT_CURRENCY.to_string()).to_uppercase(),
            free_shipping_threshold,
            flat_shipping_fee,
            stripe_secret_key: get("STRIPE_SECRET_KEY"),
            razorpay,
            catalog_seed: get("CATALOG_SEED").map(PathBuf::from),
        })
    }

    pub fn shipping_policy(&self) -> ShippingPolicy {
        ShippingPolicy { free_threshold: self.free_shipping_threshold, flat_fee: self.flat_shipping_fee }
    }
}

fn amount(value: Option<String>, key: &str, default: i64) -> Result<i64> {
    let Some(raw) = value else { return Ok(default) };
    let n: i64 = raw.parse().with_context(|| format!("{key} must be an integer amount in minor units"))?;
    if n < 0 {
        bail!("{key} must not be negative");
    }
    Ok(n)
}
