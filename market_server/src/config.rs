use std::{collections::HashMap, env, io::Write, time::Duration as StdDuration};

use chrono::Duration;
use invoice_gateway::{GatewayConfig, RateSourceConfig};
use log::*;
use market_common::Secret;
use order_engine::db_types::OrderId;
use rand::{thread_rng, RngCore};
use serde_json::json;
use tempfile::NamedTempFile;

use crate::errors::ServerError;

const DEFAULT_MKT_HOST: &str = "127.0.0.1";
const DEFAULT_MKT_PORT: u16 = 8370;
const DEFAULT_SETTLEMENT_CURRENCY: &str = "USD";
const DEFAULT_INVOICE_LIFETIME_MINUTES: u32 = 60;
const DEFAULT_ORDER_FALLBACK_TIMEOUT: Duration = Duration::minutes(120);
const DEFAULT_EXPIRY_INTERVAL: StdDuration = StdDuration::from_secs(60);
const DEFAULT_RETURN_URL: &str = "http://localhost:3000/orders/{order_id}";
const DEFAULT_SUCCESS_URL: &str = "http://localhost:3000/orders/{order_id}?paid=1";
const DEFAULT_CALLBACK_URL: &str = "http://localhost:8370/webhook/payment";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub auth: AuthConfig,
    /// Connection details for the crypto payment gateway
    pub gateway: GatewayConfig,
    pub callbacks: CallbackUrls,
    /// How long an invoice stays payable. The gateway accepts 5 to 720 minutes.
    pub invoice_lifetime_minutes: u32,
    /// Pending orders without an invoice expiry are expired by the sweep once they are this old. Keep it wider than
    /// the invoice lifetime.
    pub order_fallback_timeout: Duration,
    /// How often the background expiry worker runs
    pub expiry_interval: StdDuration,
    /// The currency all invoices are raised in
    pub settlement_currency: String,
    pub exchange_rates: RateSourceConfig,
    /// Rates to the settlement currency used when neither the rate source nor the cache can provide one
    pub fallback_rates: HashMap<String, f64>,
    /// Recipient of payment and conflict alerts. Alerts are only logged if this is not set.
    pub admin_email: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_MKT_HOST.to_string(),
            port: DEFAULT_MKT_PORT,
            database_url: String::default(),
            auth: AuthConfig::default(),
            gateway: GatewayConfig::default(),
            callbacks: CallbackUrls::default(),
            invoice_lifetime_minutes: DEFAULT_INVOICE_LIFETIME_MINUTES,
            order_fallback_timeout: DEFAULT_ORDER_FALLBACK_TIMEOUT,
            expiry_interval: DEFAULT_EXPIRY_INTERVAL,
            settlement_currency: DEFAULT_SETTLEMENT_CURRENCY.to_string(),
            exchange_rates: RateSourceConfig::default(),
            fallback_rates: HashMap::new(),
            admin_email: None,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("MKT_HOST").ok().unwrap_or_else(|| DEFAULT_MKT_HOST.into());
        let port = env::var("MKT_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for MKT_PORT. {e} Using the default, {DEFAULT_MKT_PORT}, instead."
                    );
                    DEFAULT_MKT_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_MKT_PORT);
        let database_url = env::var("MKT_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ MKT_DATABASE_URL is not set. Please set it to the URL for the market database.");
            String::default()
        });
        let auth = AuthConfig::try_from_env().unwrap_or_else(|e| {
            warn!(
                "🪛️ Could not load the authentication configuration from environment variables. {e}. Reverting to the \
                 default configuration."
            );
            AuthConfig::default()
        });
        let gateway = GatewayConfig::new_from_env_or_default();
        let callbacks = CallbackUrls::from_env_or_default();
        let invoice_lifetime_minutes = parse_env("MKT_INVOICE_LIFETIME_MINUTES", DEFAULT_INVOICE_LIFETIME_MINUTES);
        if !(5..=720).contains(&invoice_lifetime_minutes) {
            warn!("🪛️ MKT_INVOICE_LIFETIME_MINUTES is {invoice_lifetime_minutes}. The gateway will reject invoices.");
        }
        let fallback_minutes =
            parse_env("MKT_ORDER_FALLBACK_TIMEOUT_MINUTES", DEFAULT_ORDER_FALLBACK_TIMEOUT.num_minutes());
        let order_fallback_timeout = Duration::minutes(fallback_minutes);
        if fallback_minutes <= i64::from(invoice_lifetime_minutes) {
            warn!(
                "🪛️ The order fallback timeout ({fallback_minutes} min) is not longer than the invoice lifetime \
                 ({invoice_lifetime_minutes} min). Orders may be expired while their invoice can still be paid."
            );
        }
        let expiry_interval =
            StdDuration::from_secs(parse_env("MKT_EXPIRY_INTERVAL_SECS", DEFAULT_EXPIRY_INTERVAL.as_secs()).max(1));
        let settlement_currency = env::var("MKT_SETTLEMENT_CURRENCY")
            .map(|s| s.trim().to_uppercase())
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_SETTLEMENT_CURRENCY.into());
        let mut exchange_rates = RateSourceConfig::default();
        if let Ok(url) = env::var("MKT_EXCHANGE_RATE_URL") {
            exchange_rates.url_template = url;
        }
        let fallback_rates = env::var("MKT_FALLBACK_RATES").map(|s| parse_fallback_rates(&s)).unwrap_or_default();
        let admin_email = env::var("MKT_ADMIN_EMAIL").ok().filter(|s| !s.trim().is_empty());
        if admin_email.is_none() {
            warn!("🪛️ MKT_ADMIN_EMAIL is not set. Payment and conflict alerts will only be logged.");
        }
        Self {
            host,
            port,
            database_url,
            auth,
            gateway,
            callbacks,
            invoice_lifetime_minutes,
            order_fallback_timeout,
            expiry_interval,
            settlement_currency,
            exchange_rates,
            fallback_rates,
            admin_email,
        }
    }
}

fn parse_env<T>(name: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            warn!("🪛️ Invalid configuration value for {name}. {e}. Using the default, {default}, instead.");
            default
        }),
        Err(_) => {
            info!("🪛️ {name} is not set. Using the default value of {default}.");
            default
        },
    }
}

/// Parses `EUR:1.08,GBP:1.27` into a map keyed by upper-case currency code. Bad entries are skipped.
pub fn parse_fallback_rates(s: &str) -> HashMap<String, f64> {
    s.split(',')
        .filter(|entry| !entry.trim().is_empty())
        .filter_map(|entry| {
            let (code, rate) = entry.split_once(':').or_else(|| {
                warn!("🪛️ Ignoring fallback rate '{entry}'. Expected CODE:RATE");
                None
            })?;
            match rate.trim().parse::<f64>() {
                Ok(r) if r > 0.0 => Some((code.trim().to_uppercase(), r)),
                _ => {
                    warn!("🪛️ Ignoring fallback rate '{entry}'. The rate must be a positive number");
                    None
                },
            }
        })
        .collect()
}

//-------------------------------------------------  CallbackUrls  -----------------------------------------------------
/// Where the gateway sends the buyer and its notifications. `{order_id}` is replaced with the order id.
#[derive(Clone, Debug)]
pub struct CallbackUrls {
    pub return_url: String,
    pub success_url: String,
    pub callback_url: String,
}

impl Default for CallbackUrls {
    fn default() -> Self {
        Self {
            return_url: DEFAULT_RETURN_URL.to_string(),
            success_url: DEFAULT_SUCCESS_URL.to_string(),
            callback_url: DEFAULT_CALLBACK_URL.to_string(),
        }
    }
}

impl CallbackUrls {
    pub fn from_env_or_default() -> Self {
        let read = |name: &str, default: &str| {
            env::var(name).ok().unwrap_or_else(|| {
                info!("🪛️ {name} is not set. Using {default}");
                default.to_string()
            })
        };
        Self {
            return_url: read("MKT_RETURN_URL", DEFAULT_RETURN_URL),
            success_url: read("MKT_SUCCESS_URL", DEFAULT_SUCCESS_URL),
            callback_url: read("MKT_CALLBACK_URL", DEFAULT_CALLBACK_URL),
        }
    }

    pub fn return_url_for(&self, order_id: &OrderId) -> String {
        self.return_url.replace("{order_id}", order_id.as_str())
    }

    pub fn success_url_for(&self, order_id: &OrderId) -> String {
        self.success_url.replace("{order_id}", order_id.as_str())
    }

    pub fn callback_url_for(&self, order_id: &OrderId) -> String {
        self.callback_url.replace("{order_id}", order_id.as_str())
    }
}

//-------------------------------------------------  AuthConfig  -------------------------------------------------------
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// The HS256 secret shared with the session system that issues access tokens.
    pub jwt_secret: Secret<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        let mut tmpfile = NamedTempFile::new().ok().and_then(|f| f.keep().ok());
        warn!(
            "🚨️🚨️🚨️ The JWT secret has not been set. I'm using a random value for this session. No token issued by \
             the session system will be accepted. 🚨️🚨️🚨️"
        );
        let mut bytes = [0u8; 32];
        thread_rng().fill_bytes(&mut bytes);
        let secret = base64::encode(bytes);
        match &mut tmpfile {
            Some((f, p)) => {
                let key_data = json!({ "jwt_secret": secret }).to_string();
                match writeln!(f, "{key_data}") {
                    Ok(()) => warn!(
                        "🚨️🚨️🚨️ The JWT secret for this session was written to {}. If this is a production instance, \
                         you are doing it wrong! Set the MKT_JWT_SECRET environment variable instead. 🚨️🚨️🚨️",
                        p.to_str().unwrap_or("???")
                    ),
                    Err(e) => warn!("🪛️ Could not write the JWT secret to the temporary file. {e}"),
                }
            },
            None => {
                warn!("🪛️ Could not create a temporary file to store the JWT secret. ");
            },
        }
        Self { jwt_secret: Secret::new(secret) }
    }
}

impl AuthConfig {
    pub fn new(secret: &str) -> Self {
        Self { jwt_secret: Secret::new(secret.to_string()) }
    }

    pub fn try_from_env() -> Result<Self, ServerError> {
        let secret =
            env::var("MKT_JWT_SECRET").map_err(|e| ServerError::ConfigurationError(format!("{e} [MKT_JWT_SECRET]")))?;
        if secret.len() < 32 {
            return Err(ServerError::ConfigurationError(
                "MKT_JWT_SECRET must be at least 32 characters long".to_string(),
            ));
        }
        Ok(Self::new(&secret))
    }
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// A subset of the server configuration that is used to configure the server's behaviour. Generally we try to keep this
/// as small as possible, and exclude secrets to avoid passing sensitive information around the system.
#[derive(Clone, Debug)]
pub struct ServerOptions {
    pub settlement_currency: String,
    pub order_fallback_timeout: Duration,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            settlement_currency: config.settlement_currency.clone(),
            order_fallback_timeout: config.order_fallback_timeout,
        }
    }
}
