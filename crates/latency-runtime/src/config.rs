//! # Harness Configuration
//!
//! Assembled from, lowest precedence first:
//!
//! 1. Built-in defaults
//! 2. Process environment
//! 3. Env file (`KEY=VALUE` lines; overrides the environment)
//! 4. CLI flags, applied by the binary before [`HarnessConfig::validate`]
//!
//! Credentials are read from `{EXCHANGE}_API_KEY`, `{EXCHANGE}_API_SECRET`
//! and, when present, `{EXCHANGE}_API_PASSPHRASE`.

use latency_core::{ClientOrderId, LatencyError, OrderTemplate, SamplerConfig};
use std::collections::HashMap;
use std::env;
use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use venue_types::{Credentials, Side};

use crate::session::SimulationConfig;

/// Configuration errors. All of them are fatal before any request is sent.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(String),

    #[error("invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },

    #[error("failed to read env file {}: {source}", .path.display())]
    EnvFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl From<ConfigError> for LatencyError {
    fn from(err: ConfigError) -> Self {
        LatencyError::Configuration(err.to_string())
    }
}

fn invalid(key: &str, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

/// Parse env file contents.
///
/// Blank lines, `#` comments and lines without `=` are skipped. Keys and
/// values are trimmed. Later lines win.
pub fn parse_env_file(contents: &str) -> HashMap<String, String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

/// Read an env file. A missing file is logged and yields `None`.
pub fn read_env_file(path: &Path) -> Result<Option<HashMap<String, String>>, ConfigError> {
    match fs::read_to_string(path) {
        Ok(contents) => {
            let vars = parse_env_file(&contents);
            debug!(path = %path.display(), entries = vars.len(), "Loaded env file");
            Ok(Some(vars))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "Env file not found; using process environment only");
            Ok(None)
        }
        Err(source) => Err(ConfigError::EnvFile {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Everything the binary needs to run.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Venue name, e.g. `KUCOIN`
    pub venue: String,
    pub instrument: String,
    pub credentials: Credentials,
    pub side: Side,
    pub quantity: String,
    pub limit_price: String,
    /// Fixed client order id; `None` generates one per create
    pub client_order_id: Option<String>,
    pub iterations: usize,
    pub iteration_delay: Duration,
    /// `None` waits indefinitely
    pub response_timeout: Option<Duration>,
    pub simulation: SimulationConfig,
}

impl HarnessConfig {
    pub const DEFAULT_ITERATIONS: usize = 10;
    pub const DEFAULT_DELAY_MS: u64 = 1000;
    pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
    pub const MAX_ITERATIONS: usize = 1_000_000;

    /// Load from the process environment overlaid with `env_file`.
    pub fn load(env_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut vars = unicode_vars(env::vars_os());
        if let Some(path) = env_file {
            if let Some(file_vars) = read_env_file(path)? {
                vars.extend(file_vars);
            }
        }
        Self::from_vars(&vars)
    }

    /// Build and validate from a flat variable map.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let vars = Vars(vars);

        let venue = vars.require("EXCHANGE")?;
        let instrument = vars.require("INSTRUMENT")?;

        let prefix = venue.to_ascii_uppercase();
        let key_name = format!("{}_API_KEY", prefix);
        let secret_name = format!("{}_API_SECRET", prefix);
        let passphrase_name = format!("{}_API_PASSPHRASE", prefix);

        let mut credentials = Credentials::new()
            .with(key_name.as_str(), vars.require(&key_name)?)
            .with(secret_name.as_str(), vars.require(&secret_name)?);
        if let Some(passphrase) = vars.get(&passphrase_name) {
            credentials = credentials.with(passphrase_name.as_str(), passphrase);
        }

        let simulation = SimulationConfig {
            latency: Duration::from_millis(vars.parse_or("SIM_LATENCY_MS", 20)?),
            jitter: Duration::from_millis(vars.parse_or("SIM_JITTER_MS", 5)?),
            market_data: vars.flag("SIM_MARKET_DATA")?,
            ..SimulationConfig::default()
        };

        let config = Self {
            venue,
            instrument,
            credentials,
            side: vars.parse_or("ORDER_SIDE", Side::Buy)?,
            quantity: vars.get("ORDER_QUANTITY").unwrap_or("0.05").to_string(),
            limit_price: vars.get("ORDER_LIMIT_PRICE").unwrap_or("100").to_string(),
            client_order_id: vars.get("CLIENT_ORDER_ID").map(str::to_string),
            iterations: vars.parse_or("ITERATIONS", Self::DEFAULT_ITERATIONS)?,
            iteration_delay: Duration::from_millis(
                vars.parse_or("ITERATION_DELAY_MS", Self::DEFAULT_DELAY_MS)?,
            ),
            response_timeout: timeout_from_millis(
                vars.parse_or("RESPONSE_TIMEOUT_MS", Self::DEFAULT_TIMEOUT_MS)?,
            ),
            simulation,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check invariants that CLI overrides could also break.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.iterations == 0 {
            return Err(invalid("ITERATIONS", "0", "must be at least 1"));
        }
        if self.iterations > Self::MAX_ITERATIONS {
            return Err(invalid(
                "ITERATIONS",
                &self.iterations.to_string(),
                format!("must be at most {}", Self::MAX_ITERATIONS),
            ));
        }
        positive_decimal("ORDER_QUANTITY", &self.quantity)?;
        positive_decimal("ORDER_LIMIT_PRICE", &self.limit_price)?;
        Ok(())
    }

    /// Order placed on every iteration.
    pub fn order_template(&self) -> OrderTemplate {
        OrderTemplate {
            venue: self.venue.clone(),
            instrument: self.instrument.clone(),
            credentials: self.credentials.clone(),
            side: self.side,
            quantity: self.quantity.clone(),
            limit_price: self.limit_price.clone(),
            client_order_id: match &self.client_order_id {
                Some(id) => ClientOrderId::Fixed(id.clone()),
                None => ClientOrderId::Generated,
            },
        }
    }

    pub fn sampler_config(&self) -> SamplerConfig {
        SamplerConfig {
            iterations: self.iterations,
            iteration_delay: self.iteration_delay,
        }
    }
}

/// Keep the variables whose name and value are both valid UTF-8.
///
/// Other entries cannot name a harness setting, so they are skipped.
pub fn unicode_vars<I>(vars: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .filter_map(|(key, value)| match (key.into_string(), value.into_string()) {
            (Ok(key), Ok(value)) => Some((key, value)),
            (Ok(key), Err(_)) => {
                debug!(key = %key, "Skipping environment variable with non UTF-8 value");
                None
            }
            (Err(key), _) => {
                debug!(key = ?key, "Skipping environment variable with non UTF-8 name");
                None
            }
        })
        .collect()
}

/// `0` means no deadline.
pub fn timeout_from_millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

/// Variable lookup; blank values count as unset.
struct Vars<'a>(&'a HashMap<String, String>);

impl<'a> Vars<'a> {
    fn get(&self, key: &str) -> Option<&'a str> {
        self.0.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
    }

    fn require(&self, key: &str) -> Result<String, ConfigError> {
        self.get(key)
            .map(str::to_string)
            .ok_or_else(|| ConfigError::Missing(key.to_string()))
    }

    fn parse_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.get(key) {
            Some(raw) => raw.parse().map_err(|e: T::Err| invalid(key, raw, e.to_string())),
            None => Ok(default),
        }
    }

    fn flag(&self, key: &str) -> Result<bool, ConfigError> {
        match self.get(key).map(str::to_ascii_lowercase).as_deref() {
            None | Some("false") | Some("0") => Ok(false),
            Some("true") | Some("1") => Ok(true),
            Some(other) => Err(invalid(key, other, "expected true or false")),
        }
    }
}

fn positive_decimal(key: &str, value: &str) -> Result<(), ConfigError> {
    match value.parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => Ok(()),
        Ok(_) => Err(invalid(key, value, "must be greater than zero")),
        Err(e) => Err(invalid(key, value, e.to_string())),
    }
}
