//! Layered configuration.
//!
//! Sources, later overriding earlier:
//! 1. Bundled defaults (`turnstile.toml` shipped with the crate)
//! 2. `~/.config/turnstile/turnstile.toml`
//! 3. `./turnstile.toml`
//! 4. `TURNSTILE_<SECTION>__<KEY>` environment variables
//!
//! Credentials are not part of this file; see [`Credentials::from_env`].
//!
//! [`Credentials::from_env`]: turnstile_session::Credentials::from_env

use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use crate::MaintenanceConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use turnstile_error::{ConfigError, TurnstileError, TurnstileResult};
use turnstile_rate_limit::RateLimitConfig;
use turnstile_retry::RetryConfig;
use turnstile_weight::{DEFAULT_DATA_LIMIT_CHUNK, MAX_WEIGHT, WeightBudgeter};

// Bundled default configuration
const DEFAULT_CONFIG: &str = include_str!("../turnstile.toml");

/// Request weight limits.
///
/// ```toml
/// [weight]
/// ceiling = 200
/// data_limit_chunk = 50
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct WeightConfig {
    /// Largest weight the exchange accepts per request
    pub ceiling: u32,
    /// Resources per chunk when recovering from a too-much-data rejection
    pub data_limit_chunk: usize,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            ceiling: MAX_WEIGHT,
            data_limit_chunk: DEFAULT_DATA_LIMIT_CHUNK,
        }
    }
}

impl WeightConfig {
    /// Build the budgeter for this ceiling.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a zero ceiling.
    pub fn budgeter(&self) -> TurnstileResult<WeightBudgeter> {
        WeightBudgeter::new(self.ceiling)
    }
}

/// Top-level turnstile configuration.
///
/// # Example
///
/// ```no_run
/// use turnstile::TurnstileConfig;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = TurnstileConfig::load()?;
/// let general = config.rate_limits.general;
/// println!("General tier: {} per {}ms", general.rate, general.window_ms);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct TurnstileConfig {
    /// Rate limit tiers
    pub rate_limits: RateLimitConfig,
    /// Backoff bounds for rate-limited calls
    pub retry: RetryConfig,
    /// Request weight limits
    pub weight: WeightConfig,
    /// Background task cadence
    pub maintenance: MaintenanceConfig,
}

impl TurnstileConfig {
    /// Load configuration from every source.
    ///
    /// Missing user files are skipped silently.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a source cannot be parsed or a value is
    /// out of range.
    #[instrument]
    pub fn load() -> TurnstileResult<Self> {
        debug!("Loading configuration: env > current dir > home dir > bundled defaults");

        let mut builder = Self::defaults();

        // Add user config from home directory (optional)
        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/turnstile/turnstile.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }

        // Add user config from current directory (optional)
        builder = builder.add_source(File::with_name("turnstile").required(false));

        // Environment overrides, e.g. TURNSTILE_RETRY__MAX_ATTEMPTS=5
        builder = builder.add_source(
            Environment::with_prefix("TURNSTILE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        Self::finish(builder)
    }

    /// Load the bundled defaults overridden by one specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<std::path::Path>) -> TurnstileResult<Self> {
        debug!("Loading configuration from file");
        Self::finish(Self::defaults().add_source(File::from(path.as_ref())))
    }

    fn defaults() -> ConfigBuilder<config::builder::DefaultState> {
        Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
    }

    fn finish(builder: ConfigBuilder<config::builder::DefaultState>) -> TurnstileResult<Self> {
        let config: Self = builder
            .build()
            .map_err(|e| {
                TurnstileError::from(ConfigError::new(format!(
                    "Failed to build configuration: {}",
                    e
                )))
            })?
            .try_deserialize()
            .map_err(|e| {
                TurnstileError::from(ConfigError::new(format!(
                    "Failed to parse configuration: {}",
                    e
                )))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Check every section.
    ///
    /// # Errors
    ///
    /// Returns the first out-of-range value as a configuration error.
    pub fn validate(&self) -> TurnstileResult<()> {
        self.rate_limits.validate()?;
        self.retry.validate()?;
        self.weight.budgeter()?;
        self.maintenance.validate()?;
        Ok(())
    }
}
