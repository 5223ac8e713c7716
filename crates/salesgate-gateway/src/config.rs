//! # Gateway Configuration
//!
//! Configuration management for the gateway.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     SALESGATE_COMPANY_ID=DEMO                                          │
//! │     SALESGATE_SCAN_WINDOW=20                                           │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/salesgate/gateway.toml (Linux)                           │
//! │     ~/Library/Application Support/com.salesgate.gateway/gateway.toml   │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     Sage50c / DEMO, scan window 20, max 5 results                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # gateway.toml
//! [engine]
//! product_code = "Sage50c"
//! company_id = "DEMO"
//! debug_mode = false
//!
//! [listing]
//! default_series = "A"
//! default_document_type = "FS"
//! window_size = 20        # numbers probed below the last one
//! max_results = 5         # hits collected before the scan stops
//! default_page_size = 50
//! max_page_size = 200
//!
//! [worker]
//! queue_capacity = 256    # bounded FIFO in front of the engine thread
//! submit_timeout_ms = 0   # 0 = callers wait forever
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use salesgate_core::{SessionSettings, DEFAULT_DOCUMENT_TYPE, DEFAULT_SERIES};

use crate::error::{GatewayError, GatewayResult};

// =============================================================================
// Engine Settings
// =============================================================================

/// Arguments used to open the engine session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Product code passed to the engine (see `available_products`).
    #[serde(default = "default_product_code")]
    pub product_code: String,

    /// Company to open.
    #[serde(default = "default_company_id")]
    pub company_id: String,

    /// Engine-side debug mode.
    #[serde(default)]
    pub debug_mode: bool,
}

fn default_product_code() -> String {
    "Sage50c".to_string()
}

fn default_company_id() -> String {
    "DEMO".to_string()
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            product_code: default_product_code(),
            company_id: default_company_id(),
            debug_mode: false,
        }
    }
}

impl EngineSettings {
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings::new(&self.product_code, &self.company_id, self.debug_mode)
    }
}

// =============================================================================
// Listing Settings
// =============================================================================

/// Bounds of the reverse-scan listing.
///
/// ## The Bounded View
/// ```text
/// last number = 120, window_size = 20, max_results = 5
///
///   120 119 118 ... 101 100      ← never probes below 100
///    ✓   ✗   ✓  ...             ← stops at the 5th hit
///
/// page 2 of a 5-row result is empty, by definition, not a rescan.
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingSettings {
    #[serde(default = "default_series")]
    pub default_series: String,

    #[serde(default = "default_document_type")]
    pub default_document_type: String,

    /// How far below the last number the scan may probe.
    #[serde(default = "default_window_size")]
    pub window_size: u32,

    /// Hits collected before the scan stops.
    #[serde(default = "default_max_results")]
    pub max_results: u32,

    #[serde(default = "default_page_size")]
    pub default_page_size: u32,

    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
}

fn default_series() -> String {
    DEFAULT_SERIES.to_string()
}

fn default_document_type() -> String {
    DEFAULT_DOCUMENT_TYPE.to_string()
}

fn default_window_size() -> u32 {
    20
}

fn default_max_results() -> u32 {
    5
}

fn default_page_size() -> u32 {
    50
}

fn default_max_page_size() -> u32 {
    200
}

impl Default for ListingSettings {
    fn default() -> Self {
        ListingSettings {
            default_series: default_series(),
            default_document_type: default_document_type(),
            window_size: default_window_size(),
            max_results: default_max_results(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

// =============================================================================
// Worker Settings
// =============================================================================

/// Affinity worker queue and caller-side timeout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerSettings {
    /// Capacity of the FIFO in front of the engine thread. Submitters wait
    /// for a slot when it is full.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// How long a caller waits for its result. `0` waits forever.
    #[serde(default)]
    pub submit_timeout_ms: u64,
}

fn default_queue_capacity() -> usize {
    256
}

impl Default for WorkerSettings {
    fn default() -> Self {
        WorkerSettings {
            queue_capacity: default_queue_capacity(),
            submit_timeout_ms: 0,
        }
    }
}

impl WorkerSettings {
    pub fn submit_timeout(&self) -> Option<Duration> {
        (self.submit_timeout_ms > 0).then(|| Duration::from_millis(self.submit_timeout_ms))
    }
}

// =============================================================================
// Main Gateway Configuration
// =============================================================================

/// Complete gateway configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub engine: EngineSettings,

    #[serde(default)]
    pub listing: ListingSettings,

    #[serde(default)]
    pub worker: WorkerSettings,
}

impl GatewayConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (gateway.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> GatewayResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading gateway config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load gateway config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> GatewayResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| GatewayError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Gateway config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> GatewayResult<()> {
        if self.engine.product_code.trim().is_empty() {
            return Err(GatewayError::InvalidConfig(
                "engine.product_code must not be empty".into(),
            ));
        }

        if self.listing.window_size == 0 {
            return Err(GatewayError::InvalidConfig(
                "listing.window_size must be greater than 0".into(),
            ));
        }

        if self.listing.max_results == 0 {
            return Err(GatewayError::InvalidConfig(
                "listing.max_results must be greater than 0".into(),
            ));
        }

        if self.listing.default_page_size == 0
            || self.listing.default_page_size > self.listing.max_page_size
        {
            return Err(GatewayError::InvalidConfig(format!(
                "listing.default_page_size must be between 1 and max_page_size ({})",
                self.listing.max_page_size
            )));
        }

        if self.worker.queue_capacity == 0 {
            return Err(GatewayError::InvalidConfig(
                "worker.queue_capacity must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(product) = lookup("SALESGATE_PRODUCT") {
            debug!(product = %product, "Overriding product code from environment");
            self.engine.product_code = product;
        }

        if let Some(company) = lookup("SALESGATE_COMPANY_ID") {
            debug!(company_id = %company, "Overriding company id from environment");
            self.engine.company_id = company;
        }

        if let Some(debug_mode) = lookup("SALESGATE_DEBUG") {
            match debug_mode.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.engine.debug_mode = true,
                "0" | "false" | "no" | "off" => self.engine.debug_mode = false,
                _ => warn!(value = %debug_mode, "Unknown SALESGATE_DEBUG value in environment"),
            }
        }

        if let Some(window) = lookup("SALESGATE_SCAN_WINDOW") {
            if let Ok(w) = window.parse::<u32>() {
                self.listing.window_size = w;
            }
        }

        if let Some(max) = lookup("SALESGATE_SCAN_MAX_RESULTS") {
            if let Ok(m) = max.parse::<u32>() {
                self.listing.max_results = m;
            }
        }

        if let Some(capacity) = lookup("SALESGATE_QUEUE_CAPACITY") {
            if let Ok(c) = capacity.parse::<usize>() {
                debug!(capacity = c, "Overriding queue capacity from environment");
                self.worker.queue_capacity = c;
            }
        }

        if let Some(timeout) = lookup("SALESGATE_SUBMIT_TIMEOUT_MS") {
            if let Ok(t) = timeout.parse::<u64>() {
                self.worker.submit_timeout_ms = t;
            }
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "salesgate", "gateway")
            .map(|dirs| dirs.config_dir().join("gateway.toml"))
    }
}
