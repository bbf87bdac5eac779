use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use roster_core::RetryPolicy;
use roster_logging::{roster_info, roster_warn};
use serde::{Deserialize, Serialize};

use crate::store::{load_ron, save_ron, StoreError};
use crate::{ElapsedSettings, PollerSettings, TransportSettings};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub max_response_bytes: u64,
    pub headers: BTreeMap<String, String>,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            connect_timeout_ms: 10_000,
            request_timeout_ms: 30_000,
            max_response_bytes: 8 * 1024 * 1024,
            headers: BTreeMap::new(),
        }
    }
}

impl ApiSettings {
    pub fn transport(&self) -> TransportSettings {
        TransportSettings {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            max_bytes: self.max_response_bytes,
            headers: self.headers.clone(),
        }
    }
}

/// Pauses between consecutive calls of a multi-request sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleSettings {
    /// Between pages of a paginated fetch.
    pub page_delay_ms: u64,
    /// Between items of a sequential bulk mutation.
    pub mutation_delay_ms: u64,
}

impl Default for ThrottleSettings {
    fn default() -> Self {
        Self {
            page_delay_ms: 200,
            mutation_delay_ms: 250,
        }
    }
}

impl ThrottleSettings {
    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn mutation_delay(&self) -> Duration {
        Duration::from_millis(self.mutation_delay_ms)
    }
}

/// Everything the console needs to talk to the account API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub api: ApiSettings,
    pub user_retry: RetryPolicy,
    pub poll_retry: RetryPolicy,
    pub poller: PollerSettings,
    pub elapsed: ElapsedSettings,
    pub throttle: ThrottleSettings,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            api: ApiSettings::default(),
            user_retry: RetryPolicy::user_facing(),
            poll_retry: RetryPolicy::background(),
            poller: PollerSettings::default(),
            elapsed: ElapsedSettings::default(),
            throttle: ThrottleSettings::default(),
        }
    }
}

/// Load configuration from a RON file.
///
/// A missing file gives the defaults. An unreadable or invalid file is
/// logged and also gives the defaults.
pub fn load_config(path: &Path) -> ConsoleConfig {
    match load_ron::<ConsoleConfig>(path) {
        Ok(Some(config)) => {
            roster_info!("Loaded console configuration from {:?}", path);
            config
        }
        Ok(None) => ConsoleConfig::default(),
        Err(err) => {
            roster_warn!("Using default configuration: {}", err);
            ConsoleConfig::default()
        }
    }
}

pub fn save_config(path: &Path, config: &ConsoleConfig) -> Result<(), StoreError> {
    save_ron(path, config)
}
