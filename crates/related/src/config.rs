//! Loader configuration types and builders

use serde::{Deserialize, Serialize};
use service_builder::builder;
use std::time::Duration;

use crate::error::{RelatedError, RelatedResult};

/// Configuration for the related dto loader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[builder]
pub struct LoaderConfig {
    /// Issue the fetches of all relations at once instead of one by one
    #[builder(default = "false", getter)]
    pub concurrent_fetch: bool,

    /// Upper bound for a single loader rule call (None = no limit)
    #[builder(default = "None", getter)]
    pub fetch_timeout: Option<Duration>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            concurrent_fetch: false,
            fetch_timeout: None,
        }
    }
}

impl LoaderConfig {
    /// Check the configuration before it is handed to a loader
    pub fn validate(&self) -> RelatedResult<()> {
        if self.fetch_timeout == Some(Duration::ZERO) {
            return Err(RelatedError::Configuration(
                "fetch_timeout must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

impl LoaderConfigBuilder {
    /// Bound every loader rule call by `timeout`
    pub fn fetch_timeout_duration(self, timeout: Duration) -> Self {
        self.fetch_timeout(Some(timeout))
    }

    /// Let loader rule calls run without a time limit
    pub fn no_fetch_timeout(self) -> Self {
        self.fetch_timeout(None)
    }

    /// Create a development configuration: sequential fetches, no timeout
    pub fn development() -> Self {
        LoaderConfigBuilder::new()
            .concurrent_fetch(false)
            .no_fetch_timeout()
    }

    /// Create a production configuration with concurrent fetches and a timeout
    pub fn production() -> Self {
        LoaderConfigBuilder::new()
            .concurrent_fetch(true)
            .fetch_timeout_duration(Duration::from_secs(30))
    }

    /// Create a testing configuration that fails fast on a stuck rule
    pub fn testing() -> Self {
        LoaderConfigBuilder::new()
            .concurrent_fetch(false)
            .fetch_timeout_duration(Duration::from_secs(5))
    }
}
