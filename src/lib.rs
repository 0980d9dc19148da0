//! claimdesk core library
//!
//! Typed client for the hospital/insurer claims workflow: claim records are
//! fetched from the backend, interpreted into a workflow stage, and every user
//! action is validated locally, written once and followed by a full reload.

pub mod api;
pub mod core;
pub mod document;
pub mod error;
pub mod models;
pub mod session;

pub use error::{ClaimError, Result};

/// Application configuration
pub mod config {
    use serde::Deserialize;

    #[derive(Debug, Clone, Default, Deserialize)]
    pub struct Config {
        #[serde(default)]
        pub api: ApiConfig,
        #[serde(default)]
        pub logging: LogConfig,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct ApiConfig {
        #[serde(default = "default_base_url")]
        pub base_url: String,
        /// Per-request timeout. Unset means wait for the backend indefinitely.
        #[serde(default)]
        pub timeout_secs: Option<u64>,
    }

    impl Default for ApiConfig {
        fn default() -> Self {
            Self { base_url: default_base_url(), timeout_secs: None }
        }
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct LogConfig {
        #[serde(default = "default_filter")]
        pub filter: String,
        /// Emit JSON lines instead of the human-readable format.
        #[serde(default)]
        pub json: bool,
    }

    impl Default for LogConfig {
        fn default() -> Self {
            Self { filter: default_filter(), json: false }
        }
    }

    fn default_base_url() -> String {
        "http://localhost:1000/api".to_string()
    }

    fn default_filter() -> String {
        "info".to_string()
    }

    /// Load configuration from file
    pub fn load_config() -> crate::Result<Config> {
        let env = std::env::var("CLAIMDESK_ENV").unwrap_or_else(|_| "development".into());

        let settings = config::Config::builder()
            // Start with default settings
            .add_source(config::File::with_name("config/default").required(false))
            // Override with environment-specific settings
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            // Override with environment variables, e.g. CLAIMDESK__API__BASE_URL
            .add_source(config::Environment::with_prefix("CLAIMDESK").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

}
