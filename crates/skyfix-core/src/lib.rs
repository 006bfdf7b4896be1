//! Shared foundation for SkyFix: configuration, logging setup, network error
//! classification and the localized text table.

pub mod config;
pub mod error;
pub mod i18n;

pub use config::{Config, NetworkConfig, ProviderUrls, SamplerConfig, ValidationResult, DEFAULT_CITY};
pub use error::{NetworkError, ReqwestErrorExt};
pub use i18n::{Language, MessageKey, Texts};

use anyhow::Result;

/// Initialize tracing/logging
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))?;

    tracing::debug!("SkyFix core initialized");
    Ok(())
}
