use std::{sync::OnceLock, time::Duration};

use tracing::debug;

use crate::config::ClientConfig;
use crate::error::Result;

pub const USER_AGENT: &str = concat!("tourify/", env!("CARGO_PKG_VERSION"));

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Another crate may have installed one already
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Build the `reqwest::Client` every API call goes through.
pub fn build_client(config: &ClientConfig) -> Result<reqwest::Client> {
    install_rustls_provider();

    let mut builder = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(10));

    let timeout = config.request_timeout();
    if timeout > Duration::ZERO {
        builder = builder.timeout(timeout);
    }

    Ok(builder.build()?)
}
