use std::time::Duration;

use reqwest::Client;
use tracing::{instrument, trace};

use crate::config::DeviceConfig;
use crate::daemon::CycleError;

/// HTTP access to the device status page.
#[derive(Debug, Clone)]
pub struct DeviceClient {
    client: Client,
    url: String,
}

impl DeviceClient {
    pub fn new(config: &DeviceConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetches the status page. Timeouts, connection failures and non-2xx
    /// answers are all network errors; there is no retry.
    #[instrument(skip(self), fields(url = %self.url))]
    pub async fn fetch(&self) -> Result<String, CycleError> {
        trace!("requesting status page");

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| CycleError::Network(e.to_string()))?;

        response
            .text()
            .await
            .map_err(|e| CycleError::Network(format!("error during decode: {e}")))
    }
}
