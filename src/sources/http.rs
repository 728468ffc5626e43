use crate::error::{CatalogError, Result};
use crate::sources::{CandlePayload, CandleSource};
use crate::types::RawCandle;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// HTTP bridge in front of the broker's candle history endpoint.
///
/// `GET {base_url}/candles?asset=..&period=..&lookback=..` returning a JSON
/// array of candles (or an object with a `candles`/`data` array).
#[derive(Clone)]
pub struct HttpCandleSource {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpCandleSource {
    /// Create a new bridge client.
    pub fn new(base_url: impl Into<String>, token: Option<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .user_agent("signal-cataloger/0.1")
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    fn candles_url(&self) -> String {
        format!("{}/candles", self.base_url)
    }
}

#[async_trait]
impl CandleSource for HttpCandleSource {
    fn name(&self) -> &str {
        "http"
    }

    async fn get_candles(
        &self,
        asset: &str,
        period_seconds: u32,
        lookback_seconds: u64,
    ) -> Result<Vec<RawCandle>> {
        let url = self.candles_url();
        debug!(
            "Requesting {} candles: period={}s lookback={}s",
            asset, period_seconds, lookback_seconds
        );

        let mut request = self.client.get(&url).query(&[
            ("asset", asset.to_string()),
            ("period", period_seconds.to_string()),
            ("lookback", lookback_seconds.to_string()),
        ]);
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            warn!(
                "Candle bridge returned {} for {}: {}",
                status,
                asset,
                text.chars().take(200).collect::<String>()
            );
            return Err(CatalogError::Source(format!(
                "candle bridge returned {} for {}",
                status, asset
            )));
        }

        let payload: CandlePayload = response.json().await?;
        Ok(payload.into_candles())
    }
}
