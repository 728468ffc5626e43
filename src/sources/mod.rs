//! Candle sources.
//!
//! The broker connection lives outside this crate; sources only have to
//! return OHLC history for an asset and candle period.

pub mod file;
pub mod http;

pub use file::FileCandleSource;
pub use http::HttpCandleSource;

use crate::error::{CatalogError, Result};
use crate::types::RawCandle;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Mutex;

/// Supplier of historical candles.
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Fetch candles of `period_seconds` covering the last `lookback_seconds`.
    async fn get_candles(
        &self,
        asset: &str,
        period_seconds: u32,
        lookback_seconds: u64,
    ) -> Result<Vec<RawCandle>>;
}

#[async_trait]
impl CandleSource for Box<dyn CandleSource> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn get_candles(
        &self,
        asset: &str,
        period_seconds: u32,
        lookback_seconds: u64,
    ) -> Result<Vec<RawCandle>> {
        (**self)
            .get_candles(asset, period_seconds, lookback_seconds)
            .await
    }
}

/// Candle payload: a bare array or an object wrapping one.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum CandlePayload {
    List(Vec<RawCandle>),
    Wrapped { candles: Vec<RawCandle> },
    Data { data: Vec<RawCandle> },
}

impl CandlePayload {
    pub(crate) fn into_candles(self) -> Vec<RawCandle> {
        match self {
            CandlePayload::List(candles) => candles,
            CandlePayload::Wrapped { candles } => candles,
            CandlePayload::Data { data } => data,
        }
    }
}

/// In-memory candle feeds keyed by asset, for replays and tests.
///
/// Unknown assets return an empty feed; assets registered with
/// [`StaticCandleSource::with_failure`] return a source error.
#[derive(Default)]
pub struct StaticCandleSource {
    feeds: HashMap<String, Vec<RawCandle>>,
    failures: HashMap<String, String>,
    requests: Mutex<Vec<String>>,
}

impl StaticCandleSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the feed for an asset.
    pub fn with_feed(mut self, asset: &str, candles: Vec<RawCandle>) -> Self {
        self.feeds.insert(asset.to_string(), candles);
        self
    }

    /// Make requests for an asset fail with `message`.
    pub fn with_failure(mut self, asset: &str, message: &str) -> Self {
        self.failures.insert(asset.to_string(), message.to_string());
        self
    }

    /// Assets requested so far, in order.
    pub fn requested_assets(&self) -> Vec<String> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CandleSource for StaticCandleSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn get_candles(
        &self,
        asset: &str,
        _period_seconds: u32,
        _lookback_seconds: u64,
    ) -> Result<Vec<RawCandle>> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(asset.to_string());
        }
        if let Some(message) = self.failures.get(asset) {
            return Err(CatalogError::Source(message.clone()));
        }
        Ok(self.feeds.get(asset).cloned().unwrap_or_default())
    }
}
