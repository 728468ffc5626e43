use crate::error::Result;
use crate::sources::{CandlePayload, CandleSource};
use crate::types::RawCandle;
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

/// Replays candle dumps stored as `<dir>/<ASSET>.json`.
///
/// The period and lookback are ignored; the dump is returned as recorded.
/// A missing dump is an I/O error, like any other failed fetch.
#[derive(Debug, Clone)]
pub struct FileCandleSource {
    dir: PathBuf,
}

impl FileCandleSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the dump for an asset.
    pub fn path_for(&self, asset: &str) -> PathBuf {
        self.dir.join(format!("{}.json", asset))
    }
}

#[async_trait]
impl CandleSource for FileCandleSource {
    fn name(&self) -> &str {
        "file"
    }

    async fn get_candles(
        &self,
        asset: &str,
        _period_seconds: u32,
        _lookback_seconds: u64,
    ) -> Result<Vec<RawCandle>> {
        let path = self.path_for(asset);
        debug!("Reading candles for {} from {}", asset, path.display());
        let text = tokio::fs::read_to_string(&path).await?;
        let payload: CandlePayload = serde_json::from_str(&text)?;
        Ok(payload.into_candles())
    }
}
