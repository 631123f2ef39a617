//! External volume ranking.
//!
//! The ranking service reports each address's cumulative traded volume and
//! its leaderboard position. Read-only; nothing in the trading path
//! depends on it.
//!
//! API: `GET {base_url}/{address}` → `{"value": 1234.56, "rank": 42}`

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::types::{FarmError, SuiAddress};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VolumeInfo {
    /// Cumulative volume in USD.
    pub value: Decimal,
    pub rank: u64,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VolumeRanking: Send + Sync {
    async fn account_volume(&self, address: SuiAddress) -> Result<VolumeInfo, FarmError>;
}

pub struct HttpVolumeRanking {
    http: Client,
    base_url: String,
}

impl HttpVolumeRanking {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FarmError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FarmError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl VolumeRanking for HttpVolumeRanking {
    async fn account_volume(&self, address: SuiAddress) -> Result<VolumeInfo, FarmError> {
        let url = format!("{}/{}", self.base_url, address);
        debug!(url = %url, "Fetching volume ranking");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| FarmError::Transport(format!("ranking request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FarmError::Transport(format!("ranking service returned HTTP {status}")));
        }

        response
            .json::<VolumeInfo>()
            .await
            .map_err(|e| FarmError::Decode(format!("ranking response: {e}")))
    }
}

/// Used when no ranking service is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRanking;

#[async_trait]
impl VolumeRanking for NoRanking {
    async fn account_volume(&self, _address: SuiAddress) -> Result<VolumeInfo, FarmError> {
        Err(FarmError::Config("no ranking service configured".into()))
    }
}
