//! HTTP client for the upstream bus position feed.
//!
//! Performs one fetch-and-decode per route per call. No retry policy lives
//! here; the collector decides when to call again.

pub mod error;
pub mod wire;

use async_trait::async_trait;
use tracing::debug;

use crate::config::{FeedAuth, FeedConfig};

use error::FeedError;
use wire::RawVehicle;

/// Maximum allowed response size (8 MB)
const MAX_PAYLOAD_SIZE: usize = 8 * 1024 * 1024;

/// A source of raw vehicle batches, one route per call.
///
/// The production implementation is [`FeedClient`]; tests substitute
/// scripted doubles.
#[async_trait]
pub trait VehicleSource: Send + Sync {
    async fn fetch_route(&self, route: &str) -> Result<Vec<RawVehicle>, FeedError>;
}

pub struct FeedClient {
    client: reqwest::Client,
    config: FeedConfig,
}

impl FeedClient {
    pub fn new(config: FeedConfig) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder()
            .user_agent("live-bus-api/0.1")
            .build()?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl VehicleSource for FeedClient {
    async fn fetch_route(&self, route: &str) -> Result<Vec<RawVehicle>, FeedError> {
        let mut request = self
            .client
            .get(&self.config.endpoint)
            .query(&[("route", route)])
            .timeout(self.config.fetch_timeout());

        request = match &self.config.auth {
            Some(FeedAuth::ApiKeyHeader { header, key }) => {
                request.header(header.as_str(), key.as_str())
            }
            Some(FeedAuth::UrlParam { param, key }) => {
                request.query(&[(param.as_str(), key.as_str())])
            }
            None => request,
        };

        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(FeedError::Http(response.status()));
        }

        let bytes = response.bytes().await?;

        if bytes.len() > MAX_PAYLOAD_SIZE {
            return Err(FeedError::PayloadTooLarge {
                size: bytes.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }

        debug!(route, bytes = bytes.len(), "Feed bytes received, decoding");

        wire::decode(self.config.format, route, &bytes)
    }
}
