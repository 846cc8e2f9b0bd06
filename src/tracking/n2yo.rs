//! N2YO REST client for satellite position predictions.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::TrackRequest;
use crate::error::{RagError, Result};

/// Default N2YO satellite API root.
pub const DEFAULT_BASE_URL: &str = "https://api.n2yo.com/rest/v1/satellite";

/// Satellite identity block of a positions response.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SatelliteInfo {
    /// NORAD id echoed back by the API.
    #[serde(default)]
    pub satid: Option<u32>,
    /// Satellite name.
    #[serde(default)]
    pub satname: Option<String>,
}

/// Body of a `positions` call.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PositionsResponse {
    /// Satellite identity.
    #[serde(default)]
    pub info: SatelliteInfo,
    /// One sample per requested second, kept as the API returned them.
    #[serde(default)]
    pub positions: Vec<Value>,
}

/// Thin async client for the N2YO REST API.
#[derive(Clone)]
pub struct N2yoClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl N2yoClient {
    /// Builds a client; a missing key fails each call with [`RagError::Config`].
    pub fn new(api_key: Option<String>, base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Predicted positions for `request.seconds` seconds from now.
    pub async fn positions(&self, request: &TrackRequest) -> Result<PositionsResponse> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| RagError::Config("N2YO_API_KEY is not set".into()))?;
        let url = positions_url(&self.base_url, request, key.trim());
        debug!(norad_id = request.norad_id, seconds = request.seconds, "requesting n2yo positions");

        let resp = self.client.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(RagError::from_response("n2yo", resp).await);
        }
        let body: Value = resp.json().await?;
        if let Some(message) = body.get("error") {
            let body = match message {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            return Err(RagError::Upstream {
                service: "n2yo",
                status: 0,
                body,
            });
        }
        Ok(serde_json::from_value(body)?)
    }
}

/// N2YO takes the key as a trailing `&apiKey=` path segment, not a query string.
fn positions_url(base: &str, request: &TrackRequest, key: &str) -> String {
    format!(
        "{base}/positions/{}/{}/{}/{}/{}/&apiKey={key}",
        request.norad_id, request.obs_lat, request.obs_lng, request.obs_alt, request.seconds
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn url_carries_every_parameter() {
        let request = TrackRequest {
            norad_id: 25544,
            obs_lat: 59.3293,
            obs_lng: 18.0686,
            obs_alt: 0.0,
            seconds: 2,
        };
        assert_eq!(
            positions_url(DEFAULT_BASE_URL, &request, "KEY"),
            "https://api.n2yo.com/rest/v1/satellite/positions/25544/59.3293/18.0686/0/2/&apiKey=KEY"
        );
    }

    #[test]
    fn parses_positions_body() {
        let body = r#"{"info":{"satname":"SPACE STATION","satid":25544,"transactionscount":4},
            "positions":[{"satlatitude":-39.9,"satlongitude":158.3,"timestamp":1521354418}]}"#;
        let parsed: PositionsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.info.satid, Some(25544));
        assert_eq!(parsed.info.satname.as_deref(), Some("SPACE STATION"));
        assert_eq!(parsed.positions.len(), 1);
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let client = N2yoClient::new(None, "http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let request = TrackRequest {
            norad_id: 25544,
            obs_lat: 0.0,
            obs_lng: 0.0,
            obs_alt: 0.0,
            seconds: 1,
        };
        let err = client.positions(&request).await.unwrap_err();
        assert!(matches!(err, RagError::Config(_)));
    }
}
