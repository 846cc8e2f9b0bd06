//! Satellite tracking: N2YO position fetches archived per request.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::error::{RagError, Result};
use crate::vector_store::{SatelliteTrackPayload, TrackArchive};

pub mod n2yo;
pub mod nlq;

pub use n2yo::{N2yoClient, PositionsResponse};
pub use nlq::NlqParams;

/// Observer position and duration for one positions call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRequest {
    /// NORAD catalog id.
    pub norad_id: u32,
    /// Observer latitude in degrees.
    pub obs_lat: f64,
    /// Observer longitude in degrees.
    pub obs_lng: f64,
    /// Observer altitude in meters.
    #[serde(default)]
    pub obs_alt: f64,
    /// Seconds of predicted positions.
    #[serde(default = "default_seconds")]
    pub seconds: u32,
}

fn default_seconds() -> u32 {
    nlq::DEFAULT_SECONDS
}

impl TrackRequest {
    /// Range-checks the observer and clamps the duration.
    pub fn validated(mut self) -> Result<Self> {
        if !(-90.0..=90.0).contains(&self.obs_lat) {
            return Err(RagError::InvalidRequest(format!(
                "obs_lat {} is outside -90..=90",
                self.obs_lat
            )));
        }
        if !(-180.0..=180.0).contains(&self.obs_lng) {
            return Err(RagError::InvalidRequest(format!(
                "obs_lng {} is outside -180..=180",
                self.obs_lng
            )));
        }
        self.seconds = nlq::clamp_seconds(i64::from(self.seconds));
        Ok(self)
    }
}

impl From<&NlqParams> for TrackRequest {
    fn from(params: &NlqParams) -> Self {
        Self {
            norad_id: params.norad_id,
            obs_lat: params.obs_lat,
            obs_lng: params.obs_lng,
            obs_alt: params.obs_alt,
            seconds: params.seconds,
        }
    }
}

/// A fetched and archived track.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedTrack {
    /// Archive id of the stored track.
    pub id: String,
    /// Raw position samples.
    pub positions: Vec<Value>,
}

/// Stores a track in the archive and returns its id.
pub async fn record_track(
    archive: &TrackArchive,
    norad_id: u32,
    satellite_name: Option<String>,
    positions: Vec<Value>,
    parsed: Option<NlqParams>,
) -> Result<String> {
    let samples = positions.len();
    let id = archive
        .store(SatelliteTrackPayload {
            norad_id,
            satellite_name,
            positions,
            parsed,
        })
        .await?;
    info!(norad_id, samples, %id, "archived satellite track");
    Ok(id)
}

/// Fetches positions for `request` and archives them with `parsed`.
pub async fn fetch_and_record(
    client: &N2yoClient,
    archive: &TrackArchive,
    request: &TrackRequest,
    parsed: Option<NlqParams>,
) -> Result<RecordedTrack> {
    let response = client.positions(request).await?;
    let positions = response.positions;
    let id = record_track(
        archive,
        request.norad_id,
        response.info.satname,
        positions.clone(),
        parsed,
    )
    .await?;
    Ok(RecordedTrack { id, positions })
}
