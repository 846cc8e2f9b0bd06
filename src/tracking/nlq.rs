//! Natural-language tracking requests translated into N2YO parameters.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::completion::{ChatMessage, Completer};
use crate::error::{RagError, Result};

/// Position samples requested when the request names no duration.
pub const DEFAULT_SECONDS: u32 = 60;

/// Upper bound on requested position samples.
pub const MAX_SECONDS: u32 = 3600;

const NLQ_SYSTEM_PROMPT: &str = "You convert satellite tracking requests into JSON. \
Reply with a single JSON object and nothing else, using these keys: \
\"norad_id\" (integer NORAD catalog number or null), \
\"satellite\" (satellite name or null), \
\"city\" (observer city name or null), \
\"obs_lat\" (observer latitude in degrees or null), \
\"obs_lng\" (observer longitude in degrees or null), \
\"obs_alt\" (observer altitude in meters, default 0), \
\"seconds\" (number of seconds to track, or null when the request names no duration).";

/// Observer cities with fixed coordinates `(name, latitude, longitude)`.
pub const KNOWN_CITIES: &[(&str, f64, f64)] = &[
    ("stockholm", 59.3293, 18.0686),
    ("gothenburg", 57.7089, 11.9746),
    ("malmo", 55.6050, 13.0038),
    ("oslo", 59.9139, 10.7522),
    ("copenhagen", 55.6761, 12.5683),
    ("helsinki", 60.1699, 24.9384),
    ("london", 51.5074, -0.1278),
    ("paris", 48.8566, 2.3522),
    ("berlin", 52.5200, 13.4050),
    ("madrid", 40.4168, -3.7038),
    ("rome", 41.9028, 12.4964),
    ("new york", 40.7128, -74.0060),
    ("los angeles", 34.0522, -118.2437),
    ("san francisco", 37.7749, -122.4194),
    ("chicago", 41.8781, -87.6298),
    ("toronto", 43.6532, -79.3832),
    ("tokyo", 35.6762, 139.6503),
    ("beijing", 39.9042, 116.4074),
    ("delhi", 28.6139, 77.2090),
    ("sydney", -33.8688, 151.2093),
];

/// Well-known satellites `(name, NORAD id)`.
pub const KNOWN_SATELLITES: &[(&str, u32)] = &[
    ("international space station", 25544),
    ("space station", 25544),
    ("iss", 25544),
    ("hubble", 20580),
    ("hst", 20580),
    ("tiangong", 48274),
    ("css", 48274),
    ("noaa 19", 33591),
    ("terra", 25994),
    ("aqua", 27424),
    ("landsat 8", 39084),
    ("landsat 9", 49260),
    ("sentinel-2a", 40697),
];

/// Parameters resolved from a natural-language request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NlqParams {
    /// NORAD id of the satellite.
    pub norad_id: u32,
    /// Observer latitude.
    pub obs_lat: f64,
    /// Observer longitude.
    pub obs_lng: f64,
    /// Observer altitude in meters.
    pub obs_alt: f64,
    /// Seconds of positions to fetch, clamped to `1..=3600`.
    pub seconds: u32,
    /// Satellite name, when one was mentioned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub satellite_name: Option<String>,
    /// Observer city, when one was geocoded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}

/// Asks the model for tracking parameters and resolves its answer.
pub async fn translate(completer: &dyn Completer, query: &str) -> Result<NlqParams> {
    let query = query.trim();
    if query.is_empty() {
        return Err(RagError::InvalidRequest(
            "query text must not be empty".into(),
        ));
    }
    let messages = vec![
        ChatMessage::system(NLQ_SYSTEM_PROMPT),
        ChatMessage::user(query),
    ];
    let raw = completer.complete(&messages).await?;
    resolve(&raw, query)
}

/// Turns raw model output into parameters, filling gaps from the query.
///
/// Values the model supplied are used as-is; the lookup tables and duration
/// parsing only fill in what it left out.
pub fn resolve(raw: &str, query: &str) -> Result<NlqParams> {
    let fields = parse_object(raw)?;
    let query_lower = query.to_lowercase();

    let satellite_name = string_field(&fields, "satellite");
    let norad_id = u32_field(&fields, "norad_id")
        .or_else(|| satellite_name.as_deref().and_then(lookup_satellite))
        .or_else(|| find_known(&query_lower, KNOWN_SATELLITES).map(|(_, id)| *id))
        .ok_or_else(|| parse_error("could not determine a NORAD id", raw))?;

    let model_city = string_field(&fields, "city");
    let (obs_lat, obs_lng, city) =
        match (f64_field(&fields, "obs_lat"), f64_field(&fields, "obs_lng")) {
            (Some(lat), Some(lng)) => (lat, lng, model_city),
            _ => {
                let (name, lat, lng) = model_city
                    .as_deref()
                    .and_then(geocode)
                    .or_else(|| find_known(&query_lower, KNOWN_CITIES).copied())
                    .ok_or_else(|| parse_error("could not determine observer coordinates", raw))?;
                (lat, lng, Some(name.to_string()))
            }
        };
    if !(-90.0..=90.0).contains(&obs_lat) || !(-180.0..=180.0).contains(&obs_lng) {
        return Err(parse_error("observer coordinates out of range", raw));
    }

    let obs_alt = f64_field(&fields, "obs_alt").unwrap_or(0.0);
    let seconds = i64_field(&fields, "seconds")
        .or_else(|| duration_in_query(query))
        .map(clamp_seconds)
        .unwrap_or(DEFAULT_SECONDS);

    Ok(NlqParams {
        norad_id,
        obs_lat,
        obs_lng,
        obs_alt,
        seconds,
        satellite_name,
        city,
    })
}

/// Maps non-positive values to the default and caps large ones.
pub fn clamp_seconds(seconds: i64) -> u32 {
    if seconds <= 0 {
        DEFAULT_SECONDS
    } else if seconds > i64::from(MAX_SECONDS) {
        MAX_SECONDS
    } else {
        seconds as u32
    }
}

/// Coordinates of a city in the fixed table.
pub fn geocode(city: &str) -> Option<(&'static str, f64, f64)> {
    let wanted = city.trim().to_lowercase();
    KNOWN_CITIES
        .iter()
        .find(|(name, _, _)| *name == wanted)
        .copied()
}

fn lookup_satellite(name: &str) -> Option<u32> {
    let wanted = name.trim().to_lowercase();
    KNOWN_SATELLITES
        .iter()
        .find(|(known, _)| *known == wanted)
        .map(|(_, id)| *id)
        .or_else(|| find_known(&wanted, KNOWN_SATELLITES).map(|(_, id)| *id))
}

/// Longest table entry that appears in `haystack` as whole words.
fn find_known<'t, T>(haystack: &str, table: &'t [T]) -> Option<&'t T>
where
    T: TableEntry,
{
    table
        .iter()
        .filter(|entry| contains_words(haystack, entry.key()))
        .max_by_key(|entry| entry.key().len())
}

trait TableEntry {
    fn key(&self) -> &str;
}

impl TableEntry for (&str, u32) {
    fn key(&self) -> &str {
        self.0
    }
}

impl TableEntry for (&str, f64, f64) {
    fn key(&self) -> &str {
        self.0
    }
}

fn contains_words(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(start, _)| {
        let end = start + needle.len();
        let before = haystack[..start].chars().next_back();
        let after = haystack[end..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

fn duration_in_query(query: &str) -> Option<i64> {
    static DURATION: OnceLock<Regex> = OnceLock::new();
    let re = DURATION.get_or_init(|| {
        Regex::new(r"(?i)(-?\d+)\s*(seconds?|secs?|s|minutes?|mins?|m|hours?|hrs?|h)\b")
            .expect("duration regex")
    });
    let caps = re.captures(query)?;
    let value: i64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = caps.get(2)?.as_str().to_lowercase();
    let factor = if unit.starts_with('h') {
        3600
    } else if unit.starts_with('m') {
        60
    } else {
        1
    };
    Some(value.saturating_mul(factor))
}

fn parse_object(raw: &str) -> Result<Map<String, Value>> {
    let body = strip_fences(raw);
    let start = body.find('{');
    let end = body.rfind('}');
    let candidate = match (start, end) {
        (Some(start), Some(end)) if start < end => &body[start..=end],
        _ => return Err(parse_error("model output is not a JSON object", raw)),
    };
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(parse_error("model output is not a JSON object", raw)),
        Err(err) => Err(parse_error(&format!("model output is not valid JSON: {err}"), raw)),
    }
}

fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    rest.trim_end().trim_end_matches("```").trim()
}

fn parse_error(message: &str, raw: &str) -> RagError {
    RagError::Parse {
        message: message.to_string(),
        raw: raw.to_string(),
    }
}

fn string_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn f64_field(fields: &Map<String, Value>, key: &str) -> Option<f64> {
    match fields.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn i64_field(fields: &Map<String, Value>, key: &str) -> Option<i64> {
    match fields.get(key)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn u32_field(fields: &Map<String, Value>, key: &str) -> Option<u32> {
    i64_field(fields, key)
        .filter(|v| *v > 0)
        .and_then(|v| u32::try_from(v).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn long_durations_are_capped() {
        let raw = r#"{"norad_id": 25544, "city": "Stockholm", "seconds": 10000}"#;
        let params = resolve(raw, "Track ISS for 10000 seconds").unwrap();
        assert_eq!(params.seconds, 3600);
    }

    #[test]
    fn model_city_is_geocoded() {
        let raw = r#"{"norad_id": 25544, "city": "Stockholm"}"#;
        let params = resolve(raw, "track it from home").unwrap();
        assert!((params.obs_lat - 59.3293).abs() < 1e-9);
        assert!((params.obs_lng - 18.0686).abs() < 1e-9);
    }

    #[test]
    fn query_duration_is_used_when_model_omits_it() {
        let raw = r#"{"satellite": "ISS", "city": "Stockholm", "seconds": null}"#;
        let params = resolve(raw, "Track ISS for 10000 seconds over Stockholm").unwrap();
        assert_eq!(params.seconds, 3600);
        assert_eq!(params.norad_id, 25544);
    }

    #[test]
    fn missing_duration_defaults_to_sixty() {
        let raw = r#"{"satellite": "ISS", "city": "Stockholm"}"#;
        let params = resolve(raw, "Where is the ISS above Stockholm?").unwrap();
        assert_eq!(params.seconds, 60);
    }

    #[test]
    fn non_positive_seconds_become_default() {
        assert_eq!(clamp_seconds(0), 60);
        assert_eq!(clamp_seconds(-5), 60);
        assert_eq!(clamp_seconds(3600), 3600);
        assert_eq!(clamp_seconds(3601), 3600);
        assert_eq!(clamp_seconds(120), 120);
    }

    #[test]
    fn minutes_are_converted() {
        assert_eq!(duration_in_query("follow hubble for 5 minutes"), Some(300));
        assert_eq!(duration_in_query("track 5 satellites"), None);
    }

    #[test]
    fn stockholm_geocodes_deterministically() {
        let raw = r#"{"satellite": "Hubble", "obs_lat": null, "obs_lng": null}"#;
        let params = resolve(raw, "Show Hubble from Stockholm").unwrap();
        assert!((params.obs_lat - 59.33).abs() < 0.01);
        assert!((params.obs_lng - 18.06).abs() < 0.01);
        assert_eq!(params.city.as_deref(), Some("stockholm"));
        assert_eq!(params.norad_id, 20580);
    }

    #[test]
    fn explicit_coordinates_are_kept_without_a_known_city() {
        let raw = "```json\n{\"norad_id\": \"33591\", \"obs_lat\": 10.5, \"obs_lng\": -20.25, \"obs_alt\": 100}\n```";
        let params = resolve(raw, "NOAA 19 over my boat").unwrap();
        assert_eq!(
            params,
            NlqParams {
                norad_id: 33591,
                obs_lat: 10.5,
                obs_lng: -20.25,
                obs_alt: 100.0,
                seconds: 60,
                satellite_name: None,
                city: None,
            }
        );
    }

    #[test]
    fn invalid_json_keeps_raw_output() {
        let err = resolve("sure! the ISS is great", "track ISS").unwrap_err();
        match err {
            RagError::Parse { raw, .. } => assert_eq!(raw, "sure! the ISS is great"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn missing_coordinates_is_a_parse_error() {
        let err = resolve(r#"{"norad_id": 25544}"#, "track the iss").unwrap_err();
        assert!(matches!(err, RagError::Parse { .. }));
    }

    #[test]
    fn word_matching_ignores_substrings() {
        assert!(!contains_words("mission control", "iss"));
        assert!(contains_words("where is the iss?", "iss"));
        assert_eq!(
            find_known("the international space station", KNOWN_SATELLITES).map(|e| e.0),
            Some("international space station")
        );
    }
}
