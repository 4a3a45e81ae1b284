//! Request location and reverse geocoding

use crate::config::{DefaultLocation, GeocoderConfig};
use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;
use wildwatch_core::{Error, GeoPoint, Result};

/// Turns coordinates into a human-readable place
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// A description of `point`, or `None` if it could not be resolved
    async fn reverse(&self, point: GeoPoint) -> Option<String>;

    fn name(&self) -> &str;
}

/// Geocoder that never resolves anything
pub struct NoopGeocoder;

#[async_trait]
impl Geocoder for NoopGeocoder {
    async fn reverse(&self, _point: GeoPoint) -> Option<String> {
        None
    }

    fn name(&self) -> &str {
        "none"
    }
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    display_name: Option<String>,
}

/// OpenStreetMap Nominatim reverse lookups
pub struct NominatimGeocoder {
    client: reqwest::Client,
    url: Url,
    user_agent: String,
    language: String,
    timeout: Duration,
}

impl NominatimGeocoder {
    pub fn new(config: &GeocoderConfig, client: reqwest::Client, timeout: Duration) -> Result<Self> {
        let url = Url::parse(&config.url)
            .map_err(|e| Error::config(format!("invalid geocoder url {}: {}", config.url, e)))?;

        Ok(Self {
            client,
            url,
            user_agent: config.user_agent.clone(),
            language: config.language.clone(),
            timeout,
        })
    }

    fn request_url(&self, point: GeoPoint) -> Url {
        let mut url = self.url.clone();
        url.query_pairs_mut()
            .append_pair("lat", &point.latitude.to_string())
            .append_pair("lon", &point.longitude.to_string())
            .append_pair("format", "jsonv2")
            .append_pair("accept-language", &self.language);
        url
    }

    async fn lookup(&self, point: GeoPoint) -> Result<Option<String>> {
        let response = self
            .client
            .get(self.request_url(point))
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::transport(format!("geocoder request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::transport(format!(
                "geocoder returned {}",
                response.status()
            )));
        }

        let place: NominatimPlace = response
            .json()
            .await
            .map_err(|e| Error::transport(format!("geocoder reply unreadable: {}", e)))?;
        Ok(place.display_name.filter(|name| !name.is_empty()))
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn reverse(&self, point: GeoPoint) -> Option<String> {
        match self.lookup(point).await {
            Ok(place) => {
                debug!(
                    "Reverse geocoded {},{}: {:?}",
                    point.latitude, point.longitude, place
                );
                place
            }
            Err(e) => {
                warn!("Error getting location description: {}", e);
                None
            }
        }
    }

    fn name(&self) -> &str {
        "nominatim"
    }
}

/// Coordinates for a request: the supplied pair when both are present,
/// otherwise the configured default nudged by a random offset
pub fn resolve_location(
    latitude: Option<f64>,
    longitude: Option<f64>,
    fallback: &DefaultLocation,
) -> Result<GeoPoint> {
    match (latitude, longitude) {
        (Some(latitude), Some(longitude)) => {
            if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
                return Err(Error::input(format!(
                    "Coordinates out of range: {}, {}",
                    latitude, longitude
                )));
            }
            Ok(GeoPoint::new(latitude, longitude))
        }
        _ => Ok(jittered(fallback, &mut rand::thread_rng())),
    }
}

/// The default location shifted by one offset drawn from `±jitter`
pub fn jittered(fallback: &DefaultLocation, rng: &mut impl Rng) -> GeoPoint {
    let spread = fallback.jitter.abs();
    let offset = if spread > 0.0 {
        rng.gen_range(-spread..=spread)
    } else {
        0.0
    };
    GeoPoint::new(fallback.latitude + offset, fallback.longitude + offset)
}
