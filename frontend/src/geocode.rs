// frontend/src/geocode.rs

use crate::error::ApiError;
use crate::http::HttpClient;
use futures::future::LocalBoxFuture;
use serde::Deserialize;

/// Turns coordinates into a short human-readable label.
pub trait ReverseGeocoder {
    fn reverse(&self, latitude: f64, longitude: f64) -> LocalBoxFuture<'_, Result<Option<String>, ApiError>>;
}

/// Client-side endpoint of BigDataCloud, no key required.
#[derive(Debug, Clone)]
pub struct BigDataCloudGeocoder {
    url: String,
    http: HttpClient,
}

#[derive(Debug, Default, Deserialize)]
struct ReverseGeocodeReply {
    #[serde(default)]
    locality: Option<String>,
    #[serde(default, rename = "principalSubdivision")]
    principal_subdivision: Option<String>,
}

impl ReverseGeocodeReply {
    /// `"{locality}, {region}"`, only when both parts are known.
    fn label(&self) -> Option<String> {
        let locality = self.locality.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        let region = self
            .principal_subdivision
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())?;
        Some(format!("{locality}, {region}"))
    }
}

impl BigDataCloudGeocoder {
    pub fn new(url: impl Into<String>, http: HttpClient) -> Self {
        Self { url: url.into(), http }
    }

    fn lookup_url(&self, latitude: f64, longitude: f64) -> String {
        format!(
            "{}?latitude={latitude}&longitude={longitude}&localityLanguage=en",
            self.url
        )
    }
}

impl ReverseGeocoder for BigDataCloudGeocoder {
    fn reverse(&self, latitude: f64, longitude: f64) -> LocalBoxFuture<'_, Result<Option<String>, ApiError>> {
        let url = self.lookup_url(latitude, longitude);
        Box::pin(async move {
            let reply: ReverseGeocodeReply = self.http.get_json(&url).await?;
            Ok(reply.label())
        })
    }
}
