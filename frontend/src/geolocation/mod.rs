// frontend/src/geolocation/mod.rs
//
// Host positioning capability. One trait, one backend per platform:
// - wasm32: the browser's `navigator.geolocation`
// - native: a simulated receiver fed from config (no device GPS here)

use crate::error::LocationError;
use chrono::{DateTime, Utc};
use futures::Stream;
use safeindy_shared::LocationFix;
use std::time::Duration;

#[cfg(target_arch = "wasm32")]
mod browser;
#[cfg(not(target_arch = "wasm32"))]
mod simulated;

#[cfg(target_arch = "wasm32")]
pub use browser::{BrowserGeolocator, BrowserWatch};
#[cfg(not(target_arch = "wasm32"))]
pub use simulated::SimulatedGeolocator;

#[cfg(target_arch = "wasm32")]
pub type PlatformGeolocator = BrowserGeolocator;
#[cfg(not(target_arch = "wasm32"))]
pub type PlatformGeolocator = SimulatedGeolocator;

/// Options handed to the host, mirroring `PositionOptions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeoOptions {
    pub high_accuracy: bool,
    pub timeout: Duration,
    pub maximum_age: Duration,
}

/// A position as delivered by the host, before it becomes a [`LocationFix`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawPosition {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f64,
    pub timestamp: DateTime<Utc>,
}

impl RawPosition {
    pub fn into_fix(self) -> LocationFix {
        LocationFix::new(self.latitude, self.longitude, self.accuracy, self.timestamp)
    }
}

#[allow(async_fn_in_trait)]
pub trait Geolocator {
    /// Continuous updates; dropping the stream ends the host subscription.
    type Watch: Stream<Item = Result<RawPosition, LocationError>> + Unpin + 'static;

    fn is_supported(&self) -> bool;

    async fn current_position(&self, options: &GeoOptions) -> Result<RawPosition, LocationError>;

    fn watch_position(&self, options: &GeoOptions) -> Result<Self::Watch, LocationError>;
}

pub fn platform_geolocator(config: &crate::config::ClientConfig) -> PlatformGeolocator {
    #[cfg(target_arch = "wasm32")]
    {
        let _ = config;
        BrowserGeolocator
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        SimulatedGeolocator::new(config.simulated_fix)
    }
}
