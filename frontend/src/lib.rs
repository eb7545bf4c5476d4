// frontend/src/lib.rs
//
// SafeIndy client core: location tracking and emergency alert dispatch, with
// the backend client and the host adapters they need. Rendering lives
// outside this crate behind `ui::AlertUi`.

pub mod api;
pub mod chat;
pub mod config;
pub mod emergency;
pub mod error;
pub mod geocode;
pub mod geolocation;
pub mod http;
pub mod location;
pub mod logging;
pub mod task;
pub mod ui;

#[cfg(test)]
mod testing;

pub use api::{ChatBackend, HttpBackend};
pub use chat::{BackendHealth, ChatReply, ChatSession, ClientStatus};
pub use config::{ClientConfig, LocationSettings};
pub use emergency::{DispatchOutcome, DispatchState, EmergencyDispatcher, PendingAlert, RetryHandle};
pub use error::{AlertDeliveryError, ApiError, LocationError};
pub use location::LocationTracker;
pub use ui::{AlertUi, LocationBannerState};

use geocode::{BigDataCloudGeocoder, ReverseGeocoder};
use geolocation::{platform_geolocator, PlatformGeolocator};
use safeindy_shared::ClientMetadata;
use std::rc::Rc;

pub type PlatformSession = ChatSession<PlatformGeolocator, HttpBackend>;

/// Wire a session for this platform: host geolocation, HTTP backend, and
/// reverse geocoding through the same HTTP client.
pub fn session_from_config(config: &ClientConfig, ui: Rc<dyn AlertUi>) -> Result<PlatformSession, ApiError> {
    let backend = HttpBackend::from_config(config)?;
    let geocoder: Rc<dyn ReverseGeocoder> = Rc::new(BigDataCloudGeocoder::new(
        config.geocode_url.clone(),
        backend.http().clone(),
    ));
    let tracker = LocationTracker::with_collaborators(
        platform_geolocator(config),
        config.location.clone(),
        Some(geocoder),
        Some(ui.clone()),
    );
    let client = ClientMetadata {
        user_agent: config.resolved_user_agent(),
        session_id: config.session_id.clone(),
    };
    Ok(ChatSession::new(tracker, Rc::new(backend), ui, client))
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen::prelude::wasm_bindgen(start)]
pub fn start() {
    if let Err(err) = logging::init_logging() {
        web_sys::console::error_1(&err.to_string().into());
    }
}
