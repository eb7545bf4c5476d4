// frontend/src/ui.rs
//
// Outward surface into the rendering layer. The core never builds markup;
// whatever draws banners and notices implements `AlertUi`.

use crate::emergency::RetryHandle;
use crate::error::{AlertDeliveryError, LocationError};

#[derive(Debug, Clone, PartialEq)]
pub enum LocationBannerState {
    /// No fix yet, invite the user to share location.
    Prompt,
    Acquiring,
    Acquired { accuracy_meters: f64 },
    Resolved { address: String },
    /// A manual request failed; offer "Try again".
    Failed(LocationError),
}

pub trait AlertUi {
    /// `location_shared` tells the banner whether the alert already has a
    /// position to go out with.
    fn render_emergency_banner(&self, location_shared: bool);

    fn render_alert_confirmation(&self);

    fn render_alert_failure(&self, error: &AlertDeliveryError, retry: RetryHandle);

    fn render_location_banner(&self, state: &LocationBannerState);
}
