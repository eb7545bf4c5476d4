// frontend/src/error.rs

use thiserror::Error;

/// Why a position could not be obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("Location access denied by user.")]
    PermissionDenied,
    #[error("Location information unavailable.")]
    PositionUnavailable,
    #[error("Location request timed out.")]
    Timeout,
    #[error("Geolocation is not supported on this device.")]
    Unsupported,
    #[error("Unknown error occurred.")]
    Unknown,
}

impl LocationError {
    /// Map a W3C `GeolocationPositionError.code`.
    pub fn from_code(code: u16) -> Self {
        match code {
            1 => LocationError::PermissionDenied,
            2 => LocationError::PositionUnavailable,
            3 => LocationError::Timeout,
            _ => LocationError::Unknown,
        }
    }
}

/// Why an emergency alert did not reach the backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlertDeliveryError {
    #[error("Network error: {0}")]
    NetworkFailure(String),
    #[error("{0}")]
    ServerRejected(String),
}

/// Failures talking to the SafeIndy backend or the reverse geocoder.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("failed to build HTTP client: {0}")]
    Client(String),
    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },
    #[error("HTTP {status} from {url}: {body}")]
    Status { url: String, status: u16, body: String },
    #[error("invalid response from {url}: {reason}")]
    Decode { url: String, reason: String },
}

impl From<ApiError> for AlertDeliveryError {
    fn from(err: ApiError) -> Self {
        AlertDeliveryError::NetworkFailure(err.to_string())
    }
}
