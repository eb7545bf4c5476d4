// frontend/src/geolocation/simulated.rs
//
// Native hosts have no positioning service wired in; a configured fix stands
// in for the device so the terminal driver can exercise the alert path.

use super::{GeoOptions, Geolocator, RawPosition};
use crate::config::SimulatedFix;
use crate::error::LocationError;
use chrono::Utc;
use futures::stream::{self, LocalBoxStream, StreamExt};

#[derive(Debug, Clone, Default)]
pub struct SimulatedGeolocator {
    fix: Option<SimulatedFix>,
}

impl SimulatedGeolocator {
    pub fn new(fix: Option<SimulatedFix>) -> Self {
        Self { fix }
    }

    fn position(fix: &SimulatedFix) -> RawPosition {
        RawPosition {
            latitude: fix.latitude,
            longitude: fix.longitude,
            accuracy: fix.accuracy_meters,
            timestamp: Utc::now(),
        }
    }
}

impl Geolocator for SimulatedGeolocator {
    type Watch = LocalBoxStream<'static, Result<RawPosition, LocationError>>;

    fn is_supported(&self) -> bool {
        self.fix.is_some()
    }

    async fn current_position(&self, _options: &GeoOptions) -> Result<RawPosition, LocationError> {
        self.fix
            .as_ref()
            .map(Self::position)
            .ok_or(LocationError::Unsupported)
    }

    fn watch_position(&self, _options: &GeoOptions) -> Result<Self::Watch, LocationError> {
        let fix = self.fix.ok_or(LocationError::Unsupported)?;
        // one delivery, then the receiver just sits still
        Ok(stream::once(async move { Ok(Self::position(&fix)) })
            .chain(stream::pending())
            .boxed_local())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LocationSettings;

    #[tokio::test]
    async fn unconfigured_simulator_is_unsupported() {
        let geo = SimulatedGeolocator::new(None);
        assert!(!geo.is_supported());
        let opts = LocationSettings::default().one_shot_options();
        assert_eq!(geo.current_position(&opts).await, Err(LocationError::Unsupported));
        assert!(geo.watch_position(&opts).is_err());
    }

    #[tokio::test]
    async fn configured_simulator_serves_its_fix() {
        let geo = SimulatedGeolocator::new(Some(SimulatedFix {
            latitude: 39.77,
            longitude: -86.16,
            accuracy_meters: 15.0,
        }));
        let opts = LocationSettings::default().one_shot_options();
        let pos = geo.current_position(&opts).await.unwrap();
        assert_eq!((pos.latitude, pos.longitude, pos.accuracy), (39.77, -86.16, 15.0));

        let mut watch = geo.watch_position(&opts).unwrap();
        let first = watch.next().await.unwrap().unwrap();
        assert_eq!(first.latitude, 39.77);
    }
}
