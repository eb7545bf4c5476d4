// frontend/src/location.rs
//
// LocationTracker: owns the single current-fix slot and the watch
// subscription. Every write to the slot goes through `TrackerInner::record`
// so watch deliveries and manual requests cannot interleave partial updates.

use crate::config::LocationSettings;
use crate::error::LocationError;
use crate::geocode::ReverseGeocoder;
use crate::geolocation::{Geolocator, RawPosition};
use crate::task;
use crate::ui::{AlertUi, LocationBannerState};
use chrono::{DateTime, TimeDelta, Utc};
use futures::future::{select, AbortHandle, Abortable, Either};
use futures::StreamExt;
use safeindy_shared::LocationFix;
use std::cell::RefCell;
use std::pin::pin;
use std::rc::{Rc, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Extra time granted on top of the host timeout before we give up on a
/// host that never calls back.
const REQUEST_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FixOrigin {
    Request,
    Watch,
}

/// Watch deliveries replace the stored fix only when strictly newer and
/// further away than the movement threshold.
pub fn should_replace(current: &LocationFix, candidate: &LocationFix, threshold_km: f64) -> bool {
    candidate.captured_at > current.captured_at && current.distance_km(candidate) > threshold_km
}

pub struct LocationTracker<G> {
    inner: Rc<TrackerInner<G>>,
}

impl<G> Clone for LocationTracker<G> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct TrackerInner<G> {
    geolocator: G,
    settings: LocationSettings,
    geocoder: Option<Rc<dyn ReverseGeocoder>>,
    ui: Option<Rc<dyn AlertUi>>,
    state: RefCell<TrackerState>,
}

#[derive(Default)]
struct TrackerState {
    fix: Option<LocationFix>,
    watch: Option<AbortHandle>,
}

impl<G> Drop for TrackerInner<G> {
    fn drop(&mut self) {
        if let Some(watch) = self.state.get_mut().watch.take() {
            watch.abort();
        }
    }
}

impl<G: Geolocator + 'static> TrackerInner<G> {
    fn banner(&self, state: &LocationBannerState) {
        if let Some(ui) = &self.ui {
            ui.render_location_banner(state);
        }
    }

    fn record(&self, candidate: LocationFix, origin: FixOrigin) -> bool {
        let mut state = self.state.borrow_mut();
        let replace = match (&state.fix, origin) {
            (None, _) => true,
            (Some(_), FixOrigin::Request) => true,
            (Some(current), FixOrigin::Watch) => {
                should_replace(current, &candidate, self.settings.movement_threshold_km)
            }
        };
        if replace {
            state.fix = Some(candidate);
        }
        replace
    }

    fn apply_watch_update(self: &Rc<Self>, position: RawPosition) -> bool {
        let fix = position.into_fix();
        if !self.record(fix.clone(), FixOrigin::Watch) {
            debug!(lat = fix.latitude, lon = fix.longitude, "watch update within threshold, ignored");
            return false;
        }
        info!(
            lat = fix.latitude,
            lon = fix.longitude,
            accuracy = fix.accuracy_meters,
            "location updated"
        );
        self.banner(&LocationBannerState::Acquired {
            accuracy_meters: fix.accuracy_meters,
        });
        self.resolve_address(&fix);
        true
    }

    /// Best effort; the label lands on the fix only if it is still current.
    fn resolve_address(self: &Rc<Self>, fix: &LocationFix) {
        let Some(geocoder) = self.geocoder.clone() else {
            return;
        };
        let weak: Weak<Self> = Rc::downgrade(self);
        let fix = fix.clone();

        task::spawn_local(async move {
            match geocoder.reverse(fix.latitude, fix.longitude).await {
                Ok(Some(address)) => {
                    if let Some(inner) = weak.upgrade() {
                        inner.attach_address(&fix, address);
                    }
                }
                Ok(None) => debug!("reverse geocoding returned no usable label"),
                Err(err) => debug!(%err, "reverse geocoding failed"),
            }
        });
    }

    fn attach_address(&self, fix: &LocationFix, address: String) -> bool {
        let attached = {
            let mut state = self.state.borrow_mut();
            match state.fix.as_mut() {
                Some(current) if current.same_measurement(fix) => {
                    *current = current.with_address(address.clone());
                    true
                }
                _ => false,
            }
        };
        if attached {
            debug!(%address, "address attached to current fix");
            self.banner(&LocationBannerState::Resolved { address });
        }
        attached
    }
}

impl<G: Geolocator + 'static> LocationTracker<G> {
    pub fn new(geolocator: G, settings: LocationSettings) -> Self {
        Self::with_collaborators(geolocator, settings, None, None)
    }

    pub fn with_collaborators(
        geolocator: G,
        settings: LocationSettings,
        geocoder: Option<Rc<dyn ReverseGeocoder>>,
        ui: Option<Rc<dyn AlertUi>>,
    ) -> Self {
        Self {
            inner: Rc::new(TrackerInner {
                geolocator,
                settings,
                geocoder,
                ui,
                state: RefCell::new(TrackerState::default()),
            }),
        }
    }

    pub fn settings(&self) -> &LocationSettings {
        &self.inner.settings
    }

    pub fn is_supported(&self) -> bool {
        self.inner.geolocator.is_supported()
    }

    pub fn current_fix(&self) -> Option<LocationFix> {
        self.inner.state.borrow().fix.clone()
    }

    pub fn is_watching(&self) -> bool {
        self.inner.state.borrow().watch.is_some()
    }

    pub fn is_stale(&self, threshold_minutes: i64) -> bool {
        self.is_stale_at(threshold_minutes, Utc::now())
    }

    pub fn is_stale_at(&self, threshold_minutes: i64, now: DateTime<Utc>) -> bool {
        match &self.inner.state.borrow().fix {
            None => true,
            // a window too wide for TimeDelta never expires
            Some(fix) => TimeDelta::try_minutes(threshold_minutes)
                .is_some_and(|limit| now.signed_duration_since(fix.captured_at) > limit),
        }
    }

    /// One-shot acquisition. A fresh manual fix always replaces the stored one.
    #[tracing::instrument(skip(self))]
    pub async fn request_once(&self) -> Result<LocationFix, LocationError> {
        let inner = &self.inner;
        if !inner.geolocator.is_supported() {
            warn!("geolocation is not supported on this host");
            inner.banner(&LocationBannerState::Failed(LocationError::Unsupported));
            return Err(LocationError::Unsupported);
        }

        inner.banner(&LocationBannerState::Acquiring);
        let options = inner.settings.one_shot_options();

        let lookup = pin!(inner.geolocator.current_position(&options));
        let deadline = pin!(task::sleep(options.timeout + REQUEST_GRACE));
        let result = match select(lookup, deadline).await {
            Either::Left((result, _)) => result,
            Either::Right(_) => {
                warn!("host never answered the location request");
                Err(LocationError::Timeout)
            }
        };

        match result {
            Ok(position) => {
                let fix = position.into_fix();
                inner.record(fix.clone(), FixOrigin::Request);
                info!(
                    lat = fix.latitude,
                    lon = fix.longitude,
                    accuracy = fix.accuracy_meters,
                    "location obtained"
                );
                inner.banner(&LocationBannerState::Acquired {
                    accuracy_meters: fix.accuracy_meters,
                });
                inner.resolve_address(&fix);
                Ok(fix)
            }
            Err(err) => {
                warn!(%err, "location request failed");
                inner.banner(&LocationBannerState::Failed(err));
                Err(err)
            }
        }
    }

    /// Idempotent; deliveries are applied in order by a local task.
    pub fn start_watching(&self) -> Result<(), LocationError> {
        if self.is_watching() {
            return Ok(());
        }
        if !self.inner.geolocator.is_supported() {
            return Err(LocationError::Unsupported);
        }

        let mut updates = self
            .inner
            .geolocator
            .watch_position(&self.inner.settings.watch_options())?;
        let (handle, registration) = AbortHandle::new_pair();
        let weak = Rc::downgrade(&self.inner);

        let consume = async move {
            while let Some(update) = updates.next().await {
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                match update {
                    Ok(position) => {
                        inner.apply_watch_update(position);
                    }
                    Err(err) => warn!(%err, "location watch error"),
                }
            }
        };
        task::spawn_local(async move {
            let _ = Abortable::new(consume, registration).await;
        });

        self.inner.state.borrow_mut().watch = Some(handle);
        info!("location watch started");
        Ok(())
    }

    pub fn stop_watching(&self) {
        let handle = self.inner.state.borrow_mut().watch.take();
        if let Some(handle) = handle {
            handle.abort();
            info!("location watch stopped");
        }
    }

    /// Re-acquire silently when an existing fix has gone stale. Never
    /// prompts a user who has not shared a location yet.
    pub async fn refresh_if_stale(&self) -> Option<Result<LocationFix, LocationError>> {
        let threshold = self.inner.settings.stale_after_minutes;
        if self.current_fix().is_none() || !self.is_stale(threshold) {
            return None;
        }
        info!(threshold_minutes = threshold, "location is stale, requesting update");
        Some(self.request_once().await)
    }

    /// After the prompt delay, show the "share your location" banner if
    /// nothing has been acquired in the meantime.
    pub async fn prompt_if_unlocated(&self) -> bool {
        if !self.is_supported() {
            return false;
        }
        task::sleep(self.inner.settings.prompt_delay()).await;
        if self.current_fix().is_some() {
            return false;
        }
        self.inner.banner(&LocationBannerState::Prompt);
        true
    }
}
