// frontend/src/emergency.rs
//
// EmergencyDispatcher: turns a detected emergency into exactly one alert
// carrying the freshest available fix. Owns the single pending-alert slot.
//
//   Idle ──detect(fix)──▶ Sending ──ok──▶ Idle
//    │                       │
//    └─detect(no fix)─▶ AwaitingLocation ─fix─▶ Sending
//                            ▲                   │
//                            └── retry (no fix)  └─fail─▶ Idle + retryable
//
// A detection during Sending is held and sent once the attempt settles.

use crate::api::ChatBackend;
use crate::error::{AlertDeliveryError, LocationError};
use crate::geolocation::Geolocator;
use crate::location::LocationTracker;
use crate::ui::AlertUi;
use chrono::Utc;
use futures::future::LocalBoxFuture;
use futures::FutureExt;
use safeindy_shared::{ClientMetadata, EmergencyAlertRequest, EmergencyAlertResponse};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct PendingAlert {
    pub original_message: String,
    /// Backend payload that triggered detection, forwarded verbatim.
    pub detection_context: Value,
    /// Number of send attempts dispatched so far.
    pub attempt_count: u32,
}

impl PendingAlert {
    pub fn new(original_message: impl Into<String>, detection_context: Value) -> Self {
        Self {
            original_message: original_message.into(),
            detection_context,
            attempt_count: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    AwaitingLocation,
    Sending,
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DispatchState::Idle => "idle",
            DispatchState::AwaitingLocation => "awaiting location",
            DispatchState::Sending => "sending",
        })
    }
}

/// What a dispatcher call ended up doing.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Delivered,
    DeliveryFailed(AlertDeliveryError),
    /// The alert stays pending until a fix arrives.
    LocationUnavailable(LocationError),
    /// Folded into the alert already waiting on a running location request.
    Coalesced,
    /// Held until the alert in flight settles, then sent.
    Queued,
    /// A location request for the pending alert is already running.
    Locating,
    AlreadySending,
    NothingPending,
    /// The send finished after the dispatcher had moved on.
    Superseded,
}

enum Phase {
    Idle {
        retryable: Option<PendingAlert>,
    },
    AwaitingLocation {
        pending: PendingAlert,
        /// A location request on behalf of this alert is running.
        locating: bool,
    },
    Sending {
        in_flight: PendingAlert,
        attempt_id: u64,
        /// Latest detection that arrived during the send.
        queued: Option<PendingAlert>,
    },
}

impl Default for Phase {
    fn default() -> Self {
        Phase::Idle { retryable: None }
    }
}

impl Phase {
    fn state(&self) -> DispatchState {
        match self {
            Phase::Idle { .. } => DispatchState::Idle,
            Phase::AwaitingLocation { .. } => DispatchState::AwaitingLocation,
            Phase::Sending { .. } => DispatchState::Sending,
        }
    }
}

/// Handed to the UI with a failure notice. Consumed by the retry click.
pub struct RetryHandle {
    attempt_count: u32,
    retry: Box<dyn FnOnce() -> LocalBoxFuture<'static, DispatchOutcome>>,
}

impl RetryHandle {
    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    pub async fn retry(self) -> DispatchOutcome {
        (self.retry)().await
    }
}

impl fmt::Debug for RetryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryHandle")
            .field("attempt_count", &self.attempt_count)
            .finish_non_exhaustive()
    }
}

pub struct EmergencyDispatcher<G, B> {
    inner: Rc<DispatcherInner<G, B>>,
}

impl<G, B> Clone for EmergencyDispatcher<G, B> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct DispatcherInner<G, B> {
    tracker: LocationTracker<G>,
    backend: Rc<B>,
    ui: Rc<dyn AlertUi>,
    client: ClientMetadata,
    phase: RefCell<Phase>,
    next_attempt_id: Cell<u64>,
}

enum Step {
    Send(EmergencyAlertRequest, u64),
    Locate,
    Done(DispatchOutcome),
}

fn delivery_result(reply: EmergencyAlertResponse) -> Result<(), AlertDeliveryError> {
    if reply.success {
        return Ok(());
    }
    Err(AlertDeliveryError::ServerRejected(
        reply
            .error
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| "Unknown error".to_string()),
    ))
}

impl<G, B> EmergencyDispatcher<G, B>
where
    G: Geolocator + 'static,
    B: ChatBackend + 'static,
{
    pub fn new(tracker: LocationTracker<G>, backend: Rc<B>, ui: Rc<dyn AlertUi>, client: ClientMetadata) -> Self {
        Self {
            inner: Rc::new(DispatcherInner {
                tracker,
                backend,
                ui,
                client,
                phase: RefCell::new(Phase::default()),
                next_attempt_id: Cell::new(0),
            }),
        }
    }

    pub fn state(&self) -> DispatchState {
        self.inner.phase.borrow().state()
    }

    /// The alert waiting on a fix, on a retry, or on the send in flight.
    /// The in-flight alert itself is never reported: the slot is cleared the
    /// moment an attempt is dispatched.
    pub fn pending_alert(&self) -> Option<PendingAlert> {
        match &*self.inner.phase.borrow() {
            Phase::Idle { retryable } => retryable.clone(),
            Phase::AwaitingLocation { pending, .. } => Some(pending.clone()),
            Phase::Sending { queued, .. } => queued.clone(),
        }
    }

    /// Attempts dispatched for the live alert, pending or in flight.
    pub fn attempt_count(&self) -> Option<u32> {
        match &*self.inner.phase.borrow() {
            Phase::Idle { retryable } => retryable.as_ref().map(|a| a.attempt_count),
            Phase::AwaitingLocation { pending, .. } => Some(pending.attempt_count),
            Phase::Sending { in_flight, .. } => Some(in_flight.attempt_count),
        }
    }

    pub fn has_pending(&self) -> bool {
        self.state() != DispatchState::Idle || self.pending_alert().is_some()
    }

    #[tracing::instrument(skip_all, fields(state = %self.state()))]
    pub async fn on_emergency_detected(&self, message: impl Into<String>, detection_context: Value) -> DispatchOutcome {
        let location_shared = self.inner.tracker.current_fix().is_some();
        self.inner.ui.render_emergency_banner(location_shared);

        let alert = PendingAlert::new(message, detection_context);
        let step = {
            let mut phase = self.inner.phase.borrow_mut();
            match std::mem::take(&mut *phase) {
                Phase::Sending {
                    in_flight,
                    attempt_id,
                    queued,
                } => {
                    if queued.is_some() {
                        debug!("queued detection replaced by a newer one");
                    }
                    *phase = Phase::Sending {
                        in_flight,
                        attempt_id,
                        queued: Some(alert),
                    };
                    Step::Done(DispatchOutcome::Queued)
                }
                Phase::AwaitingLocation { pending, locating } => {
                    *phase = Phase::AwaitingLocation {
                        pending: PendingAlert {
                            attempt_count: pending.attempt_count,
                            ..alert
                        },
                        locating,
                    };
                    if locating {
                        Step::Done(DispatchOutcome::Coalesced)
                    } else {
                        Step::Locate
                    }
                }
                Phase::Idle { retryable } => {
                    if retryable.is_some() {
                        info!("new detection replaces the unsent alert");
                    }
                    self.begin_send(&mut phase, alert)
                }
            }
        };

        match &step {
            Step::Done(DispatchOutcome::Queued) => {
                info!("emergency detected while an alert is in flight, sending it afterwards")
            }
            Step::Done(_) => info!("emergency detected while locating, pending alert updated"),
            Step::Locate => info!("no location yet, alert deferred until a fix arrives"),
            Step::Send(..) => {}
        }
        self.drive(step).await
    }

    /// Re-send the alert left over from a failed attempt. A no-op when there
    /// is nothing to retry.
    #[tracing::instrument(skip_all, fields(state = %self.state()))]
    pub async fn retry(&self) -> DispatchOutcome {
        let step = {
            let mut phase = self.inner.phase.borrow_mut();
            match std::mem::take(&mut *phase) {
                Phase::Idle { retryable: Some(alert) } => self.begin_send(&mut phase, alert),
                Phase::Idle { retryable: None } => Step::Done(DispatchOutcome::NothingPending),
                Phase::AwaitingLocation { pending, locating } => {
                    *phase = Phase::AwaitingLocation { pending, locating };
                    if locating {
                        Step::Done(DispatchOutcome::Locating)
                    } else {
                        Step::Locate
                    }
                }
                sending @ Phase::Sending { .. } => {
                    *phase = sending;
                    Step::Done(DispatchOutcome::AlreadySending)
                }
            }
        };

        if let Step::Done(outcome) = &step {
            info!(?outcome, "retry had nothing to send");
        }
        self.drive(step).await
    }

    /// Continue an alert that was waiting for a fix. Called after a
    /// location request made outside the dispatcher succeeds.
    pub async fn resume_pending(&self) -> DispatchOutcome {
        let step = self.resume_step();
        self.drive(step).await
    }

    fn resume_step(&self) -> Step {
        let mut phase = self.inner.phase.borrow_mut();
        match std::mem::take(&mut *phase) {
            Phase::AwaitingLocation { pending, .. } => self.begin_send(&mut phase, pending),
            other => {
                let outcome = match other.state() {
                    DispatchState::Sending => DispatchOutcome::AlreadySending,
                    _ => DispatchOutcome::NothingPending,
                };
                *phase = other;
                Step::Done(outcome)
            }
        }
    }

    /// Moves to `Sending` with the request built from the current fix, or
    /// parks the alert in `AwaitingLocation` when there is none.
    fn begin_send(&self, phase: &mut Phase, mut alert: PendingAlert) -> Step {
        let Some(location) = self.inner.tracker.current_fix() else {
            *phase = Phase::AwaitingLocation {
                pending: alert,
                locating: false,
            };
            return Step::Locate;
        };

        alert.attempt_count += 1;
        let request = EmergencyAlertRequest {
            message: alert.original_message.clone(),
            location,
            response_data: alert.detection_context.clone(),
            timestamp: Utc::now(),
            client: self.inner.client.clone(),
        };

        let attempt_id = self.inner.next_attempt_id.get() + 1;
        self.inner.next_attempt_id.set(attempt_id);
        *phase = Phase::Sending {
            in_flight: alert,
            attempt_id,
            queued: None,
        };
        Step::Send(request, attempt_id)
    }

    /// Runs a step to completion, then any detection queued behind it. The
    /// first step's outcome is the one reported.
    async fn drive(&self, mut step: Step) -> DispatchOutcome {
        let mut reported = None;
        loop {
            let (outcome, next) = match step {
                Step::Done(outcome) => (outcome, None),
                Step::Send(request, attempt_id) => self.finish_send(request, attempt_id).await,
                Step::Locate => match self.locate().await {
                    Ok(()) => {
                        step = self.resume_step();
                        continue;
                    }
                    Err(err) => (DispatchOutcome::LocationUnavailable(err), None),
                },
            };

            if reported.is_none() {
                reported = Some(outcome);
            } else {
                info!(?outcome, "queued detection dispatched");
            }
            match next {
                Some(queued) => step = queued,
                None => break,
            }
        }
        reported.unwrap_or(DispatchOutcome::NothingPending)
    }

    fn set_locating(&self, value: bool) {
        if let Phase::AwaitingLocation { locating, .. } = &mut *self.inner.phase.borrow_mut() {
            *locating = value;
        }
    }

    async fn locate(&self) -> Result<(), LocationError> {
        self.set_locating(true);
        match self.inner.tracker.request_once().await {
            Ok(_) => Ok(()),
            Err(err) => {
                self.set_locating(false);
                warn!(%err, "location unavailable, alert stays pending");
                Err(err)
            }
        }
    }

    /// Settles the attempt and hands back whatever was queued behind it.
    async fn finish_send(&self, request: EmergencyAlertRequest, attempt_id: u64) -> (DispatchOutcome, Option<Step>) {
        info!(
            lat = request.location.latitude,
            lon = request.location.longitude,
            "sending emergency alert"
        );
        let result = match self.inner.backend.send_emergency_alert(&request).await {
            Ok(reply) => delivery_result(reply),
            Err(err) => Err(err.into()),
        };

        let settled = {
            let mut phase = self.inner.phase.borrow_mut();
            match std::mem::take(&mut *phase) {
                Phase::Sending {
                    in_flight,
                    attempt_id: current,
                    queued,
                } if current == attempt_id => {
                    let attempts = in_flight.attempt_count;
                    *phase = Phase::Idle {
                        retryable: result.is_err().then_some(in_flight),
                    };
                    let next = queued.map(|alert| self.begin_send(&mut phase, alert));
                    Some((attempts, next))
                }
                other => {
                    *phase = other;
                    None
                }
            }
        };

        let Some((attempts, next)) = settled else {
            warn!(attempt_id, "alert result arrived after the dispatcher moved on, ignored");
            return (DispatchOutcome::Superseded, None);
        };

        let outcome = match result {
            Ok(()) => {
                info!(attempts, "emergency alert delivered");
                self.inner.ui.render_alert_confirmation();
                DispatchOutcome::Delivered
            }
            Err(err) => {
                error!(%err, attempts, "emergency alert failed");
                self.inner.ui.render_alert_failure(&err, self.retry_handle(attempts));
                DispatchOutcome::DeliveryFailed(err)
            }
        };
        (outcome, next)
    }

    fn retry_handle(&self, attempt_count: u32) -> RetryHandle {
        let dispatcher = self.clone();
        RetryHandle {
            attempt_count,
            retry: Box::new(move || async move { dispatcher.retry().await }.boxed_local()),
        }
    }
}
