// frontend/src/testing.rs
//
// In-memory stand-ins for the host positioning service, the backend and the
// rendering layer. Test builds only.

use crate::api::ChatBackend;
use crate::emergency::RetryHandle;
use crate::error::{AlertDeliveryError, ApiError, LocationError};
use crate::geolocation::{GeoOptions, Geolocator, RawPosition};
use crate::ui::{AlertUi, LocationBannerState};
use chrono::{DateTime, TimeZone, Utc};
use futures_channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use safeindy_shared::{
    ChatSendRequest, EmergencyAlertRequest, EmergencyAlertResponse, HistoryResponse, SystemStatus,
};
use serde_json::{json, Value};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

pub(crate) type PositionResult = Result<RawPosition, LocationError>;

pub(crate) fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

pub(crate) fn pos(latitude: f64, longitude: f64, accuracy: f64, secs: i64) -> RawPosition {
    RawPosition {
        latitude,
        longitude,
        accuracy,
        timestamp: at(secs),
    }
}

/// Runs `fut` inside a LocalSet so `task::spawn_local` works.
pub(crate) async fn local<F: Future>(fut: F) -> F::Output {
    tokio::task::LocalSet::new().run_until(fut).await
}

/// Lets spawned local tasks drain their ready work.
pub(crate) async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

// ---------------- geolocation ----------------

#[derive(Default)]
struct GeoScript {
    unsupported: Cell<bool>,
    responses: RefCell<VecDeque<(Duration, PositionResult)>>,
    requests: Cell<usize>,
    watch: RefCell<Option<UnboundedReceiver<PositionResult>>>,
    watches_opened: Cell<usize>,
}

/// Answers one-shot requests from a queue; an empty queue means
/// `PositionUnavailable`.
#[derive(Clone, Default)]
pub(crate) struct ScriptedGeolocator {
    script: Rc<GeoScript>,
}

impl ScriptedGeolocator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_supported(&self, supported: bool) {
        self.script.unsupported.set(!supported);
    }

    pub(crate) fn respond(&self, delay: Duration, result: PositionResult) {
        self.script.responses.borrow_mut().push_back((delay, result));
    }

    /// Sender side of the next watch subscription.
    pub(crate) fn watch_feed(&self) -> UnboundedSender<PositionResult> {
        let (tx, rx) = mpsc::unbounded();
        *self.script.watch.borrow_mut() = Some(rx);
        tx
    }

    pub(crate) fn requests(&self) -> usize {
        self.script.requests.get()
    }

    pub(crate) fn watches_opened(&self) -> usize {
        self.script.watches_opened.get()
    }
}

impl Geolocator for ScriptedGeolocator {
    type Watch = UnboundedReceiver<PositionResult>;

    fn is_supported(&self) -> bool {
        !self.script.unsupported.get()
    }

    async fn current_position(&self, _options: &GeoOptions) -> PositionResult {
        self.script.requests.set(self.script.requests.get() + 1);
        let next = self.script.responses.borrow_mut().pop_front();
        match next {
            Some((delay, result)) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                result
            }
            None => Err(LocationError::PositionUnavailable),
        }
    }

    fn watch_position(&self, _options: &GeoOptions) -> Result<Self::Watch, LocationError> {
        self.script.watches_opened.set(self.script.watches_opened.get() + 1);
        self.script
            .watch
            .borrow_mut()
            .take()
            .ok_or(LocationError::PositionUnavailable)
    }
}

// ---------------- backend ----------------

type AlertHook = Box<dyn Fn(&EmergencyAlertRequest)>;

/// Records every request; replies come from queues with a success default.
#[derive(Default)]
pub(crate) struct ScriptedBackend {
    chat_replies: RefCell<VecDeque<Result<Value, ApiError>>>,
    alert_replies: RefCell<VecDeque<Result<EmergencyAlertResponse, ApiError>>>,
    alert_delay: Cell<Duration>,
    on_alert: RefCell<Option<AlertHook>>,
    chats: RefCell<Vec<ChatSendRequest>>,
    alerts: RefCell<Vec<EmergencyAlertRequest>>,
    clears: Cell<usize>,
    history: RefCell<HistoryResponse>,
    status: RefCell<Option<Result<SystemStatus, ApiError>>>,
}

impl ScriptedBackend {
    pub(crate) fn reply_chat(&self, reply: Result<Value, ApiError>) {
        self.chat_replies.borrow_mut().push_back(reply);
    }

    pub(crate) fn reply_alert(&self, reply: Result<EmergencyAlertResponse, ApiError>) {
        self.alert_replies.borrow_mut().push_back(reply);
    }

    pub(crate) fn delay_alerts(&self, delay: Duration) {
        self.alert_delay.set(delay);
    }

    /// Called synchronously as each alert request is received.
    pub(crate) fn on_alert(&self, hook: impl Fn(&EmergencyAlertRequest) + 'static) {
        *self.on_alert.borrow_mut() = Some(Box::new(hook));
    }

    pub(crate) fn set_history(&self, history: HistoryResponse) {
        *self.history.borrow_mut() = history;
    }

    /// Next reply for `/api/status`; healthy when unset.
    pub(crate) fn set_status(&self, status: Result<SystemStatus, ApiError>) {
        *self.status.borrow_mut() = Some(status);
    }

    pub(crate) fn chats(&self) -> Vec<ChatSendRequest> {
        self.chats.borrow().clone()
    }

    pub(crate) fn alerts(&self) -> Vec<EmergencyAlertRequest> {
        self.alerts.borrow().clone()
    }

    pub(crate) fn clears(&self) -> usize {
        self.clears.get()
    }
}

impl ChatBackend for ScriptedBackend {
    async fn send_chat(&self, request: &ChatSendRequest) -> Result<Value, ApiError> {
        self.chats.borrow_mut().push(request.clone());
        let next = self.chat_replies.borrow_mut().pop_front();
        next.unwrap_or_else(|| Ok(json!({"response": "ok"})))
    }

    async fn send_emergency_alert(
        &self,
        request: &EmergencyAlertRequest,
    ) -> Result<EmergencyAlertResponse, ApiError> {
        self.alerts.borrow_mut().push(request.clone());
        if let Some(hook) = self.on_alert.borrow().as_ref() {
            hook(request);
        }

        let delay = self.alert_delay.get();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let next = self.alert_replies.borrow_mut().pop_front();
        next.unwrap_or_else(|| {
            Ok(EmergencyAlertResponse {
                success: true,
                alert_id: Some(json!(1)),
                ..Default::default()
            })
        })
    }

    async fn clear_history(&self) -> Result<(), ApiError> {
        self.clears.set(self.clears.get() + 1);
        Ok(())
    }

    async fn history(&self) -> Result<HistoryResponse, ApiError> {
        Ok(self.history.borrow().clone())
    }

    async fn system_status(&self) -> Result<SystemStatus, ApiError> {
        self.status.borrow_mut().take().unwrap_or_else(|| {
            Ok(SystemStatus {
                status: "healthy".into(),
                ..Default::default()
            })
        })
    }
}

// ---------------- ui ----------------

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum UiEvent {
    EmergencyBanner { location_shared: bool },
    Confirmation,
    Failure(AlertDeliveryError),
    Location(LocationBannerState),
}

#[derive(Default)]
pub(crate) struct RecordingUi {
    events: RefCell<Vec<UiEvent>>,
    retries: RefCell<Vec<RetryHandle>>,
}

impl RecordingUi {
    pub(crate) fn events(&self) -> Vec<UiEvent> {
        self.events.borrow().clone()
    }

    /// Latest retry handle offered with a failure notice.
    pub(crate) fn take_retry(&self) -> Option<RetryHandle> {
        self.retries.borrow_mut().pop()
    }
}

impl AlertUi for RecordingUi {
    fn render_emergency_banner(&self, location_shared: bool) {
        self.events
            .borrow_mut()
            .push(UiEvent::EmergencyBanner { location_shared });
    }

    fn render_alert_confirmation(&self) {
        self.events.borrow_mut().push(UiEvent::Confirmation);
    }

    fn render_alert_failure(&self, error: &AlertDeliveryError, retry: RetryHandle) {
        self.events.borrow_mut().push(UiEvent::Failure(error.clone()));
        self.retries.borrow_mut().push(retry);
    }

    fn render_location_banner(&self, state: &LocationBannerState) {
        self.events.borrow_mut().push(UiEvent::Location(state.clone()));
    }
}
