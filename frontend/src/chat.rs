// frontend/src/chat.rs
//
// ChatSession ties the pieces together the way the page does: chat sends
// carry the current fix, flagged replies go to the dispatcher, and the
// session owns the lifecycle hooks (visibility, unload, shutdown).

use crate::api::ChatBackend;
use crate::emergency::{DispatchOutcome, DispatchState, EmergencyDispatcher};
use crate::error::{ApiError, LocationError};
use crate::geolocation::Geolocator;
use crate::location::LocationTracker;
use crate::ui::AlertUi;
use safeindy_shared::{ChatResponse, ChatSendRequest, ClientMetadata, HistoryResponse, LocationFix};
use serde_json::{json, Value};
use std::fmt;
use std::rc::Rc;
use tracing::{debug, info, warn};

/// A backend reply plus whatever the dispatcher did with it.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub response: ChatResponse,
    pub raw: Value,
    pub emergency: Option<DispatchOutcome>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientStatus {
    pub location_enabled: bool,
    pub pending_emergency: bool,
    pub location_watching: bool,
    pub dispatch_state: DispatchState,
    pub location: Option<LocationFix>,
}

/// Backend health as the status route reports it.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendHealth {
    Healthy,
    /// Reachable, but reporting something other than `healthy`.
    Degraded(String),
    Unreachable(String),
}

impl fmt::Display for BackendHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendHealth::Healthy => f.write_str("healthy"),
            BackendHealth::Degraded(status) => write!(f, "degraded ({status})"),
            BackendHealth::Unreachable(reason) => write!(f, "unreachable ({reason})"),
        }
    }
}

pub struct ChatSession<G, B> {
    tracker: LocationTracker<G>,
    dispatcher: EmergencyDispatcher<G, B>,
    backend: Rc<B>,
}

impl<G, B> ChatSession<G, B>
where
    G: Geolocator + 'static,
    B: ChatBackend + 'static,
{
    pub fn new(tracker: LocationTracker<G>, backend: Rc<B>, ui: Rc<dyn AlertUi>, client: ClientMetadata) -> Self {
        let dispatcher = EmergencyDispatcher::new(tracker.clone(), backend.clone(), ui, client);
        Self {
            tracker,
            dispatcher,
            backend,
        }
    }

    pub fn tracker(&self) -> &LocationTracker<G> {
        &self.tracker
    }

    pub fn dispatcher(&self) -> &EmergencyDispatcher<G, B> {
        &self.dispatcher
    }

    /// Blank input is ignored without touching the network.
    #[tracing::instrument(skip_all)]
    pub async fn send(&self, message: &str) -> Result<Option<ChatReply>, ApiError> {
        let message = message.trim();
        if message.is_empty() {
            return Ok(None);
        }

        let request = ChatSendRequest {
            message: message.to_string(),
            location: self.tracker.current_fix(),
        };
        let raw = self.backend.send_chat(&request).await?;
        let response: ChatResponse = serde_json::from_value(raw.clone()).unwrap_or_else(|err| {
            warn!(%err, "chat reply did not match the expected shape");
            ChatResponse::default()
        });

        let emergency = if response.is_emergency() {
            info!("backend flagged the message as an emergency");
            Some(self.dispatcher.on_emergency_detected(message, raw.clone()).await)
        } else {
            None
        };

        Ok(Some(ChatReply {
            response,
            raw,
            emergency,
        }))
    }

    /// Manual location request. A success also releases an alert that was
    /// waiting for it.
    pub async fn request_location(&self) -> Result<LocationFix, LocationError> {
        let fix = self.tracker.request_once().await?;
        if self.dispatcher.state() == DispatchState::AwaitingLocation {
            let outcome = self.dispatcher.resume_pending().await;
            info!(?outcome, "pending alert continued after manual location request");
        }
        Ok(fix)
    }

    /// Initial acquisition followed by continuous tracking.
    pub async fn start_tracking(&self) -> Result<LocationFix, LocationError> {
        let fix = self.request_location().await?;
        if let Err(err) = self.tracker.start_watching() {
            warn!(%err, "could not start location watch");
        }
        Ok(fix)
    }

    pub async fn retry_alert(&self) -> DispatchOutcome {
        self.dispatcher.retry().await
    }

    /// Fires the alert path with a synthetic context. Needs a fix; without
    /// one a location request is made instead and nothing is sent.
    pub async fn test_emergency(&self, message: &str) -> Option<DispatchOutcome> {
        if self.tracker.current_fix().is_none() {
            warn!("no location available for a test alert");
            if let Err(err) = self.request_location().await {
                debug!(%err, "location request for test alert failed");
            }
            return None;
        }
        let context = json!({"emergency": true, "test": true});
        Some(self.dispatcher.on_emergency_detected(message, context).await)
    }

    pub async fn clear(&self) -> Result<(), ApiError> {
        self.backend.clear_history().await?;
        info!("chat history cleared");
        Ok(())
    }

    pub async fn history(&self) -> Result<HistoryResponse, ApiError> {
        self.backend.history().await
    }

    pub async fn history_transcript(&self) -> Result<String, ApiError> {
        Ok(self.history().await?.transcript())
    }

    pub fn status(&self) -> ClientStatus {
        let location = self.tracker.current_fix();
        ClientStatus {
            location_enabled: location.is_some(),
            pending_emergency: self.dispatcher.has_pending(),
            location_watching: self.tracker.is_watching(),
            dispatch_state: self.dispatcher.state(),
            location,
        }
    }

    pub async fn backend_health(&self) -> BackendHealth {
        match self.backend.system_status().await {
            Ok(status) if status.is_healthy() => {
                debug!("backend healthy");
                BackendHealth::Healthy
            }
            Ok(status) => {
                warn!(status = %status.status, "backend degraded");
                BackendHealth::Degraded(status.status)
            }
            Err(err) => {
                warn!(%err, "backend status check failed");
                BackendHealth::Unreachable(err.to_string())
            }
        }
    }

    pub fn should_warn_before_unload(&self) -> bool {
        self.dispatcher.has_pending()
    }

    pub async fn on_visibility_regained(&self) -> Option<Result<LocationFix, LocationError>> {
        let refreshed = self.tracker.refresh_if_stale().await?;
        if refreshed.is_ok() && self.dispatcher.state() == DispatchState::AwaitingLocation {
            self.dispatcher.resume_pending().await;
        }
        Some(refreshed)
    }

    pub fn shutdown(&self) {
        self.tracker.stop_watching();
        info!("chat session shut down");
    }
}
