// frontend/src/api.rs

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{join_url, HttpClient};
use safeindy_shared::{
    ChatSendRequest, EmergencyAlertRequest, EmergencyAlertResponse, HistoryResponse, SystemStatus,
};
use serde_json::Value;

pub const CHAT_SEND_PATH: &str = "/chat/send";
pub const EMERGENCY_ALERT_PATH: &str = "/chat/emergency-alert";
pub const CLEAR_PATH: &str = "/chat/clear";
pub const HISTORY_PATH: &str = "/chat/history";
pub const STATUS_PATH: &str = "/api/status";

/// The SafeIndy backend's chat surface.
///
/// `send_chat` hands back the raw JSON because the emergency path forwards
/// it untouched as detection context.
#[allow(async_fn_in_trait)]
pub trait ChatBackend {
    async fn send_chat(&self, request: &ChatSendRequest) -> Result<Value, ApiError>;

    async fn send_emergency_alert(
        &self,
        request: &EmergencyAlertRequest,
    ) -> Result<EmergencyAlertResponse, ApiError>;

    async fn clear_history(&self) -> Result<(), ApiError>;

    async fn history(&self) -> Result<HistoryResponse, ApiError>;

    async fn system_status(&self) -> Result<SystemStatus, ApiError>;
}

#[derive(Debug, Clone)]
pub struct HttpBackend {
    base_url: String,
    http: HttpClient,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, http: HttpClient) -> Self {
        Self {
            base_url: base_url.into(),
            http,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        let http = HttpClient::new(config.request_timeout())?;
        Ok(Self::new(config.resolved_base_url(), http))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }
}

impl ChatBackend for HttpBackend {
    #[tracing::instrument(skip_all, fields(has_location = request.location.is_some()))]
    async fn send_chat(&self, request: &ChatSendRequest) -> Result<Value, ApiError> {
        self.http.post_json(&self.url(CHAT_SEND_PATH), request).await
    }

    #[tracing::instrument(skip_all, fields(session = %request.client.session_id))]
    async fn send_emergency_alert(
        &self,
        request: &EmergencyAlertRequest,
    ) -> Result<EmergencyAlertResponse, ApiError> {
        self.http.post_json(&self.url(EMERGENCY_ALERT_PATH), request).await
    }

    async fn clear_history(&self) -> Result<(), ApiError> {
        let _: Value = self.http.post_empty(&self.url(CLEAR_PATH)).await?;
        Ok(())
    }

    async fn history(&self) -> Result<HistoryResponse, ApiError> {
        self.http.get_json(&self.url(HISTORY_PATH)).await
    }

    async fn system_status(&self) -> Result<SystemStatus, ApiError> {
        self.http.get_json(&self.url(STATUS_PATH)).await
    }
}
