use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Mean Earth radius used for great-circle distances, in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
pub enum LocationSource {
    #[serde(rename = "gps")]
    DeviceGps,
}

impl LocationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationSource::DeviceGps => "gps",
        }
    }
}

impl fmt::Display for LocationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single positioning measurement.
///
/// Field names on the wire follow what the SafeIndy backend validates
/// (`lat`, `lng`, `accuracy`, `timestamp`, `source`, `address`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lng")]
    pub longitude: f64,
    #[serde(rename = "accuracy")]
    pub accuracy_meters: f64,
    #[serde(rename = "timestamp")]
    pub captured_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub source: LocationSource,
}

impl LocationFix {
    pub fn new(latitude: f64, longitude: f64, accuracy_meters: f64, captured_at: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            // a negative precision radius is meaningless, hosts occasionally report -1
            accuracy_meters: accuracy_meters.max(0.0),
            captured_at,
            address: None,
            source: LocationSource::DeviceGps,
        }
    }

    /// Copy of this fix carrying a reverse-geocoded label.
    pub fn with_address(&self, address: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
            ..self.clone()
        }
    }

    /// Great-circle (haversine) distance to `other`, in kilometres.
    pub fn distance_km(&self, other: &LocationFix) -> f64 {
        haversine_km(self.latitude, self.longitude, other.latitude, other.longitude)
    }

    /// Same measurement, ignoring any attached address.
    pub fn same_measurement(&self, other: &LocationFix) -> bool {
        self.latitude == other.latitude
            && self.longitude == other.longitude
            && self.captured_at == other.captured_at
    }

    pub fn maps_url(&self) -> String {
        format!(
            "https://www.google.com/maps?q={},{}",
            self.latitude, self.longitude
        )
    }
}

pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin() * (d_lat / 2.0).sin()
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin() * (d_lon / 2.0).sin();

    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// `POST /chat/send`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSendRequest {
    pub message: String,
    // serialized as `null` when absent, the backend checks for it explicitly
    pub location: Option<LocationFix>,
}

/// Typed view over a `/chat/send` reply. The raw JSON is kept alongside it
/// by callers because it is forwarded verbatim as the detection context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub emergency: Option<Value>,
    #[serde(default)]
    pub is_emergency: Option<Value>,
    #[serde(default)]
    pub sources: Option<Value>,
    #[serde(default)]
    pub locations: Option<Value>,
    #[serde(default)]
    pub map_html: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ChatResponse {
    /// Either emergency flag is truthy.
    pub fn is_emergency(&self) -> bool {
        self.emergency.as_ref().is_some_and(is_truthy) || self.is_emergency.as_ref().is_some_and(is_truthy)
    }
}

/// Truthiness the way the backend's JavaScript consumers read JSON flags.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Who is sending the alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMetadata {
    pub user_agent: String,
    pub session_id: String,
}

/// `POST /chat/emergency-alert`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergencyAlertRequest {
    pub message: String,
    pub location: LocationFix,
    pub response_data: Value,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub client: ClientMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmergencyAlertResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub alert_id: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub bot: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub has_location: bool,
    #[serde(default)]
    pub has_map: bool,
}

/// `GET /chat/history`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub count: Option<usize>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl HistoryResponse {
    /// Plain-text transcript, one block per exchange.
    pub fn transcript(&self) -> String {
        self.history
            .iter()
            .map(|h| format!("User: {}\nBot: {}\nTime: {}\n---\n", h.user, h.bot, h.timestamp))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// `GET /api/status`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl SystemStatus {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;
    use serde_json::json;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[rstest]
    #[case(40.0, -86.1, 40.0, -86.1, 0.0)]
    // one degree of latitude on a 6371 km sphere
    #[case(39.0, -86.0, 40.0, -86.0, 111.195)]
    #[case(39.7684, -86.1581, 41.8781, -87.6298, 265.26)]
    fn haversine_matches_known_distances(
        #[case] lat1: f64,
        #[case] lon1: f64,
        #[case] lat2: f64,
        #[case] lon2: f64,
        #[case] expected_km: f64,
    ) {
        let d = haversine_km(lat1, lon1, lat2, lon2);
        assert!((d - expected_km).abs() < 0.5, "got {d}, expected {expected_km}");
    }

    #[test]
    fn fix_uses_backend_field_names() {
        let fix = LocationFix::new(39.77, -86.16, 15.0, at(1_700_000_000));
        let v = serde_json::to_value(&fix).unwrap();
        assert_eq!(v["lat"], json!(39.77));
        assert_eq!(v["lng"], json!(-86.16));
        assert_eq!(v["accuracy"], json!(15.0));
        assert_eq!(v["source"], json!("gps"));
        assert!(v.get("address").is_none());

        let back: LocationFix = serde_json::from_value(v).unwrap();
        assert_eq!(back, fix);
    }

    #[test]
    fn negative_accuracy_is_clamped() {
        let fix = LocationFix::new(1.0, 2.0, -1.0, at(0));
        assert_eq!(fix.accuracy_meters, 0.0);
    }

    #[test]
    fn with_address_keeps_the_measurement() {
        let fix = LocationFix::new(39.77, -86.16, 15.0, at(10));
        let labelled = fix.with_address("Indianapolis, Indiana");
        assert!(labelled.same_measurement(&fix));
        assert_eq!(labelled.address.as_deref(), Some("Indianapolis, Indiana"));
        assert_eq!(fix.address, None);
    }

    #[test]
    fn maps_url_points_at_coordinates() {
        let fix = LocationFix::new(40.0, -86.1, 10.0, at(0));
        assert_eq!(fix.maps_url(), "https://www.google.com/maps?q=40,-86.1");
    }

    #[rstest]
    #[case(json!({"response": "ok"}), false)]
    #[case(json!({"response": "ok", "emergency": true}), true)]
    #[case(json!({"response": "ok", "is_emergency": true}), true)]
    #[case(json!({"response": "ok", "emergency": false, "is_emergency": 1}), true)]
    #[case(json!({"response": "ok", "emergency": 0, "is_emergency": ""}), false)]
    #[case(json!({"response": "ok", "emergency": null}), false)]
    #[case(json!({"response": "ok", "emergency": "yes"}), true)]
    fn emergency_flags_are_truthy_checked(#[case] raw: Value, #[case] expected: bool) {
        let parsed: ChatResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.is_emergency(), expected);
    }

    #[test]
    fn alert_request_flattens_client_metadata() {
        let req = EmergencyAlertRequest {
            message: "help".into(),
            location: LocationFix::new(40.0, -86.1, 10.0, at(0)),
            response_data: json!({"emergency": true}),
            timestamp: at(5),
            client: ClientMetadata {
                user_agent: "ua".into(),
                session_id: "abc".into(),
            },
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["user_agent"], json!("ua"));
        assert_eq!(v["session_id"], json!("abc"));
        assert_eq!(v["response_data"], json!({"emergency": true}));
        assert_eq!(v["location"]["lat"], json!(40.0));
    }

    #[test]
    fn alert_response_tolerates_missing_fields() {
        let r: EmergencyAlertResponse = serde_json::from_value(json!({"error": "Failed"})).unwrap();
        assert!(!r.success);
        assert_eq!(r.error.as_deref(), Some("Failed"));
    }

    #[test]
    fn transcript_joins_exchanges() {
        let history = HistoryResponse {
            history: vec![
                HistoryEntry {
                    user: "hi".into(),
                    bot: "hello".into(),
                    timestamp: "t1".into(),
                    ..Default::default()
                },
                HistoryEntry {
                    user: "where".into(),
                    bot: "here".into(),
                    timestamp: "t2".into(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        assert_eq!(
            history.transcript(),
            "User: hi\nBot: hello\nTime: t1\n---\n\nUser: where\nBot: here\nTime: t2\n---\n"
        );
    }

    #[rstest]
    #[case(json!({"status": "healthy", "service": "SafeIndy", "version": "1.0.0"}), true)]
    #[case(json!({"status": "degraded"}), false)]
    #[case(json!({}), false)]
    fn status_health_follows_status_field(#[case] body: Value, #[case] healthy: bool) {
        let status: SystemStatus = serde_json::from_value(body).unwrap();
        assert_eq!(status.is_healthy(), healthy);
    }
}
