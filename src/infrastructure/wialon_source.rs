// Wialon Remote API client
use crate::application::telemetry_source::{Credentials, SourceError, TelemetrySource, INVALID_SESSION};
use crate::domain::change::{AttributeChangeSet, EntityChange, ExternalEntityDescriptor};
use crate::domain::position::{EntityId, PositionSample};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;

const FLAG_BASE: u64 = 0x0000_0001;
const FLAG_IMAGE: u64 = 0x0000_0010;
const FLAG_MESSAGE_PARAMS: u64 = 0x0010_0000;

/// Data flags requested for every unit: name, icon and last message parameters
pub const UNIT_DATA_FLAGS: u64 = FLAG_BASE | FLAG_IMAGE | FLAG_MESSAGE_PARAMS;

const MODE_REPLACE: u8 = 0;
const MODE_ADD: u8 = 1;

#[derive(Debug)]
pub struct WialonSource {
    host: String,
    icon_size: u32,
    client: reqwest::Client,
    sid: RwLock<Option<String>>,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    eid: String,
}

#[derive(Debug, Deserialize)]
struct DataFlagsEntry {
    #[serde(default)]
    d: Option<UnitItem>,
}

#[derive(Debug, Deserialize)]
struct UnitItem {
    id: u64,
    nm: String,
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    prms: Option<MessageParams>,
    #[serde(default)]
    pos: Option<RawPosition>,
}

#[derive(Debug, Default, Deserialize)]
struct MessageParams {
    #[serde(default)]
    posinfo: Option<PosInfoParam>,
    #[serde(default)]
    speed: Option<ScalarParam>,
}

#[derive(Debug, Deserialize)]
struct PosInfoParam {
    v: PosInfoValue,
    #[serde(default)]
    ct: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct PosInfoValue {
    x: f64,
    y: f64,
}

#[derive(Debug, Deserialize)]
struct ScalarParam {
    v: Value,
}

#[derive(Debug, Deserialize)]
struct RawPosition {
    x: f64,
    y: f64,
    #[serde(default)]
    s: Option<f64>,
    #[serde(default)]
    t: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct EventsResponse {
    #[serde(default)]
    events: Vec<RawEvent>,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    i: u64,
    t: String,
    #[serde(default)]
    d: Value,
}

impl WialonSource {
    pub fn new(host: String, icon_size: u32) -> Self {
        Self {
            host: host.trim_end_matches('/').to_string(),
            icon_size,
            client: reqwest::Client::new(),
            sid: RwLock::new(None),
        }
    }

    fn ajax_url(&self, svc: &str, params: &Value, sid: Option<&str>) -> String {
        let mut url = format!(
            "{}/wialon/ajax.html?svc={}&params={}",
            self.host,
            svc,
            urlencoding::encode(&params.to_string())
        );
        if let Some(sid) = sid {
            url.push_str("&sid=");
            url.push_str(&urlencoding::encode(sid));
        }
        url
    }

    fn icon_url(&self, unit_id: u64, uri: &str) -> String {
        let file = uri.rsplit('/').next().unwrap_or(uri);
        format!("{}/avl_item_image/{}/{}/{}", self.host, unit_id, self.icon_size, file)
    }

    async fn current_sid(&self) -> Result<String, SourceError> {
        self.sid.read().await.clone().ok_or(SourceError::NotLoggedIn)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, SourceError> {
        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(SourceError::Transport(format!("HTTP status {}", status)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SourceError::Decode(e.to_string()))?;
        check_error(&body)?;

        serde_json::from_value(body).map_err(|e| SourceError::Decode(e.to_string()))
    }

    async fn update_data_flags(&self, spec: Vec<Value>) -> Result<Vec<DataFlagsEntry>, SourceError> {
        let sid = self.current_sid().await?;
        let url = self.ajax_url("core/update_data_flags", &json!({ "spec": spec }), Some(&sid));
        self.get_json(&url).await
    }

    fn decode_unit(&self, item: UnitItem) -> ExternalEntityDescriptor {
        let (position, speed) = match (item.prms, item.pos) {
            (Some(prms), _) if prms.posinfo.is_some() => decode_params(prms),
            (prms, Some(pos)) => {
                let speed = prms.and_then(|p| p.speed).and_then(|s| s.v.as_f64()).or(pos.s);
                (Some(raw_position_sample(&pos, pos.t)), speed)
            }
            (Some(prms), None) => decode_params(prms),
            (None, None) => (None, None),
        };

        ExternalEntityDescriptor {
            id: EntityId::from(item.id),
            icon_url: item.uri.as_deref().map(|uri| self.icon_url(item.id, uri)),
            name: item.nm,
            position,
            speed,
        }
    }
}

#[async_trait]
impl TelemetrySource for WialonSource {
    async fn login(&self, credentials: &Credentials) -> Result<(), SourceError> {
        let params = json!({ "user": credentials.username, "password": credentials.password });
        let url = self.ajax_url("core/login", &params, None);
        let response: LoginResponse = self.get_json(&url).await?;

        *self.sid.write().await = Some(response.eid);
        tracing::debug!("Session established with {}", self.host);
        Ok(())
    }

    async fn load_entities(&self) -> Result<Vec<ExternalEntityDescriptor>, SourceError> {
        let spec = vec![json!({
            "type": "type",
            "data": "avl_unit",
            "flags": UNIT_DATA_FLAGS,
            "mode": MODE_REPLACE,
        })];
        let entries = self.update_data_flags(spec).await?;

        let units: Vec<ExternalEntityDescriptor> = entries
            .into_iter()
            .filter_map(|entry| entry.d)
            .map(|item| self.decode_unit(item))
            .collect();

        tracing::debug!("Loaded {} units from {}", units.len(), self.host);
        Ok(units)
    }

    async fn subscribe(&self, ids: &[EntityId]) -> Result<(), SourceError> {
        let spec: Vec<Value> = ids
            .iter()
            .map(|id| {
                let data = id
                    .as_str()
                    .parse::<u64>()
                    .map(Value::from)
                    .unwrap_or_else(|_| Value::from(id.as_str()));
                json!({ "type": "id", "data": data, "flags": UNIT_DATA_FLAGS, "mode": MODE_ADD })
            })
            .collect();

        self.update_data_flags(spec).await?;
        Ok(())
    }

    async fn poll_events(&self) -> Result<Vec<EntityChange>, SourceError> {
        let sid = self.current_sid().await?;
        let url = format!("{}/avl_evts?sid={}", self.host, urlencoding::encode(&sid));
        let response: EventsResponse = self.get_json(&url).await?;

        Ok(response.events.into_iter().filter_map(decode_event).collect())
    }
}

/// Turn a `{"error": code}` body into a typed error
pub fn check_error(body: &Value) -> Result<(), SourceError> {
    match body.get("error").and_then(Value::as_i64) {
        Some(0) | None => Ok(()),
        Some(code) => Err(SourceError::Remote {
            code,
            message: error_text(code).to_string(),
        }),
    }
}

pub fn error_text(code: i64) -> &'static str {
    match code {
        INVALID_SESSION => "Invalid session",
        2 => "Invalid service name",
        3 => "Invalid result",
        4 => "Invalid input",
        5 => "Error performing request",
        6 => "Unknown error",
        7 => "Access denied",
        8 => "Invalid user name or password",
        9 => "Authorization server is unavailable",
        1001 => "No messages for selected interval",
        1003 => "Only one request is allowed at the moment",
        _ => "Unknown error",
    }
}

fn timestamp(seconds: Option<i64>) -> Option<DateTime<Utc>> {
    seconds.and_then(|s| DateTime::from_timestamp(s, 0))
}

// Wialon reports x as longitude and y as latitude
fn raw_position_sample(pos: &RawPosition, time: Option<i64>) -> PositionSample {
    PositionSample {
        latitude: pos.y,
        longitude: pos.x,
        observed_at: timestamp(time),
    }
}

fn decode_params(prms: MessageParams) -> (Option<PositionSample>, Option<f64>) {
    let position = prms.posinfo.map(|p| PositionSample {
        latitude: p.v.y,
        longitude: p.v.x,
        observed_at: timestamp(p.ct),
    });
    let speed = prms.speed.and_then(|s| s.v.as_f64());
    (position, speed)
}

/// Decode one `avl_evts` entry. Only item updates carrying message
/// parameters and new messages with a position are of interest.
fn decode_event(raw: RawEvent) -> Option<EntityChange> {
    let changes = match raw.t.as_str() {
        "u" => {
            let prms: MessageParams = serde_json::from_value(raw.d.get("prms")?.clone()).ok()?;
            let (position, speed) = decode_params(prms);
            AttributeChangeSet { position, speed }
        }
        "m" => {
            let pos: RawPosition = serde_json::from_value(raw.d.get("pos")?.clone()).ok()?;
            let time = raw.d.get("t").and_then(Value::as_i64);
            AttributeChangeSet {
                position: Some(raw_position_sample(&pos, time)),
                speed: pos.s,
            }
        }
        _ => return None,
    };

    if changes.is_empty() {
        return None;
    }
    Some(EntityChange::new(EntityId::from(raw.i), changes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> WialonSource {
        WialonSource::new("https://hst-api.wialon.com/".to_string(), 32)
    }

    fn unit(value: Value) -> UnitItem {
        serde_json::from_value(value).unwrap()
    }

    fn event(value: Value) -> Option<EntityChange> {
        decode_event(serde_json::from_value(value).unwrap())
    }

    #[test]
    fn test_ajax_url_encodes_params() {
        let url = source().ajax_url("core/login", &json!({"user": "Cebit"}), Some("abc"));
        assert_eq!(
            url,
            "https://hst-api.wialon.com/wialon/ajax.html?svc=core/login&params=%7B%22user%22%3A%22Cebit%22%7D&sid=abc"
        );
    }

    #[test]
    fn test_decode_unit_with_message_params() {
        let descriptor = source().decode_unit(unit(json!({
            "id": 734455,
            "nm": "Truck 7",
            "uri": "/avl_item_image/734455/1452245633.png",
            "prms": {
                "posinfo": {"v": {"x": 9.79, "y": 52.32, "z": 0, "c": 0, "sc": 9}, "ct": 1452245633},
                "speed": {"v": 48, "ct": 1452245633}
            }
        })));

        assert_eq!(descriptor.id, EntityId::from("734455"));
        assert_eq!(descriptor.name, "Truck 7");
        assert_eq!(
            descriptor.icon_url.as_deref(),
            Some("https://hst-api.wialon.com/avl_item_image/734455/32/1452245633.png")
        );
        let position = descriptor.position.unwrap();
        assert_eq!((position.latitude, position.longitude), (52.32, 9.79));
        assert_eq!(position.observed_at.unwrap().timestamp(), 1452245633);
        assert_eq!(descriptor.speed, Some(48.0));
    }

    #[test]
    fn test_decode_unit_without_position() {
        let descriptor = source().decode_unit(unit(json!({"id": 1, "nm": "Parked", "prms": {}})));
        assert!(descriptor.position.is_none());
        assert!(descriptor.speed.is_none());
        assert!(descriptor.icon_url.is_none());
    }

    #[test]
    fn test_decode_unit_falls_back_to_last_position() {
        let descriptor = source().decode_unit(unit(json!({
            "id": 2,
            "nm": "Legacy",
            "pos": {"x": 10.5, "y": 53.1, "s": 15, "t": 1452245000}
        })));
        let position = descriptor.position.unwrap();
        assert_eq!((position.latitude, position.longitude), (53.1, 10.5));
        assert_eq!(descriptor.speed, Some(15.0));
    }

    #[test]
    fn test_decode_update_event() {
        let change = event(json!({
            "i": 734455,
            "t": "u",
            "d": {"prms": {"posinfo": {"v": {"x": 9.8, "y": 52.33}}, "speed": {"v": 51.5}}}
        }))
        .unwrap();

        assert_eq!(change.id, EntityId::from("734455"));
        assert_eq!(change.changes.position, Some(PositionSample::new(52.33, 9.8)));
        assert_eq!(change.changes.speed, Some(51.5));
    }

    #[test]
    fn test_decode_speed_only_update() {
        let change = event(json!({"i": 5, "t": "u", "d": {"prms": {"speed": {"v": 3}}}})).unwrap();
        assert!(change.changes.position.is_none());
        assert_eq!(change.changes.speed, Some(3.0));
    }

    #[test]
    fn test_decode_message_event() {
        let change = event(json!({
            "i": 9,
            "t": "m",
            "d": {"t": 1452245700, "pos": {"x": 9.81, "y": 52.34, "s": 60}}
        }))
        .unwrap();
        let position = change.changes.position.unwrap();
        assert_eq!((position.latitude, position.longitude), (52.34, 9.81));
        assert_eq!(position.observed_at.unwrap().timestamp(), 1452245700);
        assert_eq!(change.changes.speed, Some(60.0));
    }

    #[test]
    fn test_irrelevant_events_are_skipped() {
        assert!(event(json!({"i": 9, "t": "d", "d": {}})).is_none());
        assert!(event(json!({"i": 9, "t": "u", "d": {"nm": "Renamed"}})).is_none());
        assert!(event(json!({"i": 9, "t": "u", "d": {"prms": {}}})).is_none());
    }

    #[test]
    fn test_check_error() {
        assert!(check_error(&json!({"eid": "abc"})).is_ok());
        assert!(check_error(&json!([])).is_ok());
        match check_error(&json!({"error": 8})) {
            Err(SourceError::Remote { code, message }) => {
                assert_eq!(code, 8);
                assert_eq!(message, "Invalid user name or password");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_poll_requires_login() {
        let result = source().poll_events().await;
        assert!(matches!(result, Err(SourceError::NotLoggedIn)));
    }
}
