//! HTTP reading source for the campus utility query endpoint
//!
//! The endpoint takes a form-encoded POST whose `jsondata` field carries the
//! room query and answers with JSON. The interesting part of the answer is a
//! human readable sentence in `query_elec_roominfo.errmsg`, shaped like
//! `" T4A612房间剩余电量718.01"`, from which room and quantity are parsed.

use crate::config::SourceConfig;
use crate::error::ReadingError;
use crate::readings::{MonitoredUnit, Reading};
use crate::source::ReadingSource;
use log::{debug, warn};
use reqwest::Client;
use serde_json::{json, Value};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Text separating the room id from the remaining quantity
const QUANTITY_MARKER: &str = "房间剩余电量";

const QUERY_FUNCTION: &str = "synjones.onecard.query.elec.roominfo";

/// Reading source querying the utility endpoint over HTTP
pub struct HttpReadingSource {
    client: Client,
    config: SourceConfig,
}

impl HttpReadingSource {
    /// Create a new HTTP reading source
    ///
    /// # Errors
    ///
    /// Returns `ReadingError::Transport` if the HTTP client cannot be built.
    pub fn new(config: SourceConfig) -> Result<Self, ReadingError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ReadingError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Build the `jsondata` form field for a unit
    fn query_payload(&self, unit: &MonitoredUnit) -> String {
        json!({
            "query_elec_roominfo": {
                "aid": self.config.aid,
                "account": self.config.account,
                "room": { "roomid": unit.id, "room": "" },
                "floor": { "floorid": "", "floor": "" },
                "area": { "area": self.config.area, "areaname": "" },
                "building": { "buildingid": unit.building, "building": "" }
            }
        })
        .to_string()
    }
}

/// Pull the reading sentence out of a decoded response
fn extract_message(response: &Value) -> Result<&str, ReadingError> {
    response
        .get("query_elec_roominfo")
        .and_then(|info| info.get("errmsg"))
        .and_then(Value::as_str)
        .ok_or_else(|| ReadingError::Parse(format!("Unexpected response shape: {}", response)))
}

/// Split a reading sentence into the room id it names and the quantity
pub fn parse_message(raw: &str) -> Result<(String, f64), ReadingError> {
    let start = raw
        .find(QUANTITY_MARKER)
        .ok_or_else(|| ReadingError::Parse(format!("No quantity in message: {}", raw)))?;

    let room = raw[..start].trim().to_string();
    let number = raw[start + QUANTITY_MARKER.len()..].trim();
    let quantity: f64 = number
        .parse()
        .map_err(|e| ReadingError::Parse(format!("Invalid quantity '{}': {}", number, e)))?;

    if !quantity.is_finite() || quantity < 0.0 {
        return Err(ReadingError::Parse(format!(
            "Quantity out of range: {}",
            quantity
        )));
    }

    Ok((room, quantity))
}

impl ReadingSource for HttpReadingSource {
    fn fetch<'a>(
        &'a self,
        unit: &'a MonitoredUnit,
    ) -> Pin<Box<dyn Future<Output = Result<Reading, ReadingError>> + Send + 'a>> {
        Box::pin(async move {
            let form = [
                ("jsondata", self.query_payload(unit)),
                ("funname", QUERY_FUNCTION.to_string()),
                ("json", "true".to_string()),
            ];

            let response = self
                .client
                .post(&self.config.url)
                .form(&form)
                .send()
                .await
                .map_err(|e| ReadingError::Transport(format!("HTTP request failed: {}", e)))?;

            if !response.status().is_success() {
                return Err(ReadingError::Transport(format!(
                    "Endpoint returned status {}",
                    response.status()
                )));
            }

            let body: Value = response.json().await?;
            debug!("Unit {} raw response: {}", unit.id, body);

            let raw = extract_message(&body)?;
            let (room, quantity) = parse_message(raw)?;
            if room != unit.id {
                warn!(
                    "Reading for unit {} names room '{}', recording it under {}",
                    unit.id, room, unit.id
                );
            }

            Ok(Reading::new(unit.id.clone(), quantity, raw))
        })
    }
}
