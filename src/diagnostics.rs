use crate::connection::EcomaxConnection;
use crate::device::{ATTR_MIXERS, ATTR_PASSWORD, ATTR_PRODUCT, Device};
use serde_json::{Map, Value as Json, json};

pub const REDACTED: &str = "**REDACTED**";

/// Identifying fields of the connection entry.
const SENSITIVE_ENTRY_FIELDS: [&str; 2] = ["uid", "host"];

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("could not serialize the device data")]
    Serialize(#[source] serde_json::Error),
}

fn device_data(device: &Device) -> Result<Map<String, Json>, Error> {
    let mut data = Map::new();
    for (key, value) in device.data() {
        data.insert(key, serde_json::to_value(value).map_err(Error::Serialize)?);
    }
    Ok(data)
}

fn redact_entry_data(mut data: Map<String, Json>) -> Map<String, Json> {
    for field in SENSITIVE_ENTRY_FIELDS {
        if let Some(value) = data.get_mut(field) {
            *value = Json::from(REDACTED);
        }
    }
    data
}

fn redact_device_data(mut data: Map<String, Json>) -> Map<String, Json> {
    if let Some(Json::Object(product)) = data.get_mut(ATTR_PRODUCT) {
        if let Some(uid) = product.get_mut("uid") {
            *uid = Json::from(REDACTED);
        }
    }
    if let Some(password) = data.get_mut(ATTR_PASSWORD) {
        *password = Json::from(REDACTED);
    }
    data
}

/// Collect everything useful for debugging a connection, with identifying details redacted.
pub fn collect(connection: &EcomaxConnection) -> Result<Json, Error> {
    let device = connection.device();
    let mut data = device_data(device)?;
    let product = serde_json::to_value(connection.product()).map_err(Error::Serialize)?;
    data.insert(ATTR_PRODUCT.to_string(), product);
    data.insert(
        "modules".to_string(),
        serde_json::to_value(connection.modules()).map_err(Error::Serialize)?,
    );
    let mixers = device.mixers();
    if !mixers.is_empty() {
        let mut by_index = Map::new();
        for (index, mixer) in mixers {
            by_index.insert(index.to_string(), Json::Object(device_data(&mixer)?));
        }
        data.insert(ATTR_MIXERS.to_string(), Json::Object(by_index));
    }

    let mut device_info = connection.device_info();
    device_info.identifiers = vec![REDACTED.to_string()];
    let device_info = serde_json::to_value(device_info).map_err(Error::Serialize)?;

    let mut entry = Map::new();
    entry.insert("uid".to_string(), Json::from(connection.uid()));
    entry.insert("model".to_string(), Json::from(connection.model()));
    Ok(json!({
        "entry": {
            "title": connection.name(),
            "data": redact_entry_data(entry),
        },
        "ecomax_tools": {
            "version": env!("CARGO_PKG_VERSION"),
        },
        "device": device_info,
        "data": redact_device_data(data),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::Snapshot;
    use std::time::Duration;

    fn connection() -> EcomaxConnection {
        let snapshot: Snapshot = serde_json::from_value(json!({
            "name": "ecoMAX",
            "product": {"type": "ecomax_i", "uid": "SECRET-UID", "model": "ecoMAX 860i3"},
            "data": {"password": "0000", "heating_temp": 55.0},
            "mixers": {"1": {"current_temp": 30.0}},
        }))
        .unwrap();
        snapshot.into_connection(Duration::from_secs(1)).0
    }

    #[test]
    fn identifying_details_are_redacted() {
        let diagnostics = collect(&connection()).unwrap();
        assert_eq!(diagnostics["entry"]["title"], "ecoMAX");
        assert_eq!(diagnostics["entry"]["data"]["uid"], REDACTED);
        assert_eq!(diagnostics["entry"]["data"]["model"], "ecoMAX 860i3");
        assert_eq!(diagnostics["data"]["product"]["uid"], REDACTED);
        assert_eq!(diagnostics["data"]["product"]["model"], "ecoMAX 860i3");
        assert_eq!(diagnostics["data"]["password"], REDACTED);
        assert_eq!(diagnostics["data"]["heating_temp"], 55.0);
        assert_eq!(diagnostics["data"]["mixers"]["1"]["current_temp"], 30.0);
        assert_eq!(diagnostics["device"]["name"], "ecoMAX");
        assert_eq!(diagnostics["device"]["manufacturer"], crate::connection::MANUFACTURER);
        assert_eq!(diagnostics["device"]["identifiers"], json!([REDACTED]));
        assert!(!diagnostics.to_string().contains("SECRET-UID"));
    }

    #[test]
    fn missing_fields_are_left_alone() {
        let data = redact_device_data(Map::new());
        assert!(data.is_empty());
        let mut entry = Map::new();
        entry.insert("port".to_string(), Json::from(8899));
        assert_eq!(redact_entry_data(entry.clone()), entry);
    }
}
