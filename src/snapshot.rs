//! Offline device state: a JSON snapshot to build the device tree from, and a JSONL log of
//! value changes to feed into it afterwards.

use crate::connection::EcomaxConnection;
use crate::device::{Device, DeviceCommand, Value};
use crate::product::{ConnectedModules, ProductInfo};
use futures::Stream;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("could not read the event log at {1:?}")]
    ReadEvents(#[source] std::io::Error, PathBuf),
    #[error("could not parse line {1} of the event log")]
    ParseEvent(#[source] serde_json::Error, usize),
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Snapshot {
    pub name: String,
    pub product: ProductInfo,
    #[serde(default)]
    pub modules: ConnectedModules,
    #[serde(default)]
    pub data: BTreeMap<String, Value>,
    /// Values of each mixer, by zero-based index.
    #[serde(default)]
    pub mixers: BTreeMap<u8, BTreeMap<String, Value>>,
}

impl Snapshot {
    pub fn into_connection(
        self,
        mixer_timeout: Duration,
    ) -> (EcomaxConnection, UnboundedReceiver<DeviceCommand>) {
        let (sender, commands) = mpsc::unbounded_channel();
        let device = Arc::new(Device::new(sender));
        for (key, value) in self.data {
            device.dispatch(&key, value);
        }
        for (index, data) in self.mixers {
            let mixer = device.add_mixer(index);
            for (key, value) in data {
                mixer.dispatch(&key, value);
            }
        }
        let connection =
            EcomaxConnection::new(self.name, device, self.product, self.modules, mixer_timeout);
        (connection, commands)
    }
}

/// A single value change as reported by the controller.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Event {
    pub key: String,
    pub value: Value,
    /// Zero-based mixer index, absent for values of the controller itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mixer: Option<u8>,
}

impl Event {
    /// Deliver this event to the device, discovering the mixer it refers to if needed.
    pub fn apply(self, device: &Device) {
        match self.mixer {
            None => device.dispatch(&self.key, self.value),
            Some(index) => device.add_mixer(index).dispatch(&self.key, self.value),
        }
    }
}

/// Parse a JSONL event log. Blank lines are skipped.
pub fn parse_events(input: &str) -> Result<Vec<Event>, Error> {
    input
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(number, line)| {
            serde_json::from_str(line).map_err(|e| Error::ParseEvent(e, number + 1))
        })
        .collect()
}

pub async fn read_events(path: &Path) -> Result<Vec<Event>, Error> {
    let input = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::ReadEvents(e, path.to_path_buf()))?;
    parse_events(&input)
}

/// Apply `events` to `device` one by one, pausing for `delay` before each, and yield each event
/// once it has been applied.
pub fn replay(
    device: Arc<Device>,
    events: Vec<Event>,
    delay: Duration,
) -> impl Stream<Item = Event> {
    async_stream::stream! {
        for event in events {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            tracing::debug!(key = %event.key, mixer = event.mixer, "replaying event");
            event.clone().apply(&device);
            yield event;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::ATTR_MIXERS;
    use crate::product::{Module, ProductType};
    use futures::StreamExt as _;

    fn snapshot() -> Snapshot {
        serde_json::from_value(serde_json::json!({
            "name": "Boiler room",
            "product": {"type": "ecomax_p", "uid": "UID", "model": "ecoMAX 850P2-C"},
            "modules": {"module_a": "6.10.32.K1", "ecolambda": "0.8.0"},
            "data": {
                "connected": true,
                "heating_temp": 61.5,
                "heating_target_temp": {"value": 65, "min_value": 40, "max_value": 80},
            },
            "mixers": {"0": {"current_temp": 40.0}, "2": {"current_temp": 35.0}},
        }))
        .unwrap()
    }

    #[test]
    fn snapshot_builds_device_tree() {
        let (connection, _) = snapshot().into_connection(Duration::from_secs(1));
        assert_eq!(connection.name(), "Boiler room");
        assert_eq!(connection.product_type(), ProductType::EcomaxP);
        assert!(connection.modules().is_connected(Module::Ecolambda));
        assert!(!connection.modules().is_connected(Module::ModuleC));
        assert!(connection.has_mixers());
        let device = connection.device();
        assert_eq!(device.get_nowait(ATTR_MIXERS), Some(Value::Number(2.0)));
        assert_eq!(device.mixer(2).and_then(|m| m.get_nowait("current_temp")), Some(Value::Number(35.0)));
        assert!(device.mixer(1).is_none());
    }

    #[test]
    fn events_are_parsed_line_by_line() {
        let events = parse_events(concat!(
            r#"{"key": "heating_temp", "value": 62}"#,
            "\n\n",
            r#"{"key": "current_temp", "value": 41.5, "mixer": 1}"#,
            "\n",
        ))
        .unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].mixer, Some(1));
        let err = parse_events("{\"key\": \"fan\", \"value\": true}\nnot json\n").unwrap_err();
        assert!(matches!(err, Error::ParseEvent(_, 2)));
    }

    #[tokio::test]
    async fn replay_applies_events_in_order() {
        let (connection, _) = snapshot().into_connection(Duration::from_secs(1));
        let device = Arc::clone(connection.device());
        let events = vec![
            Event { key: "heating_temp".into(), value: Value::Number(63.0), mixer: None },
            Event { key: "current_temp".into(), value: Value::Number(42.0), mixer: Some(3) },
        ];
        let replayed = replay(Arc::clone(&device), events.clone(), Duration::ZERO)
            .collect::<Vec<_>>()
            .await;
        assert_eq!(replayed, events);
        assert_eq!(device.get_nowait("heating_temp"), Some(Value::Number(63.0)));
        assert_eq!(device.mixer(3).and_then(|m| m.get_nowait("current_temp")), Some(Value::Number(42.0)));
        assert_eq!(device.get_nowait(ATTR_MIXERS), Some(Value::Number(3.0)));
    }
}
