//! In-process model of an ecoMAX device.
//!
//! This is the surface a device communication library exposes to its users: the latest value of
//! every attribute, a per-key callback registry that is invoked whenever a value is dispatched,
//! and a command sink for writes that does not wait for the device to acknowledge anything.

use crate::schedule::Schedules;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::sync::mpsc::UnboundedSender;

pub const ATTR_CONNECTED: &str = "connected";
pub const ATTR_MIXERS: &str = "mixers";
/// Number of mixers the controller supports, reported before the mixers themselves.
pub const ATTR_MIXER_COUNT: &str = "mixer_count";
pub const ATTR_PRODUCT: &str = "product";
pub const ATTR_PASSWORD: &str = "password";
pub const ATTR_ALERTS: &str = "alerts";
pub const ATTR_SCHEDULES: &str = "schedules";

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("value for `{key}` was not received within {timeout:?}")]
    Timeout { key: String, timeout: Duration },
}

/// An editable device parameter along with its allowed range.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Parameter {
    pub value: f64,
    pub min_value: f64,
    pub max_value: f64,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Alert {
    pub code: u8,
    pub from: jiff::civil::DateTime,
    #[serde(default)]
    pub to: Option<jiff::civil::DateTime>,
}

/// A value as reported by the device.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Number(f64),
    Text(String),
    Parameter(Parameter),
    Alerts(Vec<Alert>),
    Schedules(Schedules),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Bool(b) => Some(f64::from(u8::from(*b))),
            Value::Number(n) => Some(*n),
            Value::Parameter(p) => Some(p.value),
            Value::Text(_) | Value::Alerts(_) | Value::Schedules(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Number(_) | Value::Parameter(_) => self.as_f64().map(|v| v != 0.0),
            Value::Text(_) | Value::Alerts(_) | Value::Schedules(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_parameter(&self) -> Option<&Parameter> {
        match self {
            Value::Parameter(p) => Some(p),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(s) => f.write_str(s),
            Value::Parameter(p) => write!(f, "{} [{}, {}]", p.value, p.min_value, p.max_value),
            Value::Alerts(alerts) => write!(f, "{} alert(s)", alerts.len()),
            Value::Schedules(schedules) => write!(f, "{} schedule(s)", schedules.len()),
        }
    }
}

pub type Callback = Box<dyn FnMut(&Value) + Send>;

/// Handle identifying a single callback registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CallbackId(u64);

/// Wrap `callback` so that it only runs when the value differs from the previously seen one.
pub fn on_change(mut callback: impl FnMut(&Value) + Send + 'static) -> Callback {
    let mut last: Option<Value> = None;
    Box::new(move |value: &Value| {
        if last.as_ref() == Some(value) {
            return;
        }
        last = Some(value.clone());
        callback(value);
    })
}

/// A write request towards the physical device.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct DeviceCommand {
    pub mixer: Option<u8>,
    pub key: String,
    pub value: Value,
}

pub struct Device {
    index: Option<u8>,
    data: Mutex<BTreeMap<String, Value>>,
    /// Callbacks run while this lock is held, so they must not call back into the registry.
    subscribers: Mutex<BTreeMap<String, Vec<(CallbackId, Callback)>>>,
    mixers: Mutex<BTreeMap<u8, Arc<Device>>>,
    changed: Notify,
    next_callback_id: AtomicU64,
    commands: UnboundedSender<DeviceCommand>,
}

impl Device {
    pub fn new(commands: UnboundedSender<DeviceCommand>) -> Self {
        Self::with_index(None, commands)
    }

    fn with_index(index: Option<u8>, commands: UnboundedSender<DeviceCommand>) -> Self {
        Self {
            index,
            data: Default::default(),
            subscribers: Default::default(),
            mixers: Default::default(),
            changed: Notify::new(),
            next_callback_id: AtomicU64::new(0),
            commands,
        }
    }

    /// Zero-based mixer index, `None` for the controller itself.
    pub fn index(&self) -> Option<u8> {
        self.index
    }

    /// Return the mixer sub-device at `index`, creating it if it does not exist yet.
    ///
    /// Creating a new mixer announces the new mixer count under [`ATTR_MIXERS`].
    pub fn add_mixer(&self, index: u8) -> Arc<Device> {
        let mut mixers = self.mixers.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(mixer) = mixers.get(&index) {
            return Arc::clone(mixer);
        }
        let mixer = Arc::new(Device::with_index(Some(index), self.commands.clone()));
        mixers.insert(index, Arc::clone(&mixer));
        let count = mixers.len();
        drop(mixers);
        tracing::debug!(index, count, "discovered a mixer");
        self.dispatch(ATTR_MIXERS, Value::Number(count as f64));
        mixer
    }

    pub fn mixer(&self, index: u8) -> Option<Arc<Device>> {
        let mixers = self.mixers.lock().unwrap_or_else(|e| e.into_inner());
        mixers.get(&index).cloned()
    }

    pub fn mixers(&self) -> Vec<(u8, Arc<Device>)> {
        let mixers = self.mixers.lock().unwrap_or_else(|e| e.into_inner());
        mixers.iter().map(|(i, m)| (*i, Arc::clone(m))).collect()
    }

    pub fn register_callback(&self, key: &str, callback: Callback) -> CallbackId {
        let id = CallbackId(self.next_callback_id.fetch_add(1, Ordering::Relaxed));
        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers.entry(key.to_string()).or_default().push((id, callback));
        tracing::trace!(key, ?id, mixer = self.index, "registered a callback");
        id
    }

    /// Returns `false` if there was no such registration.
    pub fn remove_callback(&self, key: &str, id: CallbackId) -> bool {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        let Some(callbacks) = subscribers.get_mut(key) else {
            return false;
        };
        let Some(position) = callbacks.iter().position(|(i, _)| *i == id) else {
            return false;
        };
        drop(callbacks.remove(position));
        if callbacks.is_empty() {
            subscribers.remove(key);
        }
        tracing::trace!(key, ?id, mixer = self.index, "removed a callback");
        true
    }

    pub fn callback_count(&self, key: &str) -> usize {
        let subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers.get(key).map_or(0, Vec::len)
    }

    /// Record a new value for `key` and invoke every callback registered for it.
    pub fn dispatch(&self, key: &str, value: Value) {
        {
            let mut data = self.data.lock().unwrap_or_else(|e| e.into_inner());
            data.insert(key.to_string(), value.clone());
        }
        {
            let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(callbacks) = subscribers.get_mut(key) {
                for (_, callback) in callbacks.iter_mut() {
                    callback(&value);
                }
            }
        }
        self.changed.notify_waiters();
    }

    pub fn get_nowait(&self, key: &str) -> Option<Value> {
        let data = self.data.lock().unwrap_or_else(|e| e.into_inner());
        data.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        let data = self.data.lock().unwrap_or_else(|e| e.into_inner());
        data.contains_key(key)
    }

    pub fn data(&self) -> BTreeMap<String, Value> {
        self.data.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Wait until a value for `key` is available.
    pub async fn get(&self, key: &str, timeout: Duration) -> Result<Value, Error> {
        let wait = async {
            loop {
                // Created before the check so a dispatch in between is not missed.
                let changed = self.changed.notified();
                if let Some(value) = self.get_nowait(key) {
                    return value;
                }
                changed.await;
            }
        };
        tokio::time::timeout(timeout, wait).await.map_err(|_| Error::Timeout {
            key: key.to_string(),
            timeout,
        })
    }

    /// Carry out `command` the way the controller would, reporting the written value back.
    ///
    /// Parameters keep their allowed range. Commands for unknown mixers are dropped.
    pub fn apply_command(&self, command: DeviceCommand) {
        let target = match command.mixer {
            None => None,
            Some(index) => match self.mixer(index) {
                Some(mixer) => Some(mixer),
                None => {
                    tracing::debug!(index, key = %command.key, "command for an unknown mixer");
                    return;
                }
            },
        };
        let device = target.as_deref().unwrap_or(self);
        let value = match (device.get_nowait(&command.key), command.value.as_f64()) {
            (Some(Value::Parameter(parameter)), Some(value)) => {
                Value::Parameter(Parameter { value, ..parameter })
            }
            _ => command.value,
        };
        device.dispatch(&command.key, value);
    }

    /// Queue a write to the device without waiting for it to be carried out.
    pub fn set_nowait(&self, key: &str, value: Value) {
        let command = DeviceCommand { mixer: self.index, key: key.to_string(), value };
        if let Err(e) = self.commands.send(command) {
            tracing::debug!(key, mixer = self.index, command = ?e.0, "command sink is closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::mpsc;

    fn device() -> (Device, mpsc::UnboundedReceiver<DeviceCommand>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Device::new(sender), receiver)
    }

    fn counter() -> (Arc<AtomicUsize>, Callback) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        (count, Box::new(move |_: &Value| {
            c.fetch_add(1, Ordering::SeqCst);
        }))
    }

    #[test]
    fn dispatch_only_reaches_callbacks_of_that_key() {
        let (device, _) = device();
        let (pump, pump_callback) = counter();
        let (fan, fan_callback) = counter();
        device.register_callback("heating_pump", pump_callback);
        device.register_callback("fan", fan_callback);
        device.dispatch("heating_pump", Value::Bool(true));
        device.dispatch("heating_pump", Value::Bool(false));
        assert_eq!(pump.load(Ordering::SeqCst), 2);
        assert_eq!(fan.load(Ordering::SeqCst), 0);
        assert_eq!(device.get_nowait("heating_pump"), Some(Value::Bool(false)));
    }

    #[test]
    fn removing_unknown_registration_is_a_noop() {
        let (device, _) = device();
        let (count, callback) = counter();
        let id = device.register_callback("fan", callback);
        assert!(!device.remove_callback("feeder", id));
        assert!(device.remove_callback("fan", id));
        assert!(!device.remove_callback("fan", id));
        device.dispatch("fan", Value::Bool(true));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(device.callback_count("fan"), 0);
    }

    #[test]
    fn on_change_suppresses_repeated_values() {
        let (device, _) = device();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        device.register_callback("heating_temp", on_change(move |v| {
            s.lock().unwrap().push(v.clone());
        }));
        for v in [5.0, 5.0, 6.0, 5.0] {
            device.dispatch("heating_temp", Value::Number(v));
        }
        let seen = seen.lock().unwrap();
        assert_eq!(*seen, vec![Value::Number(5.0), Value::Number(6.0), Value::Number(5.0)]);
    }

    #[test]
    fn set_nowait_carries_the_mixer_index() {
        let (device, mut commands) = device();
        let mixer = device.add_mixer(1);
        device.set_nowait("heating_target_temp", Value::Number(60.0));
        mixer.set_nowait("mixer_target_temp", Value::Number(40.0));
        let first = commands.try_recv().unwrap();
        assert_eq!(first.mixer, None);
        assert_eq!(first.key, "heating_target_temp");
        let second = commands.try_recv().unwrap();
        assert_eq!(second.mixer, Some(1));
        assert_eq!(second.value, Value::Number(40.0));
    }

    #[test]
    fn applied_commands_keep_parameter_ranges() {
        let (device, mut commands) = device();
        let parameter = Parameter { value: 60.0, min_value: 40.0, max_value: 80.0 };
        device.dispatch("heating_target_temp", Value::Parameter(parameter));
        device.add_mixer(0).dispatch("summer_work", Value::Bool(false));
        device.set_nowait("heating_target_temp", Value::Number(65.0));
        device.mixer(0).unwrap().set_nowait("summer_work", Value::Number(1.0));
        device.apply_command(commands.try_recv().unwrap());
        device.apply_command(commands.try_recv().unwrap());
        assert_eq!(
            device.get_nowait("heating_target_temp"),
            Some(Value::Parameter(Parameter { value: 65.0, min_value: 40.0, max_value: 80.0 }))
        );
        let mixer = device.mixer(0).unwrap();
        assert_eq!(mixer.get_nowait("summer_work"), Some(Value::Number(1.0)));
        device.apply_command(DeviceCommand { mixer: Some(7), key: "x".into(), value: Value::Bool(true) });
        assert!(device.mixer(7).is_none());
    }

    #[test]
    fn set_nowait_tolerates_a_closed_sink() {
        let (device, commands) = device();
        drop(commands);
        device.set_nowait("fan", Value::Bool(true));
    }

    #[test]
    fn add_mixer_is_idempotent_and_announces_count() {
        let (device, _) = device();
        let a = device.add_mixer(0);
        let b = device.add_mixer(0);
        assert!(Arc::ptr_eq(&a, &b));
        device.add_mixer(2);
        assert_eq!(device.get_nowait(ATTR_MIXERS), Some(Value::Number(2.0)));
        let indexes = device.mixers().into_iter().map(|(i, _)| i).collect::<Vec<_>>();
        assert_eq!(indexes, vec![0, 2]);
        assert_eq!(device.mixer(2).and_then(|m| m.index()), Some(2));
    }

    #[tokio::test]
    async fn get_waits_for_a_dispatch() {
        let (sender, _receiver) = mpsc::unbounded_channel();
        let device = Arc::new(Device::new(sender));
        let d = Arc::clone(&device);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            d.add_mixer(0);
        });
        let value = device.get(ATTR_MIXERS, Duration::from_secs(5)).await.unwrap();
        assert_eq!(value, Value::Number(1.0));
    }

    #[tokio::test]
    async fn get_times_out() {
        let (device, _) = device();
        let err = device.get(ATTR_MIXERS, Duration::from_millis(10)).await.unwrap_err();
        assert!(matches!(err, Error::Timeout { ref key, .. } if key == ATTR_MIXERS));
    }

    #[test]
    fn values_deserialize_untagged() {
        let value: Value = serde_json::from_str(r#"{"value": 60, "min_value": 40, "max_value": 80}"#)
            .unwrap();
        assert_eq!(value.as_f64(), Some(60.0));
        assert_eq!(value.as_parameter().map(|p| p.max_value), Some(80.0));
        let value: Value = serde_json::from_str("true").unwrap();
        assert_eq!(value, Value::Bool(true));
        let value: Value = serde_json::from_str("2").unwrap();
        assert_eq!(value.as_bool(), Some(true));
        let value: Value =
            serde_json::from_str(r#"[{"code": 0, "from": "2024-01-02T10:00:00"}]"#).unwrap();
        assert!(matches!(value, Value::Alerts(ref a) if a.len() == 1 && a[0].to.is_none()));
    }
}
