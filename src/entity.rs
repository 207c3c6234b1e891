//! Entities bind a descriptor to a device (or one of its mixers) and mirror the value the
//! descriptor's key reports.

use crate::connection::EcomaxConnection;
use crate::descriptor::{ButtonAction, EntityDescription, Kind, Platform, StateValue};
use crate::device::{ATTR_CONNECTED, CallbackId, Device, Value, on_change};
use crate::setup;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, trace, warn};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("`{option}` is not an option of {unique_id}")]
    UnknownOption { unique_id: String, option: String },
    #[error("{unique_id} is a {platform} and does not accept this command")]
    Unsupported { unique_id: String, platform: Platform },
    #[error("mixer {index} is not known to the controller")]
    MissingMixer { index: u8 },
}

/// The last state an entity mirrored from its device.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
pub struct EntityState {
    pub native: Option<StateValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl EntityState {
    fn update(&mut self, kind: &Kind, value: &Value) {
        match *kind {
            Kind::Number { .. } => {
                self.native = value.as_f64().map(StateValue::Number);
                if let Some(parameter) = value.as_parameter() {
                    self.min = Some(parameter.min_value);
                    self.max = Some(parameter.max_value);
                }
            }
            Kind::BinarySensor { is_on } => self.native = is_on(value).map(StateValue::On),
            Kind::Sensor { state, .. } => self.native = state(value),
            Kind::Switch { state_on, state_off, extra_states } => {
                self.native = value.as_f64().and_then(|v| {
                    if v == state_on {
                        Some(true)
                    } else if v == state_off {
                        Some(false)
                    } else {
                        extra_states.iter().find(|(s, _)| *s == v).map(|(_, on)| *on)
                    }
                }).map(StateValue::On);
            }
            Kind::Select { options } => {
                self.native = value
                    .as_f64()
                    .filter(|v| *v >= 0.0 && v.fract() == 0.0)
                    .and_then(|v| options.get(v as usize))
                    .map(|option| StateValue::Text(option.to_string()));
            }
            Kind::Button { .. } => {}
        }
    }
}

/// Emitted whenever an attached entity's mirrored state changes.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct StateWrite {
    pub unique_id: String,
    pub state: EntityState,
}

pub struct Entity {
    connection: Arc<EcomaxConnection>,
    description: &'static EntityDescription,
    index: Option<u8>,
    state: Arc<Mutex<EntityState>>,
    registration: Option<(Arc<Device>, CallbackId)>,
}

impl Entity {
    pub fn new(connection: Arc<EcomaxConnection>, description: &'static EntityDescription) -> Self {
        Self::with_index(connection, description, None)
    }

    /// An entity of the mixer with the zero-based `index`.
    pub fn for_mixer(
        connection: Arc<EcomaxConnection>,
        description: &'static EntityDescription,
        index: u8,
    ) -> Self {
        Self::with_index(connection, description, Some(index))
    }

    fn with_index(
        connection: Arc<EcomaxConnection>,
        description: &'static EntityDescription,
        index: Option<u8>,
    ) -> Self {
        Self { connection, description, index, state: Default::default(), registration: None }
    }

    pub fn connection(&self) -> &Arc<EcomaxConnection> {
        &self.connection
    }

    pub fn description(&self) -> &'static EntityDescription {
        self.description
    }

    pub fn platform(&self) -> Platform {
        self.description.platform()
    }

    pub fn mixer_index(&self) -> Option<u8> {
        self.index
    }

    pub fn unique_id(&self) -> String {
        let uid = self.connection.uid();
        let key = self.description.key;
        match self.index {
            None => format!("{uid}-{key}"),
            Some(index) => format!("{uid}-mixer-{index}-{key}"),
        }
    }

    pub fn name(&self) -> String {
        let prefix = self.connection.name();
        let name = self.description.name;
        match self.index {
            None => format!("{prefix} {name}"),
            Some(index) => {
                let noun = self.connection.product_type().sub_device_noun();
                format!("{prefix} {noun} {} {name}", u16::from(index) + 1)
            }
        }
    }

    pub fn available(&self) -> bool {
        self.description.always_available
            || self.connection.device().get_nowait(ATTR_CONNECTED).and_then(|v| v.as_bool())
                == Some(true)
    }

    pub fn enabled_by_default(&self) -> bool {
        if self.platform() == Platform::Button {
            return true;
        }
        match self.index {
            None => self.connection.capabilities().contains(self.description.key),
            Some(_) => self.device().is_some_and(|d| d.contains(self.description.key)),
        }
    }

    /// The device this entity follows: the controller, or the mixer it belongs to.
    pub fn device(&self) -> Option<Arc<Device>> {
        match self.index {
            None => Some(Arc::clone(self.connection.device())),
            Some(index) => self.connection.device().mixer(index),
        }
    }

    pub fn state(&self) -> EntityState {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// The state this entity would mirror given the value its device holds right now.
    pub fn current_state(&self) -> EntityState {
        let mut state = EntityState::default();
        if let Some(value) = self.device().and_then(|d| d.get_nowait(self.description.key)) {
            state.update(&self.description.kind, &value);
        }
        state
    }

    pub fn is_attached(&self) -> bool {
        self.registration.is_some()
    }

    /// Start mirroring the device value of this entity's key.
    ///
    /// Every change of the mirrored state is also sent to `writes`. Returns `false` without
    /// registering anything if the entity is already attached, is a button, or its mixer is gone.
    pub fn attach(&mut self, writes: UnboundedSender<StateWrite>) -> bool {
        if self.registration.is_some() || self.platform() == Platform::Button {
            return false;
        }
        let Some(device) = self.device() else {
            warn!(unique_id = %self.unique_id(), mixer = self.index, "mixer is gone, not attaching");
            return false;
        };
        let unique_id = self.unique_id();
        let kind = self.description.kind;
        let state = Arc::clone(&self.state);
        let callback = on_change(move |value: &Value| {
            let snapshot = {
                let mut state = state.lock().unwrap_or_else(|e| e.into_inner());
                state.update(&kind, value);
                state.clone()
            };
            trace!(unique_id = %unique_id, state = ?snapshot.native, "state updated");
            let write = StateWrite { unique_id: unique_id.clone(), state: snapshot };
            if writes.send(write).is_err() {
                trace!(unique_id = %unique_id, "nobody is listening for state writes");
            }
        });
        let id = device.register_callback(self.description.key, callback);
        debug!(unique_id = %self.unique_id(), "attached");
        self.registration = Some((device, id));
        true
    }

    /// Stop mirroring. Returns `false` if the entity was not attached.
    pub fn detach(&mut self) -> bool {
        let Some((device, id)) = self.registration.take() else {
            return false;
        };
        let removed = device.remove_callback(self.description.key, id);
        debug!(unique_id = %self.unique_id(), removed, "detached");
        removed
    }

    fn unsupported(&self) -> Error {
        Error::Unsupported { unique_id: self.unique_id(), platform: self.platform() }
    }

    fn send(&self, value: Value) -> Result<(), Error> {
        match self.index {
            None => self.connection.device().set_nowait(self.description.key, value),
            Some(index) => self
                .connection
                .device()
                .mixer(index)
                .ok_or(Error::MissingMixer { index })?
                .set_nowait(self.description.key, value),
        }
        Ok(())
    }

    pub fn set_native_value(&self, value: f64) -> Result<(), Error> {
        let Kind::Number { .. } = self.description.kind else {
            return Err(self.unsupported());
        };
        self.send(Value::Number(value))
    }

    fn set_switch(&self, on: bool) -> Result<(), Error> {
        let Kind::Switch { state_on, state_off, .. } = self.description.kind else {
            return Err(self.unsupported());
        };
        self.send(Value::Number(if on { state_on } else { state_off }))
    }

    pub fn turn_on(&self) -> Result<(), Error> {
        self.set_switch(true)
    }

    pub fn turn_off(&self) -> Result<(), Error> {
        self.set_switch(false)
    }

    pub fn select_option(&self, option: &str) -> Result<(), Error> {
        let Kind::Select { options } = self.description.kind else {
            return Err(self.unsupported());
        };
        let position = options.iter().position(|o| *o == option).ok_or_else(|| {
            Error::UnknownOption { unique_id: self.unique_id(), option: option.to_string() }
        })?;
        self.send(Value::Number(position as f64))
    }

    /// Carry out the button's action.
    ///
    /// Returns the entities the action created. They are not attached yet.
    pub async fn press(&self) -> Result<Vec<Entity>, Error> {
        let Kind::Button { action } = self.description.kind else {
            return Err(self.unsupported());
        };
        match action {
            ButtonAction::DetectSubDevices => {
                let found = self.connection.detect_sub_devices().await;
                Ok(setup::sub_device_entities(&self.connection, &found))
            }
        }
    }
}

impl Drop for Entity {
    fn drop(&mut self) {
        self.detach();
    }
}
