//! Publishing entities as a Homie 5 device.
//!
//! Top-level entities live in the `ecomax` node and entities of each mixer in a `mixer-<n>` node.
//! Every entity is a property, keyed by its descriptor key with underscores replaced by dashes.

use crate::connection::EcomaxConnection;
use crate::descriptor::{Kind, Platform, SensorType, StateValue};
use crate::device::DeviceCommand;
use crate::entity::{self, Entity, EntityState, StateWrite};
use homie5::client::{Publish, QoS, Subscription};
use homie5::device_description::{
    DeviceDescriptionBuilder, FloatRange, HomieDeviceDescription, HomieNodeDescription,
    HomiePropertyDescription, HomiePropertyFormat, PropertyDescriptionBuilder,
};
use homie5::{Homie5DeviceProtocol, HomieDataType, HomieDeviceStatus, HomieID, PropertyRef};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub const PRESS: &str = "press";

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("could not publish to the MQTT broker")]
    Publish(#[source] rumqttc::v5::ClientError),
    #[error("could not subscribe to property commands")]
    Subscribe(#[source] rumqttc::v5::ClientError),
    #[error("could not produce the Homie device description")]
    Description(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("`{0}` is not a valid Homie ID")]
    InvalidId(String),
}

#[derive(thiserror::Error, Debug)]
pub enum SetError {
    #[error("{node}/{property} is not a known property")]
    UnknownProperty { node: HomieID, property: HomieID },
    #[error("`{value}` is not a valid value for {unique_id}")]
    InvalidValue { unique_id: String, value: String },
    #[error("{unique_id} cannot be set")]
    NotSettable { unique_id: String },
    #[error("could not carry out the command")]
    Entity(#[source] entity::Error),
}

pub fn homie_id(id: String) -> Result<HomieID, Error> {
    HomieID::try_from(id.clone()).map_err(|_| Error::InvalidId(id))
}

pub fn node_id(mixer: Option<u8>) -> Result<HomieID, Error> {
    match mixer {
        None => Ok(HomieID::new_const("ecomax")),
        Some(index) => homie_id(format!("mixer-{index}")),
    }
}

pub fn property_id(key: &str) -> Result<HomieID, Error> {
    homie_id(key.replace('_', "-"))
}

/// Homie device ID derived from the controller UID.
pub fn device_id(uid: &str) -> Result<HomieID, Error> {
    let uid = uid
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect::<String>();
    homie_id(format!("ecomax-{uid}"))
}

pub fn property_description(entity: &Entity) -> HomiePropertyDescription {
    let description = entity.description();
    let builder = match description.kind {
        Kind::Number { step, .. } => {
            let state = entity.current_state();
            PropertyDescriptionBuilder::new(HomieDataType::Float)
                .format(FloatRange { min: state.min, max: state.max, step: Some(step) })
                .settable(true)
        }
        Kind::BinarySensor { .. } => PropertyDescriptionBuilder::new(HomieDataType::Boolean),
        Kind::Sensor { datatype: SensorType::Numeric, .. } => {
            PropertyDescriptionBuilder::new(HomieDataType::Float)
        }
        Kind::Sensor { datatype: SensorType::Text, .. } => {
            PropertyDescriptionBuilder::new(HomieDataType::String)
        }
        Kind::Switch { .. } => {
            PropertyDescriptionBuilder::new(HomieDataType::Boolean).settable(true)
        }
        Kind::Select { options } => PropertyDescriptionBuilder::new(HomieDataType::Enum)
            .format(HomiePropertyFormat::Enum(options.iter().map(|o| o.to_string()).collect()))
            .settable(true),
        Kind::Button { .. } => PropertyDescriptionBuilder::new(HomieDataType::Enum)
            .format(HomiePropertyFormat::Enum(vec![PRESS.to_string()]))
            .settable(true)
            .retained(false),
    };
    let builder = match description.unit {
        Some(unit) => builder.unit(unit),
        None => builder,
    };
    let mut property = builder.build();
    property.name = Some(entity.name());
    property
}

/// The payload published for `state`, if the state is known.
pub fn format_state(state: &EntityState) -> Option<String> {
    state.native.as_ref().map(|native| match native {
        StateValue::On(on) => on.to_string(),
        StateValue::Number(n) => n.to_string(),
        StateValue::Text(t) => t.clone(),
    })
}

type PropertyPath = (HomieID, HomieID);

/// Entities arranged into Homie nodes.
pub struct Nodes {
    entities: BTreeMap<PropertyPath, Entity>,
    paths: BTreeMap<String, PropertyPath>,
}

impl Nodes {
    pub fn new(entities: Vec<Entity>) -> Result<Self, Error> {
        let mut nodes = Self { entities: BTreeMap::new(), paths: BTreeMap::new() };
        nodes.extend(entities)?;
        Ok(nodes)
    }

    /// Add `entities`, skipping those whose property is already taken. Returns the paths of the
    /// entities that were added.
    pub fn extend(&mut self, entities: Vec<Entity>) -> Result<Vec<PropertyPath>, Error> {
        let mut added = Vec::new();
        for entity in entities {
            let path = (node_id(entity.mixer_index())?, property_id(entity.description().key)?);
            if self.entities.contains_key(&path) {
                warn!(unique_id = %entity.unique_id(), "skipping an entity with a duplicate property");
                continue;
            }
            self.paths.insert(entity.unique_id(), path.clone());
            self.entities.insert(path.clone(), entity);
            added.push(path);
        }
        Ok(added)
    }

    pub fn description(&self, name: &str) -> HomieDeviceDescription {
        let mut nodes = BTreeMap::<HomieID, HomieNodeDescription>::new();
        for ((node, property), entity) in &self.entities {
            let node_description = nodes.entry(node.clone()).or_insert_with(|| {
                let node_name = match entity.mixer_index() {
                    None => name.to_string(),
                    Some(index) => {
                        let noun = entity.connection().product_type().sub_device_noun();
                        format!("{name} {noun} {}", u16::from(index) + 1)
                    }
                };
                HomieNodeDescription { name: Some(node_name), r#type: None, properties: BTreeMap::new() }
            });
            node_description.properties.insert(property.clone(), property_description(entity));
        }
        let mut description = DeviceDescriptionBuilder::new().name(name);
        for (node, node_description) in nodes {
            description = description.add_node(node, node_description);
        }
        description.build()
    }

    pub fn path(&self, unique_id: &str) -> Option<&PropertyPath> {
        self.paths.get(unique_id)
    }

    pub fn entities(&self) -> impl Iterator<Item = (&PropertyPath, &Entity)> {
        self.entities.iter()
    }

    pub fn attach(&mut self, writes: &mpsc::UnboundedSender<StateWrite>) -> usize {
        self.entities.values_mut().map(|e| e.attach(writes.clone())).filter(|attached| *attached).count()
    }

    /// Carry out a Homie `set` for the property at `node`/`property`.
    ///
    /// Returns the entities a button press created, for the caller to add.
    pub async fn set(
        &self,
        node: &HomieID,
        property: &HomieID,
        value: &str,
    ) -> Result<Vec<Entity>, SetError> {
        let Some(entity) = self.entities.get(&(node.clone(), property.clone())) else {
            return Err(SetError::UnknownProperty { node: node.clone(), property: property.clone() });
        };
        let invalid = || SetError::InvalidValue { unique_id: entity.unique_id(), value: value.to_string() };
        match entity.platform() {
            Platform::Number => {
                let value = value.trim().parse::<f64>().map_err(|_| invalid())?;
                entity.set_native_value(value).map_err(SetError::Entity)?;
            }
            Platform::Switch => match value.trim() {
                "true" => entity.turn_on().map_err(SetError::Entity)?,
                "false" => entity.turn_off().map_err(SetError::Entity)?,
                _ => return Err(invalid()),
            },
            Platform::Select => entity.select_option(value.trim()).map_err(|e| match e {
                entity::Error::UnknownOption { .. } => invalid(),
                e => SetError::Entity(e),
            })?,
            Platform::Button if value.trim() == PRESS => {
                return entity.press().await.map_err(SetError::Entity);
            }
            Platform::Button => return Err(invalid()),
            Platform::BinarySensor | Platform::Sensor => {
                return Err(SetError::NotSettable { unique_id: entity.unique_id() });
            }
        }
        Ok(Vec::new())
    }
}

pub struct EcomaxDevice {
    mqtt: rumqttc::v5::AsyncClient,
    protocol: Homie5DeviceProtocol,
    state: HomieDeviceStatus,
    description: HomieDeviceDescription,
    connection: Arc<EcomaxConnection>,
    nodes: Nodes,
    write_sender: mpsc::UnboundedSender<StateWrite>,
    writes: mpsc::UnboundedReceiver<StateWrite>,
    device_commands: mpsc::UnboundedReceiver<DeviceCommand>,
    commands: mpsc::UnboundedReceiver<Command>,
}

impl EcomaxDevice {
    /// `device_commands` receives the writes entities issue. They are applied back to the device
    /// as if the controller carried them out.
    pub fn new(
        mqtt: rumqttc::v5::AsyncClient,
        protocol: Homie5DeviceProtocol,
        connection: Arc<EcomaxConnection>,
        entities: Vec<Entity>,
        device_commands: mpsc::UnboundedReceiver<DeviceCommand>,
        commands: mpsc::UnboundedReceiver<Command>,
    ) -> Result<Self, Error> {
        let mut nodes = Nodes::new(entities)?;
        let description = nodes.description(connection.name());
        let (write_sender, writes) = mpsc::unbounded_channel();
        let attached = nodes.attach(&write_sender);
        debug!(attached, "attached entities");
        Ok(Self {
            mqtt,
            protocol,
            state: HomieDeviceStatus::Init,
            description,
            connection,
            nodes,
            write_sender,
            writes,
            device_commands,
            commands,
        })
    }

    pub async fn publish_device(&mut self) -> Result<(), Error> {
        for step in homie5::homie_device_publish_steps() {
            match step {
                homie5::DevicePublishStep::DeviceStateInit => {
                    self.state = HomieDeviceStatus::Init;
                    let p = self.protocol.publish_state(self.state);
                    self.mqtt.homie_publish(p).await.map_err(Error::Publish)?;
                }
                homie5::DevicePublishStep::DeviceDescription => {
                    let p = self
                        .protocol
                        .publish_description(&self.description)
                        .map_err(|e| Error::Description(e.into()))?;
                    self.mqtt.homie_publish(p).await.map_err(Error::Publish)?;
                }
                homie5::DevicePublishStep::PropertyValues => {
                    let mut publishes = Vec::new();
                    for ((node, property), entity) in self.nodes.entities() {
                        let Some(value) = format_state(&entity.current_state()) else {
                            continue;
                        };
                        let retained = self.retained(node, property);
                        publishes.push(self.protocol.publish_value(node, property, value, retained));
                    }
                    for p in publishes {
                        self.mqtt.homie_publish(p).await.map_err(Error::Publish)?;
                    }
                    // Let rumqttc flush the values before `$state = ready` goes out.
                    tokio::task::yield_now().await;
                }
                homie5::DevicePublishStep::SubscribeProperties => {
                    let mut p = self
                        .protocol
                        .subscribe_props(&self.description)
                        .map_err(|e| Error::Description(e.into()))?
                        .peekable();
                    if p.peek().is_some() {
                        self.mqtt.homie_subscribe(p).await.map_err(Error::Subscribe)?;
                    }
                }
                homie5::DevicePublishStep::DeviceStateReady => {
                    debug!("device becomes ready...");
                    self.state = HomieDeviceStatus::Ready;
                    let p = self.protocol.publish_state(self.state);
                    self.mqtt.homie_publish(p).await.map_err(Error::Publish)?;
                }
            }
        }
        info!(device = %self.protocol.device_ref().device_id(), "published the device");
        Ok(())
    }

    fn retained(&self, node: &HomieID, property: &HomieID) -> bool {
        self.description
            .get_property_by_id(node, property)
            .is_none_or(|p| p.retained)
    }

    async fn handle_write(&mut self, write: StateWrite) -> Result<(), Error> {
        let Some((node, property)) = self.nodes.path(&write.unique_id) else {
            warn!(unique_id = %write.unique_id, "state write for an unknown property");
            return Ok(());
        };
        let Some(value) = format_state(&write.state) else {
            return Ok(());
        };
        let retained = self.retained(node, property);
        let p = self.protocol.publish_value(node, property, value, retained);
        self.mqtt.homie_publish(p).await.map_err(Error::Publish)
    }

    /// Attach entities created at runtime and republish the device with their properties.
    async fn add_entities(&mut self, entities: Vec<Entity>) -> Result<(), Error> {
        let added = self.nodes.extend(entities)?;
        let attached = self.nodes.attach(&self.write_sender);
        info!(added = added.len(), attached, "adding entities");
        if added.is_empty() {
            return Ok(());
        }
        self.description = self.nodes.description(self.connection.name());
        self.publish_device().await
    }

    async fn handle_command(&mut self, command: Command) -> Result<(), Error> {
        match command {
            Command::Set { property, value } => {
                if property.device_id() != self.protocol.device_ref().device_id() {
                    debug!(device = %property.device_id(), "command for another device");
                    return Ok(());
                }
                let result = self.nodes.set(property.node_id(), property.prop_id(), &value).await;
                match result {
                    Ok(created) if created.is_empty() => Ok(()),
                    Ok(created) => self.add_entities(created).await,
                    Err(e) => {
                        warn!(
                            message = "could not set a property",
                            node = %property.node_id(),
                            property = %property.prop_id(),
                            error = (&e as &dyn std::error::Error)
                        );
                        Ok(())
                    }
                }
            }
        }
    }

    /// Handle a single event. Returns `false` once there is nothing left to handle.
    pub async fn step(&mut self) -> Result<bool, Error> {
        tokio::select! {
            write = self.writes.recv() => match write {
                Some(write) => self.handle_write(write).await.map(|()| true),
                None => Ok(false),
            },
            command = self.device_commands.recv() => match command {
                Some(command) => {
                    debug!(key = %command.key, mixer = command.mixer, value = %command.value, "applying a command");
                    self.connection.device().apply_command(command);
                    Ok(true)
                }
                None => Ok(false),
            },
            command = self.commands.recv() => match command {
                Some(command) => self.handle_command(command).await.map(|()| true),
                None => Ok(false),
            },
        }
    }
}

trait MqttClientExt {
    type PublishError;
    type SubscribeError;
    async fn homie_publish(&self, p: Publish) -> Result<(), Self::PublishError>;
    async fn homie_subscribe(
        &self,
        subs: impl Iterator<Item = Subscription> + Send,
    ) -> Result<(), Self::SubscribeError>;
}

impl MqttClientExt for rumqttc::v5::AsyncClient {
    type PublishError = rumqttc::v5::ClientError;
    type SubscribeError = rumqttc::v5::ClientError;
    async fn homie_publish(&self, p: Publish) -> Result<(), Self::PublishError> {
        self.publish(p.topic, convert_qos(p.qos), p.retain, p.payload).await
    }

    async fn homie_subscribe(
        &self,
        subs: impl Iterator<Item = Subscription> + Send,
    ) -> Result<(), Self::SubscribeError> {
        self.subscribe_many(
            subs.map(|sub| rumqttc::v5::mqttbytes::v5::Filter::new(sub.topic, convert_qos(sub.qos))),
        )
        .await
    }
}

pub fn convert_qos(homie: QoS) -> rumqttc::v5::mqttbytes::QoS {
    match homie {
        QoS::AtMostOnce => rumqttc::v5::mqttbytes::QoS::AtMostOnce,
        QoS::AtLeastOnce => rumqttc::v5::mqttbytes::QoS::AtLeastOnce,
        QoS::ExactlyOnce => rumqttc::v5::mqttbytes::QoS::ExactlyOnce,
    }
}

pub enum Command {
    Set { property: PropertyRef, value: String },
}

impl Command {
    pub fn try_from_mqtt_command(
        msg: rumqttc::v5::mqttbytes::v5::Publish,
    ) -> Result<Self, rumqttc::v5::mqttbytes::v5::Publish> {
        let Ok(topic) = str::from_utf8(&msg.topic) else {
            return Err(msg);
        };
        match homie5::parse_mqtt_message(topic, &msg.payload) {
            Ok(homie5::Homie5Message::PropertySet { property, set_value }) => {
                Ok(Self::Set { property, value: set_value })
            }
            _ => Err(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Parameter, Value};
    use crate::entity::tests::connection;
    use crate::product::ProductType;
    use crate::setup;

    #[test]
    fn ids_follow_homie_rules() {
        assert_eq!(node_id(None).unwrap().to_string(), "ecomax");
        assert_eq!(node_id(Some(2)).unwrap().to_string(), "mixer-2");
        assert_eq!(property_id("heating_target_temp").unwrap().to_string(), "heating-target-temp");
        assert_eq!(device_id("D251PAKR3G_CPZ").unwrap().to_string(), "ecomax-d251pakr3gcpz");
    }

    #[test]
    fn state_payloads() {
        let state = |native| EntityState { native, min: None, max: None };
        assert_eq!(format_state(&state(Some(StateValue::On(true)))).as_deref(), Some("true"));
        assert_eq!(format_state(&state(Some(StateValue::Number(61.5)))).as_deref(), Some("61.5"));
        assert_eq!(format_state(&state(Some(StateValue::Text("auto".into())))).as_deref(), Some("auto"));
        assert_eq!(format_state(&state(None)), None);
    }

    #[tokio::test]
    async fn nodes_group_entities_by_mixer() {
        let (connection, _) = connection(
            ProductType::EcomaxP,
            serde_json::json!({
                "heating_target_temp": {"value": 60, "min_value": 40, "max_value": 80},
            }),
        );
        connection.device().add_mixer(0);
        let mut entities = setup::top_level_entities(&connection, crate::catalog::descriptions(Platform::Number));
        entities.extend(setup::mixer_entities(
            &connection,
            crate::catalog::mixer_descriptions(Platform::Switch),
            &[0],
        ));
        let nodes = Nodes::new(entities).unwrap();
        let description = nodes.description("ecoMAX");
        let target = description
            .get_property_by_id(&node_id(None).unwrap(), &property_id("heating_target_temp").unwrap())
            .unwrap();
        assert!(target.settable);
        assert_eq!(target.datatype, HomieDataType::Float);
        assert_eq!(target.name.as_deref(), Some("ecoMAX Heating temperature"));
        let summer = description
            .get_property_by_id(&node_id(Some(0)).unwrap(), &property_id("summer_work").unwrap())
            .unwrap();
        assert_eq!(summer.datatype, HomieDataType::Boolean);
        let mixer = description.nodes.get(&node_id(Some(0)).unwrap()).unwrap();
        assert_eq!(mixer.name.as_deref(), Some("ecoMAX mixer 1"));
        assert_eq!(nodes.path("UID-mixer-0-summer_work").map(|p| p.0.to_string()).as_deref(), Some("mixer-0"));
    }

    #[tokio::test]
    async fn set_commands_reach_the_device() {
        let (connection, mut commands) = connection(ProductType::EcomaxP, serde_json::json!({}));
        let mut entities = setup::top_level_entities(&connection, crate::catalog::descriptions(Platform::Number));
        entities.extend(setup::top_level_entities(&connection, crate::catalog::descriptions(Platform::Select)));
        entities.extend(setup::top_level_entities(&connection, crate::catalog::descriptions(Platform::Sensor)));
        let nodes = Nodes::new(entities).unwrap();
        let ecomax = node_id(None).unwrap();

        nodes.set(&ecomax, &property_id("heating_target_temp").unwrap(), "62.5").await.unwrap();
        let command = commands.try_recv().unwrap();
        assert_eq!(command.key, "heating_target_temp");
        assert_eq!(command.value, Value::Number(62.5));

        nodes.set(&ecomax, &property_id("summer_mode").unwrap(), "auto").await.unwrap();
        assert_eq!(commands.try_recv().unwrap().value, Value::Number(2.0));

        let err = nodes.set(&ecomax, &property_id("summer_mode").unwrap(), "spring").await.err().unwrap();
        assert!(matches!(err, SetError::InvalidValue { .. }));
        let err = nodes.set(&ecomax, &property_id("heating_temp").unwrap(), "1").await.err().unwrap();
        assert!(matches!(err, SetError::NotSettable { .. }));
        let err = nodes.set(&ecomax, &property_id("fan").unwrap(), "true").await.err().unwrap();
        assert!(matches!(err, SetError::UnknownProperty { .. }));
        assert!(commands.try_recv().is_err());

        connection.device().apply_command(crate::device::DeviceCommand {
            mixer: None,
            key: "heating_target_temp".into(),
            value: Value::Parameter(Parameter { value: 62.5, min_value: 40.0, max_value: 80.0 }),
        });
        let (_, entity) = nodes
            .entities()
            .find(|(_, e)| e.description().key == "heating_target_temp")
            .unwrap();
        assert_eq!(format_state(&entity.current_state()).as_deref(), Some("62.5"));
    }

    #[tokio::test]
    async fn pressing_detect_sub_devices_adds_mixer_nodes() {
        let (connection, _) =
            connection(ProductType::EcomaxP, serde_json::json!({"mixer_count": 2}));
        connection.device().add_mixer(0);
        let mut nodes = Nodes::new(setup::setup_all(&connection).await).unwrap();
        let (writes, mut receiver) = mpsc::unbounded_channel();
        nodes.attach(&writes);
        assert!(nodes.description("ecoMAX").nodes.get(&node_id(Some(1)).unwrap()).is_none());

        let mixer = connection.device().add_mixer(1);
        let ecomax = node_id(None).unwrap();
        let button = property_id("detect_sub_devices").unwrap();
        let err = nodes.set(&ecomax, &button, "hold").await.err().unwrap();
        assert!(matches!(err, SetError::InvalidValue { .. }));
        let created = nodes.set(&ecomax, &button, PRESS).await.unwrap();
        let added = nodes.extend(created).unwrap();
        assert!(!added.is_empty());
        assert!(added.iter().all(|(node, _)| node.to_string() == "mixer-1"));
        assert_eq!(nodes.attach(&writes), added.len());

        let description = nodes.description("ecoMAX");
        let node = description.nodes.get(&node_id(Some(1)).unwrap()).unwrap();
        assert_eq!(node.name.as_deref(), Some("ecoMAX mixer 2"));
        mixer.dispatch("current_temp", Value::Number(33.0));
        assert_eq!(receiver.try_recv().unwrap().unique_id, "UID-mixer-1-current_temp");
        assert!(nodes.set(&ecomax, &button, PRESS).await.unwrap().is_empty());
    }
}
