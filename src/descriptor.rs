use crate::device::Value;
use crate::product::{Module, ProductType};

/// Which values of `T` a descriptor applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Applicability<T: 'static> {
    All,
    /// Applies only to the listed values. An empty list applies to nothing.
    Only(&'static [T]),
}

impl<T: PartialEq + 'static> Applicability<T> {
    pub fn contains(&self, value: &T) -> bool {
        match self {
            Applicability::All => true,
            Applicability::Only(values) => values.contains(value),
        }
    }
}

impl<T: std::fmt::Display + 'static> std::fmt::Display for Applicability<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Applicability::All => f.write_str("all"),
            Applicability::Only(values) => {
                for (i, v) in values.iter().enumerate() {
                    if i != 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{v}")?;
                }
                Ok(())
            }
        }
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    serde::Serialize,
    clap::ValueEnum,
    strum::Display,
    strum::IntoStaticStr,
    strum::VariantArray,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Platform {
    Number,
    BinarySensor,
    Sensor,
    Switch,
    Select,
    Button,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityCategory {
    Config,
    Diagnostic,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeviceClass {
    Temperature,
    Power,
    PowerFactor,
    Weight,
    Running,
    Problem,
    Connectivity,
    Update,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NumberMode {
    Auto,
    Box,
    Slider,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SensorType {
    Numeric,
    Text,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ButtonAction {
    DetectSubDevices,
}

/// Mirrored state of an entity.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum StateValue {
    On(bool),
    Number(f64),
    Text(String),
}

impl std::fmt::Display for StateValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateValue::On(true) => f.write_str("on"),
            StateValue::On(false) => f.write_str("off"),
            StateValue::Number(n) => write!(f, "{n}"),
            StateValue::Text(t) => f.write_str(t),
        }
    }
}

/// Platform specific part of a descriptor.
#[derive(Clone, Copy)]
pub enum Kind {
    Number {
        step: f64,
        mode: NumberMode,
    },
    BinarySensor {
        is_on: fn(&Value) -> Option<bool>,
    },
    Sensor {
        datatype: SensorType,
        state: fn(&Value) -> Option<StateValue>,
    },
    Switch {
        state_on: f64,
        state_off: f64,
        /// Further device values that map to a switch state.
        extra_states: &'static [(f64, bool)],
    },
    Select {
        options: &'static [&'static str],
    },
    Button {
        action: ButtonAction,
    },
}

impl Kind {
    pub const fn platform(&self) -> Platform {
        match self {
            Kind::Number { .. } => Platform::Number,
            Kind::BinarySensor { .. } => Platform::BinarySensor,
            Kind::Sensor { .. } => Platform::Sensor,
            Kind::Switch { .. } => Platform::Switch,
            Kind::Select { .. } => Platform::Select,
            Kind::Button { .. } => Platform::Button,
        }
    }

    pub const NUMBER: Self = Kind::Number { step: 1.0, mode: NumberMode::Auto };
    pub const BINARY_SENSOR: Self = Kind::BinarySensor { is_on: Value::as_bool };
    pub const SWITCH: Self = Kind::Switch { state_on: 1.0, state_off: 0.0, extra_states: &[] };
}

/// Static description of a potential entity.
#[derive(Clone, Copy)]
pub struct EntityDescription {
    /// The attribute name the entity follows on its device.
    pub key: &'static str,
    pub translation_key: &'static str,
    pub name: &'static str,
    pub product_types: Applicability<ProductType>,
    /// The module that has to be connected for this entity to be offered.
    pub module: Option<Module>,
    /// One-based mixer/circuit numbers this applies to. Only consulted for mixer entities.
    pub indexes: Applicability<u8>,
    pub always_available: bool,
    pub entity_category: Option<EntityCategory>,
    pub device_class: Option<DeviceClass>,
    pub unit: Option<&'static str>,
    pub kind: Kind,
}

impl EntityDescription {
    pub const fn new(
        key: &'static str,
        translation_key: &'static str,
        name: &'static str,
        kind: Kind,
    ) -> Self {
        Self {
            key,
            translation_key,
            name,
            product_types: Applicability::All,
            module: None,
            indexes: Applicability::All,
            always_available: false,
            entity_category: None,
            device_class: None,
            unit: None,
            kind,
        }
    }

    pub const fn product_types(mut self, product_types: &'static [ProductType]) -> Self {
        self.product_types = Applicability::Only(product_types);
        self
    }

    pub const fn module(mut self, module: Module) -> Self {
        self.module = Some(module);
        self
    }

    pub const fn indexes(mut self, indexes: &'static [u8]) -> Self {
        self.indexes = Applicability::Only(indexes);
        self
    }

    pub const fn always_available(mut self) -> Self {
        self.always_available = true;
        self
    }

    pub const fn category(mut self, category: EntityCategory) -> Self {
        self.entity_category = Some(category);
        self
    }

    pub const fn device_class(mut self, device_class: DeviceClass) -> Self {
        self.device_class = Some(device_class);
        self
    }

    pub const fn unit(mut self, unit: &'static str) -> Self {
        self.unit = Some(unit);
        self
    }

    pub const fn platform(&self) -> Platform {
        self.kind.platform()
    }

    /// Whether commands can be sent through entities of this description.
    pub const fn is_settable(&self) -> bool {
        matches!(
            self.kind,
            Kind::Number { .. } | Kind::Switch { .. } | Kind::Select { .. } | Kind::Button { .. }
        )
    }

    /// How a number should be entered. `None` for other platforms.
    pub const fn number_mode(&self) -> Option<NumberMode> {
        match self.kind {
            Kind::Number { mode, .. } => Some(mode),
            _ => None,
        }
    }
}

impl std::fmt::Debug for EntityDescription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityDescription")
            .field("key", &self.key)
            .field("platform", &self.platform())
            .field("product_types", &self.product_types)
            .field("module", &self.module)
            .field("indexes", &self.indexes)
            .finish_non_exhaustive()
    }
}

pub const CELSIUS: &str = "°C";
pub const PERCENTAGE: &str = "%";
pub const KILOWATT: &str = "kW";
pub const KILOGRAM: &str = "kg";
pub const KILOGRAM_PER_HOUR: &str = "kg/h";
pub const KWH_PER_KG: &str = "kWh/kg";
