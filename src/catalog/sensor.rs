use crate::descriptor::{
    CELSIUS, DeviceClass, EntityCategory, EntityDescription as D, KILOGRAM_PER_HOUR, KILOWATT,
    Kind, PERCENTAGE, SensorType, StateValue,
};
use crate::device::Value;
use crate::product::Module;
use crate::product::ProductType::{EcomaxI, EcomaxP};

const NUMERIC: Kind = Kind::Sensor { datatype: SensorType::Numeric, state: numeric };

fn numeric(value: &Value) -> Option<StateValue> {
    value.as_f64().map(StateValue::Number)
}

/// Names of the controller states in the order of their codes.
pub(crate) const CONTROLLER_STATES: [&str; 11] = [
    "off",
    "stabilization",
    "kindling",
    "working",
    "supervision",
    "paused",
    "standby",
    "burning_off",
    "alert",
    "manual",
    "unsealing",
];

fn controller_state(value: &Value) -> Option<StateValue> {
    let code = value.as_f64()?;
    let name = CONTROLLER_STATES
        .get(code as usize)
        .filter(|_| code >= 0.0 && code.fract() == 0.0)
        .copied()
        .unwrap_or("other");
    Some(StateValue::Text(name.to_string()))
}

fn text(value: &Value) -> Option<StateValue> {
    match value {
        Value::Text(t) => Some(StateValue::Text(t.clone())),
        Value::Number(_) | Value::Bool(_) => Some(StateValue::Text(value.to_string())),
        Value::Parameter(_) | Value::Alerts(_) | Value::Schedules(_) => None,
    }
}

const fn temperature(key: &'static str, translation_key: &'static str, name: &'static str) -> D {
    D::new(key, translation_key, name, NUMERIC)
        .device_class(DeviceClass::Temperature)
        .unit(CELSIUS)
}

const fn percentage(key: &'static str, translation_key: &'static str, name: &'static str) -> D {
    D::new(key, translation_key, name, NUMERIC).device_class(DeviceClass::PowerFactor).unit(PERCENTAGE)
}

pub(super) static SENSOR_TYPES: [D; 21] = [
    temperature("heating_temp", "heating_temp", "Heating temperature"),
    temperature("water_heater_temp", "water_heater_temp", "Water heater temperature"),
    temperature("outside_temp", "outside_temp", "Outside temperature"),
    temperature("heating_target", "heating_target", "Heating target temperature"),
    temperature("water_heater_target", "water_heater_target", "Water heater target temperature"),
    temperature("return_temp", "return_temp", "Return temperature"),
    D::new(
        "state",
        "ecomax_state",
        "State",
        Kind::Sensor { datatype: SensorType::Text, state: controller_state },
    ),
    D::new("password", "service_password", "Service password", Kind::Sensor {
        datatype: SensorType::Text,
        state: text,
    })
    .category(EntityCategory::Diagnostic),
    temperature("exhaust_temp", "exhaust_temp", "Exhaust temperature").product_types(&[EcomaxP]),
    temperature("feeder_temp", "feeder_temp", "Feeder temperature").product_types(&[EcomaxP]),
    temperature("optical_temp", "flame_intensity", "Flame intensity").product_types(&[EcomaxP]),
    percentage("heating_load", "heating_load", "Heating load").product_types(&[EcomaxP]),
    percentage("fan_power", "fan_power", "Fan power").product_types(&[EcomaxP]),
    percentage("fuel_level", "fuel_level", "Fuel level").product_types(&[EcomaxP]),
    D::new("fuel_consumption", "fuel_consumption", "Fuel consumption", NUMERIC)
        .unit(KILOGRAM_PER_HOUR)
        .product_types(&[EcomaxP]),
    D::new("heating_power", "heating_power", "Heating power", NUMERIC)
        .device_class(DeviceClass::Power)
        .unit(KILOWATT)
        .product_types(&[EcomaxP]),
    percentage("lambda_level", "oxygen_level", "Oxygen level")
        .product_types(&[EcomaxP])
        .module(Module::Ecolambda),
    percentage("lambda_target", "oxygen_target", "Oxygen target")
        .product_types(&[EcomaxP])
        .module(Module::Ecolambda),
    temperature("lower_buffer_temp", "lower_buffer_temp", "Lower buffer temperature")
        .product_types(&[EcomaxI]),
    temperature("upper_buffer_temp", "upper_buffer_temp", "Upper buffer temperature")
        .product_types(&[EcomaxI]),
    temperature("solar_temp", "solar_temp", "Solar temperature")
        .product_types(&[EcomaxI])
        .module(Module::ModuleC),
];

pub(super) static MIXER_SENSOR_TYPES: [D; 4] = [
    temperature("current_temp", "mixer_temp", "Mixer temperature").product_types(&[EcomaxP]),
    temperature("target_temp", "mixer_target_temp", "Mixer target temperature")
        .product_types(&[EcomaxP]),
    temperature("current_temp", "circuit_temp", "Circuit temperature").product_types(&[EcomaxI]),
    temperature("target_temp", "circuit_target_temp", "Circuit target temperature")
        .product_types(&[EcomaxI]),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn controller_state_names() {
        let name = |v: f64| controller_state(&Value::Number(v));
        assert_eq!(name(0.0), Some(StateValue::Text("off".into())));
        assert_eq!(name(3.0), Some(StateValue::Text("working".into())));
        assert_eq!(name(10.0), Some(StateValue::Text("unsealing".into())));
        assert_eq!(name(42.0), Some(StateValue::Text("other".into())));
        assert_eq!(name(-1.0), Some(StateValue::Text("other".into())));
        assert_eq!(controller_state(&Value::Text("x".into())), None);
    }

    #[test]
    fn numeric_sensor_accepts_parameters() {
        let value = Value::Parameter(crate::device::Parameter {
            value: 61.5,
            min_value: 0.0,
            max_value: 100.0,
        });
        assert_eq!(numeric(&value), Some(StateValue::Number(61.5)));
        assert_eq!(text(&Value::Number(1234.0)), Some(StateValue::Text("1234".into())));
    }
}
