use crate::descriptor::{DeviceClass, EntityCategory, EntityDescription as D, Kind};
use crate::product::ProductType::{EcomaxI, EcomaxP};

const fn running(key: &'static str, translation_key: &'static str, name: &'static str) -> D {
    D::new(key, translation_key, name, Kind::BINARY_SENSOR).device_class(DeviceClass::Running)
}

pub(super) static BINARY_SENSOR_TYPES: [D; 11] = [
    running("heating_pump", "heating_pump", "Heating pump"),
    running("water_heater_pump", "water_heater_pump", "Water heater pump"),
    running("circulation_pump", "circulation_pump", "Circulation pump"),
    D::new(
        "pending_alerts",
        "alert",
        "Alert",
        Kind::BinarySensor { is_on: |v| v.as_f64().map(|count| count > 0.0) },
    )
    .device_class(DeviceClass::Problem)
    .category(EntityCategory::Diagnostic),
    D::new("connected", "connection_status", "Connection status", Kind::BINARY_SENSOR)
        .always_available()
        .device_class(DeviceClass::Connectivity)
        .category(EntityCategory::Diagnostic),
    running("fan", "fan", "Fan").product_types(&[EcomaxP]),
    running("fan2_exhaust", "exhaust_fan", "Exhaust fan").product_types(&[EcomaxP]),
    running("feeder", "feeder", "Feeder").product_types(&[EcomaxP]),
    running("lighter", "lighter", "Lighter").product_types(&[EcomaxP]),
    running("solar_pump", "solar_pump", "Solar pump").product_types(&[EcomaxI]),
    running("fireplace_pump", "fireplace_pump", "Fireplace pump").product_types(&[EcomaxI]),
];

pub(super) static MIXER_BINARY_SENSOR_TYPES: [D; 2] = [
    running("pump", "mixer_pump", "Mixer pump").product_types(&[EcomaxP]),
    running("pump", "circuit_pump", "Circuit pump").product_types(&[EcomaxI]),
];
