use crate::descriptor::{EntityDescription as D, Kind};
use crate::product::ProductType::{EcomaxI, EcomaxP};

const fn switch(key: &'static str, translation_key: &'static str, name: &'static str) -> D {
    D::new(key, translation_key, name, Kind::SWITCH)
}

pub(super) static SWITCH_TYPES: [D; 7] = [
    switch("ecomax_control", "controller_switch", "Controller switch"),
    switch("water_heater_disinfection", "water_heater_disinfection_switch", "Water heater disinfection"),
    // Priority mode (1) also keeps the pump running.
    D::new(
        "water_heater_work_mode",
        "water_heater_pump_switch",
        "Water heater pump",
        Kind::Switch { state_on: 2.0, state_off: 0.0, extra_states: &[(1.0, true)] },
    ),
    switch("weather_control", "weather_control_switch", "Weather control").product_types(&[EcomaxP]),
    switch("fuzzy_logic", "fuzzy_logic_switch", "Fuzzy logic").product_types(&[EcomaxP]),
    switch("heating_schedule_switch", "heating_schedule_switch", "Heating schedule")
        .product_types(&[EcomaxP]),
    switch("water_heater_schedule_switch", "water_heater_schedule_switch", "Water heater schedule")
        .product_types(&[EcomaxP]),
];

pub(super) static MIXER_SWITCH_TYPES: [D; 4] = [
    switch("summer_work", "enable_in_summer_mode", "Enable in summer mode")
        .product_types(&[EcomaxP, EcomaxI]),
    switch("weather_control", "weather_control_switch", "Weather control").product_types(&[EcomaxP]),
    switch("disable_pump_on_thermostat", "disable_pump_on_thermostat", "Disable pump on thermostat")
        .product_types(&[EcomaxP]),
    switch("enable_circuit", "enable_circuit", "Enable circuit")
        .product_types(&[EcomaxI])
        .indexes(&[1]),
];
