use crate::descriptor::{
    CELSIUS, DeviceClass, EntityDescription as D, Kind, KWH_PER_KG, NumberMode, PERCENTAGE,
};
use crate::product::ProductType::{EcomaxI, EcomaxP};

const TEMPERATURE: D = D::new("", "", "", Kind::NUMBER)
    .device_class(DeviceClass::Temperature)
    .unit(CELSIUS);

const fn temperature(key: &'static str, translation_key: &'static str, name: &'static str) -> D {
    D { key, translation_key, name, ..TEMPERATURE }
}

pub(super) static NUMBER_TYPES: [D; 12] = [
    temperature("heating_target_temp", "target_heating_temp", "Heating temperature")
        .product_types(&[EcomaxP]),
    temperature("min_heating_target_temp", "min_heating_temp", "Minimum heating temperature")
        .product_types(&[EcomaxP]),
    temperature("max_heating_target_temp", "max_heating_temp", "Maximum heating temperature")
        .product_types(&[EcomaxP]),
    temperature("grate_heating_temp", "grate_mode_temp", "Grate mode temperature")
        .product_types(&[EcomaxP]),
    D::new("min_fuzzy_logic_power", "fuzzy_logic_min_power", "Fuzzy logic minimum power", Kind::NUMBER)
        .unit(PERCENTAGE)
        .product_types(&[EcomaxP]),
    D::new("max_fuzzy_logic_power", "fuzzy_logic_max_power", "Fuzzy logic maximum power", Kind::NUMBER)
        .unit(PERCENTAGE)
        .product_types(&[EcomaxP]),
    D::new(
        "fuel_calorific_value",
        "fuel_calorific_value",
        "Fuel calorific value",
        Kind::Number { step: 0.1, mode: NumberMode::Box },
    )
    .unit(KWH_PER_KG)
    .product_types(&[EcomaxP]),
    D::new("heating_hysteresis", "heating_hysteresis", "Heating hysteresis", Kind::NUMBER)
        .unit(CELSIUS)
        .product_types(&[EcomaxP]),
    D::new("h1_hysteresis", "h1_hysteresis", "H1 hysteresis", Kind::NUMBER)
        .unit(CELSIUS)
        .product_types(&[EcomaxP]),
    D::new("h2_hysteresis", "h2_hysteresis", "H2 hysteresis", Kind::NUMBER)
        .unit(CELSIUS)
        .product_types(&[EcomaxP]),
    D::new("heating_pump_enable_temp", "heating_pump_enable_temp", "Heating pump enable temperature", Kind::NUMBER)
        .unit(CELSIUS)
        .product_types(&[EcomaxP]),
    D::new("water_heater_hysteresis", "water_heater_hysteresis", "Water heater hysteresis", Kind::NUMBER)
        .unit(CELSIUS)
        .product_types(&[EcomaxP]),
];

pub(super) static MIXER_NUMBER_TYPES: [D; 8] = [
    temperature("mixer_target_temp", "target_mixer_temp", "Mixer temperature")
        .product_types(&[EcomaxP]),
    temperature("min_target_temp", "min_mixer_temp", "Minimum mixer temperature")
        .product_types(&[EcomaxP]),
    temperature("max_target_temp", "max_mixer_temp", "Maximum mixer temperature")
        .product_types(&[EcomaxP]),
    temperature("circuit_target_temp", "target_circuit_temp", "Circuit temperature")
        .product_types(&[EcomaxI]),
    // The first circuit of ecoMAX i has no adjustable range or day/night presets.
    temperature("min_target_temp", "min_circuit_temp", "Minimum circuit temperature")
        .product_types(&[EcomaxI])
        .indexes(&[2, 3]),
    temperature("max_target_temp", "max_circuit_temp", "Maximum circuit temperature")
        .product_types(&[EcomaxI])
        .indexes(&[2, 3]),
    temperature("day_target_temp", "day_target_circuit_temp", "Day temperature")
        .product_types(&[EcomaxI])
        .indexes(&[2, 3]),
    temperature("night_target_temp", "night_target_circuit_temp", "Night temperature")
        .product_types(&[EcomaxI])
        .indexes(&[2, 3]),
];
