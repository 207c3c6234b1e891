//! The static tables of every entity this tool knows how to offer.

mod binary_sensor;
mod button;
mod number;
mod select;
mod sensor;
mod switch;

use crate::descriptor::{EntityDescription, Platform};

/// Descriptors for entities of the controller itself.
pub fn descriptions(platform: Platform) -> &'static [EntityDescription] {
    match platform {
        Platform::Number => &number::NUMBER_TYPES,
        Platform::BinarySensor => &binary_sensor::BINARY_SENSOR_TYPES,
        Platform::Sensor => &sensor::SENSOR_TYPES,
        Platform::Switch => &switch::SWITCH_TYPES,
        Platform::Select => &select::SELECT_TYPES,
        Platform::Button => &button::BUTTON_TYPES,
    }
}

/// Descriptors for entities of mixers (or circuits, depending on the product).
pub fn mixer_descriptions(platform: Platform) -> &'static [EntityDescription] {
    match platform {
        Platform::Number => &number::MIXER_NUMBER_TYPES,
        Platform::BinarySensor => &binary_sensor::MIXER_BINARY_SENSOR_TYPES,
        Platform::Sensor => &sensor::MIXER_SENSOR_TYPES,
        Platform::Switch => &switch::MIXER_SWITCH_TYPES,
        Platform::Select => &select::MIXER_SELECT_TYPES,
        Platform::Button => &[],
    }
}
