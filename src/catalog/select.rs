use crate::descriptor::{EntityDescription as D, Kind};
use crate::product::ProductType::{EcomaxI, EcomaxP};

const STATE_OFF: &str = "off";
const STATE_SUMMER: &str = "summer";
const STATE_WINTER: &str = "winter";
const STATE_AUTO: &str = "auto";
const STATE_HEATING: &str = "heating";
const STATE_HEATED_FLOOR: &str = "heated_floor";
const STATE_PUMP_ONLY: &str = "pump_only";

pub(super) static SELECT_TYPES: [D; 1] = [D::new("summer_mode", "summer_mode", "Summer mode", Kind::Select {
    options: &[STATE_WINTER, STATE_SUMMER, STATE_AUTO],
})];

pub(super) static MIXER_SELECT_TYPES: [D; 2] = [
    D::new("work_mode", "mixer_work_mode", "Work mode", Kind::Select {
        options: &[STATE_OFF, STATE_HEATING, STATE_HEATED_FLOOR, STATE_PUMP_ONLY],
    })
    .product_types(&[EcomaxP]),
    // On ecoMAX i the circuit enable parameter doubles as its work mode.
    D::new("enable_circuit", "mixer_work_mode", "Work mode", Kind::Select {
        options: &[STATE_OFF, STATE_HEATING, STATE_HEATED_FLOOR],
    })
    .product_types(&[EcomaxI])
    .indexes(&[2, 3]),
];
