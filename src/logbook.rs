//! Human readable descriptions of controller alerts.

use crate::device::Alert;

/// Alert codes reported by the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::FromRepr, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
#[repr(u8)]
pub enum AlertType {
    PowerLoss = 0,
    BoilerTempSensorFailure = 1,
    MaxBoilerTempExceeded = 2,
    FeederTempSensorFailure = 3,
    MaxFeederTempExceeded = 4,
    ExhaustTempSensorFailure = 5,
    KindlingFailure = 7,
    NoFuel = 8,
    LeakDetected = 9,
    PressureSensorFailure = 10,
    FanFailure = 11,
    InsufficientAirPressure = 12,
    BurnOffFailure = 13,
    FlameSensorFailure = 14,
    LinearActuatorBlocked = 15,
    IncorrectParameters = 16,
    CondensationWarning = 17,
    BoilerStbTripped = 18,
    FeederStbTripped = 19,
    MinWaterPressureExceeded = 20,
    MaxWaterPressureExceeded = 21,
    FeederJammed = 22,
    Flameout = 23,
    ExhaustFanFailure = 24,
    ExternalFeederFailure = 25,
    SolarCollectorTempSensorFailure = 26,
    SolarCircuitTempSensorFailure = 27,
    H1CircuitTempSensorFailure = 28,
    H2CircuitTempSensorFailure = 29,
    H3CircuitTempSensorFailure = 30,
    OutdoorTempSensorFailure = 31,
    WaterHeaterTempSensorFailure = 32,
    H0CircuitTempSensorFailure = 33,
    FrostProtectionRunningWithoutHeatSource = 34,
    FrostProtectionRunningWithHeatSource = 35,
    MaxSolarCollectorTempExceeded = 36,
    MaxHeatedFloorTempExceeded = 37,
    BoilerCoolingRunning = 38,
    EcolambdaConnectionFailure = 39,
    PrimaryAirThrottleJammed = 40,
    SecondaryAirThrottleJammed = 41,
    FeederOverflow = 42,
    FurnaceOverflow = 43,
    ModuleBConnectionFailure = 44,
    CleaningActuatorFailure = 45,
    MinPressureExceeded = 46,
    MaxPressureExceeded = 47,
    PressureSensorDamaged = 48,
    MaxMainHeatSourceTempExceeded = 49,
    MaxAdditionalHeatSourceTempExceeded = 50,
    SolarPanelOffline = 51,
    FeederControlFailure = 52,
    FeederBlocked = 53,
    MaxThermocoupleTempExceeded = 54,
    ThermocoupleWiringFailure = 55,
    UnknownError = 255,
}

impl AlertType {
    pub fn message(self) -> &'static str {
        use AlertType::*;
        match self {
            PowerLoss => "encountered power loss",
            BoilerTempSensorFailure => "encountered boiler temperature sensor failure",
            MaxBoilerTempExceeded => "maximum boiler temperature exceeded",
            FeederTempSensorFailure => "encountered feeder temperature sensor failure",
            MaxFeederTempExceeded => "maximum feeder temperature exceeded",
            ExhaustTempSensorFailure => "exhaust temperature sensor failed",
            KindlingFailure => "encountered kindling failure",
            NoFuel => "fuel not detected",
            LeakDetected => "detected leak",
            PressureSensorFailure => "encountered pressure sensor failure",
            FanFailure => "encountered fan failure",
            InsufficientAirPressure => "detected insufficient air pressure",
            BurnOffFailure => "encountered failure while burning off",
            FlameSensorFailure => "encountered flame sensor failure",
            LinearActuatorBlocked => "linear actuator jammed",
            IncorrectParameters => "detected incorrect parameters",
            CondensationWarning => "detected possible condensation",
            BoilerStbTripped => "boiler STB tripped",
            FeederStbTripped => "feeder STB tripped",
            MinWaterPressureExceeded => "minimum water pressure exceeded",
            MaxWaterPressureExceeded => "maximum water pressure exceeded",
            FeederJammed => "feeder jammed",
            Flameout => "detected flameout",
            ExhaustFanFailure => "encountered exhaust fan failure",
            ExternalFeederFailure => "encountered external feeder failure",
            SolarCollectorTempSensorFailure => {
                "encountered solar collector temperature sensor failure"
            }
            SolarCircuitTempSensorFailure => "encountered solar circuit temperature sensor failure",
            H1CircuitTempSensorFailure => "encountered temperature sensor failure in H1 circuit",
            H2CircuitTempSensorFailure => "encountered temperature sensor failure in H2 circuit",
            H3CircuitTempSensorFailure => "encountered temperature sensor failure in H3 circuit",
            OutdoorTempSensorFailure => "encountered outdoor temperature sensor failure",
            WaterHeaterTempSensorFailure => "encountered water heater temperature sensor failure",
            H0CircuitTempSensorFailure => "encountered temperature sensor failure in H0 circuit",
            FrostProtectionRunningWithoutHeatSource => {
                "frost protection is running without heat source"
            }
            FrostProtectionRunningWithHeatSource => "frost protection is running with heat source",
            MaxSolarCollectorTempExceeded => "max solar collector temperature exceeded",
            MaxHeatedFloorTempExceeded => "maximum heated floor temperature exceeded",
            BoilerCoolingRunning => "boiler cooling is running",
            EcolambdaConnectionFailure => "encountered ecoLAMBDA connection failure",
            PrimaryAirThrottleJammed => "primary air throttle jammed",
            SecondaryAirThrottleJammed => "secondary air throttle jammed",
            FeederOverflow => "detected feeder overflow",
            FurnaceOverflow => "detected furnance overflow",
            ModuleBConnectionFailure => "encountered module B connection failure",
            CleaningActuatorFailure => "encountered cleaning actuator failure",
            MinPressureExceeded => "minimum pressure exceeded",
            MaxPressureExceeded => "maximum pressure exceeded",
            PressureSensorDamaged => "pressure sensor damage detected",
            MaxMainHeatSourceTempExceeded => "maximum main heat source temperature exceeded",
            MaxAdditionalHeatSourceTempExceeded => {
                "maximum additional heat source temperature exceeded"
            }
            SolarPanelOffline => "solar panel overheated",
            FeederControlFailure => "encountered feeder control system failure",
            FeederBlocked => "feeder blocked",
            MaxThermocoupleTempExceeded => "maximum thermocouple temperature exceeded",
            ThermocoupleWiringFailure => "detected incorrect thermocouple wiring",
            UnknownError => "encountered unknown error",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct LogbookEntry {
    pub name: String,
    pub message: String,
}

fn format_time(time: &jiff::civil::DateTime) -> impl std::fmt::Display {
    time.strftime("%Y-%m-%d %H:%M:%S")
}

/// Describe `alert` as raised by the controller called `name`.
pub fn describe(name: &str, alert: &Alert) -> LogbookEntry {
    let mut message = match AlertType::from_repr(alert.code) {
        Some(alert_type) => alert_type.message().to_string(),
        None => format!("encountered alert with code \"{}\"", alert.code),
    };
    message.push_str(&format!(" from {}", format_time(&alert.from)));
    if let Some(to) = &alert.to {
        message.push_str(&format!(" to {}", format_time(to)));
    }
    LogbookEntry { name: name.to_string(), message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::civil::date;

    #[test]
    fn known_alert() {
        let alert = Alert { code: 8, from: date(2024, 1, 2).at(10, 0, 0, 0), to: None };
        let entry = describe("ecoMAX", &alert);
        assert_eq!(entry.name, "ecoMAX");
        assert_eq!(entry.message, "fuel not detected from 2024-01-02 10:00:00");
    }

    #[test]
    fn ended_alert() {
        let alert = Alert {
            code: 0,
            from: date(2024, 1, 2).at(10, 0, 0, 0),
            to: Some(date(2024, 1, 2).at(10, 5, 30, 0)),
        };
        assert_eq!(
            describe("ecoMAX", &alert).message,
            "encountered power loss from 2024-01-02 10:00:00 to 2024-01-02 10:05:30"
        );
    }

    #[test]
    fn unknown_alert_code() {
        let alert = Alert { code: 6, from: date(2023, 12, 31).at(23, 59, 0, 0), to: None };
        assert_eq!(
            describe("ecoMAX", &alert).message,
            "encountered alert with code \"6\" from 2023-12-31 23:59:00"
        );
        assert_eq!(AlertType::from_repr(255), Some(AlertType::UnknownError));
    }
}
