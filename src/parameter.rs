//! Raw access to device parameters by name, for the controller or one of its mixers.

use crate::catalog;
use crate::connection::EcomaxConnection;
use crate::descriptor::Platform;
use crate::device::{self, Device, Parameter, Value};
use crate::output::Record;
use std::sync::Arc;
use std::time::Duration;
use strum::VariantArray as _;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("mixer {index} is not known to the controller")]
    MissingMixer { index: u8 },
    #[error("could not get `{name}` from the controller")]
    Get {
        name: String,
        #[source]
        source: device::Error,
    },
    #[error("`{name}` is not a parameter")]
    NotAParameter { name: String },
    #[error("{value} is outside of the range {min_value}..={max_value} of `{name}`")]
    OutOfRange { name: String, value: f64, min_value: f64, max_value: f64 },
    #[error("`{0}` is not a non-negative number, `on` or `off`")]
    InvalidValue(String),
}

/// A value to write into a parameter.
///
/// `on` and `off` stand for 1 and 0.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParameterValue(pub f64);

impl std::str::FromStr for ParameterValue {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.trim() {
            "on" => Ok(Self(1.0)),
            "off" => Ok(Self(0.0)),
            number => number
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite() && *v >= 0.0)
                .map(Self)
                .ok_or_else(|| Error::InvalidValue(s.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct ParameterReport {
    pub name: String,
    pub value: f64,
    pub min_value: f64,
    pub max_value: f64,
    pub unit_of_measurement: Option<&'static str>,
    pub device_type: &'static str,
    pub device_uid: String,
    /// 0 for the controller, otherwise the one-based mixer number.
    pub device_index: u16,
}

impl Record for ParameterReport {
    fn headers() -> Vec<&'static str> {
        vec!["Name", "Value", "Min", "Max", "Unit", "Device", "Index"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.value.to_string(),
            self.min_value.to_string(),
            self.max_value.to_string(),
            self.unit_of_measurement.unwrap_or_default().to_string(),
            self.device_type.to_string(),
            self.device_index.to_string(),
        ]
    }
}

fn target(connection: &EcomaxConnection, mixer: Option<u8>) -> Result<Arc<Device>, Error> {
    match mixer {
        None => Ok(Arc::clone(connection.device())),
        Some(index) => connection.device().mixer(index).ok_or(Error::MissingMixer { index }),
    }
}

/// Unit of the first descriptor for `name` that applies to this controller.
fn unit_of(connection: &EcomaxConnection, mixer: Option<u8>, name: &str) -> Option<&'static str> {
    let product_type = connection.product_type();
    Platform::VARIANTS
        .iter()
        .flat_map(|&platform| match mixer {
            None => catalog::descriptions(platform),
            Some(_) => catalog::mixer_descriptions(platform),
        })
        .filter(|d| d.key == name && d.product_types.contains(&product_type))
        .find_map(|d| d.unit)
}

async fn parameter(device: &Device, name: &str, timeout: Duration) -> Result<Parameter, Error> {
    let value = device
        .get(name, timeout)
        .await
        .map_err(|source| Error::Get { name: name.to_string(), source })?;
    match value {
        Value::Parameter(parameter) => Ok(parameter),
        _ => Err(Error::NotAParameter { name: name.to_string() }),
    }
}

/// Wait up to `timeout` for the parameter `name` and describe it.
pub async fn get_parameter(
    connection: &EcomaxConnection,
    mixer: Option<u8>,
    name: &str,
    timeout: Duration,
) -> Result<ParameterReport, Error> {
    let device = target(connection, mixer)?;
    let parameter = parameter(&device, name, timeout).await?;
    Ok(ParameterReport {
        name: name.to_string(),
        value: parameter.value,
        min_value: parameter.min_value,
        max_value: parameter.max_value,
        unit_of_measurement: unit_of(connection, mixer, name),
        device_type: if mixer.is_some() { "mixer" } else { "ecomax" },
        device_uid: connection.uid().to_string(),
        device_index: mixer.map_or(0, |index| u16::from(index) + 1),
    })
}

/// Send `value` for the parameter `name` once it is known to be within the parameter's range.
pub async fn set_parameter(
    connection: &EcomaxConnection,
    mixer: Option<u8>,
    name: &str,
    value: ParameterValue,
    timeout: Duration,
) -> Result<(), Error> {
    let device = target(connection, mixer)?;
    let Parameter { min_value, max_value, .. } = parameter(&device, name, timeout).await?;
    let ParameterValue(value) = value;
    if !(min_value..=max_value).contains(&value) {
        return Err(Error::OutOfRange { name: name.to_string(), value, min_value, max_value });
    }
    device.set_nowait(name, Value::Number(value));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::tests::connection;
    use crate::product::ProductType;

    const TIMEOUT: Duration = Duration::from_millis(20);

    fn fixture() -> (Arc<EcomaxConnection>, tokio::sync::mpsc::UnboundedReceiver<device::DeviceCommand>) {
        let (connection, commands) = connection(
            ProductType::EcomaxP,
            serde_json::json!({
                "heating_target_temp": {"value": 60, "min_value": 40, "max_value": 80},
                "heating_temp": 58.5,
            }),
        );
        connection.device().add_mixer(1).dispatch(
            "mixer_target_temp",
            Value::Parameter(Parameter { value: 40.0, min_value: 20.0, max_value: 55.0 }),
        );
        (connection, commands)
    }

    #[test]
    fn values_parse_like_switch_states() {
        assert_eq!("on".parse::<ParameterValue>().unwrap(), ParameterValue(1.0));
        assert_eq!("off".parse::<ParameterValue>().unwrap(), ParameterValue(0.0));
        assert_eq!(" 61.5".parse::<ParameterValue>().unwrap(), ParameterValue(61.5));
        assert!("-1".parse::<ParameterValue>().is_err());
        assert!("warm".parse::<ParameterValue>().is_err());
    }

    #[tokio::test]
    async fn reports_describe_the_parameter() {
        let (connection, _) = fixture();
        let report = get_parameter(&connection, None, "heating_target_temp", TIMEOUT).await.unwrap();
        assert_eq!((report.value, report.min_value, report.max_value), (60.0, 40.0, 80.0));
        assert_eq!(report.unit_of_measurement, Some(crate::descriptor::CELSIUS));
        assert_eq!((report.device_type, report.device_index), ("ecomax", 0));
        assert_eq!(report.device_uid, "UID");

        let report = get_parameter(&connection, Some(1), "mixer_target_temp", TIMEOUT).await.unwrap();
        assert_eq!((report.device_type, report.device_index), ("mixer", 2));
        assert_eq!(report.row().len(), ParameterReport::headers().len());
    }

    #[tokio::test]
    async fn get_rejects_what_is_not_a_parameter() {
        let (connection, _) = fixture();
        let err = get_parameter(&connection, None, "heating_temp", TIMEOUT).await.unwrap_err();
        assert!(matches!(err, Error::NotAParameter { .. }));
        let err = get_parameter(&connection, None, "fuel_level", TIMEOUT).await.unwrap_err();
        assert!(matches!(err, Error::Get { .. }));
        let err = get_parameter(&connection, Some(4), "mixer_target_temp", TIMEOUT).await.unwrap_err();
        assert!(matches!(err, Error::MissingMixer { index: 4 }));
    }

    #[tokio::test]
    async fn set_checks_the_range() {
        let (connection, mut commands) = fixture();
        set_parameter(&connection, None, "heating_target_temp", ParameterValue(65.0), TIMEOUT)
            .await
            .unwrap();
        let command = commands.try_recv().unwrap();
        assert_eq!((command.mixer, command.value.clone()), (None, Value::Number(65.0)));

        let err = set_parameter(&connection, Some(1), "mixer_target_temp", ParameterValue(60.0), TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::OutOfRange { max_value: 55.0, .. }));
        assert!(commands.try_recv().is_err());

        connection.device().apply_command(command);
        let report = get_parameter(&connection, None, "heating_target_temp", TIMEOUT).await.unwrap();
        assert_eq!((report.value, report.max_value), (65.0, 80.0));
    }
}
