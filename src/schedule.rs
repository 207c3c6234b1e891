//! Weekly day/night schedules of the controller.
//!
//! Each weekday is split into half hour intervals, each of which is either in the day or the night
//! preset.

use crate::device::{ATTR_SCHEDULES, Device, Value};
use jiff::civil::Time;
use std::collections::BTreeMap;

/// Number of intervals in a day.
pub const INTERVALS: usize = 48;
const INTERVAL_MINUTES: usize = 30;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("the controller has no {0} schedule")]
    NotFound(ScheduleType),
    #[error("interval {start} to {end} is empty, the end must come after the start")]
    InvalidInterval { start: Time, end: Time },
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    clap::ValueEnum,
    strum::Display,
    strum::IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum ScheduleType {
    Heating,
    WaterHeater,
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
    serde::Deserialize,
    clap::ValueEnum,
    strum::Display,
    strum::VariantArray,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, clap::ValueEnum, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Preset {
    Day,
    Night,
}

impl Preset {
    fn from_interval(day: bool) -> Self {
        if day { Preset::Day } else { Preset::Night }
    }
}

/// The intervals of one weekday, `true` for the day preset.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ScheduleDay(Vec<bool>);

/// A contiguous stretch of a day in the same preset.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct PresetRange {
    pub start: Time,
    /// Exclusive. Midnight stands for the end of the day.
    pub end: Time,
    pub preset: Preset,
}

fn interval_start(index: usize) -> Time {
    let minutes = index * INTERVAL_MINUTES;
    Time::constant((minutes / 60 % 24) as i8, (minutes % 60) as i8, 0, 0)
}

fn interval_index(time: Time) -> usize {
    (time.hour() as usize * 60 + time.minute() as usize) / INTERVAL_MINUTES
}

impl ScheduleDay {
    pub fn new(intervals: Vec<bool>) -> Self {
        Self(intervals)
    }

    pub fn intervals(&self) -> &[bool] {
        &self.0
    }

    /// Set the intervals from `start` up to `end` to `preset`.
    ///
    /// An `end` of midnight covers the rest of the day. Times are rounded down to the interval
    /// they fall into.
    pub fn set_state(&mut self, preset: Preset, start: Time, end: Time) -> Result<(), Error> {
        let first = interval_index(start);
        let last = if end == Time::midnight() { INTERVALS } else { interval_index(end) };
        if last <= first {
            return Err(Error::InvalidInterval { start, end });
        }
        self.0.resize(INTERVALS, false);
        for interval in &mut self.0[first..last] {
            *interval = preset == Preset::Day;
        }
        Ok(())
    }

    /// The day as contiguous preset ranges.
    pub fn ranges(&self) -> Vec<PresetRange> {
        let mut ranges = Vec::<PresetRange>::new();
        for (index, &day) in self.0.iter().enumerate() {
            let preset = Preset::from_interval(day);
            let end = interval_start(index + 1);
            match ranges.last_mut() {
                Some(range) if range.preset == preset => range.end = end,
                _ => ranges.push(PresetRange { start: interval_start(index), end, preset }),
            }
        }
        ranges
    }
}

/// One weekly schedule.
pub type Schedule = BTreeMap<Weekday, ScheduleDay>;

/// All schedules of the controller by their type name.
pub type Schedules = BTreeMap<String, Schedule>;

fn schedules(device: &Device) -> Schedules {
    match device.get_nowait(ATTR_SCHEDULES) {
        Some(Value::Schedules(schedules)) => schedules,
        _ => Schedules::new(),
    }
}

/// The preset ranges of `weekdays` in the schedule of `schedule_type`.
pub fn get_schedule(
    device: &Device,
    schedule_type: ScheduleType,
    weekdays: &[Weekday],
) -> Result<Vec<(Weekday, PresetRange)>, Error> {
    let schedules = schedules(device);
    let name: &'static str = schedule_type.into();
    let schedule = schedules.get(name).ok_or(Error::NotFound(schedule_type))?;
    let mut ranges = Vec::new();
    for &weekday in weekdays {
        let day = schedule.get(&weekday).cloned().unwrap_or_default();
        ranges.extend(day.ranges().into_iter().map(|range| (weekday, range)));
    }
    Ok(ranges)
}

/// Switch the interval from `start` to `end` of every weekday in `weekdays` to `preset` and send
/// the updated schedules to the controller.
pub fn set_schedule(
    device: &Device,
    schedule_type: ScheduleType,
    weekdays: &[Weekday],
    preset: Preset,
    start: Time,
    end: Time,
) -> Result<(), Error> {
    let mut schedules = schedules(device);
    let name: &'static str = schedule_type.into();
    let schedule = schedules.get_mut(name).ok_or(Error::NotFound(schedule_type))?;
    for &weekday in weekdays {
        schedule.entry(weekday).or_default().set_state(preset, start, end)?;
    }
    tracing::debug!(%schedule_type, ?weekdays, %preset, %start, %end, "updating a schedule");
    device.set_nowait(ATTR_SCHEDULES, Value::Schedules(schedules));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::civil::time;
    use tokio::sync::mpsc;

    fn device() -> (Device, mpsc::UnboundedReceiver<crate::device::DeviceCommand>) {
        let (sender, commands) = mpsc::unbounded_channel();
        let device = Device::new(sender);
        let value: Value = serde_json::from_value(serde_json::json!({
            "heating": {"monday": vec![false; INTERVALS]},
        }))
        .unwrap();
        device.dispatch(ATTR_SCHEDULES, value);
        (device, commands)
    }

    #[test]
    fn set_state_covers_half_open_intervals() {
        let mut day = ScheduleDay::new(vec![false; INTERVALS]);
        day.set_state(Preset::Day, time(6, 0, 0, 0), time(8, 30, 0, 0)).unwrap();
        let set = day.intervals().iter().enumerate().filter(|(_, d)| **d).map(|(i, _)| i);
        assert_eq!(set.collect::<Vec<_>>(), [12, 13, 14, 15, 16]);
        assert_eq!(day.ranges(), [
            PresetRange { start: time(0, 0, 0, 0), end: time(6, 0, 0, 0), preset: Preset::Night },
            PresetRange { start: time(6, 0, 0, 0), end: time(8, 30, 0, 0), preset: Preset::Day },
            PresetRange { start: time(8, 30, 0, 0), end: Time::midnight(), preset: Preset::Night },
        ]);
    }

    #[test]
    fn midnight_ends_the_day() {
        let mut day = ScheduleDay::default();
        day.set_state(Preset::Day, Time::midnight(), Time::midnight()).unwrap();
        assert_eq!(day.intervals(), vec![true; INTERVALS]);
        day.set_state(Preset::Night, time(22, 0, 0, 0), Time::midnight()).unwrap();
        assert_eq!(day.ranges().len(), 2);
        let err = day.set_state(Preset::Day, time(10, 0, 0, 0), time(9, 0, 0, 0)).unwrap_err();
        assert!(matches!(err, Error::InvalidInterval { .. }));
    }

    #[test]
    fn schedules_are_sent_whole() {
        let (device, mut commands) = device();
        let monday = [Weekday::Monday, Weekday::Tuesday];
        set_schedule(&device, ScheduleType::Heating, &monday, Preset::Day, time(7, 0, 0, 0), time(9, 0, 0, 0))
            .unwrap();
        let command = commands.try_recv().unwrap();
        assert_eq!(command.key, ATTR_SCHEDULES);
        let Value::Schedules(sent) = &command.value else { panic!("{:?}", command.value) };
        assert!(sent["heating"][&Weekday::Tuesday].intervals()[14]);
        assert!(!sent["heating"][&Weekday::Monday].intervals()[13]);

        device.apply_command(command);
        let ranges = get_schedule(&device, ScheduleType::Heating, &[Weekday::Monday]).unwrap();
        assert_eq!(ranges.len(), 3);
        assert_eq!(ranges[1].1.preset, Preset::Day);
    }

    #[test]
    fn unknown_schedules() {
        let (device, mut commands) = device();
        let err = get_schedule(&device, ScheduleType::WaterHeater, &[Weekday::Sunday]).unwrap_err();
        assert!(matches!(err, Error::NotFound(ScheduleType::WaterHeater)));
        let err = set_schedule(
            &device,
            ScheduleType::WaterHeater,
            &[Weekday::Sunday],
            Preset::Night,
            Time::midnight(),
            Time::midnight(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(commands.try_recv().is_err());
    }
}
