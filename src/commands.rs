fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread().enable_all().build()
}

/// Apply the writes queued by a command to the snapshot, the way the controller would.
fn apply_pending(
    connection: &crate::connection::EcomaxConnection,
    commands: &mut tokio::sync::mpsc::UnboundedReceiver<crate::device::DeviceCommand>,
) {
    while let Ok(command) = commands.try_recv() {
        tracing::info!(key = %command.key, mixer = command.mixer, value = %command.value, "applying a write");
        connection.device().apply_command(command);
    }
}

pub mod descriptors {
    use crate::catalog;
    use crate::descriptor::{DeviceClass, EntityCategory, EntityDescription, NumberMode, Platform};
    use crate::filter;
    use crate::output::{self, Record};
    use crate::product::{ConnectedModules, Module, ProductType};
    use strum::VariantArray as _;

    /// List the entity descriptors this tool knows about.
    #[derive(clap::Parser)]
    pub struct Args {
        /// Only list descriptors of this platform.
        #[arg(long, short = 'p', value_enum)]
        platform: Option<Platform>,
        /// Only list descriptors applicable to this product type.
        #[arg(long, value_enum)]
        product: Option<ProductType>,
        /// Only list descriptors whose module is among these connected modules.
        #[arg(long, value_enum, value_delimiter = ',')]
        modules: Option<Vec<Module>>,
        /// Only list mixer descriptors applicable to the mixer with this zero-based index.
        #[arg(long)]
        mixer: Option<u8>,
        #[command(flatten)]
        output: output::Args,
    }

    #[derive(thiserror::Error, Debug)]
    pub enum Error {
        #[error("could not output the descriptors")]
        Output(#[source] output::Error),
    }

    #[derive(serde::Serialize)]
    pub struct DescriptorRecord {
        pub platform: Platform,
        pub mixer: bool,
        pub key: &'static str,
        pub translation_key: &'static str,
        pub name: &'static str,
        pub product_types: String,
        pub module: Option<Module>,
        pub indexes: Option<String>,
        pub settable: bool,
        pub unit: Option<&'static str>,
        pub category: Option<EntityCategory>,
        pub device_class: Option<DeviceClass>,
        pub mode: Option<NumberMode>,
    }

    impl DescriptorRecord {
        fn new(description: &'static EntityDescription, mixer: bool) -> Self {
            Self {
                platform: description.platform(),
                mixer,
                key: description.key,
                translation_key: description.translation_key,
                name: description.name,
                product_types: description.product_types.to_string(),
                module: description.module,
                indexes: mixer.then(|| description.indexes.to_string()),
                settable: description.is_settable(),
                unit: description.unit,
                category: description.entity_category,
                device_class: description.device_class,
                mode: description.number_mode(),
            }
        }
    }

    impl Record for DescriptorRecord {
        fn headers() -> Vec<&'static str> {
            vec![
                "Platform", "Scope", "Key", "Name", "Products", "Module", "Mixers", "Settable", "Unit",
                "Category", "Class", "Mode",
            ]
        }

        fn row(&self) -> Vec<String> {
            vec![
                self.platform.to_string(),
                if self.mixer { "mixer" } else { "controller" }.to_string(),
                self.key.to_string(),
                self.name.to_string(),
                self.product_types.clone(),
                self.module.map(|m| m.to_string()).unwrap_or_default(),
                self.indexes.clone().unwrap_or_default(),
                self.settable.to_string(),
                self.unit.unwrap_or_default().to_string(),
                self.category.map(|c| c.to_string()).unwrap_or_default(),
                self.device_class.map(|c| c.to_string()).unwrap_or_default(),
                self.mode.map(|m| m.to_string()).unwrap_or_default(),
            ]
        }
    }

    fn select(
        args: &Args,
        descriptions: &'static [EntityDescription],
        mixer: bool,
    ) -> Vec<&'static EntityDescription> {
        let modules = args.modules.as_deref().map(ConnectedModules::from_present);
        let mut selected = descriptions.iter().collect::<Vec<_>>();
        if let Some(product_type) = args.product {
            selected = filter::by_product_type(product_type, selected).collect();
        }
        if let Some(modules) = &modules {
            selected = filter::by_modules(modules, selected).collect();
        }
        if let Some(index) = args.mixer.filter(|_| mixer) {
            selected = filter::by_index(index, selected).collect();
        }
        selected
    }

    pub fn records(args: &Args) -> Vec<DescriptorRecord> {
        let platforms = match args.platform {
            Some(platform) => vec![platform],
            None => Platform::VARIANTS.to_vec(),
        };
        let mut records = Vec::new();
        for platform in platforms {
            if args.mixer.is_none() {
                records.extend(
                    select(args, catalog::descriptions(platform), false)
                        .into_iter()
                        .map(|d| DescriptorRecord::new(d, false)),
                );
            }
            records.extend(
                select(args, catalog::mixer_descriptions(platform), true)
                    .into_iter()
                    .map(|d| DescriptorRecord::new(d, true)),
            );
        }
        records
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let records = records(&args);
        let mut output = args.output.to_output().map_err(Error::Output)?;
        output.records(&records).map_err(Error::Output)?;
        output.commit().map_err(Error::Output)
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use clap::Parser as _;

        fn args(argv: &[&str]) -> Args {
            Args::parse_from(std::iter::once("descriptors").chain(argv.iter().copied()))
        }

        #[test]
        fn mixer_index_restricts_to_mixer_descriptors() {
            let records = records(&args(&["-p", "number", "--product", "ecomax-i", "--mixer", "0"]));
            let keys = records.iter().map(|r| r.key).collect::<Vec<_>>();
            assert_eq!(keys, ["circuit_target_temp"]);
            assert!(records.iter().all(|r| r.mixer));
        }

        #[test]
        fn modules_gate_descriptors() {
            let without = records(&args(&["-p", "sensor", "--product", "ecomax-p", "--modules", "module-a"]));
            assert!(!without.iter().any(|r| r.key == "lambda_level"));
            let with = records(&args(&["-p", "sensor", "--product", "ecomax-p", "--modules", "module-a,ecolambda"]));
            assert!(with.iter().any(|r| r.key == "lambda_level"));
            let unfiltered = records(&args(&["-p", "sensor"]));
            assert!(unfiltered.iter().any(|r| r.key == "solar_temp"));
        }

        #[test]
        fn rows_carry_descriptor_metadata() {
            let records = records(&args(&["-p", "button"]));
            let button = records.iter().find(|r| r.key == "detect_sub_devices").unwrap();
            assert_eq!(button.category, Some(EntityCategory::Diagnostic));
            assert_eq!(button.device_class, Some(DeviceClass::Update));
            assert_eq!(button.mode, None);
            let row = button.row();
            assert_eq!(row.len(), DescriptorRecord::headers().len());
            assert_eq!(&row[9..], ["diagnostic", "update", ""]);

            let numbers = super::records(&args(&["-p", "number", "--product", "ecomax-p"]));
            assert!(numbers.iter().all(|r| r.mode.is_some()));
            assert!(numbers.iter().any(|r| r.mode == Some(NumberMode::Box)));
        }
    }
}

pub mod entities {
    use crate::connection;
    use crate::descriptor::{EntityCategory, Platform};
    use crate::entity::Entity;
    use crate::output::{self, Record};
    use crate::setup;

    /// Run the entity setup against a device snapshot and list the resulting entities.
    #[derive(clap::Parser)]
    pub struct Args {
        #[command(flatten)]
        connection: connection::Args,
        /// Only set up entities of this platform.
        #[arg(long, short = 'p', value_enum)]
        platform: Option<Platform>,
        #[command(flatten)]
        output: output::Args,
    }

    #[derive(thiserror::Error, Debug)]
    pub enum Error {
        #[error("could not start the async runtime")]
        Runtime(#[source] std::io::Error),
        #[error("could not connect to the device")]
        Connect(#[source] connection::Error),
        #[error("could not output the entities")]
        Output(#[source] output::Error),
    }

    #[derive(serde::Serialize)]
    pub struct EntityRecord {
        pub unique_id: String,
        pub name: String,
        pub platform: Platform,
        pub mixer: Option<u8>,
        pub enabled_by_default: bool,
        pub available: bool,
        pub state: Option<String>,
        pub unit: Option<&'static str>,
        pub category: Option<EntityCategory>,
    }

    impl EntityRecord {
        pub fn new(entity: &Entity) -> Self {
            Self {
                unique_id: entity.unique_id(),
                name: entity.name(),
                platform: entity.platform(),
                mixer: entity.mixer_index(),
                enabled_by_default: entity.enabled_by_default(),
                available: entity.available(),
                state: entity.current_state().native.map(|v| v.to_string()),
                unit: entity.description().unit,
                category: entity.description().entity_category,
            }
        }
    }

    impl Record for EntityRecord {
        fn headers() -> Vec<&'static str> {
            vec![
                "Unique ID", "Name", "Platform", "Mixer", "Enabled", "Available", "State", "Unit",
                "Category",
            ]
        }

        fn row(&self) -> Vec<String> {
            vec![
                self.unique_id.clone(),
                self.name.clone(),
                self.platform.to_string(),
                self.mixer.map(|m| m.to_string()).unwrap_or_default(),
                self.enabled_by_default.to_string(),
                self.available.to_string(),
                self.state.clone().unwrap_or_default(),
                self.unit.unwrap_or_default().to_string(),
                self.category.map(|c| c.to_string()).unwrap_or_default(),
            ]
        }
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let runtime = super::runtime().map_err(Error::Runtime)?;
        let records = runtime.block_on(async {
            let (connection, _commands) =
                args.connection.connect().await.map_err(Error::Connect)?;
            let entities = match args.platform {
                Some(platform) => setup::setup_platform(&connection, platform).await,
                None => setup::setup_all(&connection).await,
            };
            Ok::<_, Error>(entities.iter().map(EntityRecord::new).collect::<Vec<_>>())
        })?;
        let mut output = args.output.to_output().map_err(Error::Output)?;
        output.records(&records).map_err(Error::Output)?;
        output.commit().map_err(Error::Output)
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::catalog;
        use crate::entity::tests::connection;
        use crate::product::ProductType;

        #[test]
        fn records_describe_entities() {
            let (connection, _) = connection(
                ProductType::EcomaxP,
                serde_json::json!({"heating_temp": 61.5, "connected": true}),
            );
            let sensors = setup::top_level_entities(&connection, catalog::descriptions(Platform::Sensor));
            let sensor = sensors.iter().find(|e| e.description().key == "heating_temp").unwrap();
            let record = EntityRecord::new(sensor);
            assert_eq!(record.unique_id, "UID-heating_temp");
            assert_eq!(record.state.as_deref(), Some("61.5"));
            assert!(record.available && record.enabled_by_default);
            assert_eq!(record.row().len(), EntityRecord::headers().len());

            let buttons = setup::top_level_entities(&connection, catalog::descriptions(Platform::Button));
            let record = EntityRecord::new(&buttons[0]);
            assert_eq!(record.category, Some(EntityCategory::Diagnostic));
            assert_eq!(record.row()[8], "diagnostic");
        }
    }
}

pub mod replay {
    use crate::connection;
    use crate::device::{ATTR_ALERTS, Value, on_change};
    use crate::entity::StateWrite;
    use crate::logbook::{self, LogbookEntry};
    use crate::output::{self, Record};
    use crate::setup;
    use crate::snapshot;
    use futures::StreamExt as _;
    use std::path::PathBuf;
    use tokio::sync::mpsc;

    /// Attach entities to a device snapshot, feed recorded value changes into it and print the
    /// resulting state writes and alert logbook entries.
    #[derive(clap::Parser)]
    pub struct Args {
        #[command(flatten)]
        connection: connection::Args,
        /// JSON lines file with one `{"key", "value", "mixer"}` event per line.
        events: PathBuf,
        /// Pause between events.
        #[arg(long, default_value = "0s")]
        delay: humantime::Duration,
        #[command(flatten)]
        output: output::Args,
    }

    #[derive(thiserror::Error, Debug)]
    pub enum Error {
        #[error("could not start the async runtime")]
        Runtime(#[source] std::io::Error),
        #[error("could not connect to the device")]
        Connect(#[source] connection::Error),
        #[error("could not load the events")]
        Events(#[source] snapshot::Error),
        #[error("could not output the replay")]
        Output(#[source] output::Error),
    }

    #[derive(serde::Serialize)]
    #[serde(tag = "type", rename_all = "snake_case")]
    pub enum ReplayRecord {
        State(StateWrite),
        Alert(LogbookEntry),
    }

    impl Record for ReplayRecord {
        fn headers() -> Vec<&'static str> {
            vec!["Type", "Subject", "Value"]
        }

        fn row(&self) -> Vec<String> {
            match self {
                ReplayRecord::State(write) => {
                    let mut value =
                        write.state.native.as_ref().map_or("unknown".to_string(), |v| v.to_string());
                    if let (Some(min), Some(max)) = (write.state.min, write.state.max) {
                        value.push_str(&format!(" [{min}, {max}]"));
                    }
                    vec!["state".to_string(), write.unique_id.clone(), value]
                }
                ReplayRecord::Alert(entry) => {
                    vec!["alert".to_string(), entry.name.clone(), entry.message.clone()]
                }
            }
        }
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let runtime = super::runtime().map_err(Error::Runtime)?;
        let mut output = args.output.to_output().map_err(Error::Output)?;
        runtime.block_on(async {
            let (connection, _commands) =
                args.connection.connect().await.map_err(Error::Connect)?;
            let events = snapshot::read_events(&args.events).await.map_err(Error::Events)?;
            let mut entities = setup::setup_all(&connection).await;

            let (writes, mut write_receiver) = mpsc::unbounded_channel();
            let attached = entities.iter_mut().filter_map(|e| e.attach(writes.clone()).then_some(())).count();
            tracing::info!(attached, events = events.len(), "replaying events");

            let (alerts, mut alert_receiver) = mpsc::unbounded_channel();
            let name = connection.name().to_string();
            let device = connection.device();
            let alerts_callback = device.register_callback(
                ATTR_ALERTS,
                on_change(move |value: &Value| {
                    let Value::Alerts(list) = value else { return };
                    for alert in list {
                        let _ignore_closed = alerts.send(logbook::describe(&name, alert));
                    }
                }),
            );

            let mut replay = std::pin::pin!(snapshot::replay(
                std::sync::Arc::clone(device),
                events,
                *args.delay
            ));
            while replay.next().await.is_some() {
                while let Ok(write) = write_receiver.try_recv() {
                    output.stream(&ReplayRecord::State(write)).map_err(Error::Output)?;
                }
                while let Ok(entry) = alert_receiver.try_recv() {
                    output.stream(&ReplayRecord::Alert(entry)).map_err(Error::Output)?;
                }
            }

            device.remove_callback(ATTR_ALERTS, alerts_callback);
            let detached = entities.iter_mut().filter(|e| e.is_attached()).map(|e| e.detach()).count();
            tracing::debug!(detached, "detached entities");
            Ok::<_, Error>(())
        })?;
        output.commit().map_err(Error::Output)
    }
}

pub mod diagnostics {
    use crate::connection;
    use crate::diagnostics;
    use std::io::Write as _;
    use std::path::PathBuf;

    /// Print diagnostics for a device snapshot with identifying details redacted.
    #[derive(clap::Parser)]
    pub struct Args {
        #[command(flatten)]
        connection: connection::Args,
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    }

    #[derive(thiserror::Error, Debug)]
    pub enum Error {
        #[error("could not start the async runtime")]
        Runtime(#[source] std::io::Error),
        #[error("could not connect to the device")]
        Connect(#[source] connection::Error),
        #[error("could not collect diagnostics")]
        Collect(#[source] diagnostics::Error),
        #[error("could not write diagnostics to {1:?}")]
        WriteFile(#[source] std::io::Error, PathBuf),
        #[error("could not write diagnostics to the terminal")]
        WriteStdout(#[source] std::io::Error),
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let runtime = super::runtime().map_err(Error::Runtime)?;
        let document = runtime.block_on(async {
            let (connection, _commands) =
                args.connection.connect().await.map_err(Error::Connect)?;
            diagnostics::collect(&connection).map_err(Error::Collect)
        })?;
        let mut text = document.to_string();
        if let Ok(pretty) = serde_json::to_string_pretty(&document) {
            text = pretty;
        }
        match &args.output {
            None => writeln!(std::io::stdout().lock(), "{text}").map_err(Error::WriteStdout),
            Some(path) => std::fs::write(path, text).map_err(|e| Error::WriteFile(e, path.clone())),
        }
    }
}

pub mod get_parameter {
    use crate::connection;
    use crate::output;
    use crate::parameter;

    /// Print a device parameter along with its allowed range.
    #[derive(clap::Parser)]
    pub struct Args {
        #[command(flatten)]
        connection: connection::Args,
        /// Read the parameter of the mixer with this zero-based index.
        #[arg(long)]
        mixer: Option<u8>,
        name: String,
        /// How long to wait for the parameter to be reported.
        #[arg(long, default_value = "10s")]
        timeout: humantime::Duration,
        #[command(flatten)]
        output: output::Args,
    }

    #[derive(thiserror::Error, Debug)]
    pub enum Error {
        #[error("could not start the async runtime")]
        Runtime(#[source] std::io::Error),
        #[error("could not connect to the device")]
        Connect(#[source] connection::Error),
        #[error(transparent)]
        Parameter(parameter::Error),
        #[error("could not output the parameter")]
        Output(#[source] output::Error),
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let runtime = super::runtime().map_err(Error::Runtime)?;
        let report = runtime.block_on(async {
            let (connection, _commands) =
                args.connection.connect().await.map_err(Error::Connect)?;
            parameter::get_parameter(&connection, args.mixer, &args.name, *args.timeout)
                .await
                .map_err(Error::Parameter)
        })?;
        let mut output = args.output.to_output().map_err(Error::Output)?;
        output.records([&report]).map_err(Error::Output)?;
        output.commit().map_err(Error::Output)
    }
}

pub mod set_parameter {
    use crate::connection;
    use crate::output;
    use crate::parameter::{self, ParameterValue};

    /// Write a device parameter after checking it against the allowed range.
    ///
    /// The write is applied to the snapshot and the updated parameter is printed.
    #[derive(clap::Parser)]
    pub struct Args {
        #[command(flatten)]
        connection: connection::Args,
        /// Write the parameter of the mixer with this zero-based index.
        #[arg(long)]
        mixer: Option<u8>,
        name: String,
        /// A non-negative number, `on` or `off`.
        value: ParameterValue,
        /// How long to wait for the parameter to be reported.
        #[arg(long, default_value = "10s")]
        timeout: humantime::Duration,
        #[command(flatten)]
        output: output::Args,
    }

    #[derive(thiserror::Error, Debug)]
    pub enum Error {
        #[error("could not start the async runtime")]
        Runtime(#[source] std::io::Error),
        #[error("could not connect to the device")]
        Connect(#[source] connection::Error),
        #[error(transparent)]
        Parameter(parameter::Error),
        #[error("could not output the parameter")]
        Output(#[source] output::Error),
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let runtime = super::runtime().map_err(Error::Runtime)?;
        let report = runtime.block_on(async {
            let (connection, mut commands) =
                args.connection.connect().await.map_err(Error::Connect)?;
            let timeout = *args.timeout;
            parameter::set_parameter(&connection, args.mixer, &args.name, args.value, timeout)
                .await
                .map_err(Error::Parameter)?;
            super::apply_pending(&connection, &mut commands);
            parameter::get_parameter(&connection, args.mixer, &args.name, timeout)
                .await
                .map_err(Error::Parameter)
        })?;
        let mut output = args.output.to_output().map_err(Error::Output)?;
        output.records([&report]).map_err(Error::Output)?;
        output.commit().map_err(Error::Output)
    }
}

pub mod schedule {
    use crate::output::Record;
    use crate::schedule::{PresetRange, Preset, Weekday};
    use jiff::civil::Time;

    #[derive(serde::Serialize)]
    pub struct ScheduleRecord {
        pub weekday: Weekday,
        pub start: Time,
        pub end: Time,
        pub preset: Preset,
    }

    impl ScheduleRecord {
        pub fn new((weekday, range): (Weekday, PresetRange)) -> Self {
            let PresetRange { start, end, preset } = range;
            Self { weekday, start, end, preset }
        }
    }

    impl Record for ScheduleRecord {
        fn headers() -> Vec<&'static str> {
            vec!["Weekday", "Start", "End", "Preset"]
        }

        fn row(&self) -> Vec<String> {
            vec![
                self.weekday.to_string(),
                self.start.strftime("%H:%M").to_string(),
                self.end.strftime("%H:%M").to_string(),
                self.preset.to_string(),
            ]
        }
    }

    pub(super) fn weekdays(selected: Vec<Weekday>) -> Vec<Weekday> {
        use strum::VariantArray as _;
        if selected.is_empty() { Weekday::VARIANTS.to_vec() } else { selected }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use jiff::civil::time;

        #[test]
        fn rows_use_clock_times() {
            let record = ScheduleRecord::new((
                Weekday::Friday,
                PresetRange { start: time(6, 30, 0, 0), end: Time::midnight(), preset: Preset::Night },
            ));
            assert_eq!(record.row(), ["friday", "06:30", "00:00", "night"]);
        }

        #[test]
        fn no_weekdays_means_the_whole_week() {
            assert_eq!(weekdays(Vec::new()).len(), 7);
            assert_eq!(weekdays(vec![Weekday::Sunday]), [Weekday::Sunday]);
        }
    }
}

pub mod get_schedule {
    use super::schedule::{ScheduleRecord, weekdays};
    use crate::connection;
    use crate::output;
    use crate::schedule::{self, ScheduleType, Weekday};

    /// Print the day and night preset ranges of a schedule.
    #[derive(clap::Parser)]
    pub struct Args {
        #[command(flatten)]
        connection: connection::Args,
        #[arg(long = "type", value_enum)]
        schedule_type: ScheduleType,
        /// Weekdays to print, all of them if not given.
        #[arg(long, value_enum, value_delimiter = ',')]
        weekdays: Vec<Weekday>,
        #[command(flatten)]
        output: output::Args,
    }

    #[derive(thiserror::Error, Debug)]
    pub enum Error {
        #[error("could not start the async runtime")]
        Runtime(#[source] std::io::Error),
        #[error("could not connect to the device")]
        Connect(#[source] connection::Error),
        #[error(transparent)]
        Schedule(schedule::Error),
        #[error("could not output the schedule")]
        Output(#[source] output::Error),
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let runtime = super::runtime().map_err(Error::Runtime)?;
        let weekdays = weekdays(args.weekdays);
        let ranges = runtime.block_on(async {
            let (connection, _commands) =
                args.connection.connect().await.map_err(Error::Connect)?;
            schedule::get_schedule(connection.device(), args.schedule_type, &weekdays)
                .map_err(Error::Schedule)
        })?;
        let records = ranges.into_iter().map(ScheduleRecord::new).collect::<Vec<_>>();
        let mut output = args.output.to_output().map_err(Error::Output)?;
        output.records(&records).map_err(Error::Output)?;
        output.commit().map_err(Error::Output)
    }
}

pub mod set_schedule {
    use super::schedule::{ScheduleRecord, weekdays};
    use crate::connection;
    use crate::output;
    use crate::schedule::{self, Preset, ScheduleType, Weekday};
    use jiff::civil::Time;

    /// Switch a stretch of the given weekdays to the day or night preset.
    ///
    /// Times are rounded down to half hours. An end of `00:00` stands for the end of the day.
    #[derive(clap::Parser)]
    pub struct Args {
        #[command(flatten)]
        connection: connection::Args,
        #[arg(long = "type", value_enum)]
        schedule_type: ScheduleType,
        /// Weekdays to change, all of them if not given.
        #[arg(long, value_enum, value_delimiter = ',')]
        weekdays: Vec<Weekday>,
        #[arg(long, value_enum)]
        preset: Preset,
        #[arg(long, default_value = "00:00")]
        start: Time,
        #[arg(long, default_value = "00:00")]
        end: Time,
        #[command(flatten)]
        output: output::Args,
    }

    #[derive(thiserror::Error, Debug)]
    pub enum Error {
        #[error("could not start the async runtime")]
        Runtime(#[source] std::io::Error),
        #[error("could not connect to the device")]
        Connect(#[source] connection::Error),
        #[error(transparent)]
        Schedule(schedule::Error),
        #[error("could not output the schedule")]
        Output(#[source] output::Error),
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let runtime = super::runtime().map_err(Error::Runtime)?;
        let weekdays = weekdays(args.weekdays);
        let ranges = runtime.block_on(async {
            let (connection, mut commands) =
                args.connection.connect().await.map_err(Error::Connect)?;
            let device = connection.device();
            schedule::set_schedule(device, args.schedule_type, &weekdays, args.preset, args.start, args.end)
                .map_err(Error::Schedule)?;
            super::apply_pending(&connection, &mut commands);
            schedule::get_schedule(device, args.schedule_type, &weekdays).map_err(Error::Schedule)
        })?;
        let records = ranges.into_iter().map(ScheduleRecord::new).collect::<Vec<_>>();
        let mut output = args.output.to_output().map_err(Error::Output)?;
        output.records(&records).map_err(Error::Output)?;
        output.commit().map_err(Error::Output)
    }

}

pub mod bridge {
    use crate::connection;
    use crate::homie::{self, Command, EcomaxDevice};
    use crate::setup;
    use homie5::{Homie5DeviceProtocol, HomieDomain};
    use rumqttc::v5::mqttbytes::v5::{LastWill, Packet};
    use rumqttc::v5::{AsyncClient, Event, MqttOptions};
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio_util::task::AbortOnDropHandle;

    /// Publish the entities of a device snapshot as a Homie device over MQTT.
    ///
    /// Property `set` commands are applied to the snapshot as if the controller carried them out.
    #[derive(clap::Parser)]
    pub struct Args {
        #[command(flatten)]
        connection: connection::Args,
        /// MQTT broker to connect to, e.g. `mqtt://localhost:1883?client_id=ecomax-tools`.
        #[arg(long, default_value = "mqtt://localhost:1883?client_id=ecomax-tools")]
        mqtt: String,
        /// Homie device ID. Derived from the controller UID by default.
        #[arg(long)]
        device_id: Option<String>,
    }

    #[derive(thiserror::Error, Debug)]
    pub enum Error {
        #[error("could not start the async runtime")]
        Runtime(#[source] std::io::Error),
        #[error("could not connect to the device")]
        Connect(#[source] connection::Error),
        #[error("invalid MQTT broker URL `{1}`")]
        MqttUrl(#[source] Box<dyn std::error::Error + Send + Sync>, String),
        #[error("could not run the Homie device")]
        Homie(#[source] homie::Error),
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let runtime = super::runtime().map_err(Error::Runtime)?;
        runtime.block_on(async {
            let (connection, device_commands) =
                args.connection.connect().await.map_err(Error::Connect)?;
            let device_id = match args.device_id {
                Some(id) => homie::homie_id(id),
                None => homie::device_id(connection.uid()),
            }
            .map_err(Error::Homie)?;
            let (protocol, last_will) = Homie5DeviceProtocol::new(device_id, HomieDomain::Default);

            let mut options = MqttOptions::parse_url(&args.mqtt)
                .map_err(|e| Error::MqttUrl(e.into(), args.mqtt.clone()))?;
            options.set_last_will(LastWill::new(
                last_will.topic,
                last_will.message,
                homie::convert_qos(last_will.qos),
                last_will.retain,
                None,
            ));
            let (mqtt, mut event_loop) = AsyncClient::new(options, 64);

            let (command_sender, commands) = mpsc::unbounded_channel();
            let _mqtt_task = AbortOnDropHandle::new(tokio::spawn(async move {
                loop {
                    match event_loop.poll().await {
                        Ok(Event::Incoming(Packet::Publish(publish))) => {
                            let Ok(command) = Command::try_from_mqtt_command(publish) else {
                                continue;
                            };
                            if command_sender.send(command).is_err() {
                                return;
                            }
                        }
                        Ok(_) => {}
                        Err(e) => {
                            tracing::warn!(
                                message = "MQTT connection error",
                                error = (&e as &dyn std::error::Error)
                            );
                            tokio::time::sleep(Duration::from_secs(1)).await;
                        }
                    }
                }
            }));

            let entities = setup::setup_all(&connection).await;
            let mut device =
                EcomaxDevice::new(mqtt, protocol, connection, entities, device_commands, commands)
                    .map_err(Error::Homie)?;
            device.publish_device().await.map_err(Error::Homie)?;
            while device.step().await.map_err(Error::Homie)? {}
            Ok(())
        })
    }
}
