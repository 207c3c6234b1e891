use clap::Parser as _;
use ecomax_tools::commands;
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _};

#[derive(clap::Parser)]
#[clap(version, about)]
enum Commands {
    Descriptors(commands::descriptors::Args),
    Entities(commands::entities::Args),
    Replay(commands::replay::Args),
    Diagnostics(commands::diagnostics::Args),
    GetParameter(commands::get_parameter::Args),
    SetParameter(commands::set_parameter::Args),
    GetSchedule(commands::get_schedule::Args),
    SetSchedule(commands::set_schedule::Args),
    Bridge(commands::bridge::Args),
}

fn end<E: std::error::Error>(r: Result<(), E>) {
    std::process::exit(match r {
        Ok(_) => 0,
        Err(e) => {
            eprintln!("error: {e}");
            let mut cause = e.source();
            while let Some(e) = cause {
                eprintln!("  because: {e}");
                cause = e.source();
            }
            1
        }
    });
}

fn main() {
    let filter_description =
        std::env::var("ECOMAX_TOOLS_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = match filter_description.parse::<tracing_subscriber::filter::targets::Targets>() {
        Ok(filter) => filter,
        Err(e) => {
            eprintln!("error: ECOMAX_TOOLS_LOG is not a valid filter: {e}");
            std::process::exit(2);
        }
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
    match Commands::parse() {
        Commands::Descriptors(args) => end(commands::descriptors::run(args)),
        Commands::Entities(args) => end(commands::entities::run(args)),
        Commands::Replay(args) => end(commands::replay::run(args)),
        Commands::Diagnostics(args) => end(commands::diagnostics::run(args)),
        Commands::GetParameter(args) => end(commands::get_parameter::run(args)),
        Commands::SetParameter(args) => end(commands::set_parameter::run(args)),
        Commands::GetSchedule(args) => end(commands::get_schedule::run(args)),
        Commands::SetSchedule(args) => end(commands::set_schedule::run(args)),
        Commands::Bridge(args) => end(commands::bridge::run(args)),
    }
}
