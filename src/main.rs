use std::process::ExitCode;

use brushstroke::cli::{self, CliArgs};
use brushstroke::logger;
use brushstroke::settings::StrokeSettings;
use clap::Parser;

fn main() -> ExitCode {
    let args = CliArgs::parse();
    let settings = StrokeSettings::load();

    // Session log (overwrites the previous run's log)
    if settings.log_to_file {
        logger::init();
    }

    cli::run(args, &settings)
}
