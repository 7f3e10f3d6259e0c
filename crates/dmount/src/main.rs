//! dmount CLI entry point.

use std::process::ExitCode;

use clap::Parser;

use dmount::cli::Cli;
use dmount::logging;
use dmount_common::ExitStatusCode;

fn main() -> ExitCode {
    // Parse CLI arguments; anything but help and version is a usage error
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitStatusCode::Usage.into()
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    // Initialize tracing
    if let Err(e) = logging::init(cli.debug, cli.log_format) {
        eprintln!("{e}");
    }

    // Execute command
    match cli.execute() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let status = err.exit_status();
            eprintln!("{:?}", miette::Report::new(err));
            status.into()
        }
    }
}
