mod cli;
mod commands;
mod config;
mod ui;

use std::io;
use std::process::ExitCode;

use cli::Invocation;
use domainkit::backend::rest::RestConnector;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
}

fn main() -> ExitCode {
    let args = std::env::args_os()
        .skip(1)
        .map(|arg| arg.to_string_lossy().into_owned());
    let invocation = cli::parse(args);

    let (verbose, quiet) = match &invocation {
        Invocation::Run(cli) => (cli.verbose, cli.quiet),
        Invocation::Help => (0, false),
    };

    // Initialize logging based on verbosity
    let log_level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context { verbose, quiet };
    let code = commands::provision::dispatch(
        &ctx,
        &invocation,
        RestConnector::new(),
        &mut io::stdout().lock(),
    );
    ExitCode::from(code)
}
