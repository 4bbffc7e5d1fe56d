#![deny(unsafe_code)]
pub mod commands;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use clap::builder::styling::{AnsiColor, Effects, Styles};
use commands::command::Command;
use commands::filter_window::FilterWindow;
use commands::watch::Watch;
use enum_dispatch::enum_dispatch;
use env_logger::Env;
use log::{error, info};
use watchdog_lib::errors::WatchdogError;

/// Custom styles for CLI help output
const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// Exit status after an operator interrupt (128 + SIGINT).
const INTERRUPTED_EXIT_CODE: u8 = 130;

#[derive(Parser, Debug)]
#[command(styles = STYLES)]
struct Args {
    #[clap(subcommand)]
    subcommand: Subcommand,
}

#[enum_dispatch(Command)]
#[derive(Parser, Debug)]
#[command(version)]
enum Subcommand {
    #[command(display_order = 1)]
    Watch(Watch),
    #[command(display_order = 2)]
    FilterWindow(FilterWindow),
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let command_line = std::env::args().collect::<Vec<_>>().join(" ");
    let args = Args::parse();

    info!("Running watchdog version {}", env!("CARGO_PKG_VERSION"));
    match args.subcommand.execute(&command_line) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            if matches!(e.downcast_ref::<WatchdogError>(), Some(WatchdogError::Interrupted)) {
                ExitCode::from(INTERRUPTED_EXIT_CODE)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
