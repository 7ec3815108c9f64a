pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use crate::commands::slots::SlotsArgs;

#[derive(Debug, Parser)]
#[command(
    name = "chairside",
    about = "Chairside clinic booking operator CLI",
    long_about = "Operate the Chairside booking store: migrations, demo roster, expiry sweeps, availability inspection, config and readiness checks.",
    after_help = "Examples:\n  chairside migrate\n  chairside seed\n  chairside slots prov-ivanov --days 3 --duration 45\n  chairside doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the demo clinic roster (idempotent) and verify it")]
    Seed,
    #[command(about = "Mark every elapsed active hold as expired, once")]
    Sweep,
    #[command(about = "List a provider's free slots grouped by day")]
    Slots {
        #[arg(help = "Provider identifier, e.g. prov-ivanov")]
        provider_id: String,
        #[arg(long, help = "Horizon in days, starting today in the provider's zone")]
        days: Option<u32>,
        #[arg(long = "duration", help = "Slot length in minutes")]
        duration_min: Option<u32>,
        #[arg(long, help = "IANA timezone used to group and label the slots")]
        tz: Option<String>,
    },
    #[command(about = "Run end-to-end readiness checks with per-check timing details")]
    Smoke,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config, booking settings, and database schema readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Sweep => commands::sweep::run(),
        Command::Slots { provider_id, days, duration_min, tz } => {
            commands::slots::run(SlotsArgs { provider_id, days, duration_min, tz })
        }
        Command::Smoke => commands::smoke::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
