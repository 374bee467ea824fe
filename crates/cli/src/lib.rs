pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "storefront",
    about = "Storefront operator CLI",
    long_about = "Apply storefront database migrations, load the product catalog, and check runtime readiness.",
    after_help = "Examples:\n  storefront migrate\n  storefront seed\n  storefront doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Apply migrations, then load and verify the product catalog")]
    Seed,
    #[command(about = "Validate config, DB connectivity, and catalog readiness")]
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
        Command::Doctor { json } => commands::doctor::run(json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Command};

    #[test]
    fn doctor_accepts_json_flag() {
        let cli = Cli::try_parse_from(["storefront", "doctor", "--json"]).expect("parse");

        assert!(matches!(cli.command, Command::Doctor { json: true }));
    }

    #[test]
    fn unknown_subcommand_is_rejected() {
        assert!(Cli::try_parse_from(["storefront", "smoke"]).is_err());
    }
}
