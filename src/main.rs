use std::process::ExitCode;

use clap::{Parser, Subcommand};
use mpracount::command;
use mpracount::runtime::{setup_global_logger, LogLevel};

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[arg(long = "log-level", global = true, default_value = "info")]
    /// trace, debug, info, warn or error. RUST_LOG overrides this
    log_level: LogLevel,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Count barcodes of every sample in a manifest, then associate and aggregate
    Run(command::RunCMD),
    /// Count barcodes of a single sample
    Count(command::CountCMD),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_global_logger(cli.log_level);

    let result = match cli.command {
        Commands::Run(mut cmd) => cmd.try_execute(),
        Commands::Count(mut cmd) => cmd.try_execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
