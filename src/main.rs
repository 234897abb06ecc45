//! taskwrap CLI entrypoint

use std::process::ExitCode;

use clap::Parser;

use taskwrap::cli::Cli;
use taskwrap::error::Stage;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match cli.load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("taskwrap: {:#}", e);
            return ExitCode::from(Stage::Config.exit_code());
        }
    };

    // Initialize tracing; the guard flushes out.log on exit
    let _guard = match taskwrap::logging::init(&config.log_file()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("taskwrap: {:#}", e);
            return ExitCode::from(Stage::Config.exit_code());
        }
    };

    match cli.execute(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("taskwrap: {} ({})", e, e.kind());
            ExitCode::from(e.exit_code())
        }
    }
}
