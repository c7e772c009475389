//! HTTP Load Tester - command-line entry point

use clap::Parser;
use http_load_tester::{
    app::App,
    cli::{self, Cli},
    error::{ErrorReporter, Result},
};
use std::process;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let args = cli.run_args().clone();
    let reporter = ErrorReporter::new(!args.no_color && cli::supports_color(), args.verbose);

    match run_application(cli).await {
        Ok(code) => process::exit(code),
        Err(error) => {
            reporter.report_error(&error);
            process::exit(error.exit_code());
        }
    }
}

/// Load configuration, run the scenario and return the exit code
async fn run_application(cli: Cli) -> Result<i32> {
    let app = App::new(cli.run_args().clone())?;
    app.init_logging()?;

    tracing::debug!(version = http_load_tester::VERSION, "{} starting", http_load_tester::PKG_NAME);

    let code = app.run().await?;
    if code != 0 {
        tracing::info!(exit_code = code, "thresholds failed");
    }
    Ok(code)
}

