use clap::Parser;
use slate_view::telemetry::logging;
use slate_view::terminal::{app, cli::Cli, error::CliError};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = init_logging(&cli) {
        eprintln!("❌ {err}");
        std::process::exit(1);
    }
    if let Err(err) = app::run(cli).await {
        tracing::error!(target = "slate::cli", error = %err, "command failed");
        eprintln!("❌ {err}");
        std::process::exit(1);
    }
}

fn init_logging(cli: &Cli) -> Result<(), CliError> {
    logging::init(&cli.log_config()).map_err(|err| CliError::Logging(err.to_string()))
}
