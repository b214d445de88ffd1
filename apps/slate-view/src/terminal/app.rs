use std::io::{self, Write};
use std::sync::Arc;

use reqwest::StatusCode;
use sniffer_sdk::{Field, SnifferApi, SnifferClient, SnifferError};
use tracing::info;

use crate::client::inject::InjectDraft;
use crate::client::prefill;
use crate::client::status::StatusToggle;
use crate::client::view::ViewController;
use crate::config::ViewConfig;
use crate::terminal::cli::{self, Command, InjectArgs, StatusArgs, WatchArgs};
use crate::terminal::error::CliError;

pub async fn run(cli: cli::Cli) -> Result<(), CliError> {
    let client = SnifferClient::new(&cli.server)?;
    info!(target = "slate::cli", server = %client.base_url(), "using backend");
    let api: Arc<dyn SnifferApi> = Arc::new(client);
    let mut out = io::stdout();

    match cli.command {
        Some(Command::Services) | None => list_services(api.as_ref(), &mut out).await,
        Some(Command::Status(args)) => status(api.as_ref(), &args, &mut out).await,
        Some(Command::Inject(args)) => inject(api.as_ref(), &args, &mut out).await,
        Some(Command::Watch(args)) => watch(api, args).await,
    }
}

async fn watch(api: Arc<dyn SnifferApi>, args: WatchArgs) -> Result<(), CliError> {
    if args.poll_interval_ms == Some(0) {
        return Err(CliError::InvalidArgument(
            "--poll-interval-ms must be greater than zero".into(),
        ));
    }
    let config = ViewConfig::from_env()
        .with_poll_interval_ms(args.poll_interval_ms)
        .with_reattach_at_bottom(args.reattach_at_bottom);
    let controller = ViewController::open(api, &args.service, &config)
        .await
        .map_err(|err| not_found_as_unknown(err, &args.service))?;
    controller
        .run()
        .await
        .map_err(|err| CliError::Runtime(err.to_string()))
}

fn not_found_as_unknown(err: SnifferError, service: &str) -> CliError {
    match err {
        SnifferError::UnexpectedStatus { status, .. } if status == StatusCode::NOT_FOUND => {
            CliError::UnknownService(service.to_string())
        }
        other => CliError::Sniffer(other),
    }
}

async fn schema_of(api: &dyn SnifferApi, service: &str) -> Result<Vec<Field>, CliError> {
    api.get_schema(service)
        .await
        .map_err(|err| not_found_as_unknown(err, service))
}

pub async fn list_services(api: &dyn SnifferApi, out: &mut impl Write) -> Result<(), CliError> {
    let services = api.list_services().await?;
    if services.is_empty() {
        writeln!(out, "no services")?;
        return Ok(());
    }
    let width = services
        .iter()
        .map(|s| s.name.len())
        .max()
        .unwrap_or(0)
        .max("NAME".len());
    writeln!(out, "{:<width$}  ADDRESS", "NAME")?;
    for service in services {
        writeln!(
            out,
            "{:<width$}  {}:{}",
            service.name, service.host, service.port
        )?;
    }
    Ok(())
}

pub async fn status(
    api: &dyn SnifferApi,
    args: &StatusArgs,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let mut toggle = StatusToggle::new();
    match args.requested() {
        None => toggle.observe(api.get_status().await?),
        Some(requested) => {
            let actual = api.set_status(requested).await?;
            toggle.observe(actual);
            if actual != requested {
                writeln!(out, "backend refused the change")?;
            }
        }
    }
    writeln!(out, "{}", toggle.status_label())?;
    Ok(())
}

pub async fn inject(
    api: &dyn SnifferApi,
    args: &InjectArgs,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let schema = schema_of(api, &args.service).await?;
    let mut draft = match &args.prefill {
        Some(encoded) => InjectDraft::from_prefill(schema, prefill::decode(encoded)?)?,
        None => InjectDraft::from_schema(schema),
    };
    for assignment in &args.set {
        draft.apply(assignment)?;
    }
    for (label, value, _) in draft.lines() {
        writeln!(out, "{label} = {value}")?;
    }
    writeln!(out, "Sending...")?;
    match api.inject(&args.service, draft.to_message()).await {
        Ok(()) => {
            writeln!(out, "Sent!")?;
            Ok(())
        }
        Err(err) => {
            writeln!(out, "Error!!!")?;
            Err(err.into())
        }
    }
}
