use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::telemetry::logging::{LogConfig, LogLevel};

#[derive(Parser, Debug)]
#[command(
    name = "slate-view",
    about = "Live tables of messages captured by a slate sniffer",
    author,
    version = concat!(env!("CARGO_PKG_VERSION"), "-", env!("BUILD_TIMESTAMP"))
)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        env = "SLATE_SERVER",
        default_value = "http://127.0.0.1:5000",
        help = "Base URL of the sniffer backend"
    )]
    pub server: String,

    #[command(flatten)]
    pub logging: LoggingArgs,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Args, Debug, Clone)]
pub struct LoggingArgs {
    #[arg(
        long = "log-level",
        value_enum,
        global = true,
        env = "SLATE_LOG_LEVEL",
        default_value_t = LogLevel::Warn,
        help = "Minimum log level (error, warn, info, debug, trace)"
    )]
    pub level: LogLevel,

    #[arg(
        long = "log-file",
        value_name = "PATH",
        global = true,
        env = "SLATE_LOG_FILE",
        help = "Write structured logs to the specified file (recommended with watch)"
    )]
    pub file: Option<PathBuf>,
}

impl LoggingArgs {
    pub fn to_config(&self, terminal_owned: bool) -> LogConfig {
        LogConfig {
            level: self.level,
            file: self.file.clone(),
            terminal_owned,
        }
    }
}

impl Cli {
    /// `watch` draws over the whole terminal, so its logs never go to stderr.
    pub fn log_config(&self) -> LogConfig {
        self.logging.to_config(matches!(self.command, Some(Command::Watch(_))))
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List sniffed services (default when no subcommand given)
    Services,
    /// Open the live table of one service
    Watch(WatchArgs),
    /// Show or change the capture status
    Status(StatusArgs),
    /// Send a message to a service
    Inject(InjectArgs),
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    #[arg(value_name = "SERVICE", help = "Service to watch")]
    pub service: String,

    #[arg(
        long = "poll-interval-ms",
        value_name = "MS",
        help = "Fetch interval while capturing (defaults to SLATE_POLL_INTERVAL_MS or 1000)"
    )]
    pub poll_interval_ms: Option<u64>,

    #[arg(
        long = "reattach-at-bottom",
        action = clap::ArgAction::SetTrue,
        help = "Resume following new rows when scrolled back to the bottom"
    )]
    pub reattach_at_bottom: bool,
}

#[derive(Args, Debug, Default)]
pub struct StatusArgs {
    #[arg(
        long = "start",
        action = clap::ArgAction::SetTrue,
        conflicts_with = "stop",
        help = "Request capture to start"
    )]
    pub start: bool,

    #[arg(
        long = "stop",
        action = clap::ArgAction::SetTrue,
        help = "Request capture to stop"
    )]
    pub stop: bool,
}

impl StatusArgs {
    pub fn requested(&self) -> Option<bool> {
        match (self.start, self.stop) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

#[derive(Args, Debug)]
pub struct InjectArgs {
    #[arg(value_name = "SERVICE", help = "Service to send the message to")]
    pub service: String,

    #[arg(
        long = "prefill",
        value_name = "ENCODED",
        help = "Start from an encoded row (press p in watch to get one)"
    )]
    pub prefill: Option<String>,

    #[arg(
        long = "set",
        value_name = "NAME=VALUE",
        help = "Override one field; may be repeated"
    )]
    pub set: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::logging::LogSink;

    #[test]
    fn parses_watch_options() {
        let cli = Cli::try_parse_from([
            "slate-view",
            "--server",
            "http://sniffer:5000",
            "watch",
            "plc",
            "--poll-interval-ms",
            "250",
            "--reattach-at-bottom",
        ])
        .unwrap();
        assert_eq!(cli.server, "http://sniffer:5000");
        match cli.command {
            Some(Command::Watch(args)) => {
                assert_eq!(args.service, "plc");
                assert_eq!(args.poll_interval_ms, Some(250));
                assert!(args.reattach_at_bottom);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn watch_keeps_logs_off_the_terminal() {
        let watch = Cli::try_parse_from(["slate-view", "watch", "plc"]).unwrap();
        assert_eq!(watch.log_config().sink(), LogSink::Discard);
        let listing = Cli::try_parse_from(["slate-view", "services"]).unwrap();
        assert_eq!(listing.log_config().sink(), LogSink::Stderr);
        let logged =
            Cli::try_parse_from(["slate-view", "--log-file", "view.log", "watch", "plc"]).unwrap();
        assert_eq!(
            logged.log_config().sink(),
            LogSink::File(PathBuf::from("view.log"))
        );
    }

    #[test]
    fn status_flags_conflict() {
        assert!(Cli::try_parse_from(["slate-view", "status", "--start", "--stop"]).is_err());
        let cli = Cli::try_parse_from(["slate-view", "status", "--stop"]).unwrap();
        match cli.command {
            Some(Command::Status(args)) => assert_eq!(args.requested(), Some(false)),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn inject_collects_overrides() {
        let cli = Cli::try_parse_from([
            "slate-view",
            "inject",
            "plc",
            "--set",
            "a=1",
            "--set",
            "b=true",
        ])
        .unwrap();
        match cli.command {
            Some(Command::Inject(args)) => {
                assert_eq!(args.set, vec!["a=1", "b=true"]);
                assert!(args.prefill.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn no_subcommand_defaults_to_listing() {
        let cli = Cli::try_parse_from(["slate-view"]).unwrap();
        assert!(cli.command.is_none());
    }
}
