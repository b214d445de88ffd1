use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub(crate) fn env_truthy(var: &str) -> Option<bool> {
    std::env::var(var)
        .map(|v| {
            let v = v.trim();
            !v.is_empty() && v != "0" && !v.eq_ignore_ascii_case("false")
        })
        .ok()
}

static PERF_ENABLED: Lazy<bool> = Lazy::new(|| env_truthy("SLATE_PERF").unwrap_or(false));

static STATS: Lazy<Mutex<HashMap<&'static str, PerfStat>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

static GAUGES: Lazy<Mutex<HashMap<&'static str, GaugeStat>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

#[derive(Default)]
struct GaugeStat {
    last: u64,
    samples: u64,
}

#[derive(Default)]
struct PerfStat {
    total_ns: u128,
    max_ns: u128,
    count: u64,
}

pub fn enabled() -> bool {
    *PERF_ENABLED
}

pub fn record_duration(label: &'static str, duration: Duration) {
    if !enabled() {
        return;
    }
    let Ok(mut stats) = STATS.lock() else {
        return;
    };
    let entry = stats.entry(label).or_default();
    entry.count += 1;
    let nanos = duration.as_nanos();
    entry.total_ns += nanos;
    entry.max_ns = entry.max_ns.max(nanos);
    if entry.count % 200 == 0 {
        report_stat(label, entry);
    }
}

pub fn record_gauge(label: &'static str, value: u64) {
    if !enabled() {
        return;
    }
    let Ok(mut gauges) = GAUGES.lock() else {
        return;
    };
    let entry = gauges.entry(label).or_default();
    entry.last = value;
    entry.samples = entry.samples.saturating_add(1);
    if entry.samples % 200 == 0 {
        tracing::info!(
            target = "slate::perf",
            label,
            gauge = entry.last,
            samples = entry.samples,
            "perf gauge"
        );
    }
}

fn report_stat(label: &'static str, stat: &PerfStat) {
    let avg_ns = if stat.count > 0 {
        stat.total_ns / stat.count as u128
    } else {
        0
    };
    let avg_us = avg_ns as f64 / 1_000.0;
    let max_us = stat.max_ns as f64 / 1_000.0;
    // stderr belongs to the TUI while it runs, so perf output goes through tracing.
    tracing::info!(
        target = "slate::perf",
        label,
        count = stat.count,
        avg_us = %format!("{avg_us:.2}"),
        max_us = %format!("{max_us:.2}"),
        "perf timing"
    );
}

pub struct PerfGuard {
    label: &'static str,
    start: Instant,
}

impl PerfGuard {
    pub fn new(label: &'static str) -> Option<Self> {
        if !enabled() {
            return None;
        }
        Some(Self {
            label,
            start: Instant::now(),
        })
    }
}

impl Drop for PerfGuard {
    fn drop(&mut self) {
        record_duration(self.label, self.start.elapsed());
    }
}

pub mod logging {
    //! Log sink setup. `watch` hands the terminal to the TUI, so unless a log
    //! file is given its records are dropped rather than drawn over the table.

    use clap::ValueEnum;
    use std::fs::OpenOptions;
    use std::path::PathBuf;
    use std::sync::OnceLock;
    use tracing::level_filters::LevelFilter;
    use tracing_appender::non_blocking::WorkerGuard;
    use tracing_subscriber::EnvFilter;

    #[derive(Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq, PartialOrd, Ord)]
    pub enum LogLevel {
        Error,
        #[default]
        Warn,
        Info,
        Debug,
        Trace,
    }

    impl LogLevel {
        pub fn as_str(self) -> &'static str {
            match self {
                LogLevel::Error => "error",
                LogLevel::Warn => "warn",
                LogLevel::Info => "info",
                LogLevel::Debug => "debug",
                LogLevel::Trace => "trace",
            }
        }

        pub fn to_filter(self) -> LevelFilter {
            match self {
                LogLevel::Error => LevelFilter::ERROR,
                LogLevel::Warn => LevelFilter::WARN,
                LogLevel::Info => LevelFilter::INFO,
                LogLevel::Debug => LevelFilter::DEBUG,
                LogLevel::Trace => LevelFilter::TRACE,
            }
        }
    }

    /// Where formatted records end up.
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum LogSink {
        Stderr,
        File(PathBuf),
        Discard,
    }

    #[derive(Clone, Debug, Default)]
    pub struct LogConfig {
        pub level: LogLevel,
        pub file: Option<PathBuf>,
        /// Set while a TUI owns stdout/stderr.
        pub terminal_owned: bool,
    }

    impl LogConfig {
        pub fn sink(&self) -> LogSink {
            match (&self.file, self.terminal_owned) {
                (Some(path), _) => LogSink::File(path.clone()),
                (None, true) => LogSink::Discard,
                (None, false) => LogSink::Stderr,
            }
        }
    }

    #[derive(thiserror::Error, Debug)]
    pub enum InitError {
        #[error("failed to open log file {path:?}: {source}")]
        Io {
            path: PathBuf,
            source: std::io::Error,
        },
        #[error("failed to configure logger: {0}")]
        Configure(String),
    }

    static GUARD: OnceLock<WorkerGuard> = OnceLock::new();

    /// Installs the global subscriber. Later calls are no-ops.
    pub fn init(config: &LogConfig) -> Result<(), InitError> {
        if GUARD.get().is_some() {
            return Ok(());
        }
        let filter = match std::env::var("SLATE_LOG_FILTER") {
            Ok(directives) => EnvFilter::new(directives),
            Err(_) => EnvFilter::new(directives(config.level, trace_deps())),
        };

        let sink = config.sink();
        let (writer, guard) = match &sink {
            LogSink::File(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|source| InitError::Io {
                        path: path.clone(),
                        source,
                    })?;
                tracing_appender::non_blocking(file)
            }
            LogSink::Stderr => tracing_appender::non_blocking(std::io::stderr()),
            LogSink::Discard => tracing_appender::non_blocking(std::io::sink()),
        };

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(config.level >= LogLevel::Debug)
            .with_ansi(sink == LogSink::Stderr)
            .with_writer(writer)
            .try_init()
            .map_err(|err| InitError::Configure(err.to_string()))?;

        let _ = GUARD.set(guard);
        tracing::debug!(
            target = "slate::log",
            sink = ?sink,
            level = config.level.as_str(),
            "logging ready"
        );
        Ok(())
    }

    fn trace_deps() -> bool {
        super::env_truthy("SLATE_TRACE_DEPS").unwrap_or(false)
    }

    /// Filter directives: the workspace crates log at `level`, everything
    /// else (hyper, reqwest, rustls, ...) is capped at `warn` unless
    /// dependency tracing was asked for.
    pub(crate) fn directives(level: LogLevel, trace_deps: bool) -> String {
        let deps = if trace_deps {
            level
        } else {
            level.min(LogLevel::Warn)
        };
        let own = level.as_str();
        format!("{},slate_view={own},sniffer_sdk={own}", deps.as_str())
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn dependencies_are_capped_at_warn() {
            assert_eq!(
                directives(LogLevel::Debug, false),
                "warn,slate_view=debug,sniffer_sdk=debug"
            );
            assert_eq!(
                directives(LogLevel::Error, false),
                "error,slate_view=error,sniffer_sdk=error"
            );
            assert_eq!(
                directives(LogLevel::Trace, true),
                "trace,slate_view=trace,sniffer_sdk=trace"
            );
        }

        #[test]
        fn owned_terminal_never_gets_log_output() {
            let mut config = LogConfig {
                terminal_owned: true,
                ..LogConfig::default()
            };
            assert_eq!(config.sink(), LogSink::Discard);
            config.file = Some(PathBuf::from("/tmp/slate.log"));
            assert_eq!(config.sink(), LogSink::File(PathBuf::from("/tmp/slate.log")));
            config.terminal_owned = false;
            config.file = None;
            assert_eq!(config.sink(), LogSink::Stderr);
        }

        #[test]
        fn levels_order_by_verbosity() {
            assert!(LogLevel::Trace > LogLevel::Debug);
            assert_eq!(LogLevel::default().as_str(), "warn");
            assert_eq!(LogLevel::Info.to_filter(), LevelFilter::INFO);
        }
    }
}
