use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, Registry};

use crate::config::CONFIG;

const LOGS_DIR: &str = "logs";

/// Target carried by every operation and LLM timing record.
pub const TIMING_TARGET: &str = "studio.timing";

/// Chatty dependencies capped at WARN on the activity stream.
const QUIET_TARGETS: [&str; 5] = [
    "hyper",
    "hyper_util",
    "hyper_util::client::legacy::pool",
    "reqwest",
    "sqlx",
];

type StreamLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// The studio writes two streams, each as a daily-rolled text file and a JSONL twin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    /// Session progress, state transitions and API failures. Also echoed to stdout.
    Activity,
    /// Records emitted on [`TIMING_TARGET`] only.
    Timing,
}

impl LogStream {
    pub const ALL: [LogStream; 2] = [LogStream::Activity, LogStream::Timing];

    fn stem(self) -> &'static str {
        match self {
            LogStream::Activity => "persona_studio",
            LogStream::Timing => "timing",
        }
    }

    /// File prefix of the human-readable log; the appender adds a date suffix.
    pub fn text_file(self) -> String {
        format!("{}.log", self.stem())
    }

    pub fn json_file(self) -> String {
        format!("{}.jsonl", self.stem())
    }

    fn filter(self, level: LevelFilter) -> Targets {
        match self {
            LogStream::Activity => QUIET_TARGETS
                .iter()
                .fold(Targets::new().with_default(level), |targets, target| {
                    targets.with_target(*target, LevelFilter::WARN)
                })
                .with_target(TIMING_TARGET, LevelFilter::OFF),
            LogStream::Timing => Targets::new()
                .with_default(LevelFilter::OFF)
                .with_target(TIMING_TARGET, LevelFilter::INFO),
        }
    }

    fn echoes_to_stdout(self) -> bool {
        self == LogStream::Activity
    }
}

/// Flushes the non-blocking writers when dropped; hold it for the life of `main`.
pub struct LoggingGuards {
    _writers: Vec<WorkerGuard>,
}

#[derive(Debug, Clone)]
pub struct LogTail {
    pub path: PathBuf,
    pub lines: Vec<String>,
}

fn parse_log_level(value: &str) -> LevelFilter {
    match value.trim().to_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "warn" | "warning" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        "off" => LevelFilter::OFF,
        _ => LevelFilter::INFO,
    }
}

fn daily_writer(logs_dir: &Path, file_name: &str, guards: &mut Vec<WorkerGuard>) -> NonBlocking {
    let appender = tracing_appender::rolling::daily(logs_dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    guards.push(guard);
    writer
}

pub fn init_logging() -> LoggingGuards {
    init_logging_in(Path::new(LOGS_DIR), &CONFIG.log_level)
}

pub fn init_logging_in(logs_dir: &Path, log_level: &str) -> LoggingGuards {
    if let Err(err) = fs::create_dir_all(logs_dir) {
        eprintln!("Failed to create logs directory: {err}");
    }

    let level = parse_log_level(log_level);
    let mut guards = Vec::new();
    let mut layers: Vec<StreamLayer> = Vec::new();

    for stream in LogStream::ALL {
        let filter = stream.filter(level);

        let text = daily_writer(logs_dir, &stream.text_file(), &mut guards);
        layers.push(
            tracing_subscriber::fmt::layer()
                .with_writer(text)
                .with_ansi(false)
                .with_filter(filter.clone())
                .boxed(),
        );

        let json = daily_writer(logs_dir, &stream.json_file(), &mut guards);
        layers.push(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(json)
                .with_filter(filter.clone())
                .boxed(),
        );

        if stream.echoes_to_stdout() {
            layers.push(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stdout)
                    .with_filter(filter)
                    .boxed(),
            );
        }
    }

    tracing_subscriber::registry().with(layers).init();

    LoggingGuards { _writers: guards }
}

/// Last `max_lines` lines of the newest text file of `stream`.
pub fn read_recent_log_lines(stream: LogStream, max_lines: usize) -> io::Result<Option<LogTail>> {
    read_recent_log_lines_in(Path::new(LOGS_DIR), stream, max_lines)
}

pub fn read_recent_log_lines_in(
    logs_dir: &Path,
    stream: LogStream,
    max_lines: usize,
) -> io::Result<Option<LogTail>> {
    if max_lines == 0 {
        return Ok(None);
    }
    let Some(path) = newest_rolled_file(logs_dir, &stream.text_file())? else {
        return Ok(None);
    };
    let lines = last_lines(&path, max_lines)?;
    Ok(Some(LogTail { path, lines }))
}

/// Newest file named `<prefix>*`; on equal mtimes the later date suffix wins.
fn newest_rolled_file(logs_dir: &Path, prefix: &str) -> io::Result<Option<PathBuf>> {
    if !logs_dir.exists() {
        return Ok(None);
    }

    let mut rolled = Vec::new();
    for entry in fs::read_dir(logs_dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() || !entry.file_name().to_string_lossy().starts_with(prefix) {
            continue;
        }
        let modified = entry
            .metadata()
            .and_then(|meta| meta.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        rolled.push((modified, path));
    }

    Ok(rolled.into_iter().max().map(|(_, path)| path))
}

fn last_lines(path: &Path, max_lines: usize) -> io::Result<Vec<String>> {
    let mut window = VecDeque::with_capacity(max_lines);
    for line in BufReader::new(File::open(path)?).lines() {
        if window.len() == max_lines {
            window.pop_front();
        }
        window.push_back(line?);
    }
    Ok(window.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn parses_levels_with_info_fallback() {
        assert_eq!(parse_log_level("WARNING"), LevelFilter::WARN);
        assert_eq!(parse_log_level(" debug "), LevelFilter::DEBUG);
        assert_eq!(parse_log_level("chatty"), LevelFilter::INFO);
    }

    #[test]
    fn streams_split_timing_records_from_activity() {
        let activity = LogStream::Activity.filter(LevelFilter::DEBUG);
        assert!(activity.would_enable("persona_studio::session", &Level::DEBUG));
        assert!(!activity.would_enable(TIMING_TARGET, &Level::INFO));
        assert!(!activity.would_enable("reqwest::connect", &Level::INFO));
        assert!(activity.would_enable("sqlx::query", &Level::WARN));

        let timing = LogStream::Timing.filter(LevelFilter::DEBUG);
        assert!(timing.would_enable(TIMING_TARGET, &Level::INFO));
        assert!(!timing.would_enable("persona_studio::session", &Level::ERROR));
    }

    #[test]
    fn tails_the_newest_file_of_each_stream() {
        let dir = tempfile::tempdir().unwrap();
        let lines: Vec<String> = (1..=5).map(|n| format!("line {n}")).collect();
        fs::write(dir.path().join("persona_studio.log.2026-10-17"), lines.join("\n")).unwrap();
        fs::write(dir.path().join("persona_studio.jsonl.2026-10-17"), "{}").unwrap();
        fs::write(dir.path().join("timing.log.2026-10-17"), "timed").unwrap();

        let tail = read_recent_log_lines_in(dir.path(), LogStream::Activity, 2)
            .unwrap()
            .unwrap();
        assert_eq!(tail.lines, vec!["line 4".to_string(), "line 5".to_string()]);

        let timing = read_recent_log_lines_in(dir.path(), LogStream::Timing, 10)
            .unwrap()
            .unwrap();
        assert_eq!(timing.lines, vec!["timed".to_string()]);

        assert!(read_recent_log_lines_in(dir.path(), LogStream::Activity, 0)
            .unwrap()
            .is_none());
    }

    #[test]
    fn missing_logs_dir_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(read_recent_log_lines_in(&missing, LogStream::Timing, 10)
            .unwrap()
            .is_none());
    }
}
