//! Process-wide logging
//!
//! Events go to stderr and, when the log file can be opened, to a
//! line-oriented file in the `[YYYY-MM-DD HH:MM:SS] message` format. The file
//! is bounded by [`rotate_log`], which the daemon calls on every tick.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;

use chrono::{Local, NaiveDateTime};
use tracing::{Event, Subscriber, level_filters::LevelFilter, warn};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LogConfig;

pub const LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// `[YYYY-MM-DD HH:MM:SS] message`, local time, no level or target.
#[derive(Debug, Clone, Copy, Default)]
pub struct BracketedFormat;

impl<S, N> FormatEvent<S, N> for BracketedFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(writer, "[{}] ", Local::now().format(LOG_TIMESTAMP_FORMAT))?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

pub fn init(config: &LogConfig) {
    let level = config
        .level
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::INFO);
    let filter = filter::Targets::new().with_targets(vec![
        ("minilide_monitor", level),
        ("minilide_daemon", level),
    ]);

    let (file_layer, open_error) = match open_log_file(&config.path) {
        Ok(file) => (
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .event_format(BracketedFormat),
            ),
            None,
        ),
        Err(e) => (None, Some(e)),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(file_layer)
        .with(filter)
        .init();

    if let Some(e) = open_error {
        warn!(
            "cannot open log file {}: {e}, logging to console only",
            config.path.display()
        );
    }
}

fn open_log_file(path: &Path) -> io::Result<fs::File> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Keeps the log below `max_lines`: once it is longer, only the most recent
/// `max_lines / 2` lines are kept and a notice is appended. Returns the number
/// of removed lines.
///
/// The file is truncated in place so append-mode handles stay valid.
pub fn rotate_log(path: &Path, max_lines: usize, now: NaiveDateTime) -> io::Result<Option<usize>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    let content = String::from_utf8_lossy(&bytes);
    let lines: Vec<&str> = content.lines().collect();

    if lines.len() <= max_lines {
        return Ok(None);
    }

    let removed = lines.len() - max_lines / 2;
    let mut kept = String::with_capacity(content.len() / 2);
    for line in &lines[removed..] {
        kept.push_str(line);
        kept.push('\n');
    }
    kept.push_str(&format!(
        "[{}] Log exceeded {max_lines} lines, the oldest {removed} lines were removed.\n",
        now.format(LOG_TIMESTAMP_FORMAT)
    ));

    let mut file = OpenOptions::new().write(true).truncate(true).open(path)?;
    file.write_all(kept.as_bytes())?;

    Ok(Some(removed))
}
