use chrono::Utc;
use nu_ansi_term::{Color, Style};
use std::fmt;
use tracing::{Event, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{format::Writer, FmtContext, FormatEvent, FormatFields},
    prelude::*,
    registry::LookupSpan,
    Layer,
};

/// Target used for per-claim result lines; everything else is quieter.
pub const CLAIM_RESULT_TARGET: &str = "claim_result";

pub fn setup_logger(log_dir: &str) -> Option<WorkerGuard> {
    if let Err(e) = std::fs::create_dir_all(log_dir) {
        eprintln!("Cannot create log directory {}: {}", log_dir, e);
        return None;
    }

    // Hourly rotation, claim runs are long-lived on small devices
    let file_appender = tracing_appender::rolling::hourly(log_dir, "farm");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // File layer: INFO for claim_result, WARN for others
    let file_filter = tracing_subscriber::filter::Targets::new()
        .with_target(CLAIM_RESULT_TARGET, tracing::Level::INFO)
        .with_default(tracing::Level::WARN);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .event_format(FileFormatter)
        .with_filter(file_filter);

    // Console layer: INFO for claim_result, ERROR for others
    let console_filter = tracing_subscriber::filter::Targets::new()
        .with_target(CLAIM_RESULT_TARGET, tracing::Level::INFO)
        .with_default(tracing::Level::ERROR);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .event_format(TerminalFormatter)
        .with_filter(console_filter);

    if tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .is_err()
    {
        return None;
    }

    // Return guard - MUST be kept alive by caller
    Some(guard)
}

/// Errors only, plain stdout.
pub fn setup_quiet_logger() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::ERROR)
        .try_init();
}

// --- Formatters ---

struct MessageVisitor {
    message: String,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        }
    }
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }
}

pub struct TerminalFormatter;

impl<S, N> FormatEvent<S, N> for TerminalFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut msg_visitor = MessageVisitor {
            message: String::new(),
        };
        event.record(&mut msg_visitor);

        write!(writer, "{}", colorize(&msg_visitor.message))?;
        writeln!(writer)
    }
}

fn colorize(msg: &str) -> String {
    if msg.contains("SUCCESS") {
        let green_text = Style::new().fg(Color::LightGreen).bold();
        msg.replace("SUCCESS", &green_text.paint("SUCCESS").to_string())
    } else if msg.contains("FAILED") || msg.contains("ERROR") {
        let red_text = Style::new().fg(Color::LightRed).bold();
        msg.replace("FAILED", &red_text.paint("FAILED").to_string())
            .replace("ERROR", &red_text.paint("ERROR").to_string())
    } else {
        msg.to_string()
    }
}

pub struct FileFormatter;

impl<S, N> FormatEvent<S, N> for FileFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        // UTC, same clock as the claim log
        let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
        let meta = event.metadata();
        let tag = if meta.target() == CLAIM_RESULT_TARGET {
            "claim"
        } else {
            meta.target()
        };

        write!(writer, "{} {:<5} {}: ", timestamp, meta.level(), tag)?;

        let mut msg_visitor = MessageVisitor {
            message: String::new(),
        };
        event.record(&mut msg_visitor);
        writeln!(writer, "{}", msg_visitor.message)
    }
}
