//! Log line layout for the monitor
//!
//! `2025-03-01T12:00:30.125Z  WARN seawatch::monitor: detection_cycle: message`
//!
//! The target comes before the span path so lines from one module line up
//! regardless of which loop emitted them.

use chrono::Utc;
use std::fmt;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::fmt::format::{self, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

const RESET: &str = "\x1b[0m";
const DIM: &str = "\x1b[2m";

/// Event formatter: UTC timestamp, level, target, span path, fields
pub struct TargetFirstFormat {
    ansi: bool,
}

impl TargetFirstFormat {
    pub fn new(ansi: bool) -> Self {
        Self { ansi }
    }
}

impl Default for TargetFirstFormat {
    fn default() -> Self {
        Self::new(true)
    }
}

fn level_color(level: &Level) -> &'static str {
    match *level {
        Level::ERROR => "\x1b[31m",
        Level::WARN => "\x1b[33m",
        Level::INFO => "\x1b[32m",
        Level::DEBUG => "\x1b[34m",
        Level::TRACE => "\x1b[35m",
    }
}

impl<S, N> FormatEvent<S, N> for TargetFirstFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();
        let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ");
        let level = metadata.level();

        if self.ansi {
            write!(
                writer,
                "{DIM}{timestamp}{RESET} {}{level:>5}{RESET} ",
                level_color(level)
            )?;
        } else {
            write!(writer, "{timestamp} {level:>5} ")?;
        }
        write!(writer, "{}: ", metadata.target())?;

        let spans: Vec<&'static str> = ctx
            .event_scope()
            .map(|scope| scope.from_root().map(|span| span.name()).collect())
            .unwrap_or_default();
        if !spans.is_empty() {
            write!(writer, "{}: ", spans.join(":"))?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture(ansi: bool, emit: impl FnOnce()) -> String {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .event_format(TargetFirstFormat::new(ansi))
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, emit);
        let bytes = captured.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_target_precedes_span_path() {
        let out = capture(false, || {
            let outer = tracing::info_span!("detection_cycle");
            let _outer = outer.enter();
            let inner = tracing::info_span!("dispatch");
            let _inner = inner.enter();
            tracing::warn!(target: "seawatch::monitor", "tick overran");
        });
        assert!(
            out.contains(" WARN seawatch::monitor: detection_cycle:dispatch: tick overran"),
            "{out}"
        );
        assert!(!out.contains('\x1b'));
    }

    #[test]
    fn test_no_span_path_outside_spans() {
        let out = capture(false, || {
            tracing::info!(target: "seawatch::config", "loaded");
        });
        assert!(out.ends_with(" INFO seawatch::config: loaded\n"), "{out}");
    }

    #[test]
    fn test_ansi_colours_level() {
        let out = capture(true, || {
            tracing::error!(target: "seawatch::email", "relay refused");
        });
        assert!(out.contains("\x1b[31mERROR\x1b[0m seawatch::email: relay refused"), "{out}");
    }
}
