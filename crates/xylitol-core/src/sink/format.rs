//! Shared line encoding for every sink
//!
//! `<ISO-8601 time>\t<LEVEL>\t<file:line>\t<message>\t<fields JSON>`

use colored::Colorize;
use std::fmt;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::registry::LookupSpan;

/// Event field carrying the facade's own level label.
pub(crate) const SEVERITY_FIELD: &str = "severity";
/// Event field carrying the application call site.
pub(crate) const CALLER_FIELD: &str = "caller";
/// Event field carrying the rendered field set.
pub(crate) const FIELDS_FIELD: &str = "fields";

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";

/// Collects the pieces of one record emitted by [`crate::Logger`].
#[derive(Default)]
struct LineVisitor {
    severity: Option<String>,
    caller: String,
    message: String,
    fields: String,
}

impl LineVisitor {
    fn store(&mut self, name: &str, value: String) {
        match name {
            SEVERITY_FIELD => self.severity = Some(value),
            CALLER_FIELD => self.caller = value,
            FIELDS_FIELD => self.fields = value,
            "message" => self.message = value,
            _ => {
                // Events that did not come through the facade still render.
                if !self.fields.is_empty() {
                    self.fields.push(' ');
                }
                self.fields.push_str(&format!("{}={}", name, value));
            }
        }
    }
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.store(field.name(), value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.store(field.name(), format!("{:?}", value));
    }
}

/// Console-style encoder shared by the console and file sinks.
///
/// The level label is colored only when the writer accepts ANSI escapes,
/// so the two sinks differ by color codes alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineFormat;

impl LineFormat {
    fn paint(label: &str, ansi: bool) -> String {
        if !ansi {
            return label.to_string();
        }
        match label {
            "DEBUG" => label.magenta().to_string(),
            "INFO" => label.blue().to_string(),
            "WARN" => label.yellow().to_string(),
            "ERROR" => label.red().to_string(),
            "FATAL" => label.red().bold().to_string(),
            _ => label.to_string(),
        }
    }
}

impl<S, N> FormatEvent<S, N> for LineFormat
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
        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);

        let label = visitor
            .severity
            .take()
            .unwrap_or_else(|| event.metadata().level().as_str().to_string());
        let timestamp = chrono::Local::now().format(TIME_FORMAT);
        let ansi = writer.has_ansi_escapes();

        write!(
            writer,
            "{}\t{}\t{}\t{}",
            timestamp,
            Self::paint(&label, ansi),
            visitor.caller,
            visitor.message
        )?;
        if !visitor.fields.is_empty() {
            write!(writer, "\t{}", visitor.fields)?;
        }
        writeln!(writer)
    }
}
