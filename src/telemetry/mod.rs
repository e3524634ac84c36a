//! Plain-text rendering for events and error chains, used by [`StdOutSink`](crate::event_bus::StdOutSink).

use crate::event_bus::Event;

pub const CONTEXT_COLOR: &str = "\x1b[32m"; // green
pub const LINE_COLOR: &str = "\x1b[35m"; // magenta / dark pink
pub const RESET_COLOR: &str = "\x1b[0m";

/// Rendered output for a telemetry item that can be consumed by sinks.
#[derive(Clone, Debug, Default)]
pub struct EventRender {
    pub context: Option<String>,
    pub lines: Vec<String>,
}

impl EventRender {
    pub fn join_lines(&self) -> String {
        self.lines.join("")
    }
}

pub trait TelemetryFormatter: Send + Sync {
    fn render_event(&self, event: &Event) -> EventRender;
    fn render_error(&self, error: &(dyn std::error::Error + 'static)) -> EventRender;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PlainFormatter;

impl PlainFormatter {
    pub fn new() -> Self {
        Self
    }
}

fn format_error_chain(error: &(dyn std::error::Error + 'static), indent: usize) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(cause) = error.source() {
        let indent_str = "  ".repeat(indent);
        lines.push(format!(
            "{LINE_COLOR}{}cause: {}{RESET_COLOR}\n",
            indent_str, cause
        ));
        lines.extend(format_error_chain(cause, indent + 1));
    }
    lines
}

impl TelemetryFormatter for PlainFormatter {
    fn render_event(&self, event: &Event) -> EventRender {
        let line = format!("{LINE_COLOR}{}{RESET_COLOR}\n", event);
        EventRender {
            context: event.scope_label().map(|s| s.to_string()),
            lines: vec![line],
        }
    }

    fn render_error(&self, error: &(dyn std::error::Error + 'static)) -> EventRender {
        let mut lines = vec![format!("{CONTEXT_COLOR}error: {}{RESET_COLOR}\n", error)];
        lines.extend(format_error_chain(error, 1));
        EventRender {
            context: Some("error".to_string()),
            lines,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_event_wraps_display_in_one_line() {
        let formatter = PlainFormatter::new();
        let render = formatter.render_event(&Event::diagnostic("test", "hello"));
        assert_eq!(render.lines.len(), 1);
        assert!(render.lines[0].contains("hello"));
    }
}
