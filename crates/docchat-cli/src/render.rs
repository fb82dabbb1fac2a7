//! Terminal output for conversation updates and charts.

use std::io::{self, Write};

use docchat_core::chart::{ChartConfig, ChartRenderer};
use docchat_core::event_bus::BroadcastEvent;
use serde_json::Value;

/// Prints charts as a short text table.
#[derive(Debug, Default)]
pub struct TerminalRenderer;

impl ChartRenderer for TerminalRenderer {
    fn render(&mut self, config: &ChartConfig) {
        let mut out = io::stdout().lock();
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", chart_summary(config));
    }

    fn clear(&mut self) {
        println!("(chart closed)");
    }
}

/// Text rendition of a chart: header, labels, then one row per dataset.
pub fn chart_summary(config: &ChartConfig) -> String {
    let mut lines = Vec::new();
    match config.title() {
        Some(title) => lines.push(format!("[{} chart] {}", config.chart_type, title)),
        None => lines.push(format!("[{} chart]", config.chart_type)),
    }
    if !config.data.labels.is_empty() {
        lines.push(format!("  labels: {}", join_values(&config.data.labels)));
    }
    for (index, dataset) in config.data.datasets.iter().enumerate() {
        let label = dataset
            .get("label")
            .map(display_value)
            .unwrap_or_else(|| format!("dataset {}", index + 1));
        let data = dataset
            .get("data")
            .and_then(Value::as_array)
            .map(|values| join_values(values))
            .unwrap_or_default();
        lines.push(format!("  {}: {}", label, data));
    }
    lines.join("\n")
}

fn join_values(values: &[Value]) -> String {
    values
        .iter()
        .map(display_value)
        .collect::<Vec<_>>()
        .join(", ")
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Turns bus updates into terminal output.
///
/// Streamed tokens are written without newlines; everything else is a line.
#[derive(Debug, Default)]
pub struct UpdatePrinter {
    mid_line: bool,
}

impl UpdatePrinter {
    pub fn print(&mut self, event: &BroadcastEvent) {
        let payload = &event.payload;
        let kind = payload.get("kind").and_then(Value::as_str).unwrap_or("");
        match kind {
            "tokenAppended" => {
                if let Some(token) = payload.get("token").and_then(Value::as_str) {
                    let mut out = io::stdout().lock();
                    let _ = write!(out, "{}", token);
                    let _ = out.flush();
                    self.mid_line = !token.is_empty() || self.mid_line;
                }
            }
            "messageAppended" => {
                let message = &payload["message"];
                let role = message["role"].as_str().unwrap_or("");
                let text = message["text"].as_str().unwrap_or("");
                match role {
                    "system" => self.line(&format!("* {}", text)),
                    "error" => self.line(&format!("! {}", text)),
                    _ => {}
                }
            }
            "messagesReset" => {
                if let Some(messages) = payload["messages"].as_array() {
                    for message in messages {
                        if let Some(text) = message["text"].as_str() {
                            self.line(&format!("* {}", text));
                        }
                    }
                }
            }
            "messageUpdated" => {
                if let Some(text) = payload["text"].as_str() {
                    self.line(&format!("! {}", text));
                }
            }
            "uploadProgress" => {
                if let Some(percent) = payload["percent"].as_u64() {
                    let mut out = io::stdout().lock();
                    let _ = write!(out, "\r  {:>3}%", percent);
                    let _ = out.flush();
                    self.mid_line = true;
                }
            }
            "turn" => {
                let state = payload["state"]["state"].as_str().unwrap_or("");
                if matches!(state, "complete" | "error") {
                    self.end_line();
                }
            }
            _ => log::debug!("update {}: {}", event.event_type, payload),
        }
    }

    fn line(&mut self, text: &str) {
        self.end_line();
        println!("{}", text);
    }

    fn end_line(&mut self) {
        if self.mid_line {
            println!();
            self.mid_line = false;
        }
    }
}
