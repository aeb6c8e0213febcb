//! Terminal and JSON rendering for `dusd` reports.

use console::style;
use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT FORMAT
// ═══════════════════════════════════════════════════════════════════════════════

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON format
    Json,
    /// Pretty JSON format
    JsonPretty,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "json-pretty" | "pretty" => Ok(Self::JsonPretty),
            other => Err(format!("unsupported output format '{}' (text, json, json-pretty)", other)),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT FORMATTER
// ═══════════════════════════════════════════════════════════════════════════════

/// Renders messages and reports in the configured format
#[derive(Debug, Clone, Default)]
pub struct OutputFormatter {
    /// Output format
    format: OutputFormat,
    /// Color enabled
    color: bool,
}

impl OutputFormatter {
    /// Create new formatter
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            color: true,
        }
    }

    /// Enable or disable color
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    /// Get format
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Check if output is JSON
    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json | OutputFormat::JsonPretty)
    }

    /// Print success message
    pub fn success(&self, message: &str) {
        self.status("success", "✓", message, |s| style(s).green().to_string());
    }

    /// Print error message
    pub fn error(&self, message: &str) {
        if self.is_json() {
            self.print_json(&serde_json::json!({ "status": "error", "message": message }));
        } else if self.color {
            eprintln!("{} {}", style("✗").red(), message);
        } else {
            eprintln!("ERROR: {}", message);
        }
    }

    /// Print warning message
    pub fn warning(&self, message: &str) {
        self.status("warning", "⚠", message, |s| style(s).yellow().to_string());
    }

    /// Print key-value pair
    pub fn kv(&self, key: &str, value: &str) {
        if self.is_json() {
            self.print_json(&serde_json::json!({ key: value }));
        } else if self.color {
            println!("  {}: {}", style(key).dim(), value);
        } else {
            println!("  {}: {}", key, value);
        }
    }

    /// Print a section header (text formats only)
    pub fn header(&self, title: &str) {
        if self.is_json() {
            return;
        }
        if self.color {
            println!("\n{}", style(title).bold().underlined());
        } else {
            println!("\n== {} ==", title);
        }
    }

    /// Print serializable data
    pub fn data<T: Serialize>(&self, data: &T) {
        match serde_json::to_value(data) {
            Ok(json) if self.is_json() => self.print_json(&json),
            Ok(json) => self.print_text(&json, 1),
            Err(e) => self.error(&e.to_string()),
        }
    }

    fn status(&self, status: &str, symbol: &str, message: &str, paint: impl Fn(&str) -> String) {
        if self.is_json() {
            self.print_json(&serde_json::json!({ "status": status, "message": message }));
        } else if self.color {
            println!("{} {}", paint(symbol), message);
        } else {
            println!("{}: {}", status.to_uppercase(), message);
        }
    }

    fn print_json<T: Serialize + ?Sized>(&self, data: &T) {
        let rendered = match self.format {
            OutputFormat::JsonPretty => serde_json::to_string_pretty(data),
            _ => serde_json::to_string(data),
        };
        match rendered {
            Ok(s) => println!("{}", s),
            Err(e) => eprintln!("ERROR: {}", e),
        }
    }

    fn print_text(&self, value: &serde_json::Value, indent: usize) {
        let pad = "  ".repeat(indent);
        match value {
            serde_json::Value::Object(map) => {
                for (k, v) in map {
                    if v.is_object() || v.is_array() {
                        println!("{}{}:", pad, k);
                        self.print_text(v, indent + 1);
                    } else {
                        println!("{}{}: {}", pad, k, scalar(v));
                    }
                }
            }
            serde_json::Value::Array(items) => {
                for item in items {
                    if item.is_object() || item.is_array() {
                        println!("{}-", pad);
                        self.print_text(item, indent + 1);
                    } else {
                        println!("{}- {}", pad, scalar(item));
                    }
                }
            }
            other => println!("{}{}", pad, scalar(other)),
        }
    }
}

fn scalar(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
