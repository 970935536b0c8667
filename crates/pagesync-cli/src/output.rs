//! Terminal output in human or JSON form

use anyhow::{Context, Result};
use serde::Serialize;

/// Output format selector
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Writes command results in the selected format
///
/// Human output uses check marks and indentation; JSON output prints one
/// document per message and skips informational lines.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("\u{2713} {message}"),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"success": true, "message": message}))
            }
        }
    }

    pub fn error(&self, message: &str) {
        match self.format {
            OutputFormat::Human => eprintln!("\u{2717} Error: {message}"),
            OutputFormat::Json => {
                eprintln!("{}", serde_json::json!({"success": false, "error": message}))
            }
        }
    }

    pub fn info(&self, message: &str) {
        if self.format == OutputFormat::Human {
            println!("  {message}");
        }
    }

    /// Pretty-prints `value` as JSON; no-op for human output
    pub fn json<T: Serialize>(&self, value: &T) -> Result<()> {
        if self.is_json() {
            let text = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
            println!("{text}");
        }
        Ok(())
    }
}
