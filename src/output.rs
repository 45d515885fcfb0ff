use serde::{Deserialize, Serialize};

use crate::recognizer::IdentifyOutcome;

/// Output format for identification results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Simple "track_name (score N)" format.
    Simple,
    /// Full JSON with all fields.
    Json,
    /// CSV format for logging.
    Csv,
    /// Custom format with placeholders.
    Custom(&'static str),
}

/// Formatted identification output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifyOutput {
    pub format: String,
    pub content: String,
}

impl IdentifyOutput {
    pub fn format_result(result: &IdentifyOutcome, format: OutputFormat) -> Self {
        let content = match format {
            OutputFormat::Simple => format!("{} (score {})", result.track_name, result.score),
            OutputFormat::Json => serde_json::to_string(result).unwrap_or_else(|_| "{}".to_string()),
            OutputFormat::Csv => {
                format!("\"{}\",\"{}\",\"{}\"", result.track_id, result.track_name, result.score)
            }
            OutputFormat::Custom(template) => Self::format_custom(result, template),
        };

        IdentifyOutput {
            format: format.to_string(),
            content,
        }
    }

    /// Render the "no match" case, since `identify` surfaces it as
    /// `Ok(None)` rather than an error.
    pub fn format_no_match(format: OutputFormat) -> Self {
        let content = match format {
            OutputFormat::Json => "null".to_string(),
            OutputFormat::Csv => "\"\",\"\",\"\"".to_string(),
            _ => "no match".to_string(),
        };
        IdentifyOutput {
            format: format.to_string(),
            content,
        }
    }

    fn format_custom(result: &IdentifyOutcome, template: &str) -> String {
        template
            .replace("{track_id}", &result.track_id.to_string())
            .replace("{track_name}", &result.track_name)
            .replace("{score}", &result.score.to_string())
    }

    pub fn csv_header() -> &'static str {
        "\"TrackId\",\"TrackName\",\"Score\""
    }
}

impl std::fmt::Display for IdentifyOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.content)
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Simple => write!(f, "Simple"),
            OutputFormat::Json => write!(f, "Json"),
            OutputFormat::Csv => write!(f, "Csv"),
            OutputFormat::Custom(template) => write!(f, "Custom({})", template),
        }
    }
}
