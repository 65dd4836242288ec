//! Run-time configuration assembled from the command line.

use crate::ingest::DiscoveryConfig;
use crate::report::{JsonFormatter, ReportFormatter, TextFormatter};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub control_label: String,
    pub treatment_label: String,
    pub output: OutputFormat,
    pub discovery: DiscoveryConfig,
}

impl Default for Config {
    fn default() -> Self {
        let text = TextFormatter::default();
        Self {
            control_label: text.control_label,
            treatment_label: text.treatment_label,
            output: OutputFormat::default(),
            discovery: DiscoveryConfig::default(),
        }
    }
}

impl Config {
    /// Append side-channel log names to skip during discovery.
    pub fn with_extra_skips(mut self, names: impl IntoIterator<Item = String>) -> Self {
        for name in names {
            if !self.discovery.skip_names.contains(&name) {
                self.discovery.skip_names.push(name);
            }
        }
        self
    }

    /// Formatter for the selected output format.
    pub fn formatter(&self) -> Box<dyn ReportFormatter> {
        match self.output {
            OutputFormat::Table => Box::new(TextFormatter {
                control_label: self.control_label.clone(),
                treatment_label: self.treatment_label.clone(),
                detail: true,
            }),
            OutputFormat::Json => Box::new(JsonFormatter),
        }
    }
}
