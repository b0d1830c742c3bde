use super::{OutputGenerator, ReportContent};
use anyhow::Result;

pub struct JsonOutput;

impl OutputGenerator for JsonOutput {
    fn generate(&self, report: &ReportContent<'_>) -> Result<String> {
        Ok(serde_json::to_string_pretty(report)?)
    }

    fn file_extension(&self) -> &str {
        "json"
    }
}
