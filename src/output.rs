use std::io::{self, Write};

use serde::Serialize;

use crate::pipeline::RunSummary;
use crate::records::{DatasetRecord, MetadataRecord};
use crate::tools::ToolInfo;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Human,
    Json,
}

#[derive(Debug, Serialize)]
pub struct RecordPreview<'a> {
    pub dataset: &'a DatasetRecord,
    pub metadata: &'a MetadataRecord,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_summary(summary: &RunSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    pub fn print_preview(dataset: &DatasetRecord, metadata: &MetadataRecord) -> io::Result<()> {
        Self::print_json(&RecordPreview { dataset, metadata })
    }

    pub fn print_tools(info: &ToolInfo) -> io::Result<()> {
        Self::print_json(info)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}
