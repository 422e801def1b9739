use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::AoiError;

pub const DEFAULT_CONFIG_FILE: &str = "create-aoi.json";
pub const DEFAULT_SENDER: &str = "aria-ops@jpl.nasa.gov";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AoiConfig {
    pub templates_dir: Utf8PathBuf,
    pub context_file: Utf8PathBuf,
    pub job_file: Utf8PathBuf,
    pub output_root: Utf8PathBuf,
    pub notifications: bool,
    pub smtp: SmtpConfig,
    pub tools: ToolsConfig,
}

impl Default for AoiConfig {
    fn default() -> Self {
        Self {
            templates_dir: Utf8PathBuf::from("config"),
            context_file: Utf8PathBuf::from("_context.json"),
            job_file: Utf8PathBuf::from("_job.json"),
            output_root: Utf8PathBuf::from("."),
            notifications: true,
            smtp: SmtpConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub sender: String,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 25,
            sender: DEFAULT_SENDER.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Program invoked as `<program> <geojson> <base-path>` to render the browse image.
    pub browse_generator: Option<String>,
    /// Overrides the `gdal2tiles` lookup on `PATH`.
    pub gdal2tiles: Option<String>,
    pub tile_zoom: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            browse_generator: None,
            gdal2tiles: None,
            tile_zoom: "2-8".to_string(),
        }
    }
}

/// Paths of the four files kept in the templates directory.
#[derive(Debug, Clone)]
pub struct TemplatePaths {
    pub dataset: Utf8PathBuf,
    pub metadata: Utf8PathBuf,
    pub success_email: Utf8PathBuf,
    pub failure_email: Utf8PathBuf,
}

impl AoiConfig {
    pub fn template_paths(&self) -> TemplatePaths {
        TemplatePaths {
            dataset: self.templates_dir.join("AOI.dataset.json"),
            metadata: self.templates_dir.join("AOI.met.json"),
            success_email: self.templates_dir.join("success_email.txt"),
            failure_email: self.templates_dir.join("failure_email.txt"),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `path`, or `create-aoi.json` from the working directory when it
    /// exists. Without either, defaults apply.
    pub fn resolve(path: Option<&str>) -> Result<AoiConfig, AoiError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Ok(AoiConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| AoiError::ConfigRead(config_path.clone()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<AoiConfig, AoiError> {
        serde_json::from_str(content).map_err(|err| AoiError::ConfigParse(err.to_string()))
    }
}
