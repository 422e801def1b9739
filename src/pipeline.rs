use std::fs;

use camino::Utf8Path;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{info, warn};

use crate::browse::BrowseClient;
use crate::builder::{build_dataset, build_metadata};
use crate::config::AoiConfig;
use crate::error::AoiError;
use crate::notify::{Mailer, failure_notification, success_notification, timestamp};
use crate::product::{ProductLayout, ProductWriter, copy_file_atomic};
use crate::records::{Context, DatasetRecord, JobInfo, MetadataRecord};
use crate::tools::ImageryTools;

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub label: String,
    pub directory: String,
    pub dataset_path: String,
    pub metadata_path: String,
    pub browse: bool,
    pub tiles: bool,
    pub notified: bool,
}

/// Everything read from disk before validation starts.
#[derive(Debug, Clone)]
pub struct JobInputs {
    pub context: Value,
    pub dataset_template: DatasetRecord,
    pub metadata_template: MetadataRecord,
}

impl JobInputs {
    pub fn load(config: &AoiConfig) -> Result<Self, AoiError> {
        let templates = config.template_paths();
        Ok(Self {
            context: read_context(&config.context_file)?,
            dataset_template: load_template(&templates.dataset)?,
            metadata_template: load_template(&templates.metadata)?,
        })
    }

    /// Runs the validators; nothing is written.
    pub fn build(&self) -> Result<(DatasetRecord, MetadataRecord), AoiError> {
        let context = Context::from_value(self.context.clone())?;
        let ds = build_dataset(&context, self.dataset_template.clone())?;
        let met = build_metadata(&context, self.metadata_template.clone())?;
        Ok((ds, met))
    }
}

pub struct Pipeline<B: BrowseClient, T: ImageryTools, M: Mailer> {
    config: AoiConfig,
    browse: B,
    tools: T,
    mailer: M,
}

impl<B: BrowseClient, T: ImageryTools, M: Mailer> Pipeline<B, T, M> {
    pub fn new(config: AoiConfig, browse: B, tools: T, mailer: M) -> Self {
        Self {
            config,
            browse,
            tools,
            mailer,
        }
    }

    /// Creates the AOI product. Fatal errors trigger the failure email before
    /// they are returned.
    pub fn run(&self) -> Result<RunSummary, AoiError> {
        match self.create() {
            Ok(summary) => Ok(summary),
            Err(err) => {
                if self.config.notifications {
                    if let Err(notify_err) = self.notify_failure(&err) {
                        warn!("failure email not sent: {notify_err}");
                    }
                }
                Err(err)
            }
        }
    }

    fn create(&self) -> Result<RunSummary, AoiError> {
        info!(context = %self.config.context_file, "phase=Load; reading job inputs");
        let inputs = JobInputs::load(&self.config)?;

        info!("phase=Validate; building dataset and metadata");
        let (ds, mut met) = inputs.build()?;

        let layout = ProductLayout::new(&self.config.output_root, &ds.label);
        let writer = ProductWriter::new(layout.clone());
        info!(dir = %layout.dir(), "phase=Store; writing product");
        let ds = writer.save(ds, &met)?;

        let mut summary = RunSummary {
            label: ds.label.clone(),
            directory: layout.dir().to_string(),
            dataset_path: layout.dataset_path().to_string(),
            metadata_path: layout.metadata_path().to_string(),
            browse: false,
            tiles: false,
            notified: false,
        };

        if let Some(url) = met.image_url.clone() {
            info!(%url, "phase=Browse; fetching browse image");
            match self.fetch_browse(&url, &layout) {
                Ok(()) => summary.browse = true,
                Err(err) => warn!("browse image not fetched: {err}"),
            }
        } else {
            info!("phase=Browse; generating browse image");
            match self.generate_browse(&ds, &layout) {
                Ok(()) => {
                    summary.browse = true;
                    summary.tiles = self.generate_tiles(&writer, &mut met);
                }
                Err(err) => warn!("browse image not generated: {err}"),
            }
        }

        if self.config.notifications {
            info!("phase=Notify; sending success email");
            match self.notify_success(&ds, &met) {
                Ok(()) => summary.notified = true,
                Err(err) => warn!("success email not sent: {err}"),
            }
        }
        Ok(summary)
    }

    fn fetch_browse(&self, url: &str, layout: &ProductLayout) -> Result<(), AoiError> {
        let browse = layout.browse_path();
        self.browse.fetch(url, &browse)?;
        copy_file_atomic(&browse, &layout.browse_small_path())
    }

    fn generate_browse(&self, ds: &DatasetRecord, layout: &ProductLayout) -> Result<(), AoiError> {
        let location = ds
            .location
            .as_ref()
            .ok_or_else(|| AoiError::ToolFailed("dataset has no location".to_string()))?;
        self.tools.generate_browse(location, &layout.generated_base())?;
        let browse = layout.generated_browse_path();
        if browse.as_std_path().exists() {
            copy_file_atomic(&browse, &layout.generated_browse_small_path())?;
        }
        Ok(())
    }

    fn generate_tiles(&self, writer: &ProductWriter, met: &mut MetadataRecord) -> bool {
        let layout = writer.layout();
        info!("phase=Tiles; generating map tiles");
        if let Err(err) = self
            .tools
            .generate_tiles(&layout.geotiff_path(), &layout.tiles_dir())
        {
            warn!("map tiles not generated: {err}");
            return false;
        }
        met.tiles = Some(true);
        match writer.rewrite_metadata(met) {
            Ok(()) => true,
            Err(err) => {
                warn!("metadata not rewritten after tiling: {err}");
                false
            }
        }
    }

    fn notify_success(&self, ds: &DatasetRecord, met: &MetadataRecord) -> Result<(), AoiError> {
        let template = read_text(&self.config.template_paths().success_email)?;
        let notification = success_notification(ds, met, &template, &timestamp())?;
        self.mailer.send(&notification)
    }

    fn notify_failure(&self, error: &AoiError) -> Result<(), AoiError> {
        let templates = self.config.template_paths();
        let template = read_text(&templates.failure_email)?;
        let context = read_context(&self.config.context_file).unwrap_or(Value::Null);
        let default_emails = load_template::<DatasetRecord>(&templates.dataset)
            .map(|ds| ds.emails)
            .unwrap_or_default();
        let job = read_job(&self.config.job_file);
        let notification = failure_notification(
            &context,
            &default_emails,
            &job,
            &error.to_string(),
            &template,
            &timestamp(),
        )?;
        self.mailer.send(&notification)
    }
}

pub fn read_context(path: &Utf8Path) -> Result<Value, AoiError> {
    let content = fs::read_to_string(path.as_std_path())
        .map_err(|_| AoiError::ContextRead(path.as_std_path().to_path_buf()))?;
    serde_json::from_str(&content).map_err(|err| AoiError::ContextParse(err.to_string()))
}

pub fn load_template<T: DeserializeOwned>(path: &Utf8Path) -> Result<T, AoiError> {
    let content = read_text(path)?;
    serde_json::from_str(&content).map_err(|err| AoiError::TemplateParse {
        path: path.as_std_path().to_path_buf(),
        message: err.to_string(),
    })
}

/// Job identifiers fall back to `unknown` when `_job.json` is unreadable.
pub fn read_job(path: &Utf8Path) -> JobInfo {
    fs::read_to_string(path.as_std_path())
        .ok()
        .and_then(|content| serde_json::from_str(&content).ok())
        .unwrap_or_default()
}

fn read_text(path: &Utf8Path) -> Result<String, AoiError> {
    fs::read_to_string(path.as_std_path())
        .map_err(|_| AoiError::TemplateRead(path.as_std_path().to_path_buf()))
}
