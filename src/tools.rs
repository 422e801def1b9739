use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use camino::Utf8Path;
use geojson::Geometry;
use serde::Serialize;

use crate::config::ToolsConfig;
use crate::error::AoiError;

#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub browse_generator: Option<String>,
    pub gdal2tiles: Option<String>,
}

/// External programs that render browse imagery and map tiles.
pub trait ImageryTools {
    /// Renders `<base>.browse.png` and `<base>.geo.tif` for the polygon.
    fn generate_browse(&self, location: &Geometry, base: &Utf8Path) -> Result<(), AoiError>;
    /// Cuts a mercator tile pyramid from `geotiff` into `out_dir`.
    fn generate_tiles(&self, geotiff: &Utf8Path, out_dir: &Utf8Path) -> Result<(), AoiError>;
    fn tool_info(&self) -> ToolInfo;
}

#[derive(Debug, Clone)]
pub struct SystemImageryTools {
    browse_generator: Option<PathBuf>,
    gdal2tiles: Option<PathBuf>,
    tile_zoom: String,
}

impl SystemImageryTools {
    pub fn new(config: &ToolsConfig) -> Self {
        let browse_generator = config.browse_generator.as_deref().and_then(resolve_program);
        let gdal2tiles = match config.gdal2tiles.as_deref() {
            Some(program) => resolve_program(program),
            None => find_in_path("gdal2tiles.py").or_else(|| find_in_path("gdal2tiles")),
        };
        Self {
            browse_generator,
            gdal2tiles,
            tile_zoom: config.tile_zoom.clone(),
        }
    }

    fn run_cmd(&self, program: &Path, args: &[String]) -> Result<(), AoiError> {
        tracing::debug!(program = %program.display(), ?args, "running external tool");
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|err| AoiError::ToolFailed(format!("{}: {err}", program.display())))?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            format!("command failed: {}", program.display())
        } else {
            stderr
        };
        Err(AoiError::ToolFailed(message))
    }
}

impl ImageryTools for SystemImageryTools {
    fn generate_browse(&self, location: &Geometry, base: &Utf8Path) -> Result<(), AoiError> {
        let program = self
            .browse_generator
            .as_ref()
            .ok_or_else(|| AoiError::MissingTool("browse generator".to_string()))?;
        let geojson = serde_json::to_string(location)
            .map_err(|err| AoiError::ToolFailed(err.to_string()))?;
        self.run_cmd(program, &[geojson, base.to_string()])
    }

    fn generate_tiles(&self, geotiff: &Utf8Path, out_dir: &Utf8Path) -> Result<(), AoiError> {
        if !geotiff.as_std_path().exists() {
            return Err(AoiError::Filesystem(format!("missing geotiff {geotiff}")));
        }
        let program = self
            .gdal2tiles
            .as_ref()
            .ok_or_else(|| AoiError::MissingTool("gdal2tiles".to_string()))?;
        fs::create_dir_all(out_dir.as_std_path())
            .map_err(|err| AoiError::Filesystem(err.to_string()))?;
        let args = tile_args(geotiff, out_dir, &self.tile_zoom);
        self.run_cmd(program, &args)
    }

    fn tool_info(&self) -> ToolInfo {
        ToolInfo {
            browse_generator: self
                .browse_generator
                .as_ref()
                .map(|path| path.display().to_string()),
            gdal2tiles: self
                .gdal2tiles
                .as_ref()
                .and_then(|path| tool_version(path, &["--version"])),
        }
    }
}

pub fn tile_args(geotiff: &Utf8Path, out_dir: &Utf8Path, zoom: &str) -> Vec<String> {
    vec![
        "-p".to_string(),
        "mercator".to_string(),
        geotiff.to_string(),
        "-z".to_string(),
        zoom.to_string(),
        "-k".to_string(),
        out_dir.to_string(),
    ]
}

fn resolve_program(program: &str) -> Option<PathBuf> {
    let path = PathBuf::from(program);
    if path.components().count() > 1 {
        return path.exists().then_some(path);
    }
    find_in_path(program)
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for path in std::env::split_paths(&path_var) {
        let exe = path.join(format!("{name}.exe"));
        if exe.exists() {
            return Some(exe);
        }
        let plain = path.join(name);
        if plain.exists() {
            return Some(plain);
        }
    }
    None
}

fn tool_version(path: &Path, args: &[&str]) -> Option<String> {
    let output = Command::new(path).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if stdout.is_empty() {
        None
    } else {
        Some(stdout)
    }
}
