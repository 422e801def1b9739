use std::fs;
use std::io::{self, Read};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::AoiError;
use crate::records::{DatasetRecord, MetadataRecord};

/// File layout of one AOI product directory, `<root>/<label>/`.
#[derive(Debug, Clone)]
pub struct ProductLayout {
    label: String,
    dir: Utf8PathBuf,
}

impl ProductLayout {
    pub fn new(root: &Utf8Path, label: &str) -> Self {
        Self {
            label: label.to_string(),
            dir: root.join(label),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    pub fn dataset_path(&self) -> Utf8PathBuf {
        self.dir.join(format!("{}.dataset.json", self.label))
    }

    pub fn metadata_path(&self) -> Utf8PathBuf {
        self.dir.join(format!("{}.met.json", self.label))
    }

    /// Browse image fetched from `image_url`.
    pub fn browse_path(&self) -> Utf8PathBuf {
        self.dir.join("browse.png")
    }

    pub fn browse_small_path(&self) -> Utf8PathBuf {
        self.dir.join("browse_small.png")
    }

    /// Prefix handed to the browse generator; it appends its own suffixes.
    pub fn generated_base(&self) -> Utf8PathBuf {
        self.dir.join(&self.label)
    }

    pub fn generated_browse_path(&self) -> Utf8PathBuf {
        self.dir.join(format!("{}.browse.png", self.label))
    }

    pub fn generated_browse_small_path(&self) -> Utf8PathBuf {
        self.dir.join(format!("{}.browse_small.png", self.label))
    }

    pub fn geotiff_path(&self) -> Utf8PathBuf {
        self.dir.join(format!("{}.geo.tif", self.label))
    }

    pub fn tiles_dir(&self) -> Utf8PathBuf {
        self.dir.join("tiles").join("extent")
    }
}

#[derive(Debug, Clone)]
pub struct ProductWriter {
    layout: ProductLayout,
}

impl ProductWriter {
    pub fn new(layout: ProductLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &ProductLayout {
        &self.layout
    }

    /// Writes both records. A string `event_metadata.label` replaces the
    /// dataset label; file names keep the generated label.
    ///
    /// When either write fails, a directory created by this call is removed
    /// again.
    pub fn save(
        &self,
        mut ds: DatasetRecord,
        met: &MetadataRecord,
    ) -> Result<DatasetRecord, AoiError> {
        let dir = self.layout.dir();
        let created = !dir.as_std_path().exists();
        fs::create_dir_all(dir.as_std_path())
            .map_err(|err| AoiError::Filesystem(format!("create {dir}: {err}")))?;
        if let Some(label) = met.event_label() {
            ds.label = label.to_string();
        }
        let written = write_json_atomic(&self.layout.dataset_path(), &ds)
            .and_then(|()| write_json_atomic(&self.layout.metadata_path(), met));
        if let Err(err) = written {
            if created {
                if let Err(cleanup) = fs::remove_dir_all(dir.as_std_path()) {
                    warn!(%dir, "partial product not removed: {cleanup}");
                }
            }
            return Err(err);
        }
        Ok(ds)
    }

    pub fn rewrite_metadata(&self, met: &MetadataRecord) -> Result<(), AoiError> {
        write_json_atomic(&self.layout.metadata_path(), met)
    }

    pub fn load_dataset(&self) -> Result<DatasetRecord, AoiError> {
        read_json(&self.layout.dataset_path())
    }

    pub fn load_metadata(&self) -> Result<MetadataRecord, AoiError> {
        read_json(&self.layout.metadata_path())
    }
}

pub fn write_json_atomic<T: Serialize>(path: &Utf8Path, value: &T) -> Result<(), AoiError> {
    let content =
        serde_json::to_vec_pretty(value).map_err(|err| AoiError::Filesystem(err.to_string()))?;
    write_bytes_atomic(path, &content)
}

pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), AoiError> {
    write_reader_atomic(path, &mut &content[..])
}

/// Streams `reader` into a temporary file next to `path`, then renames it into
/// place. Nothing is left at `path` when the read fails.
pub fn write_reader_atomic<R: Read>(path: &Utf8Path, reader: &mut R) -> Result<(), AoiError> {
    let parent = path
        .parent()
        .ok_or_else(|| AoiError::Filesystem(format!("invalid destination path {path}")))?;
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| AoiError::Filesystem(err.to_string()))?;
    let mut temp = tempfile::Builder::new()
        .prefix(".aoi-write")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| AoiError::Filesystem(err.to_string()))?;
    io::copy(reader, &mut temp)
        .map_err(|err| AoiError::Filesystem(format!("write {path}: {err}")))?;
    temp.persist(path.as_std_path())
        .map_err(|err| AoiError::Filesystem(err.to_string()))?;
    Ok(())
}

pub fn copy_file_atomic(source: &Utf8Path, dest: &Utf8Path) -> Result<(), AoiError> {
    let content = fs::read(source.as_std_path())
        .map_err(|err| AoiError::Filesystem(format!("read {source}: {err}")))?;
    write_bytes_atomic(dest, &content)
}

pub fn read_json<T: DeserializeOwned>(path: &Utf8Path) -> Result<T, AoiError> {
    let content = fs::read_to_string(path.as_std_path())
        .map_err(|err| AoiError::Filesystem(format!("read {path}: {err}")))?;
    serde_json::from_str(&content).map_err(|err| AoiError::Filesystem(format!("{path}: {err}")))
}
