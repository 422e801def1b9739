use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::error::AoiError;
use crate::product::{copy_file_atomic, write_reader_atomic};

pub trait BrowseClient {
    /// Stores the image behind `url` at `destination`.
    fn fetch(&self, url: &str, destination: &Utf8Path) -> Result<(), AoiError>;
}

#[derive(Clone)]
pub struct HttpBrowseClient {
    client: Client,
}

impl HttpBrowseClient {
    pub fn new() -> Result<Self, AoiError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("create-aoi/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| AoiError::BrowseHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| AoiError::BrowseHttp(err.to_string()))?;
        Ok(Self { client })
    }

    fn download(&self, url: &str, destination: &Utf8Path) -> Result<(), AoiError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|err| AoiError::BrowseHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "browse request failed".to_string());
            return Err(AoiError::BrowseStatus { status, message });
        }
        write_reader_atomic(destination, &mut response)
    }
}

impl BrowseClient for HttpBrowseClient {
    fn fetch(&self, url: &str, destination: &Utf8Path) -> Result<(), AoiError> {
        match local_source(url) {
            Some(source) => copy_file_atomic(&source, destination),
            None => self.download(url, destination),
        }
    }
}

/// `file://` URLs and bare paths are copied instead of downloaded.
pub fn local_source(url: &str) -> Option<Utf8PathBuf> {
    if let Some(path) = url.strip_prefix("file://") {
        return Some(Utf8PathBuf::from(path));
    }
    if url.contains("://") {
        return None;
    }
    Some(Utf8PathBuf::from(url))
}
