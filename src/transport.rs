use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client as HttpClient;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::debug;

use crate::error::{ExportError, Result};

/// The two HTTP operations the export workflow needs.
///
/// Implementations must be shareable between download workers.
pub trait Transport: Send + Sync {
    /// Performs a GET and returns the status code and body text.
    fn get_text(&self, url: &str) -> Result<(u16, String)>;

    /// Streams `url` into `dest`, returning the number of bytes written.
    ///
    /// Non-200 replies are [`ExportError::HttpStatus`].
    fn download(&self, url: &str, dest: &Path) -> Result<u64>;
}

#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    pub connect_timeout: Duration,
    /// Whole-request timeout. `None` lets large files take as long as they need.
    pub timeout: Option<Duration>,
    pub verify: bool,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            timeout: None,
            verify: true,
        }
    }
}

/// Blocking `reqwest` transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: HttpClient,
}

impl HttpTransport {
    pub fn new(cfg: &HttpTransportConfig) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("jsoc-export/{}", env!("CARGO_PKG_VERSION")))
                .unwrap_or(HeaderValue::from_static("jsoc-export")),
        );

        let mut builder = HttpClient::builder()
            .default_headers(default_headers)
            .connect_timeout(cfg.connect_timeout)
            .timeout(cfg.timeout);

        if !cfg.verify {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let http = builder
            .build()
            .map_err(|source| ExportError::ClientBuild { source })?;

        Ok(Self { http })
    }
}

impl Transport for HttpTransport {
    fn get_text(&self, url: &str) -> Result<(u16, String)> {
        debug!(url, "GET");
        let resp = self.http.get(url).send().map_err(|source| ExportError::Network {
            url: url.to_string(),
            source,
        })?;
        let status = resp.status().as_u16();
        let text = resp.text().map_err(|source| ExportError::Network {
            url: url.to_string(),
            source,
        })?;
        Ok((status, text))
    }

    fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        debug!(url, dest = %dest.display(), "downloading");
        let mut resp = self.http.get(url).send().map_err(|source| ExportError::Network {
            url: url.to_string(),
            source,
        })?;

        if resp.status() != StatusCode::OK {
            return Err(ExportError::HttpStatus {
                url: url.to_string(),
                status: resp.status().as_u16(),
            });
        }

        let io_err = |source: io::Error| ExportError::Io {
            path: dest.to_path_buf(),
            source,
        };
        let mut out = File::create(dest).map_err(io_err)?;
        let written = io::copy(&mut resp, &mut out).map_err(io_err)?;
        out.flush().map_err(io_err)?;
        Ok(written)
    }
}

/// Creates `dir` and its parents; an already existing directory is fine.
pub(crate) fn ensure_dir(dir: &Path) -> Result<()> {
    if dir.as_os_str().is_empty() {
        return Ok(());
    }
    match fs::create_dir_all(dir) {
        Ok(()) => Ok(()),
        // Another worker may have created it between the check and the call.
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && dir.is_dir() => Ok(()),
        Err(source) => Err(ExportError::Io {
            path: dir.to_path_buf(),
            source,
        }),
    }
}

pub(crate) fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}
