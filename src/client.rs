use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::download::{DownloadTask, build_download_tasks};
use crate::error::{ExportError, Result};
use crate::poll::{CancelToken, Clock, PollPolicy, Poller, SystemClock};
use crate::reply::{ExportStatus, STATUS_REJECTED, STATUS_UNREGISTERED, parse_status, parse_submit};
use crate::request::ExportRequest;
use crate::transport::{HttpTransport, HttpTransportConfig, Transport};
use crate::util::{append_query, urljoin};

pub const DEFAULT_BASE_URL: &str = "http://jsoc.stanford.edu";
pub const DEFAULT_FETCH_PATH: &str = "/cgi-bin/ajax/jsoc_fetch";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Service root, e.g. `http://jsoc.stanford.edu`. Staged files are
    /// fetched relative to it.
    pub base_url: String,
    /// Path of the fetch endpoint under `base_url`.
    pub fetch_path: String,
    pub poll: PollPolicy,
    pub http: HttpTransportConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            fetch_path: DEFAULT_FETCH_PATH.to_string(),
            poll: PollPolicy::default(),
            http: HttpTransportConfig::default(),
        }
    }
}

/// Client for the JSOC export protocol.
pub struct ExportClient<T = HttpTransport> {
    base_url: String,
    fetch_url: String,
    poll: PollPolicy,
    clock: Arc<dyn Clock>,
    cancel: Option<CancelToken>,
    transport: T,
}

impl ExportClient<HttpTransport> {
    pub fn new(cfg: ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(&cfg.http)?;
        Ok(Self::with_transport(cfg, transport))
    }
}

impl<T: Transport> ExportClient<T> {
    pub fn with_transport(cfg: ClientConfig, transport: T) -> Self {
        let base_url = cfg.base_url.trim_end_matches('/').to_string();
        let fetch_url = urljoin(&base_url, &cfg.fetch_path);
        Self {
            base_url,
            fetch_url,
            poll: cfg.poll,
            clock: Arc::new(SystemClock::new()),
            cancel: None,
            transport,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Submits an export request and returns the service's request id.
    pub fn submit(&self, request: &ExportRequest) -> Result<String> {
        let params = request.submit_params();
        let params: Vec<(&str, &str)> = params.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let url = append_query(&self.fetch_url, &params);

        info!(series = request.series(), email = request.email(), "Submitting request to JSOC");
        let body = self.get_ok(&url)?;
        let reply = parse_submit(&url, &body)?;

        match reply.status {
            STATUS_UNREGISTERED => Err(ExportError::UnregisteredEmail {
                email: request.email().to_string(),
            }),
            STATUS_REJECTED => Err(ExportError::ExportRejected {
                message: reply.error.unwrap_or_default(),
            }),
            status => {
                let request_id = reply
                    .requestid
                    .filter(|id| !id.is_empty())
                    .ok_or_else(|| ExportError::malformed(&url, "reply has no `requestid`"))?;
                debug!(request_id = %request_id, status, "export submitted");
                Ok(request_id)
            }
        }
    }

    /// One status call.
    pub fn poll(&self, request_id: &str) -> Result<ExportStatus> {
        let url = append_query(
            &self.fetch_url,
            &[
                ("op", "exp_status"),
                ("requestid", request_id),
                ("format", "json"),
            ],
        );
        let body = self.get_ok(&url)?;
        parse_status(&url, request_id, &body)
    }

    /// Polls at the configured interval until the export is ready.
    pub fn wait_until_ready(&self, request_id: &str) -> Result<ExportStatus> {
        let mut poller = Poller::new(self.poll, self.clock.as_ref());
        if let Some(cancel) = &self.cancel {
            poller = poller.with_cancel(cancel);
        }
        poller.run(request_id, |id| self.poll(id))
    }

    /// Submits, waits for staging and lists what to download into `out_dir`.
    pub fn export(&self, request: &ExportRequest, out_dir: &Path) -> Result<Vec<DownloadTask>> {
        let request_id = self.submit(request)?;
        let status = self.wait_until_ready(&request_id)?;
        let tasks = build_download_tasks(&self.base_url, &status, out_dir)?;
        info!(
            files = tasks.len(),
            out_dir = %out_dir.display(),
            "Data finished staging"
        );
        Ok(tasks)
    }

    fn get_ok(&self, url: &str) -> Result<String> {
        let (status, body) = self.transport.get_text(url)?;
        if status != 200 {
            return Err(ExportError::HttpStatus {
                url: url.to_string(),
                status,
            });
        }
        Ok(body)
    }
}

impl<T> std::fmt::Debug for ExportClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportClient")
            .field("base_url", &self.base_url)
            .field("fetch_url", &self.fetch_url)
            .field("poll", &self.poll)
            .finish_non_exhaustive()
    }
}
