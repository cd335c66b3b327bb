use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors produced while submitting, polling or downloading an export.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Invalid user input, rejected before any network call.
    #[error("invalid argument: {0}")]
    Argument(String),

    /// JSOC answered the submission with status 6.
    #[error("email address {email} is not registered with JSOC")]
    UnregisteredEmail { email: String },

    /// JSOC answered the submission with status 4.
    #[error("export request failed: {message}")]
    ExportRejected { message: String },

    /// The service answered with something other than HTTP 200.
    #[error("request failed with HTTP {status} for url ({url}){}", pending_hint(.status))]
    HttpStatus { url: String, status: u16 },

    /// The request never produced a response.
    #[error("could not reach {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The HTTP client itself could not be set up (TLS backend, bad config).
    #[error("failed to build HTTP client: {source}")]
    ClientBuild {
        #[source]
        source: reqwest::Error,
    },

    /// The service answered 200 but the body was not what the protocol promises.
    #[error("malformed reply from {url}: {detail}")]
    MalformedReply { url: String, detail: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("export {request_id} was not ready after {}s", .waited.as_secs())]
    DeadlineExceeded {
        request_id: String,
        waited: Duration,
    },

    #[error("waiting for export {request_id} was cancelled")]
    Cancelled { request_id: String },

    #[error("{failed} of {total} file(s) failed to download")]
    DownloadsFailed { failed: usize, total: usize },
}

impl ExportError {
    /// Non-200 replies, unreachable hosts and unparseable bodies.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::HttpStatus { .. } | Self::Network { .. } | Self::MalformedReply { .. }
        )
    }

    pub(crate) fn malformed(url: &str, detail: impl Into<String>) -> Self {
        Self::MalformedReply {
            url: url.to_string(),
            detail: detail.into(),
        }
    }
}

// JSOC returns 500 when the same email already has an export in flight.
fn pending_hint(status: &u16) -> &'static str {
    if *status == 500 {
        ". A 500 error could indicate you have a request pending"
    } else {
        ""
    }
}

pub type Result<T, E = ExportError> = std::result::Result<T, E>;
