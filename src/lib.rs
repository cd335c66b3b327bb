//! A small Rust client for the JSOC data export service.
//!
//! This crate implements the export flow used for SDO/HMI and AIA data:
//! submit an export request for a series, poll until the files are staged,
//! then download them, optionally across a pool of workers.
//!
//! ## Quick start
//! - Supply a JSOC-registered notification email (`--email`, `JSOC_EMAIL`, or
//!   an `email:` line in `.jsocrc` in the current or home directory).
//! - Build an [`ExportRequest`], run [`ExportClient::export`] and hand the
//!   resulting tasks to a [`TaskRunner`].
//!
//! ```no_run
//! use anyhow::Result;
//! use jsoc_export::{
//!     ClientConfig, DownloadReport, ExportClient, ExportRequest, Method, ParallelRunner,
//!     Protocol, TaskRunner,
//! };
//! use std::path::Path;
//!
//! fn main() -> Result<()> {
//!     let client = ExportClient::new(ClientConfig::default())?;
//!     let request = ExportRequest::new(
//!         "hmi.ic_720s[2024.03.01_00:00_TAI/1h]",
//!         "observer@example.org",
//!         Protocol::Fits,
//!         Method::Url,
//!     )?;
//!     let tasks = client.export(&request, Path::new("data"))?;
//!     let results = ParallelRunner::new(5).run(&tasks, client.transport());
//!     DownloadReport::new(results).into_result()?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]

mod client;
mod config;
mod download;
mod error;
mod poll;
mod reply;
mod request;
mod transport;
mod util;

#[cfg(test)]
mod testing;

pub use client::{ClientConfig, DEFAULT_BASE_URL, DEFAULT_FETCH_PATH, ExportClient};
pub use config::{Settings, load_settings};
pub use download::{
    DEFAULT_WORKERS, DownloadReport, DownloadTask, FetchOutcome, ParallelRunner,
    SequentialRunner, TaskResult, TaskRunner, build_download_tasks, fetch,
};
pub use error::{ExportError, Result};
pub use poll::{CancelToken, Clock, ExportState, PollPolicy, Poller, SystemClock};
pub use reply::ExportStatus;
pub use request::{ExportRequest, Method, Protocol};
pub use transport::{HttpTransport, HttpTransportConfig, Transport};
