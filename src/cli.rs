//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use jsoc_export::{DEFAULT_FETCH_PATH, DEFAULT_WORKERS};

/// Download data from the JSOC export service.
///
/// Submits an export request for a series, waits for JSOC to stage the
/// files and downloads them into the output directory. Files that already
/// exist locally are skipped.
#[derive(Parser, Debug)]
#[command(name = "jsoc-export")]
#[command(author, version, about)]
pub struct Args {
    /// The series query to retrieve, including its record-set filter
    #[arg(short, long, default_value = "hmi.ic_720s[$]")]
    pub series: String,

    /// Email address registered with JSOC, notified when the export is ready
    #[arg(short, long)]
    pub email: Option<String>,

    /// Directory to save the downloaded data
    #[arg(short, long, default_value = "./")]
    pub out_dir: PathBuf,

    /// Increase output verbosity (-v for progress messages, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Download files in parallel
    #[arg(short, long)]
    pub parallel: bool,

    /// Number of simultaneous downloads when using --parallel (1-64)
    #[arg(long, default_value_t = DEFAULT_WORKERS as u8, value_parser = clap::value_parser!(u8).range(1..=64))]
    pub ndownloads: u8,

    /// URL of the JSOC website [default: http://jsoc.stanford.edu]
    #[arg(long)]
    pub jsoc_url: Option<String>,

    /// Path of the fetch ajax routine
    #[arg(long, default_value = DEFAULT_FETCH_PATH)]
    pub fetch_url: String,

    /// Protocol for file acquisition: FITS, JPEG, MP4 or MPEG
    #[arg(long, default_value = "FITS")]
    pub protocol: String,

    /// Fetch method: url, ftp, url-tar or ftp-tar
    #[arg(long, default_value = "url")]
    pub method: String,

    /// Seconds to sleep between checks on the export request
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    pub sleep_time: u64,

    /// Requestor name sent with the export request
    #[arg(long)]
    pub requestor: Option<String>,

    /// Give up if the export is not staged after this many seconds
    #[arg(long)]
    pub max_wait: Option<u64>,

    /// Per-request HTTP timeout in seconds (unlimited by default)
    #[arg(long)]
    pub http_timeout: Option<u64>,

    /// Accept invalid TLS certificates
    #[arg(long)]
    pub insecure: bool,

    /// Hide the download progress bar
    #[arg(long)]
    pub no_progress: bool,
}

impl Args {
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }

    pub fn verify(&self) -> Option<bool> {
        self.insecure.then_some(false)
    }
}
