//! CLI entry point for jsoc-export.

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use jsoc_export::{
    ClientConfig, DownloadReport, ExportClient, ExportRequest, HttpTransportConfig, Method,
    ParallelRunner, PollPolicy, Protocol, SequentialRunner, TaskRunner, load_settings,
};
use tracing::{debug, info};

mod cli;

use cli::Args;

fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // RUST_LOG wins over -v
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(args.log_level()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    // Everything the user typed is checked before the first request goes out.
    let protocol: Protocol = args.protocol.parse()?;
    let method: Method = args.method.parse()?;
    let settings = load_settings(args.jsoc_url.clone(), args.email.clone(), args.verify())?;
    let mut request = ExportRequest::new(&args.series, &settings.email, protocol, method)?;
    if let Some(requestor) = &args.requestor {
        request = request.with_requestor(requestor);
    }

    info!(
        "Requesting {} and will notify {}",
        request.series(),
        request.email()
    );

    let client = ExportClient::new(ClientConfig {
        base_url: settings.url,
        fetch_path: args.fetch_url.clone(),
        poll: PollPolicy {
            interval: Duration::from_secs(args.sleep_time),
            max_wait: args.max_wait.map(Duration::from_secs),
        },
        http: HttpTransportConfig {
            timeout: args.http_timeout.map(Duration::from_secs),
            verify: settings.verify,
            ..HttpTransportConfig::default()
        },
    })?;

    let tasks = client.export(&request, &args.out_dir)?;

    let progress = !args.no_progress;
    let runner: Box<dyn TaskRunner> = if args.parallel {
        info!(workers = args.ndownloads, "Downloading files in parallel");
        Box::new(ParallelRunner::new(usize::from(args.ndownloads)).with_progress(progress))
    } else {
        info!("Downloading files");
        Box::new(SequentialRunner::new().with_progress(progress))
    };

    let results = runner.run(&tasks, client.transport());
    DownloadReport::new(results).into_result()?;

    Ok(())
}
