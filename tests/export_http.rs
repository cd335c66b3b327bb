//! Integration tests for the export workflow against a mock JSOC server.
//!
//! The client is blocking, so every test drives it from `spawn_blocking`
//! while wiremock runs on the test runtime.

use std::path::PathBuf;
use std::time::Duration;

use jsoc_export::{
    ClientConfig, DownloadReport, ExportClient, ExportError, ExportRequest, Method,
    ParallelRunner, PollPolicy, Protocol, SequentialRunner, TaskRunner,
};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FETCH: &str = "/cgi-bin/ajax/jsoc_fetch";

fn client_for(uri: String) -> jsoc_export::Result<ExportClient> {
    ExportClient::new(ClientConfig {
        base_url: uri,
        poll: PollPolicy {
            interval: Duration::from_millis(10),
            max_wait: Some(Duration::from_secs(10)),
        },
        ..ClientConfig::default()
    })
}

fn hmi_request() -> ExportRequest {
    ExportRequest::new(
        "hmi.ic_720s[$]",
        "observer@example.org",
        Protocol::Fits,
        Method::Url,
    )
    .unwrap()
}

async fn mount_submit(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(FETCH))
        .and(query_param("op", "exp_request"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_ready(server: &MockServer, files: &[&str]) {
    let data: Vec<_> = files.iter().map(|f| json!({ "filename": f })).collect();
    Mock::given(method("GET"))
        .and(path(FETCH))
        .and(query_param("op", "exp_status"))
        .and(query_param("requestid", "JSOC_TEST_1"))
        .and(query_param("format", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": 0,
            "dir": "/SUM1/export",
            "data": data,
        })))
        .mount(server)
        .await;
}

async fn mount_file(server: &MockServer, name: &str, body: &'static [u8], times: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/SUM1/export/{name}")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .expect(times)
        .mount(server)
        .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_submit_sends_wire_parameters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(FETCH))
        .and(query_param("op", "exp_request"))
        .and(query_param("ds", "hmi.ic_720s[$]"))
        .and(query_param("sizeratio", "1"))
        .and(query_param("process", "n=0|no_op"))
        .and(query_param("notify", "observer@example.org"))
        .and(query_param("method", "url"))
        .and(query_param(
            "filenamefmt",
            "hmi.ic_720s.{T_REC:A}.{CAMERA}.{segment}",
        ))
        .and(query_param("format", "json"))
        .and(query_param("protocol", "FITS,compress Rice"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "status": 2, "requestid": "JSOC_TEST_1" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let id = tokio::task::spawn_blocking(move || client_for(uri)?.submit(&hmi_request()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(id, "JSOC_TEST_1");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_full_export_downloads_into_out_dir() {
    let server = MockServer::start().await;
    mount_submit(&server, json!({ "status": 1, "requestid": "JSOC_TEST_1" })).await;
    mount_ready(&server, &["a.fits", "S00001/b.fits"]).await;
    mount_file(&server, "a.fits", b"AAAA", 1).await;
    mount_file(&server, "S00001/b.fits", b"BB", 1).await;

    let tmp = tempfile::tempdir().unwrap();
    let out: PathBuf = tmp.path().join("data");
    let uri = server.uri();
    let out_dir = out.clone();

    let report = tokio::task::spawn_blocking(move || {
        let client = client_for(uri)?;
        let tasks = client.export(&hmi_request(), &out_dir)?;
        let results = ParallelRunner::new(2).run(&tasks, client.transport());
        DownloadReport::new(results).into_result()
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(report.downloaded(), 2);
    assert_eq!(std::fs::read(out.join("a.fits")).unwrap(), b"AAAA");
    assert_eq!(
        std::fs::read(out.join("S00001").join("b.fits")).unwrap(),
        b"BB"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_second_run_skips_existing_files() {
    let server = MockServer::start().await;
    mount_submit(&server, json!({ "status": 1, "requestid": "JSOC_TEST_1" })).await;
    mount_ready(&server, &["a.fits"]).await;
    // One transfer across both runs.
    mount_file(&server, "a.fits", b"AAAA", 1).await;

    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().to_path_buf();
    let uri = server.uri();

    let (first, second) = tokio::task::spawn_blocking(move || -> jsoc_export::Result<_> {
        let client = client_for(uri)?;
        let tasks = client.export(&hmi_request(), &out)?;
        let runner = SequentialRunner::new();
        let first = DownloadReport::new(runner.run(&tasks, client.transport())).into_result()?;
        let second = DownloadReport::new(runner.run(&tasks, client.transport())).into_result()?;
        Ok((first.downloaded(), second.skipped()))
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(first, 1);
    assert_eq!(second, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_missing_file_is_reported_without_aborting_siblings() {
    let server = MockServer::start().await;
    mount_submit(&server, json!({ "status": 1, "requestid": "JSOC_TEST_1" })).await;
    mount_ready(&server, &["a.fits", "gone.fits", "c.fits"]).await;
    mount_file(&server, "a.fits", b"A", 1).await;
    mount_file(&server, "c.fits", b"C", 1).await;

    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().to_path_buf();
    let out_dir = out.clone();
    let uri = server.uri();

    let err = tokio::task::spawn_blocking(move || {
        let client = client_for(uri)?;
        let tasks = client.export(&hmi_request(), &out_dir)?;
        let report = DownloadReport::new(ParallelRunner::new(3).run(&tasks, client.transport()));
        let failed: Vec<String> = report.failures().map(|(t, _)| t.url.clone()).collect();
        assert_eq!(failed.len(), 1);
        assert!(failed[0].ends_with("/SUM1/export/gone.fits"));
        report.into_result().map(|_| ())
    })
    .await
    .unwrap()
    .unwrap_err();

    assert!(matches!(
        err,
        ExportError::DownloadsFailed {
            failed: 1,
            total: 3
        }
    ));
    assert!(out.join("a.fits").exists());
    assert!(out.join("c.fits").exists());
    assert!(!out.join("gone.fits").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_submit_500_is_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(FETCH))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let uri = server.uri();
    let err = tokio::task::spawn_blocking(move || client_for(uri)?.submit(&hmi_request()))
        .await
        .unwrap()
        .unwrap_err();

    assert!(err.is_transport());
    assert!(matches!(err, ExportError::HttpStatus { status: 500, .. }));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rejected_export_passes_message_through() {
    let server = MockServer::start().await;
    mount_submit(
        &server,
        json!({ "status": 4, "error": "Bad recordset: hmi.ic_720s[$" }),
    )
    .await;

    let uri = server.uri();
    let err = tokio::task::spawn_blocking(move || client_for(uri)?.submit(&hmi_request()))
        .await
        .unwrap()
        .unwrap_err();

    match err {
        ExportError::ExportRejected { message } => {
            assert_eq!(message, "Bad recordset: hmi.ic_720s[$")
        }
        other => panic!("unexpected error {other:?}"),
    }
}
