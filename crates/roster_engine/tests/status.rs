use std::sync::Arc;
use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;
use roster_core::{
    FailureKind, JobDescriptor, JobKind, JobResolution, JobSummary, RetryPolicy, StatusUpdate,
};
use roster_engine::{
    ElapsedSettings, ElapsedStatusChecker, EndpointStatusChecker, ReqwestTransport,
    RequestExecutor, StatusChecker, StatusCheckers, TransportSettings,
};
use serde_json::json;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn endpoint_checker(server: &MockServer) -> EndpointStatusChecker {
    let transport = Arc::new(ReqwestTransport::new(TransportSettings::default()).unwrap());
    EndpointStatusChecker::new(
        RequestExecutor::new(transport),
        Url::parse(&server.uri()).unwrap(),
        "/api/bulk-delete/status/{job_id}",
        RetryPolicy::background(),
    )
}

fn job(kind: JobKind, job_id: &str, total: u64, started_at: Instant) -> JobDescriptor {
    JobDescriptor::new(kind, job_id, total, "test job", started_at)
}

#[tokio::test]
async fn endpoint_checker_reports_progress() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/bulk-delete/status/job-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "found": true,
            "progress": {"current": 4, "total": 10, "status": "Deleting accounts"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let now = Instant::now();
    let update = endpoint_checker(&server)
        .check(&job(JobKind::BulkDelete, "job-1", 10, now), now)
        .await
        .unwrap();

    assert_eq!(
        update,
        StatusUpdate::progress(4, Some(10), "Deleting accounts")
    );
}

#[tokio::test]
async fn endpoint_checker_reports_completion_summary() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/bulk-delete/status/job-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "completed": true,
            "progress": {"current": 10, "total": 10},
            "result": {
                "successful": 9,
                "failed": 1,
                "processingErrors": ["row 3: unknown student"]
            }
        })))
        .mount(&server)
        .await;

    let now = Instant::now();
    let update = endpoint_checker(&server)
        .check(&job(JobKind::BulkDelete, "job-2", 10, now), now)
        .await
        .unwrap();

    assert_eq!(
        update.resolution,
        Some(JobResolution::Completed(Some(JobSummary {
            successful: 9,
            failed: 1,
            processing_errors: vec!["row 3: unknown student".to_string()],
        })))
    );
    assert_eq!(update.current, 10);
}

#[tokio::test]
async fn endpoint_checker_fails_jobs_the_server_lost() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/bulk-delete/status/job-3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "found": false
        })))
        .mount(&server)
        .await;

    let now = Instant::now();
    let update = endpoint_checker(&server)
        .check(&job(JobKind::BulkDelete, "job-3", 5, now), now)
        .await
        .unwrap();

    assert_eq!(
        update.resolution,
        Some(JobResolution::Failed {
            reason: "job not found on server".to_string()
        })
    );
}

#[tokio::test]
async fn endpoint_checker_raises_unsuccessful_reports() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/bulk-delete/status/job-4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "message": "status store unavailable"
        })))
        .mount(&server)
        .await;

    let now = Instant::now();
    let err = endpoint_checker(&server)
        .check(&job(JobKind::BulkDelete, "job-4", 5, now), now)
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::UnexpectedPayload);
    assert_eq!(err.context, "Checking bulk-delete job job-4");
    assert!(err.message.contains("status store unavailable"));
}

#[tokio::test]
async fn endpoint_checker_raises_soft_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/bulk-delete/status/job-5"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"success": false, "message": "bad id"})),
        )
        .mount(&server)
        .await;

    let now = Instant::now();
    let err = endpoint_checker(&server)
        .check(&job(JobKind::BulkDelete, "job-5", 5, now), now)
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::HttpStatus(400));
    assert_eq!(err.status(), Some(400));
}

#[tokio::test]
async fn elapsed_checker_walks_through_stages() {
    let checker = ElapsedStatusChecker::new(ElapsedSettings::default());
    let start = Instant::now();
    let upload = job(JobKind::CsvUpload, "upload-1", 200, start);

    let at = |secs| start + Duration::from_secs(secs);

    let update = checker.check(&upload, at(0)).await.unwrap();
    assert_eq!(update, StatusUpdate::progress(10, None, "Validating records"));

    let update = checker.check(&upload, at(15)).await.unwrap();
    assert_eq!(update, StatusUpdate::progress(50, None, "Creating accounts"));

    let update = checker.check(&upload, at(65)).await.unwrap();
    assert_eq!(update, StatusUpdate::progress(150, None, "Sending welcome emails"));

    let update = checker.check(&upload, at(119)).await.unwrap();
    assert_eq!(update, StatusUpdate::progress(180, None, "Finalising"));
    assert_eq!(update.resolution, None);
}

#[tokio::test]
async fn elapsed_checker_assumes_completion() {
    let checker = ElapsedStatusChecker::new(ElapsedSettings::default());
    let start = Instant::now();
    let upload = job(JobKind::CsvUpload, "upload-2", 40, start);

    let update = checker
        .check(&upload, start + Duration::from_secs(130))
        .await
        .unwrap();

    assert_eq!(update.current, 40);
    assert_eq!(update.resolution, Some(JobResolution::Completed(None)));
    assert_eq!(
        update.status,
        "Processing complete, a report will follow by email"
    );
}

#[tokio::test]
async fn checkers_table_falls_back_for_unlisted_kinds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/bulk-delete/status/job-6"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "progress": {"current": 1, "total": 2}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let transport = Arc::new(ReqwestTransport::new(TransportSettings::default()).unwrap());
    let mut endpoints = std::collections::BTreeMap::new();
    endpoints.insert(
        JobKind::BulkDelete,
        "/api/bulk-delete/status/{job_id}".to_string(),
    );
    let checkers = StatusCheckers::from_endpoints(
        &RequestExecutor::new(transport),
        &Url::parse(&server.uri()).unwrap(),
        &endpoints,
        RetryPolicy::background(),
        ElapsedSettings::default(),
    );

    let now = Instant::now();
    let remote = checkers
        .for_kind(JobKind::BulkDelete)
        .check(&job(JobKind::BulkDelete, "job-6", 2, now), now)
        .await
        .unwrap();
    assert_eq!(remote, StatusUpdate::progress(1, Some(2), ""));

    // No request is made for a kind without an endpoint.
    let local = checkers
        .for_kind(JobKind::CsvUpload)
        .check(&job(JobKind::CsvUpload, "upload-3", 20, now), now)
        .await
        .unwrap();
    assert_eq!(local.status, "Validating records");
}

#[tokio::test]
async fn endpoint_checker_encodes_job_ids_as_one_segment() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/bulk-delete/status/2024%2F7%3Fx"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "progress": {"current": 1, "total": 3}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let now = Instant::now();
    let update = endpoint_checker(&server)
        .check(&job(JobKind::BulkDelete, "2024/7?x", 3, now), now)
        .await
        .unwrap();
    assert_eq!(update, StatusUpdate::progress(1, Some(3), ""));
}

#[tokio::test]
async fn elapsed_checker_handles_huge_totals() {
    let checker = ElapsedStatusChecker::new(ElapsedSettings::default());
    let start = Instant::now();
    let upload = job(JobKind::CsvUpload, "upload-4", u64::MAX, start);

    let update = checker
        .check(&upload, start + Duration::from_secs(15))
        .await
        .unwrap();
    assert_eq!(update.current, u64::MAX / 100);
    assert_eq!(update.status, "Creating accounts");
}
