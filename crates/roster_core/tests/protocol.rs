use pretty_assertions::assert_eq;
use roster_core::{
    extract_job_id, validation_issues, JobResolution, JobStatusReport, JobSummary, StatusUpdate,
    ValidationIssue,
};
use serde_json::json;

fn report(value: serde_json::Value) -> JobStatusReport {
    serde_json::from_value(value).expect("report decodes")
}

#[test]
fn job_id_aliases_are_checked_in_order() {
    assert_eq!(extract_job_id(&json!({"jobId": "a", "id": "b"})), Some("a".to_string()));
    assert_eq!(extract_job_id(&json!({"jobID": "c"})), Some("c".to_string()));
    assert_eq!(extract_job_id(&json!({"id": 42})), Some("42".to_string()));
    assert_eq!(extract_job_id(&json!({"jobId": "", "id": "d"})), Some("d".to_string()));
    assert_eq!(extract_job_id(&json!({"success": true})), None);
    assert_eq!(extract_job_id(&json!({"jobId": null})), None);
}

#[test]
fn running_report_maps_to_progress() {
    let update = report(json!({
        "success": true,
        "found": true,
        "completed": false,
        "progress": {"current": 12, "total": 40, "status": "Creating accounts"}
    }))
    .into_update()
    .unwrap();
    assert_eq!(update, StatusUpdate::progress(12, Some(40), "Creating accounts"));
}

#[test]
fn completed_report_carries_summary() {
    let update = report(json!({
        "success": true,
        "found": true,
        "completed": true,
        "progress": {"current": 40, "total": 40},
        "result": {
            "successful": 38,
            "failed": 2,
            "processingErrors": ["row 4: bad email", {"error": "duplicate"}]
        }
    }))
    .into_update()
    .unwrap();
    assert_eq!(
        update.resolution,
        Some(JobResolution::Completed(Some(JobSummary {
            successful: 38,
            failed: 2,
            processing_errors: vec![
                "row 4: bad email".to_string(),
                r#"{"error":"duplicate"}"#.to_string(),
            ],
        })))
    );
}

#[test]
fn failed_and_missing_jobs_resolve_as_failures() {
    let failed = report(json!({"success": true, "found": true, "failed": true, "failedReason": "quota"}))
        .into_update()
        .unwrap();
    assert_eq!(
        failed.resolution,
        Some(JobResolution::Failed { reason: "quota".to_string() })
    );

    let missing = report(json!({"success": true, "found": false}))
        .into_update()
        .unwrap();
    assert!(matches!(missing.resolution, Some(JobResolution::Failed { .. })));
}

#[test]
fn unsuccessful_report_is_rejected() {
    let err = report(json!({"success": false, "message": "queue offline"}))
        .into_update()
        .unwrap_err();
    assert_eq!(err.0, "queue offline");
}

#[test]
fn sparse_report_defaults_to_running() {
    let update = report(json!({})).into_update().unwrap();
    assert_eq!(update, StatusUpdate::progress(0, None, ""));
}

#[test]
fn validation_issues_are_itemized_per_row() {
    let issues = validation_issues(&json!({
        "success": false,
        "errors": [
            {"row": 2, "field": "Email", "message": "invalid email"},
            {"row": "5", "field": "Year Group", "error": "unknown year"},
            "Header 'Tutor' missing"
        ]
    }));
    assert_eq!(
        issues,
        vec![
            ValidationIssue {
                row: Some(2),
                field: Some("Email".to_string()),
                message: "invalid email".to_string(),
            },
            ValidationIssue {
                row: Some(5),
                field: Some("Year Group".to_string()),
                message: "unknown year".to_string(),
            },
            ValidationIssue {
                row: None,
                field: None,
                message: "Header 'Tutor' missing".to_string(),
            },
        ]
    );
}

#[test]
fn validation_issues_fall_back_to_message() {
    let issues = validation_issues(&json!({"validationErrors": []}));
    assert!(issues.is_empty());

    let issues = validation_issues(&json!({"success": false, "message": "School not found"}));
    assert_eq!(
        issues,
        vec![ValidationIssue {
            row: None,
            field: None,
            message: "School not found".to_string(),
        }]
    );
}
