mod support;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{Method, StatusCode};
use facegate_core::build_client;
use facegate_core::credentials::{CredentialStore, SessionToken, SharedCredentials};
use facegate_core::decision::{DecisionRequest, DecisionService, HttpDecisionClient, Verdict};
use facegate_core::errors::AppError;
use facegate_core::projector::{project_report, BannerKind, Indicator};
use facegate_core::object::{ContentType, ImageBlob, ObjectKey};
use facegate_core::transfer::{HttpObjectTransfer, ObjectTransfer};
use facegate_core::workflow::{FailureCause, RunPhase, RunRequest, Surface, WorkflowOrchestrator};
use serde_json::json;

use support::{jpeg_blob, Behavior, TestBackend};

fn signed_in() -> SharedCredentials {
    let store = CredentialStore::in_memory();
    store.set_token(SessionToken::new("id-token-1")).unwrap();
    Arc::new(store)
}

fn enrollment(backend: &TestBackend, credentials: SharedCredentials) -> WorkflowOrchestrator {
    let config = backend.config();
    let http = build_client(&config).unwrap();
    WorkflowOrchestrator::new(
        Surface::Enrollment,
        Arc::new(HttpObjectTransfer::enrollment(
            http.clone(),
            &config,
            Arc::clone(&credentials),
        )),
        Arc::new(HttpDecisionClient::new(http, &config, Some(credentials))),
    )
}

fn gate(backend: &TestBackend) -> WorkflowOrchestrator {
    let config = backend.config();
    let http = build_client(&config).unwrap();
    WorkflowOrchestrator::new(
        Surface::Gate,
        Arc::new(HttpObjectTransfer::gate(http.clone(), &config)),
        Arc::new(HttpDecisionClient::new(http, &config, None)),
    )
}

#[tokio::test]
async fn enrollment_uploads_then_enrolls_under_reference_key() {
    let backend = TestBackend::start(Behavior::default()).await;
    let orchestrator = enrollment(&backend, signed_in());

    let report = orchestrator
        .run(RunRequest::enroll("E123", jpeg_blob()))
        .await
        .unwrap();

    assert!(report.failure().is_none(), "{:?}", report.outcome);
    assert_eq!(
        report.object_key.as_ref().map(|key| key.as_str()),
        Some("enroll/E123/reference.jpg")
    );
    assert_eq!(
        report.phases,
        vec![
            RunPhase::CaptureReady,
            RunPhase::Uploading,
            RunPhase::Verifying,
            RunPhase::Succeeded
        ]
    );
    assert!(matches!(report.verdict(), Some(Verdict::Enrolled { .. })));

    let calls = backend.calls();
    assert_eq!(
        backend.paths(),
        vec![
            "/presign-upload",
            "/storage/enroll/E123/reference.jpg",
            "/enroll"
        ]
    );
    assert_eq!(calls[0].authorization.as_deref(), Some("Bearer id-token-1"));
    assert_eq!(
        calls[0].json(),
        json!({ "objectKey": "enroll/E123/reference.jpg", "contentType": "image/jpeg" })
    );
    assert_eq!(calls[1].method, Method::PUT);
    assert_eq!(calls[1].content_type.as_deref(), Some("image/jpeg"));
    assert_eq!(calls[1].body, jpeg_blob().bytes);
    assert_eq!(calls[2].authorization.as_deref(), Some("Bearer id-token-1"));
    assert_eq!(
        calls[2].json(),
        json!({ "employeeId": "E123", "objectKey": "enroll/E123/reference.jpg" })
    );

    let projection = project_report(&report);
    assert_eq!(projection.status, "Enrollment successful");
    assert_eq!(projection.indicator, Indicator::Good);
}

#[tokio::test]
async fn gate_match_grants_access() {
    let backend = TestBackend::start(Behavior::default()).await;
    let report = gate(&backend)
        .run(RunRequest::verify(jpeg_blob()))
        .await
        .unwrap();

    let key = report.object_key.clone().unwrap();
    assert!(key.as_str().starts_with("gate/capture-"));
    assert!(key.as_str().ends_with(".jpg"));
    assert_eq!(report.verdict().and_then(Verdict::is_match), Some(true));

    let calls = backend.calls();
    assert_eq!(calls.len(), 3);
    assert!(calls[0].authorization.is_none());
    assert_eq!(calls[1].path, format!("/storage/{}", key));
    assert_eq!(calls[2].path, "/verify");
    assert!(calls[2].authorization.is_none());
    assert_eq!(calls[2].json(), json!({ "objectKey": key.as_str() }));

    let projection = project_report(&report);
    assert_eq!(projection.pill, "Granted");
    let banner = projection.banner.unwrap();
    assert_eq!(banner.kind, BannerKind::Good);
    assert_eq!(banner.title, "Access Granted");
    assert_eq!(banner.subtitle.as_deref(), Some("E123"));
}

#[tokio::test]
async fn gate_no_match_is_denied_as_a_successful_run() {
    let backend = TestBackend::start(Behavior {
        is_match: false,
        ..Behavior::default()
    })
    .await;
    let report = gate(&backend)
        .run(RunRequest::verify(jpeg_blob()))
        .await
        .unwrap();

    assert_eq!(report.final_phase(), RunPhase::Succeeded);
    let projection = project_report(&report);
    assert_eq!(projection.pill, "Denied");
    assert_eq!(projection.banner.unwrap().title, "Access Denied");
    assert!(projection.cause.is_none());
}

#[tokio::test]
async fn storage_rejection_stops_before_decision() {
    let backend = TestBackend::start(Behavior {
        put_status: StatusCode::FORBIDDEN,
        ..Behavior::default()
    })
    .await;
    let report = gate(&backend)
        .run(RunRequest::verify(jpeg_blob()))
        .await
        .unwrap();

    let (cause, error) = report.failure().unwrap();
    assert_eq!(cause, FailureCause::Upload);
    assert!(matches!(
        error,
        AppError::TransferFailed {
            status: Some(403),
            ..
        }
    ));
    assert_eq!(backend.count("/verify"), 0);
    assert_eq!(
        report.phases,
        vec![RunPhase::CaptureReady, RunPhase::Uploading, RunPhase::Failed]
    );

    let projection = project_report(&report);
    assert_eq!(projection.status, "Verification failed");
    assert_eq!(projection.cause, Some(FailureCause::Upload));
}

#[tokio::test]
async fn decision_error_is_reported_with_decision_cause() {
    let backend = TestBackend::start(Behavior {
        decision_status: StatusCode::INTERNAL_SERVER_ERROR,
        ..Behavior::default()
    })
    .await;
    let report = enrollment(&backend, signed_in())
        .run(RunRequest::enroll("E123", jpeg_blob()))
        .await
        .unwrap();

    let (cause, error) = report.failure().unwrap();
    assert_eq!(cause, FailureCause::Decision);
    match error {
        AppError::DecisionFailed { status, body, .. } => {
            assert_eq!(*status, Some(500));
            assert_eq!(body, "enroll rejected");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn enrollment_without_token_sends_nothing() {
    let backend = TestBackend::start(Behavior::default()).await;
    let orchestrator = enrollment(&backend, Arc::new(CredentialStore::in_memory()));

    let report = orchestrator
        .run(RunRequest::enroll("E123", jpeg_blob()))
        .await
        .unwrap();

    let (cause, error) = report.failure().unwrap();
    assert_eq!(cause, FailureCause::Upload);
    assert!(matches!(error, AppError::Unauthenticated));
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn invalid_employee_id_sends_nothing() {
    let backend = TestBackend::start(Behavior::default()).await;
    let report = enrollment(&backend, signed_in())
        .run(RunRequest::enroll("../E123", jpeg_blob()))
        .await
        .unwrap();

    let (cause, error) = report.failure().unwrap();
    assert_eq!(cause, FailureCause::Input);
    assert!(matches!(error, AppError::InvalidEmployeeId { .. }));
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn each_gate_run_uses_a_fresh_object_key() {
    let backend = TestBackend::start(Behavior::default()).await;
    let orchestrator = gate(&backend);
    let first = orchestrator.run(RunRequest::verify(jpeg_blob())).await.unwrap();
    let second = orchestrator.run(RunRequest::verify(jpeg_blob())).await.unwrap();
    assert_ne!(first.object_key, second.object_key);
    assert_eq!(backend.count("/verify"), 2);
}

fn storage_puts(backend: &TestBackend) -> usize {
    backend
        .paths()
        .iter()
        .filter(|path| path.starts_with("/storage/"))
        .count()
}

#[tokio::test]
async fn transfer_refuses_blob_of_another_content_type() {
    let backend = TestBackend::start(Behavior::default()).await;
    let config = backend.config();
    let transfer = HttpObjectTransfer::gate(build_client(&config).unwrap(), &config);
    let key = ObjectKey::gate_capture();

    let grant = transfer
        .request_grant(&key, &ContentType::jpeg())
        .await
        .unwrap();
    let png = ImageBlob::new(
        vec![0x89, b'P', b'N', b'G'],
        ContentType::from_path(Path::new("face.png")).unwrap(),
    );
    let err = transfer.transfer(grant, &png).await.unwrap_err();

    match err {
        AppError::TransferFailed {
            object_key,
            status,
            message,
        } => {
            assert_eq!(object_key, key.as_str());
            assert_eq!(status, None);
            assert!(message.contains("image/png"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(backend.paths(), vec!["/presign-upload"]);
    assert_eq!(storage_puts(&backend), 0);
}

#[tokio::test]
async fn expired_grant_is_not_used() {
    let backend = TestBackend::start(Behavior::default()).await;
    let config = backend.config();
    let transfer = HttpObjectTransfer::gate(build_client(&config).unwrap(), &config);
    let key = ObjectKey::gate_capture();

    let mut grant = transfer
        .request_grant(&key, &ContentType::jpeg())
        .await
        .unwrap();
    assert_eq!(grant.expires_in, Some(Duration::from_secs(300)));
    grant.expires_in = Some(Duration::ZERO);

    let err = transfer.transfer(grant, &jpeg_blob()).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::TransferFailed { status: None, .. }
    ));
    assert_eq!(storage_puts(&backend), 0);
}

#[tokio::test]
async fn enroll_decision_without_token_sends_nothing() {
    let backend = TestBackend::start(Behavior::default()).await;
    let config = backend.config();
    let http = build_client(&config).unwrap();
    let request = DecisionRequest::Enroll {
        employee_id: "E123".into(),
        object_key: ObjectKey::enrollment("E123").unwrap(),
    };

    let signed_out = HttpDecisionClient::new(
        http.clone(),
        &config,
        Some(Arc::new(CredentialStore::in_memory())),
    );
    assert!(matches!(
        signed_out.invoke(request.clone()).await,
        Err(AppError::Unauthenticated)
    ));

    let no_store = HttpDecisionClient::new(http, &config, None);
    assert!(matches!(
        no_store.invoke(request).await,
        Err(AppError::Unauthenticated)
    ));

    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn unreadable_verify_body_is_a_decision_failure_not_a_denial() {
    let backend = TestBackend::start(Behavior {
        verify_body: Some("<html>gateway timeout</html>"),
        ..Behavior::default()
    })
    .await;
    let report = gate(&backend)
        .run(RunRequest::verify(jpeg_blob()))
        .await
        .unwrap();

    let (cause, error) = report.failure().unwrap();
    assert_eq!(cause, FailureCause::Decision);
    match error {
        AppError::DecisionFailed { status, body, .. } => {
            assert_eq!(*status, Some(200));
            assert!(body.contains("gateway timeout"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(report.verdict().is_none());

    let projection = project_report(&report);
    assert_eq!(projection.pill, "Error");
    assert_eq!(projection.cause, Some(FailureCause::Decision));
}
