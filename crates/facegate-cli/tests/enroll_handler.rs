use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use facegate_cli::cli::{EnrollArgs, OutputMode};
use facegate_cli::commands::{CommandHandler, EnrollHandler};
use facegate_cli::errors::AppError;
use facegate_cli::flows::RunSummary;
use facegate_core::decision::Verdict;
use facegate_core::object::ObjectKey;
use facegate_core::workflow::{FailureCause, RunOutcome, RunPhase, RunReport, Surface};
use uuid::Uuid;

fn sample_args() -> EnrollArgs {
    EnrollArgs {
        employee_id: "E123".into(),
        image: PathBuf::from("captures/E123.jpg"),
        preview: None,
    }
}

fn summary(outcome: RunOutcome) -> RunSummary {
    RunSummary::new(
        RunReport {
            run_id: Uuid::new_v4(),
            surface: Surface::Enrollment,
            object_key: Some(ObjectKey::enrollment("E123").unwrap()),
            phases: vec![RunPhase::CaptureReady, RunPhase::Uploading],
            outcome,
            started_at: Utc::now(),
            finished_at: Utc::now(),
        },
        None,
    )
}

fn enrolled() -> RunOutcome {
    RunOutcome::Succeeded(Verdict::Enrolled {
        object_key: ObjectKey::enrollment("E123").unwrap(),
        body: serde_json::json!({ "message": "enrolled" }),
    })
}

#[test]
fn enroll_handler_passes_args_config_and_verbose_flag() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let render_calls = Arc::new(Mutex::new(Vec::new()));
    let handler = EnrollHandler::with_dependencies(
        sample_args(),
        Some(PathBuf::from("/tmp/facegate.toml")),
        {
            let seen = Arc::clone(&seen);
            move |config: Option<&Path>, args: &EnrollArgs| {
                seen.lock()
                    .unwrap()
                    .push((config.map(Path::to_path_buf), args.employee_id.clone()));
                Ok(summary(enrolled()))
            }
        },
        {
            let render_calls = Arc::clone(&render_calls);
            move |summary: &RunSummary, mode, verbose| {
                render_calls
                    .lock()
                    .unwrap()
                    .push((summary.projection.status.clone(), mode, verbose));
                Ok(())
            }
        },
    );

    let exit = handler.execute(OutputMode::Json, true).unwrap();
    assert_eq!(exit, ExitCode::SUCCESS);
    assert_eq!(
        seen.lock().unwrap().as_slice(),
        &[(Some(PathBuf::from("/tmp/facegate.toml")), "E123".to_string())]
    );
    let calls = render_calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "Enrollment successful");
    assert_eq!(calls[0].1, OutputMode::Json);
    assert!(calls[0].2);
}

#[test]
fn failed_enrollment_is_rendered_then_exits_with_error_code() {
    let rendered = Arc::new(Mutex::new(0));
    let handler = EnrollHandler::with_dependencies(
        sample_args(),
        None,
        |_config, _args| {
            Ok(summary(RunOutcome::Failed {
                cause: FailureCause::Upload,
                error: AppError::Unauthenticated,
            }))
        },
        {
            let rendered = Arc::clone(&rendered);
            move |summary: &RunSummary, _mode, _verbose| {
                assert_eq!(summary.projection.cause, Some(FailureCause::Upload));
                *rendered.lock().unwrap() += 1;
                Ok(())
            }
        },
    );

    let exit = handler.execute(OutputMode::Human, false).unwrap();
    assert_eq!(exit, ExitCode::from(3));
    assert_eq!(*rendered.lock().unwrap(), 1);
}

#[test]
fn enroll_handler_surfaces_acquisition_errors() {
    let handler = EnrollHandler::with_dependencies(
        sample_args(),
        None,
        |_config, _args| Err(AppError::InputMissing("image file captures/E123.jpg not found".into())),
        |_summary, _mode, _verbose| panic!("render should not run"),
    );

    let err = handler.execute(OutputMode::Human, false).unwrap_err();
    match err {
        AppError::InputMissing(message) => assert!(message.contains("not found")),
        other => panic!("unexpected error: {other}"),
    }
}
