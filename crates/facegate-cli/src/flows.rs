//! Enrollment and gate runs as the command line drives them: acquire the
//! image, optionally keep a preview, then hand the blob to the orchestrator.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use facegate_core::capture::{write_preview, Camera, CameraConfig, CaptureSource};
use facegate_core::errors::{AppError, AppResult};
use facegate_core::object::ImageBlob;
use facegate_core::projector::{project_phase, project_report, UiProjection};
use facegate_core::workflow::{RunObserver, RunPhase, RunReport, RunRequest, Surface};
use tracing::{debug, info};
use uuid::Uuid;

use crate::cli::{EnrollArgs, VerifyArgs};
use crate::context::{block_on, AppContext};

/// Exit status of a gate run whose verdict was "no match".
pub const DENIED_EXIT_CODE: u8 = 6;

#[derive(Debug)]
pub struct RunSummary {
    pub report: RunReport,
    pub projection: UiProjection,
    pub preview: Option<PathBuf>,
}

impl RunSummary {
    pub fn new(report: RunReport, preview: Option<PathBuf>) -> Self {
        let projection = project_report(&report);
        Self {
            report,
            projection,
            preview,
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        if let Some((_, error)) = self.report.failure() {
            return error.exit_code();
        }
        match self.report.verdict().and_then(|verdict| verdict.is_match()) {
            Some(false) => ExitCode::from(DENIED_EXIT_CODE),
            _ => ExitCode::SUCCESS,
        }
    }
}

/// Logs each phase change with its status line.
struct PhaseLogger;

impl RunObserver for PhaseLogger {
    fn on_transition(&self, surface: Surface, run_id: Uuid, phase: RunPhase) {
        let projection = project_phase(surface, phase);
        debug!(target: "workflow", %run_id, ?phase, status = %projection.status, "phase changed");
    }
}

pub fn run_enroll(config_path: Option<&Path>, args: &EnrollArgs) -> AppResult<RunSummary> {
    let context = AppContext::load(config_path)?;
    let blob = CaptureSource::File(args.image.clone()).acquire()?;
    let preview = keep_preview(&blob, args.preview.as_deref())?;

    let orchestrator = context
        .orchestrator(Surface::Enrollment)
        .with_observer(Arc::new(PhaseLogger));
    let report = block_on(orchestrator.run(RunRequest::enroll(args.employee_id.clone(), blob)))??;
    Ok(RunSummary::new(report, preview))
}

pub fn run_verify(config_path: Option<&Path>, args: &VerifyArgs) -> AppResult<RunSummary> {
    let context = AppContext::load(config_path)?;
    let blob = acquire_for_verify(&context, args)?;
    let preview = keep_preview(&blob, args.preview.as_deref())?;

    let orchestrator = context
        .orchestrator(Surface::Gate)
        .with_observer(Arc::new(PhaseLogger));
    let report = block_on(orchestrator.run(RunRequest::verify(blob)))??;
    Ok(RunSummary::new(report, preview))
}

fn acquire_for_verify(context: &AppContext, args: &VerifyArgs) -> AppResult<ImageBlob> {
    if !args.camera {
        let path = args
            .image
            .clone()
            .ok_or_else(|| AppError::InputMissing("image".into()))?;
        return CaptureSource::File(path).acquire();
    }

    let config = CameraConfig::resolve(args.device.clone(), &context.config.camera);
    let mut camera = Camera::new(config);
    camera.start()?;
    let blob = CaptureSource::Camera(&mut camera).acquire();
    camera.stop();
    let blob = blob?;
    info!(target: "camera", bytes = blob.len(), "frame captured");
    Ok(blob)
}

fn keep_preview(blob: &ImageBlob, path: Option<&Path>) -> AppResult<Option<PathBuf>> {
    match path {
        Some(path) => {
            write_preview(blob, path)?;
            Ok(Some(path.to_path_buf()))
        }
        None => Ok(None),
    }
}
