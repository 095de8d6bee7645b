//! Maps workflow state onto what an operator sees: a status line, an
//! indicator colour with a pill label, and an optional result banner.
//!
//! Projection is pure. The banner is what the user reads; `cause` is kept
//! alongside it so a failed upload is never reported as a denial.

use serde::Serialize;

use crate::decision::Verdict;
use crate::identity::SessionStatus;
use crate::workflow::{FailureCause, RunOutcome, RunPhase, RunReport, Surface};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Indicator {
    Idle,
    Good,
    Bad,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BannerKind {
    Good,
    Bad,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Banner {
    pub kind: BannerKind,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UiProjection {
    pub status: String,
    pub indicator: Indicator,
    pub pill: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner: Option<Banner>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<FailureCause>,
}

impl UiProjection {
    fn plain(status: &str, indicator: Indicator, pill: &str) -> Self {
        Self {
            status: status.to_string(),
            indicator,
            pill: pill.to_string(),
            banner: None,
            cause: None,
        }
    }

    fn with_banner(mut self, kind: BannerKind, title: &str, subtitle: Option<String>) -> Self {
        self.banner = Some(Banner {
            kind,
            title: title.to_string(),
            subtitle,
        });
        self
    }
}

/// Projection of a non-terminal phase. Terminal phases need the outcome;
/// use [`project_report`] for those.
pub fn project_phase(surface: Surface, phase: RunPhase) -> UiProjection {
    match (surface, phase) {
        (_, RunPhase::Idle) => UiProjection::plain("Ready", Indicator::Idle, "Idle"),
        (_, RunPhase::CaptureReady) => {
            UiProjection::plain("Image ready", Indicator::Idle, "Ready")
        }
        (Surface::Enrollment, RunPhase::Uploading) => {
            UiProjection::plain("Uploading image to storage", Indicator::Idle, "Working")
        }
        (Surface::Enrollment, RunPhase::Verifying) => {
            UiProjection::plain("Enrolling face", Indicator::Idle, "Working")
        }
        (Surface::Gate, RunPhase::Uploading) => {
            UiProjection::plain("Uploading image", Indicator::Idle, "Working")
        }
        (Surface::Gate, RunPhase::Verifying) => {
            UiProjection::plain("Verifying identity", Indicator::Idle, "Working")
        }
        (Surface::Enrollment, RunPhase::Succeeded) => {
            UiProjection::plain("Enrollment successful", Indicator::Good, "Enrolled")
        }
        (Surface::Gate, RunPhase::Succeeded) => {
            UiProjection::plain("Verification complete", Indicator::Idle, "Done")
        }
        (Surface::Enrollment, RunPhase::Failed) => {
            UiProjection::plain("Enrollment failed", Indicator::Bad, "Error")
        }
        (Surface::Gate, RunPhase::Failed) => {
            UiProjection::plain("Verification failed", Indicator::Bad, "Error")
        }
    }
}

pub fn project_report(report: &RunReport) -> UiProjection {
    match &report.outcome {
        RunOutcome::Succeeded(verdict) => project_success(report.surface, verdict),
        RunOutcome::Failed { cause, error } => {
            let mut projection = project_phase(report.surface, RunPhase::Failed);
            let title = match report.surface {
                Surface::Enrollment => "Enrollment failed",
                Surface::Gate => "Access Denied",
            };
            projection = projection.with_banner(BannerKind::Bad, title, Some(error.to_string()));
            projection.cause = Some(*cause);
            projection
        }
    }
}

fn project_success(surface: Surface, verdict: &Verdict) -> UiProjection {
    match (surface, verdict) {
        (_, Verdict::Verified { result, .. }) if result.is_match => {
            UiProjection::plain("Verification complete", Indicator::Good, "Granted").with_banner(
                BannerKind::Good,
                "Access Granted",
                result.employee_id.clone(),
            )
        }
        (_, Verdict::Verified { .. }) => {
            UiProjection::plain("Verification complete", Indicator::Bad, "Denied").with_banner(
                BannerKind::Bad,
                "Access Denied",
                None,
            )
        }
        (_, Verdict::Enrolled { .. }) => project_phase(surface, RunPhase::Succeeded),
    }
}

pub fn project_session(status: SessionStatus) -> UiProjection {
    match status {
        SessionStatus::SignedIn => UiProjection::plain("Signed in", Indicator::Good, "Signed in"),
        SessionStatus::NotSignedIn => {
            UiProjection::plain("Not signed in", Indicator::Idle, "Signed out")
        }
        SessionStatus::LoginFailed => {
            UiProjection::plain("Login failed", Indicator::Bad, "Error")
        }
    }
}
