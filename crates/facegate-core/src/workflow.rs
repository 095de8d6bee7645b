//! Upload-and-decide orchestration shared by the enrollment and gate
//! surfaces.
//!
//! A run walks `Idle → CaptureReady → Uploading → Verifying` and ends in
//! `Succeeded` or `Failed`. Only one run may be active at a time. The run is
//! claimed under the state lock before any work starts, so a second request
//! is rejected with [`AppError::RunInFlight`] until the first one finishes.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::decision::{DecisionRequest, DecisionService, Verdict};
use crate::errors::{AppError, AppResult};
use crate::object::{validate_employee_id, ImageBlob, ObjectKey};
use crate::transfer::ObjectTransfer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Surface {
    Enrollment,
    Gate,
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Surface::Enrollment => f.write_str("enrollment"),
            Surface::Gate => f.write_str("gate"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Idle,
    CaptureReady,
    Uploading,
    Verifying,
    Succeeded,
    Failed,
}

impl RunPhase {
    pub fn is_in_flight(self) -> bool {
        matches!(self, RunPhase::Uploading | RunPhase::Verifying)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunPhase::Succeeded | RunPhase::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureCause {
    /// No usable image or identifier; nothing was sent.
    Input,
    /// Grant request or storage transfer failed.
    Upload,
    /// Decision endpoint failed or answered for another object.
    Decision,
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::Input => f.write_str("input"),
            FailureCause::Upload => f.write_str("upload"),
            FailureCause::Decision => f.write_str("decision"),
        }
    }
}

/// What the user supplied when triggering a run.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub blob: Option<ImageBlob>,
    pub employee_id: Option<String>,
}

impl RunRequest {
    pub fn enroll(employee_id: impl Into<String>, blob: ImageBlob) -> Self {
        Self {
            blob: Some(blob),
            employee_id: Some(employee_id.into()),
        }
    }

    pub fn verify(blob: ImageBlob) -> Self {
        Self {
            blob: Some(blob),
            employee_id: None,
        }
    }
}

#[derive(Debug)]
pub enum RunOutcome {
    Succeeded(Verdict),
    Failed { cause: FailureCause, error: AppError },
}

#[derive(Debug)]
pub struct RunReport {
    pub run_id: Uuid,
    pub surface: Surface,
    pub object_key: Option<ObjectKey>,
    pub phases: Vec<RunPhase>,
    pub outcome: RunOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn final_phase(&self) -> RunPhase {
        match self.outcome {
            RunOutcome::Succeeded(_) => RunPhase::Succeeded,
            RunOutcome::Failed { .. } => RunPhase::Failed,
        }
    }

    pub fn verdict(&self) -> Option<&Verdict> {
        match &self.outcome {
            RunOutcome::Succeeded(verdict) => Some(verdict),
            RunOutcome::Failed { .. } => None,
        }
    }

    pub fn failure(&self) -> Option<(FailureCause, &AppError)> {
        match &self.outcome {
            RunOutcome::Failed { cause, error } => Some((*cause, error)),
            RunOutcome::Succeeded(_) => None,
        }
    }
}

/// Notified on every phase change, in order.
pub trait RunObserver: Send + Sync {
    fn on_transition(&self, surface: Surface, run_id: Uuid, phase: RunPhase);
}

#[derive(Debug)]
struct OrchestratorState {
    phase: RunPhase,
    active: Option<Uuid>,
}

pub struct WorkflowOrchestrator {
    surface: Surface,
    transfer: Arc<dyn ObjectTransfer>,
    decision: Arc<dyn DecisionService>,
    observers: Vec<Arc<dyn RunObserver>>,
    state: Mutex<OrchestratorState>,
}

struct ActiveRun {
    run_id: Uuid,
    phases: Vec<RunPhase>,
    object_key: Option<ObjectKey>,
    started_at: DateTime<Utc>,
}

impl WorkflowOrchestrator {
    pub fn new(
        surface: Surface,
        transfer: Arc<dyn ObjectTransfer>,
        decision: Arc<dyn DecisionService>,
    ) -> Self {
        Self {
            surface,
            transfer,
            decision,
            observers: Vec::new(),
            state: Mutex::new(OrchestratorState {
                phase: RunPhase::Idle,
                active: None,
            }),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn phase(&self) -> RunPhase {
        self.lock_state().phase
    }

    /// Drive one run to a terminal state. Only a rejected request (another
    /// run in flight) returns `Err`; every other failure is reported in the
    /// returned [`RunReport`].
    pub async fn run(&self, request: RunRequest) -> AppResult<RunReport> {
        let mut active = self.begin()?;
        let _claim = RunClaim {
            state: &self.state,
            run_id: active.run_id,
        };
        let span = info_span!("run", run_id = %active.run_id, surface = %self.surface);
        let outcome = self.drive(&mut active, request).instrument(span).await;
        Ok(self.finish(active, outcome))
    }

    async fn drive(&self, active: &mut ActiveRun, request: RunRequest) -> RunOutcome {
        let (blob, decision_request) = match self.prepare(request) {
            Ok(prepared) => prepared,
            Err(error) => return fail(FailureCause::Input, error),
        };
        self.advance(active, RunPhase::CaptureReady);

        let object_key = decision_request.object_key().clone();
        active.object_key = Some(object_key.clone());
        self.advance(active, RunPhase::Uploading);

        if let Err(error) = self.upload(&object_key, &blob).await {
            return fail(FailureCause::Upload, error);
        }

        self.advance(active, RunPhase::Verifying);
        let verdict = match self.decision.invoke(decision_request).await {
            Ok(verdict) => verdict,
            Err(error) => return fail(FailureCause::Decision, error),
        };

        match accept_verdict(&object_key, verdict) {
            Ok(verdict) => RunOutcome::Succeeded(verdict),
            Err(error) => fail(FailureCause::Decision, error),
        }
    }

    fn prepare(&self, request: RunRequest) -> AppResult<(ImageBlob, DecisionRequest)> {
        let blob = request
            .blob
            .filter(|blob| !blob.is_empty())
            .ok_or_else(|| AppError::InputMissing("image".into()))?;

        let decision_request = match self.surface {
            Surface::Enrollment => {
                let raw = request
                    .employee_id
                    .ok_or_else(|| AppError::InputMissing("employee id".into()))?;
                let employee_id = validate_employee_id(&raw)?.to_string();
                DecisionRequest::Enroll {
                    object_key: ObjectKey::enrollment(&employee_id)?,
                    employee_id,
                }
            }
            Surface::Gate => DecisionRequest::Verify {
                object_key: ObjectKey::gate_capture(),
            },
        };
        Ok((blob, decision_request))
    }

    async fn upload(&self, object_key: &ObjectKey, blob: &ImageBlob) -> AppResult<()> {
        let grant = self
            .transfer
            .request_grant(object_key, &blob.content_type)
            .await?;
        self.transfer.transfer(grant, blob).await
    }

    /// Checks and claims in one critical section; the claim is released by
    /// `finish`, or by `RunClaim` if the run future is dropped early.
    fn begin(&self) -> AppResult<ActiveRun> {
        let mut state = self.lock_state();
        if let Some(current) = state.active {
            warn!(target: "workflow", surface = %self.surface, phase = ?state.phase, %current, "run rejected while another is in flight");
            return Err(AppError::RunInFlight);
        }
        let run_id = Uuid::new_v4();
        state.phase = RunPhase::Idle;
        state.active = Some(run_id);
        drop(state);

        info!(target: "workflow", %run_id, surface = %self.surface, "run started");
        Ok(ActiveRun {
            run_id,
            phases: Vec::new(),
            object_key: None,
            started_at: Utc::now(),
        })
    }

    fn advance(&self, active: &mut ActiveRun, phase: RunPhase) {
        self.lock_state().phase = phase;
        active.phases.push(phase);
        for observer in &self.observers {
            observer.on_transition(self.surface, active.run_id, phase);
        }
    }

    fn finish(&self, mut active: ActiveRun, outcome: RunOutcome) -> RunReport {
        let terminal = match &outcome {
            RunOutcome::Succeeded(_) => RunPhase::Succeeded,
            RunOutcome::Failed { .. } => RunPhase::Failed,
        };
        self.advance(&mut active, terminal);
        release(&self.state, active.run_id);

        match &outcome {
            RunOutcome::Succeeded(verdict) => info!(
                target: "workflow",
                run_id = %active.run_id,
                is_match = ?verdict.is_match(),
                "run succeeded"
            ),
            RunOutcome::Failed { cause, error } => warn!(
                target: "workflow",
                run_id = %active.run_id,
                %cause,
                error = %error,
                "run failed"
            ),
        }

        RunReport {
            run_id: active.run_id,
            surface: self.surface,
            object_key: active.object_key,
            phases: active.phases,
            outcome,
            started_at: active.started_at,
            finished_at: Utc::now(),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, OrchestratorState> {
        lock(&self.state)
    }
}

/// Releases the orchestrator if a run future is dropped before `finish`.
struct RunClaim<'a> {
    state: &'a Mutex<OrchestratorState>,
    run_id: Uuid,
}

impl Drop for RunClaim<'_> {
    fn drop(&mut self) {
        release(self.state, self.run_id);
    }
}

fn lock(state: &Mutex<OrchestratorState>) -> MutexGuard<'_, OrchestratorState> {
    state
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn release(state: &Mutex<OrchestratorState>, run_id: Uuid) {
    let mut state = lock(state);
    if state.active == Some(run_id) {
        state.active = None;
    }
}

/// Only a verdict for the object this run uploaded may be applied.
fn accept_verdict(expected: &ObjectKey, verdict: Verdict) -> AppResult<Verdict> {
    if expected == verdict.object_key() {
        return Ok(verdict);
    }
    Err(AppError::VerdictMismatch {
        expected: expected.to_string(),
        received: verdict.object_key().to_string(),
    })
}

fn fail(cause: FailureCause, error: AppError) -> RunOutcome {
    RunOutcome::Failed { cause, error }
}
