use std::error::Error;
use std::io::{self, Write};

use facegate_core::decision::Verdict;
use facegate_core::errors::{AppError, AppResult};
use facegate_core::identity::SessionStatus;
use facegate_core::projector::project_session;
use serde_json::{json, Value};

use crate::cli::OutputMode;
use crate::flows::RunSummary;
use crate::session::{SessionAction, SessionOutcome};

pub fn render_session(outcome: &SessionOutcome, mode: OutputMode) -> AppResult<()> {
    match mode {
        OutputMode::Human => match (outcome.action, &outcome.url) {
            (SessionAction::Login, Some(url)) => {
                println!("Open this URL to sign in:");
                println!("{url}");
                println!("Then run: facegate exchange --code <CODE>");
            }
            (SessionAction::Logout, Some(url)) => {
                println!("{}", outcome.status.describe());
                println!("To end the hosted session open:");
                println!("{url}");
            }
            _ => match &outcome.detail {
                Some(detail) => eprintln!("{}: {detail}", outcome.status.describe()),
                None => println!("{}", outcome.status.describe()),
            },
        },
        OutputMode::Json => write_json(&session_json_payload(outcome))?,
    }
    Ok(())
}

fn session_json_payload(outcome: &SessionOutcome) -> Value {
    let projection = project_session(outcome.status);
    let mut payload = json!({
        "success": outcome.status != SessionStatus::LoginFailed,
        "action": outcome.action.as_str(),
        "status": outcome.status,
        "message": projection.status,
        "indicator": projection.indicator,
        "config": outcome.config_source.display().to_string(),
    });
    if let Some(url) = &outcome.url {
        payload["url"] = json!(url);
    }
    if let Some(detail) = &outcome.detail {
        payload["error"] = json!(detail);
    }
    payload
}

pub fn render_run(summary: &RunSummary, mode: OutputMode, verbose: bool) -> AppResult<()> {
    match mode {
        OutputMode::Human => {
            let projection = &summary.projection;
            println!("{} [{}]", projection.status, projection.pill);
            if let Some(banner) = &projection.banner {
                match &banner.subtitle {
                    Some(subtitle) => println!("{}: {}", banner.title, subtitle),
                    None => println!("{}", banner.title),
                }
            }
            if let Some(cause) = projection.cause {
                eprintln!("cause: {cause}");
            }
            if verbose {
                if let Some(key) = &summary.report.object_key {
                    tracing::info!("object key {key}");
                }
                if let Some(Verdict::Verified { result, .. }) = summary.report.verdict() {
                    if let (Some(similarity), Some(threshold)) = (result.similarity, result.threshold)
                    {
                        tracing::info!("similarity {similarity:.2} (threshold {threshold:.2})");
                    }
                }
            }
            if let Some(preview) = &summary.preview {
                println!("Preview written to {}", preview.display());
            }
        }
        OutputMode::Json => write_json(&run_json_payload(summary))?,
    }
    Ok(())
}

fn run_json_payload(summary: &RunSummary) -> Value {
    let report = &summary.report;
    let projection = &summary.projection;
    let mut payload = json!({
        "success": report.failure().is_none(),
        "run_id": report.run_id.to_string(),
        "surface": report.surface,
        "object_key": report.object_key.as_ref().map(|key| key.to_string()),
        "phases": report.phases,
        "status": projection.status,
        "indicator": projection.indicator,
        "pill": projection.pill,
        "banner": projection.banner,
        "started_at": report.started_at.to_rfc3339(),
        "finished_at": report.finished_at.to_rfc3339(),
    });
    match report.verdict() {
        Some(Verdict::Verified { result, .. }) => {
            payload["is_match"] = json!(result.is_match);
            payload["employee_id"] = json!(result.employee_id);
            payload["similarity"] = json!(result.similarity);
            payload["threshold"] = json!(result.threshold);
        }
        Some(Verdict::Enrolled { body, .. }) => {
            payload["response"] = body.clone();
        }
        None => {}
    }
    if let Some((cause, error)) = report.failure() {
        payload["cause"] = json!(cause);
        payload["error"] = json!(error.human_message());
    }
    if let Some(preview) = &summary.preview {
        payload["preview"] = json!(preview.display().to_string());
    }
    payload
}

fn write_json(payload: &Value) -> AppResult<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let payload = serde_json::to_string(payload)?;
    handle.write_all(payload.as_bytes())?;
    handle.write_all(b"\n")?;
    Ok(())
}

pub fn render_error(err: &AppError, mode: OutputMode) {
    match mode {
        OutputMode::Human => {
            eprintln!("error: {}", err.human_message());
            if let Some(source) = err.source() {
                eprintln!("cause: {source}");
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "success": false,
                "error": err.human_message(),
            });
            if let Ok(json) = serde_json::to_string(&payload) {
                println!("{json}");
            }
            if let Some(source) = err.source() {
                eprintln!("cause: {source}");
            }
        }
    }
}
