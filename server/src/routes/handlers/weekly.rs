use std::sync::Arc;

use axum::{body::Bytes, extract::State, Json};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    error::{AppError, AppJsonResult},
    report::{ReportOrchestrator, WeeklyReport},
};

#[derive(Debug, Default, Deserialize)]
pub struct WeeklyReportRequest {
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EmailReportRequest {
    pub to_addresses: Vec<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConnectedUser {
    pub user_id: String,
    pub email: String,
    pub display_name: String,
    pub tenant_id: String,
}

#[derive(Debug, Serialize)]
pub struct ReportRecipientUser {
    pub user_id: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct EmailReportResponse {
    pub ok: bool,
    pub sent_to: Vec<String>,
    pub report_user: ReportRecipientUser,
    pub report: WeeklyReport,
}

/// An empty body is the default request; anything else must be valid JSON
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| AppError::BadRequest(format!("Invalid request body: {e}")))
}

pub async fn connected_users(
    State(orchestrator): State<Arc<ReportOrchestrator>>,
) -> AppJsonResult<Vec<ConnectedUser>> {
    let users = orchestrator
        .profiles()
        .connected_users()
        .await?
        .into_iter()
        .map(|p| ConnectedUser {
            user_id: p.user_id,
            email: p.email,
            display_name: p.display_name,
            tenant_id: p.tenant_id,
        })
        .collect();

    Ok(Json(users))
}

pub async fn weekly_report(
    State(orchestrator): State<Arc<ReportOrchestrator>>,
    body: Bytes,
) -> AppJsonResult<WeeklyReport> {
    let req: WeeklyReportRequest = parse_body(&body)?;
    let report = orchestrator
        .generate_weekly_report(req.user_id.as_deref())
        .await?;

    Ok(Json(report))
}

pub async fn email_weekly_report(
    State(orchestrator): State<Arc<ReportOrchestrator>>,
    body: Bytes,
) -> AppJsonResult<EmailReportResponse> {
    let req = serde_json::from_slice::<EmailReportRequest>(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid request body: {e}")))?;

    if req.to_addresses.iter().all(|a| a.trim().is_empty()) {
        return Err(AppError::BadRequest("to_addresses is empty".to_string()));
    }

    let dispatched = orchestrator
        .generate_and_send_weekly_report(&req.to_addresses, req.user_id.as_deref())
        .await?;

    Ok(Json(EmailReportResponse {
        ok: true,
        sent_to: dispatched.sent_to,
        report_user: ReportRecipientUser {
            user_id: dispatched.report.report_user.user_id.clone(),
            email: dispatched.report.report_user.email.clone(),
        },
        report: dispatched.report,
    }))
}
