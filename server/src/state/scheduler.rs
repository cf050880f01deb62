use std::sync::Arc;

use anyhow::Context;
use tokio_cron_scheduler::Job;

use crate::{
    error::ReportResult,
    report::{DispatchedReport, ReportOrchestrator},
    server_config::ScheduleSettings,
};

/// One scheduled dispatch. Failures are logged and left for the next tick.
pub async fn run_weekly_report(
    orchestrator: &ReportOrchestrator,
    recipients: &[String],
    user_id: Option<&str>,
) -> ReportResult<DispatchedReport> {
    match orchestrator
        .generate_and_send_weekly_report(recipients, user_id)
        .await
    {
        Ok(dispatched) => {
            tracing::info!(
                "Weekly report for {} sent to {:?}",
                dispatched.report.report_user.email,
                dispatched.sent_to
            );
            Ok(dispatched)
        }
        Err(e) => {
            tracing::error!("Weekly report job failed: {}", e);
            Err(e)
        }
    }
}

pub fn weekly_report_job(
    orchestrator: Arc<ReportOrchestrator>,
    schedule: &ScheduleSettings,
) -> anyhow::Result<Job> {
    let recipients = schedule.recipients.clone();
    let user_id = schedule.user_id.clone();

    Job::new_async(schedule.cron.as_str(), move |uuid, mut l| {
        let orchestrator = orchestrator.clone();
        let recipients = recipients.clone();
        let user_id = user_id.clone();
        Box::pin(async move {
            tracing::info!("Running weekly report job {}", uuid);
            if let Err(e) = run_weekly_report(&orchestrator, &recipients, user_id.as_deref()).await {
                tracing::warn!("Weekly report job {} skipped this tick: {}", uuid, e);
            }

            let next_tick = l.next_tick_for_job(uuid).await;
            if let Ok(Some(ts)) = next_tick {
                tracing::info!("Next time for weekly report job is {:?}", ts)
            }
        })
    })
    .with_context(|| format!("Invalid schedule.cron '{}'", schedule.cron))
}
