use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    email::{
        client::{MailboxCredential, MessageSender, MessageSource},
        conversation::group_into_conversations,
        report_mailer::{normalize_recipients, ReportMailer},
        window::filter_recent,
    },
    error::{GenerationStage, ReportError, ReportResult},
    model::user_profile::{resolve_profile, ProfileStore},
    prompt::{
        executive_report::{ExecutiveBrief, ExecutiveSynthesizer},
        insight_extraction::InsightExtractor,
        TextGenerator,
    },
    server_config::ReportSettings,
};

use super::{
    classifier::classify_all,
    types::{DispatchedReport, ReportUser, WeeklyReport},
};

/// Runs one weekly report: fetch, window, group, classify, extract, synthesize,
/// then optionally send. Holds no state across runs.
pub struct ReportOrchestrator {
    profiles: Arc<dyn ProfileStore>,
    source: Arc<dyn MessageSource>,
    sender: Arc<dyn MessageSender>,
    extractor: InsightExtractor,
    synthesizer: ExecutiveSynthesizer,
    mailer: ReportMailer,
    settings: ReportSettings,
}

pub struct OrchestratorParts {
    pub profiles: Arc<dyn ProfileStore>,
    pub source: Arc<dyn MessageSource>,
    pub sender: Arc<dyn MessageSender>,
    pub structuring: Arc<dyn TextGenerator>,
    pub executive: Arc<dyn TextGenerator>,
}

impl ReportOrchestrator {
    pub fn new(parts: OrchestratorParts, settings: ReportSettings) -> anyhow::Result<Self> {
        Ok(Self {
            profiles: parts.profiles,
            source: parts.source,
            sender: parts.sender,
            extractor: InsightExtractor::new(parts.structuring, &settings),
            synthesizer: ExecutiveSynthesizer::new(parts.executive),
            mailer: ReportMailer::new()?,
            settings,
        })
    }

    pub fn profiles(&self) -> &dyn ProfileStore {
        self.profiles.as_ref()
    }

    pub async fn generate_weekly_report(&self, user_id: Option<&str>) -> ReportResult<WeeklyReport> {
        self.generate_weekly_report_at(user_id, Utc::now())
            .await
            .map(|(report, _)| report)
    }

    /// Generate the report as of `now`, returning the mailbox credential used
    pub async fn generate_weekly_report_at(
        &self,
        user_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> ReportResult<(WeeklyReport, MailboxCredential)> {
        let profile = resolve_profile(
            self.profiles.as_ref(),
            user_id,
            self.settings.default_user_email.as_deref(),
        )
        .await?;
        let report_user = ReportUser::from(&profile);
        let policy = profile.policy();
        let mailbox = MailboxCredential::for_profile(&profile);

        tracing::info!(
            "Generating weekly report for {} ({})",
            report_user.email,
            report_user.user_id
        );

        let messages = self
            .source
            .list_recent_messages(&mailbox, self.settings.window_days)
            .await?;
        let fetched = messages.len();

        let messages = filter_recent(messages, self.settings.window_days, now);
        let email_count = messages.len();
        tracing::info!(
            "{} of {} fetched messages fall within the last {} days",
            email_count,
            fetched,
            self.settings.window_days
        );

        let conversations = group_into_conversations(messages);
        let thread_status = classify_all(&conversations, &policy, now);

        let structured = self
            .extractor
            .extract(&conversations)
            .await
            .map_err(|e| {
                tracing::error!("Insight extraction failed: {}", e);
                ReportError::generation(GenerationStage::Extraction, e)
            })?;

        let brief = ExecutiveBrief {
            user: &report_user,
            email_count,
            conversation_count: conversations.len(),
            classifications: &thread_status,
            insight: &structured,
        };
        let final_report = self.synthesizer.synthesize(&brief).await.map_err(|e| {
            tracing::error!("Executive synthesis failed: {}", e);
            ReportError::generation(GenerationStage::Synthesis, e)
        })?;

        let report = WeeklyReport {
            conversation_count: conversations.len(),
            report_user,
            email_count,
            thread_status,
            structured,
            final_report,
            generated_at: now,
        };
        Ok((report, mailbox))
    }

    /// Generate, then send once. Nothing is sent unless the report is complete.
    pub async fn generate_and_send_weekly_report(
        &self,
        recipients: &[String],
        user_id: Option<&str>,
    ) -> ReportResult<DispatchedReport> {
        let recipients = normalize_recipients(recipients);
        if recipients.is_empty() {
            return Err(ReportError::SendFailed("no recipients given".to_string()));
        }

        let (report, mailbox) = self.generate_weekly_report_at(user_id, Utc::now()).await?;
        let mail = self.mailer.compose(&report, recipients)?;
        self.sender.send_message(&mail, &mailbox).await?;

        Ok(DispatchedReport {
            report,
            sent_to: mail.recipients,
        })
    }
}
