use std::sync::Arc;

use indoc::formatdoc;

use crate::{
    error::BackendError,
    report::{classifier::ThreadClassification, types::ReportUser},
};

use super::{insight_extraction::StructuredInsight, TextGenerator};

pub const REPORT_SECTIONS: [&str; 8] = [
    "Executive Summary",
    "Subcontractor/Vendor Performance",
    "Key Issues & Delays",
    "Approvals Needed",
    "Supply/Material Notes",
    "Client Concerns",
    "Forward Risks",
    "Recommended Actions",
];

/// Everything the executive pass writes from
pub struct ExecutiveBrief<'a> {
    pub user: &'a ReportUser,
    pub email_count: usize,
    pub conversation_count: usize,
    pub classifications: &'a [ThreadClassification],
    pub insight: &'a StructuredInsight,
}

pub fn system_prompt() -> String {
    let sections = REPORT_SECTIONS
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{}. {}", i + 1, s))
        .collect::<Vec<_>>()
        .join("\n");

    formatdoc! {r#"
        You are an executive assistant writing a weekly operations report for company leadership.
        You are given deterministic thread statuses and a structured analysis of the week's email.
        Write plain text, no Markdown tables, using exactly these sections in this order:
        {sections}

        Base every statement on the data provided. If a section has nothing to report, say so in one line.
        Keep the report concise and actionable."#,
        sections = sections,
    }
}

pub fn executive_user_prompt(brief: &ExecutiveBrief<'_>) -> String {
    let classifications = serde_json::to_string_pretty(brief.classifications).unwrap_or_default();
    let insight = serde_json::to_string_pretty(brief.insight).unwrap_or_default();

    formatdoc! {r#"
        Weekly report for {name} <{email}>
        Emails in window: {email_count}
        Conversations: {conversation_count}

        Thread status (deterministic):
        {classifications}

        Structured analysis:
        {insight}

        Write the report now."#,
        name = brief.user.label(),
        email = brief.user.email,
        email_count = brief.email_count,
        conversation_count = brief.conversation_count,
        classifications = classifications,
        insight = insight,
    }
}

pub struct ExecutiveSynthesizer {
    generator: Arc<dyn TextGenerator>,
}

impl ExecutiveSynthesizer {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Any failure is fatal. There is no fallback report.
    pub async fn synthesize(&self, brief: &ExecutiveBrief<'_>) -> Result<String, BackendError> {
        let text = self
            .generator
            .generate_text(&system_prompt(), &executive_user_prompt(brief))
            .await?;

        let text = text.trim();
        if text.is_empty() {
            return Err(BackendError::EmptyResponse);
        }
        tracing::info!("Executive report synthesized ({} chars)", text.len());
        Ok(text.to_string())
    }
}
