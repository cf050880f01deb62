use anyhow::Context;
use indoc::indoc;
use minijinja::{context, Environment};

use crate::{
    error::{ReportError, ReportResult},
    report::types::WeeklyReport,
};

use super::client::OutboundMail;

const TEMPLATE_NAME: &str = "weekly_report.txt";

pub const WEEKLY_REPORT_TEMPLATE: &str = indoc! {"
    Weekly AI Report for {{ name }} <{{ email }}>
    Generated {{ generated_at }}
    Emails: {{ email_count }} | Conversations: {{ conversation_count }} | Follow-ups suggested: {{ follow_ups }}

    {{ final_report }}
"};

/// Renders a finished report into the plain-text mail sent to recipients
pub struct ReportMailer {
    env: Environment<'static>,
}

impl ReportMailer {
    pub fn new() -> anyhow::Result<Self> {
        let mut env = Environment::new();
        env.add_template(TEMPLATE_NAME, WEEKLY_REPORT_TEMPLATE)
            .context("Weekly report template is invalid")?;
        Ok(Self { env })
    }

    pub fn subject(report: &WeeklyReport) -> String {
        format!("Weekly AI Report - {}", report.report_user.label())
    }

    pub fn compose(&self, report: &WeeklyReport, recipients: Vec<String>) -> ReportResult<OutboundMail> {
        let body_text = self
            .env
            .get_template(TEMPLATE_NAME)
            .and_then(|tmpl| {
                tmpl.render(context! {
                    name => report.report_user.label(),
                    email => &report.report_user.email,
                    generated_at => report.generated_at.format("%Y-%m-%d %H:%M UTC").to_string(),
                    email_count => report.email_count,
                    conversation_count => report.conversation_count,
                    follow_ups => report.follow_up_count(),
                    final_report => &report.final_report,
                })
            })
            .map_err(|e| ReportError::SendFailed(format!("could not render report mail: {e}")))?;

        Ok(OutboundMail {
            subject: Self::subject(report),
            body_text,
            recipients,
        })
    }
}

/// Trim, drop blanks and de-duplicate addresses case-insensitively, keeping order
pub fn normalize_recipients(addresses: &[String]) -> Vec<String> {
    let mut recipients: Vec<String> = vec![];
    for address in addresses.iter().map(|a| a.trim()).filter(|a| !a.is_empty()) {
        if !recipients.iter().any(|r| r.eq_ignore_ascii_case(address)) {
            recipients.push(address.to_string());
        }
    }
    recipients
}
