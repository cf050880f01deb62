use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{model::user_profile::UserProfile, prompt::insight_extraction::StructuredInsight};

use super::classifier::ThreadClassification;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportUser {
    pub user_id: String,
    pub email: String,
    pub display_name: String,
}

impl ReportUser {
    /// Name used in the report subject, falling back to the address
    pub fn label(&self) -> &str {
        if self.display_name.trim().is_empty() {
            &self.email
        } else {
            &self.display_name
        }
    }
}

impl From<&UserProfile> for ReportUser {
    fn from(profile: &UserProfile) -> Self {
        Self {
            user_id: profile.user_id.clone(),
            email: profile.email.clone(),
            display_name: profile.display_name.clone(),
        }
    }
}

/// A complete weekly report. Never handed out partially populated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyReport {
    pub report_user: ReportUser,
    pub email_count: usize,
    pub conversation_count: usize,
    pub thread_status: Vec<ThreadClassification>,
    pub structured: StructuredInsight,
    pub final_report: String,
    pub generated_at: DateTime<Utc>,
}

impl WeeklyReport {
    pub fn follow_up_count(&self) -> usize {
        self.thread_status
            .iter()
            .filter(|t| t.follow_up_suggested)
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchedReport {
    pub report: WeeklyReport,
    pub sent_to: Vec<String>,
}
