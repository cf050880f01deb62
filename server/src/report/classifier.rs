use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::Display;

use crate::{email::conversation::Conversation, model::user_profile::UserPolicy};

/// Whose turn it is to reply on a thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum WaitingOn {
    You,
    Them,
    #[serde(rename = "none")]
    #[strum(serialize = "none")]
    Nobody,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ThreadStatus {
    Open,
    Informational,
    Stale,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadClassification {
    pub thread_key: String,
    pub subject: String,
    pub last_sender: String,
    pub last_recipients: Vec<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub age_hours: f64,
    pub waiting_on: WaitingOn,
    pub follow_up_suggested: bool,
    pub status: ThreadStatus,
}

/// Derive the operational state of one conversation from its latest message.
///
/// Total over its inputs: a missing timestamp counts as "just now", a blank
/// identity matches nobody, a future timestamp is treated as age zero, and
/// negative thresholds count as zero.
/// Threads waiting on the other side past the staleness horizon are reported
/// stale rather than chased.
pub fn classify_thread(
    conversation: &Conversation,
    policy: &UserPolicy,
    now: DateTime<Utc>,
) -> ThreadClassification {
    let latest = conversation.latest();

    let subject = conversation
        .messages()
        .iter()
        .rev()
        .map(|m| m.subject.trim())
        .find(|s| !s.is_empty())
        .unwrap_or_default()
        .to_string();

    let last_sender = latest.sender.trim().to_lowercase();
    let last_recipients = latest
        .recipients
        .iter()
        .map(|r| r.trim().to_lowercase())
        .collect::<Vec<_>>();

    let last_message_at = latest.timestamp();
    let age_hours = last_message_at
        .map(|ts| (now - ts).num_seconds() as f64 / 3600.0)
        .unwrap_or(0.0)
        .max(0.0);

    let identity = policy.identity.trim().to_lowercase();
    let waiting_on = if identity.is_empty() {
        WaitingOn::Nobody
    } else if last_sender == identity {
        WaitingOn::Them
    } else if last_recipients.iter().any(|r| *r == identity) {
        WaitingOn::You
    } else {
        WaitingOn::Nobody
    };

    let follow_up_hours = policy.follow_up_threshold_hours.max(0) as f64;
    let stale_hours = policy.stale_info_days.max(0) as f64 * 24.0;
    let is_stale = age_hours >= stale_hours;

    let (follow_up_suggested, status) = match waiting_on {
        WaitingOn::You => (true, ThreadStatus::Open),
        WaitingOn::Them
            if age_hours >= follow_up_hours && !is_stale =>
        {
            (true, ThreadStatus::Open)
        }
        _ if is_stale => (false, ThreadStatus::Stale),
        _ => (false, ThreadStatus::Informational),
    };

    ThreadClassification {
        thread_key: conversation.thread_key().to_string(),
        subject,
        last_sender,
        last_recipients,
        last_message_at,
        age_hours,
        waiting_on,
        follow_up_suggested,
        status,
    }
}

pub fn classify_all(
    conversations: &[Conversation],
    policy: &UserPolicy,
    now: DateTime<Utc>,
) -> Vec<ThreadClassification> {
    let classifications = conversations
        .iter()
        .map(|c| classify_thread(c, policy, now))
        .collect::<Vec<_>>();

    let count = |status: ThreadStatus| classifications.iter().filter(|c| c.status == status).count();
    tracing::info!(
        "Classified {} threads: {} open, {} informational, {} stale",
        classifications.len(),
        count(ThreadStatus::Open),
        count(ThreadStatus::Informational),
        count(ThreadStatus::Stale)
    );

    classifications
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::testing::common::{inbox_message, sent_message};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap()
    }

    fn hours_ago(hours: i64) -> String {
        (now() - Duration::hours(hours)).to_rfc3339()
    }

    fn policy() -> UserPolicy {
        UserPolicy::new("me@co.com")
    }

    fn single(msg: crate::email::message::Message) -> Conversation {
        Conversation::from_messages("t", vec![msg]).unwrap()
    }

    #[test]
    fn test_inbound_is_waiting_on_you() {
        let conversation = single(inbox_message(
            "m",
            "t",
            "vendor@x.com",
            &["me@co.com"],
            &hours_ago(10),
        ));
        let c = classify_thread(&conversation, &policy(), now());
        assert_eq!(c.waiting_on, WaitingOn::You);
        assert!(c.follow_up_suggested);
        assert_eq!(c.status, ThreadStatus::Open);
        assert!((c.age_hours - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_inbound_stays_open_regardless_of_age() {
        let conversation = single(inbox_message(
            "m",
            "t",
            "vendor@x.com",
            &["ME@co.com"],
            &hours_ago(24 * 30),
        ));
        let c = classify_thread(&conversation, &policy(), now());
        assert_eq!(c.waiting_on, WaitingOn::You);
        assert!(c.follow_up_suggested);
        assert_eq!(c.status, ThreadStatus::Open);
    }

    #[test]
    fn test_outbound_past_threshold_needs_follow_up() {
        let conversation = single(sent_message(
            "m",
            "t",
            "me@co.com",
            &["vendor@x.com"],
            &hours_ago(72),
        ));
        let c = classify_thread(&conversation, &policy(), now());
        assert_eq!(c.waiting_on, WaitingOn::Them);
        assert!(c.follow_up_suggested);
        assert_eq!(c.status, ThreadStatus::Open);
    }

    #[test]
    fn test_recent_outbound_is_informational() {
        let conversation = single(sent_message(
            "m",
            "t",
            "Me@Co.com",
            &["vendor@x.com"],
            &hours_ago(10),
        ));
        let c = classify_thread(&conversation, &policy(), now());
        assert_eq!(c.waiting_on, WaitingOn::Them);
        assert!(!c.follow_up_suggested);
        assert_eq!(c.status, ThreadStatus::Informational);
    }

    #[test]
    fn test_old_outbound_is_stale() {
        let conversation = single(sent_message(
            "m",
            "t",
            "me@co.com",
            &["vendor@x.com"],
            &hours_ago(24 * 10),
        ));
        let c = classify_thread(&conversation, &policy(), now());
        assert_eq!(c.status, ThreadStatus::Stale);
        assert!(!c.follow_up_suggested);
    }

    #[test]
    fn test_third_party_thread_ages_into_stale() {
        let fresh = single(inbox_message(
            "m",
            "t",
            "a@x.com",
            &["b@x.com"],
            &hours_ago(24 * 6),
        ));
        let old = single(inbox_message(
            "m",
            "t",
            "a@x.com",
            &["b@x.com"],
            &hours_ago(24 * 7),
        ));
        let fresh = classify_thread(&fresh, &policy(), now());
        let old = classify_thread(&old, &policy(), now());
        assert_eq!(fresh.waiting_on, WaitingOn::Nobody);
        assert_eq!(fresh.status, ThreadStatus::Informational);
        assert_eq!(old.status, ThreadStatus::Stale);
    }

    #[test]
    fn test_self_addressed_mail_prefers_sender_match() {
        let conversation = single(sent_message(
            "m",
            "t",
            "me@co.com",
            &["me@co.com"],
            &hours_ago(1),
        ));
        let c = classify_thread(&conversation, &policy(), now());
        assert_eq!(c.waiting_on, WaitingOn::Them);
        assert_eq!(c.status, ThreadStatus::Informational);
    }

    #[test]
    fn test_missing_timestamp_counts_as_now() {
        let mut msg = inbox_message("m", "t", "a@x.com", &["b@x.com"], "");
        msg.received_at = None;
        let c = classify_thread(&single(msg), &policy(), now());
        assert_eq!(c.age_hours, 0.0);
        assert_eq!(c.last_message_at, None);
        assert_eq!(c.status, ThreadStatus::Informational);
    }

    #[test]
    fn test_future_timestamp_is_not_negative_age() {
        let conversation = single(inbox_message(
            "m",
            "t",
            "a@x.com",
            &["b@x.com"],
            &(now() + Duration::hours(5)).to_rfc3339(),
        ));
        let c = classify_thread(&conversation, &policy(), now());
        assert_eq!(c.age_hours, 0.0);
    }

    #[test]
    fn test_subject_falls_back_to_earlier_message() {
        let mut reply = sent_message("m2", "t", "me@co.com", &["v@x.com"], &hours_ago(1));
        reply.subject = "  ".to_string();
        let mut original = inbox_message("m1", "t", "v@x.com", &["me@co.com"], &hours_ago(5));
        original.subject = "Concrete pour schedule".to_string();

        let conversation = Conversation::from_messages("t", vec![reply, original]).unwrap();
        let c = classify_thread(&conversation, &policy(), now());
        assert_eq!(c.subject, "Concrete pour schedule");
        assert_eq!(c.last_sender, "me@co.com");
    }

    #[test]
    fn test_waiting_on_them_below_threshold_is_never_open() {
        for hours in [0, 1, 24, 47] {
            let conversation = single(sent_message(
                "m",
                "t",
                "me@co.com",
                &["v@x.com"],
                &hours_ago(hours),
            ));
            let c = classify_thread(&conversation, &policy(), now());
            assert!(!c.follow_up_suggested);
            assert_ne!(c.status, ThreadStatus::Open);
        }
    }

    #[test]
    fn test_blank_identity_matches_nobody() {
        let conversation = single(inbox_message("m", "t", "", &[""], &hours_ago(1)));
        let c = classify_thread(&conversation, &UserPolicy::new(" "), now());
        assert_eq!(c.waiting_on, WaitingOn::Nobody);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let conversation = single(sent_message(
            "m",
            "t",
            "me@co.com",
            &["v@x.com"],
            &hours_ago(50),
        ));
        let first = classify_thread(&conversation, &policy(), now());
        let second = classify_thread(&conversation, &policy(), now());
        assert_eq!(first, second);
    }

    #[test]
    fn test_waiting_on_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&WaitingOn::Nobody).unwrap(), "\"none\"");
        assert_eq!(serde_json::to_string(&WaitingOn::You).unwrap(), "\"you\"");
        assert_eq!(ThreadStatus::Informational.to_string(), "informational");
    }

    #[test]
    fn test_extreme_and_negative_policy_values() {
        let conversation = single(sent_message(
            "m",
            "t",
            "me@co.com",
            &["vendor@x.com"],
            &hours_ago(72),
        ));

        let huge = UserPolicy {
            follow_up_threshold_hours: i64::MAX,
            stale_info_days: i64::MAX / 2,
            ..policy()
        };
        let c = classify_thread(&conversation, &huge, now());
        assert_eq!(c.waiting_on, WaitingOn::Them);
        assert!(!c.follow_up_suggested);
        assert_eq!(c.status, ThreadStatus::Informational);

        let negative = UserPolicy {
            follow_up_threshold_hours: -5,
            stale_info_days: -1,
            ..policy()
        };
        let c = classify_thread(&conversation, &negative, now());
        assert!(!c.follow_up_suggested);
        assert_eq!(c.status, ThreadStatus::Stale);
    }
}
