use chrono::{DateTime, NaiveDateTime, Utc};
use lib_email_clients::graph::{GraphMessage, Recipient};
use serde::{Deserialize, Serialize};
use strum::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Folder {
    Inbox,
    Sent,
}

/// A mailbox message as fetched for one report run. Never mutated after fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub id: String,
    pub subject: String,
    pub sender: String,
    pub recipients: Vec<String>,
    pub received_at: Option<String>,
    pub sent_at: Option<String>,
    pub thread_key: Option<String>,
    pub preview: String,
    pub folder: Folder,
}

impl Message {
    pub fn from_graph(msg: GraphMessage, folder: Folder) -> Self {
        let sender = msg
            .from
            .as_ref()
            .and_then(Recipient::address)
            .map(|a| a.trim().to_string())
            .unwrap_or_default();

        let mut recipients: Vec<String> = vec![];
        let all = msg
            .to_recipients
            .iter()
            .flatten()
            .chain(msg.cc_recipients.iter().flatten());
        for address in all.filter_map(Recipient::address) {
            let address = address.trim();
            if address.is_empty() {
                continue;
            }
            if !recipients.iter().any(|r| r.eq_ignore_ascii_case(address)) {
                recipients.push(address.to_string());
            }
        }

        Message {
            id: msg.id.unwrap_or_default(),
            subject: msg.subject.unwrap_or_default(),
            sender,
            recipients,
            received_at: non_empty(msg.received_date_time),
            sent_at: non_empty(msg.sent_date_time),
            thread_key: non_empty(msg.conversation_id),
            preview: msg.body_preview.unwrap_or_default(),
            folder,
        }
    }

    /// The sent timestamp when present, otherwise the received timestamp
    pub fn timestamp_text(&self) -> Option<&str> {
        self.sent_at.as_deref().or(self.received_at.as_deref())
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp_text().and_then(parse_instant)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Parse a textual instant into UTC. Offsets (`Z`, `+02:00`) are honoured;
/// zone-less values are read as UTC so naive and aware instants never mix.
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
