use std::sync::Arc;

use indoc::formatdoc;
use serde::{Deserialize, Serialize};

use crate::{
    email::conversation::Conversation,
    error::{BackendError, ParseDegraded},
    server_config::ReportSettings,
};

use super::{strip_code_fence, TextGenerator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WhoOwesNext {
    Company,
    External,
    #[serde(rename = "none")]
    Nobody,
}

/// Urgency on a 1 (low) to 5 (critical) scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Urgency(u8);

impl Urgency {
    pub fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Urgency {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1..=5 => Ok(Urgency(value as u8)),
            _ => Err(format!("urgency {value} is outside 1..=5")),
        }
    }
}

impl From<Urgency> for i64 {
    fn from(urgency: Urgency) -> Self {
        urgency.0 as i64
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThreadInsight {
    pub thread_key: String,
    pub topic: String,
    pub main_parties: Vec<String>,
    pub status: InsightStatus,
    pub follow_up_needed: bool,
    pub who_owes_next: WhoOwesNext,
    pub urgency: Urgency,
    pub summary: String,
}

/// Model-extracted view of the week's threads. Empty when extraction degrades.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StructuredInsight {
    pub threads: Vec<ThreadInsight>,
    pub overall_insights: Vec<String>,
    pub follow_ups_needed: Vec<String>,
}

impl StructuredInsight {
    pub fn is_empty(&self) -> bool {
        self.threads.is_empty() && self.overall_insights.is_empty() && self.follow_ups_needed.is_empty()
    }
}

pub fn system_prompt() -> String {
    formatdoc! {r#"
        You are an operations analyst for a construction and services company.
        You read recent email conversations and extract a structured view of what is happening.

        Respond only with a JSON object with exactly these keys:
        - threads: an array with one object per conversation, each with exactly these keys:
          - thread_key: the conversation's thread key, copied verbatim
          - topic: a short description of what the conversation is about
          - main_parties: an array of the people or companies involved
          - status: "open" or "closed"
          - follow_up_needed: true or false
          - who_owes_next: "company" if our side owes the next reply, "external" if the other side does, "none" otherwise
          - urgency: an integer from 1 (low) to 5 (critical)
          - summary: one or two sentences
        - overall_insights: an array of short strings describing patterns across conversations
        - follow_ups_needed: an array of thread_key values that need a follow-up

        Do not add other keys. Do not provide explanations."#}
}

/// Render the busiest conversations, and their latest messages, for the extraction prompt
pub fn insight_user_prompt(
    conversations: &[Conversation],
    max_conversations: usize,
    messages_per_conversation: usize,
) -> String {
    let sections = conversations
        .iter()
        .take(max_conversations)
        .enumerate()
        .map(|(i, conversation)| {
            let lines = conversation
                .tail(messages_per_conversation)
                .iter()
                .map(|m| {
                    format!(
                        "From: {} | To: {} | Subject: {} | Preview: {}",
                        m.sender,
                        m.recipients.join(", "),
                        m.subject,
                        m.preview.replace(['\r', '\n'], " ")
                    )
                })
                .collect::<Vec<_>>()
                .join("\n");
            format!(
                "### Conversation {} (thread_key: {}, messages: {})\n{}",
                i + 1,
                conversation.thread_key(),
                conversation.message_count(),
                lines
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Extract the structured view of the following email conversations.\n\n{}",
        sections
    )
}

/// Strict schema-checked parse of the extraction output
pub fn parse_structured_insight(raw: &str) -> Result<StructuredInsight, ParseDegraded> {
    let body = strip_code_fence(raw);
    if body.is_empty() {
        return Err(ParseDegraded("empty response".to_string()));
    }
    serde_json::from_str::<StructuredInsight>(body).map_err(|e| ParseDegraded(e.to_string()))
}

pub struct InsightExtractor {
    generator: Arc<dyn TextGenerator>,
    max_conversations: usize,
    messages_per_conversation: usize,
}

impl InsightExtractor {
    pub fn new(generator: Arc<dyn TextGenerator>, settings: &ReportSettings) -> Self {
        Self {
            generator,
            max_conversations: settings.max_prompt_conversations,
            messages_per_conversation: settings.messages_per_conversation,
        }
    }

    /// Backend failures propagate. An empty reply, or output that does not
    /// match the schema, degrades to the empty insight.
    pub async fn extract(
        &self,
        conversations: &[Conversation],
    ) -> Result<StructuredInsight, BackendError> {
        if conversations.is_empty() {
            tracing::info!("No conversations, skipping insight extraction");
            return Ok(StructuredInsight::default());
        }

        let user_prompt = insight_user_prompt(
            conversations,
            self.max_conversations,
            self.messages_per_conversation,
        );
        let raw = match self
            .generator
            .generate_text(&system_prompt(), &user_prompt)
            .await
        {
            Ok(raw) => raw,
            Err(BackendError::EmptyResponse) => {
                tracing::warn!("Structured insight response was empty");
                return Ok(StructuredInsight::default());
            }
            Err(e) => return Err(e),
        };

        match parse_structured_insight(&raw) {
            Ok(insight) => {
                tracing::info!(
                    "Extracted insights for {} threads, {} follow-ups",
                    insight.threads.len(),
                    insight.follow_ups_needed.len()
                );
                Ok(insight)
            }
            Err(e) => {
                tracing::warn!("Could not parse structured insight response: {}", e);
                Ok(StructuredInsight::default())
            }
        }
    }
}
