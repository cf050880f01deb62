use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use chrono::Utc;

use crate::{
    email::{
        client::{MailboxCredential, MessageSender, MessageSource, OutboundMail},
        message::{Folder, Message},
    },
    error::{BackendError, ReportError, ReportResult},
    model::user_profile::{OutlookTokens, ProfileStore, UserProfile},
    prompt::TextGenerator,
};

fn build_message(
    id: &str,
    thread: &str,
    sender: &str,
    recipients: &[&str],
    ts: &str,
    folder: Folder,
) -> Message {
    let ts = (!ts.is_empty()).then(|| ts.to_string());
    Message {
        id: id.to_string(),
        subject: "Site update".to_string(),
        sender: sender.to_string(),
        recipients: recipients.iter().map(|r| r.to_string()).collect(),
        received_at: ts.clone(),
        sent_at: match folder {
            Folder::Sent => ts,
            Folder::Inbox => None,
        },
        thread_key: (!thread.is_empty()).then(|| thread.to_string()),
        preview: format!("Preview of {id}"),
        folder,
    }
}

pub fn inbox_message(id: &str, thread: &str, sender: &str, recipients: &[&str], ts: &str) -> Message {
    build_message(id, thread, sender, recipients, ts, Folder::Inbox)
}

pub fn sent_message(id: &str, thread: &str, sender: &str, recipients: &[&str], ts: &str) -> Message {
    build_message(id, thread, sender, recipients, ts, Folder::Sent)
}

pub fn connected_profile(user_id: &str, email: &str, display_name: &str) -> UserProfile {
    UserProfile {
        user_id: user_id.to_string(),
        email: email.to_string(),
        display_name: display_name.to_string(),
        tenant_id: "tenant".to_string(),
        org_id: None,
        outlook_connected: true,
        outlook_tokens: OutlookTokens {
            access_token: Some(format!("token-{user_id}")),
            refresh_token: None,
        },
        follow_up_threshold_hours: 48,
        stale_info_days: 7,
        created_at: Utc::now().to_rfc3339(),
    }
}

/// Replays scripted responses in order and records every prompt it receives
#[derive(Default)]
pub struct FakeGenerator {
    responses: Mutex<VecDeque<Result<String, BackendError>>>,
    prompts: Mutex<Vec<(String, String)>>,
}

impl FakeGenerator {
    pub fn new(responses: Vec<Result<String, BackendError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            prompts: Mutex::default(),
        })
    }

    pub fn replying(text: &str) -> Arc<Self> {
        Self::new(vec![Ok(text.to_string())])
    }

    pub fn failing(error: BackendError) -> Arc<Self> {
        Self::new(vec![Err(error)])
    }

    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn generate_text(&self, system: &str, user: &str) -> Result<String, BackendError> {
        self.prompts
            .lock()
            .unwrap()
            .push((system.to_string(), user.to_string()));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(BackendError::Unavailable("no scripted response".into())))
    }
}

#[derive(Default)]
pub struct FakeSource {
    messages: Vec<Message>,
    failure: Option<String>,
    calls: Mutex<Vec<MailboxCredential>>,
}

impl FakeSource {
    pub fn with_messages(messages: Vec<Message>) -> Arc<Self> {
        Arc::new(Self {
            messages,
            ..Default::default()
        })
    }

    pub fn failing(reason: &str) -> Arc<Self> {
        Arc::new(Self {
            failure: Some(reason.to_string()),
            ..Default::default()
        })
    }

    pub fn calls(&self) -> Vec<MailboxCredential> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageSource for FakeSource {
    async fn list_recent_messages(
        &self,
        mailbox: &MailboxCredential,
        _window_days: i64,
    ) -> ReportResult<Vec<Message>> {
        self.calls.lock().unwrap().push(mailbox.clone());
        match &self.failure {
            Some(reason) => Err(ReportError::DataUnavailable(reason.clone())),
            None => Ok(self.messages.clone()),
        }
    }
}

#[derive(Default)]
pub struct FakeSender {
    fail: bool,
    sent: Mutex<Vec<OutboundMail>>,
}

impl FakeSender {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Default::default()
        })
    }

    pub fn sent(&self) -> Vec<OutboundMail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageSender for FakeSender {
    async fn send_message(
        &self,
        mail: &OutboundMail,
        _mailbox: &MailboxCredential,
    ) -> ReportResult<()> {
        self.sent.lock().unwrap().push(mail.clone());
        if self.fail {
            return Err(ReportError::SendFailed("503 Service Unavailable".into()));
        }
        Ok(())
    }
}

pub struct StaticProfiles(pub Vec<UserProfile>);

#[async_trait]
impl ProfileStore for StaticProfiles {
    async fn get(&self, user_id: &str) -> ReportResult<Option<UserProfile>> {
        Ok(self.0.iter().find(|p| p.user_id == user_id).cloned())
    }

    async fn connected_users(&self) -> ReportResult<Vec<UserProfile>> {
        Ok(self
            .0
            .iter()
            .filter(|p| p.outlook_connected)
            .cloned()
            .collect())
    }
}
