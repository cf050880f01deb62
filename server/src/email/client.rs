use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use lib_email_clients::graph::{
    api, ClientCredentialsTokenResponse, GraphErrorResponse, MailFolder, MessageCollection,
    SendMailRequest, GRAPH_DEFAULT_SCOPE, MESSAGE_SELECT_FIELDS,
};

use crate::{
    error::{ReportError, ReportResult},
    model::user_profile::UserProfile,
    server_config::GraphSettings,
    HttpClient,
};

use super::message::{Folder, Message};

/// Credential a mailbox is accessed with
#[derive(Clone)]
pub enum MailboxCredential {
    /// A user's own bearer token, addressing `/me`
    Delegated(String),
    /// The application's client-credentials token, addressing the configured mailbox
    Application,
}

impl std::fmt::Debug for MailboxCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MailboxCredential::Delegated(_) => write!(f, "Delegated(..)"),
            MailboxCredential::Application => write!(f, "Application"),
        }
    }
}

impl MailboxCredential {
    pub fn for_profile(profile: &UserProfile) -> Self {
        match profile.delegated_access_token() {
            Some(token) => MailboxCredential::Delegated(token.to_string()),
            None => MailboxCredential::Application,
        }
    }
}

#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Inbox and sent messages for one mailbox. Ordering is not guaranteed.
    async fn list_recent_messages(
        &self,
        mailbox: &MailboxCredential,
        window_days: i64,
    ) -> ReportResult<Vec<Message>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMail {
    pub subject: String,
    pub body_text: String,
    pub recipients: Vec<String>,
}

#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_message(&self, mail: &OutboundMail, mailbox: &MailboxCredential)
        -> ReportResult<()>;
}

#[derive(Clone)]
pub struct AppCredentials {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub mailbox_user_id: String,
}

#[derive(Clone)]
pub struct GraphMailClient {
    http_client: HttpClient,
    base_url: String,
    authority_url: String,
    fetch_limit: u32,
    timeout: Duration,
    app: Option<AppCredentials>,
}

impl GraphMailClient {
    pub fn new(
        http_client: HttpClient,
        settings: &GraphSettings,
        fetch_limit: u32,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let app = match &settings.app {
            Some(app) => Some(AppCredentials {
                tenant_id: app.tenant_id.clone(),
                client_id: app.client_id.clone(),
                client_secret: std::env::var(&app.client_secret_env).with_context(|| {
                    format!("{} is required for app-only Graph access", app.client_secret_env)
                })?,
                mailbox_user_id: app.mailbox_user_id.clone(),
            }),
            None => None,
        };

        Ok(Self::with_app_credentials(
            http_client,
            &settings.base_url,
            &settings.authority_url,
            fetch_limit,
            timeout,
            app,
        ))
    }

    pub fn with_app_credentials(
        http_client: HttpClient,
        base_url: &str,
        authority_url: &str,
        fetch_limit: u32,
        timeout: Duration,
        app: Option<AppCredentials>,
    ) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            authority_url: authority_url.trim_end_matches('/').to_string(),
            fetch_limit,
            timeout,
            app,
        }
    }

    /// Resolve the mailbox base path and bearer token for a credential
    async fn authorize(&self, mailbox: &MailboxCredential) -> anyhow::Result<(String, String)> {
        match mailbox {
            MailboxCredential::Delegated(token) => {
                Ok((api::mailbox_base(&self.base_url, None), token.clone()))
            }
            MailboxCredential::Application => {
                let app = self.app.as_ref().ok_or_else(|| {
                    anyhow!("No app mailbox configured and no delegated access token provided")
                })?;
                let token = self.app_access_token(app).await?;
                Ok((
                    api::mailbox_base(&self.base_url, Some(&app.mailbox_user_id)),
                    token,
                ))
            }
        }
    }

    async fn app_access_token(&self, app: &AppCredentials) -> anyhow::Result<String> {
        let token_url = api::token_endpoint(&self.authority_url, &app.tenant_id);
        let resp = self
            .http_client
            .post(&token_url)
            .timeout(self.timeout)
            .form(&[
                ("client_id", app.client_id.as_str()),
                ("client_secret", app.client_secret.as_str()),
                ("grant_type", "client_credentials"),
                ("scope", GRAPH_DEFAULT_SCOPE),
            ])
            .send()
            .await
            .context("Could not reach token endpoint")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            tracing::error!("Failed to acquire app token ({}): {}", status, body);
            bail!("Failed to acquire app token ({})", status);
        }

        let token = resp
            .json::<ClientCredentialsTokenResponse>()
            .await
            .context("Unexpected token response")?;

        Ok(token.access_token)
    }

    async fn list_folder(
        &self,
        mailbox_base: &str,
        token: &str,
        folder: MailFolder,
        window_days: i64,
    ) -> anyhow::Result<MessageCollection> {
        let field = folder.timestamp_field();
        let cutoff = (Utc::now() - chrono::Duration::days(window_days))
            .to_rfc3339_opts(SecondsFormat::Secs, true);

        let resp = self
            .http_client
            .get(folder.messages_path(mailbox_base))
            .bearer_auth(token)
            .timeout(self.timeout)
            .query(&[
                ("$top", self.fetch_limit.to_string()),
                ("$orderby", format!("{field} desc")),
                ("$select", MESSAGE_SELECT_FIELDS.to_string()),
                ("$filter", format!("{field} ge {cutoff}")),
            ])
            .send()
            .await
            .with_context(|| format!("Could not list {}", folder.well_known_name()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!(
                "Graph returned {} listing {}: {}",
                status,
                folder.well_known_name(),
                graph_error_message(body)
            );
        }

        resp.json::<MessageCollection>()
            .await
            .with_context(|| format!("Unexpected {} response", folder.well_known_name()))
    }
}

/// The `error.code: message` of a Graph error body, or the raw body
fn graph_error_message(body: String) -> String {
    match serde_json::from_str::<GraphErrorResponse>(&body) {
        Ok(GraphErrorResponse { error }) => format!("{}: {}", error.code, error.message),
        Err(_) => body,
    }
}

#[async_trait]
impl MessageSource for GraphMailClient {
    async fn list_recent_messages(
        &self,
        mailbox: &MailboxCredential,
        window_days: i64,
    ) -> ReportResult<Vec<Message>> {
        let fetch = async {
            let (base, token) = self.authorize(mailbox).await?;
            let inbox = self
                .list_folder(&base, &token, MailFolder::Inbox, window_days)
                .await?;
            let sent = self
                .list_folder(&base, &token, MailFolder::SentItems, window_days)
                .await?;
            Ok::<_, anyhow::Error>((inbox, sent))
        };

        let (inbox, sent) = fetch.await.map_err(|e| {
            tracing::error!("Mailbox fetch failed: {:?}", e);
            ReportError::DataUnavailable(format!("mailbox fetch failed: {e:#}"))
        })?;

        let messages = inbox
            .value
            .into_iter()
            .map(|m| Message::from_graph(m, Folder::Inbox))
            .chain(
                sent.value
                    .into_iter()
                    .map(|m| Message::from_graph(m, Folder::Sent)),
            )
            .collect::<Vec<_>>();

        tracing::info!("Fetched {} messages ({:?})", messages.len(), mailbox);
        Ok(messages)
    }
}

#[async_trait]
impl MessageSender for GraphMailClient {
    async fn send_message(
        &self,
        mail: &OutboundMail,
        mailbox: &MailboxCredential,
    ) -> ReportResult<()> {
        let send = async {
            let (base, token) = self.authorize(mailbox).await?;
            let payload =
                SendMailRequest::plain_text(&mail.subject, &mail.body_text, &mail.recipients);

            let resp = self
                .http_client
                .post(api::send_mail_path(&base))
                .bearer_auth(&token)
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await
                .context("Could not reach sendMail")?;

            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                bail!("Graph sendMail failed ({}): {}", status, graph_error_message(body));
            }
            Ok::<_, anyhow::Error>(())
        };

        send.await.map_err(|e| {
            tracing::error!("Send failed: {:?}", e);
            ReportError::SendFailed(format!("{e:#}"))
        })?;

        tracing::info!("Sent \"{}\" to {:?}", mail.subject, mail.recipients);
        Ok(())
    }
}
