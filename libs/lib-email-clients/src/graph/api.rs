pub const GRAPH_DEFAULT_SCOPE: &str = "https://graph.microsoft.com/.default";

pub const MESSAGE_SELECT_FIELDS: &str = "subject,bodyPreview,from,toRecipients,ccRecipients,receivedDateTime,sentDateTime,conversationId,id";

/// Mail folders read when building a report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailFolder {
    Inbox,
    SentItems,
}

impl MailFolder {
    /// Well-known folder name used in `mailFolders/{name}/messages`
    pub fn well_known_name(&self) -> &'static str {
        match self {
            MailFolder::Inbox => "Inbox",
            MailFolder::SentItems => "SentItems",
        }
    }

    /// Timestamp property the folder is ordered and filtered by
    pub fn timestamp_field(&self) -> &'static str {
        match self {
            MailFolder::Inbox => "receivedDateTime",
            MailFolder::SentItems => "sentDateTime",
        }
    }

    pub fn messages_path(&self, mailbox_base: &str) -> String {
        format!(
            "{}/mailFolders/{}/messages",
            mailbox_base.trim_end_matches('/'),
            self.well_known_name()
        )
    }
}

/// Base path for a mailbox: `/me` for delegated tokens, `/users/{id}` otherwise
pub fn mailbox_base(graph_url: &str, app_user_id: Option<&str>) -> String {
    let graph_url = graph_url.trim_end_matches('/');
    match app_user_id {
        Some(user_id) => format!("{}/users/{}", graph_url, user_id),
        None => format!("{}/me", graph_url),
    }
}

pub fn send_mail_path(mailbox_base: &str) -> String {
    format!("{}/sendMail", mailbox_base.trim_end_matches('/'))
}

pub fn token_endpoint(authority_url: &str, tenant_id: &str) -> String {
    format!(
        "{}/{}/oauth2/v2.0/token",
        authority_url.trim_end_matches('/'),
        tenant_id
    )
}
