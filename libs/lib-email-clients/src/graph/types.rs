use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub email_address: EmailAddress,
}

impl Recipient {
    pub fn from_address(address: &str) -> Self {
        Self {
            email_address: EmailAddress {
                name: None,
                address: Some(address.to_string()),
            },
        }
    }

    pub fn address(&self) -> Option<&str> {
        self.email_address.address.as_deref()
    }
}

/// Message as returned by `mailFolders/{folder}/messages` with the report `$select`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphMessage {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub body_preview: Option<String>,
    #[serde(default)]
    pub from: Option<Recipient>,
    #[serde(default)]
    pub to_recipients: Option<Vec<Recipient>>,
    #[serde(default)]
    pub cc_recipients: Option<Vec<Recipient>>,
    #[serde(default)]
    pub received_date_time: Option<String>,
    #[serde(default)]
    pub sent_date_time: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageCollection {
    #[serde(default)]
    pub value: Vec<GraphMessage>,
    #[serde(rename = "@odata.nextLink", default)]
    pub next_link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemBody {
    pub content_type: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    pub subject: String,
    pub body: ItemBody,
    pub to_recipients: Vec<Recipient>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMailRequest {
    pub message: OutgoingMessage,
    pub save_to_sent_items: bool,
}

impl SendMailRequest {
    pub fn plain_text(subject: &str, body: &str, to_addresses: &[String]) -> Self {
        Self {
            message: OutgoingMessage {
                subject: subject.to_string(),
                body: ItemBody {
                    content_type: "Text".to_string(),
                    content: body.to_string(),
                },
                to_recipients: to_addresses
                    .iter()
                    .map(|a| Recipient::from_address(a))
                    .collect(),
            },
            save_to_sent_items: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphErrorDetail {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphErrorResponse {
    pub error: GraphErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientCredentialsTokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_message_collection() {
        let json = r#"{
            "@odata.context": "https://graph.microsoft.com/v1.0/$metadata#users('me')/messages",
            "value": [{
                "id": "AAMk1",
                "subject": "Pour schedule",
                "bodyPreview": "Can we move the pour to Friday?",
                "from": {"emailAddress": {"name": "Vendor", "address": "vendor@x.com"}},
                "toRecipients": [{"emailAddress": {"address": "me@co.com"}}],
                "ccRecipients": [],
                "receivedDateTime": "2024-05-01T10:00:00Z",
                "sentDateTime": "2024-05-01T09:59:58Z",
                "conversationId": "conv-1"
            }],
            "@odata.nextLink": "https://graph.microsoft.com/v1.0/me/messages?$skip=10"
        }"#;

        let parsed: MessageCollection = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.value.len(), 1);
        let msg = &parsed.value[0];
        assert_eq!(msg.from.as_ref().and_then(|f| f.address()), Some("vendor@x.com"));
        assert_eq!(msg.conversation_id.as_deref(), Some("conv-1"));
        assert!(parsed.next_link.is_some());
    }

    #[test]
    fn test_parse_message_with_nulls() {
        let json = r#"{"id": "m", "subject": null, "toRecipients": null, "from": null}"#;
        let msg: GraphMessage = serde_json::from_str(json).unwrap();
        assert!(msg.subject.is_none());
        assert!(msg.to_recipients.is_none());
    }

    #[test]
    fn test_send_mail_request_shape() {
        let req = SendMailRequest::plain_text("Weekly", "Body", &["a@co.com".to_string()]);
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["saveToSentItems"], true);
        assert_eq!(value["message"]["body"]["contentType"], "Text");
        assert_eq!(
            value["message"]["toRecipients"][0]["emailAddress"]["address"],
            "a@co.com"
        );
    }
}
