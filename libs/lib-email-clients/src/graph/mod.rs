pub mod api;
pub mod types;

pub use api::{MailFolder, GRAPH_DEFAULT_SCOPE, MESSAGE_SELECT_FIELDS};
pub use types::{
    ClientCredentialsTokenResponse, EmailAddress, GraphErrorResponse, GraphMessage, ItemBody,
    MessageCollection, OutgoingMessage, Recipient, SendMailRequest,
};
