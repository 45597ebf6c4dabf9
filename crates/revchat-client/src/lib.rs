//! Reverse-engineered ChatGPT web client.
//!
//! Provides:
//! - A browser-like HTTP transport with a shared cookie jar and proxy support
//! - The multi-step web login that yields an access token
//! - A per-conversation cache of tips, titles and history snapshots
//! - Streamed question/answer turns delivered through a callback
//! - Conversation management (list, history, delete, clear, title)

pub mod auth;
pub mod background;
pub mod cache;
pub mod client;
pub mod streaming;
pub mod transport;
pub mod wire;

#[cfg(test)]
pub(crate) mod testing;

pub use auth::{AuthEndpoints, AuthError, AuthStep, AuthTokens, Authenticator, Credentials};
pub use background::BackgroundTasks;
pub use cache::{ConversationCache, ConversationNode};
pub use client::{AskRequest, ChatClient, ClientConfig, ConversationPage, ConversationSummary};
pub use transport::{HttpRequest, HttpResponse, SessionTransport, Transport, TransportError};

/// One streamed fragment of an assistant reply.
///
/// `text` is the full reply so far, `delta` is what this fragment added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Answer {
    pub conversation_id: String,
    pub message_id: String,
    /// Message this turn was posted under.
    pub parent_id: String,
    pub delta: String,
    pub text: String,
    pub done: bool,
    /// Starts at 1 and increases by one per callback invocation within a turn.
    pub chunk_index: usize,
    /// `finish_details.type` of the final frame, empty until known.
    pub finish_reason: String,
    /// Error the server reported in this frame, if any.
    pub error: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("login failed: {0}")]
    Auth(#[from] AuthError),

    #[error("rate limited, try again later")]
    RateLimited,

    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("no credentials: set email and password, an access token, or a session token")]
    MissingCredentials,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("upstream rejected the request: HTTP {status}: {body}")]
    UpstreamBlocked { status: u16, body: String },

    #[error("{context}: HTTP {status}: {body}")]
    UnexpectedStatus {
        context: &'static str,
        status: u16,
        body: String,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("stream read error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChatError {
    /// Failures raised while obtaining an access token.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            ChatError::Auth(_)
                | ChatError::RateLimited
                | ChatError::InvalidCredentials(_)
                | ChatError::MissingCredentials
        )
    }
}

/// Keep error bodies short enough for a log line.
pub(crate) fn truncate_body(text: &str) -> String {
    text.chars().take(200).collect()
}
