//! JSON bodies exchanged with the backend API.

use serde::{Deserialize, Serialize};

/// Model used for generated titles.
pub const TITLE_MODEL: &str = "text-davinci-002-render";

/// Body of `POST conversation`.
#[derive(Debug, Clone, Serialize)]
pub struct NextAction {
    pub action: &'static str,
    pub messages: Vec<PromptMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    pub parent_message_id: String,
    pub model: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PromptMessage {
    pub id: String,
    pub role: &'static str,
    pub author: Author,
    pub content: PromptContent,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Author {
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PromptContent {
    pub content_type: &'static str,
    pub parts: Vec<String>,
}

impl NextAction {
    /// A user turn. An empty conversation id starts a new conversation.
    pub fn user_turn(
        message_id: impl Into<String>,
        prompt: impl Into<String>,
        conversation_id: &str,
        parent_message_id: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            action: "next",
            messages: vec![PromptMessage {
                id: message_id.into(),
                role: "user",
                author: Author {
                    role: "user".into(),
                },
                content: PromptContent {
                    content_type: "text",
                    parts: vec![prompt.into()],
                },
            }],
            conversation_id: (!conversation_id.is_empty()).then(|| conversation_id.to_string()),
            parent_message_id: parent_message_id.into(),
            model: model.into(),
        }
    }
}

/// One page of `GET conversations`. Items stay raw so they can be cached
/// as listing snapshots.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ConversationList {
    #[serde(default)]
    pub items: Vec<serde_json::Value>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenTitleRequest<'a> {
    pub message_id: &'a str,
    pub model: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenTitleResponse {
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TitlePatch<'a> {
    pub title: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct VisibilityPatch {
    pub is_visible: bool,
}
