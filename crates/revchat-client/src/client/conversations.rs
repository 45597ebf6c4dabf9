//! Listing, history and visibility of conversations.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::{ChatClient, ClientInner};
use crate::cache::ConversationNode;
use crate::transport::{HttpRequest, HttpResponse};
use crate::wire::{ConversationList, VisibilityPatch};
use crate::{truncate_body, ChatError};

/// One entry of the conversation listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConversationSummary {
    pub id: String,
    pub title: String,
    pub create_time: Option<Value>,
    pub update_time: Option<Value>,
}

impl ConversationSummary {
    /// Summary of a raw listing entry. Missing, null or non-string fields
    /// read as empty; `None` when the entry has no id.
    pub fn from_listing(info: &Value) -> Option<Self> {
        let text = |key: &str| info.get(key).and_then(Value::as_str).unwrap_or_default();
        let time = |key: &str| info.get(key).filter(|v| !v.is_null()).cloned();
        let id = text("id");
        if id.is_empty() {
            return None;
        }
        Some(Self {
            id: id.to_string(),
            title: text("title").to_string(),
            create_time: time("create_time"),
            update_time: time("update_time"),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationPage {
    pub items: Vec<ConversationSummary>,
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
}

/// Fail with [`ChatError::UnexpectedStatus`] unless the status is 200.
pub(crate) async fn expect_ok(
    response: HttpResponse,
    context: &'static str,
) -> Result<String, ChatError> {
    let status = response.status;
    let body = response.text().await?;
    if status != 200 {
        return Err(ChatError::UnexpectedStatus {
            context,
            status,
            body: truncate_body(&body),
        });
    }
    Ok(body)
}

pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(
    body: &str,
    context: &str,
) -> Result<T, ChatError> {
    serde_json::from_str(body)
        .map_err(|e| ChatError::Protocol(format!("{context}: {e}: {}", truncate_body(body))))
}

impl ClientInner {
    pub(crate) async fn list_conversations(
        &self,
        offset: u32,
        limit: u32,
    ) -> Result<ConversationPage, ChatError> {
        let token = self.ensure_token().await?;
        let url = self.url(&format!("conversations?offset={offset}&limit={limit}"));
        let request = HttpRequest::get(url)
            .headers(self.api_headers(&token, "*/*"))
            .timeout(self.config.timeout);
        let body = expect_ok(self.transport.execute(request).await?, "list conversations").await?;
        let list: ConversationList = parse_json(&body, "list conversations")?;

        let mut items = Vec::with_capacity(list.items.len());
        for info in list.items {
            let Some(summary) = ConversationSummary::from_listing(&info) else {
                debug!("skipping conversation entry without id");
                continue;
            };
            // A node recorded by a concurrent turn keeps its tip.
            let (node, created) = self
                .cache
                .get_or_insert_with(&summary.id, || ConversationNode::from_listing(info.clone()));
            if !created {
                node.set_conversation_info(info);
            }
            items.push(summary);
        }
        debug!(count = items.len(), total = list.total, "conversations listed");

        Ok(ConversationPage {
            items,
            total: list.total,
            limit: list.limit,
            offset: list.offset,
        })
    }

    pub(crate) async fn fetch_history(&self, conversation_id: &str) -> Result<(), ChatError> {
        let node = self
            .cache
            .get(conversation_id)
            .ok_or_else(|| ChatError::NotFound(format!("conversation {conversation_id}")))?;
        let token = self.ensure_token().await?;
        let request = HttpRequest::get(self.url(&format!("conversation/{conversation_id}")))
            .headers(self.api_headers(&token, "*/*"))
            .timeout(self.config.timeout);
        let body = expect_ok(self.transport.execute(request).await?, "fetch history").await?;
        let history: Value = parse_json(&body, "fetch history")?;
        node.set_history(history);
        Ok(())
    }

    async fn hide(&self, path: &str, context: &'static str) -> Result<(), ChatError> {
        let token = self.ensure_token().await?;
        let body = serde_json::to_value(VisibilityPatch { is_visible: false })
            .map_err(|e| ChatError::Protocol(e.to_string()))?;
        let request = HttpRequest::patch(self.url(path))
            .headers(self.api_headers(&token, "*/*"))
            .json(&body)
            .timeout(self.config.timeout);
        expect_ok(self.transport.execute(request).await?, context).await?;
        Ok(())
    }
}

impl ChatClient {
    /// One page of the account's conversations. Listed conversations are
    /// added to the cache or have their listing snapshot refreshed.
    pub async fn list_conversations(
        &self,
        offset: u32,
        limit: u32,
    ) -> Result<ConversationPage, ChatError> {
        self.inner.list_conversations(offset, limit).await
    }

    /// Load the full message history of a cached conversation.
    pub async fn fetch_history(&self, conversation_id: &str) -> Result<(), ChatError> {
        self.inner.fetch_history(conversation_id).await
    }

    /// Hide one conversation.
    pub async fn delete_conversation(&self, conversation_id: &str) -> Result<(), ChatError> {
        self.inner
            .hide(&format!("conversation/{conversation_id}"), "delete conversation")
            .await?;
        self.inner.cache.remove(conversation_id);
        Ok(())
    }

    /// Hide every conversation.
    pub async fn clear_conversations(&self) -> Result<(), ChatError> {
        self.inner
            .hide("conversations", "clear conversations")
            .await?;
        self.inner.cache.clear();
        Ok(())
    }
}
