//! Conversation titles.

use tracing::{debug, info};

use super::conversations::{expect_ok, parse_json};
use super::{ChatClient, ClientInner, LIST_PAGE_LIMIT, NEW_CHAT_TITLE};
use crate::transport::HttpRequest;
use crate::wire::{GenTitleRequest, GenTitleResponse, TitlePatch, TITLE_MODEL};
use crate::ChatError;

impl ClientInner {
    pub(crate) async fn generate_title(
        &self,
        conversation_id: &str,
        message_id: &str,
    ) -> Result<String, ChatError> {
        let token = self.ensure_token().await?;
        let body = serde_json::to_value(GenTitleRequest {
            message_id,
            model: TITLE_MODEL,
        })
        .map_err(|e| ChatError::Protocol(e.to_string()))?;
        let request = HttpRequest::post(self.url(&format!("conversation/gen_title/{conversation_id}")))
            .headers(self.api_headers(&token, "*/*"))
            .json(&body)
            .timeout(self.config.timeout);
        let body = expect_ok(self.transport.execute(request).await?, "generate title").await?;
        let response: GenTitleResponse = parse_json(&body, "generate title")?;
        if response.title.is_empty() {
            return Err(ChatError::Protocol("generate title: empty title".into()));
        }
        Ok(response.title)
    }

    pub(crate) async fn rename_conversation(
        &self,
        conversation_id: &str,
        title: &str,
    ) -> Result<(), ChatError> {
        let token = self.ensure_token().await?;
        let body = serde_json::to_value(TitlePatch { title })
            .map_err(|e| ChatError::Protocol(e.to_string()))?;
        let request = HttpRequest::patch(self.url(&format!("conversation/{conversation_id}")))
            .headers(self.api_headers(&token, "*/*"))
            .json(&body)
            .timeout(self.config.timeout);
        expect_ok(self.transport.execute(request).await?, "rename conversation").await?;
        if let Some(node) = self.cache.get(conversation_id) {
            node.set_title(title);
        }
        Ok(())
    }

    /// Name a conversation that still has the placeholder title.
    pub(crate) async fn auto_title(
        &self,
        conversation_id: &str,
        message_id: &str,
    ) -> Result<(), ChatError> {
        let Some(node) = self.cache.get(conversation_id) else {
            return Ok(());
        };
        if node.title().is_empty() {
            self.list_conversations(0, LIST_PAGE_LIMIT).await?;
        }
        let current = node.title();
        if current != NEW_CHAT_TITLE {
            debug!(conversation_id, title = %current, "conversation already titled");
            return Ok(());
        }

        let generated = self.generate_title(conversation_id, message_id).await?;
        let title = format!("{}{generated}", self.config.title_prefix);
        self.rename_conversation(conversation_id, &title).await?;
        info!(conversation_id, title = %title, "conversation titled");
        Ok(())
    }
}

impl ChatClient {
    /// Ask the server to suggest a title based on `message_id`.
    pub async fn generate_title(
        &self,
        conversation_id: &str,
        message_id: &str,
    ) -> Result<String, ChatError> {
        self.inner.generate_title(conversation_id, message_id).await
    }

    pub async fn rename_conversation(&self, conversation_id: &str, title: &str) -> Result<(), ChatError> {
        self.inner.rename_conversation(conversation_id, title).await
    }
}
