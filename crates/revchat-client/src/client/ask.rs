//! One question/answer turn.

use std::sync::Arc;
use std::time::Duration;

use revchat_common::new_id;
use tokio::io::AsyncBufReadExt;
use tracing::{debug, warn};

use super::{ChatClient, ClientInner, LIST_PAGE_LIMIT};
use crate::cache::ConversationNode;
use crate::streaming::{classify_line, AnswerAccumulator, StreamFrame, StreamLine};
use crate::transport::{Body, HttpRequest};
use crate::wire::NextAction;
use crate::{truncate_body, Answer, ChatError};

#[derive(Debug, Clone, Default)]
pub struct AskRequest {
    pub prompt: String,
    /// Empty starts a new conversation.
    pub conversation_id: String,
    /// Empty means "reply to the latest message".
    pub parent_id: String,
    /// Empty uses the configured model.
    pub model: String,
    /// Deadline for the whole turn; `None` uses the client timeout.
    pub timeout: Option<Duration>,
}

impl AskRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn in_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = conversation_id.into();
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = parent_id.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl ClientInner {
    /// Parent message for the next turn in `conversation_id`.
    async fn resolve_parent(&self, conversation_id: &str) -> Result<String, ChatError> {
        if let Some(node) = self.cache.get(conversation_id) {
            let tip = node.current_node();
            if !tip.is_empty() {
                return Ok(tip);
            }
        }

        self.list_conversations(0, LIST_PAGE_LIMIT).await?;
        let Some(node) = self.cache.get(conversation_id) else {
            debug!(conversation_id, "conversation not listed, starting from a fresh parent");
            return Ok(new_id());
        };
        let tip = node.current_node();
        if !tip.is_empty() {
            return Ok(tip);
        }

        self.fetch_history(conversation_id).await?;
        let tip = node.current_node();
        if tip.is_empty() {
            warn!(conversation_id, "history has no current node, starting from a fresh parent");
            return Ok(new_id());
        }
        Ok(tip)
    }

    /// Record `message_id` as the tip of `conversation_id`.
    fn record_tip(&self, conversation_id: &str, message_id: &str) {
        if conversation_id.is_empty() {
            return;
        }
        let (node, created) = self.cache.get_or_insert_with(conversation_id, || {
            ConversationNode::with_tip(conversation_id, message_id)
        });
        if !created && !message_id.is_empty() {
            node.set_current_node(message_id);
        }
    }
}

impl ChatClient {
    /// Ask a question and stream the reply into `on_chunk`.
    ///
    /// `on_chunk` gets one `Ok` per frame, plus a closing `done` answer if
    /// the stream ended without one. If the call fails, the error is passed
    /// to `on_chunk` once and then returned.
    pub async fn ask<F>(&self, request: AskRequest, mut on_chunk: F) -> Result<(), ChatError>
    where
        F: FnMut(Result<&Answer, &ChatError>) + Send,
    {
        let result = self.run_turn(request, &mut on_chunk).await;
        if let Err(e) = &result {
            on_chunk(Err(e));
        }
        result
    }

    async fn run_turn<F>(&self, request: AskRequest, on_chunk: &mut F) -> Result<(), ChatError>
    where
        F: FnMut(Result<&Answer, &ChatError>) + Send,
    {
        if request.conversation_id.is_empty() && !request.parent_id.is_empty() {
            return Err(ChatError::InvalidArgument(
                "parent id given without a conversation id".into(),
            ));
        }

        let inner = &self.inner;
        let token = inner.ensure_token().await?;

        let parent_id = if request.conversation_id.is_empty() {
            new_id()
        } else if !request.parent_id.is_empty() {
            request.parent_id.clone()
        } else {
            inner.resolve_parent(&request.conversation_id).await?
        };
        let model = inner.config.resolve_model(&request.model);

        let body = NextAction::user_turn(
            new_id(),
            request.prompt,
            &request.conversation_id,
            parent_id.as_str(),
            model.as_str(),
        );
        let body = serde_json::to_value(&body).map_err(|e| ChatError::Protocol(e.to_string()))?;

        debug!(
            conversation_id = %request.conversation_id,
            parent_id = %parent_id,
            model = %model,
            "sending turn"
        );

        let http_request = HttpRequest::post(inner.url("conversation"))
            .headers(inner.api_headers(&token, "text/event-stream"))
            .headers([("Connection", "keep-alive"), ("Keep-Alive", "timeout=360")])
            .json(&body)
            .timeout(request.timeout.unwrap_or(inner.config.timeout));

        let response = inner.transport.execute(http_request).await?;
        if response.status != 200 {
            let status = response.status;
            let text = response.text().await.unwrap_or_default();
            return Err(ChatError::UpstreamBlocked {
                status,
                body: truncate_body(&text),
            });
        }

        let accumulator = AnswerAccumulator::new(request.conversation_id, parent_id);
        self.read_stream(response.into_body(), accumulator, on_chunk)
            .await
    }

    async fn read_stream<F>(
        &self,
        body: Body,
        mut accumulator: AnswerAccumulator,
        on_chunk: &mut F,
    ) -> Result<(), ChatError>
    where
        F: FnMut(Result<&Answer, &ChatError>) + Send,
    {
        let mut lines = body.lines();
        while let Some(line) = lines.next_line().await? {
            let payload = match classify_line(&line) {
                StreamLine::Skip => continue,
                StreamLine::Done => break,
                StreamLine::Frame(payload) => payload,
            };

            let frame = StreamFrame::parse(payload)?;
            if let Some(error) = &frame.error {
                warn!(error = %error, "server reported an error in the stream");
            }

            let answer = accumulator.apply(&frame);
            on_chunk(Ok(&answer));

            self.inner
                .record_tip(accumulator.conversation_id(), &frame.message_id);
            if frame.is_assistant_end_turn() {
                self.schedule_title(accumulator.conversation_id(), &frame.message_id);
            }
        }

        if let Some(answer) = accumulator.finish() {
            on_chunk(Ok(&answer));
        }
        Ok(())
    }

    fn schedule_title(&self, conversation_id: &str, message_id: &str) {
        if !self.inner.config.auto_title || conversation_id.is_empty() || message_id.is_empty() {
            return;
        }
        let inner = Arc::clone(&self.inner);
        let conversation_id = conversation_id.to_string();
        let message_id = message_id.to_string();
        self.background.submit("auto-title", async move {
            inner.auto_title(&conversation_id, &message_id).await
        });
    }
}
