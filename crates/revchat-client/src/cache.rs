//! Per-conversation state remembered between turns.
//!
//! A node stores explicit values (conversation id, tip, title) plus the last
//! raw listing entry and history payload seen for the conversation. Explicit
//! values win; when one is empty the accessor falls back to the matching
//! field of the cached payload without modifying the node.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;

#[derive(Default)]
struct NodeState {
    conversation_id: String,
    current_node: String,
    title: String,
    /// Entry from the conversation listing.
    conversation_info: Option<Arc<Value>>,
    /// Full message history payload.
    history: Option<Arc<Value>>,
}

#[derive(Default)]
pub struct ConversationNode {
    state: Mutex<NodeState>,
}

fn blob_field(blob: Option<&Arc<Value>>, key: &str) -> String {
    blob.and_then(|v| v.get(key))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn explicit_or(explicit: &str, blob: Option<&Arc<Value>>, key: &str) -> String {
    if explicit.is_empty() {
        blob_field(blob, key)
    } else {
        explicit.to_string()
    }
}

impl ConversationNode {
    pub fn new(conversation_id: impl Into<String>) -> Self {
        let node = Self::default();
        node.lock().conversation_id = conversation_id.into();
        node
    }

    /// Node for a conversation whose latest message is already known.
    pub fn with_tip(conversation_id: impl Into<String>, tip: impl Into<String>) -> Self {
        let node = Self::new(conversation_id);
        node.lock().current_node = tip.into();
        node
    }

    /// Node built from one entry of the conversation listing.
    pub fn from_listing(info: Value) -> Self {
        let node = Self::default();
        node.lock().conversation_info = Some(Arc::new(info));
        node
    }

    fn lock(&self) -> MutexGuard<'_, NodeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn conversation_id(&self) -> String {
        let state = self.lock();
        explicit_or(
            &state.conversation_id,
            state.conversation_info.as_ref(),
            "id",
        )
    }

    /// An empty id also drops the cached listing entry.
    pub fn set_conversation_id(&self, id: impl Into<String>) {
        let id = id.into();
        let mut state = self.lock();
        if id.is_empty() {
            state.conversation_info = None;
        }
        state.conversation_id = id;
    }

    /// Id of the latest message, the parent for the next turn.
    pub fn current_node(&self) -> String {
        let state = self.lock();
        explicit_or(&state.current_node, state.history.as_ref(), "current_node")
    }

    /// An empty tip also drops the cached history.
    pub fn set_current_node(&self, id: impl Into<String>) {
        let id = id.into();
        let mut state = self.lock();
        if id.is_empty() {
            state.history = None;
        }
        state.current_node = id;
    }

    pub fn title(&self) -> String {
        let state = self.lock();
        explicit_or(&state.title, state.conversation_info.as_ref(), "title")
    }

    /// An empty title also drops the cached listing entry.
    pub fn set_title(&self, title: impl Into<String>) {
        let title = title.into();
        let mut state = self.lock();
        if title.is_empty() {
            state.conversation_info = None;
        }
        state.title = title;
    }

    pub fn conversation_info(&self) -> Option<Arc<Value>> {
        self.lock().conversation_info.clone()
    }

    pub fn set_conversation_info(&self, info: Value) {
        self.lock().conversation_info = Some(Arc::new(info));
    }

    pub fn history(&self) -> Option<Arc<Value>> {
        self.lock().history.clone()
    }

    pub fn set_history(&self, history: Value) {
        self.lock().history = Some(Arc::new(history));
    }
}

impl std::fmt::Debug for ConversationNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("ConversationNode")
            .field("conversation_id", &state.conversation_id)
            .field("current_node", &state.current_node)
            .field("title", &state.title)
            .field("has_info", &state.conversation_info.is_some())
            .field("has_history", &state.history.is_some())
            .finish()
    }
}

/// Conversation id to node. Nodes are shared, so updates made through a
/// handle are visible to every other holder.
#[derive(Debug, Default)]
pub struct ConversationCache {
    nodes: Mutex<HashMap<String, Arc<ConversationNode>>>,
}

impl ConversationCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<ConversationNode>>> {
        self.nodes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, conversation_id: &str) -> Option<Arc<ConversationNode>> {
        self.lock().get(conversation_id).cloned()
    }

    /// Insert or replace.
    pub fn put(&self, conversation_id: impl Into<String>, node: ConversationNode) -> Arc<ConversationNode> {
        let node = Arc::new(node);
        self.lock().insert(conversation_id.into(), Arc::clone(&node));
        node
    }

    /// Existing node, or a new one from `make`. The flag is true when the
    /// node was created by this call.
    pub fn get_or_insert_with(
        &self,
        conversation_id: &str,
        make: impl FnOnce() -> ConversationNode,
    ) -> (Arc<ConversationNode>, bool) {
        let mut nodes = self.lock();
        if let Some(node) = nodes.get(conversation_id) {
            return (Arc::clone(node), false);
        }
        let node = Arc::new(make());
        nodes.insert(conversation_id.to_string(), Arc::clone(&node));
        (node, true)
    }

    pub fn remove(&self, conversation_id: &str) -> Option<Arc<ConversationNode>> {
        self.lock().remove(conversation_id)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }
}
