//! Event-stream decoding for conversation turns.
//!
//! The backend sends one JSON frame per `data: ` line, each carrying the
//! whole reply so far, and ends with `data: [DONE]`. This module turns those
//! lines into [`StreamFrame`]s and the frames into incremental [`Answer`]s.

use serde::Deserialize;

use crate::wire::Author;
use crate::{truncate_body, Answer, ChatError};

pub const DONE_SENTINEL: &str = "data: [DONE]";
const DATA_PREFIX: &str = "data: ";
/// Anything shorter cannot hold a frame.
const MIN_LINE_LEN: usize = 6;

#[derive(Debug, PartialEq, Eq)]
pub enum StreamLine<'a> {
    Skip,
    Done,
    Frame(&'a str),
}

pub fn classify_line(line: &str) -> StreamLine<'_> {
    let line = line.trim_end_matches('\r');
    if line.len() < MIN_LINE_LEN {
        return StreamLine::Skip;
    }
    if line == DONE_SENTINEL {
        return StreamLine::Done;
    }
    if let Some(payload) = line.strip_prefix(DATA_PREFIX) {
        return StreamLine::Frame(payload);
    }
    if line.starts_with(':')
        || line.starts_with("event:")
        || line.starts_with("id:")
        || line.starts_with("retry:")
    {
        return StreamLine::Skip;
    }
    // Not an event-stream field; let the parser report it.
    StreamLine::Frame(line)
}

#[derive(Debug, Deserialize, Default)]
struct RawFrame {
    #[serde(default)]
    message: Option<RawMessage>,
    #[serde(default)]
    conversation_id: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RawMessage {
    #[serde(default)]
    id: String,
    #[serde(default)]
    author: Author,
    #[serde(default)]
    content: Option<RawContent>,
    #[serde(default)]
    end_turn: Option<bool>,
    #[serde(default)]
    metadata: Option<RawMetadata>,
}

#[derive(Debug, Deserialize, Default)]
struct RawContent {
    #[serde(default)]
    parts: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize, Default)]
struct RawMetadata {
    #[serde(default)]
    model_slug: Option<String>,
    #[serde(default)]
    finish_details: Option<RawFinish>,
}

#[derive(Debug, Deserialize, Default)]
struct RawFinish {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    stop: Option<String>,
}

/// One decoded frame of a turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamFrame {
    pub message_id: String,
    pub role: String,
    pub end_turn: bool,
    pub parts: Vec<String>,
    pub conversation_id: String,
    /// `finish_details.type`, e.g. `stop` or `max_tokens`.
    pub finish_type: String,
    /// `finish_details.stop`, the stop token.
    pub stop: String,
    pub model: String,
    pub error: Option<String>,
}

impl StreamFrame {
    pub fn parse(payload: &str) -> Result<Self, ChatError> {
        let raw: RawFrame = serde_json::from_str(payload).map_err(|e| {
            ChatError::Protocol(format!("{e}: {}", truncate_body(payload)))
        })?;
        let message = raw.message.unwrap_or_default();
        let metadata = message.metadata.unwrap_or_default();
        let finish = metadata.finish_details.unwrap_or_default();
        let parts = message
            .content
            .unwrap_or_default()
            .parts
            .into_iter()
            .filter_map(|p| match p {
                serde_json::Value::String(s) => Some(s),
                _ => None,
            })
            .collect();

        Ok(Self {
            message_id: message.id,
            role: message.author.role,
            end_turn: message.end_turn.unwrap_or(false),
            parts,
            conversation_id: raw.conversation_id.unwrap_or_default(),
            finish_type: finish.kind.unwrap_or_default(),
            stop: finish.stop.unwrap_or_default(),
            model: metadata.model_slug.unwrap_or_default(),
            error: raw.error.filter(|e| !e.is_empty()),
        })
    }

    pub fn text(&self) -> String {
        self.parts.concat()
    }

    pub fn finish_reason(&self) -> &str {
        if self.finish_type.is_empty() {
            &self.stop
        } else {
            &self.finish_type
        }
    }

    pub fn is_assistant_end_turn(&self) -> bool {
        self.end_turn && self.role == "assistant"
    }
}

/// Turns cumulative frames into deltas for one turn.
///
/// Frames repeat the whole text of their message. When the turn moves on to
/// another message, or a message is rewritten rather than extended, the text
/// seen so far is kept and the new text is appended after it, so the
/// accumulated text only grows and always equals the concatenated deltas.
#[derive(Debug, Default)]
pub struct AnswerAccumulator {
    conversation_id: String,
    parent_id: String,
    message_id: String,
    /// Text of earlier messages in this turn.
    committed: String,
    /// Text of the current message.
    current: String,
    text: String,
    finish_reason: String,
    chunks: usize,
    final_sent: bool,
}

impl AnswerAccumulator {
    pub fn new(conversation_id: impl Into<String>, parent_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            parent_id: parent_id.into(),
            ..Default::default()
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn apply(&mut self, frame: &StreamFrame) -> Answer {
        if self.conversation_id.is_empty() {
            self.conversation_id = frame.conversation_id.clone();
        }

        let new_message = !frame.message_id.is_empty()
            && !self.message_id.is_empty()
            && frame.message_id != self.message_id;
        if new_message {
            self.commit();
        }

        let new_text = frame.text();
        let delta = if let Some(suffix) = new_text.strip_prefix(self.current.as_str()) {
            let delta = suffix.to_string();
            self.current = new_text;
            delta
        } else if self.current.starts_with(new_text.as_str()) {
            // Stale repeat of an earlier frame.
            String::new()
        } else {
            self.commit();
            self.current = new_text.clone();
            new_text
        };
        self.text.push_str(&delta);

        if !frame.message_id.is_empty() {
            self.message_id = frame.message_id.clone();
        }
        if !frame.finish_reason().is_empty() {
            self.finish_reason = frame.finish_reason().to_string();
        }

        let done = !frame.finish_reason().is_empty();
        self.final_sent = done;
        self.answer(delta, done, frame.error.clone())
    }

    /// Closing answer for a stream that ended without a final frame.
    pub fn finish(&mut self) -> Option<Answer> {
        if self.chunks == 0 || self.final_sent {
            return None;
        }
        self.final_sent = true;
        Some(self.answer(String::new(), true, None))
    }

    fn commit(&mut self) {
        self.committed.push_str(&self.current);
        self.current.clear();
    }

    fn answer(&mut self, delta: String, done: bool, error: Option<String>) -> Answer {
        self.chunks += 1;
        Answer {
            conversation_id: self.conversation_id.clone(),
            message_id: self.message_id.clone(),
            parent_id: self.parent_id.clone(),
            delta,
            text: self.text.clone(),
            done,
            chunk_index: self.chunks,
            finish_reason: self.finish_reason.clone(),
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(id: &str, text: &str, finish: Option<&str>) -> StreamFrame {
        StreamFrame {
            message_id: id.into(),
            role: "assistant".into(),
            parts: vec![text.into()],
            conversation_id: "c-1".into(),
            finish_type: finish.unwrap_or_default().into(),
            end_turn: finish.is_some(),
            ..Default::default()
        }
    }

    #[test]
    fn classify_lines() {
        assert_eq!(classify_line(""), StreamLine::Skip);
        assert_eq!(classify_line("data:"), StreamLine::Skip);
        assert_eq!(classify_line("data: [DONE]"), StreamLine::Done);
        assert_eq!(classify_line("data: [DONE]\r"), StreamLine::Done);
        assert_eq!(classify_line(": ping 123"), StreamLine::Skip);
        assert_eq!(classify_line("event: delta"), StreamLine::Skip);
        assert_eq!(classify_line("retry: 3000"), StreamLine::Skip);
        assert_eq!(classify_line("data: {\"a\":1}"), StreamLine::Frame("{\"a\":1}"));
        assert_eq!(classify_line("garbage!"), StreamLine::Frame("garbage!"));
    }

    #[test]
    fn parse_full_frame() {
        let payload = r#"{
            "message": {
                "id": "m-1",
                "author": {"role": "assistant"},
                "content": {"content_type": "text", "parts": ["Hello", " world"]},
                "end_turn": true,
                "metadata": {
                    "model_slug": "text-davinci-002-render-sha",
                    "finish_details": {"type": "stop", "stop": "<|im_end|>"}
                }
            },
            "conversation_id": "c-1",
            "error": null
        }"#;
        let frame = StreamFrame::parse(payload).unwrap();
        assert_eq!(frame.message_id, "m-1");
        assert_eq!(frame.text(), "Hello world");
        assert_eq!(frame.finish_reason(), "stop");
        assert_eq!(frame.stop, "<|im_end|>");
        assert_eq!(frame.model, "text-davinci-002-render-sha");
        assert!(frame.is_assistant_end_turn());
        assert!(frame.error.is_none());
    }

    #[test]
    fn parse_tolerates_nulls() {
        let frame =
            StreamFrame::parse(r#"{"message": {"id": "m", "end_turn": null, "content": null}}"#)
                .unwrap();
        assert!(!frame.end_turn);
        assert!(frame.parts.is_empty());
        assert_eq!(frame.conversation_id, "");
    }

    #[test]
    fn parse_rejects_invalid_json() {
        let err = StreamFrame::parse("{not json").unwrap_err();
        match err {
            ChatError::Protocol(msg) => assert!(msg.contains("{not json")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn accumulator_emits_suffix_deltas() {
        let mut acc = AnswerAccumulator::new("", "p-1");
        let a = acc.apply(&frame("m-1", "Hel", None));
        assert_eq!((a.delta.as_str(), a.text.as_str()), ("Hel", "Hel"));
        assert_eq!(a.conversation_id, "c-1");
        assert_eq!(a.parent_id, "p-1");
        assert_eq!(a.chunk_index, 1);
        assert!(!a.done);

        let b = acc.apply(&frame("m-1", "Hello", None));
        assert_eq!(b.delta, "lo");
        assert_eq!(b.chunk_index, 2);

        let c = acc.apply(&frame("m-1", "Hello!", Some("stop")));
        assert_eq!(c.delta, "!");
        assert!(c.done);
        assert_eq!(c.finish_reason, "stop");
        assert!(acc.finish().is_none());
    }

    #[test]
    fn accumulator_ignores_stale_frames() {
        let mut acc = AnswerAccumulator::new("c-1", "p");
        acc.apply(&frame("m-1", "Hello", None));
        let stale = acc.apply(&frame("m-1", "Hel", None));
        assert_eq!(stale.delta, "");
        assert_eq!(stale.text, "Hello");
    }

    #[test]
    fn accumulator_appends_next_message() {
        let mut acc = AnswerAccumulator::new("c-1", "p");
        let first = acc.apply(&frame("m-1", "Searching the web", None));
        let next = acc.apply(&frame("m-2", "Result", None));
        assert_eq!(next.delta, "Result");
        assert_eq!(next.message_id, "m-2");
        assert_eq!(next.text, "Searching the webResult");
        assert!(next.text.starts_with(&first.text));

        let more = acc.apply(&frame("m-2", "Results!", None));
        assert_eq!(more.delta, "s!");
        assert_eq!(more.text, "Searching the webResults!");
    }

    #[test]
    fn rewritten_message_is_appended() {
        let mut acc = AnswerAccumulator::new("c-1", "p");
        acc.apply(&frame("m-1", "Hello", None));
        let rewrite = acc.apply(&frame("m-1", "Goodbye", None));
        assert_eq!(rewrite.delta, "Goodbye");
        assert_eq!(rewrite.text, "HelloGoodbye");
    }

    #[test]
    fn text_never_shrinks_and_matches_deltas() {
        let frames = [
            frame("m-1", "Sea", None),
            frame("m-1", "Searching", None),
            frame("m-1", "Sea", None),
            frame("", "Searching...", None),
            frame("m-2", "", None),
            frame("m-2", "Re", None),
            frame("m-1", "late", None),
            frame("m-3", "Done", Some("stop")),
        ];
        let mut acc = AnswerAccumulator::new("c-1", "p");
        let mut deltas = String::new();
        let mut last_len = 0;
        for (i, f) in frames.iter().enumerate() {
            let answer = acc.apply(f);
            deltas.push_str(&answer.delta);
            assert!(answer.text.len() >= last_len, "frame {i} shrank the text");
            assert_eq!(answer.text, deltas, "frame {i}");
            assert_eq!(answer.chunk_index, i + 1);
            last_len = answer.text.len();
        }
        assert_eq!(acc.text(), "Searching...RelateDone");
    }

    #[test]
    fn frame_error_reaches_the_answer() {
        let mut acc = AnswerAccumulator::new("c-1", "p");
        let mut f = frame("m-1", "x", None);
        f.error = Some("moderation flagged".into());
        assert_eq!(acc.apply(&f).error.as_deref(), Some("moderation flagged"));
        assert_eq!(acc.apply(&frame("m-1", "xy", None)).error, None);
        assert_eq!(acc.finish().unwrap().error, None);
    }

    #[test]
    fn finish_adds_one_final_answer() {
        let mut acc = AnswerAccumulator::new("c-1", "p");
        assert!(acc.finish().is_none());
        acc.apply(&frame("m-1", "partial", None));
        let last = acc.finish().unwrap();
        assert!(last.done);
        assert_eq!(last.delta, "");
        assert_eq!(last.text, "partial");
        assert_eq!(last.chunk_index, 2);
        assert!(acc.finish().is_none());
    }

    #[test]
    fn known_conversation_id_is_kept() {
        let mut acc = AnswerAccumulator::new("c-known", "p");
        let a = acc.apply(&frame("m-1", "x", None));
        assert_eq!(a.conversation_id, "c-known");
    }
}
