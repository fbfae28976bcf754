//! Jupyter kernel messages as they travel over the kernel channel websocket.
//!
//! Only the subset needed to run a cell is modelled: the outgoing
//! `execute_request` envelope, and a classifier that decides what an incoming
//! frame means for the request waiting on it.

use crate::error::{JupyterError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use uuid::Uuid;

/// Protocol version announced in every header we send.
pub const PROTOCOL_VERSION: &str = "5.0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHeader {
    pub msg_id: String,
    pub msg_type: String,
    pub version: String,
    pub session: String,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelMessage {
    pub header: MessageHeader,
    pub parent_header: Map<String, Value>,
    pub channel: String,
    pub content: Value,
    pub metadata: Map<String, Value>,
    pub buffers: Map<String, Value>,
}

impl KernelMessage {
    /// Builds a shell-channel `execute_request` for `code` under a fresh message id.
    pub fn execute_request(code: &str) -> Self {
        Self {
            header: MessageHeader {
                msg_id: Uuid::new_v4().simple().to_string(),
                msg_type: "execute_request".to_string(),
                version: PROTOCOL_VERSION.to_string(),
                session: String::new(),
                username: String::new(),
            },
            parent_header: Map::new(),
            channel: "shell".to_string(),
            content: json!({
                "code": code,
                "silent": false,
                "store_history": false,
                "user_expressions": {},
                "allow_stdin": false,
            }),
            metadata: Map::new(),
            buffers: Map::new(),
        }
    }

    pub fn msg_id(&self) -> &str {
        &self.header.msg_id
    }
}

/// What one received frame means for a pending execute request.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyEvent {
    /// The kernel reported an error; carries the whole message.
    Error(Value),
    /// Stream output produced by our request.
    Output(String),
    /// Status updates, echoes, or output belonging to another request.
    Unrelated,
}

/// Classifies a decoded frame against the id of the request being waited on.
///
/// The message type is read from the top-level `msg_type` the server adds to
/// websocket frames, falling back to `header.msg_type`.
pub fn classify_reply(frame: &Value, msg_id: &str) -> Result<ReplyEvent> {
    let msg_type = frame
        .get("msg_type")
        .or_else(|| frame.pointer("/header/msg_type"))
        .and_then(Value::as_str)
        .ok_or_else(|| JupyterError::MalformedMessage(format!("no msg_type in {frame}")))?;

    match msg_type {
        "error" => Ok(ReplyEvent::Error(frame.clone())),
        "stream" if frame.pointer("/parent_header/msg_id").and_then(Value::as_str) == Some(msg_id) => {
            frame
                .pointer("/content/text")
                .and_then(Value::as_str)
                .map(|text| ReplyEvent::Output(text.to_string()))
                .ok_or_else(|| {
                    JupyterError::MalformedMessage(format!("stream message without text: {frame}"))
                })
        }
        _ => Ok(ReplyEvent::Unrelated),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execute_request_envelope() {
        let msg = KernelMessage::execute_request("print(2+2)");
        let value = serde_json::to_value(&msg).unwrap();

        assert_eq!(value["header"]["msg_type"], "execute_request");
        assert_eq!(value["header"]["version"], "5.0");
        assert_eq!(value["header"]["session"], "");
        assert_eq!(value["header"]["username"], "");
        assert_eq!(value["header"]["msg_id"], msg.msg_id());
        assert_eq!(value["channel"], "shell");
        assert_eq!(value["content"]["code"], "print(2+2)");
        assert_eq!(value["content"]["silent"], false);
        assert_eq!(value["content"]["allow_stdin"], false);
        assert_eq!(value["parent_header"], json!({}));
        assert_eq!(value["metadata"], json!({}));
        assert_eq!(value["buffers"], json!({}));
    }

    #[test]
    fn message_ids_are_unique() {
        let a = KernelMessage::execute_request("1");
        let b = KernelMessage::execute_request("1");
        assert_ne!(a.msg_id(), b.msg_id());
        assert_eq!(a.msg_id().len(), 32);
    }

    #[test]
    fn error_frames_are_reported() {
        let frame = json!({
            "msg_type": "error",
            "parent_header": {"msg_id": "other"},
            "content": {"ename": "NameError"}
        });
        assert_eq!(
            classify_reply(&frame, "mine").unwrap(),
            ReplyEvent::Error(frame.clone())
        );
    }

    #[test]
    fn stream_for_other_request_is_unrelated() {
        let frame = json!({
            "msg_type": "stream",
            "parent_header": {"msg_id": "other"},
            "content": {"name": "stdout", "text": "nope\n"}
        });
        assert_eq!(classify_reply(&frame, "mine").unwrap(), ReplyEvent::Unrelated);
    }

    #[test]
    fn matching_stream_returns_text() {
        let frame = json!({
            "msg_type": "stream",
            "parent_header": {"msg_id": "mine"},
            "content": {"name": "stdout", "text": "4\n"}
        });
        assert_eq!(
            classify_reply(&frame, "mine").unwrap(),
            ReplyEvent::Output("4\n".to_string())
        );
    }

    #[test]
    fn header_msg_type_is_used_as_fallback() {
        let frame = json!({
            "header": {"msg_type": "status"},
            "parent_header": {"msg_id": "mine"},
            "content": {"execution_state": "busy"}
        });
        assert_eq!(classify_reply(&frame, "mine").unwrap(), ReplyEvent::Unrelated);
    }

    #[test]
    fn frame_without_type_is_malformed() {
        let err = classify_reply(&json!({"content": {}}), "mine").unwrap_err();
        assert!(matches!(err, JupyterError::MalformedMessage(_)));
    }
}
