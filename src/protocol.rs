//! Wire envelope codec. One JSON object per text frame:
//! `{type, payload, sender, timestamp}` plus an optional envelope `id`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use uuid::Uuid;

use crate::models::{now_stamp, FileAttachment, FileEntry};

const KNOWN_KINDS: [&str; 5] = [
    "connection-request",
    "text",
    "lookup-request",
    "lookup-response",
    "file-request",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(flatten)]
    pub payload: Payload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum Payload {
    ConnectionRequest(Hello),
    Text(TextBody),
    LookupRequest(LookupRequest),
    LookupResponse(LookupResponse),
    FileRequest(FileRequest),
}

/// Handshake payload establishing identity with the remote side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hello {
    pub id: String,
    pub username: String,
    pub folder_path: String,
}

/// Body of a `text` envelope. The wire accepts either a plain string or an
/// object form `{content, file?}`; older peers also sent `Content`.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBody {
    pub content: String,
    pub attachment: Option<FileAttachment>,
}

impl Serialize for TextBody {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.attachment {
            None => serializer.serialize_str(&self.content),
            Some(attachment) => {
                #[derive(Serialize)]
                struct Object<'a> {
                    content: &'a str,
                    file: &'a FileAttachment,
                }
                Object {
                    content: &self.content,
                    file: attachment,
                }
                .serialize(serializer)
            }
        }
    }
}

impl<'de> Deserialize<'de> for TextBody {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Plain(String),
            Object {
                #[serde(alias = "Content")]
                content: String,
                #[serde(default)]
                file: Option<FileAttachment>,
            },
        }

        Ok(match Wire::deserialize(deserializer)? {
            Wire::Plain(content) => TextBody {
                content,
                attachment: None,
            },
            Wire::Object { content, file } => TextBody {
                content,
                attachment: file,
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupRequest {
    pub sender_id: String,
    pub recipient_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupResponse {
    pub recipient_id: String,
    pub entries: Vec<FileEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Signal that a transfer should begin; the byte transfer itself happens
/// elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRequest {
    pub recipient_id: String,
    pub sender_id: String,
    pub filename: String,
    pub filesize: u64,
    pub file_path: String,
}

impl Envelope {
    fn stamped(payload: Payload, sender: Option<String>) -> Self {
        Self {
            payload,
            id: Some(Uuid::new_v4().to_string()),
            sender,
            timestamp: Some(now_stamp()),
        }
    }

    pub fn connection_request(hello: Hello) -> Self {
        Self::stamped(Payload::ConnectionRequest(hello), None)
    }

    /// Locally-authored chat message, stamped at the moment the user acted.
    pub fn text(content: &str, sender: &str, attachment: Option<FileAttachment>) -> Self {
        Self::stamped(
            Payload::Text(TextBody {
                content: content.to_string(),
                attachment,
            }),
            Some(sender.to_string()),
        )
    }

    pub fn lookup_request(sender_id: String, recipient_id: String) -> Self {
        Self::stamped(
            Payload::LookupRequest(LookupRequest {
                sender_id,
                recipient_id,
            }),
            None,
        )
    }

    pub fn lookup_response(recipient_id: String, entries: Vec<FileEntry>) -> Self {
        Self::stamped(
            Payload::LookupResponse(LookupResponse {
                recipient_id,
                entries,
                error: None,
            }),
            None,
        )
    }

    pub fn lookup_error(recipient_id: String, error: String) -> Self {
        Self::stamped(
            Payload::LookupResponse(LookupResponse {
                recipient_id,
                entries: Vec::new(),
                error: Some(error),
            }),
            None,
        )
    }

    pub fn file_request(request: FileRequest) -> Self {
        Self::stamped(Payload::FileRequest(request), None)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("envelope has no usable '{0}' field")]
    MissingField(&'static str),

    #[error("unknown message kind {0:?}")]
    UnknownKind(String),

    #[error("bad payload for {kind:?}: {source}")]
    BadPayload {
        kind: String,
        source: serde_json::Error,
    },
}

pub fn encode(envelope: &Envelope) -> crate::error::Result<String> {
    Ok(serde_json::to_string(envelope)?)
}

/// Decode one inbound frame. Unknown kinds are reported separately from
/// malformed frames so the router can discard the former and surface the
/// latter without tearing the session down.
pub fn decode(raw: &str) -> Result<Envelope, DecodeError> {
    let value: Value = serde_json::from_str(raw)?;

    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingField("type"))?;
    if !KNOWN_KINDS.contains(&kind) {
        return Err(DecodeError::UnknownKind(kind.to_string()));
    }
    let kind = kind.to_string();

    if value.get("payload").map_or(true, Value::is_null) {
        return Err(DecodeError::MissingField("payload"));
    }

    serde_json::from_value(value).map_err(|source| DecodeError::BadPayload { kind, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntryKind;

    fn entry(name: &str, kind: EntryKind, size: u64) -> FileEntry {
        FileEntry {
            name: name.to_string(),
            path: format!("/share/{name}"),
            kind,
            size,
        }
    }

    #[test]
    fn round_trips_every_kind() {
        let envelopes = [
            Envelope::connection_request(Hello {
                id: "s-1".to_string(),
                username: "alice".to_string(),
                folder_path: "/share".to_string(),
            }),
            Envelope::text("hi there", "alice", None),
            Envelope::lookup_request("s-1".to_string(), "s-2".to_string()),
            Envelope::lookup_response(
                "s-2".to_string(),
                vec![entry("a.txt", EntryKind::File, 10)],
            ),
            Envelope::file_request(FileRequest {
                recipient_id: "s-2".to_string(),
                sender_id: "s-1".to_string(),
                filename: "a.txt".to_string(),
                filesize: 10,
                file_path: "/share/a.txt".to_string(),
            }),
        ];

        for envelope in envelopes {
            let frame = encode(&envelope).unwrap();
            let decoded = decode(&frame).unwrap();
            assert_eq!(decoded, envelope, "frame was {frame}");
        }
    }

    #[test]
    fn plain_text_payload_is_a_bare_string_on_the_wire() {
        let frame = encode(&Envelope::text("hello", "alice", None)).unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["payload"], "hello");
        assert_eq!(value["sender"], "alice");
    }

    #[test]
    fn text_payload_accepts_the_object_form_and_legacy_casing() {
        let decoded =
            decode(r#"{"type":"text","payload":{"Content":"old style"},"sender":"bob"}"#).unwrap();
        match decoded.payload {
            Payload::Text(body) => {
                assert_eq!(body.content, "old style");
                assert!(body.attachment.is_none());
            }
            other => panic!("wrong payload: {other:?}"),
        }

        let decoded = decode(
            r#"{"type":"text","payload":{"content":"take this","file":{"name":"a.bin","size":9,"type":"application/octet-stream"}},"sender":"bob"}"#,
        )
        .unwrap();
        match decoded.payload {
            Payload::Text(body) => {
                let attachment = body.attachment.unwrap();
                assert_eq!(attachment.name, "a.bin");
                assert_eq!(attachment.size, 9);
            }
            other => panic!("wrong payload: {other:?}"),
        }
    }

    #[test]
    fn attachment_survives_a_round_trip() {
        let envelope = Envelope::text(
            "here you go",
            "alice",
            Some(FileAttachment {
                name: "notes.txt".to_string(),
                size: 42,
                kind: "text/plain".to_string(),
            }),
        );
        let decoded = decode(&encode(&envelope).unwrap()).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn missing_type_or_payload_is_malformed() {
        assert!(matches!(
            decode(r#"{"payload":"hi","sender":"x"}"#),
            Err(DecodeError::MissingField("type"))
        ));
        assert!(matches!(
            decode(r#"{"type":"text","sender":"x"}"#),
            Err(DecodeError::MissingField("payload"))
        ));
        assert!(matches!(
            decode(r#"{"type":"text","payload":null}"#),
            Err(DecodeError::MissingField("payload"))
        ));
        assert!(matches!(decode("not json"), Err(DecodeError::Json(_))));
    }

    #[test]
    fn unknown_kind_is_not_malformed() {
        let err = decode(r#"{"type":"presence-ping","payload":{}}"#).unwrap_err();
        match err {
            DecodeError::UnknownKind(kind) => assert_eq!(kind, "presence-ping"),
            other => panic!("wrong error: {other:?}"),
        }
    }

    #[test]
    fn error_flagged_lookup_response_round_trips() {
        let envelope = Envelope::lookup_error("s-2".to_string(), "not a directory".to_string());
        let frame = encode(&envelope).unwrap();
        let decoded = decode(&frame).unwrap();
        match decoded.payload {
            Payload::LookupResponse(response) => {
                assert!(response.entries.is_empty());
                assert_eq!(response.error.as_deref(), Some("not a directory"));
            }
            other => panic!("wrong payload: {other:?}"),
        }
    }
}
