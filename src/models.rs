use chrono::Local;
use serde::{Deserialize, Serialize};

/// Sender name used for locally synthesized error entries in the chat log.
pub const SYSTEM_SENDER: &str = "System";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Roster entry for a known peer. The wire shape mirrors the server's
/// snapshot verbatim, PascalCase keys included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PeerInfo {
    pub user_id: String,
    pub username: String,
    pub store_file_path: String,
    pub is_online: bool,
    pub ip_address: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Folder,
}

/// One child of a shared directory, as carried in a lookup response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub size: u64,
}

/// File metadata a chat message may advertise alongside its text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAttachment {
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Rendered chat entry. Append order is display order.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub id: Option<String>,
    pub content: String,
    pub sender: String,
    pub timestamp: String,
    pub attachment: Option<FileAttachment>,
}

impl ChatMessage {
    pub(crate) fn system(content: impl Into<String>) -> Self {
        Self {
            id: None,
            content: content.into(),
            sender: SYSTEM_SENDER.to_string(),
            timestamp: now_stamp(),
            attachment: None,
        }
    }
}

/// Display timestamp in the shape chat bubbles show.
pub(crate) fn now_stamp() -> String {
    Local::now().format("%H:%M:%S").to_string()
}
