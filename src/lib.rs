pub mod config;
pub mod error;
pub mod listing;
pub mod models;
pub mod protocol;
pub mod reconnect;
pub mod roster;
pub mod router;
pub mod session;
pub mod transport;

use std::collections::HashSet;
use std::sync::Arc;

use log::debug;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::error::{DrizzleError, Result};
use crate::models::{ChatMessage, ConnectionState, FileAttachment, FileEntry, PeerInfo};
use crate::protocol::{Envelope, FileRequest};
use crate::reconnect::RetrySignal;
use crate::session::SessionState;
use crate::transport::{Transport, WsTransport};

/// Default port of the peer session endpoint.
pub const DEFAULT_PORT: u16 = 8080;
/// Path of the WebSocket endpoint on the remote peer.
pub const WS_PATH: &str = "/ws";

/// Events pushed to the embedding application. The session never blocks on
/// the consumer; an ignored event stream just goes unread.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    StateChanged(ConnectionState),
    Message(ChatMessage),
    RosterReplaced(Vec<PeerInfo>),
    ListingReplaced(Vec<FileEntry>),
    ListingFailed(String),
}

#[derive(Default)]
pub(crate) struct ChatLog {
    pub messages: Vec<ChatMessage>,
    pub seen: HashSet<String>,
}

/// One logical connection to a remote peer/server: the session state
/// machine, the request router, and the reconnection supervisor share this
/// handle. Cloning is cheap; all clones drive the same session.
#[derive(Clone)]
pub struct Client {
    pub(crate) config: Arc<Mutex<Config>>,
    pub(crate) state: Arc<Mutex<SessionState>>,
    pub(crate) chat: Arc<Mutex<ChatLog>>,
    pub(crate) roster: Arc<RwLock<Vec<PeerInfo>>>,
    pub(crate) listing: Arc<RwLock<Vec<FileEntry>>>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) event_tx: UnboundedSender<ClientEvent>,
    pub(crate) retry_tx: UnboundedSender<RetrySignal>,
    retry_rx: Arc<Mutex<Option<UnboundedReceiver<RetrySignal>>>>,
    pub(crate) http_client: reqwest::Client,
}

impl Client {
    pub fn new(config: Config) -> (Self, UnboundedReceiver<ClientEvent>) {
        Self::with_transport(config, Arc::new(WsTransport))
    }

    /// Build a client over a custom transport implementation.
    pub fn with_transport(
        config: Config,
        transport: Arc<dyn Transport>,
    ) -> (Self, UnboundedReceiver<ClientEvent>) {
        let (event_tx, event_rx) = unbounded_channel();
        let (retry_tx, retry_rx) = unbounded_channel();
        let client = Self {
            config: Arc::new(Mutex::new(config)),
            state: Arc::new(Mutex::new(SessionState::default())),
            chat: Arc::new(Mutex::new(ChatLog::default())),
            roster: Arc::new(RwLock::new(Vec::new())),
            listing: Arc::new(RwLock::new(Vec::new())),
            transport,
            event_tx,
            retry_tx,
            retry_rx: Arc::new(Mutex::new(Some(retry_rx))),
            http_client: reqwest::Client::new(),
        };
        (client, event_rx)
    }

    /// Spawn the reconnection supervisor. Returns `None` on a second call;
    /// the supervisor runs once for the life of the client.
    pub async fn start(&self) -> Option<JoinHandle<()>> {
        let signals = self.retry_rx.lock().await.take()?;
        let client = self.clone();
        Some(tokio::spawn(async move {
            client.run_supervisor(signals).await
        }))
    }

    /// Send a chat line to the session. The local bubble is appended too;
    /// its envelope id keeps a server echo from doubling it.
    pub async fn send_text(&self, content: &str) -> Result<()> {
        self.send_chat(content, None).await
    }

    /// Send a chat line advertising a file the peer can request.
    pub async fn send_text_with_attachment(
        &self,
        content: &str,
        attachment: FileAttachment,
    ) -> Result<()> {
        self.send_chat(content, Some(attachment)).await
    }

    async fn send_chat(&self, content: &str, attachment: Option<FileAttachment>) -> Result<()> {
        let username = self.config.lock().await.username.clone();
        let envelope = Envelope::text(content, &username, attachment.clone());
        self.send(&envelope).await?;

        self.push_message(ChatMessage {
            id: envelope.id.clone(),
            content: content.to_string(),
            sender: username,
            timestamp: envelope
                .timestamp
                .clone()
                .unwrap_or_else(models::now_stamp),
            attachment,
        })
        .await;
        Ok(())
    }

    /// Ask a peer for its shared folder's contents. The answer arrives as a
    /// `lookup-response` and replaces the listing snapshot.
    pub async fn browse_peer(&self, peer_id: &str) -> Result<()> {
        let sender_id = self
            .config
            .lock()
            .await
            .session_id
            .clone()
            .ok_or(DrizzleError::NotConnected)?;
        self.send(&Envelope::lookup_request(sender_id, peer_id.to_string()))
            .await
    }

    /// Signal that a transfer of `entry` from `peer_id` should begin. The
    /// byte transfer itself is carried out elsewhere.
    pub async fn request_file(&self, peer_id: &str, entry: &FileEntry) -> Result<()> {
        let sender_id = self
            .config
            .lock()
            .await
            .session_id
            .clone()
            .ok_or(DrizzleError::NotConnected)?;
        self.send(&Envelope::file_request(FileRequest {
            recipient_id: peer_id.to_string(),
            sender_id,
            filename: entry.name.clone(),
            filesize: entry.size,
            file_path: entry.path.clone(),
        }))
        .await
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.state.lock().await.connection
    }

    pub async fn messages(&self) -> Vec<ChatMessage> {
        self.chat.lock().await.messages.clone()
    }

    pub async fn clear_messages(&self) {
        let mut chat = self.chat.lock().await;
        chat.messages.clear();
        chat.seen.clear();
    }

    pub async fn listing(&self) -> Vec<FileEntry> {
        self.listing.read().await.clone()
    }

    pub async fn roster_snapshot(&self) -> Vec<PeerInfo> {
        self.roster.read().await.clone()
    }

    pub async fn config_snapshot(&self) -> Config {
        self.config.lock().await.clone()
    }

    /// Forget the minted session id. The next connect mints a fresh one and
    /// the remote roster will see a new peer.
    pub async fn reset_identity(&self) {
        let mut config = self.config.lock().await;
        config.session_id = None;
        if let Err(e) = config.store() {
            log::warn!("could not persist identity reset: {e}");
        }
    }

    pub(crate) fn send_event(&self, event: ClientEvent) {
        if self.event_tx.send(event).is_err() {
            debug!("no event consumer, dropping event");
        }
    }
}
