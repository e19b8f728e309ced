use log::{debug, info, warn};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use url::Url;
use uuid::Uuid;

use crate::error::{DrizzleError, Result};
use crate::models::ConnectionState;
use crate::protocol::{self, Envelope, Hello};
use crate::reconnect::RetrySignal;
use crate::transport::{LinkEvent, NORMAL_CLOSE};
use crate::{Client, ClientEvent, DEFAULT_PORT, WS_PATH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    Established,
    /// A connect attempt or live session already exists; nothing was done.
    AlreadyActive,
}

/// State owned exclusively by the session operations below. Every spawned
/// task carries the generation it was created under and re-checks it before
/// mutating anything, so callbacks of a torn-down transport go quiet.
#[derive(Default)]
pub(crate) struct SessionState {
    pub connection: ConnectionState,
    pub link: Option<UnboundedSender<String>>,
    pub generation: u64,
    pub target: Option<Url>,
    /// Cleared on explicit disconnect and on a normal remote close; the
    /// supervisor only revives wanted sessions.
    pub wanted: bool,
}

/// Accepts `host` or `host:port` and dials the session endpoint on it.
pub(crate) fn parse_target(target: &str) -> Result<Url> {
    let target = target.trim();
    if target.is_empty() {
        return Err(DrizzleError::BadTarget(target.to_string()));
    }
    let authority = if target.contains(':') {
        target.to_string()
    } else {
        format!("{target}:{DEFAULT_PORT}")
    };
    let url = Url::parse(&format!("ws://{authority}{WS_PATH}"))
        .map_err(|_| DrizzleError::BadTarget(target.to_string()))?;
    if url.host_str().is_none() {
        return Err(DrizzleError::BadTarget(target.to_string()));
    }
    Ok(url)
}

impl Client {
    /// Open the session to `target` and perform the handshake.
    ///
    /// Single-flight: while a session is connecting or connected this
    /// returns `AlreadyActive` without touching the existing transport.
    pub async fn connect(&self, target: &str) -> Result<ConnectOutcome> {
        let url = parse_target(target)?;

        {
            let mut config = self.config.lock().await;
            if config.server_addr != target {
                config.server_addr = target.to_string();
                if let Err(e) = config.store() {
                    warn!("could not persist server address: {e}");
                }
            }
        }

        self.connect_url(url).await
    }

    pub(crate) async fn connect_url(&self, url: Url) -> Result<ConnectOutcome> {
        let generation = {
            let mut state = self.state.lock().await;
            if state.connection != ConnectionState::Disconnected {
                debug!("connect ignored, session already {:?}", state.connection);
                return Ok(ConnectOutcome::AlreadyActive);
            }
            state.connection = ConnectionState::Connecting;
            state.generation += 1;
            state.target = Some(url.clone());
            state.wanted = true;
            state.generation
        };
        self.send_event(ClientEvent::StateChanged(ConnectionState::Connecting));

        info!("connecting to {url}");
        let connection = match self.transport.open(&url).await {
            Ok(connection) => connection,
            Err(e) => {
                self.drop_link(generation).await;
                return Err(e);
            }
        };

        let hello = self.handshake_identity().await;
        let frame = protocol::encode(&Envelope::connection_request(hello))?;
        if connection.outbound.send(frame).is_err() {
            self.drop_link(generation).await;
            return Err(DrizzleError::NotConnected);
        }

        {
            let mut state = self.state.lock().await;
            if state.generation != generation {
                // disconnect() won the race; the link is unwanted
                return Err(DrizzleError::NotConnected);
            }
            state.link = Some(connection.outbound);
            state.connection = ConnectionState::Connected;
        }
        self.send_event(ClientEvent::StateChanged(ConnectionState::Connected));

        let client = self.clone();
        tokio::spawn(async move { client.run_link(connection.events, generation).await });

        Ok(ConnectOutcome::Established)
    }

    /// Close the session. Idempotent; stale transport callbacks are fenced
    /// off by the generation bump.
    pub async fn disconnect(&self) {
        let was_connected = {
            let mut state = self.state.lock().await;
            state.wanted = false;
            state.generation += 1;
            state.link = None; // dropping the sender closes the socket
            let was = state.connection;
            state.connection = ConnectionState::Disconnected;
            was != ConnectionState::Disconnected
        };
        if was_connected {
            info!("session closed by user");
            self.send_event(ClientEvent::StateChanged(ConnectionState::Disconnected));
        }
    }

    /// Hand `envelope` to the live link. Fails fast when not connected so
    /// callers can surface the loss instead of silently dropping frames.
    pub async fn send(&self, envelope: &Envelope) -> Result<()> {
        let frame = protocol::encode(envelope)?;
        let state = self.state.lock().await;
        match (&state.connection, &state.link) {
            (ConnectionState::Connected, Some(link)) => {
                link.send(frame).map_err(|_| DrizzleError::NotConnected)
            }
            _ => Err(DrizzleError::NotConnected),
        }
    }

    /// Reuse the minted session id, or mint one on the first handshake.
    async fn handshake_identity(&self) -> Hello {
        let mut config = self.config.lock().await;
        let id = match &config.session_id {
            Some(id) => id.clone(),
            None => {
                let id = Uuid::new_v4().to_string();
                config.session_id = Some(id.clone());
                if let Err(e) = config.store() {
                    warn!("could not persist session id: {e}");
                }
                id
            }
        };
        Hello {
            id,
            username: config.username.clone(),
            folder_path: config.shared_dir.display().to_string(),
        }
    }

    pub(crate) async fn run_link(self, mut events: UnboundedReceiver<LinkEvent>, generation: u64) {
        loop {
            let Some(event) = events.recv().await else {
                // the transport vanished without a close frame
                self.on_link_lost(generation, false).await;
                return;
            };
            if self.state.lock().await.generation != generation {
                return; // a newer generation owns the session now
            }
            match event {
                LinkEvent::Frame(frame) => self.dispatch_frame(&frame).await,
                LinkEvent::Closed { code } => {
                    debug!("link closed with code {code}");
                    self.on_link_lost(generation, code == NORMAL_CLOSE).await;
                    return;
                }
                LinkEvent::Error(error) => {
                    warn!("transport error: {error}");
                    self.on_link_lost(generation, false).await;
                    return;
                }
            }
        }
    }

    async fn on_link_lost(&self, generation: u64, normal: bool) {
        let retry = {
            let mut state = self.state.lock().await;
            if state.generation != generation {
                return;
            }
            state.generation += 1;
            state.link = None;
            state.connection = ConnectionState::Disconnected;
            if normal {
                state.wanted = false;
            }
            state.wanted && state.target.is_some()
        };
        self.send_event(ClientEvent::StateChanged(ConnectionState::Disconnected));
        if retry {
            debug!("link lost abnormally, asking the supervisor for a retry");
            let _ = self.retry_tx.send(RetrySignal::LinkLost);
        }
    }

    /// Failed connect attempt: roll the state back unless something newer
    /// already took over.
    async fn drop_link(&self, generation: u64) {
        let changed = {
            let mut state = self.state.lock().await;
            if state.generation != generation {
                return;
            }
            state.link = None;
            let was = state.connection;
            state.connection = ConnectionState::Disconnected;
            was != ConnectionState::Disconnected
        };
        if changed {
            self.send_event(ClientEvent::StateChanged(ConnectionState::Disconnected));
        }
    }
}
