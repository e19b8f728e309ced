//! Transport seam: a bidirectional text-frame link behind a trait so the
//! session logic runs the same over a real WebSocket or a test double.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

use crate::error::Result;

/// Close code the environment uses for a user-intended shutdown; anything
/// else is treated as abnormal loss.
pub const NORMAL_CLOSE: u16 = 1000;

#[derive(Debug)]
pub enum LinkEvent {
    Frame(String),
    Closed { code: u16 },
    Error(String),
}

/// A live link. Dropping `outbound` closes the connection.
pub struct Connection {
    pub outbound: UnboundedSender<String>,
    pub events: UnboundedReceiver<LinkEvent>,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self, url: &Url) -> Result<Connection>;
}

/// WebSocket transport over tokio-tungstenite.
pub struct WsTransport;

#[async_trait]
impl Transport for WsTransport {
    async fn open(&self, url: &Url) -> Result<Connection> {
        let (stream, _) = connect_async(url.as_str()).await?;
        let (mut sink, mut source) = stream.split();

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                if let Err(e) = sink.send(Message::Text(frame)).await {
                    log::debug!("websocket send failed: {e}");
                    return;
                }
            }
            // sender dropped: the session is done with this link
            let _ = sink.send(Message::Close(None)).await;
        });

        tokio::spawn(async move {
            while let Some(message) = source.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        if event_tx.send(LinkEvent::Frame(text)).is_err() {
                            return;
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        let code = frame.map(|f| u16::from(f.code)).unwrap_or(NORMAL_CLOSE);
                        let _ = event_tx.send(LinkEvent::Closed { code });
                        return;
                    }
                    Ok(_) => {} // ping/pong/binary carry nothing for the router
                    Err(e) => {
                        let _ = event_tx.send(LinkEvent::Error(e.to_string()));
                        return;
                    }
                }
            }
        });

        Ok(Connection {
            outbound: out_tx,
            events: event_rx,
        })
    }
}
