use log::{debug, warn};

use crate::models::{now_stamp, ChatMessage};
use crate::protocol::{
    self, DecodeError, Envelope, LookupRequest, LookupResponse, Payload, TextBody,
};
use crate::{listing, Client, ClientEvent};

impl Client {
    /// Entry point for every inbound frame, called in arrival order by the
    /// link reader. Protocol-level garbage never gets past this boundary.
    pub(crate) async fn dispatch_frame(&self, raw: &str) {
        let envelope = match protocol::decode(raw) {
            Ok(envelope) => envelope,
            Err(DecodeError::UnknownKind(kind)) => {
                debug!("ignoring message of unknown kind {kind:?}");
                return;
            }
            Err(e) => {
                warn!("dropping malformed frame: {e}");
                self.push_message(ChatMessage::system(format!("Error: {e}")))
                    .await;
                return;
            }
        };
        self.dispatch(envelope).await;
    }

    async fn dispatch(&self, envelope: Envelope) {
        match envelope.payload {
            Payload::Text(body) => self.on_text(envelope.id, envelope.sender, body).await,
            Payload::LookupRequest(request) => self.on_lookup_request(request).await,
            Payload::LookupResponse(response) => self.on_lookup_response(response).await,
            Payload::ConnectionRequest(_) | Payload::FileRequest(_) => {
                debug!("ignoring outbound-only message kind from peer");
            }
        }
    }

    async fn on_text(&self, id: Option<String>, sender: Option<String>, body: TextBody) {
        let message = ChatMessage {
            id,
            content: body.content,
            sender: sender.unwrap_or_else(|| "unknown".to_string()),
            // display timestamp is stamped at receipt, not the sender's clock
            timestamp: now_stamp(),
            attachment: body.attachment,
        };
        self.push_message(message).await;
    }

    /// Answer a peer's browse request with our shared folder's children.
    /// The filesystem work runs in its own task so later frames keep
    /// flowing while the disk is slow.
    async fn on_lookup_request(&self, request: LookupRequest) {
        let client = self.clone();
        tokio::spawn(async move {
            let shared = client.config.lock().await.shared_dir.clone();
            let envelope = match listing::list_directory(&shared, "").await {
                Ok(entries) => Envelope::lookup_response(request.sender_id, entries),
                Err(e) => {
                    warn!("local listing failed: {e}");
                    Envelope::lookup_error(request.sender_id, e.to_string())
                }
            };
            if let Err(e) = client.send(&envelope).await {
                debug!("could not answer lookup: {e}");
            }
        });
    }

    async fn on_lookup_response(&self, response: LookupResponse) {
        if let Some(error) = response.error {
            warn!("peer listing failed: {error}");
            self.send_event(ClientEvent::ListingFailed(error));
            return;
        }
        *self.listing.write().await = response.entries.clone();
        self.send_event(ClientEvent::ListingReplaced(response.entries));
    }

    /// Append to the chat log unless the envelope id was already seen.
    pub(crate) async fn push_message(&self, message: ChatMessage) {
        {
            let mut chat = self.chat.lock().await;
            if let Some(id) = &message.id {
                if !chat.seen.insert(id.clone()) {
                    debug!("dropping duplicate message {id}");
                    return;
                }
            }
            chat.messages.push(message.clone());
        }
        self.send_event(ClientEvent::Message(message));
    }
}
