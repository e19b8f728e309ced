use log::debug;

use crate::error::{DrizzleError, Result};
use crate::models::PeerInfo;
use crate::{Client, ClientEvent, DEFAULT_PORT};

impl Client {
    /// Fetch the coordinator's peer snapshot and replace the roster with it
    /// wholesale. Stale entries are never patched field by field.
    pub async fn refresh_roster(&self) -> Result<Vec<PeerInfo>> {
        let server = {
            let config = self.config.lock().await;
            if config.server_addr.is_empty() {
                return Err(DrizzleError::NoServerAddress);
            }
            config.server_addr.clone()
        };
        let authority = if server.contains(':') {
            server
        } else {
            format!("{server}:{DEFAULT_PORT}")
        };
        let url = format!("http://{authority}/api/users");

        debug!("fetching roster from {url}");
        let peers: Vec<PeerInfo> = self.http_client.get(&url).send().await?.json().await?;

        *self.roster.write().await = peers.clone();
        self.send_event(ClientEvent::RosterReplaced(peers.clone()));
        Ok(peers)
    }

    /// Look a peer up in the current roster snapshot.
    pub async fn peer(&self, peer_id: &str) -> Result<PeerInfo> {
        self.roster
            .read()
            .await
            .iter()
            .find(|peer| peer.user_id == peer_id)
            .cloned()
            .ok_or(DrizzleError::PeerNotFound)
    }
}
