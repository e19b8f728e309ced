use log::{debug, info, warn};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::models::ConnectionState;
use crate::Client;

/// Why the supervisor should look at the session again. Each signal drives
/// at most one connect attempt; a failed attempt waits for the next signal
/// rather than polling.
#[derive(Debug, Clone, Copy)]
pub enum RetrySignal {
    LinkLost,
    NetworkRestored,
}

impl Client {
    /// Host environments call this when OS-level connectivity returns, so a
    /// session dropped during an outage comes back without a polling loop.
    pub fn network_restored(&self) {
        let _ = self.retry_tx.send(RetrySignal::NetworkRestored);
    }

    pub(crate) async fn run_supervisor(self, mut signals: UnboundedReceiver<RetrySignal>) {
        while let Some(signal) = signals.recv().await {
            let target = {
                let state = self.state.lock().await;
                if !state.wanted || state.connection != ConnectionState::Disconnected {
                    continue;
                }
                match &state.target {
                    Some(url) => url.clone(),
                    None => continue,
                }
            };
            debug!("reconnecting after {signal:?}");
            match self.connect_url(target).await {
                Ok(_) => info!("session re-established"),
                Err(e) => warn!("reconnect failed, waiting for the next signal: {e}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::models::ConnectionState;
    use crate::testutil::{settle, test_client, wait_for};
    use crate::transport::{LinkEvent, NORMAL_CLOSE};

    #[tokio::test]
    async fn abnormal_close_triggers_exactly_one_reconnect() {
        let (client, mock, _events) = test_client();
        client.start().await.unwrap();
        client.connect("127.0.0.1:9000").await.unwrap();

        mock.feed(LinkEvent::Closed { code: 1006 }).await;
        wait_for(|| {
            let mock = mock.clone();
            async move { mock.opens().await == 2 }
        })
        .await;
        settle().await;

        assert_eq!(mock.opens().await, 2);
        assert_eq!(client.connection_state().await, ConnectionState::Connected);
    }

    #[tokio::test]
    async fn transport_error_also_triggers_a_reconnect() {
        let (client, mock, _events) = test_client();
        client.start().await.unwrap();
        client.connect("127.0.0.1:9000").await.unwrap();

        mock.feed(LinkEvent::Error("connection reset".to_string()))
            .await;
        wait_for(|| {
            let mock = mock.clone();
            async move { mock.opens().await == 2 }
        })
        .await;
    }

    #[tokio::test]
    async fn user_disconnect_stays_down() {
        let (client, mock, _events) = test_client();
        client.start().await.unwrap();
        client.connect("127.0.0.1:9000").await.unwrap();

        client.disconnect().await;
        // a close racing in from the dead transport changes nothing
        mock.feed(LinkEvent::Closed { code: 1006 }).await;
        settle().await;

        assert_eq!(mock.opens().await, 1);
        assert_eq!(
            client.connection_state().await,
            ConnectionState::Disconnected
        );
    }

    #[tokio::test]
    async fn normal_remote_close_is_not_retried() {
        let (client, mock, _events) = test_client();
        client.start().await.unwrap();
        client.connect("127.0.0.1:9000").await.unwrap();

        mock.feed(LinkEvent::Closed { code: NORMAL_CLOSE }).await;
        wait_for(|| {
            let client = client.clone();
            async move { client.connection_state().await == ConnectionState::Disconnected }
        })
        .await;
        settle().await;

        assert_eq!(mock.opens().await, 1);
    }

    #[tokio::test]
    async fn connectivity_signal_revives_a_session_the_retry_could_not() {
        let (client, mock, _events) = test_client();
        client.start().await.unwrap();
        client.connect("127.0.0.1:9000").await.unwrap();

        // the automatic retry hits a still-dead network
        mock.fail_next_open().await;
        mock.feed(LinkEvent::Closed { code: 1006 }).await;
        wait_for(|| {
            let client = client.clone();
            async move { client.connection_state().await == ConnectionState::Disconnected }
        })
        .await;
        settle().await;
        assert_eq!(mock.opens().await, 1);

        client.network_restored();
        wait_for(|| {
            let mock = mock.clone();
            async move { mock.opens().await == 2 }
        })
        .await;
        assert_eq!(client.connection_state().await, ConnectionState::Connected);
    }
}
