use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// Handle used to push frames to a connected chat peer.
#[derive(Clone)]
pub struct PeerConnection {
    pub id: Uuid,
    pub tx: mpsc::UnboundedSender<Message>,
}

/// Registry of connected chat peers. Delivery is best effort and unordered across peers.
#[derive(Default)]
pub struct ChatRelay {
    peers: DashMap<Uuid, PeerConnection>,
}

impl ChatRelay {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new peer and return its identifier.
    pub fn register(&self, tx: mpsc::UnboundedSender<Message>) -> Uuid {
        let id = Uuid::new_v4();
        self.peers.insert(id, PeerConnection { id, tx });
        id
    }

    /// Forget a peer; unknown ids are ignored.
    pub fn unregister(&self, id: &Uuid) {
        self.peers.remove(id);
    }

    /// Number of registered peers.
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Deliver `payload` verbatim to every registered peer, sender included.
    ///
    /// Peers whose writer is gone are dropped from the registry. Returns how many
    /// peers accepted the frame.
    pub fn broadcast(&self, payload: &str) -> usize {
        let targets: Vec<PeerConnection> = self
            .peers
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        let mut delivered = 0;
        for peer in targets {
            if peer.tx.send(Message::Text(payload.into())).is_ok() {
                delivered += 1;
            } else {
                debug!(peer = %peer.id, "dropping chat peer with closed writer");
                self.peers.remove(&peer.id);
            }
        }
        delivered
    }
}
