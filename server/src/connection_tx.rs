use crate::connection::ConnectionEvent;
use tokio::sync::mpsc::error::TrySendError;
use whiteboard_system::{DeliveryError, Outbox, ViewerEvent};

pub type ConnectionTx = tokio::sync::mpsc::Sender<ConnectionEvent>;

/// Egress queue of one websocket connection.
pub struct ConnectionOutbox {
    tx: ConnectionTx,
}

impl ConnectionOutbox {
    pub fn new(tx: ConnectionTx) -> Self {
        Self { tx }
    }

    pub fn send(&mut self, event: ConnectionEvent) -> Result<(), DeliveryError> {
        self.tx.try_send(event).map_err(|err| match err {
            TrySendError::Full(_) => DeliveryError::Full,
            TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}

impl Outbox for ConnectionOutbox {
    fn push(&mut self, event: &ViewerEvent) -> Result<(), DeliveryError> {
        self.send(ConnectionEvent::Viewer(event.clone()))
    }
}
