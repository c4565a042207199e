use crate::document_store::DocumentStore;
use crate::error::DeliveryError;
use crate::message::{BoardSaved, ViewerEvent};
use crate::storage::DocumentStorage;
use crate::subscription::SubscriptionManager;
use crate::types::{ConnectionId, ShareId};
use std::collections::HashMap;

/// Per-connection queue the dispatcher pushes into. Must never block.
pub trait Outbox {
    fn push(&mut self, event: &ViewerEvent) -> Result<(), DeliveryError>;
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub share_id: Option<ShareId>,
    pub delivered: usize,
    pub dropped: usize,
    /// Subscribers whose outbox is gone for good.
    pub closed: Vec<ConnectionId>,
}

/// Fans a saved board out to every connection bound to its share id.
///
/// Delivery is fire-and-forget: an outbox that is closed or full is skipped
/// and the event is gone for that connection.
pub struct BroadcastDispatcher<O> {
    outboxes: HashMap<ConnectionId, O>,
}

impl<O: Outbox> BroadcastDispatcher<O> {
    pub fn new() -> Self {
        Self {
            outboxes: HashMap::new(),
        }
    }

    pub fn register(&mut self, connection_id: ConnectionId, outbox: O) {
        self.outboxes.insert(connection_id, outbox);
    }

    pub fn remove(&mut self, connection_id: ConnectionId) -> Option<O> {
        self.outboxes.remove(&connection_id)
    }

    pub fn dispatch<S: DocumentStorage>(
        &mut self,
        saved: &BoardSaved,
        store: &DocumentStore<S>,
        subscriptions: &SubscriptionManager,
    ) -> DispatchReport {
        let share_id = match store.share_of(&saved.board_id) {
            Some(share_id) => share_id.clone(),
            None => return DispatchReport::default(),
        };

        let event = saved.to_viewer_event();
        let mut report = DispatchReport {
            share_id: Some(share_id.clone()),
            ..DispatchReport::default()
        };
        for connection_id in subscriptions.subscribers_of(&share_id) {
            let result = match self.outboxes.get_mut(&connection_id) {
                Some(outbox) => outbox.push(&event),
                None => Err(DeliveryError::Closed),
            };
            match result {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    if err == DeliveryError::Closed {
                        report.closed.push(connection_id);
                    }
                    log::warn!(
                        "Dropped update of share {} for connection {}: {}",
                        share_id,
                        connection_id,
                        err
                    );
                    report.dropped += 1;
                }
            }
        }

        log::debug!(
            "Pushed board {} to share {} ({} delivered, {} dropped)",
            saved.board_id,
            share_id,
            report.delivered,
            report.dropped
        );
        report
    }
}

impl<O: Outbox> Default for BroadcastDispatcher<O> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct RecordingOutbox {
        events: Rc<RefCell<Vec<ViewerEvent>>>,
        closed: bool,
    }

    impl Outbox for RecordingOutbox {
        fn push(&mut self, event: &ViewerEvent) -> Result<(), DeliveryError> {
            if self.closed {
                return Err(DeliveryError::Closed);
            }
            self.events.borrow_mut().push(event.clone());
            Ok(())
        }
    }

    #[test]
    fn it_pushes_only_to_subscribers_of_the_board_share() {
        let mut store = DocumentStore::open(MemoryStorage::new());
        let mut subscriptions = SubscriptionManager::new();
        let mut dispatcher = BroadcastDispatcher::new();

        let board_id = store.create().lenient();
        let other_board = store.create().lenient();
        let share_id = store.generate_share(&board_id).unwrap().lenient();
        let other_share = store.generate_share(&other_board).unwrap().lenient();

        let watching = RecordingOutbox::default();
        let elsewhere = RecordingOutbox::default();
        let idle = RecordingOutbox::default();
        for (outbox, share) in vec![
            (&watching, Some(&share_id)),
            (&elsewhere, Some(&other_share)),
            (&idle, None),
        ] {
            let connection_id = subscriptions.connect();
            if let Some(share) = share {
                subscriptions.bind(share, connection_id).unwrap();
            }
            dispatcher.register(connection_id, outbox.clone());
        }

        let saved = store
            .save(&board_id, "Plan v2".into(), json!({"shapes": [1]}))
            .unwrap()
            .lenient();
        let report = dispatcher.dispatch(&saved, &store, &subscriptions);

        assert_eq!(report.delivered, 1);
        assert_eq!(
            *watching.events.borrow(),
            vec![ViewerEvent::Update {
                title: "Plan v2".into(),
                content: json!({"shapes": [1]})
            }]
        );
        assert!(elsewhere.events.borrow().is_empty());
        assert!(idle.events.borrow().is_empty());
    }

    #[test]
    fn it_skips_closed_outboxes_without_stalling_others() {
        let mut store = DocumentStore::open(MemoryStorage::new());
        let mut subscriptions = SubscriptionManager::new();
        let mut dispatcher = BroadcastDispatcher::new();

        let board_id = store.create().lenient();
        let share_id = store.generate_share(&board_id).unwrap().lenient();

        let closed = RecordingOutbox {
            closed: true,
            ..RecordingOutbox::default()
        };
        let open = RecordingOutbox::default();
        let mut ids = Vec::new();
        for outbox in vec![closed, open.clone()] {
            let connection_id = subscriptions.connect();
            subscriptions.bind(&share_id, connection_id).unwrap();
            dispatcher.register(connection_id, outbox);
            ids.push(connection_id);
        }

        let saved = store
            .save(&board_id, "t".into(), json!({}))
            .unwrap()
            .lenient();
        let report = dispatcher.dispatch(&saved, &store, &subscriptions);

        assert_eq!(report.dropped, 1);
        assert_eq!(report.delivered, 1);
        assert_eq!(report.closed, vec![ids[0]]);
        assert_eq!(open.events.borrow().len(), 1);
    }

    #[test]
    fn it_does_nothing_for_unshared_board() {
        let mut store = DocumentStore::open(MemoryStorage::new());
        let subscriptions = SubscriptionManager::new();
        let mut dispatcher: BroadcastDispatcher<RecordingOutbox> = BroadcastDispatcher::new();

        let board_id = store.create().lenient();
        let saved = store
            .save(&board_id, "t".into(), json!({}))
            .unwrap()
            .lenient();

        assert_eq!(
            dispatcher.dispatch(&saved, &store, &subscriptions),
            DispatchReport::default()
        );
    }
}
