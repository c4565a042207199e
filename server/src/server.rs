use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tokio::sync::oneshot;

use whiteboard_system::{
    BoardId, BoardSummary, BroadcastDispatcher, Committed, ConnectionId, DocumentStorage,
    DocumentStore, SaveRequest, ShareId, SharedBoard, StoreError, SubscriptionManager,
    WhiteboardDocument,
};

use crate::connection::{ConnectionCommand, ConnectionEvent};
use crate::connection_tx::ConnectionOutbox;
use crate::settings::ServerConfig;

pub type ServerTx = UnboundedSender<ServerCommand>;
pub type Reply<T> = oneshot::Sender<Result<T, StoreError>>;

#[derive(Debug)]
pub enum ServerCommand {
    Connection(ConnectionCommand),
    Board(BoardCommand),
}

#[derive(Debug)]
pub enum BoardCommand {
    List {
        tx: oneshot::Sender<Vec<BoardSummary>>,
    },
    Create {
        tx: Reply<BoardId>,
    },
    Load {
        board_id: BoardId,
        tx: Reply<WhiteboardDocument>,
    },
    Save {
        request: SaveRequest,
        tx: Reply<()>,
    },
    Delete {
        board_id: BoardId,
        tx: Reply<()>,
    },
    GenerateShare {
        board_id: BoardId,
        tx: Reply<ShareId>,
    },
    ResolveShare {
        share_id: ShareId,
        tx: Reply<SharedBoard>,
    },
}

/// Owns every piece of mutable state. Commands are handled one at a time.
struct Server<S> {
    store: DocumentStore<S>,
    subscriptions: SubscriptionManager,
    dispatcher: BroadcastDispatcher<ConnectionOutbox>,
    strict_persistence: bool,
}

impl<S: DocumentStorage> Server<S> {
    fn new(store: DocumentStore<S>, strict_persistence: bool) -> Self {
        Self {
            store,
            subscriptions: SubscriptionManager::new(),
            dispatcher: BroadcastDispatcher::new(),
            strict_persistence,
        }
    }

    fn handle_command(&mut self, command: ServerCommand) {
        match command {
            ServerCommand::Connection(command) => self.handle_connection_command(command),
            ServerCommand::Board(command) => self.handle_board_command(command),
        }
    }

    fn handle_connection_command(&mut self, command: ConnectionCommand) {
        match command {
            ConnectionCommand::Connect { tx } => {
                let connection_id = self.subscriptions.connect();
                let mut outbox = ConnectionOutbox::new(tx);
                match outbox.send(ConnectionEvent::Connected { connection_id }) {
                    Ok(()) => self.dispatcher.register(connection_id, outbox),
                    Err(err) => {
                        log::warn!("Connection {} gone before connect: {}", connection_id, err);
                        self.disconnect(connection_id);
                    }
                }
            }
            ConnectionCommand::Bind { from, share_id } => {
                if let Err(err) = self.subscriptions.bind(&share_id, from) {
                    log::warn!("Ignoring bind to {}: {}", share_id, err);
                }
            }
            ConnectionCommand::Disconnect { from } => self.disconnect(from),
        }
    }

    fn handle_board_command(&mut self, command: BoardCommand) {
        match command {
            BoardCommand::List { tx } => {
                let _ = tx.send(self.store.list_summaries());
            }
            BoardCommand::Create { tx } => {
                let committed = self.store.create();
                let _ = tx.send(self.settle(committed));
            }
            BoardCommand::Load { board_id, tx } => {
                let _ = tx.send(self.store.load(&board_id).map(|d| d.clone()));
            }
            BoardCommand::Save { request, tx } => {
                let _ = tx.send(self.save(request));
            }
            BoardCommand::Delete { board_id, tx } => {
                let committed = self.store.delete(&board_id).map(|_| ());
                let _ = tx.send(self.settle(committed));
            }
            BoardCommand::GenerateShare { board_id, tx } => {
                let result = self
                    .store
                    .generate_share(&board_id)
                    .and_then(|committed| self.settle(committed));
                let _ = tx.send(result);
            }
            BoardCommand::ResolveShare { share_id, tx } => {
                let _ = tx.send(self.store.resolve_share(&share_id));
            }
        }
    }

    fn save(&mut self, request: SaveRequest) -> Result<(), StoreError> {
        let (board_id, title, content) = request.validate()?;
        let committed = self.store.save(&board_id, title, content)?;
        let report = self
            .dispatcher
            .dispatch(&committed.value, &self.store, &self.subscriptions);
        for connection_id in report.closed {
            self.disconnect(connection_id);
        }
        self.settle(committed.map(|_| ()))
    }

    fn settle<T>(&self, committed: Committed<T>) -> Result<T, StoreError> {
        if self.strict_persistence {
            committed.strict()
        } else {
            Ok(committed.lenient())
        }
    }

    fn disconnect(&mut self, connection_id: ConnectionId) {
        self.subscriptions.disconnect(connection_id);
        self.dispatcher.remove(connection_id);
        log::debug!("Connection {} disconnected", connection_id);
    }
}

pub fn spawn_server<S>(store: DocumentStore<S>, config: &ServerConfig) -> ServerTx
where
    S: DocumentStorage + Send + 'static,
{
    let (srv_tx, mut srv_rx) = unbounded_channel::<ServerCommand>();
    let strict_persistence = config.strict_persistence;

    tokio::spawn(async move {
        let mut server = Server::new(store, strict_persistence);

        while let Some(command) = srv_rx.recv().await {
            server.handle_command(command);
        }
        log::info!("Server loop terminated");
    });

    srv_tx
}

#[cfg(test)]
mod tests {
    use super::*;
    use whiteboard_system::serde_json::json;
    use whiteboard_system::{ConnectionState, MemoryStorage, ViewerEvent};

    fn server() -> Server<MemoryStorage> {
        Server::new(DocumentStore::open(MemoryStorage::new()), false)
    }

    fn connect(
        server: &mut Server<MemoryStorage>,
    ) -> (ConnectionId, tokio::sync::mpsc::Receiver<ConnectionEvent>) {
        let (tx, mut rx) = tokio::sync::mpsc::channel(4);
        server.handle_connection_command(ConnectionCommand::Connect { tx });
        match rx.try_recv() {
            Ok(ConnectionEvent::Connected { connection_id }) => (connection_id, rx),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn it_pushes_save_to_bound_connection() {
        let mut server = server();
        let board_id = server.store.create().lenient();
        let share_id = server.store.generate_share(&board_id).unwrap().lenient();
        let (connection_id, mut rx) = connect(&mut server);
        server.handle_connection_command(ConnectionCommand::Bind {
            from: connection_id,
            share_id,
        });

        server
            .save(SaveRequest {
                board_id: Some(board_id.to_string()),
                title: Some("Plan v2".into()),
                content: Some(json!({"shapes": [1]})),
            })
            .unwrap();

        match rx.try_recv() {
            Ok(ConnectionEvent::Viewer(ViewerEvent::Update { title, content })) => {
                assert_eq!(title, "Plan v2");
                assert_eq!(content, json!({"shapes": [1]}));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn it_forgets_connection_on_disconnect() {
        let mut server = server();
        let (connection_id, _rx) = connect(&mut server);
        server.handle_connection_command(ConnectionCommand::Bind {
            from: connection_id,
            share_id: ShareId::from("s1"),
        });
        assert!(matches!(
            server.subscriptions.state_of(connection_id),
            Some(ConnectionState::Bound(_))
        ));

        server.handle_connection_command(ConnectionCommand::Disconnect {
            from: connection_id,
        });
        assert_eq!(server.subscriptions.state_of(connection_id), None);
        assert_eq!(server.subscriptions.session_count(), 0);
    }

    #[test]
    fn it_forgets_connection_whose_queue_is_gone() {
        let mut server = server();
        let (tx, rx) = tokio::sync::mpsc::channel(4);
        drop(rx);
        server.handle_connection_command(ConnectionCommand::Connect { tx });
        assert_eq!(server.subscriptions.connection_count(), 0);

        let board_id = server.store.create().lenient();
        let share_id = server.store.generate_share(&board_id).unwrap().lenient();
        let (connection_id, rx) = connect(&mut server);
        server.handle_connection_command(ConnectionCommand::Bind {
            from: connection_id,
            share_id: share_id.clone(),
        });
        drop(rx);

        server
            .save(SaveRequest {
                board_id: Some(board_id.to_string()),
                title: Some("t".into()),
                content: Some(json!({})),
            })
            .unwrap();
        assert_eq!(server.subscriptions.connection_count(), 0);
        assert!(server.subscriptions.subscribers_of(&share_id).is_empty());
    }

    #[test]
    fn it_reports_persistence_failure_only_when_strict() {
        let mut lenient = server();
        lenient.store.storage_mut().set_failing(true);
        let committed = lenient.store.create();
        assert!(lenient.settle(committed).is_ok());

        let mut strict = Server::new(DocumentStore::open(MemoryStorage::new()), true);
        strict.store.storage_mut().set_failing(true);
        let committed = strict.store.create();
        assert!(matches!(
            strict.settle(committed),
            Err(StoreError::PersistenceFailure(_))
        ));
        assert_eq!(strict.store.len(), 1);
    }
}
