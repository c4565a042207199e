use actix::{Actor, ActorContext, AsyncContext, Handler, Message, Running, StreamHandler};
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;

use whiteboard_system::{serde_json, ConnectionId, ShareId, ViewerCommand, ViewerEvent};

use crate::connection_tx::ConnectionTx;
use crate::server::{ServerCommand, ServerTx};
use crate::settings::ServerConfig;

#[derive(Debug)]
pub enum ConnectionCommand {
    Connect { tx: ConnectionTx },
    Bind { from: ConnectionId, share_id: ShareId },
    Disconnect { from: ConnectionId },
}

#[derive(Debug)]
pub enum ConnectionEvent {
    Connected { connection_id: ConnectionId },
    Viewer(ViewerEvent),
}

#[derive(Message)]
#[rtype(result = "()")]
struct ConnectionActorMessage(ConnectionEvent);

enum ConnectionState {
    Idle,
    Connected(ConnectionId),
}

/// One live viewer. Binding is tracked by the server; this only relays frames.
struct ConnectionActor {
    state: ConnectionState,
    // bind received before the server assigned an id
    pending_bind: Option<ShareId>,
    srv_tx: ServerTx,
    buffer: usize,
}

impl ConnectionActor {
    fn send(&self, command: ConnectionCommand) -> bool {
        if self.srv_tx.send(ServerCommand::Connection(command)).is_err() {
            log::error!("Server loop is gone");
            return false;
        }
        true
    }

    fn bind(&mut self, share_id: ShareId, ctx: &mut ws::WebsocketContext<Self>) {
        match self.state {
            ConnectionState::Connected(from) => {
                if !self.send(ConnectionCommand::Bind { from, share_id }) {
                    ctx.stop();
                }
            }
            ConnectionState::Idle => self.pending_bind = Some(share_id),
        }
    }
}

impl Actor for ConnectionActor {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        let (tx, mut rx) = tokio::sync::mpsc::channel::<ConnectionEvent>(self.buffer);

        if !self.send(ConnectionCommand::Connect { tx }) {
            ctx.stop();
            return;
        }

        let addr = ctx.address().recipient();
        let srv_tx = self.srv_tx.clone();

        tokio::spawn(async move {
            log::debug!("connection relay - started");
            while let Some(msg) = rx.recv().await {
                let connected = match msg {
                    ConnectionEvent::Connected { connection_id } => Some(connection_id),
                    _ => None,
                };
                if addr.do_send(ConnectionActorMessage(msg)).is_err() {
                    // actor stopped before it learned its id, so `stopping` could not report it
                    if let Some(from) = connected {
                        let _ = srv_tx.send(ServerCommand::Connection(
                            ConnectionCommand::Disconnect { from },
                        ));
                    }
                    break;
                }
            }
            log::debug!("connection relay - terminated");
        });
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        if let ConnectionState::Connected(from) = self.state {
            self.send(ConnectionCommand::Disconnect { from });
        }

        Running::Stop
    }
}

/// Ingress
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for ConnectionActor {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => ctx.pong(&msg),
            Ok(ws::Message::Text(text)) => {
                log::debug!("Ingress {}", text);
                match ViewerCommand::parse(&text) {
                    Some(ViewerCommand::Bind { share_id }) => self.bind(share_id, ctx),
                    None => log::debug!("Ignoring unrecognized frame"),
                }
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Err(err) => {
                log::warn!("Websocket protocol error: {}", err);
                ctx.stop();
            }
            _ => (),
        }
    }
}

/// Egress
impl Handler<ConnectionActorMessage> for ConnectionActor {
    type Result = ();

    fn handle(
        &mut self,
        msg: ConnectionActorMessage,
        ctx: &mut ws::WebsocketContext<Self>,
    ) -> Self::Result {
        match msg.0 {
            ConnectionEvent::Connected { connection_id } => {
                self.state = ConnectionState::Connected(connection_id);
                if let Some(share_id) = self.pending_bind.take() {
                    self.bind(share_id, ctx);
                }
            }
            ConnectionEvent::Viewer(event) => match serde_json::to_string(&event) {
                Ok(text) => {
                    log::debug!("Egress {}", text);
                    ctx.text(text);
                }
                Err(err) => log::error!("Failed to encode viewer event: {}", err),
            },
        }
    }
}

pub async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    srv_tx: web::Data<ServerTx>,
    config: web::Data<ServerConfig>,
) -> Result<HttpResponse, Error> {
    ws::start(
        ConnectionActor {
            state: ConnectionState::Idle,
            pending_bind: None,
            srv_tx: srv_tx.get_ref().clone(),
            buffer: config.connection_buffer.max(1),
        },
        &req,
        stream,
    )
}
