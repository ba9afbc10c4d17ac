//! WebSocket server implementation.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::error::{ActionError, Error};
use crate::protocol::{ClientMessage, ServerMessage};

use super::gateway::{Action, Gateway};
use super::room::ConnectionId;

/// Time given to writer tasks to flush `ServerClosing` before exit.
const SHUTDOWN_FLUSH: Duration = Duration::from_millis(200);

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;
type WsSource = SplitStream<WebSocketStream<TcpStream>>;

/// Run the planning poker server until Ctrl-C.
pub async fn run(config: ServerConfig) -> Result<(), Error> {
    let addr = config.validate()?;
    let listener = TcpListener::bind(addr).await?;
    info!(
        %addr,
        grace_secs = config.grace_period.as_secs(),
        max_rooms = config.max_rooms,
        max_participants = config.max_participants,
        "Server listening"
    );

    let gateway = Arc::new(Gateway::new(&config));
    serve(listener, gateway, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
        }
    })
    .await
}

/// Accept connections on `listener` until `shutdown` resolves.
pub async fn serve<F>(
    listener: TcpListener,
    gateway: Arc<Gateway>,
    shutdown: F,
) -> Result<(), Error>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    tokio::spawn(handle_connection(stream, addr, Arc::clone(&gateway)));
                }
                Err(e) => {
                    warn!(error = %e, "Failed to accept connection");
                }
            },
            _ = &mut shutdown => {
                info!("Shutting down");
                gateway.shutdown().await;
                tokio::time::sleep(SHUTDOWN_FLUSH).await;
                return Ok(());
            }
        }
    }
}

/// Handle a single WebSocket connection.
async fn handle_connection(stream: TcpStream, addr: SocketAddr, gateway: Arc<Gateway>) {
    let ws_stream = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(%addr, error = %e, "WebSocket handshake failed");
            return;
        }
    };
    debug!(%addr, "Connection accepted");

    let (ws_sender, ws_receiver) = ws_stream.split();
    let (tx, rx) = mpsc::unbounded_channel::<ServerMessage>();
    let _ = tx.send(ServerMessage::ConnectionAck);

    let send_task = tokio::spawn(forward_outbound(rx, ws_sender));
    let connection = handle_messages(ws_receiver, &tx, &gateway).await;

    if let Some(connection_id) = connection {
        gateway.disconnect(connection_id).await;
    }
    debug!(%addr, "Connection closed");
    send_task.abort();
}

/// Forward messages from the outbox channel to the WebSocket.
async fn forward_outbound(mut rx: mpsc::UnboundedReceiver<ServerMessage>, mut ws_sender: WsSink) {
    while let Some(msg) = rx.recv().await {
        let json = match serde_json::to_string(&msg) {
            Ok(json) => json,
            Err(e) => {
                error!(error = %e, "Failed to encode server message");
                continue;
            }
        };
        if ws_sender.send(Message::Text(json.into())).await.is_err() {
            break;
        }
    }
}

/// Read client messages until the socket closes. Returns the connection
/// still bound to a room at that point, if any.
async fn handle_messages(
    mut ws_receiver: WsSource,
    tx: &mpsc::UnboundedSender<ServerMessage>,
    gateway: &Gateway,
) -> Option<ConnectionId> {
    let mut connection: Option<ConnectionId> = None;

    while let Some(msg) = ws_receiver.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text.to_string(),
            Ok(Message::Close(_)) => break,
            Err(e) => {
                debug!(error = %e, "Connection lost");
                break;
            }
            _ => continue,
        };

        let result = match serde_json::from_str::<ClientMessage>(&text) {
            Ok(client_msg) => {
                debug!(message = ?client_msg, "Received");
                handle_client_message(client_msg, &mut connection, tx, gateway).await
            }
            Err(e) => Err(ActionError::BadRequest(e.to_string())),
        };

        if let Err(err) = result {
            warn!(code = err.code(), reason = %err, "Action rejected");
            let _ = tx.send(ServerMessage::from(&err));
        }
    }

    connection
}

/// Handle a single client message.
async fn handle_client_message(
    msg: ClientMessage,
    connection: &mut Option<ConnectionId>,
    tx: &mpsc::UnboundedSender<ServerMessage>,
    gateway: &Gateway,
) -> Result<(), ActionError> {
    let action = match msg {
        ClientMessage::Join {
            room_id,
            name,
            resume_token,
        } => {
            if connection.is_some() {
                return Err(ActionError::AlreadyJoined(room_id));
            }
            let joined = gateway
                .connect(&room_id, &name, resume_token, tx.clone())
                .await?;
            *connection = Some(joined.connection_id);
            return Ok(());
        }
        ClientMessage::Leave => {
            let connection_id = connection.take().ok_or(ActionError::NotJoined)?;
            return gateway.leave(connection_id).await;
        }
        ClientMessage::Vote { value } => Action::Vote(value.as_raw()),
        ClientMessage::Reveal => Action::Reveal,
        ClientMessage::Reset => Action::Reset,
    };

    let connection_id = connection.ok_or(ActionError::NotJoined)?;
    gateway.on_client_action(connection_id, action).await
}
