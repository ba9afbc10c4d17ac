//! WebSocket client implementation.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::protocol::{ClientMessage, ServerMessage};

use super::commands::{Command, HELP, cards_help, parse_command};
use super::state::ClientSession;

/// Reconnect attempts after a dropped connection before giving up.
const RECONNECT_ATTEMPTS: u32 = 3;

/// Pause between reconnect attempts. Must stay well under the server's
/// disconnect grace period for the seat to survive.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type StdinLines = Lines<BufReader<Stdin>>;

/// How one connection ended.
enum Ended {
    /// The user quit or left, or the server shut down.
    Finished,
    /// The socket went away. `joined` says whether the server accepted our
    /// `Join` on it.
    Dropped { joined: bool },
}

/// Connect to a server, join `room_id` as `name`, and relay stdin commands
/// until the user quits or the server goes away.
///
/// A dropped connection is re-established with the resume token from
/// `Joined`, so the seat and vote survive if the server's grace period has
/// not run out.
pub async fn run(host: String, port: u16, room_id: String, name: String) -> Result<(), Error> {
    let url = format!("ws://{}:{}", host, port);
    let mut session = ClientSession::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut failures = 0;
    println!("Type 'help' for commands.");

    loop {
        info!(%url, "Connecting");
        let ended = match tokio_tungstenite::connect_async(&url).await {
            Ok((ws_stream, _)) => {
                let join = ClientMessage::Join {
                    room_id: room_id.clone(),
                    name: name.clone(),
                    resume_token: session.resume_token,
                };
                drive(ws_stream, join, &mut session, &mut lines).await?
            }
            Err(e) if session.can_resume() => {
                warn!(error = %e, "Reconnect failed");
                Ended::Dropped { joined: false }
            }
            Err(e) => return Err(e.into()),
        };

        match ended {
            Ended::Finished => return Ok(()),
            Ended::Dropped { joined } => {
                if joined {
                    failures = 0;
                }
                if !session.can_resume() || failures >= RECONNECT_ATTEMPTS {
                    println!("Connection closed by server");
                    return Ok(());
                }
                failures += 1;
                session.dropped();
                println!(
                    "Connection lost, reconnecting ({}/{})",
                    failures, RECONNECT_ATTEMPTS
                );
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

/// Send `join` and relay messages both ways until this connection ends.
async fn drive(
    ws_stream: WsStream,
    join: ClientMessage,
    session: &mut ClientSession,
    lines: &mut StdinLines,
) -> Result<Ended, Error> {
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    ws_sender.send(encode(&join)?).await?;
    let mut joined = false;

    loop {
        tokio::select! {
            incoming = ws_receiver.next() => {
                let text = match incoming {
                    Some(Ok(Message::Text(text))) => text.to_string(),
                    Some(Ok(Message::Close(_))) | None => return Ok(Ended::Dropped { joined }),
                    Some(Err(e)) => {
                        debug!(error = %e, "Connection lost");
                        return Ok(Ended::Dropped { joined });
                    }
                    Some(Ok(_)) => continue,
                };

                let msg: ServerMessage = match serde_json::from_str(&text) {
                    Ok(m) => m,
                    Err(e) => {
                        warn!(error = %e, "Ignoring undecodable server message");
                        continue;
                    }
                };
                debug!(message = ?msg, "Received");

                let closing = matches!(msg, ServerMessage::ServerClosing);
                joined |= matches!(msg, ServerMessage::Joined { .. });
                if let Some(line) = session.apply(msg) {
                    println!("{}", line);
                }
                if let Some(reason) = session.closed.take() {
                    if closing {
                        break;
                    }
                    return Err(Error::Rejected(reason));
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match parse_command(&line) {
                    Ok(Some(Command::Send(msg))) => {
                        let leaving = msg == ClientMessage::Leave;
                        if let Err(e) = ws_sender.send(encode(&msg)?).await {
                            debug!(error = %e, "Send failed");
                            return Ok(Ended::Dropped { joined });
                        }
                        if leaving {
                            session.left();
                            println!("Left the room");
                            break;
                        }
                    }
                    Ok(Some(Command::Cards)) => println!("{}", cards_help()),
                    Ok(Some(Command::Help)) => println!("{}", HELP),
                    Ok(Some(Command::Quit)) => break,
                    Ok(None) => {}
                    Err(e) => println!("{}", e),
                }
            }
        }
    }

    let _ = ws_sender.close().await;
    Ok(Ended::Finished)
}

fn encode(msg: &ClientMessage) -> Result<Message, Error> {
    let json = serde_json::to_string(msg)?;
    Ok(Message::Text(json.into()))
}
