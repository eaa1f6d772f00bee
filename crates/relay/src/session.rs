use crate::events::{ConnectionInfo, EventSink, RelayEvent};
use axum::extract::ws::Message;
use futures::{Stream, StreamExt};
use serde_json::Value;

/// Drain one connection, turning every inbound frame into an event.
///
/// Nothing is ever written back. A close frame is remembered and the stream
/// is polled until it ends so the transport can finish the close handshake.
pub async fn run_session<S>(mut frames: S, conn: ConnectionInfo, sink: &dyn EventSink)
where
    S: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    sink.record(&conn, RelayEvent::Connected);

    let mut reason = String::from("stream ended");
    while let Some(frame) = frames.next().await {
        match frame {
            Ok(Message::Close(frame)) => {
                reason = match frame {
                    Some(frame) if frame.reason.is_empty() => {
                        format!("closed by client (code {})", frame.code)
                    }
                    Some(frame) => {
                        format!("closed by client (code {}: {})", frame.code, frame.reason)
                    }
                    None => "closed by client".to_string(),
                };
            }
            Ok(message) => sink.record(&conn, interpret(message)),
            Err(e) => {
                reason = format!("transport error: {}", e);
                break;
            }
        }
    }

    sink.record(&conn, RelayEvent::Disconnected { reason });
}

/// Classify a single data or control frame.
pub fn interpret(message: Message) -> RelayEvent {
    match message {
        Message::Text(text) => parse(text),
        Message::Binary(bytes) => match String::from_utf8(bytes) {
            Ok(text) => parse(text),
            Err(e) => RelayEvent::Malformed {
                raw: format!("<{} bytes of binary data>", e.as_bytes().len()),
                error: e.utf8_error().to_string(),
            },
        },
        Message::Ping(_) => RelayEvent::Ignored { kind: "ping" },
        Message::Pong(_) => RelayEvent::Ignored { kind: "pong" },
        Message::Close(_) => RelayEvent::Ignored { kind: "close" },
    }
}

fn parse(text: String) -> RelayEvent {
    match serde_json::from_str::<Value>(&text) {
        Ok(value) => RelayEvent::Received(value),
        Err(e) => RelayEvent::Malformed {
            raw: text,
            error: e.to_string(),
        },
    }
}
