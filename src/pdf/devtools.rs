//! DevTools protocol connection to a running browser.
//!
//! Commands are JSON frames carrying a numeric `id`; the browser answers each
//! one with a frame holding the same `id`. Frames without an `id` are events
//! and go to every subscriber.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use super::PdfError;

const EVENT_BUFFER: usize = 256;

type Reply = Result<Value, String>;
type PendingReplies = Arc<Mutex<HashMap<u64, oneshot::Sender<Reply>>>>;

#[derive(Debug, PartialEq)]
enum Frame {
    Reply { id: u64, result: Reply },
    Event(Value),
}

fn classify(text: &str) -> Option<Frame> {
    let value: Value = serde_json::from_str(text).ok()?;
    let Some(id) = value.get("id").and_then(Value::as_u64) else {
        return Some(Frame::Event(value));
    };
    let result = match value.get("error") {
        Some(error) => Err(error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string()),
        None => Ok(value.get("result").cloned().unwrap_or(Value::Null)),
    };
    Some(Frame::Reply { id, result })
}

fn closed() -> PdfError {
    PdfError::Protocol("connection to rendering engine closed".to_string())
}

pub struct DevToolsConnection {
    outgoing: mpsc::UnboundedSender<Message>,
    pending: PendingReplies,
    events: broadcast::Sender<Value>,
    next_id: AtomicU64,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl DevToolsConnection {
    pub async fn connect(url: &str) -> Result<Self, PdfError> {
        let (stream, _response) = connect_async(url)
            .await
            .map_err(|e| PdfError::Protocol(format!("failed to connect to {}: {}", url, e)))?;
        let (mut sink, mut source) = stream.split();

        let (outgoing, mut queue) = mpsc::unbounded_channel::<Message>();
        let writer = tokio::spawn(async move {
            while let Some(message) = queue.recv().await {
                if let Err(e) = sink.send(message).await {
                    log::warn!("DevTools write failed: {}", e);
                    break;
                }
            }
        });

        let pending: PendingReplies = Arc::default();
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let reader = tokio::spawn({
            let pending = pending.clone();
            let events = events.clone();
            async move {
                while let Some(message) = source.next().await {
                    let text = match message {
                        Ok(Message::Text(text)) => text,
                        Ok(Message::Close(_)) => break,
                        Ok(_) => continue,
                        Err(e) => {
                            log::warn!("DevTools read failed: {}", e);
                            break;
                        }
                    };
                    match classify(&text) {
                        Some(Frame::Reply { id, result }) => {
                            if let Some(waiter) = pending.lock().remove(&id) {
                                let _ = waiter.send(result);
                            }
                        }
                        Some(Frame::Event(event)) => {
                            let _ = events.send(event);
                        }
                        None => log::debug!("Ignoring malformed DevTools frame"),
                    }
                }
                // Dropping the senders wakes every waiter with an error.
                pending.lock().clear();
            }
        });

        Ok(Self {
            outgoing,
            pending,
            events,
            next_id: AtomicU64::new(1),
            reader,
            writer,
        })
    }

    pub fn is_open(&self) -> bool {
        !self.reader.is_finished() && !self.writer.is_finished()
    }

    /// Events seen from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Value> {
        self.events.subscribe()
    }

    /// Send one command and wait for its reply.
    pub async fn call(
        &self,
        method: &str,
        params: Value,
        session_id: Option<&str>,
    ) -> Result<Value, PdfError> {
        if !self.is_open() {
            return Err(closed());
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut frame = json!({ "id": id, "method": method, "params": params });
        if let Some(session_id) = session_id {
            frame["sessionId"] = json!(session_id);
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending.lock().insert(id, reply_tx);
        if self.outgoing.send(Message::Text(frame.to_string().into())).is_err() {
            self.pending.lock().remove(&id);
            return Err(closed());
        }

        match reply_rx.await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(message)) => Err(PdfError::Protocol(format!("{} failed: {}", method, message))),
            Err(_) => Err(closed()),
        }
    }
}

impl Drop for DevToolsConnection {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_frames_split_into_replies_and_events() {
        assert_eq!(
            classify(r#"{"id":3,"result":{"frameId":"F"}}"#),
            Some(Frame::Reply {
                id: 3,
                result: Ok(json!({ "frameId": "F" }))
            })
        );
        assert_eq!(
            classify(r#"{"id":4,"error":{"code":-32000,"message":"No target"}}"#),
            Some(Frame::Reply {
                id: 4,
                result: Err("No target".to_string())
            })
        );
        assert_eq!(
            classify(r#"{"method":"Page.loadEventFired","params":{}}"#),
            Some(Frame::Event(json!({ "method": "Page.loadEventFired", "params": {} })))
        );
        assert_eq!(classify("not json"), None);
    }

    #[tokio::test]
    async fn test_replies_matched_by_id_and_events_broadcast() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
            while let Some(Ok(Message::Text(text))) = ws.next().await {
                let request: Value = serde_json::from_str(&text).unwrap();
                let event = json!({
                    "method": "Page.loadEventFired",
                    "sessionId": request["sessionId"],
                    "params": {}
                });
                ws.send(Message::Text(event.to_string().into())).await.unwrap();
                let reply = if request["method"] == "Missing.method" {
                    json!({ "id": request["id"], "error": { "code": -32601, "message": "not found" } })
                } else {
                    json!({ "id": request["id"], "result": { "echo": request["params"] } })
                };
                ws.send(Message::Text(reply.to_string().into())).await.unwrap();
            }
        });

        let connection = DevToolsConnection::connect(&format!("ws://{}", addr))
            .await
            .unwrap();
        let mut events = connection.subscribe();

        let result = connection
            .call("Page.navigate", json!({ "url": "about:blank" }), Some("S1"))
            .await
            .unwrap();
        assert_eq!(result["echo"]["url"], "about:blank");
        assert_eq!(events.recv().await.unwrap()["sessionId"], "S1");

        let failed = connection.call("Missing.method", json!({}), None).await;
        assert!(matches!(failed, Err(PdfError::Protocol(msg)) if msg.contains("not found")));
    }

    #[tokio::test]
    async fn test_connect_refused_is_protocol_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let result = DevToolsConnection::connect(&format!("ws://{}", addr)).await;
        assert!(matches!(result, Err(PdfError::Protocol(_))));
    }
}
