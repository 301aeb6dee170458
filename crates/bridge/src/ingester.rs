//! The long-lived contentapi live stream connection.
//!
//! Losses of an established stream are expected operating conditions and
//! are retried forever on a fixed delay; only the very first connection
//! attempt is fatal, so a misconfigured deployment fails at startup
//! instead of retrying into the void.

use {
    async_trait::async_trait,
    futures::{SinkExt, StreamExt},
    mirrorbot_contentapi::{ContentApiClient, MessageEvent, parse_message_events},
    std::{sync::Arc, time::Duration},
    tokio::{net::TcpStream, sync::watch},
    tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message},
    tracing::{debug, info, warn},
};

use crate::Result;

const RECONNECT_DELAY: Duration = Duration::from_secs(10);

/// Where the ingester currently is in its connection lifecycle, published
/// through a watch channel for health reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngesterStatus {
    Connecting,
    Connected,
    Reconnecting,
    Terminated,
}

/// Consumer of decoded live events. Delivery failures are logged and do not
/// stop the stream.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn deliver(&self, event: MessageEvent) -> anyhow::Result<()>;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct Ingester {
    stream_url: String,
    contentapi: ContentApiClient,
    sink: Arc<dyn EventSink>,
    reconnect_delay: Duration,
    status: watch::Sender<IngesterStatus>,
}

impl Ingester {
    pub fn new(stream_url: String, contentapi: ContentApiClient, sink: Arc<dyn EventSink>) -> Self {
        let (status, _) = watch::channel(IngesterStatus::Connecting);
        Self {
            stream_url,
            contentapi,
            sink,
            reconnect_delay: RECONNECT_DELAY,
            status,
        }
    }

    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Observe connection lifecycle transitions.
    pub fn status(&self) -> watch::Receiver<IngesterStatus> {
        self.status.subscribe()
    }

    /// Drive the stream until the first connection attempt fails. Never
    /// returns `Ok`.
    pub async fn run(&self) -> Result<()> {
        let mut first = true;
        loop {
            let session = self.connect().await;
            let (stream, own_user_id) = match session {
                Ok(session) => session,
                Err(err) if first => {
                    self.status.send_replace(IngesterStatus::Terminated);
                    return Err(err);
                }
                Err(err) => {
                    warn!(error = %err, "reconnect attempt failed");
                    tokio::time::sleep(self.reconnect_delay).await;
                    continue;
                }
            };
            first = false;
            self.status.send_replace(IngesterStatus::Connected);
            info!("live stream connected");

            if let Err(err) = self.pump(stream, own_user_id).await {
                warn!(error = %err, "live stream dropped");
            }
            self.status.send_replace(IngesterStatus::Reconnecting);
            tokio::time::sleep(self.reconnect_delay).await;
        }
    }

    /// Establish one stream session. The relay's own user id is re-resolved
    /// every time so a token swap takes effect on reconnect.
    async fn connect(&self) -> Result<(WsStream, i64)> {
        let own_user_id = self.contentapi.current_user_id().await?;
        let (stream, _) = connect_async(self.stream_url.as_str()).await?;
        Ok((stream, own_user_id))
    }

    /// Read frames until the peer closes or the connection errors. A clean
    /// close and an abnormal drop both end in a reconnect.
    async fn pump(&self, mut stream: WsStream, own_user_id: i64) -> Result<()> {
        while let Some(frame) = stream.next().await {
            match frame? {
                Message::Text(text) => self.handle_frame(&text, own_user_id).await,
                Message::Ping(payload) => stream.send(Message::Pong(payload)).await?,
                Message::Close(_) => return Ok(()),
                _ => {}
            }
        }
        Ok(())
    }

    async fn handle_frame(&self, text: &str, own_user_id: i64) {
        let events = match parse_message_events(text) {
            Ok(events) => events,
            Err(err) => {
                // One undecodable frame is not worth dropping the stream.
                warn!(error = %err, "ignoring undecodable live frame");
                return;
            }
        };
        for event in events {
            if event.user.id == own_user_id {
                debug!(message_id = event.message.id, "skipping reflection of own message");
                continue;
            }
            if let Err(err) = self.sink.deliver(event).await {
                warn!(error = %err, "event sink rejected live event");
            }
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        secrecy::Secret,
        std::sync::Mutex,
        tokio::net::TcpListener,
        url::Url,
    };

    struct RecordingSink {
        delivered: Mutex<Vec<i64>>,
    }

    #[async_trait]
    impl EventSink for RecordingSink {
        async fn deliver(&self, event: MessageEvent) -> anyhow::Result<()> {
            self.delivered.lock().unwrap().push(event.message.id);
            Ok(())
        }
    }

    fn sink() -> Arc<RecordingSink> {
        Arc::new(RecordingSink {
            delivered: Mutex::new(Vec::new()),
        })
    }

    async fn wait_for_deliveries(sink: &RecordingSink, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while sink.delivered.lock().unwrap().len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    fn live_frame(message_id: i64, user_id: i64) -> String {
        serde_json::json!({
            "type": "live",
            "data": {
                "events": [{ "refId": message_id }],
                "objects": {
                    "message_event": {
                        "message": [{
                            "id": message_id,
                            "text": "hi",
                            "contentId": 42,
                            "createUserId": user_id,
                        }],
                        "user": [{ "id": user_id, "username": "ann" }]
                    }
                }
            }
        })
        .to_string()
    }

    async fn me_server(own_id: i64) -> mockito::ServerGuard {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/User/me")
            .with_status(200)
            .with_body(format!(r#"{{"id": {own_id}}}"#))
            .create_async()
            .await;
        server
    }

    fn contentapi(server: &mockito::Server) -> ContentApiClient {
        ContentApiClient::new(
            Url::parse(&server.url()).unwrap(),
            Secret::new("tok".into()),
        )
    }

    #[tokio::test]
    async fn first_connection_failure_is_fatal() {
        // No /User/me mock, so the session setup fails immediately.
        let server = mockito::Server::new_async().await;
        let ingester = Ingester::new(
            "ws://127.0.0.1:1/live".into(),
            contentapi(&server),
            sink(),
        );
        let status = ingester.status();

        assert!(ingester.run().await.is_err());
        assert_eq!(*status.borrow(), IngesterStatus::Terminated);
    }

    #[tokio::test]
    async fn delivers_events_and_filters_own_messages() {
        let server = me_server(9).await;
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
            // Own message (user 9) must be filtered; user 7's goes through.
            ws.send(Message::text(live_frame(10, 9))).await.unwrap();
            ws.send(Message::text(live_frame(11, 7))).await.unwrap();
            futures::future::pending::<()>().await;
        });

        let sink = sink();
        let ingester = Ingester::new(
            format!("ws://{addr}/live"),
            contentapi(&server),
            Arc::clone(&sink) as Arc<dyn EventSink>,
        );
        let runner = tokio::spawn(async move { ingester.run().await });

        wait_for_deliveries(&sink, 1).await;
        assert_eq!(*sink.delivered.lock().unwrap(), vec![11]);
        runner.abort();
    }

    #[tokio::test]
    async fn reconnects_after_stream_drop() {
        let server = me_server(9).await;
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            // First session delivers one frame then drops abnormally.
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
            ws.send(Message::text(live_frame(10, 7))).await.unwrap();
            drop(ws);

            // Second session delivers another and stays open.
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
            ws.send(Message::text(live_frame(11, 7))).await.unwrap();
            futures::future::pending::<()>().await;
        });

        let sink = sink();
        let ingester = Ingester::new(
            format!("ws://{addr}/live"),
            contentapi(&server),
            Arc::clone(&sink) as Arc<dyn EventSink>,
        )
        .with_reconnect_delay(Duration::from_millis(10));
        let status = ingester.status();
        let runner = tokio::spawn(async move { ingester.run().await });

        wait_for_deliveries(&sink, 2).await;
        assert_eq!(*sink.delivered.lock().unwrap(), vec![10, 11]);
        assert_eq!(*status.borrow(), IngesterStatus::Connected);
        runner.abort();
    }

    #[tokio::test]
    async fn undecodable_frames_are_skipped() {
        let server = me_server(9).await;
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
            ws.send(Message::text("{not json".to_string())).await.unwrap();
            ws.send(Message::text(live_frame(12, 7))).await.unwrap();
            futures::future::pending::<()>().await;
        });

        let sink = sink();
        let ingester = Ingester::new(
            format!("ws://{addr}/live"),
            contentapi(&server),
            Arc::clone(&sink) as Arc<dyn EventSink>,
        );
        let runner = tokio::spawn(async move { ingester.run().await });

        wait_for_deliveries(&sink, 1).await;
        assert_eq!(*sink.delivered.lock().unwrap(), vec![12]);
        runner.abort();
    }
}
