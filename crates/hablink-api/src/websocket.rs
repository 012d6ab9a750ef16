//! WebSocket push channel.
//!
//! Some local devices push the same status text they serve over HTTP through
//! a WebSocket. [`PushChannel`] owns one such connection: it connects
//! eagerly, forwards text frames through an mpsc channel, and flips
//! [`is_open`](PushChannel::is_open) to `false` once the socket drops.
//! There is no internal reconnect loop -- the owner's polling timer notices
//! a closed channel and connects a new one.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//!
//! use hablink_api::websocket::PushChannel;
//! use tokio_util::sync::CancellationToken;
//! use url::Url;
//!
//! let cancel = CancellationToken::new();
//! let url = Url::parse("ws://192.168.1.50/ws")?;
//! let mut push = PushChannel::connect(url, cancel.child_token(), Duration::from_secs(10)).await?;
//!
//! while let Some(message) = push.recv().await {
//!     println!("{}", message.text);
//! }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;

// ── Channel capacity ─────────────────────────────────────────────────

const MESSAGE_CHANNEL_CAPACITY: usize = 64;

// ── PushMessage ──────────────────────────────────────────────────────

/// One text frame received from the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushMessage {
    pub text: String,
}

// ── PushChannel ──────────────────────────────────────────────────────

/// Handle to a live push connection.
///
/// Dropping the handle cancels the reader task.
pub struct PushChannel {
    url: Url,
    message_rx: mpsc::Receiver<PushMessage>,
    open: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl PushChannel {
    /// Connect to `url` and spawn the reader task.
    ///
    /// Unlike a fire-and-forget stream, the handshake happens before this
    /// returns, so an unreachable device surfaces as `WebSocketConnect`.
    /// The handshake is bounded by `timeout` and abandoned as soon as
    /// `cancel` fires.
    pub async fn connect(
        url: Url,
        cancel: CancellationToken,
        timeout: Duration,
    ) -> Result<Self, Error> {
        Self::connect_with_cookie(url, cancel, None, timeout).await
    }

    /// Like [`connect`](Self::connect), injecting a `Cookie` header on the
    /// upgrade request for session-authenticated endpoints.
    pub async fn connect_with_cookie(
        url: Url,
        cancel: CancellationToken,
        cookie: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, Error> {
        tracing::info!(url = %url, "Connecting to WebSocket");

        let uri: tungstenite::http::Uri = url.as_str().parse().map_err(
            |e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()),
        )?;

        let mut request = ClientRequestBuilder::new(uri);
        if let Some(cookie_val) = cookie {
            request = request.with_header("Cookie", cookie_val);
        }

        let handshake = tokio::time::timeout(timeout, tokio_tungstenite::connect_async(request));
        let (ws_stream, _response) = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Err(Error::WebSocketConnect("connect cancelled".into()));
            }
            result = handshake => match result {
                Ok(connected) => connected.map_err(|e| Error::WebSocketConnect(e.to_string()))?,
                Err(_) => {
                    return Err(Error::Timeout {
                        timeout_secs: timeout.as_secs(),
                    });
                }
            },
        };

        tracing::info!("WebSocket connected");

        let (message_tx, message_rx) = mpsc::channel(MESSAGE_CHANNEL_CAPACITY);
        let open = Arc::new(AtomicBool::new(true));

        let task_open = Arc::clone(&open);
        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            let (_write, read) = ws_stream.split();
            if let Err(e) = read_loop(read, &message_tx, &task_cancel).await {
                tracing::warn!(error = %e, "WebSocket error");
            }
            task_open.store(false, Ordering::Release);
            tracing::debug!("WebSocket reader exiting");
        });

        Ok(Self {
            url,
            message_rx,
            open,
            cancel,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Whether the socket is still connected.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire) && !self.cancel.is_cancelled()
    }

    /// Next text frame; `None` once the socket is closed and drained.
    pub async fn recv(&mut self) -> Option<PushMessage> {
        self.message_rx.recv().await
    }

    /// Close the connection.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for PushChannel {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Read frames until the socket drops or the channel is cancelled.
async fn read_loop<S>(
    mut read: S,
    message_tx: &mpsc::Sender<PushMessage>,
    cancel: &CancellationToken,
) -> Result<(), Error>
where
    S: futures_util::Stream<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
{
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(()),
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        tracing::trace!(message = %text.as_str(), "WebSocket message");
                        let message = PushMessage { text: text.as_str().to_owned() };
                        if message_tx.send(message).await.is_err() {
                            // Receiver gone: nobody is listening any more.
                            return Ok(());
                        }
                    }
                    Some(Ok(tungstenite::Message::Ping(_))) => {
                        // tungstenite handles pong replies automatically
                        tracing::trace!("WebSocket ping");
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        if let Some(ref cf) = frame {
                            tracing::info!(
                                code = %cf.code,
                                reason = %cf.reason,
                                "WebSocket close frame received"
                            );
                        } else {
                            tracing::info!("WebSocket close frame received (no payload)");
                        }
                        return Ok(());
                    }
                    Some(Err(e)) => {
                        return Err(Error::WebSocketConnect(e.to_string()));
                    }
                    None => {
                        tracing::info!("WebSocket stream ended");
                        return Ok(());
                    }
                    _ => {
                        // Binary, Pong, Frame -- ignore
                    }
                }
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use futures_util::stream;

    use super::*;

    #[tokio::test]
    async fn read_loop_forwards_text_and_stops_on_close() {
        let frames = stream::iter(vec![
            Ok(tungstenite::Message::text("pos:o")),
            Ok(tungstenite::Message::Ping(Vec::new().into())),
            Ok(tungstenite::Message::Close(None)),
            Ok(tungstenite::Message::text("never delivered")),
        ]);
        let (tx, mut rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();

        read_loop(frames, &tx, &cancel).await.unwrap();

        assert_eq!(rx.recv().await.unwrap().text, "pos:o");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn read_loop_surfaces_stream_errors() {
        let frames = stream::iter(vec![Err(tungstenite::Error::ConnectionClosed)]);
        let (tx, _rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();

        let result = read_loop(frames, &tx, &cancel).await;
        assert!(matches!(result, Err(Error::WebSocketConnect(_))));
    }

    #[tokio::test]
    async fn read_loop_honours_cancellation() {
        let frames = stream::pending::<Result<tungstenite::Message, tungstenite::Error>>();
        let (tx, _rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        cancel.cancel();

        read_loop(frames, &tx, &cancel).await.unwrap();
    }

    const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

    #[tokio::test]
    async fn connect_to_closed_port_fails() {
        let url = Url::parse("ws://127.0.0.1:9/ws").unwrap();
        let result = PushChannel::connect(url, CancellationToken::new(), CONNECT_TIMEOUT).await;
        assert!(matches!(result, Err(Error::WebSocketConnect(_))));
    }

    /// A listener that accepts TCP but never answers the upgrade request.
    async fn silent_listener() -> (Url, tokio::task::JoinHandle<()>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = Url::parse(&format!("ws://{}/ws", listener.local_addr().unwrap())).unwrap();
        let task = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        (url, task)
    }

    #[tokio::test]
    async fn stalled_handshake_times_out() {
        let (url, server) = silent_listener().await;

        let started = tokio::time::Instant::now();
        let result = PushChannel::connect(url, CancellationToken::new(), CONNECT_TIMEOUT).await;

        assert!(matches!(result, Err(Error::Timeout { timeout_secs: 2 })));
        assert!(started.elapsed() < Duration::from_secs(10));
        server.abort();
    }

    #[tokio::test]
    async fn stalled_handshake_gives_up_on_cancel() {
        let (url, server) = silent_listener().await;
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let result = tokio::time::timeout(
            Duration::from_secs(10),
            PushChannel::connect(url, cancel, Duration::from_secs(3600)),
        )
        .await
        .expect("connect ignored cancellation");

        assert!(matches!(result, Err(Error::WebSocketConnect(_))));
        server.abort();
    }
}
