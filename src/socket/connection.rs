use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::{Request, Response};
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use url::Url;

use crate::config::SocketOptions;
use crate::error::{ChatError, Result};
use crate::socket::{Connector, EventDispatcher, ReadyState, SocketEvent, SocketEvents, Transport};

static NEXT_SOCKET_ID: AtomicU32 = AtomicU32::new(1);

#[cfg(feature = "native-tls")]
type ClientStream = WebSocketStream<tokio_tungstenite::MaybeTlsStream<TcpStream>>;
#[cfg(not(feature = "native-tls"))]
type ClientStream = WebSocketStream<TcpStream>;

/// Frames queued for the writer task.
#[derive(Debug)]
enum Outgoing {
    Text(String),
    Close { code: u16, reason: String },
}

#[derive(Clone, Debug)]
struct SharedState(Arc<AtomicU32>);

impl SharedState {
    fn new(state: ReadyState) -> Self {
        Self(Arc::new(AtomicU32::new(state as u32)))
    }

    fn load(&self) -> ReadyState {
        ReadyState::from_u32(self.0.load(Ordering::SeqCst))
    }

    fn store(&self, state: ReadyState) {
        self.0.store(state as u32, Ordering::SeqCst);
    }
}

/// A single client connection.
///
/// Dropping an open socket closes it with code 1001 (going away).
pub struct WebSocket {
    id: u32,
    url: Url,
    sender: mpsc::UnboundedSender<Outgoing>,
    ready_state: SharedState,
}

impl WebSocket {
    /// Start connecting to `url`; returns immediately in the `Connecting`
    /// state together with the receiving end of the socket's events.
    pub fn open(url: Url, options: &SocketOptions) -> (WebSocket, SocketEvents) {
        let id = NEXT_SOCKET_ID.fetch_add(1, Ordering::SeqCst);
        let (dispatcher, events) = SocketEvents::channel(id);
        let (tx, rx) = mpsc::unbounded_channel::<Outgoing>();
        let ready_state = SharedState::new(ReadyState::Connecting);

        let socket = WebSocket {
            id,
            url: url.clone(),
            sender: tx,
            ready_state: ready_state.clone(),
        };

        let options = options.clone();

        // Spawn on a separate thread with its own tokio runtime
        std::thread::spawn(move || {
            let rt = match tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .worker_threads(options.worker_threads.max(1))
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    log::error!("[WebSocket {}] Failed to create runtime: {}", id, e);
                    ready_state.store(ReadyState::Closed);
                    dispatcher.fail(format!("Runtime failed: {}", e), "Runtime failed");
                    return;
                }
            };

            rt.block_on(run_connection(url, options, rx, ready_state, dispatcher));
        });

        (socket, events)
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl Transport for WebSocket {
    fn send(&self, data: String) -> Result<()> {
        if self.ready_state.load() != ReadyState::Open {
            return Err(ChatError::NotOpen);
        }
        self.sender
            .send(Outgoing::Text(data))
            .map_err(|_| ChatError::NotOpen)
    }

    fn ready_state(&self) -> ReadyState {
        self.ready_state.load()
    }

    fn close(&self, code: u16, reason: &str) {
        match self.ready_state.load() {
            ReadyState::Closing | ReadyState::Closed => return,
            ReadyState::Connecting | ReadyState::Open => {}
        }
        self.ready_state.store(ReadyState::Closing);
        log::info!("[WebSocket {}] Closing ({} {})", self.id, code, reason);
        let _ = self.sender.send(Outgoing::Close {
            code,
            reason: reason.to_string(),
        });
    }
}

impl Drop for WebSocket {
    fn drop(&mut self) {
        self.close(1001, "Going away");
    }
}

/// Opens real [`WebSocket`] connections.
#[derive(Clone, Copy, Debug, Default)]
pub struct WebSocketConnector;

impl Connector for WebSocketConnector {
    type Transport = WebSocket;

    fn connect(&self, url: &Url, options: &SocketOptions) -> (WebSocket, SocketEvents) {
        WebSocket::open(url.clone(), options)
    }
}

async fn run_connection(
    url: Url,
    options: SocketOptions,
    mut rx: mpsc::UnboundedReceiver<Outgoing>,
    ready_state: SharedState,
    dispatcher: EventDispatcher,
) {
    let id = dispatcher.id();
    log::info!("[WebSocket {}] Connecting to {}", id, url);

    let fail = |message: String, reason: &str| {
        ready_state.store(ReadyState::Closed);
        dispatcher.fail(message, reason);
    };

    let default_port = match url.scheme() {
        "ws" => 80,
        "wss" => 443,
        other => {
            log::error!("[WebSocket {}] Unsupported scheme: {}", id, other);
            fail(format!("Invalid URL: unsupported scheme {}", other), "Invalid URL");
            return;
        }
    };
    if url.scheme() == "wss" && !cfg!(feature = "native-tls") {
        log::error!("[WebSocket {}] wss requires the native-tls feature", id);
        fail(
            "Handshake failed: TLS support is not enabled".to_string(),
            "Handshake failed",
        );
        return;
    }
    let host = url.host_str().unwrap_or("localhost");
    let port = url.port().unwrap_or(default_port);
    let addr = format!("{}:{}", host, port);

    log::info!("[WebSocket {}] Connecting TCP to {}", id, addr);

    // Establish TCP connection
    let tcp_stream = match TcpStream::connect(&addr).await {
        Ok(stream) => {
            log::info!("[WebSocket {}] TCP connected", id);
            stream
        }
        Err(e) => {
            log::error!("[WebSocket {}] TCP connection failed: {}", id, e);
            fail(format!("TCP connection failed: {}", e), "Connection failed");
            return;
        }
    };

    // Build WebSocket request
    let mut request = match url.as_str().into_client_request() {
        Ok(req) => req,
        Err(e) => {
            log::error!("[WebSocket {}] Failed to create request: {}", id, e);
            fail(format!("Invalid request: {}", e), "Invalid request");
            return;
        }
    };

    if let Some(origin) = options.origin.as_deref() {
        match HeaderValue::from_str(origin) {
            Ok(value) => {
                request.headers_mut().insert("Origin", value);
            }
            Err(e) => log::warn!("[WebSocket {}] Ignoring invalid origin: {}", id, e),
        }
    }
    if !options.protocols.is_empty() {
        match HeaderValue::from_str(&options.protocols.join(", ")) {
            Ok(value) => {
                request.headers_mut().insert("Sec-WebSocket-Protocol", value);
            }
            Err(e) => log::warn!("[WebSocket {}] Ignoring invalid protocols: {}", id, e),
        }
    }

    log::info!("[WebSocket {}] Performing WebSocket handshake", id);

    let ws_stream = match handshake(request, tcp_stream).await {
        Ok((stream, response)) => {
            log::info!(
                "[WebSocket {}] Connected successfully (status: {})",
                id,
                response.status()
            );
            stream
        }
        Err(e) => {
            log::error!("[WebSocket {}] Handshake failed: {}", id, e);
            fail(format!("Handshake failed: {}", e), "Handshake failed");
            return;
        }
    };

    // A close requested while connecting still waits for the handshake so
    // the close frame can be sent.
    if ready_state.load() == ReadyState::Connecting {
        ready_state.store(ReadyState::Open);
        dispatcher.dispatch(SocketEvent::Open);
    }

    let (mut write, mut read) = ws_stream.split();

    // Forward outgoing frames
    let send_state = ready_state.clone();
    let send_task = tokio::spawn(async move {
        while let Some(outgoing) = rx.recv().await {
            match outgoing {
                Outgoing::Text(text) => {
                    if send_state.load() != ReadyState::Open {
                        break;
                    }
                    if let Err(e) = write.send(Message::Text(text.into())).await {
                        log::error!("[WebSocket {}] Send error: {}", id, e);
                        break;
                    }
                }
                Outgoing::Close { code, reason } => {
                    let frame = CloseFrame {
                        code: code.into(),
                        reason: reason.into(),
                    };
                    if let Err(e) = write.send(Message::Close(Some(frame))).await {
                        log::error!("[WebSocket {}] Close error: {}", id, e);
                    }
                    break;
                }
            }
        }
    });

    while let Some(msg_result) = read.next().await {
        match msg_result {
            Ok(Message::Text(text)) => {
                log::debug!(
                    "[WebSocket {}] Received: {}",
                    id,
                    truncate(text.as_str(), 100)
                );
                dispatcher.dispatch(SocketEvent::Message(text.to_string()));
            }
            Ok(Message::Binary(data)) => {
                log::debug!("[WebSocket {}] Ignoring binary frame ({} bytes)", id, data.len());
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                // Handled by tungstenite
            }
            Ok(Message::Close(frame)) => {
                let (code, reason) = frame
                    .map(|f| (f.code.into(), f.reason.to_string()))
                    .unwrap_or((1005, String::new()));
                log::info!("[WebSocket {}] Received close: {} {}", id, code, reason);
                ready_state.store(ReadyState::Closed);
                dispatcher.dispatch(SocketEvent::Close { code, reason });
                break;
            }
            Ok(Message::Frame(_)) => {}
            Err(e) => {
                log::error!("[WebSocket {}] Read error: {}", id, e);
                fail(e.to_string(), "Connection error");
                break;
            }
        }
    }

    if ready_state.load() != ReadyState::Closed {
        log::warn!("[WebSocket {}] Stream ended without a close frame", id);
        ready_state.store(ReadyState::Closed);
        dispatcher.dispatch(SocketEvent::Close {
            code: 1006,
            reason: "Connection ended".to_string(),
        });
    }

    send_task.abort();
    log::info!("[WebSocket {}] Connection ended", id);
}

#[cfg(feature = "native-tls")]
async fn handshake(
    request: Request,
    stream: TcpStream,
) -> std::result::Result<(ClientStream, Response), WsError> {
    tokio_tungstenite::client_async_tls(request, stream).await
}

#[cfg(not(feature = "native-tls"))]
async fn handshake(
    request: Request,
    stream: TcpStream,
) -> std::result::Result<(ClientStream, Response), WsError> {
    tokio_tungstenite::client_async(request, stream).await
}

/// Cut a payload for logging without splitting a character.
fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio::net::TcpListener;

    const WAIT: Duration = Duration::from_secs(5);

    fn spawn_echo_server() -> SocketAddr {
        let (addr_tx, addr_rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async move {
                let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
                addr_tx.send(listener.local_addr().unwrap()).unwrap();
                while let Ok((stream, _)) = listener.accept().await {
                    tokio::spawn(async move {
                        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                        while let Some(Ok(msg)) = ws.next().await {
                            if msg.is_text() && ws.send(msg).await.is_err() {
                                break;
                            }
                        }
                    });
                }
            });
        });
        addr_rx.recv().unwrap()
    }

    /// Accepts one connection after `delay` and reports the close code it
    /// receives.
    fn spawn_close_recorder(delay: Duration) -> (SocketAddr, std::sync::mpsc::Receiver<Option<u16>>) {
        let (addr_tx, addr_rx) = std::sync::mpsc::channel();
        let (code_tx, code_rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async move {
                let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
                addr_tx.send(listener.local_addr().unwrap()).unwrap();
                let (stream, _) = listener.accept().await.unwrap();
                tokio::time::sleep(delay).await;
                let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                while let Some(Ok(msg)) = ws.next().await {
                    if let Message::Close(frame) = msg {
                        let _ = code_tx.send(frame.map(|f| u16::from(f.code)));
                    }
                }
            });
        });
        (addr_rx.recv().unwrap(), code_rx)
    }

    fn unused_addr() -> SocketAddr {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    }

    #[test]
    fn test_echo_and_close() {
        let addr = spawn_echo_server();
        let url = Url::parse(&format!("ws://{}/ws/echo", addr)).unwrap();
        let (socket, events) = WebSocket::open(url, &SocketOptions::default());

        assert_eq!(events.recv_timeout(WAIT), Some(SocketEvent::Open));
        assert_eq!(socket.ready_state(), ReadyState::Open);

        socket.send("hello".to_string()).unwrap();
        assert_eq!(
            events.recv_timeout(WAIT),
            Some(SocketEvent::Message("hello".to_string()))
        );

        socket.close(1000, "bye");
        match events.recv_timeout(WAIT) {
            Some(SocketEvent::Close { code, .. }) => assert_eq!(code, 1000),
            other => panic!("expected close, got {:?}", other),
        }
        assert_eq!(socket.ready_state(), ReadyState::Closed);
        assert!(matches!(socket.send("late".to_string()), Err(ChatError::NotOpen)));
    }

    #[test]
    fn test_connection_refused() {
        let url = Url::parse(&format!("ws://{}/ws/nobody", unused_addr())).unwrap();
        let (socket, events) = WebSocket::open(url, &SocketOptions::default());

        assert!(matches!(socket.send("early".to_string()), Err(ChatError::NotOpen)));

        assert!(matches!(events.recv_timeout(WAIT), Some(SocketEvent::Error(_))));
        assert_eq!(
            events.recv_timeout(WAIT),
            Some(SocketEvent::Close {
                code: 1006,
                reason: "Connection failed".to_string()
            })
        );
        assert_eq!(socket.ready_state(), ReadyState::Closed);
    }

    #[test]
    fn test_unsupported_scheme() {
        let url = Url::parse("http://127.0.0.1:1/ws/x").unwrap();
        let (socket, events) = WebSocket::open(url, &SocketOptions::default());
        assert!(matches!(events.recv_timeout(WAIT), Some(SocketEvent::Error(_))));
        assert!(matches!(
            events.recv_timeout(WAIT),
            Some(SocketEvent::Close { code: 1006, .. })
        ));
        assert_eq!(socket.ready_state(), ReadyState::Closed);
    }

    #[test]
    fn test_drop_closes_with_going_away() {
        let (addr, codes) = spawn_close_recorder(Duration::ZERO);
        let url = Url::parse(&format!("ws://{}/ws/drop", addr)).unwrap();
        let (socket, events) = WebSocket::open(url, &SocketOptions::default());
        assert_eq!(events.recv_timeout(WAIT), Some(SocketEvent::Open));

        drop(socket);
        assert_eq!(codes.recv_timeout(WAIT), Ok(Some(1001)));
    }

    #[test]
    fn test_close_while_connecting_sends_frame_after_handshake() {
        let (addr, codes) = spawn_close_recorder(Duration::from_millis(300));
        let url = Url::parse(&format!("ws://{}/ws/early", addr)).unwrap();
        let (socket, events) = WebSocket::open(url, &SocketOptions::default());

        assert_eq!(socket.ready_state(), ReadyState::Connecting);
        socket.close(1000, "early");
        assert_eq!(socket.ready_state(), ReadyState::Closing);

        assert_eq!(codes.recv_timeout(WAIT), Ok(Some(1000)));
        // No open event once a close was requested.
        assert!(matches!(
            events.recv_timeout(WAIT),
            Some(SocketEvent::Close { .. })
        ));
        assert_eq!(socket.ready_state(), ReadyState::Closed);
    }

    #[cfg(not(feature = "native-tls"))]
    #[test]
    fn test_wss_without_tls_fails_handshake() {
        let url = Url::parse(&format!("wss://{}/ws/secure", unused_addr())).unwrap();
        let (socket, events) = WebSocket::open(url, &SocketOptions::default());

        assert!(matches!(events.recv_timeout(WAIT), Some(SocketEvent::Error(_))));
        assert_eq!(
            events.recv_timeout(WAIT),
            Some(SocketEvent::Close {
                code: 1006,
                reason: "Handshake failed".to_string()
            })
        );
        assert_eq!(socket.ready_state(), ReadyState::Closed);
    }

    #[test]
    fn test_socket_ids_are_unique() {
        let url = Url::parse(&format!("ws://{}/ws/a", unused_addr())).unwrap();
        let (a, _a_events) = WebSocket::open(url.clone(), &SocketOptions::default());
        let (b, _b_events) = WebSocket::open(url, &SocketOptions::default());
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 100), "short");
        assert_eq!(truncate("héllo", 2), "h");
        assert_eq!(truncate("abcdef", 3), "abc");
    }
}
