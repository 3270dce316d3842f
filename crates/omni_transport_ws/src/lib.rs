//! WebSocket implementation of the shared `omni_transport` contract.
//!
//! One connection per turn: the request frame is sent as soon as the socket
//! opens, every inbound text message is decoded into a `Frame`, and the socket
//! is closed after `done`, on cancellation, or on failure.

use std::future::Future;
use std::sync::atomic::Ordering;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use omni_stream::{decode_frame, ProtocolError};
use omni_transport::{
    encode_request, CancelSignal, FrameTransport, TransportEvent, TransportInitError,
    TransportProfile, TurnId, TurnRequest,
};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::debug;
use url::Url;

/// Stable transport identifier used for explicit startup selection.
pub const WS_TRANSPORT_ID: &str = "ws";

/// Path of the streaming endpoint relative to the API base URL.
pub const WS_PATH: &str = "/ws";

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);
const CLOSE_GRACE: Duration = Duration::from_millis(250);

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Runtime configuration for the WebSocket transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WsTransportConfig {
    pub url: String,
    pub connect_timeout: Option<Duration>,
}

impl WsTransportConfig {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: None,
        }
    }

    /// Uses `ws_url` when given, otherwise derives the endpoint from `api_url`.
    pub fn resolve(api_url: &str, ws_url: Option<&str>) -> Result<Self, TransportInitError> {
        match ws_url {
            Some(url) => Ok(Self::new(url)),
            None => derive_ws_url(api_url).map(Self::new),
        }
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }
}

/// Maps an HTTP API base URL to its streaming endpoint.
///
/// `http` becomes `ws`, `https` becomes `wss`, and [`WS_PATH`] is appended to
/// the existing path.
pub fn derive_ws_url(api_url: &str) -> Result<String, TransportInitError> {
    let mut url = Url::parse(api_url.trim())
        .map_err(|error| TransportInitError::new(format!("invalid API URL '{api_url}': {error}")))?;

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(TransportInitError::new(format!(
                "unsupported API URL scheme '{other}'"
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|()| TransportInitError::new(format!("cannot use scheme '{scheme}'")))?;

    let path = format!("{}{WS_PATH}", url.path().trim_end_matches('/'));
    url.set_path(&path);
    url.set_query(None);
    url.set_fragment(None);
    Ok(url.to_string())
}

#[derive(Debug, Error)]
enum WsStreamError {
    #[error("connection failed: {0}")]
    Connect(#[source] tungstenite::Error),

    #[error("connection timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("failed to encode request frame: {0}")]
    Encode(#[source] ProtocolError),

    #[error("failed to send request frame: {0}")]
    Send(#[source] tungstenite::Error),

    #[error("connection dropped: {0}")]
    Read(#[source] tungstenite::Error),

    #[error("turn was cancelled")]
    Cancelled,
}

/// `FrameTransport` backed by one WebSocket connection per turn.
#[derive(Debug)]
pub struct WsTransport {
    config: WsTransportConfig,
}

impl WsTransport {
    pub fn new(config: WsTransportConfig) -> Result<Self, TransportInitError> {
        let url = Url::parse(&config.url).map_err(|error| {
            TransportInitError::new(format!("invalid WebSocket URL '{}': {error}", config.url))
        })?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(TransportInitError::new(format!(
                "WebSocket URL must use ws or wss, got '{}'",
                url.scheme()
            )));
        }
        if url.scheme() == "wss" {
            // Err means a provider is already installed for the process.
            let _ = rustls::crypto::ring::default_provider().install_default();
        }
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &WsTransportConfig {
        &self.config
    }
}

impl FrameTransport for WsTransport {
    fn profile(&self) -> TransportProfile {
        TransportProfile {
            transport_id: WS_TRANSPORT_ID.to_string(),
            endpoint: self.config.url.clone(),
        }
    }

    fn run(
        &self,
        req: TurnRequest,
        cancel: CancelSignal,
        emit: &mut dyn FnMut(TransportEvent),
    ) -> Result<(), String> {
        let turn_id = req.turn_id;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|error| format!("failed to initialize tokio runtime: {error}"))?;

        match runtime.block_on(stream_turn(&self.config, &req, &cancel, emit)) {
            Ok(()) => emit(TransportEvent::Closed { turn_id }),
            Err(WsStreamError::Cancelled) => emit(TransportEvent::Cancelled { turn_id }),
            Err(error) => emit(TransportEvent::Failed {
                turn_id,
                error: error.to_string(),
            }),
        }

        Ok(())
    }
}

async fn stream_turn(
    config: &WsTransportConfig,
    req: &TurnRequest,
    cancel: &CancelSignal,
    emit: &mut dyn FnMut(TransportEvent),
) -> Result<(), WsStreamError> {
    let turn_id = req.turn_id;
    let payload = encode_request(req).map_err(WsStreamError::Encode)?;

    let connect = tokio_tungstenite::connect_async(config.url.as_str());
    let connected = match config.connect_timeout {
        Some(limit) => await_or_cancel(tokio::time::timeout(limit, connect), cancel)
            .await?
            .map_err(|_| WsStreamError::ConnectTimeout(limit))?,
        None => await_or_cancel(connect, cancel).await?,
    };
    let (mut socket, _) = connected.map_err(WsStreamError::Connect)?;
    debug!(turn_id, url = %config.url, "websocket connected");

    let outcome = exchange(&mut socket, payload, turn_id, cancel, emit).await;
    let _ = tokio::time::timeout(CLOSE_GRACE, socket.close(None)).await;
    outcome
}

async fn exchange(
    socket: &mut Socket,
    payload: String,
    turn_id: TurnId,
    cancel: &CancelSignal,
    emit: &mut dyn FnMut(TransportEvent),
) -> Result<(), WsStreamError> {
    await_or_cancel(socket.send(Message::Text(payload.into())), cancel)
        .await?
        .map_err(WsStreamError::Send)?;
    emit(TransportEvent::Opened { turn_id });

    loop {
        let Some(message) = await_or_cancel(socket.next(), cancel).await? else {
            debug!(turn_id, "websocket stream ended");
            return Ok(());
        };

        match message.map_err(WsStreamError::Read)? {
            Message::Text(text) => match decode_frame(text.as_str()) {
                Ok(frame) => {
                    let terminal = frame.is_terminal();
                    emit(TransportEvent::Frame { turn_id, frame });
                    if terminal {
                        return Ok(());
                    }
                }
                Err(error) => {
                    debug!(turn_id, %error, "skipping malformed frame");
                    emit(TransportEvent::Malformed {
                        turn_id,
                        raw: text.as_str().to_string(),
                        error: error.to_string(),
                    });
                }
            },
            Message::Close(_) => {
                debug!(turn_id, "server closed websocket");
                return Ok(());
            }
            Message::Binary(data) => {
                debug!(turn_id, bytes = data.len(), "skipping binary websocket message");
                emit(TransportEvent::Malformed {
                    turn_id,
                    raw: String::from_utf8_lossy(&data).into_owned(),
                    error: "binary message where a JSON text frame was expected".to_string(),
                });
            }
            _ => {}
        }
    }
}

fn is_cancelled(cancel: &CancelSignal) -> bool {
    cancel.load(Ordering::Acquire)
}

async fn await_or_cancel<F>(future: F, cancel: &CancelSignal) -> Result<F::Output, WsStreamError>
where
    F: Future,
{
    let mut future = Box::pin(future);

    loop {
        if is_cancelled(cancel) {
            return Err(WsStreamError::Cancelled);
        }

        if let Ok(output) = tokio::time::timeout(CANCEL_POLL_INTERVAL, &mut future).await {
            if is_cancelled(cancel) {
                return Err(WsStreamError::Cancelled);
            }
            return Ok(output);
        }
    }
}
