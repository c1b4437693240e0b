//! Live conversation session over WebSocket.

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::{
    net::TcpStream,
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{client::IntoClientRequest, Error as WsError, Message},
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, warn};

use super::events::LiveEvent;
use crate::audio::MediaFrame;
use crate::config::{resolve_api_key, LiveConfig};
use crate::error::{FluentifyError, Result};

type LiveWebSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct SocketRuntime {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// A WebSocket-based live conversation session.
///
/// Owns the socket task; capture frames go out through [`LiveSession::send_media`]
/// in production order, and inbound server messages surface as typed
/// [`LiveEvent`]s. There is no automatic reconnect: a transport failure ends
/// the session and the user restarts explicitly.
pub struct LiveSession {
    config: LiveConfig,
    events_rx: Option<mpsc::UnboundedReceiver<LiveEvent>>,
    outbound_tx: Option<mpsc::UnboundedSender<MediaFrame>>,
    runtime: Option<SocketRuntime>,
}

impl LiveSession {
    /// Create a new live session (does not connect yet).
    pub fn new(config: LiveConfig) -> Self {
        Self {
            config,
            events_rx: None,
            outbound_tx: None,
            runtime: None,
        }
    }

    /// Connect to the live endpoint and send the setup message.
    pub async fn connect(&mut self) -> Result<()> {
        if self.runtime.is_some() {
            return Err(FluentifyError::InvalidState(
                "Live session is already connected".into(),
            ));
        }

        let api_key = resolve_api_key(self.config.api_key.as_deref())?;
        let url = build_live_url(&self.config.base_url, &api_key)?;
        let setup_payload = build_setup_payload(&self.config)?;

        let mut socket = connect_live_socket(&url).await?;
        socket
            .send(Message::Text(setup_payload.into()))
            .await
            .map_err(|error| FluentifyError::Transport(format!("Live setup send failed: {error}")))?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_socket_loop(socket, outbound_rx, events_tx, shutdown_rx));

        self.events_rx = Some(events_rx);
        self.outbound_tx = Some(outbound_tx);
        self.runtime = Some(SocketRuntime { shutdown_tx, task });
        Ok(())
    }

    /// Queue a capture frame for transmission. Frames are sent in the order
    /// they are queued.
    pub fn send_media(&self, frame: MediaFrame) -> Result<()> {
        let outbound = self.outbound_tx.as_ref().ok_or_else(|| {
            FluentifyError::InvalidState("Live session is not connected".into())
        })?;
        outbound
            .send(frame)
            .map_err(|_| FluentifyError::Transport("Live socket task has ended".into()))
    }

    /// Wait for the next event from the live stream.
    pub async fn next_event(&mut self) -> Option<LiveEvent> {
        self.events_rx.as_mut()?.recv().await
    }

    /// Close the live session gracefully.
    pub async fn close(&mut self) -> Result<()> {
        self.outbound_tx = None;
        if let Some(runtime) = self.runtime.take() {
            let _ = runtime.shutdown_tx.send(true);
            runtime.task.await.map_err(|error| {
                FluentifyError::Transport(format!("Live socket task failed: {error}"))
            })?;
        }
        Ok(())
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            let _ = runtime.shutdown_tx.send(true);
            runtime.task.abort();
        }
    }
}

async fn run_socket_loop(
    mut socket: LiveWebSocket,
    mut outbound_rx: mpsc::UnboundedReceiver<MediaFrame>,
    events_tx: mpsc::UnboundedSender<LiveEvent>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    debug!("live socket task started");
    let mut outbound_open = true;
    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                }
            }
            frame = outbound_rx.recv(), if outbound_open => {
                match frame {
                    Some(media) => {
                        let payload = json!({
                            "realtimeInput": {
                                "media": { "data": media.data, "mimeType": media.mime_type }
                            }
                        });
                        if let Err(error) = socket.send(Message::Text(payload.to_string().into())).await {
                            let _ = events_tx.send(LiveEvent::Error {
                                message: format!("Live audio send failed: {error}"),
                            });
                            break;
                        }
                    }
                    None => outbound_open = false,
                }
            }
            frame = socket.next() => {
                match frame {
                    Some(Ok(message)) => {
                        if handle_server_message(&mut socket, &events_tx, message).await.is_err() {
                            break;
                        }
                    }
                    Some(Err(error)) => {
                        let _ = events_tx.send(LiveEvent::Error {
                            message: format!("Live socket receive failed: {error}"),
                        });
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    debug!("live socket task stopped");
    let _ = events_tx.send(LiveEvent::Closed);
}

async fn handle_server_message(
    socket: &mut LiveWebSocket,
    events_tx: &mpsc::UnboundedSender<LiveEvent>,
    message: Message,
) -> std::result::Result<(), WsError> {
    match message {
        Message::Text(text) => parse_and_forward_events(text.as_ref(), events_tx),
        Message::Binary(bytes) => {
            if let Ok(text) = String::from_utf8(bytes.to_vec()) {
                parse_and_forward_events(&text, events_tx);
            }
        }
        Message::Ping(payload) => socket.send(Message::Pong(payload)).await?,
        Message::Pong(_) => {}
        Message::Close(_) => return Err(WsError::ConnectionClosed),
        Message::Frame(_) => {}
    }
    Ok(())
}

fn parse_and_forward_events(payload: &str, events_tx: &mpsc::UnboundedSender<LiveEvent>) {
    match serde_json::from_str::<Value>(payload) {
        Ok(value) => {
            for event in LiveEvent::from_server_payload(&value) {
                let _ = events_tx.send(event);
            }
        }
        Err(error) => {
            warn!(%error, "ignoring unparseable live payload");
        }
    }
}

fn build_live_url(base_url: &str, api_key: &str) -> Result<String> {
    let trimmed = base_url.trim();
    if trimmed.is_empty() {
        return Err(FluentifyError::Configuration(
            "Live base URL cannot be empty".into(),
        ));
    }
    let separator = if trimmed.contains('?') { "&" } else { "?" };
    Ok(format!("{trimmed}{separator}key={api_key}"))
}

fn build_setup_payload(config: &LiveConfig) -> Result<String> {
    let setup = json!({
        "setup": {
            "model": config.model,
            "generationConfig": {
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": { "prebuiltVoiceConfig": { "voiceName": config.voice } }
                }
            },
            "inputAudioTranscription": {},
            "outputAudioTranscription": {},
            "systemInstruction": {
                "parts": [{ "text": config.system_instruction }]
            }
        }
    });
    serde_json::to_string(&setup).map_err(FluentifyError::from)
}

async fn connect_live_socket(url: &str) -> Result<LiveWebSocket> {
    let request = url.into_client_request().map_err(|error| {
        FluentifyError::Configuration(format!("Invalid live websocket URL: {error}"))
    })?;

    connect_async(request)
        .await
        .map(|(socket, _)| socket)
        .map_err(map_connect_error)
}

fn map_connect_error(error: WsError) -> FluentifyError {
    match error {
        WsError::Http(response) => {
            let status = response.status().as_u16();
            if matches!(status, 401 | 403) {
                FluentifyError::Authentication(format!(
                    "Live websocket authentication failed with status {status}"
                ))
            } else {
                FluentifyError::api(
                    status,
                    format!("Live websocket handshake failed with status {status}"),
                )
            }
        }
        WsError::Io(error) => FluentifyError::Io(error),
        WsError::Url(error) => {
            FluentifyError::Configuration(format!("Invalid live websocket URL: {error}"))
        }
        other => FluentifyError::Transport(format!("Live websocket connect failed: {other}")),
    }
}
