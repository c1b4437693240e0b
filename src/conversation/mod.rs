//! Live conversation session manager.
//!
//! [`Conversation`] owns everything a live session holds: the microphone, the
//! output clock and sink, the WebSocket session, the playback scheduler, and
//! the transcript aggregator. All per-session work happens on one dispatcher
//! task that selects over the three event sources (stop signal, capture
//! frames, inbound server events), so ordering within each source is preserved
//! and no locking is needed: single ownership plus idempotent teardown.

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::audio::{
    pcm, AudioSink, MediaFrame, MicrophoneSource, OutputClock, PlaybackScheduler,
};
use crate::config::LiveConfig;
use crate::error::{FluentifyError, Result};
use crate::live::{Lifecycle, LiveEvent, LiveSession, Phase};
use crate::transcript::{TranscriptAggregator, TranscriptTurn};

/// UI-facing notifications from a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationUpdate {
    /// Human-readable session status ("connecting", "connected", error text).
    Status(String),
    /// A committed transcript turn, in completion order.
    Turn(TranscriptTurn),
    /// The session has fully torn down.
    Closed,
}

/// Audio resources held for the lifetime of one session and released on
/// teardown. Never shared across sessions.
struct SessionResources {
    microphone: Box<dyn MicrophoneSource>,
    clock: Box<dyn OutputClock>,
    sink: Box<dyn AudioSink>,
}

struct DispatcherRuntime {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<SessionResources>,
}

/// One live conversation with the remote tutor.
///
/// At most one session is active at a time: `start` tears down any previous
/// session before connecting, and `stop` with no active session is a no-op.
pub struct Conversation {
    config: LiveConfig,
    resources: Option<SessionResources>,
    runtime: Option<DispatcherRuntime>,
    updates_tx: mpsc::UnboundedSender<ConversationUpdate>,
    updates_rx: mpsc::UnboundedReceiver<ConversationUpdate>,
}

impl Conversation {
    pub fn new(
        config: LiveConfig,
        microphone: Box<dyn MicrophoneSource>,
        clock: Box<dyn OutputClock>,
        sink: Box<dyn AudioSink>,
    ) -> Self {
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        Self {
            config,
            resources: Some(SessionResources {
                microphone,
                clock,
                sink,
            }),
            runtime: None,
            updates_tx,
            updates_rx,
        }
    }

    /// Start a live session.
    ///
    /// Any session still running is stopped first, so a successful return
    /// always means exactly one active session. Microphone permission failures
    /// and connect failures leave the conversation idle and restartable.
    pub async fn start(&mut self) -> Result<()> {
        self.stop().await?;

        let mut resources = self.resources.take().ok_or_else(|| {
            FluentifyError::InvalidState("session resources are unavailable".into())
        })?;

        self.emit_status("connecting");

        let frames = match resources.microphone.start().await {
            Ok(frames) => frames,
            Err(error) => {
                self.emit_status(&format!("microphone unavailable: {error}"));
                self.resources = Some(resources);
                return Err(error);
            }
        };

        let mut lifecycle = Lifecycle::new();
        lifecycle.advance(Phase::Connecting)?;

        let mut session = LiveSession::new(self.config.clone());
        if let Err(error) = session.connect().await {
            self.emit_status(&format!("connection failed: {error}"));
            resources.microphone.stop().await;
            self.resources = Some(resources);
            return Err(error);
        }

        let dispatcher = Dispatcher {
            session,
            frames,
            microphone: resources.microphone,
            scheduler: PlaybackScheduler::new(resources.clock, resources.sink),
            aggregator: TranscriptAggregator::new(),
            lifecycle,
            updates: self.updates_tx.clone(),
            input_rate: self.config.input_sample_rate,
            output_rate: self.config.output_sample_rate,
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(dispatcher.run(shutdown_rx));
        self.runtime = Some(DispatcherRuntime { shutdown_tx, task });
        Ok(())
    }

    /// Stop the active session and release its resources. A no-op when no
    /// session is active.
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(runtime) = self.runtime.take() {
            let _ = runtime.shutdown_tx.send(true);
            let resources = runtime.task.await.map_err(|error| {
                FluentifyError::Transport(format!("dispatcher task failed: {error}"))
            })?;
            self.resources = Some(resources);
        }
        Ok(())
    }

    /// Whether a dispatcher is currently running.
    pub fn is_active(&self) -> bool {
        self.runtime
            .as_ref()
            .map(|runtime| !runtime.task.is_finished())
            .unwrap_or(false)
    }

    /// Wait for the next status, transcript turn, or close notification.
    pub async fn next_update(&mut self) -> Option<ConversationUpdate> {
        self.updates_rx.recv().await
    }

    fn emit_status(&self, message: &str) {
        let _ = self
            .updates_tx
            .send(ConversationUpdate::Status(message.to_string()));
    }
}

#[derive(PartialEq)]
enum Flow {
    Continue,
    Stop,
}

struct Dispatcher {
    session: LiveSession,
    frames: mpsc::Receiver<Vec<f32>>,
    microphone: Box<dyn MicrophoneSource>,
    scheduler: PlaybackScheduler,
    aggregator: TranscriptAggregator,
    lifecycle: Lifecycle,
    updates: mpsc::UnboundedSender<ConversationUpdate>,
    input_rate: u32,
    output_rate: u32,
}

impl Dispatcher {
    async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) -> SessionResources {
        info!("conversation dispatcher started");
        let mut mic_alive = true;
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    let _ = self.lifecycle.advance(Phase::Closing);
                    break;
                }
                frame = self.frames.recv(), if mic_alive => {
                    match frame {
                        Some(samples) => {
                            if self.forward_frame(&samples) == Flow::Stop {
                                break;
                            }
                        }
                        None => mic_alive = false,
                    }
                }
                event = self.session.next_event() => {
                    match event {
                        Some(event) => {
                            if self.handle_event(event) == Flow::Stop {
                                break;
                            }
                        }
                        None => {
                            self.note_remote_close();
                            break;
                        }
                    }
                }
            }
        }
        self.teardown().await
    }

    /// Forward one capture frame while the session is open. Frames produced in
    /// any other phase are dropped, never buffered.
    fn forward_frame(&mut self, samples: &[f32]) -> Flow {
        if !self.lifecycle.is_open() {
            return Flow::Continue;
        }
        let frame = MediaFrame::from_samples(samples, self.input_rate);
        if let Err(error) = self.session.send_media(frame) {
            if error.is_fatal() {
                warn!(%error, "closing session after send failure");
                self.emit_status("connection lost");
                let _ = self.lifecycle.advance(Phase::Closing);
                return Flow::Stop;
            }
        }
        Flow::Continue
    }

    fn handle_event(&mut self, event: LiveEvent) -> Flow {
        match event {
            LiveEvent::SetupComplete => {
                if self.lifecycle.advance(Phase::Open).is_ok() {
                    self.emit_status("connected");
                }
                Flow::Continue
            }
            LiveEvent::InputTranscription { text } => {
                self.aggregator.push_user(&text);
                Flow::Continue
            }
            LiveEvent::OutputTranscription { text } => {
                self.aggregator.push_assistant(&text);
                Flow::Continue
            }
            LiveEvent::TurnComplete => {
                for turn in self.aggregator.complete_turn() {
                    let _ = self.updates.send(ConversationUpdate::Turn(turn));
                }
                Flow::Continue
            }
            LiveEvent::Audio { data } => {
                match pcm::decode_chunk(&data, self.output_rate) {
                    Ok(chunk) => self.scheduler.schedule(chunk),
                    // One bad chunk is dropped; the session keeps running.
                    Err(error) => warn!(%error, "dropping undecodable audio chunk"),
                }
                Flow::Continue
            }
            LiveEvent::Interrupted => {
                self.scheduler.interrupt();
                Flow::Continue
            }
            LiveEvent::Error { message } => {
                self.emit_status(&format!("session error: {message}"));
                let _ = self.lifecycle.advance(Phase::Closing);
                Flow::Stop
            }
            LiveEvent::Closed => {
                self.note_remote_close();
                Flow::Stop
            }
        }
    }

    /// A remote close is an error only while the session is still open; after
    /// an explicit stop it is the expected handshake.
    fn note_remote_close(&mut self) {
        if self.lifecycle.is_open() {
            self.emit_status("connection closed unexpectedly");
        }
        let _ = self.lifecycle.advance(Phase::Closing);
    }

    /// Release every held resource. Safe on every exit path: stop request,
    /// transport error, or remote close.
    async fn teardown(mut self) -> SessionResources {
        self.scheduler.stop_all();
        self.microphone.stop().await;
        if let Err(error) = self.session.close().await {
            warn!(%error, "live session close failed");
        }
        self.aggregator.clear();
        let _ = self.lifecycle.advance(Phase::Closed);
        let _ = self.updates.send(ConversationUpdate::Closed);
        debug!("conversation resources released");

        let (clock, sink) = self.scheduler.into_parts();
        SessionResources {
            microphone: self.microphone,
            clock,
            sink,
        }
    }

    fn emit_status(&self, message: &str) {
        let _ = self
            .updates
            .send(ConversationUpdate::Status(message.to_string()));
    }
}
