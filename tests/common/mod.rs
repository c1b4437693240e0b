//! Shared fakes for conversation-level tests.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fluentify::audio::{AudioChunk, AudioSink, MicrophoneSource, OutputClock, SinkId};
use fluentify::error::{FluentifyError, Result};
use tokio::sync::mpsc;

/// Observable state of a [`FakeMicrophone`], shared with the test body.
#[derive(Clone, Default)]
pub struct MicrophoneState {
    pub starts: Arc<AtomicUsize>,
    pub stops: Arc<AtomicUsize>,
    sender: Arc<Mutex<Option<mpsc::Sender<Vec<f32>>>>>,
}

impl MicrophoneState {
    /// Simulate one capture tick. Frames pushed while the microphone is
    /// stopped go nowhere, like a released device.
    pub fn push_frame(&self, samples: Vec<f32>) {
        if let Some(sender) = self.sender.lock().unwrap().as_ref() {
            let _ = sender.try_send(samples);
        }
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

/// Microphone driven by the test instead of a capture device.
pub struct FakeMicrophone {
    pub state: MicrophoneState,
    pub deny_permission: bool,
}

impl FakeMicrophone {
    pub fn new() -> (Self, MicrophoneState) {
        let state = MicrophoneState::default();
        (
            Self {
                state: state.clone(),
                deny_permission: false,
            },
            state,
        )
    }

    pub fn denied() -> Self {
        Self {
            state: MicrophoneState::default(),
            deny_permission: true,
        }
    }
}

#[async_trait]
impl MicrophoneSource for FakeMicrophone {
    async fn start(&mut self) -> Result<mpsc::Receiver<Vec<f32>>> {
        if self.deny_permission {
            return Err(FluentifyError::PermissionDenied(
                "denied by the user".into(),
            ));
        }
        self.state.starts.fetch_add(1, Ordering::SeqCst);
        let (sender, receiver) = mpsc::channel(64);
        *self.state.sender.lock().unwrap() = Some(sender);
        Ok(receiver)
    }

    async fn stop(&mut self) {
        self.state.stops.fetch_add(1, Ordering::SeqCst);
        *self.state.sender.lock().unwrap() = None;
    }
}

/// Clock advanced by hand, in milliseconds.
pub struct ManualClock(Arc<AtomicU64>);

impl ManualClock {
    pub fn new() -> (Self, Arc<AtomicU64>) {
        let time = Arc::new(AtomicU64::new(0));
        (Self(Arc::clone(&time)), time)
    }
}

impl OutputClock for ManualClock {
    fn now(&self) -> f64 {
        self.0.load(Ordering::SeqCst) as f64 / 1000.0
    }
}

/// What a [`RecordingSink`] has been asked to do.
#[derive(Default)]
pub struct SinkLog {
    pub started: Vec<(SinkId, f64, f64)>,
    pub stopped: Vec<SinkId>,
}

/// Sink that records play/stop calls for assertions.
#[derive(Clone, Default)]
pub struct RecordingSink {
    log: Arc<Mutex<SinkLog>>,
    next_id: SinkId,
}

impl RecordingSink {
    pub fn new() -> (Self, Arc<Mutex<SinkLog>>) {
        let sink = Self::default();
        let log = Arc::clone(&sink.log);
        (sink, log)
    }
}

impl AudioSink for RecordingSink {
    fn play(&mut self, chunk: AudioChunk, start_at: f64) -> SinkId {
        self.next_id += 1;
        self.log
            .lock()
            .unwrap()
            .started
            .push((self.next_id, start_at, chunk.duration_secs()));
        self.next_id
    }

    fn stop(&mut self, id: SinkId) {
        self.log.lock().unwrap().stopped.push(id);
    }
}
