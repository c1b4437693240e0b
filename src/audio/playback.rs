//! Gapless playback scheduling for inbound audio chunks.
//!
//! The scheduler owns an output clock cursor: each chunk starts exactly where
//! the previous one ends, or immediately if the queue has drained. Barge-in
//! (the remote endpoint reporting an interrupted turn) stops everything and
//! resets the cursor so the next chunk schedules relative to "now".

use std::time::Instant;

use tracing::debug;

use super::pcm::AudioChunk;

/// Identifier for a chunk handed to an [`AudioSink`].
pub type SinkId = u64;

/// Monotonic clock for the output timeline, in seconds.
pub trait OutputClock: Send {
    fn now(&self) -> f64;
}

/// Wall clock measured from construction.
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputClock for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Destination for scheduled audio. `play` takes ownership of the chunk and
/// returns a handle that `stop` can cancel before or during playback.
pub trait AudioSink: Send {
    fn play(&mut self, chunk: AudioChunk, start_at: f64) -> SinkId;
    fn stop(&mut self, id: SinkId);
}

/// Sink that discards audio, for headless operation.
pub struct NullSink {
    next_id: SinkId,
}

impl NullSink {
    pub fn new() -> Self {
        Self { next_id: 0 }
    }
}

impl Default for NullSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSink for NullSink {
    fn play(&mut self, _chunk: AudioChunk, _start_at: f64) -> SinkId {
        self.next_id += 1;
        self.next_id
    }

    fn stop(&mut self, _id: SinkId) {}
}

/// Schedules inbound chunks back-to-back on the output clock.
pub struct PlaybackScheduler {
    clock: Box<dyn OutputClock>,
    sink: Box<dyn AudioSink>,
    next_cursor: f64,
    active: Vec<(SinkId, f64)>,
}

impl PlaybackScheduler {
    pub fn new(clock: Box<dyn OutputClock>, sink: Box<dyn AudioSink>) -> Self {
        Self {
            clock,
            sink,
            next_cursor: 0.0,
            active: Vec::new(),
        }
    }

    /// Schedule a chunk to start when the previous one ends, or now if the
    /// queue is empty. Advances the cursor by the chunk's duration.
    pub fn schedule(&mut self, chunk: AudioChunk) {
        let now = self.clock.now();
        self.prune_finished(now);

        let start = self.next_cursor.max(now);
        let end = start + chunk.duration_secs();
        let id = self.sink.play(chunk, start);
        self.active.push((id, end));
        self.next_cursor = end;
    }

    /// Barge-in: stop every scheduled or playing chunk and reset the cursor so
    /// the next chunk schedules relative to the current time.
    pub fn interrupt(&mut self) {
        debug!(cancelled = self.active.len(), "playback interrupted");
        self.stop_active();
        self.next_cursor = 0.0;
    }

    /// Teardown: stop everything without touching the cursor.
    pub fn stop_all(&mut self) {
        self.stop_active();
    }

    /// Number of chunks currently scheduled or playing.
    pub fn scheduled(&self) -> usize {
        self.active.len()
    }

    /// Recover the clock and sink after the session ends.
    pub fn into_parts(self) -> (Box<dyn OutputClock>, Box<dyn AudioSink>) {
        (self.clock, self.sink)
    }

    fn stop_active(&mut self) {
        for (id, _) in self.active.drain(..) {
            self.sink.stop(id);
        }
    }

    fn prune_finished(&mut self, now: f64) {
        self.active.retain(|(_, end)| *end > now);
    }
}
