//! Session lifecycle state machine.

use crate::error::{FluentifyError, Result};

/// Lifecycle stage of a live conversation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Connecting,
    Open,
    Closing,
    Closed,
}

/// Guards the legal lifecycle transitions:
/// `Idle → Connecting → Open → Closing → Closed`, with `Closing` reachable
/// from any non-terminal phase on error. `Closed` is terminal.
#[derive(Debug)]
pub struct Lifecycle {
    phase: Phase,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self { phase: Phase::Idle }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_open(&self) -> bool {
        self.phase == Phase::Open
    }

    /// Move to the next phase, rejecting illegal transitions.
    pub fn advance(&mut self, next: Phase) -> Result<()> {
        let legal = matches!(
            (self.phase, next),
            (Phase::Idle, Phase::Connecting)
                | (Phase::Connecting, Phase::Open)
                | (Phase::Idle, Phase::Closing)
                | (Phase::Connecting, Phase::Closing)
                | (Phase::Open, Phase::Closing)
                | (Phase::Closing, Phase::Closing)
                | (Phase::Closing, Phase::Closed)
        );
        if !legal {
            return Err(FluentifyError::InvalidState(format!(
                "illegal session transition {:?} -> {next:?}",
                self.phase
            )));
        }
        self.phase = next;
        Ok(())
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
