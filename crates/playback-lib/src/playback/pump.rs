use super::decoder::DecodeEngine;
use super::types::{Frame, PumpStats, Retrieval, Submission};
use log::{debug, error, trace};
use playback_types::PlaybackError;

/// Whatever consumes host-resident frames downstream of the pump.
pub trait FrameStage<F> {
    fn process(&mut self, frame: &F) -> Result<(), PlaybackError>;

    /// Polled before every packet. Returning true stops the run cleanly.
    fn should_stop(&mut self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpState {
    Idle,
    Submitting,
    Flushing,
    Draining,
    Transferring,
    ReadyForConvert,
}

/// Drives the decoder one submission at a time: submit, then drain frames
/// until the decoder signals backpressure, routing each frame through a
/// device to host transfer when it is still in accelerator memory.
pub struct FramePump<E, S> {
    engine: E,
    stage: S,
    stats: PumpStats,
    state: PumpState,
}

impl<E, S> FramePump<E, S>
where
    E: DecodeEngine,
    S: FrameStage<E::Frame>,
{
    pub fn new(engine: E, stage: S) -> Self {
        Self {
            engine,
            stage,
            stats: PumpStats::default(),
            state: PumpState::Idle,
        }
    }

    pub fn pump(&mut self, submission: Submission<'_, E::Packet>) -> Result<(), PlaybackError> {
        let flushing = submission.is_flush();
        self.enter(if flushing {
            PumpState::Flushing
        } else {
            PumpState::Submitting
        });

        if let Err(e) = self.engine.submit(submission) {
            error!("Error during decoding: {}", e);
            self.enter(PumpState::Idle);
            return Err(e);
        }
        if !flushing {
            self.stats.packets_submitted += 1;
        }

        let result = self.drain();
        self.enter(PumpState::Idle);
        result
    }

    /// Submits the empty packet and drains whatever the decoder still holds.
    pub fn flush(&mut self) -> Result<(), PlaybackError> {
        self.pump(Submission::Flush)
    }

    fn drain(&mut self) -> Result<(), PlaybackError> {
        loop {
            if self.state != PumpState::Flushing {
                self.enter(PumpState::Draining);
            }
            match self.engine.receive() {
                Ok(Retrieval::Frame(frame)) => {
                    self.stats.frames_received += 1;
                    self.handle_frame(frame)?;
                }
                Ok(Retrieval::NeedsInput) => {
                    trace!("Decoder needs more input");
                    return Ok(());
                }
                Ok(Retrieval::EndOfStream) => {
                    debug!("Decoder reached end of stream");
                    return Ok(());
                }
                Err(e) => {
                    error!("Error while decoding: {}", e);
                    return Err(e);
                }
            }
        }
    }

    // `frame` is owned here, so it is released on every exit path, and the
    // device copy goes back to the decoder's pool as soon as it is copied.
    fn handle_frame(&mut self, frame: E::Frame) -> Result<(), PlaybackError> {
        let resume = self.state;
        let result = if frame.pixel_format() == self.engine.accelerator_format() {
            self.enter(PumpState::Transferring);
            let host = self.engine.transfer(&frame);
            drop(frame);
            match host {
                Ok(host) => {
                    self.stats.frames_transferred += 1;
                    self.enter(PumpState::ReadyForConvert);
                    self.stage.process(&host)
                }
                Err(e) => Err(e),
            }
        } else {
            self.enter(PumpState::ReadyForConvert);
            self.stage.process(&frame)
        };

        if let Err(e) = &result {
            error!("Frame {} failed: {}", self.stats.frames_received, e);
        } else {
            self.stats.frames_presented += 1;
        }
        self.enter(resume);
        result
    }

    fn enter(&mut self, state: PumpState) {
        if self.state != state {
            trace!("{:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }

    pub fn state(&self) -> PumpState {
        self.state
    }

    pub fn stats(&self) -> PumpStats {
        self.stats
    }

    pub fn stats_mut(&mut self) -> &mut PumpStats {
        &mut self.stats
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn stage(&self) -> &S {
        &self.stage
    }

    pub fn stage_mut(&mut self) -> &mut S {
        &mut self.stage
    }

    pub fn into_parts(self) -> (E, S) {
        (self.engine, self.stage)
    }
}
