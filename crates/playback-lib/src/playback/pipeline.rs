use super::convert::{ColorConverter, ConvertedFrameBuffer};
use super::decoder::DecodeEngine;
use super::present::{PresentationSurface, Presenter};
use super::pump::{FramePump, FrameStage};
use super::types::{PumpStats, Submission};
use ffmpeg_next::frame;
use log::info;
use playback_types::PlaybackError;

/// Converts each host frame into the presentation buffer and shows it.
pub struct PresentationStage<S> {
    converter: ColorConverter,
    buffer: ConvertedFrameBuffer,
    presenter: Presenter<S>,
}

impl<S: PresentationSurface> PresentationStage<S> {
    /// The conversion buffer is sized to the surface.
    pub fn new(presenter: Presenter<S>) -> Self {
        let (width, height) = presenter.surface().size();
        Self {
            converter: ColorConverter::new(),
            buffer: ConvertedFrameBuffer::new(width, height),
            presenter,
        }
    }

    pub fn presenter(&self) -> &Presenter<S> {
        &self.presenter
    }
}

impl<S: PresentationSurface> FrameStage<frame::Video> for PresentationStage<S> {
    fn process(&mut self, frame: &frame::Video) -> Result<(), PlaybackError> {
        self.converter.convert(frame, &mut self.buffer)?;
        self.presenter.present(&self.buffer)
    }

    fn should_stop(&mut self) -> bool {
        self.presenter.surface_mut().poll_closed()
    }
}

/// Feeds a packet source through the pump, then flushes the decoder.
pub struct Pipeline<E, S> {
    pump: FramePump<E, S>,
}

impl<E, S> Pipeline<E, S>
where
    E: DecodeEngine,
    S: FrameStage<E::Frame>,
{
    pub fn new(engine: E, stage: S) -> Self {
        Self {
            pump: FramePump::new(engine, stage),
        }
    }

    /// Runs until the source is exhausted and the decoder is drained, or
    /// until the stage asks to stop. A stop skips the flush and is reported
    /// through `cancelled`, not as an error.
    pub fn run<I>(&mut self, packets: I) -> Result<PumpStats, PlaybackError>
    where
        I: IntoIterator<Item = E::Packet>,
    {
        for packet in packets {
            if self.pump.stage_mut().should_stop() {
                info!("Playback cancelled");
                self.pump.stats_mut().cancelled = true;
                return Ok(self.pump.stats());
            }
            self.pump.pump(Submission::Packet(&packet))?;
        }

        self.pump.flush()?;

        let stats = self.pump.stats();
        info!(
            "Playback finished: {} packets, {} frames decoded, {} transferred, {} presented",
            stats.packets_submitted,
            stats.frames_received,
            stats.frames_transferred,
            stats.frames_presented
        );
        Ok(stats)
    }

    pub fn pump(&self) -> &FramePump<E, S> {
        &self.pump
    }

    pub fn into_parts(self) -> (E, S) {
        self.pump.into_parts()
    }
}
