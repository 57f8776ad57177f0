use super::decoder::HardwareVideoDecoder;
use super::demux::Demuxer;
use super::pipeline::{Pipeline, PresentationStage};
use super::present::{Pacer, Presenter};
use super::types::PumpStats;
use super::window::WindowSurface;
use log::info;
use playback_types::{PlaybackError, PlaybackOptions};
use std::path::Path;
use std::time::Duration;

/// Everything needed to play one file: the source, a decoder on the
/// requested accelerator and a window sized to the stream.
pub struct PlaybackSession {
    demuxer: Demuxer,
    pipeline: Pipeline<HardwareVideoDecoder, PresentationStage<WindowSurface>>,
}

impl PlaybackSession {
    pub fn open(path: &Path, options: &PlaybackOptions) -> Result<Self, PlaybackError> {
        let demuxer = Demuxer::open(path)?;
        let stream = *demuxer.stream();

        let decoder =
            HardwareVideoDecoder::open(&stream, demuxer.codec_parameters()?, options.device_type.as_str())?;

        let title = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let surface = WindowSurface::open(&title, stream.width, stream.height)?;

        let pacer = Pacer::new(Duration::from_millis(u64::from(options.frame_interval_ms)));
        info!(
            "Presenting {}x{} every {:?}",
            stream.width,
            stream.height,
            pacer.interval()
        );
        let stage = PresentationStage::new(Presenter::new(surface, pacer));

        Ok(Self {
            demuxer,
            pipeline: Pipeline::new(decoder, stage),
        })
    }

    pub fn run(self) -> Result<PumpStats, PlaybackError> {
        let Self {
            demuxer,
            mut pipeline,
        } = self;
        pipeline.run(demuxer)
    }
}
