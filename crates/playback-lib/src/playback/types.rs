use ffmpeg_next::format::Pixel;
use ffmpeg_next::{codec, frame, Rational};

/// The video stream chosen at startup. Built once by the demuxer and only
/// read afterwards.
#[derive(Debug, Clone, Copy)]
pub struct StreamDescriptor {
    pub index: usize,
    pub codec: codec::Id,
    pub width: u32,
    pub height: u32,
    pub time_base: Rational,
}

/// What the pump needs to know about a decoded frame to route it.
pub trait Frame {
    fn pixel_format(&self) -> Pixel;
    fn width(&self) -> u32;
    fn height(&self) -> u32;
}

impl Frame for frame::Video {
    fn pixel_format(&self) -> Pixel {
        self.format()
    }

    fn width(&self) -> u32 {
        frame::Video::width(self)
    }

    fn height(&self) -> u32 {
        frame::Video::height(self)
    }
}

/// One input to the decoder: a packet from the source, or the empty packet
/// that asks the decoder to flush what it has buffered.
#[derive(Debug)]
pub enum Submission<'a, P> {
    Packet(&'a P),
    Flush,
}

impl<P> Submission<'_, P> {
    pub fn is_flush(&self) -> bool {
        matches!(self, Submission::Flush)
    }
}

/// Result of one retrieval attempt. `NeedsInput` and `EndOfStream` are the
/// backpressure signals that end a drain loop; they are never errors.
#[derive(Debug)]
pub enum Retrieval<F> {
    Frame(F),
    NeedsInput,
    EndOfStream,
}

/// Borrowed view of one image plane of the converted frame.
#[derive(Debug, Clone, Copy)]
pub struct PlaneRef<'a> {
    pub data: &'a [u8],
    pub stride: usize,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpStats {
    pub packets_submitted: u64,
    pub frames_received: u64,
    pub frames_transferred: u64,
    pub frames_presented: u64,
    pub cancelled: bool,
}

impl From<PumpStats> for playback_types::PlaybackSummary {
    fn from(stats: PumpStats) -> Self {
        Self {
            packets_submitted: stats.packets_submitted,
            frames_received: stats.frames_received,
            frames_transferred: stats.frames_transferred,
            frames_presented: stats.frames_presented,
            cancelled: stats.cancelled,
        }
    }
}
