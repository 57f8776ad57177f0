use super::types::PlaneRef;
use ffmpeg_next::format::Pixel;
use ffmpeg_next::frame;
use ffmpeg_next::software::scaling::{context::Context, flag::Flags};
use log::debug;
use playback_types::{PlaybackError, PlaybackErrorKind};

/// Layout the presentation surface expects: planar YUV 4:2:0.
pub const PRESENTATION_FORMAT: Pixel = Pixel::YUV420P;

/// Host buffer the converter writes into and the presenter reads from.
/// Allocated once at the stream's size and overwritten every frame.
pub struct ConvertedFrameBuffer {
    frame: frame::Video,
}

impl ConvertedFrameBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            frame: frame::Video::new(PRESENTATION_FORMAT, width, height),
        }
    }

    pub fn width(&self) -> u32 {
        self.frame.width()
    }

    pub fn height(&self) -> u32 {
        self.frame.height()
    }

    pub fn format(&self) -> Pixel {
        self.frame.format()
    }

    /// Y, U and V planes, borrowed in place.
    pub fn planes(&self) -> [PlaneRef<'_>; 3] {
        std::array::from_fn(|i| PlaneRef {
            data: self.frame.data(i),
            stride: self.frame.stride(i),
            width: self.frame.plane_width(i),
            height: self.frame.plane_height(i),
        })
    }
}

/// swscale-backed conversion from the decoder's host format to
/// [`PRESENTATION_FORMAT`] at the buffer's fixed size.
///
/// The scaler is built from the first frame it sees. A later frame with a
/// different size or format is a conversion error; mid-stream resolution
/// changes are not handled.
pub struct ColorConverter {
    scaler: Option<Context>,
    flags: Flags,
}

impl ColorConverter {
    pub fn new() -> Self {
        Self::with_flags(Flags::BICUBIC)
    }

    pub fn with_flags(flags: Flags) -> Self {
        Self {
            scaler: None,
            flags,
        }
    }

    pub fn convert(
        &mut self,
        source: &frame::Video,
        target: &mut ConvertedFrameBuffer,
    ) -> Result<(), PlaybackError> {
        let scaler = match self.scaler {
            Some(ref mut scaler) => scaler,
            None => {
                debug!(
                    "Creating scaler {:?} {}x{} -> {:?} {}x{}",
                    source.format(),
                    source.width(),
                    source.height(),
                    target.format(),
                    target.width(),
                    target.height()
                );
                let scaler = Context::get(
                    source.format(),
                    source.width(),
                    source.height(),
                    target.format(),
                    target.width(),
                    target.height(),
                    self.flags,
                )
                .map_err(|e| {
                    PlaybackError::new(
                        PlaybackErrorKind::Conversion,
                        format!(
                            "cannot convert {:?} {}x{}: {}",
                            source.format(),
                            source.width(),
                            source.height(),
                            e
                        ),
                    )
                })?;
                self.scaler.insert(scaler)
            }
        };

        scaler.run(source, &mut target.frame).map_err(|e| {
            PlaybackError::new(
                PlaybackErrorKind::Conversion,
                format!(
                    "scaling {:?} {}x{} failed: {}",
                    source.format(),
                    source.width(),
                    source.height(),
                    e
                ),
            )
        })
    }
}

impl Default for ColorConverter {
    fn default() -> Self {
        Self::new()
    }
}
