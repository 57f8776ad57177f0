use super::types::StreamDescriptor;
use ffmpeg_next::format::context::Input;
use ffmpeg_next::{codec, media, Packet};
use log::{debug, info, warn};
use playback_types::{PlaybackError, PlaybackErrorKind};
use std::path::Path;

fn ffmpeg_error(message: impl AsRef<str>) -> PlaybackError {
    PlaybackError::new(PlaybackErrorKind::FFmpeg, message)
}

/// Container reader bound to the best video stream of a file.
///
/// Iterating yields that stream's packets in file order. Packets of other
/// streams are skipped, and a read error ends the stream early.
pub struct Demuxer {
    input: Input,
    stream: StreamDescriptor,
    finished: bool,
}

impl Demuxer {
    pub fn open(path: &Path) -> Result<Self, PlaybackError> {
        let input = ffmpeg_next::format::input(path)
            .map_err(|e| ffmpeg_error(format!("cannot open {}: {}", path.display(), e)))?;

        info!(
            "Opened {} ({}), {} streams",
            path.display(),
            input.format().name(),
            input.nb_streams()
        );
        for (key, value) in input.metadata().iter() {
            info!("  {}: {}", key, value);
        }

        let stream = input
            .streams()
            .best(media::Type::Video)
            .ok_or_else(|| ffmpeg_error(format!("no video stream in {}", path.display())))?;

        let parameters = stream.parameters();
        let (width, height) = unsafe {
            let raw = parameters.as_ptr();
            ((*raw).width, (*raw).height)
        };
        let width = u32::try_from(width)
            .map_err(|_| ffmpeg_error(format!("stream reports width {}", width)))?;
        let height = u32::try_from(height)
            .map_err(|_| ffmpeg_error(format!("stream reports height {}", height)))?;

        let descriptor = StreamDescriptor {
            index: stream.index(),
            codec: parameters.id(),
            width,
            height,
            time_base: stream.time_base(),
        };
        info!(
            "Selected video stream #{}: {:?} {}x{}, time base {}",
            descriptor.index, descriptor.codec, descriptor.width, descriptor.height, descriptor.time_base
        );

        Ok(Self {
            input,
            stream: descriptor,
            finished: false,
        })
    }

    pub fn stream(&self) -> &StreamDescriptor {
        &self.stream
    }

    pub fn codec_parameters(&self) -> Result<codec::Parameters, PlaybackError> {
        self.input
            .stream(self.stream.index)
            .map(|stream| stream.parameters())
            .ok_or_else(|| ffmpeg_error(format!("stream #{} disappeared", self.stream.index)))
    }
}

impl Iterator for Demuxer {
    type Item = Packet;

    fn next(&mut self) -> Option<Packet> {
        while !self.finished {
            let mut packet = Packet::empty();
            match packet.read(&mut self.input) {
                Ok(()) if packet.stream() == self.stream.index => return Some(packet),
                Ok(()) => continue,
                Err(ffmpeg_next::Error::Eof) => {
                    debug!("Reached end of input");
                    self.finished = true;
                }
                Err(e) => {
                    warn!("Stopping early, failed to read packet: {}", e);
                    self.finished = true;
                }
            }
        }
        None
    }
}
