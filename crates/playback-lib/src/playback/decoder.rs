use super::hardware::HardwareContext;
use super::negotiate::FormatNegotiator;
use super::types::{Frame, Retrieval, StreamDescriptor, Submission};
use ffmpeg_next::ffi::{av_frame_copy_props, av_hwframe_transfer_data};
use ffmpeg_next::format::Pixel;
use ffmpeg_next::{codec, frame, Packet};
use log::{debug, info, trace};
use playback_types::{PlaybackError, PlaybackErrorKind};
use std::sync::Arc;

/// The packet-in, frames-out interface of a decoder bound to an accelerator.
pub trait DecodeEngine {
    type Packet;
    type Frame: Frame;

    /// Format of frames that still live in device memory.
    fn accelerator_format(&self) -> Pixel;

    fn submit(&mut self, submission: Submission<'_, Self::Packet>) -> Result<(), PlaybackError>;

    fn receive(&mut self) -> Result<Retrieval<Self::Frame>, PlaybackError>;

    /// Copies a device-resident frame into a newly allocated host frame.
    fn transfer(&mut self, frame: &Self::Frame) -> Result<Self::Frame, PlaybackError>;
}

/// ffmpeg video decoder with a hardware device context attached.
///
/// The accelerator is bound and the format negotiator installed before the
/// codec is opened; there is no software fallback.
pub struct HardwareVideoDecoder {
    // Dropped first: the codec context points at the negotiator and holds
    // its own reference on the device.
    decoder: codec::decoder::Video,
    negotiator: Box<FormatNegotiator>,
    hardware_context: Arc<HardwareContext>,
}

impl HardwareVideoDecoder {
    pub fn open(
        stream: &StreamDescriptor,
        parameters: codec::Parameters,
        device_type_name: &str,
    ) -> Result<Self, PlaybackError> {
        let mut context = codec::Context::from_parameters(parameters)
            .map_err(|e| PlaybackError::new(PlaybackErrorKind::FFmpeg, e.to_string()))?;

        let codec = codec::decoder::find(stream.codec).ok_or_else(|| {
            PlaybackError::new(
                PlaybackErrorKind::FFmpeg,
                format!("no decoder available for codec {:?}", stream.codec),
            )
        })?;

        let hardware_context = HardwareContext::initialize(device_type_name, &codec)?;
        let negotiator = Box::new(FormatNegotiator::new(hardware_context.pixel_format()));

        // The negotiator is boxed and lives in the returned struct next to
        // the decoder, so the address handed to the codec stays valid.
        unsafe { negotiator.install(&mut context) };
        hardware_context.bind(&mut context)?;

        let decoder = context
            .decoder()
            .open_as(codec)
            .and_then(|opened| opened.video())
            .map_err(|e| {
                PlaybackError::new(
                    PlaybackErrorKind::FFmpeg,
                    format!("failed to open codec for stream #{}: {}", stream.index, e),
                )
            })?;

        info!(
            "Opened {:?} decoder {}x{} on {}",
            stream.codec,
            decoder.width(),
            decoder.height(),
            hardware_context.device_name()
        );

        Ok(Self {
            decoder,
            negotiator,
            hardware_context,
        })
    }

    // A rejected get_format surfaces later as an opaque decode failure.
    fn classify(&self, kind: PlaybackErrorKind, error: ffmpeg_next::Error) -> PlaybackError {
        if self.negotiator.was_rejected() {
            PlaybackError::new(
                PlaybackErrorKind::FormatNegotiation,
                format!(
                    "decoder cannot output {:?}: {}",
                    self.negotiator.accelerator(),
                    error
                ),
            )
        } else {
            PlaybackError::new(kind, error.to_string())
        }
    }
}

impl DecodeEngine for HardwareVideoDecoder {
    type Packet = Packet;
    type Frame = frame::Video;

    fn accelerator_format(&self) -> Pixel {
        self.hardware_context.pixel_format()
    }

    fn submit(&mut self, submission: Submission<'_, Packet>) -> Result<(), PlaybackError> {
        let result = match submission {
            Submission::Packet(packet) => {
                trace!("Submitting packet pts={:?} size={}", packet.pts(), packet.size());
                self.decoder.send_packet(packet)
            }
            Submission::Flush => {
                debug!("Submitting end of stream");
                self.decoder.send_eof()
            }
        };
        result.map_err(|e| self.classify(PlaybackErrorKind::DecodeSubmit, e))
    }

    fn receive(&mut self) -> Result<Retrieval<frame::Video>, PlaybackError> {
        let mut decoded = frame::Video::empty();
        match self.decoder.receive_frame(&mut decoded) {
            Ok(()) => Ok(Retrieval::Frame(decoded)),
            Err(ffmpeg_next::Error::Other { errno }) if errno == ffmpeg_next::error::EAGAIN => {
                Ok(Retrieval::NeedsInput)
            }
            Err(ffmpeg_next::Error::Eof) => Ok(Retrieval::EndOfStream),
            Err(e) => Err(self.classify(PlaybackErrorKind::DecodeReceive, e)),
        }
    }

    fn transfer(&mut self, frame: &frame::Video) -> Result<frame::Video, PlaybackError> {
        let mut host = frame::Video::empty();
        unsafe {
            let ret = av_hwframe_transfer_data(host.as_mut_ptr(), frame.as_ptr(), 0);
            if ret < 0 {
                return Err(PlaybackError::new(
                    PlaybackErrorKind::FrameTransfer,
                    format!(
                        "error transferring the data to system memory: {}",
                        ffmpeg_next::Error::from(ret)
                    ),
                ));
            }

            let ret = av_frame_copy_props(host.as_mut_ptr(), frame.as_ptr());
            if ret < 0 {
                return Err(PlaybackError::new(
                    PlaybackErrorKind::FrameTransfer,
                    format!("failed to copy frame properties: {}", ffmpeg_next::Error::from(ret)),
                ));
            }
        }
        Ok(host)
    }
}
