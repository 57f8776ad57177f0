//! Hardware accelerated video playback using FFmpeg.
//!
//! Packets from the demuxer are decoded on an accelerator device, copied to
//! host memory, converted to YUV420P with swscale and drawn into a window at
//! a fixed pace. Everything runs on the calling thread.
//!
//! There is no software fallback: if the device cannot be opened or the
//! decoder will not output the accelerator format, playback fails.

mod convert;
mod decoder;
mod demux;
mod hardware;
mod negotiate;
mod pipeline;
mod present;
mod pump;
mod session;
#[cfg(test)]
mod tests;
mod types;
mod window;

pub use convert::{ColorConverter, ConvertedFrameBuffer, PRESENTATION_FORMAT};
pub use decoder::{DecodeEngine, HardwareVideoDecoder};
pub use demux::Demuxer;
pub use hardware::{available_device_types, HardwareContext};
pub use negotiate::FormatNegotiator;
pub use pipeline::{Pipeline, PresentationStage};
pub use present::{Pacer, PresentationSurface, Presenter};
pub use pump::{FramePump, FrameStage, PumpState};
pub use session::PlaybackSession;
pub use types::{Frame, PlaneRef, PumpStats, Retrieval, StreamDescriptor, Submission};
pub use window::WindowSurface;
