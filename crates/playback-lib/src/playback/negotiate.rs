use ffmpeg_next::codec;
use ffmpeg_next::ffi::{AVCodecContext, AVPixelFormat};
use ffmpeg_next::format::Pixel;
use log::{debug, error};
use playback_types::{PlaybackError, PlaybackErrorKind};
use std::sync::atomic::{AtomicBool, Ordering};

/// Picks the accelerator pixel format out of the formats a codec offers.
///
/// The decoder calls back into this through `get_format` when it sets up a
/// stream, and again whenever it renegotiates, so `select` has to give the
/// same answer every time it is asked.
#[derive(Debug)]
pub struct FormatNegotiator {
    accelerator: Pixel,
    rejected: AtomicBool,
}

impl FormatNegotiator {
    pub fn new(accelerator: Pixel) -> Self {
        Self {
            accelerator,
            rejected: AtomicBool::new(false),
        }
    }

    pub fn accelerator(&self) -> Pixel {
        self.accelerator
    }

    pub fn select(&self, offered: &[Pixel]) -> Result<Pixel, PlaybackError> {
        offered
            .iter()
            .copied()
            .find(|&format| format == self.accelerator)
            .ok_or_else(|| {
                PlaybackError::new(
                    PlaybackErrorKind::FormatNegotiation,
                    format!(
                        "failed to get hardware surface format {:?}, decoder offered {:?}",
                        self.accelerator, offered
                    ),
                )
            })
    }

    /// Whether the decoder ever asked for a format set without the
    /// accelerator format in it.
    pub fn was_rejected(&self) -> bool {
        self.rejected.load(Ordering::Acquire)
    }

    /// Wires this negotiator into the codec context's `get_format` hook.
    ///
    /// # Safety
    /// `self` must stay at the same address and outlive every use of
    /// `context`, including the decoder opened from it.
    pub unsafe fn install(&self, context: &mut codec::Context) {
        let ptr = context.as_mut_ptr();
        (*ptr).opaque = self as *const Self as *mut std::ffi::c_void;
        (*ptr).get_format = Some(negotiate_hw_format);
    }
}

pub(super) unsafe extern "C" fn negotiate_hw_format(
    ctx: *mut AVCodecContext,
    pix_fmts: *const AVPixelFormat,
) -> AVPixelFormat {
    let negotiator = (*ctx).opaque as *const FormatNegotiator;
    if negotiator.is_null() || pix_fmts.is_null() {
        return AVPixelFormat::AV_PIX_FMT_NONE;
    }
    let negotiator = &*negotiator;

    let mut offered = Vec::new();
    let mut i = 0;
    loop {
        let format = *pix_fmts.offset(i);
        if format == AVPixelFormat::AV_PIX_FMT_NONE {
            break;
        }
        offered.push(Pixel::from(format));
        i += 1;
    }

    match negotiator.select(&offered) {
        Ok(format) => {
            debug!("Negotiated pixel format {:?}", format);
            format.into()
        }
        Err(e) => {
            error!("{}", e);
            negotiator.rejected.store(true, Ordering::Release);
            AVPixelFormat::AV_PIX_FMT_NONE
        }
    }
}
