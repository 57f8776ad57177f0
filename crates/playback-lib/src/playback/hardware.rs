use ffmpeg_next::ffi::{
    av_buffer_ref, av_buffer_unref, av_hwdevice_ctx_create, av_hwdevice_find_type_by_name,
    av_hwdevice_get_type_name, av_hwdevice_iterate_types, avcodec_get_hw_config, AVBufferRef,
    AVHWDeviceType,
};
use ffmpeg_next::format::Pixel;
use ffmpeg_next::{codec, Codec};
use log::{debug, info};
use playback_types::{PlaybackError, PlaybackErrorKind};
use std::ffi::{CStr, CString};
use std::ptr::{null, null_mut};
use std::sync::Arc;

/// RAII wrapper for an ffmpeg hardware device context.
///
/// Created once before the decoder is opened. The decoder takes its own
/// reference through [`HardwareContext::bind`], so device memory stays valid
/// for frames still in flight when this handle is dropped.
pub struct HardwareContext {
    ctx: *mut AVBufferRef,
    device_type: AVHWDeviceType,
    pix_fmt: Pixel,
}

impl HardwareContext {
    /// Resolves `device_type_name`, checks that `codec` can decode on it and
    /// opens a session on the default device.
    pub fn initialize(device_type_name: &str, codec: &Codec) -> Result<Arc<Self>, PlaybackError> {
        let device_type = device_type_by_name(device_type_name)?;
        let pix_fmt = accelerator_pixel_format(codec, device_type)?;
        Self::new(device_type, pix_fmt)
    }

    pub fn new(device_type: AVHWDeviceType, pix_fmt: Pixel) -> Result<Arc<Self>, PlaybackError> {
        let mut hw_device_ctx = null_mut();

        let ret = unsafe { av_hwdevice_ctx_create(&mut hw_device_ctx, device_type, null(), null_mut(), 0) };
        if ret < 0 || hw_device_ctx.is_null() {
            return Err(PlaybackError::new(
                PlaybackErrorKind::DeviceInit,
                format!(
                    "failed to create {} device context: {}",
                    device_type_name(device_type),
                    ffmpeg_next::Error::from(ret)
                ),
            ));
        }

        info!(
            "Created {} device context, accelerator format {:?}",
            device_type_name(device_type),
            pix_fmt
        );
        Ok(Arc::new(Self {
            ctx: hw_device_ctx,
            device_type,
            pix_fmt,
        }))
    }

    /// Hands the codec context its own reference to the device. Must run
    /// before the codec is opened.
    pub fn bind(&self, context: &mut codec::Context) -> Result<(), PlaybackError> {
        unsafe {
            let hw_ref = av_buffer_ref(self.ctx);
            if hw_ref.is_null() {
                return Err(PlaybackError::new(
                    PlaybackErrorKind::DeviceInit,
                    "failed to reference hardware device context",
                ));
            }
            let ptr = context.as_mut_ptr();
            if !(*ptr).hw_device_ctx.is_null() {
                av_buffer_unref(&mut (*ptr).hw_device_ctx);
            }
            (*ptr).hw_device_ctx = hw_ref;
        }
        debug!("Bound {} device to decoder", self.device_name());
        Ok(())
    }

    pub fn device_name(&self) -> String {
        device_type_name(self.device_type)
    }

    /// The pixel format frames have while they live in device memory.
    pub fn pixel_format(&self) -> Pixel {
        self.pix_fmt
    }
}

impl Drop for HardwareContext {
    fn drop(&mut self) {
        unsafe {
            if !self.ctx.is_null() {
                av_buffer_unref(&mut self.ctx);
            }
        }
    }
}

unsafe impl Send for HardwareContext {}
unsafe impl Sync for HardwareContext {}

pub fn device_type_name(device_type: AVHWDeviceType) -> String {
    unsafe {
        let name = av_hwdevice_get_type_name(device_type);
        if name.is_null() {
            format!("{:?}", device_type)
        } else {
            CStr::from_ptr(name).to_string_lossy().into_owned()
        }
    }
}

/// Accelerator types compiled into the linked ffmpeg.
pub fn available_device_types() -> Vec<String> {
    let mut types = Vec::new();
    let mut current = AVHWDeviceType::AV_HWDEVICE_TYPE_NONE;
    loop {
        current = unsafe { av_hwdevice_iterate_types(current) };
        if current == AVHWDeviceType::AV_HWDEVICE_TYPE_NONE {
            break;
        }
        types.push(device_type_name(current));
    }
    types
}

pub fn device_type_by_name(name: &str) -> Result<AVHWDeviceType, PlaybackError> {
    let c_name = CString::new(name).map_err(|_| {
        PlaybackError::new(
            PlaybackErrorKind::DeviceInit,
            format!("invalid device type name {:?}", name),
        )
    })?;

    let device_type = unsafe { av_hwdevice_find_type_by_name(c_name.as_ptr()) };
    if device_type == AVHWDeviceType::AV_HWDEVICE_TYPE_NONE {
        return Err(PlaybackError::new(
            PlaybackErrorKind::DeviceInit,
            format!(
                "device type {} is not supported, available device types: {}",
                name,
                available_device_types().join(" ")
            ),
        ));
    }
    Ok(device_type)
}

/// Looks through the codec's hardware configs for one that decodes through a
/// device context of `device_type` and returns its pixel format.
pub fn accelerator_pixel_format(
    codec: &Codec,
    device_type: AVHWDeviceType,
) -> Result<Pixel, PlaybackError> {
    let mut i = 0;
    unsafe {
        loop {
            let config = avcodec_get_hw_config(codec.as_ptr(), i);
            if config.is_null() {
                return Err(PlaybackError::new(
                    PlaybackErrorKind::UnsupportedHardware,
                    format!(
                        "decoder {} does not support device type {}",
                        codec.name(),
                        device_type_name(device_type)
                    ),
                ));
            }

            let hw_config = &*config;
            if (hw_config.methods
                & ffmpeg_next::ffi::AV_CODEC_HW_CONFIG_METHOD_HW_DEVICE_CTX as i32)
                != 0
                && hw_config.device_type == device_type
            {
                debug!(
                    "Decoder {} supports {} with format {:?}",
                    codec.name(),
                    device_type_name(device_type),
                    hw_config.pix_fmt
                );
                return Ok(Pixel::from(hw_config.pix_fmt));
            }
            i += 1;
        }
    }
}
