use stabby::string::String;

/// The pipeline stage a fatal error came from.
#[stabby::stabby]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackErrorKind {
    Unknown,
    FFmpeg,
    DeviceInit,
    UnsupportedHardware,
    FormatNegotiation,
    DecodeSubmit,
    DecodeReceive,
    FrameTransfer,
    Conversion,
    Presentation,
}

impl PlaybackErrorKind {
    pub fn stage(&self) -> &'static str {
        match self {
            PlaybackErrorKind::Unknown => "playback",
            PlaybackErrorKind::FFmpeg => "media setup",
            PlaybackErrorKind::DeviceInit => "hardware device initialization",
            PlaybackErrorKind::UnsupportedHardware => "hardware capability lookup",
            PlaybackErrorKind::FormatNegotiation => "pixel format negotiation",
            PlaybackErrorKind::DecodeSubmit => "packet submission",
            PlaybackErrorKind::DecodeReceive => "frame retrieval",
            PlaybackErrorKind::FrameTransfer => "device to host frame transfer",
            PlaybackErrorKind::Conversion => "color conversion",
            PlaybackErrorKind::Presentation => "presentation",
        }
    }

    /// Process exit status for a run that ended with this kind of error.
    pub fn exit_code(&self) -> i32 {
        match self {
            PlaybackErrorKind::Unknown => 1,
            PlaybackErrorKind::FFmpeg => 2,
            PlaybackErrorKind::DeviceInit => 3,
            PlaybackErrorKind::UnsupportedHardware => 4,
            PlaybackErrorKind::FormatNegotiation => 5,
            PlaybackErrorKind::DecodeSubmit => 6,
            PlaybackErrorKind::DecodeReceive => 7,
            PlaybackErrorKind::FrameTransfer => 8,
            PlaybackErrorKind::Conversion => 9,
            PlaybackErrorKind::Presentation => 10,
        }
    }
}

#[stabby::stabby]
#[derive(Debug, Clone)]
pub struct PlaybackError {
    pub kind: PlaybackErrorKind,
    pub message: String,
}

impl PlaybackError {
    pub fn new(kind: PlaybackErrorKind, message: impl AsRef<str>) -> Self {
        Self {
            kind,
            message: String::from(message.as_ref()),
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.kind.exit_code()
    }
}

impl std::fmt::Display for PlaybackError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} failed: {}", self.kind.stage(), self.message.as_str())
    }
}

impl std::error::Error for PlaybackError {}

/// Returned by `init_media_lib` once FFmpeg is initialized.
#[stabby::stabby]
pub struct PlaybackLibInit {}

/// Startup parameters handed from the CLI to the pipeline.
#[stabby::stabby]
#[derive(Debug, Clone)]
pub struct PlaybackOptions {
    /// Accelerator type name as ffmpeg knows it, e.g. `cuda` or `vaapi`.
    pub device_type: String,
    /// Fixed delay after every presented frame.
    pub frame_interval_ms: u32,
    pub verbose: bool,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            device_type: String::from("cuda"),
            frame_interval_ms: 40,
            verbose: false,
        }
    }
}

#[stabby::stabby]
#[derive(Debug, Clone, Default)]
pub struct PlaybackSummary {
    pub packets_submitted: u64,
    pub frames_received: u64,
    pub frames_transferred: u64,
    pub frames_presented: u64,
    /// The surface was closed before the stream ran out.
    pub cancelled: bool,
}
