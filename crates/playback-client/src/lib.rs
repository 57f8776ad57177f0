use std::path::Path;

pub use playback_types;
use playback_types::{
    PlaybackError, PlaybackLibInit, PlaybackOptions, PlaybackSummary,
};
use stabby::libloading::StabbyLibrary;

mod test;

type InitFn = extern "C" fn() -> stabby::result::Result<PlaybackLibInit, PlaybackError>;
type InitLoggingFn = extern "C" fn(bool);
type ListHwDevicesFn = extern "C" fn() -> stabby::vec::Vec<stabby::string::String>;
type PlayVideoFn = extern "C" fn(
    stabby::string::String,
    PlaybackOptions,
) -> stabby::result::Result<PlaybackSummary, PlaybackError>;

#[derive(Debug)]
pub enum PlaybackClientError {
    Playback(PlaybackError),
    Unknown(String),
}

impl PlaybackClientError {
    /// Process exit status for this failure. Loader problems map to 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            PlaybackClientError::Playback(e) => e.exit_code(),
            PlaybackClientError::Unknown(_) => 1,
        }
    }
}

impl From<PlaybackError> for PlaybackClientError {
    fn from(error: PlaybackError) -> Self {
        PlaybackClientError::Playback(error)
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for PlaybackClientError {
    fn from(error: Box<dyn std::error::Error + Send + Sync>) -> Self {
        PlaybackClientError::Unknown(error.to_string())
    }
}

impl std::fmt::Display for PlaybackClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackClientError::Playback(e) => write!(f, "{}", e),
            PlaybackClientError::Unknown(s) => write!(f, "Unknown error: {}", s),
        }
    }
}
impl std::error::Error for PlaybackClientError {}

/// Entry points resolved from a loaded playback library.
pub struct PlaybackClient {
    init_logging: InitLoggingFn,
    list_hw_devices: ListHwDevicesFn,
    play_video: PlayVideoFn,
    // The function pointers above are only valid while this stays loaded.
    _library: libloading::Library,
}

impl PlaybackClient {
    pub fn init_logging(&self, verbose: bool) {
        (self.init_logging)(verbose)
    }

    pub fn list_hw_devices(&self) -> Vec<String> {
        (self.list_hw_devices)()
            .iter()
            .map(|name| name.as_str().to_owned())
            .collect()
    }

    pub fn play(
        &self,
        path: &str,
        options: PlaybackOptions,
    ) -> Result<PlaybackSummary, PlaybackClientError> {
        (self.play_video)(stabby::string::String::from(path), options)
            .match_owned(Ok, |e| Err(PlaybackClientError::from(e)))
    }
}

pub fn load(lib: &Path) -> Result<PlaybackClient, PlaybackClientError> {
    let library = unsafe { libloading::Library::new(lib) }
        .map_err(|e| PlaybackClientError::Unknown(e.to_string()))?;

    let init_media_lib: InitFn = *unsafe { library.get_stabbied::<InitFn>(b"init_media_lib") }?;
    init_media_lib().match_owned(|_| Ok(()), |e| Err(PlaybackClientError::from(e)))?;

    let init_logging: InitLoggingFn =
        *unsafe { library.get_stabbied::<InitLoggingFn>(b"init_logging") }?;
    let list_hw_devices: ListHwDevicesFn =
        *unsafe { library.get_stabbied::<ListHwDevicesFn>(b"list_hw_devices") }?;
    let play_video: PlayVideoFn = *unsafe { library.get_stabbied::<PlayVideoFn>(b"play_video") }?;

    Ok(PlaybackClient {
        init_logging,
        list_hw_devices,
        play_video,
        _library: library,
    })
}
