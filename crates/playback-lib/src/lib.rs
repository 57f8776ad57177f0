pub mod playback;
use std::path::Path;

use ffmpeg_next as ffmpeg;
use log::{debug, error};
use playback::PlaybackSession;
use playback_types::{
    PlaybackError, PlaybackErrorKind, PlaybackLibInit, PlaybackOptions, PlaybackSummary,
};

#[stabby::stabby]
#[stabby::export]
pub fn init_media_lib() -> stabby::result::Result<PlaybackLibInit, PlaybackError> {
    match ffmpeg::init() {
        Ok(_) => Ok(PlaybackLibInit {}).into(),
        Err(e) => Err(PlaybackError::new(PlaybackErrorKind::FFmpeg, e.to_string())).into(),
    }
}

#[stabby::stabby]
#[stabby::export]
pub fn init_logging(verbose: bool) {
    let log_level = if verbose {
        ffmpeg::util::log::Level::Debug
    } else {
        ffmpeg::util::log::Level::Info
    };
    ffmpeg::util::log::set_level(log_level);
    if let Err(e) = pretty_env_logger::try_init() {
        debug!("Logger already initialized: {}", e);
    }
}

/// Names of the accelerator types the linked FFmpeg was built with.
#[stabby::stabby]
#[stabby::export]
pub fn list_hw_devices() -> stabby::vec::Vec<stabby::string::String> {
    let mut names = stabby::vec::Vec::new();
    for name in playback::available_device_types() {
        names.push(stabby::string::String::from(name.as_str()));
    }
    names
}

/// Plays `path_str` in a window until the stream ends or the window is
/// closed.
#[stabby::stabby]
#[stabby::export]
pub fn play_video(
    path_str: stabby::string::String,
    options: PlaybackOptions,
) -> stabby::result::Result<PlaybackSummary, PlaybackError> {
    let path_str = path_str.to_string();
    let path = Path::new(&path_str);

    match PlaybackSession::open(path, &options).and_then(PlaybackSession::run) {
        Ok(stats) => Ok(PlaybackSummary::from(stats)).into(),
        Err(e) => {
            error!("{}", e);
            Err(e).into()
        }
    }
}
