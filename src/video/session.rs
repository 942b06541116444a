//! Process-wide FFmpeg initialization scoped to a playback session

use crate::{PlayerError, Result};

/// Keeps FFmpeg's global state initialized while alive
///
/// Create one before opening any media; network support is torn down when
/// the session is dropped.
pub struct MediaSession {
    _private: (),
}

impl MediaSession {
    pub fn initialize() -> Result<Self> {
        ffmpeg_next::init().map_err(|e| PlayerError::Init(format!("ffmpeg: {}", e)))?;
        ffmpeg_next::format::network::init();
        ffmpeg_next::util::log::set_level(ffmpeg_next::util::log::Level::Error);
        tracing::debug!("media session initialized");
        Ok(Self { _private: () })
    }
}

impl Drop for MediaSession {
    fn drop(&mut self) {
        ffmpeg_next::format::network::deinit();
        tracing::debug!("media session shut down");
    }
}
