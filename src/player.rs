//! Wires the FFmpeg stages and the window surface into a playback loop

use crate::output::WindowSurface;
use crate::playback::{assemble, MonotonicClock, PlaybackExit, PlaybackOptions};
use crate::settings::PlayerSettings;
use crate::video::{Demuxer, FfmpegDecoder, FfmpegDemuxer, MediaSession, ScalingConverter};
use crate::Result;

/// Play `source` in a window until the user quits
///
/// Everything opened here is released before returning, on success and on
/// failure alike.
pub fn play(source: &str, settings: &PlayerSettings, max_frames: Option<u64>) -> Result<PlaybackExit> {
    let _session = MediaSession::initialize()?;

    let demuxer = FfmpegDemuxer::open(source)?;
    for stream in demuxer.streams() {
        tracing::info!(%stream, "found stream");
    }

    let surface_config = settings.surface_config();
    let mut playback = assemble(
        demuxer,
        FfmpegDecoder::open,
        || WindowSurface::create(&surface_config),
        ScalingConverter::new,
        MonotonicClock,
        PlaybackOptions { max_frames },
    )?;

    playback.run()
}
