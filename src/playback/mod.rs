//! Decode-convert-present loop with frame pacing
//!
//! One thread, strictly sequential: frame N is read, decoded, converted and
//! presented before frame N+1 is read. Quit requests are observed only while
//! waiting out a frame's display time, so a stalled decode, convert or
//! present call cannot be interrupted.

mod clock;
#[cfg(test)]
mod fakes;

use std::time::Duration;

use ffmpeg_next::Rational;

use crate::output::{target_pixel_format, PollOutcome, PresentationSurface};
use crate::video::{
    select_video_stream, DecodedImage, Decoder, Demuxer, EncodedPacket, FrameConverter, FrameGeometry,
    ReadOutcome, StreamInfo,
};
use crate::{PlayerError, Result};

pub use clock::{Clock, MonotonicClock};

/// Where the loop is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Init,
    Running,
    /// Between end of stream and a completed rewind
    Restarting,
    /// The user quit
    Cancelled,
    /// The frame limit was reached
    Finished,
    /// A fatal error ended playback
    Fatal,
}

/// Why a successful run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackExit {
    Cancelled,
    FrameLimit,
}

/// Counters kept over a playback session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackStats {
    pub frames_presented: u64,
    /// Completed rewinds
    pub loops: u64,
    pub packets_discarded: u64,
    pub read_errors: u64,
}

/// Caller-chosen playback options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackOptions {
    /// Stop after presenting this many frames
    pub max_frames: Option<u64>,
}

/// Session configuration derived from the selected stream and surface
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackConfig {
    pub stream_index: usize,
    pub frame_rate: Rational,
    /// Format and size frames are converted to
    pub target: FrameGeometry,
    pub max_frames: Option<u64>,
}

/// Display time for a frame: `duration_hint * den / num` milliseconds
///
/// Zero when the hint or either side of the frame rate is not positive.
pub fn pacing_budget(duration_hint: i64, frame_rate: Rational) -> Duration {
    let num = i128::from(frame_rate.numerator());
    let den = i128::from(frame_rate.denominator());
    if duration_hint <= 0 || num <= 0 || den <= 0 {
        return Duration::ZERO;
    }
    let millis = i128::from(duration_hint) * den / num;
    Duration::from_millis(u64::try_from(millis).unwrap_or(u64::MAX))
}

/// Open the decoder, surface and converter for `demuxer`'s video stream
///
/// The stream is selected before anything else is created, so a source
/// without video never opens a window. The display format is mapped before
/// the converter is built and before any packet is decoded.
pub fn assemble<D, V, C, S, K>(
    demuxer: D,
    open_decoder: impl FnOnce(&D, &StreamInfo) -> Result<V>,
    open_surface: impl FnOnce() -> Result<S>,
    open_converter: impl FnOnce(FrameGeometry, FrameGeometry) -> Result<C>,
    clock: K,
    options: PlaybackOptions,
) -> Result<PlaybackLoop<D, V, C, S, K>>
where
    D: Demuxer,
    V: Decoder<Packet = D::Packet>,
    C: FrameConverter<Frame = V::Frame>,
    S: PresentationSurface,
    K: Clock,
{
    let index = select_video_stream(demuxer.streams())?;
    let stream = demuxer.streams()[index].clone();
    tracing::info!(stream = %stream, "selected video stream");

    let decoder = open_decoder(&demuxer, &stream)?;
    let surface = open_surface()?;

    let pixel = target_pixel_format(surface.native_format())?;
    let (width, height) = surface.size();
    let source = FrameGeometry::new(stream.format, stream.width, stream.height);
    let target = FrameGeometry::new(pixel, width, height);
    let converter = open_converter(source, target)?;

    PlaybackLoop::new(demuxer, decoder, converter, surface, clock, options)
}

/// Drives demuxer, decoder, converter and surface
pub struct PlaybackLoop<D, V, C, S, K = MonotonicClock> {
    demuxer: D,
    decoder: V,
    converter: C,
    surface: S,
    clock: K,
    config: PlaybackConfig,
    state: PlaybackState,
    stats: PlaybackStats,
    /// Frames presented since the last rewind
    pass_frames: u64,
}

impl<D, V, C, S, K> PlaybackLoop<D, V, C, S, K>
where
    D: Demuxer,
    V: Decoder<Packet = D::Packet>,
    C: FrameConverter<Frame = V::Frame>,
    S: PresentationSurface,
    K: Clock,
{
    /// Check that every stage agrees on the selected stream's geometry
    pub fn new(
        demuxer: D,
        decoder: V,
        converter: C,
        surface: S,
        clock: K,
        options: PlaybackOptions,
    ) -> Result<Self> {
        let index = select_video_stream(demuxer.streams())?;
        let stream = &demuxer.streams()[index];
        let source = FrameGeometry::new(stream.format, stream.width, stream.height);

        let decoded = decoder.geometry()?;
        if decoded != source {
            return Err(PlayerError::ConfigMismatch(format!(
                "decoder outputs {}, stream is {}",
                decoded, source
            )));
        }
        if converter.source() != source {
            return Err(PlayerError::ConfigMismatch(format!(
                "converter expects {}, stream is {}",
                converter.source(),
                source
            )));
        }

        let pixel = target_pixel_format(surface.native_format())?;
        let (width, height) = surface.size();
        let target = FrameGeometry::new(pixel, width, height);
        if converter.target() != target {
            return Err(PlayerError::ConfigMismatch(format!(
                "converter produces {}, surface takes {}",
                converter.target(),
                target
            )));
        }

        let config = PlaybackConfig {
            stream_index: index,
            frame_rate: stream.frame_rate,
            target,
            max_frames: options.max_frames,
        };

        Ok(Self {
            demuxer,
            decoder,
            converter,
            surface,
            clock,
            config,
            state: PlaybackState::Init,
            stats: PlaybackStats::default(),
            pass_frames: 0,
        })
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn stats(&self) -> &PlaybackStats {
        &self.stats
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn decoder(&self) -> &V {
        &self.decoder
    }

    pub fn demuxer(&self) -> &D {
        &self.demuxer
    }

    /// Play until the user quits, the frame limit is hit, or a fatal error
    pub fn run(&mut self) -> Result<PlaybackExit> {
        self.state = PlaybackState::Running;
        tracing::info!(
            stream = self.config.stream_index,
            frame_rate = %self.config.frame_rate,
            target = %self.config.target,
            "playback started"
        );

        match self.run_frames() {
            Ok(exit) => {
                tracing::info!(?exit, stats = ?self.stats, "playback ended");
                Ok(exit)
            }
            Err(e) => {
                self.state = PlaybackState::Fatal;
                tracing::error!(error = %e, stats = ?self.stats, "playback failed");
                Err(e)
            }
        }
    }

    fn run_frames(&mut self) -> Result<PlaybackExit> {
        loop {
            let packet = match self.demuxer.next_packet() {
                Ok(ReadOutcome::Packet(packet)) => packet,
                Ok(ReadOutcome::EndOfStream) => {
                    if let Some(exit) = self.restart()? {
                        return Ok(exit);
                    }
                    continue;
                }
                Err(e) if e.is_recoverable() => {
                    self.stats.read_errors += 1;
                    tracing::warn!(error = %e, code = ?e.code(), "skipping unreadable packet");
                    // A run of bad packets presents nothing, so check for quit here
                    if self.surface.poll_cancellation(Duration::ZERO) == PollOutcome::Cancelled {
                        tracing::info!(read_errors = self.stats.read_errors, "got quit request");
                        self.state = PlaybackState::Cancelled;
                        return Ok(PlaybackExit::Cancelled);
                    }
                    continue;
                }
                Err(e) => return Err(e),
            };

            if packet.stream_index() != self.config.stream_index {
                self.stats.packets_discarded += 1;
                continue;
            }

            let duration_hint = match self.decoder.submit(&packet)? {
                Some(frame) => show_frame(&mut self.converter, &mut self.surface, frame)?,
                None => continue,
            };

            if let Some(exit) = self.after_present(duration_hint) {
                return Ok(exit);
            }
        }
    }

    /// Flush the decoder's buffered frames, then rewind to the start
    fn restart(&mut self) -> Result<Option<PlaybackExit>> {
        self.state = PlaybackState::Restarting;

        loop {
            let duration_hint = match self.decoder.drain()? {
                Some(frame) => show_frame(&mut self.converter, &mut self.surface, frame)?,
                None => break,
            };
            if let Some(exit) = self.after_present(duration_hint) {
                return Ok(Some(exit));
            }
        }

        if self.pass_frames == 0 {
            return Err(PlayerError::EmptyStream);
        }

        tracing::info!(
            frames = self.pass_frames,
            loops = self.stats.loops + 1,
            "reached end of stream, rewinding"
        );
        self.demuxer.rewind()?;
        self.decoder.reset();
        self.stats.loops += 1;
        self.pass_frames = 0;
        self.state = PlaybackState::Running;
        Ok(None)
    }

    /// Count the presented frame and wait out its display time
    fn after_present(&mut self, duration_hint: i64) -> Option<PlaybackExit> {
        self.stats.frames_presented += 1;
        self.pass_frames += 1;

        if let Some(limit) = self.config.max_frames {
            if self.stats.frames_presented >= limit {
                self.state = PlaybackState::Finished;
                return Some(PlaybackExit::FrameLimit);
            }
        }

        let budget = pacing_budget(duration_hint, self.config.frame_rate);
        if self.wait(budget) == PollOutcome::Cancelled {
            tracing::info!(frames = self.stats.frames_presented, "got quit request");
            self.state = PlaybackState::Cancelled;
            return Some(PlaybackExit::Cancelled);
        }
        None
    }

    /// Wait until `budget` has elapsed on the clock, watching for a quit
    ///
    /// The surface may return before the timeout, so the remaining time is
    /// recomputed from the clock after every poll. A zero budget still polls
    /// once without blocking so the window stays responsive.
    fn wait(&mut self, budget: Duration) -> PollOutcome {
        if budget.is_zero() {
            return self.surface.poll_cancellation(Duration::ZERO);
        }

        let deadline = self.clock.now() + budget;
        loop {
            let now = self.clock.now();
            if now >= deadline {
                return PollOutcome::TimedOut;
            }
            if self.surface.poll_cancellation(deadline - now) == PollOutcome::Cancelled {
                return PollOutcome::Cancelled;
            }
        }
    }
}

/// Convert `frame` into the surface's locked buffer and present it
///
/// Returns the frame's duration hint for pacing.
fn show_frame<C, S, F>(converter: &mut C, surface: &mut S, frame: &F) -> Result<i64>
where
    C: FrameConverter<Frame = F>,
    S: PresentationSurface,
    F: DecodedImage,
{
    {
        let mut image = surface.lock()?;
        converter.convert(frame, &mut image)?;
    }
    surface.present()?;
    Ok(frame.duration_hint())
}
