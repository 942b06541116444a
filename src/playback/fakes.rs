//! Scripted stand-ins for the playback stages

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::{Duration, Instant};

use ffmpeg_next::format::Pixel;

use super::Clock;
use crate::output::{target_pixel_format, DisplayFormat, PollOutcome, PresentationSurface};
use crate::video::{
    ConvertedImage, DecodedImage, Decoder, Demuxer, EncodedPacket, FrameConverter, FrameGeometry, ReadOutcome,
    StreamInfo, ONE_FRAME_PERIOD,
};
use crate::{PlayerError, Result};

pub const SURFACE_WIDTH: u32 = 8;
pub const SURFACE_HEIGHT: u32 = 4;

/// Clock that only moves when told to
#[derive(Clone)]
pub struct ManualClock {
    base: Instant,
    offset: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Rc::new(Cell::new(Duration::ZERO)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.offset.set(self.offset.get() + by);
    }

    pub fn elapsed(&self) -> Duration {
        self.offset.get()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + self.offset.get()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FakePacket {
    pub stream: usize,
    pub id: u32,
    pub duration_hint: i64,
}

impl EncodedPacket for FakePacket {
    fn stream_index(&self) -> usize {
        self.stream
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Step {
    Packet(FakePacket),
    ReadError,
}

/// One-frame packet on `stream`
pub fn packet(stream: usize, id: u32) -> Step {
    Step::Packet(FakePacket {
        stream,
        id,
        duration_hint: ONE_FRAME_PERIOD,
    })
}

pub struct FakeDemuxer {
    pub streams: Vec<StreamInfo>,
    pub script: Vec<Step>,
    cursor: usize,
    pub rewinds: u32,
    pub fail_rewind: bool,
}

impl FakeDemuxer {
    pub fn new(streams: Vec<StreamInfo>, script: Vec<Step>) -> Self {
        Self {
            streams,
            script,
            cursor: 0,
            rewinds: 0,
            fail_rewind: false,
        }
    }
}

impl Demuxer for FakeDemuxer {
    type Packet = FakePacket;

    fn streams(&self) -> &[StreamInfo] {
        &self.streams
    }

    fn next_packet(&mut self) -> Result<ReadOutcome<FakePacket>> {
        let Some(step) = self.script.get(self.cursor).copied() else {
            return Ok(ReadOutcome::EndOfStream);
        };
        self.cursor += 1;
        match step {
            Step::Packet(packet) => Ok(ReadOutcome::Packet(packet)),
            Step::ReadError => Err(PlayerError::ReadFailed(ffmpeg_next::Error::InvalidData)),
        }
    }

    fn rewind(&mut self) -> Result<()> {
        if self.fail_rewind {
            return Err(PlayerError::SeekFailed(ffmpeg_next::Error::Other { errno: 5 }));
        }
        self.cursor = 0;
        self.rewinds += 1;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FakeFrame {
    pub id: u32,
    pub duration_hint: i64,
    pub geometry: FrameGeometry,
}

impl DecodedImage for FakeFrame {
    fn format(&self) -> Pixel {
        self.geometry.format
    }

    fn width(&self) -> u32 {
        self.geometry.width
    }

    fn height(&self) -> u32 {
        self.geometry.height
    }

    fn duration_hint(&self) -> i64 {
        self.duration_hint
    }
}

/// Decoder that holds `delay` frames before emitting the oldest
pub struct FakeDecoder {
    pub geometry: FrameGeometry,
    pub delay: usize,
    /// Packet ids that decode to nothing
    pub drop_ids: Vec<u32>,
    /// Stream index of every packet submitted
    pub submitted: Vec<usize>,
    pub resets: u32,
    pending: VecDeque<FakeFrame>,
    current: Option<FakeFrame>,
}

impl FakeDecoder {
    pub fn new(geometry: FrameGeometry) -> Self {
        Self {
            geometry,
            delay: 0,
            drop_ids: Vec::new(),
            submitted: Vec::new(),
            resets: 0,
            pending: VecDeque::new(),
            current: None,
        }
    }

    fn emit(&mut self, frame: Option<FakeFrame>) -> Option<&FakeFrame> {
        self.current = frame;
        self.current.as_ref()
    }
}

impl Decoder for FakeDecoder {
    type Packet = FakePacket;
    type Frame = FakeFrame;

    fn geometry(&self) -> Result<FrameGeometry> {
        Ok(self.geometry)
    }

    fn submit(&mut self, packet: &FakePacket) -> Result<Option<&FakeFrame>> {
        self.submitted.push(packet.stream);
        if self.drop_ids.contains(&packet.id) {
            return Ok(None);
        }
        self.pending.push_back(FakeFrame {
            id: packet.id,
            duration_hint: packet.duration_hint,
            geometry: self.geometry,
        });
        let ready = if self.pending.len() > self.delay {
            self.pending.pop_front()
        } else {
            None
        };
        Ok(self.emit(ready))
    }

    fn drain(&mut self) -> Result<Option<&FakeFrame>> {
        let ready = self.pending.pop_front();
        Ok(self.emit(ready))
    }

    fn reset(&mut self) {
        self.pending.clear();
        self.resets += 1;
    }
}

/// Writes the frame id into the first four bytes of row 0
pub struct FakeConverter {
    pub source: FrameGeometry,
    pub target: FrameGeometry,
    pub fail_on: Option<u32>,
}

impl FrameConverter for FakeConverter {
    type Frame = FakeFrame;

    fn source(&self) -> FrameGeometry {
        self.source
    }

    fn target(&self) -> FrameGeometry {
        self.target
    }

    fn convert(&mut self, frame: &FakeFrame, target: &mut ConvertedImage<'_>) -> Result<()> {
        if self.fail_on == Some(frame.id) {
            return Err(PlayerError::ConversionFailed(format!("frame {}", frame.id)));
        }
        target.row_mut(0)[..4].copy_from_slice(&frame.id.to_le_bytes());
        Ok(())
    }
}

/// Surface that records what was presented and when
pub struct FakeSurface {
    pub format: DisplayFormat,
    clock: ManualClock,
    buffer: Vec<u8>,
    /// Frame id and clock time of every present
    pub presented: Vec<(u32, Duration)>,
    /// Timeout of every poll
    pub polls: Vec<Duration>,
    /// Report a quit request once this many frames were presented
    pub cancel_after: Option<usize>,
    /// Return early after at most this long
    pub poll_step: Option<Duration>,
}

impl FakeSurface {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            format: DisplayFormat::Bgra8Unorm,
            clock,
            buffer: vec![0; (SURFACE_WIDTH * SURFACE_HEIGHT * 4) as usize],
            presented: Vec::new(),
            polls: Vec::new(),
            cancel_after: None,
            poll_step: None,
        }
    }

    pub fn presented_ids(&self) -> Vec<u32> {
        self.presented.iter().map(|(id, _)| *id).collect()
    }
}

impl PresentationSurface for FakeSurface {
    fn native_format(&self) -> DisplayFormat {
        self.format
    }

    fn size(&self) -> (u32, u32) {
        (SURFACE_WIDTH, SURFACE_HEIGHT)
    }

    fn lock(&mut self) -> Result<ConvertedImage<'_>> {
        let geometry = FrameGeometry::new(target_pixel_format(self.format)?, SURFACE_WIDTH, SURFACE_HEIGHT);
        ConvertedImage::new(geometry, (SURFACE_WIDTH * 4) as usize, &mut self.buffer)
    }

    fn present(&mut self) -> Result<()> {
        let mut id = [0u8; 4];
        id.copy_from_slice(&self.buffer[..4]);
        self.presented.push((u32::from_le_bytes(id), self.clock.elapsed()));
        Ok(())
    }

    fn poll_cancellation(&mut self, timeout: Duration) -> PollOutcome {
        self.polls.push(timeout);
        if self.cancel_after.is_some_and(|n| self.presented.len() >= n) {
            return PollOutcome::Cancelled;
        }
        let step = self.poll_step.map_or(timeout, |step| step.min(timeout));
        self.clock.advance(step);
        PollOutcome::TimedOut
    }
}
