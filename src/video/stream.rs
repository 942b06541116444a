//! Stream descriptors captured from an opened container

use ffmpeg_next::format::Pixel;
use ffmpeg_next::Rational;

/// What an elementary stream carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Audio,
    Other,
}

impl From<ffmpeg_next::media::Type> for MediaKind {
    fn from(kind: ffmpeg_next::media::Type) -> Self {
        match kind {
            ffmpeg_next::media::Type::Video => MediaKind::Video,
            ffmpeg_next::media::Type::Audio => MediaKind::Audio,
            _ => MediaKind::Other,
        }
    }
}

/// Read-only view of one stream inside a media source
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    /// Index of the stream in container order
    pub index: usize,
    pub kind: MediaKind,
    pub codec: ffmpeg_next::codec::Id,
    /// Pixel format (video streams only, `Pixel::None` otherwise)
    pub format: Pixel,
    pub width: u32,
    pub height: u32,
    /// Frames per second as num/den
    pub frame_rate: Rational,
    /// Unit of packet timestamps and durations
    pub time_base: Rational,
}

impl StreamInfo {
    pub fn is_video(&self) -> bool {
        self.kind == MediaKind::Video
    }
}

impl std::fmt::Display for StreamInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            MediaKind::Video => write!(
                f,
                "#{} video {:?} {:?} {}x{} @ {}/{}",
                self.index,
                self.codec,
                self.format,
                self.width,
                self.height,
                self.frame_rate.numerator(),
                self.frame_rate.denominator()
            ),
            MediaKind::Audio => write!(f, "#{} audio {:?}", self.index, self.codec),
            MediaKind::Other => write!(f, "#{} other {:?}", self.index, self.codec),
        }
    }
}

/// Pick the first video stream in container order
pub fn select_video_stream(streams: &[StreamInfo]) -> crate::Result<usize> {
    streams
        .iter()
        .find(|s| s.is_video())
        .map(|s| s.index)
        .ok_or(crate::PlayerError::NoVideoStream)
}

#[cfg(test)]
pub(crate) fn test_stream(index: usize, kind: MediaKind) -> StreamInfo {
    StreamInfo {
        index,
        kind,
        codec: ffmpeg_next::codec::Id::H264,
        format: if kind == MediaKind::Video { Pixel::YUV420P } else { Pixel::None },
        width: 352,
        height: 288,
        frame_rate: Rational::new(25, 1),
        time_base: Rational::new(1, 12800),
    }
}
