//! Video demuxing, decoding and conversion
//!
//! Provides the FFmpeg-backed stages of the pipeline (via the `ffmpeg-next`
//! crate) and the traits the playback loop drives them through.

mod converter;
mod decoder;
mod demuxer;
mod frame;
mod session;
mod stream;

pub use converter::{FrameConverter, ScalingConverter};
pub use decoder::{duration_hint, DecodedFrame, Decoder, FfmpegDecoder};
pub use demuxer::{Demuxer, FfmpegDemuxer, ReadOutcome};
pub use frame::{
    packed_row_bytes, BYTES_PER_PIXEL, ConvertedImage, DecodedImage, EncodedPacket, FrameGeometry,
    ONE_FRAME_PERIOD,
};
pub use session::MediaSession;
pub use stream::{select_video_stream, MediaKind, StreamInfo};

#[cfg(test)]
pub(crate) use stream::test_stream;
