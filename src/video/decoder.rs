//! Video decoding using FFmpeg
//!
//! Packets of the selected stream go in; a frame comes out whenever the
//! codec has buffered enough data. The decoder owns a single scratch frame
//! that each successful decode overwrites in place: a frame reference
//! returned by [`Decoder::submit`] is valid until the next submit.

use ffmpeg_next::{Packet, Rational};

use super::demuxer::FfmpegDemuxer;
use super::frame::{DecodedImage, FrameGeometry, ONE_FRAME_PERIOD};
use super::stream::StreamInfo;
use crate::resource::ResourceHandle;
use crate::{PlayerError, Result};

/// Turns encoded packets into decoded frames
pub trait Decoder {
    type Packet;
    type Frame: DecodedImage;

    /// Output format and size the decoder was opened with
    fn geometry(&self) -> Result<FrameGeometry>;

    /// Feed one packet. Yields a frame only when one is ready.
    fn submit(&mut self, packet: &Self::Packet) -> Result<Option<&Self::Frame>>;

    /// Signal end of input and pull the frames still buffered, one per call.
    /// `None` once the codec is empty. Call `reset` before submitting again.
    fn drain(&mut self) -> Result<Option<&Self::Frame>>;

    /// Drop buffered packets and reference frames
    fn reset(&mut self);
}

/// Decoded picture plus its display duration
pub struct DecodedFrame {
    video: ffmpeg_next::frame::Video,
    duration_hint: i64,
}

impl DecodedFrame {
    pub(crate) fn new(video: ffmpeg_next::frame::Video, duration_hint: i64) -> Self {
        Self { video, duration_hint }
    }

    /// The underlying FFmpeg frame (planes and linesizes)
    pub fn video(&self) -> &ffmpeg_next::frame::Video {
        &self.video
    }
}

impl DecodedImage for DecodedFrame {
    fn format(&self) -> ffmpeg_next::format::Pixel {
        self.video.format()
    }

    fn width(&self) -> u32 {
        self.video.width()
    }

    fn height(&self) -> u32 {
        self.video.height()
    }

    fn duration_hint(&self) -> i64 {
        self.duration_hint
    }
}

/// Software video decoder for one stream
pub struct FfmpegDecoder {
    decoder: ResourceHandle<ffmpeg_next::decoder::Video>,
    frame: DecodedFrame,
    draining: bool,
    time_base: Rational,
    frame_rate: Rational,
}

impl FfmpegDecoder {
    /// Resolve and open a decoder for `stream`'s codec
    pub fn open(demuxer: &FfmpegDemuxer, stream: &StreamInfo) -> Result<Self> {
        let codec = ffmpeg_next::decoder::find(stream.codec)
            .ok_or_else(|| PlayerError::UnsupportedCodec(format!("{:?}", stream.codec)))?;

        let parameters = demuxer
            .codec_parameters(stream.index)
            .ok_or(PlayerError::Released("container input"))?;
        let context = ffmpeg_next::codec::context::Context::from_parameters(parameters)
            .map_err(PlayerError::DecoderOpenFailed)?;

        Self::open_context(context, codec, stream)
    }

    fn open_context(
        context: ffmpeg_next::codec::context::Context,
        codec: ffmpeg_next::Codec,
        stream: &StreamInfo,
    ) -> Result<Self> {
        let decoder = context
            .decoder()
            .open_as(codec)
            .and_then(|opened| opened.video())
            .map_err(PlayerError::DecoderOpenFailed)?;

        tracing::info!(
            codec = codec.name(),
            width = decoder.width(),
            height = decoder.height(),
            format = ?decoder.format(),
            "opened video decoder"
        );

        Ok(Self {
            decoder: ResourceHandle::new(decoder),
            frame: DecodedFrame::new(ffmpeg_next::frame::Video::empty(), ONE_FRAME_PERIOD),
            draining: false,
            time_base: stream.time_base,
            frame_rate: stream.frame_rate,
        })
    }

    /// Tag the frame just received with the duration of the packet that produced it
    fn frame_ready(&mut self) -> &DecodedFrame {
        let duration = self.frame.video.packet().duration;
        self.frame.duration_hint = duration_hint(duration, self.time_base, self.frame_rate);
        &self.frame
    }
}

impl Decoder for FfmpegDecoder {
    type Packet = Packet;
    type Frame = DecodedFrame;

    fn geometry(&self) -> Result<FrameGeometry> {
        let decoder = self.decoder.get().ok_or(PlayerError::Released("codec context"))?;
        Ok(FrameGeometry::new(decoder.format(), decoder.width(), decoder.height()))
    }

    fn submit(&mut self, packet: &Packet) -> Result<Option<&DecodedFrame>> {
        let decoder = self
            .decoder
            .get_mut()
            .ok_or(PlayerError::Released("codec context"))?;

        match decoder.send_packet(packet) {
            Ok(()) => {}
            Err(ffmpeg_next::Error::Other {
                errno: ffmpeg_next::error::EAGAIN,
            }) => {
                // The codec is still holding a frame: deliver it, then queue the packet
                decoder
                    .receive_frame(&mut self.frame.video)
                    .map_err(PlayerError::DecodeFailed)?;
                decoder.send_packet(packet).map_err(PlayerError::DecodeFailed)?;
                return Ok(Some(self.frame_ready()));
            }
            Err(e) => return Err(PlayerError::DecodeFailed(e)),
        }

        match decoder.receive_frame(&mut self.frame.video) {
            Ok(()) => Ok(Some(self.frame_ready())),
            Err(ffmpeg_next::Error::Other {
                errno: ffmpeg_next::error::EAGAIN,
            })
            | Err(ffmpeg_next::Error::Eof) => Ok(None),
            Err(e) => Err(PlayerError::DecodeFailed(e)),
        }
    }

    fn drain(&mut self) -> Result<Option<&DecodedFrame>> {
        let decoder = self
            .decoder
            .get_mut()
            .ok_or(PlayerError::Released("codec context"))?;

        if !self.draining {
            decoder.send_eof().map_err(PlayerError::DecodeFailed)?;
            self.draining = true;
        }

        match decoder.receive_frame(&mut self.frame.video) {
            Ok(()) => Ok(Some(self.frame_ready())),
            Err(ffmpeg_next::Error::Eof)
            | Err(ffmpeg_next::Error::Other {
                errno: ffmpeg_next::error::EAGAIN,
            }) => Ok(None),
            Err(e) => Err(PlayerError::DecodeFailed(e)),
        }
    }

    fn reset(&mut self) {
        if let Some(decoder) = self.decoder.get_mut() {
            decoder.flush();
            tracing::debug!("decoder flushed");
        }
        self.draining = false;
    }
}

/// Convert a packet duration (stream time base) into thousandths of a frame
/// period. Unknown durations count as exactly one frame.
pub fn duration_hint(duration: i64, time_base: Rational, frame_rate: Rational) -> i64 {
    let tb_num = i128::from(time_base.numerator());
    let tb_den = i128::from(time_base.denominator());
    let fr_num = i128::from(frame_rate.numerator());
    let fr_den = i128::from(frame_rate.denominator());

    if duration <= 0 || tb_num <= 0 || tb_den <= 0 || fr_num <= 0 || fr_den <= 0 {
        return ONE_FRAME_PERIOD;
    }

    let numerator = i128::from(duration) * tb_num * fr_num * 1000;
    let denominator = tb_den * fr_den;
    let hint = (numerator + denominator / 2) / denominator;
    i64::try_from(hint).unwrap_or(i64::MAX).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::{test_stream, MediaKind};
    use ffmpeg_next::format::Pixel;

    /// Bytes in one packed YUV420P 16x8 picture
    const RAW_PICTURE_BYTES: usize = 16 * 8 + 2 * (8 * 4);

    /// Rawvideo decoder for 16x8 YUV420P pictures; no container needed
    fn raw_decoder() -> FfmpegDecoder {
        ffmpeg_next::init().unwrap();
        let codec = ffmpeg_next::decoder::find(ffmpeg_next::codec::Id::RAWVIDEO).unwrap();
        let mut context = ffmpeg_next::codec::context::Context::new_with_codec(codec);
        // SAFETY: the context was just allocated and is not open yet
        unsafe {
            let raw = context.as_mut_ptr();
            (*raw).width = 16;
            (*raw).height = 8;
            (*raw).pix_fmt = Pixel::YUV420P.into();
        }
        // 25fps with a 1/12800 time base: 512 ticks per frame
        FfmpegDecoder::open_context(context, codec, &test_stream(0, MediaKind::Video)).unwrap()
    }

    fn raw_packet(duration: i64) -> Packet {
        let mut packet = Packet::copy(&[128u8; RAW_PICTURE_BYTES]);
        packet.set_duration(duration);
        packet
    }

    #[test]
    fn test_frame_carries_its_own_packet_duration() {
        let mut decoder = raw_decoder();
        assert_eq!(
            decoder.geometry().unwrap(),
            FrameGeometry::new(Pixel::YUV420P, 16, 8)
        );

        let frame = decoder.submit(&raw_packet(1024)).unwrap().unwrap();
        assert_eq!(frame.duration_hint(), 2000);
        assert_eq!((frame.width(), frame.height()), (16, 8));

        let frame = decoder.submit(&raw_packet(512)).unwrap().unwrap();
        assert_eq!(frame.duration_hint(), 1000);
    }

    #[test]
    fn test_drain_then_reset_accepts_packets_again() {
        let mut decoder = raw_decoder();
        assert!(decoder.submit(&raw_packet(512)).unwrap().is_some());

        assert!(decoder.drain().unwrap().is_none());
        assert!(decoder.drain().unwrap().is_none());

        decoder.reset();
        let frame = decoder.submit(&raw_packet(0)).unwrap().unwrap();
        // Unknown duration counts as one frame
        assert_eq!(frame.duration_hint(), ONE_FRAME_PERIOD);
    }

    #[test]
    fn test_duration_hint_one_frame() {
        // mp4-style 1/12800 time base at 25fps: 512 ticks is one frame
        assert_eq!(duration_hint(512, Rational::new(1, 12800), Rational::new(25, 1)), 1000);
        // time base equal to the frame period
        assert_eq!(duration_hint(1, Rational::new(1, 25), Rational::new(25, 1)), 1000);
    }

    #[test]
    fn test_duration_hint_multiple_and_ntsc() {
        assert_eq!(duration_hint(2, Rational::new(1, 25), Rational::new(25, 1)), 2000);
        // 29.97fps with a 1/30000 time base: 1001 ticks per frame
        assert_eq!(
            duration_hint(1001, Rational::new(1, 30000), Rational::new(30000, 1001)),
            1000
        );
    }

    #[test]
    fn test_duration_hint_unknown_defaults_to_one_frame() {
        assert_eq!(duration_hint(0, Rational::new(1, 25), Rational::new(25, 1)), ONE_FRAME_PERIOD);
        assert_eq!(duration_hint(40, Rational::new(1, 1000), Rational::new(0, 1)), ONE_FRAME_PERIOD);
    }
}
