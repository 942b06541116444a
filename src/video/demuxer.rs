//! Container demuxing using FFmpeg
//!
//! Opens a media source, snapshots its stream list, and yields packets in
//! container order. End of stream is reported as a value, not an error.

use ffmpeg_next::format::context::Input;
use ffmpeg_next::format::Pixel;
use ffmpeg_next::Packet;

use super::frame::EncodedPacket;
use super::stream::{MediaKind, StreamInfo};
use crate::resource::ResourceHandle;
use crate::{PlayerError, Result};

/// Result of pulling one packet from a container
#[derive(Debug)]
pub enum ReadOutcome<P> {
    Packet(P),
    EndOfStream,
}

/// Source of encoded packets
pub trait Demuxer {
    type Packet: EncodedPacket;

    /// Streams in container order
    fn streams(&self) -> &[StreamInfo];

    /// Pull the next packet. Packets of all streams are interleaved.
    fn next_packet(&mut self) -> Result<ReadOutcome<Self::Packet>>;

    /// Reposition the read cursor to the start of the container
    fn rewind(&mut self) -> Result<()>;
}

impl EncodedPacket for Packet {
    fn stream_index(&self) -> usize {
        self.stream()
    }
}

/// Demuxer over an FFmpeg input context
pub struct FfmpegDemuxer {
    input: ResourceHandle<Input>,
    streams: Vec<StreamInfo>,
}

impl FfmpegDemuxer {
    /// Open and probe a file path or URL
    ///
    /// Fails if the source cannot be read or contains no streams.
    pub fn open(url: &str) -> Result<Self> {
        let input = ffmpeg_next::format::input(&url).map_err(|cause| PlayerError::OpenFailed {
            url: url.to_string(),
            cause,
        })?;

        let streams: Vec<StreamInfo> = input.streams().map(|s| describe_stream(&s)).collect();
        if streams.is_empty() {
            return Err(PlayerError::OpenFailed {
                url: url.to_string(),
                cause: ffmpeg_next::Error::StreamNotFound,
            });
        }

        tracing::info!(
            url,
            format = input.format().name(),
            streams = streams.len(),
            "opened media source"
        );
        for stream in &streams {
            tracing::debug!("  {}", stream);
        }

        Ok(Self {
            input: ResourceHandle::new(input),
            streams,
        })
    }

    /// Codec parameters of a stream, for opening its decoder
    pub fn codec_parameters(&self, index: usize) -> Option<ffmpeg_next::codec::Parameters> {
        self.input.get()?.stream(index).map(|s| s.parameters())
    }

    fn input_mut(&mut self) -> Result<&mut Input> {
        self.input.get_mut().ok_or(PlayerError::Released("container input"))
    }
}

impl Demuxer for FfmpegDemuxer {
    type Packet = Packet;

    fn streams(&self) -> &[StreamInfo] {
        &self.streams
    }

    fn next_packet(&mut self) -> Result<ReadOutcome<Packet>> {
        let input = self.input_mut()?;
        let mut packet = Packet::empty();
        match packet.read(input) {
            Ok(()) => Ok(ReadOutcome::Packet(packet)),
            Err(ffmpeg_next::Error::Eof) => Ok(ReadOutcome::EndOfStream),
            Err(e) => Err(PlayerError::ReadFailed(e)),
        }
    }

    fn rewind(&mut self) -> Result<()> {
        let input = self.input_mut()?;
        input.seek(0, ..).map_err(PlayerError::SeekFailed)?;
        tracing::debug!("rewound to start of container");
        Ok(())
    }
}

/// Snapshot the metadata of one FFmpeg stream
fn describe_stream(stream: &ffmpeg_next::format::stream::Stream) -> StreamInfo {
    let parameters = stream.parameters();
    let kind = MediaKind::from(parameters.medium());

    // Opening a throwaway decoder context reads pix_fmt and size from codecpar
    let (format, width, height) = if kind == MediaKind::Video {
        ffmpeg_next::codec::context::Context::from_parameters(parameters.clone())
            .and_then(|context| context.decoder().video())
            .map(|video| (video.format(), video.width(), video.height()))
            .unwrap_or((Pixel::None, 0, 0))
    } else {
        (Pixel::None, 0, 0)
    };

    let avg = stream.avg_frame_rate();
    let frame_rate = if avg.numerator() > 0 && avg.denominator() > 0 {
        avg
    } else {
        stream.rate()
    };

    StreamInfo {
        index: stream.index(),
        kind,
        codec: parameters.id(),
        format,
        width,
        height,
        frame_rate,
        time_base: stream.time_base(),
    }
}
