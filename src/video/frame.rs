//! Packet, frame and converted-image abstractions
//!
//! The playback loop only sees these traits and views, so the FFmpeg
//! types stay behind the demuxer, decoder and converter.

use ffmpeg_next::format::Pixel;

/// Duration hint of exactly one frame period, in thousandths of a period
pub const ONE_FRAME_PERIOD: i64 = 1000;

/// An encoded packet read from a container
pub trait EncodedPacket {
    /// Index of the stream this packet belongs to
    fn stream_index(&self) -> usize;
}

/// A decoded image ready for conversion
pub trait DecodedImage {
    fn format(&self) -> Pixel;
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    /// On-screen duration in thousandths of a frame period
    fn duration_hint(&self) -> i64;
}

/// Pixel format and size of an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    pub format: Pixel,
    pub width: u32,
    pub height: u32,
}

impl FrameGeometry {
    pub fn new(format: Pixel, width: u32, height: u32) -> Self {
        Self { format, width, height }
    }

    pub fn of(image: &impl DecodedImage) -> Self {
        Self::new(image.format(), image.width(), image.height())
    }
}

impl std::fmt::Display for FrameGeometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} {}x{}", self.format, self.width, self.height)
    }
}

/// A frame re-expressed in the surface's pixel format, written in place
/// into the surface's locked buffer
///
/// Rows are `stride` bytes apart; `stride` may exceed the packed row size.
pub struct ConvertedImage<'a> {
    geometry: FrameGeometry,
    stride: usize,
    data: &'a mut [u8],
}

impl<'a> ConvertedImage<'a> {
    /// Wrap a locked buffer. Fails if the buffer cannot hold `height` rows.
    pub fn new(geometry: FrameGeometry, stride: usize, data: &'a mut [u8]) -> crate::Result<Self> {
        let row_bytes = packed_row_bytes(geometry);
        if stride < row_bytes {
            return Err(crate::PlayerError::LockFailed(format!(
                "stride {} shorter than row of {} bytes",
                stride, row_bytes
            )));
        }
        let needed = stride * geometry.height as usize;
        if data.len() < needed {
            return Err(crate::PlayerError::LockFailed(format!(
                "buffer of {} bytes cannot hold {} rows of {}",
                data.len(),
                geometry.height,
                stride
            )));
        }
        Ok(Self { geometry, stride, data })
    }

    pub fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Mutable access to one row's packed pixels (without stride padding)
    pub fn row_mut(&mut self, y: usize) -> &mut [u8] {
        let start = y * self.stride;
        let len = packed_row_bytes(self.geometry);
        &mut self.data[start..start + len]
    }

    /// Copy rows from a source plane with its own linesize
    pub fn copy_rows_from(&mut self, src: &[u8], src_stride: usize) {
        let row_bytes = packed_row_bytes(self.geometry);
        for y in 0..self.geometry.height as usize {
            let from = y * src_stride;
            self.row_mut(y).copy_from_slice(&src[from..from + row_bytes]);
        }
    }
}

/// Every surface format is 32-bit BGRA or RGBA
pub const BYTES_PER_PIXEL: usize = 4;

/// Bytes in one row of packed pixels
pub fn packed_row_bytes(geometry: FrameGeometry) -> usize {
    geometry.width as usize * BYTES_PER_PIXEL
}
