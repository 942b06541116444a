//! Pixel format and size conversion using FFmpeg's software scaler
//!
//! A converter is bound at construction to one source geometry (the
//! selected stream) and one target geometry (the surface texture). Frames
//! that don't match are rejected instead of silently rebuilding the scaler.

use ffmpeg_next::software::scaling::{Context as Scaler, Flags};

use super::decoder::DecodedFrame;
use super::frame::{ConvertedImage, FrameGeometry};
use crate::resource::ResourceHandle;
use crate::{PlayerError, Result};

/// Writes decoded frames into a presentation buffer
pub trait FrameConverter {
    type Frame;

    /// Geometry of the frames this converter accepts
    fn source(&self) -> FrameGeometry;

    /// Geometry of the images it produces
    fn target(&self) -> FrameGeometry;

    fn convert(&mut self, frame: &Self::Frame, target: &mut ConvertedImage<'_>) -> Result<()>;
}

/// Bicubic scaler from the stream geometry to the surface geometry
pub struct ScalingConverter {
    scaler: ResourceHandle<Scaler>,
    /// Reused output frame; overwritten on every conversion
    scratch: ResourceHandle<ffmpeg_next::frame::Video>,
    source: FrameGeometry,
    target: FrameGeometry,
}

impl ScalingConverter {
    pub fn new(source: FrameGeometry, target: FrameGeometry) -> Result<Self> {
        let scaler = Scaler::get(
            source.format,
            source.width,
            source.height,
            target.format,
            target.width,
            target.height,
            Flags::BICUBIC,
        )
        .map_err(|e| {
            PlayerError::UnsupportedFormat(format!("cannot convert {} to {}: {}", source, target, e))
        })?;

        tracing::debug!(%source, %target, "created bicubic scaler");

        Ok(Self {
            scaler: ResourceHandle::new(scaler),
            scratch: ResourceHandle::new(ffmpeg_next::frame::Video::new(
                target.format,
                target.width,
                target.height,
            )),
            source,
            target,
        })
    }
}

impl FrameConverter for ScalingConverter {
    type Frame = DecodedFrame;

    fn source(&self) -> FrameGeometry {
        self.source
    }

    fn target(&self) -> FrameGeometry {
        self.target
    }

    fn convert(&mut self, frame: &DecodedFrame, target: &mut ConvertedImage<'_>) -> Result<()> {
        let incoming = FrameGeometry::of(frame);
        if incoming != self.source {
            return Err(PlayerError::UnsupportedFormat(format!(
                "frame is {}, converter expects {}",
                incoming, self.source
            )));
        }
        if target.geometry() != self.target {
            return Err(PlayerError::ConfigMismatch(format!(
                "surface buffer is {}, converter produces {}",
                target.geometry(),
                self.target
            )));
        }

        let scaler = self.scaler.get_mut().ok_or(PlayerError::Released("scaler context"))?;
        let scratch = self.scratch.get_mut().ok_or(PlayerError::Released("scratch frame"))?;

        scaler
            .run(frame.video(), scratch)
            .map_err(|e| PlayerError::ConversionFailed(e.to_string()))?;

        target.copy_rows_from(scratch.data(0), scratch.stride(0));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ffmpeg_next::format::Pixel;

    const PADDING: u8 = 0xAA;

    fn source() -> FrameGeometry {
        FrameGeometry::new(Pixel::YUV420P, 16, 8)
    }

    fn target() -> FrameGeometry {
        FrameGeometry::new(Pixel::BGRA, 16, 8)
    }

    /// Mid-grey picture of the given format and size
    fn grey_frame(format: Pixel, width: u32, height: u32) -> DecodedFrame {
        let mut video = ffmpeg_next::frame::Video::new(format, width, height);
        for plane in 0..video.planes() {
            video.data_mut(plane).fill(128);
        }
        DecodedFrame::new(video, 1000)
    }

    #[test]
    fn test_convert_fills_rows_and_keeps_stride_padding() {
        let mut converter = ScalingConverter::new(source(), target()).unwrap();
        // 16 BGRA pixels are 64 bytes; leave 16 bytes of padding per row
        let stride = 80;
        let mut buffer = vec![PADDING; stride * 8];
        let mut image = ConvertedImage::new(target(), stride, &mut buffer).unwrap();

        converter.convert(&grey_frame(Pixel::YUV420P, 16, 8), &mut image).unwrap();
        drop(image);

        for row in buffer.chunks(stride) {
            let (pixels, padding) = row.split_at(64);
            assert!(padding.iter().all(|&b| b == PADDING));
            for pixel in pixels.chunks(4) {
                assert_eq!(pixel[3], 0xFF, "opaque alpha");
                assert!(pixel[..3].iter().all(|c| (120..=140).contains(c)), "grey stays grey");
            }
        }
    }

    #[test]
    fn test_mismatched_frame_is_unsupported() {
        let mut converter = ScalingConverter::new(source(), target()).unwrap();
        let mut buffer = vec![0u8; 64 * 8];

        for frame in [grey_frame(Pixel::YUV420P, 32, 8), grey_frame(Pixel::NV12, 16, 8)] {
            let mut image = ConvertedImage::new(target(), 64, &mut buffer).unwrap();
            assert!(matches!(
                converter.convert(&frame, &mut image),
                Err(PlayerError::UnsupportedFormat(_))
            ));
        }
    }

    #[test]
    fn test_mismatched_destination_is_config_mismatch() {
        let mut converter = ScalingConverter::new(source(), target()).unwrap();
        let frame = grey_frame(Pixel::YUV420P, 16, 8);
        let mut buffer = vec![0u8; 64 * 8];

        for geometry in [
            FrameGeometry::new(Pixel::RGBA, 16, 8),
            FrameGeometry::new(Pixel::BGRA, 8, 8),
        ] {
            let mut image = ConvertedImage::new(geometry, 64, &mut buffer).unwrap();
            assert!(matches!(
                converter.convert(&frame, &mut image),
                Err(PlayerError::ConfigMismatch(_))
            ));
        }
    }
}
