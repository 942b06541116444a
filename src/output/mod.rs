//! Presentation surface: window, render context and streaming texture
//!
//! The playback loop locks the surface's texture buffer, lets the converter
//! write into it, then presents. Waiting for a quit request with a timeout
//! doubles as the frame pacing primitive.

mod renderer;
mod texture;
mod window;

use std::time::Duration;

use ffmpeg_next::format::Pixel;

use crate::video::ConvertedImage;
use crate::{PlayerError, Result};

pub use renderer::FrameRenderer;
pub use texture::{StreamingTexture, COPY_ROW_ALIGNMENT};
pub use window::{SurfaceConfig, WindowSurface};

/// Outcome of waiting on the windowing layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The user asked to quit
    Cancelled,
    /// The wait ended without a quit request
    TimedOut,
}

/// Pixel layouts a display surface can report as native
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayFormat {
    Bgra8Unorm,
    Bgra8UnormSrgb,
    Rgba8Unorm,
    Rgba8UnormSrgb,
    /// Anything else, e.g. 10-bit or float surfaces
    Other(wgpu::TextureFormat),
}

impl From<wgpu::TextureFormat> for DisplayFormat {
    fn from(format: wgpu::TextureFormat) -> Self {
        match format {
            wgpu::TextureFormat::Bgra8Unorm => DisplayFormat::Bgra8Unorm,
            wgpu::TextureFormat::Bgra8UnormSrgb => DisplayFormat::Bgra8UnormSrgb,
            wgpu::TextureFormat::Rgba8Unorm => DisplayFormat::Rgba8Unorm,
            wgpu::TextureFormat::Rgba8UnormSrgb => DisplayFormat::Rgba8UnormSrgb,
            other => DisplayFormat::Other(other),
        }
    }
}

/// Map a native display format to the pixel format the converter must produce
///
/// Fixed table, not negotiated: an unmapped format is a fatal configuration
/// error.
pub fn target_pixel_format(format: DisplayFormat) -> Result<Pixel> {
    match format {
        DisplayFormat::Bgra8Unorm | DisplayFormat::Bgra8UnormSrgb => Ok(Pixel::BGRA),
        DisplayFormat::Rgba8Unorm | DisplayFormat::Rgba8UnormSrgb => Ok(Pixel::RGBA),
        DisplayFormat::Other(other) => Err(PlayerError::UnsupportedFormat(format!(
            "display format {:?} has no pixel format mapping",
            other
        ))),
    }
}

/// A fixed-size output that shows converted frames
pub trait PresentationSurface {
    /// Texture format the display expects
    fn native_format(&self) -> DisplayFormat;

    /// Output size in pixels
    fn size(&self) -> (u32, u32);

    /// Lock the texture's backing buffer for writing
    fn lock(&mut self) -> Result<ConvertedImage<'_>>;

    /// Upload the locked buffer, clear, draw and swap
    fn present(&mut self) -> Result<()>;

    /// Wait up to `timeout` for a close or quit request
    fn poll_cancellation(&mut self, timeout: Duration) -> PollOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_format_mapping_table() {
        assert_eq!(target_pixel_format(DisplayFormat::Bgra8Unorm).unwrap(), Pixel::BGRA);
        assert_eq!(target_pixel_format(DisplayFormat::Bgra8UnormSrgb).unwrap(), Pixel::BGRA);
        assert_eq!(target_pixel_format(DisplayFormat::Rgba8Unorm).unwrap(), Pixel::RGBA);
        assert_eq!(target_pixel_format(DisplayFormat::Rgba8UnormSrgb).unwrap(), Pixel::RGBA);
    }

    #[test]
    fn test_unmapped_display_format_is_rejected() {
        let format = DisplayFormat::from(wgpu::TextureFormat::Rgba16Float);
        assert_eq!(format, DisplayFormat::Other(wgpu::TextureFormat::Rgba16Float));
        assert!(matches!(
            target_pixel_format(format),
            Err(PlayerError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_texture_format_conversion() {
        assert_eq!(
            DisplayFormat::from(wgpu::TextureFormat::Bgra8UnormSrgb),
            DisplayFormat::Bgra8UnormSrgb
        );
    }
}
