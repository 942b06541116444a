//! Streaming texture for converted video frames
//!
//! Frames are written into a CPU staging buffer whose rows are padded to
//! wgpu's copy alignment, then uploaded to the GPU texture in one copy.

use ffmpeg_next::format::Pixel;

use crate::resource::{Releasable, ResourceHandle};
use crate::video::{ConvertedImage, FrameGeometry, BYTES_PER_PIXEL};
use crate::{PlayerError, Result};

/// Row pitch alignment required for buffer-to-texture copies
pub const COPY_ROW_ALIGNMENT: usize = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as usize;

impl Releasable for wgpu::Texture {
    fn release(self) {
        tracing::trace!("destroying texture");
        self.destroy();
    }
}

/// GPU texture plus the lockable staging buffer that feeds it
pub struct StreamingTexture {
    texture: ResourceHandle<wgpu::Texture>,
    view: wgpu::TextureView,
    staging: Vec<u8>,
    stride: usize,
    geometry: FrameGeometry,
}

impl StreamingTexture {
    /// Create a texture of `format` and a zeroed staging buffer
    ///
    /// `pixel` is the converter's output format matching `format`.
    pub fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        pixel: Pixel,
        width: u32,
        height: u32,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Streaming Video Texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            // Same format as the surface so sampling and writing round-trip
            format,
            usage: wgpu::TextureUsages::COPY_DST | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let stride = aligned_stride(width);
        Self {
            texture: ResourceHandle::new(texture),
            view,
            staging: vec![0; stride * height as usize],
            stride,
            geometry: FrameGeometry::new(pixel, width, height),
        }
    }

    /// Expose the staging buffer for the next frame
    pub fn lock(&mut self) -> Result<ConvertedImage<'_>> {
        if self.texture.is_empty() {
            return Err(PlayerError::LockFailed("texture released".into()));
        }
        ConvertedImage::new(self.geometry, self.stride, &mut self.staging)
    }

    /// Copy the staging buffer into the GPU texture
    pub fn upload(&self, queue: &wgpu::Queue) -> Result<()> {
        let texture = self
            .texture
            .get()
            .ok_or(PlayerError::PresentFailed("texture released".into()))?;

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &self.staging,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(self.stride as u32),
                rows_per_image: Some(self.geometry.height),
            },
            wgpu::Extent3d {
                width: self.geometry.width,
                height: self.geometry.height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    /// Destroy the GPU texture ahead of drop
    pub fn release(&mut self) {
        self.texture.reset();
    }
}

/// Bytes per staging row for a 4-byte-per-pixel texture of `width`
pub fn aligned_stride(width: u32) -> usize {
    let row = width.max(1) as usize * BYTES_PER_PIXEL;
    row.div_ceil(COPY_ROW_ALIGNMENT) * COPY_ROW_ALIGNMENT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aligned_stride() {
        // 352 * 4 = 1408 -> next multiple of 256
        assert_eq!(aligned_stride(352), 1536);
        assert_eq!(aligned_stride(64), 256);
        assert_eq!(aligned_stride(1), 256);
        assert_eq!(aligned_stride(1920), 7680);
    }
}
