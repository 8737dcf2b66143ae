use crate::error::RenderError;
use crate::types::FrameSize;

use super::pipeline::{DEPTH_FORMAT, TARGET_FORMAT};

const BYTES_PER_PIXEL: u32 = 4;

/// Window-sized color and depth attachments the view passes render into.
pub(crate) struct OffscreenTarget {
    pub size: FrameSize,
    pub color: wgpu::Texture,
    pub color_view: wgpu::TextureView,
    pub depth_view: wgpu::TextureView,
}

impl OffscreenTarget {
    pub fn new(device: &wgpu::Device, size: FrameSize) -> Self {
        let extent = wgpu::Extent3d {
            width: size.width.max(1),
            height: size.height.max(1),
            depth_or_array_layers: 1,
        };
        let color = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("offscreen color target"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let depth = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("offscreen depth target"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());
        let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            size: FrameSize::new(extent.width, extent.height),
            color,
            color_view,
            depth_view,
        }
    }

    /// Copies the color target into `buffer` as tightly packed BGRA rows.
    pub fn read_into(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        buffer: &mut [u8],
    ) -> Result<(), RenderError> {
        let expected = self.size.rgba_len();
        if buffer.len() != expected {
            return Err(RenderError::BufferSize {
                expected,
                actual: buffer.len(),
            });
        }

        let layout = RowLayout::new(self.size.width);
        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("target readback"),
            size: layout.padded as u64 * self.size.height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("readback encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.color,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(layout.padded),
                    rows_per_image: Some(self.size.height),
                },
            },
            wgpu::Extent3d {
                width: self.size.width,
                height: self.size.height,
                depth_or_array_layers: 1,
            },
        );
        queue.submit(std::iter::once(encoder.finish()));

        let slice = readback.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            // The receiver below outlives the poll, so the send cannot fail.
            sender.send(result).ok();
        });
        device
            .poll(wgpu::PollType::Wait)
            .map_err(|err| RenderError::Readback(err.to_string()))?;
        receiver
            .recv()
            .map_err(|err| RenderError::Readback(err.to_string()))?
            .map_err(|err| RenderError::Readback(err.to_string()))?;

        {
            let data = slice.get_mapped_range();
            layout.unpad(&data, buffer);
        }
        readback.unmap();
        Ok(())
    }
}

/// Row pitch of a texture-to-buffer copy, padded to wgpu's alignment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct RowLayout {
    unpadded: u32,
    padded: u32,
}

impl RowLayout {
    fn new(width: u32) -> Self {
        let unpadded = width * BYTES_PER_PIXEL;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded = unpadded.div_ceil(align) * align;
        Self { unpadded, padded }
    }

    fn unpad(&self, padded: &[u8], out: &mut [u8]) {
        let row = self.unpadded as usize;
        for (dst, src) in out
            .chunks_exact_mut(row)
            .zip(padded.chunks(self.padded as usize))
        {
            dst.copy_from_slice(&src[..row]);
        }
    }
}
