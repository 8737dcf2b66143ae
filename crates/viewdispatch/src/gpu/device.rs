use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use bytemuck::{Pod, Zeroable};
use image::RgbaImage;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{debug, trace, warn};
use wgpu::util::{DeviceExt, TextureDataOrder};

use crate::canvas::OverlayCanvas;
use crate::device::RenderDevice;
use crate::error::{ProgramError, RenderError};
use crate::geometry::FrameGeometry;
use crate::programs::{ProgramSource, UniformKind};
use crate::types::{
    ClearBuffers, FrameSize, RasterState, TextureUnit, UniformLocation, Viewport,
    TEXTURE_UNIT_COUNT,
};

use super::context::{GpuContext, GpuOptions};
use super::pipeline::{self, PipelineLayouts, WgpuProgram};
use super::target::OffscreenTarget;

/// Mirrors the `ViewParams` std140 block.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
struct ViewParams {
    values: [f32; 4],
}

/// Image an engine uploaded under a key, kept until the key is re-uploaded
/// with a different size.
struct CachedImage {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    size: FrameSize,
}

/// [`RenderDevice`] on top of wgpu.
///
/// Every clear and draw is encoded as its own render pass into an offscreen
/// BGRA target; `present` submits them and blits the target into the
/// swapchain. Uniform values reach each pass through a staging copy recorded
/// on the encoder, so passes within one frame never see each other's values.
pub struct WgpuDevice {
    context: GpuContext,
    layouts: PipelineLayouts,
    canvas_pipeline: wgpu::RenderPipeline,
    blit_pipeline: wgpu::RenderPipeline,
    sampler: wgpu::Sampler,
    placeholder: wgpu::TextureView,
    params: ViewParams,
    params_buffer: wgpu::Buffer,
    params_bind_group: wgpu::BindGroup,
    target: OffscreenTarget,
    blit_bind_group: wgpu::BindGroup,
    encoder: Option<wgpu::CommandEncoder>,
    viewport: Viewport,
    raster_state: RasterState,
    program: Option<Arc<WgpuProgram>>,
    units: [Option<wgpu::TextureView>; TEXTURE_UNIT_COUNT],
    /// Texture unit each shader image slot reads from.
    slot_units: [TextureUnit; TEXTURE_UNIT_COUNT],
    quad: Option<(FrameGeometry, wgpu::Buffer)>,
    images: HashMap<String, CachedImage>,
}

impl WgpuDevice {
    pub fn new<T>(window: &T, size: FrameSize, options: GpuOptions) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let context = GpuContext::new(window, size, options)?;
        let device = &context.device;

        let layouts = PipelineLayouts::new(device)?;
        let canvas_pipeline = pipeline::canvas_pipeline(device, &layouts)
            .map_err(|message| anyhow!("failed to build canvas pipeline: {message}"))?;
        let blit_pipeline = pipeline::blit_pipeline(device, &layouts, context.surface_format())
            .map_err(|message| anyhow!("failed to build blit pipeline: {message}"))?;

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("view sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let placeholder = device
            .create_texture_with_data(
                &context.queue,
                &image_descriptor("placeholder image", FrameSize::new(1, 1)),
                TextureDataOrder::LayerMajor,
                &[0, 0, 0, 255],
            )
            .create_view(&wgpu::TextureViewDescriptor::default());

        let params = ViewParams::default();
        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("view params"),
            contents: bytemuck::bytes_of(&params),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let params_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("view params bind group"),
            layout: &layouts.params_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: params_buffer.as_entire_binding(),
            }],
        });

        let target = OffscreenTarget::new(device, context.size);
        let blit_bind_group = single_image_bind_group(
            device,
            &layouts,
            &target.color_view,
            &sampler,
            "blit bind group",
        );
        let viewport = Viewport::covering(context.size);

        debug!(size = %context.size, format = ?context.surface_format(), "wgpu device ready");

        Ok(Self {
            context,
            layouts,
            canvas_pipeline,
            blit_pipeline,
            sampler,
            placeholder,
            params,
            params_buffer,
            params_bind_group,
            target,
            blit_bind_group,
            encoder: None,
            viewport,
            raster_state: RasterState::DISABLED,
            program: None,
            units: [None, None],
            slot_units: [TextureUnit(0), TextureUnit(1)],
            quad: None,
            images: HashMap::new(),
        })
    }

    /// Uploads `image` under `key` and returns a view of it.
    ///
    /// The texture is reused while the size stays the same, so engines can
    /// re-upload a changing artifact every frame.
    pub fn upload_image(&mut self, key: &str, image: &RgbaImage) -> wgpu::TextureView {
        let size = FrameSize::new(image.width(), image.height());
        if let Some(cached) = self.images.get(key) {
            if cached.size == size {
                self.context.queue.write_texture(
                    wgpu::TexelCopyTextureInfo {
                        texture: &cached.texture,
                        mip_level: 0,
                        origin: wgpu::Origin3d::ZERO,
                        aspect: wgpu::TextureAspect::All,
                    },
                    image.as_raw(),
                    wgpu::TexelCopyBufferLayout {
                        offset: 0,
                        bytes_per_row: Some(size.width * 4),
                        rows_per_image: Some(size.height),
                    },
                    wgpu::Extent3d {
                        width: size.width,
                        height: size.height,
                        depth_or_array_layers: 1,
                    },
                );
                return cached.view.clone();
            }
        }

        trace!(key, %size, "creating image texture");
        let texture = self.context.device.create_texture_with_data(
            &self.context.queue,
            &image_descriptor(key, size),
            TextureDataOrder::LayerMajor,
            image.as_raw(),
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.images.insert(
            key.to_string(),
            CachedImage {
                texture,
                view: view.clone(),
                size,
            },
        );
        view
    }

    /// Swapchain recovery after `Lost`/`Outdated`.
    pub fn reconfigure_surface(&mut self) {
        self.context.reconfigure();
    }

    fn encoder(&mut self) -> &mut wgpu::CommandEncoder {
        let device = &self.context.device;
        self.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("view encoder"),
            })
        })
    }

    fn quad_buffer(&mut self, geometry: &FrameGeometry) -> wgpu::Buffer {
        if let Some((cached, buffer)) = &self.quad {
            if cached == geometry {
                return buffer.clone();
            }
        }
        let buffer = self
            .context
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("frame quad"),
                contents: geometry.as_bytes(),
                usage: wgpu::BufferUsages::VERTEX,
            });
        self.quad = Some((geometry.clone(), buffer.clone()));
        buffer
    }

    /// Viewport clamped to the target; `None` when nothing would be visible.
    fn clamped_viewport(&self) -> Option<(f32, f32, f32, f32)> {
        let size = self.target.size;
        let x = self.viewport.x.min(size.width);
        let y = self.viewport.y.min(size.height);
        let width = self.viewport.width.min(size.width - x);
        let height = self.viewport.height.min(size.height - y);
        (width > 0 && height > 0).then_some((x as f32, y as f32, width as f32, height as f32))
    }

    fn images_bind_group(&self) -> wgpu::BindGroup {
        let views: Vec<&wgpu::TextureView> = self
            .slot_units
            .iter()
            .map(|unit| {
                self.units
                    .get(unit.0 as usize)
                    .and_then(Option::as_ref)
                    .unwrap_or(&self.placeholder)
            })
            .collect();
        let mut entries = Vec::with_capacity(views.len() * 2);
        for (slot, view) in views.iter().enumerate() {
            entries.push(wgpu::BindGroupEntry {
                binding: slot as u32 * 2,
                resource: wgpu::BindingResource::TextureView(view),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: slot as u32 * 2 + 1,
                resource: wgpu::BindingResource::Sampler(&self.sampler),
            });
        }
        self.context
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("view images bind group"),
                layout: &self.layouts.images_layout,
                entries: &entries,
            })
    }

    /// Records one pass that loads the current target contents and draws the
    /// quad with `pipeline` and `bind_groups`.
    fn encode_quad_pass(
        &mut self,
        label: &str,
        pipeline: &wgpu::RenderPipeline,
        bind_groups: &[&wgpu::BindGroup],
        quad: &wgpu::Buffer,
    ) {
        let Some((x, y, width, height)) = self.clamped_viewport() else {
            trace!(viewport = ?self.viewport, "empty viewport; skipping draw");
            return;
        };
        let color_view = self.target.color_view.clone();
        let depth_view = self.target.depth_view.clone();
        let encoder = self.encoder();
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &color_view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        pass.set_viewport(x, y, width, height, 0.0, 1.0);
        pass.set_pipeline(pipeline);
        for (index, group) in bind_groups.iter().enumerate() {
            pass.set_bind_group(index as u32, *group, &[]);
        }
        pass.set_vertex_buffer(0, quad.slice(..));
        pass.draw(0..FrameGeometry::VERTEX_COUNT, 0..1);
    }

    fn bound_uniform(&self, location: UniformLocation) -> Option<UniformKind> {
        let program = self.program.as_ref()?;
        let index = location.index()?;
        program.uniforms.get(index).map(|decl| decl.kind)
    }
}

impl RenderDevice for WgpuDevice {
    type Texture = wgpu::TextureView;
    type Program = Arc<WgpuProgram>;

    fn link_program(&mut self, source: &ProgramSource) -> Result<Self::Program, ProgramError> {
        pipeline::link_program(&self.context.device, &self.layouts, source).map(Arc::new)
    }

    fn uniform_location(&self, program: &Self::Program, name: &str) -> UniformLocation {
        program
            .uniforms
            .iter()
            .position(|decl| decl.name == name)
            .and_then(|index| i32::try_from(index).ok())
            .map(UniformLocation)
            .unwrap_or(UniformLocation::UNRESOLVED)
    }

    fn release_program(&mut self, program: Self::Program) {
        if self
            .program
            .as_ref()
            .is_some_and(|bound| Arc::ptr_eq(bound, &program))
        {
            self.program = None;
        }
        trace!(program = %program.kind, "released program");
    }

    fn bind_default_target(&mut self) {
        self.encoder();
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    fn clear(&mut self, buffers: ClearBuffers, color: [f32; 4]) {
        let [r, g, b, a] = color.map(f64::from);
        let color_view = self.target.color_view.clone();
        let depth_view = self.target.depth_view.clone();
        let depth_load = if buffers.includes_depth() {
            wgpu::LoadOp::Clear(1.0)
        } else {
            wgpu::LoadOp::Load
        };
        let encoder = self.encoder();
        // The pass does nothing beyond its load ops.
        let _clear_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("clear pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &color_view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: depth_load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });
    }

    fn set_raster_state(&mut self, state: RasterState) {
        if state != RasterState::DISABLED && state != self.raster_state {
            warn!(
                ?state,
                "view pipelines are built with culling, depth test and blending off; ignoring"
            );
        }
        self.raster_state = state;
    }

    fn use_program(&mut self, program: &Self::Program) {
        self.program = Some(Arc::clone(program));
    }

    fn set_sampler_uniform(&mut self, location: UniformLocation, unit: TextureUnit) {
        if let Some(UniformKind::Sampler { slot }) = self.bound_uniform(location) {
            if let Some(route) = self.slot_units.get_mut(slot as usize) {
                *route = unit;
            }
        }
    }

    fn set_float_uniform(&mut self, location: UniformLocation, value: f32) {
        if let Some(UniformKind::Float { index }) = self.bound_uniform(location) {
            if let Some(slot) = self.params.values.get_mut(index as usize) {
                *slot = value;
            }
        }
    }

    fn bind_texture(&mut self, unit: TextureUnit, texture: &Self::Texture) {
        match self.units.get_mut(unit.0 as usize) {
            Some(slot) => *slot = Some(texture.clone()),
            None => warn!(unit = unit.0, "texture unit out of range; ignoring bind"),
        }
    }

    fn draw_quad(&mut self, geometry: &FrameGeometry) {
        let Some(program) = self.program.clone() else {
            warn!("draw requested without a bound program");
            return;
        };
        let quad = self.quad_buffer(geometry);
        let images = self.images_bind_group();

        let staging = self
            .context
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("view params staging"),
                contents: bytemuck::bytes_of(&self.params),
                usage: wgpu::BufferUsages::COPY_SRC,
            });
        let params_buffer = self.params_buffer.clone();
        self.encoder().copy_buffer_to_buffer(
            &staging,
            0,
            &params_buffer,
            0,
            std::mem::size_of::<ViewParams>() as u64,
        );

        let params_bind_group = self.params_bind_group.clone();
        self.encode_quad_pass(
            "view pass",
            &program.pipeline,
            &[&params_bind_group, &images],
            &quad,
        );
    }

    fn draw_canvas(&mut self, canvas: &OverlayCanvas, geometry: &FrameGeometry) {
        let size = canvas.size();
        if size.is_empty() {
            return;
        }
        // A fresh texture per draw keeps several canvases within one frame
        // from overwriting each other before submission.
        let texture = self.context.device.create_texture_with_data(
            &self.context.queue,
            &image_descriptor("overlay canvas", size),
            TextureDataOrder::LayerMajor,
            canvas.as_raw(),
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = single_image_bind_group(
            &self.context.device,
            &self.layouts,
            &view,
            &self.sampler,
            "canvas bind group",
        );
        let quad = self.quad_buffer(geometry);
        let pipeline = self.canvas_pipeline.clone();
        self.encode_quad_pass("canvas pass", &pipeline, &[&bind_group], &quad);
    }

    fn present(&mut self) -> Result<(), RenderError> {
        if let Some(encoder) = self.encoder.take() {
            self.context.queue.submit(std::iter::once(encoder.finish()));
        }

        let frame = self.context.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("present encoder"),
                });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("blit pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.blit_pipeline);
            pass.set_bind_group(0, &self.blit_bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
        self.context.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }

    fn read_pixels(&mut self, buffer: &mut [u8]) -> Result<(), RenderError> {
        if let Some(encoder) = self.encoder.take() {
            self.context.queue.submit(std::iter::once(encoder.finish()));
        }
        self.target
            .read_into(&self.context.device, &self.context.queue, buffer)
    }

    fn resize_target(&mut self, size: FrameSize) {
        if size.is_empty() || size == self.target.size {
            return;
        }
        if let Some(encoder) = self.encoder.take() {
            self.context.queue.submit(std::iter::once(encoder.finish()));
        }
        self.context.resize(size);
        self.target = OffscreenTarget::new(&self.context.device, size);
        self.blit_bind_group = single_image_bind_group(
            &self.context.device,
            &self.layouts,
            &self.target.color_view,
            &self.sampler,
            "blit bind group",
        );
        debug!(%size, "render target resized");
    }
}

fn image_descriptor(label: &str, size: FrameSize) -> wgpu::TextureDescriptor<'_> {
    wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: size.width,
            height: size.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    }
}

fn single_image_bind_group(
    device: &wgpu::Device,
    layouts: &PipelineLayouts,
    view: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
    label: &str,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout: &layouts.single_image_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}
