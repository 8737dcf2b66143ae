use std::borrow::Cow;

use wgpu::naga::ShaderStage;

use crate::compile::{compile_glsl, stage_name};
use crate::error::ProgramError;
use crate::geometry::QuadVertex;
use crate::programs::{ProgramKind, ProgramSource, UniformDecl};
use crate::shaders;

/// Color format of the offscreen target every view pass draws into.
pub(crate) const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Bgra8Unorm;
pub(crate) const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Bind group layouts shared by every view program.
pub(crate) struct PipelineLayouts {
    /// Set 0: the `ViewParams` block.
    pub params_layout: wgpu::BindGroupLayout,
    /// Set 1: source and overlay texture/sampler pairs.
    pub images_layout: wgpu::BindGroupLayout,
    /// Set 0 of the canvas and blit pipelines: one texture/sampler pair.
    pub single_image_layout: wgpu::BindGroupLayout,
    pub program_layout: wgpu::PipelineLayout,
    pub vertex_module: wgpu::ShaderModule,
}

impl PipelineLayouts {
    pub fn new(device: &wgpu::Device) -> Result<Self, ProgramError> {
        let params_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("view params layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let images_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("view images layout"),
            entries: &image_layout_entries(2),
        });
        let single_image_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("single image layout"),
                entries: &image_layout_entries(1),
            });
        let program_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("view program layout"),
            bind_group_layouts: &[&params_layout, &images_layout],
            push_constant_ranges: &[],
        });

        // Every view program shares the quad vertex stage; a failure here is
        // reported against the first program that needs it.
        let vertex_module = compile_glsl(
            device,
            "quad vertex",
            Cow::Borrowed(shaders::QUAD_VERTEX),
            ShaderStage::Vertex,
        )
        .map_err(|message| ProgramError::Compile {
            program: ProgramKind::PlainImage,
            stage: stage_name(ShaderStage::Vertex),
            message,
        })?;

        Ok(Self {
            params_layout,
            images_layout,
            single_image_layout,
            program_layout,
            vertex_module,
        })
    }
}

/// A linked view program.
#[derive(Debug)]
pub struct WgpuProgram {
    pub(crate) kind: ProgramKind,
    pub(crate) pipeline: wgpu::RenderPipeline,
    pub(crate) uniforms: &'static [UniformDecl],
}

impl WgpuProgram {
    pub fn kind(&self) -> ProgramKind {
        self.kind
    }
}

pub(crate) fn link_program(
    device: &wgpu::Device,
    layouts: &PipelineLayouts,
    source: &ProgramSource,
) -> Result<WgpuProgram, ProgramError> {
    let label = format!("{} fragment", source.kind);
    let fragment_module = compile_glsl(
        device,
        &label,
        Cow::Borrowed(source.fragment.as_str()),
        ShaderStage::Fragment,
    )
    .map_err(|message| ProgramError::Compile {
        program: source.kind,
        stage: stage_name(ShaderStage::Fragment),
        message,
    })?;

    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let pipeline = create_quad_pipeline(
        device,
        &format!("{} pipeline", source.kind),
        &layouts.program_layout,
        &layouts.vertex_module,
        &fragment_module,
        None,
    );
    if let Some(error) = pollster::block_on(device.pop_error_scope()) {
        return Err(ProgramError::Link {
            program: source.kind,
            message: error.to_string(),
        });
    }

    Ok(WgpuProgram {
        kind: source.kind,
        pipeline,
        uniforms: source.uniforms,
    })
}

/// Alpha-blending pipeline that composites an `OverlayCanvas`.
pub(crate) fn canvas_pipeline(
    device: &wgpu::Device,
    layouts: &PipelineLayouts,
) -> Result<wgpu::RenderPipeline, String> {
    let fragment_module = compile_glsl(
        device,
        "canvas fragment",
        Cow::Borrowed(shaders::CANVAS_FRAGMENT),
        ShaderStage::Fragment,
    )?;
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("canvas pipeline layout"),
        bind_group_layouts: &[&layouts.single_image_layout],
        push_constant_ranges: &[],
    });
    Ok(create_quad_pipeline(
        device,
        "canvas pipeline",
        &layout,
        &layouts.vertex_module,
        &fragment_module,
        Some(wgpu::BlendState::ALPHA_BLENDING),
    ))
}

/// Full-screen triangle copying the offscreen target into the swapchain.
pub(crate) fn blit_pipeline(
    device: &wgpu::Device,
    layouts: &PipelineLayouts,
    surface_format: wgpu::TextureFormat,
) -> Result<wgpu::RenderPipeline, String> {
    let vertex_module = compile_glsl(
        device,
        "blit vertex",
        Cow::Borrowed(shaders::BLIT_VERTEX),
        ShaderStage::Vertex,
    )?;
    let fragment_module = compile_glsl(
        device,
        "blit fragment",
        Cow::Borrowed(shaders::BLIT_FRAGMENT),
        ShaderStage::Fragment,
    )?;
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("blit pipeline layout"),
        bind_group_layouts: &[&layouts.single_image_layout],
        push_constant_ranges: &[],
    });

    Ok(device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("blit pipeline"),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &vertex_module,
            entry_point: Some("main"),
            buffers: &[],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: &fragment_module,
            entry_point: Some("main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: surface_format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview: None,
        cache: None,
    }))
}

/// Triangle-strip pipeline over [`QuadVertex`] drawing into the offscreen
/// target. Culling and blending stay off unless `blend` is given; depth is
/// attached but never tested or written.
fn create_quad_pipeline(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::PipelineLayout,
    vertex_module: &wgpu::ShaderModule,
    fragment_module: &wgpu::ShaderModule,
    blend: Option<wgpu::BlendState>,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: vertex_module,
            entry_point: Some("main"),
            buffers: &[quad_vertex_layout()],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleStrip,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: false,
            depth_compare: wgpu::CompareFunction::Always,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: fragment_module,
            entry_point: Some("main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: TARGET_FORMAT,
                blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview: None,
        cache: None,
    })
}

const QUAD_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2];

fn quad_vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &QUAD_ATTRIBUTES,
    }
}

/// `count` texture/sampler pairs at bindings `2n` and `2n + 1`.
fn image_layout_entries(count: u32) -> Vec<wgpu::BindGroupLayoutEntry> {
    let mut entries = Vec::with_capacity(count as usize * 2);
    for index in 0..count {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: index * 2,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: index * 2 + 1,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        });
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_entries_pair_textures_with_samplers() {
        let entries = image_layout_entries(2);
        let bindings: Vec<u32> = entries.iter().map(|entry| entry.binding).collect();
        assert_eq!(bindings, vec![0, 1, 2, 3]);
        assert!(matches!(entries[2].ty, wgpu::BindingType::Texture { .. }));
        assert!(matches!(entries[3].ty, wgpu::BindingType::Sampler(_)));
    }

    #[test]
    fn quad_layout_matches_vertex_struct() {
        let layout = quad_vertex_layout();
        assert_eq!(layout.array_stride, 16);
        assert_eq!(layout.attributes[1].offset, 8);
        assert_eq!(layout.attributes[1].shader_location, 1);
    }
}
