use std::borrow::Cow;

use wgpu::naga::ShaderStage;

/// Compiles GLSL through naga inside a validation error scope so a bad
/// shader comes back as a message instead of an uncaptured device error.
pub(crate) fn compile_glsl(
    device: &wgpu::Device,
    label: &str,
    source: Cow<'_, str>,
    stage: ShaderStage,
) -> Result<wgpu::ShaderModule, String> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Glsl {
            shader: source,
            stage,
            defines: &[],
        },
    });
    match pollster::block_on(device.pop_error_scope()) {
        Some(error) => Err(error.to_string()),
        None => Ok(module),
    }
}

pub(crate) fn stage_name(stage: ShaderStage) -> &'static str {
    match stage {
        ShaderStage::Vertex => "vertex",
        ShaderStage::Fragment => "fragment",
        _ => "compute",
    }
}
