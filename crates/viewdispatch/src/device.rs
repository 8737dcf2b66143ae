use crate::canvas::OverlayCanvas;
use crate::error::{ProgramError, RenderError};
use crate::geometry::FrameGeometry;
use crate::programs::ProgramSource;
use crate::types::{ClearBuffers, FrameSize, RasterState, TextureUnit, UniformLocation, Viewport};

/// The GPU operations the dispatcher and the surface lifecycle issue.
///
/// Implementations are driven from the single thread that owns the
/// rendering context. Binding calls are stateful, GL style: a program,
/// texture units, and uniform values stay bound until replaced, and a draw
/// uses whatever is bound at that moment.
pub trait RenderDevice {
    /// Handle to a GPU-resident image produced by the engine.
    type Texture: Clone;
    /// Linked program.
    type Program;

    /// Compiles and links one program.
    fn link_program(&mut self, source: &ProgramSource) -> Result<Self::Program, ProgramError>;

    /// Resolves `name` on a linked program; [`UniformLocation::UNRESOLVED`]
    /// when the program does not expose it.
    fn uniform_location(&self, program: &Self::Program, name: &str) -> UniformLocation;

    fn release_program(&mut self, program: Self::Program);

    /// Directs subsequent clears and draws at the presentable target.
    fn bind_default_target(&mut self);

    fn set_viewport(&mut self, viewport: Viewport);

    fn clear(&mut self, buffers: ClearBuffers, color: [f32; 4]);

    fn set_raster_state(&mut self, state: RasterState);

    fn use_program(&mut self, program: &Self::Program);

    /// Points a sampler uniform of the bound program at a texture unit.
    /// A no-op for unresolved locations.
    fn set_sampler_uniform(&mut self, location: UniformLocation, unit: TextureUnit);

    /// A no-op for unresolved locations.
    fn set_float_uniform(&mut self, location: UniformLocation, value: f32);

    fn bind_texture(&mut self, unit: TextureUnit, texture: &Self::Texture);

    /// Draws the full-frame quad with the bound program and textures.
    fn draw_quad(&mut self, geometry: &FrameGeometry);

    /// Alpha-composites a 2-D canvas over the target.
    fn draw_canvas(&mut self, canvas: &OverlayCanvas, geometry: &FrameGeometry);

    /// Makes the target visible.
    fn present(&mut self) -> Result<(), RenderError>;

    /// Copies the last presented target into `buffer` as BGRA bytes.
    fn read_pixels(&mut self, buffer: &mut [u8]) -> Result<(), RenderError>;

    /// Adapts the presentable target to a new window size.
    fn resize_target(&mut self, size: FrameSize);
}
