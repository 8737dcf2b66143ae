//! View-mode rendering dispatcher for a model-based tracking pipeline.
//!
//! The tracking engine produces a handful of GPU artifacts every frame (the
//! camera image, depth and model renders, edge and distance maps, contour
//! views) plus a few overlay draws it performs itself. This crate picks the
//! ones the active [`ViewMode`] needs and composes them into the window:
//!
//! ```text
//!   app ── set_mode / reset / set_window_size ──▶ ViewDispatcher
//!                                                   │ redraw()
//!        ┌──────────────── prefetch ◀───────────────┤
//!        ▼                                          │
//!   EngineFacade ── textures ──▶ RenderDevice ◀─────┘ bind, clear, draw, present
//! ```
//!
//! [`RenderDevice`] is the GPU seam. [`WgpuDevice`] implements it on `wgpu`;
//! tests drive the dispatcher through an in-memory recording device.

mod canvas;
mod compile;
mod device;
mod dispatch;
mod engine;
mod error;
mod geometry;
mod gpu;
mod programs;
mod shaders;
mod surface;
mod types;
mod view_mode;

#[cfg(test)]
mod recording;

pub use canvas::OverlayCanvas;
pub use device::RenderDevice;
pub use dispatch::{ModeRecipe, ViewDispatcher};
pub use engine::{Artifact, EngineFacade, OverlayPass, AUGMENTED_FRAME_SLOT};
pub use error::{LifecycleError, ProgramError, RenderError};
pub use geometry::{FrameGeometry, QuadVertex};
pub use gpu::{GpuOptions, WgpuDevice, WgpuProgram};
pub use programs::{
    ProgramKind, ProgramSource, RenderProgram, RenderProgramSet, UniformDecl, UniformKind,
    BLEND_FACTOR, OVERLAY_IMAGE, SOURCE_IMAGE,
};
pub use surface::RenderSurface;
pub use types::{
    ClearBuffers, FrameSize, GpuPower, RasterState, TextureUnit, UniformLocation, Viewport,
    CLEAR_COLOR, OVERLAY_UNIT, SOURCE_UNIT, TEXTURE_UNIT_COUNT,
};
pub use view_mode::{ModeError, ViewMode};
