//! wgpu implementation of [`RenderDevice`](crate::RenderDevice).
//!
//! - `context` owns instance/adapter/device/surface wiring and reconfigures
//!   the swapchain on resize.
//! - `pipeline` builds the shared bind group layouts and turns GLSL program
//!   sources into render pipelines, reporting naga and validation errors as
//!   `ProgramError`s.
//! - `target` holds the offscreen color/depth attachments and reads them
//!   back.
//! - `device` glues everything together behind the stateful binding API the
//!   dispatcher drives.

mod context;
mod device;
mod pipeline;
mod target;

pub use context::GpuOptions;
pub use device::WgpuDevice;
pub use pipeline::WgpuProgram;
