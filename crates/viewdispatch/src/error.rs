use crate::programs::ProgramKind;
use crate::types::FrameSize;

/// A program failed to build during one-time surface initialization.
#[derive(Debug, thiserror::Error)]
pub enum ProgramError {
    #[error("failed to compile {stage} stage of the {program} program: {message}")]
    Compile {
        program: ProgramKind,
        stage: &'static str,
        message: String,
    },
    #[error("failed to link the {program} program: {message}")]
    Link {
        program: ProgramKind,
        message: String,
    },
}

/// Failures of the surface lifecycle operations (`initialize`, `reset`).
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("surface programs are already initialized; tear down first")]
    AlreadyInitialized,
    #[error("frame size {0} must be non-zero in both dimensions")]
    EmptyFrame(FrameSize),
    #[error(transparent)]
    Program(#[from] ProgramError),
}

/// Failures of a redraw, clear, or read-back.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("surface has no programs; call initialize() first")]
    NotInitialized,
    #[error("surface has no frame geometry; call reset() with the frame size first")]
    MissingGeometry,
    #[error("swapchain error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
    #[error("pixel buffer holds {actual} bytes but the target needs {expected}")]
    BufferSize { expected: usize, actual: usize },
    #[error("pixel read-back failed: {0}")]
    Readback(String),
}

impl RenderError {
    pub fn as_surface_error(&self) -> Option<&wgpu::SurfaceError> {
        match self {
            RenderError::Surface(err) => Some(err),
            _ => None,
        }
    }
}
