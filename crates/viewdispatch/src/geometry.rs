use bytemuck::{Pod, Zeroable};

use crate::types::FrameSize;

/// Vertex of the full-frame quad: clip-space position plus a texel coordinate.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 2],
    pub texcoord: [f32; 2],
}

/// Full-viewport rectangle whose texture coordinates address the frame in
/// texels, so `texelFetch` in the programs maps one frame pixel per texel.
///
/// Texture coordinates are only valid for the frame size they were built
/// with; the surface rebuilds the geometry on every `reset`.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameGeometry {
    frame_size: FrameSize,
    vertices: [QuadVertex; 4],
}

impl FrameGeometry {
    /// Vertices per draw; the quad is a four-vertex triangle strip.
    pub const VERTEX_COUNT: u32 = 4;

    pub fn new(frame_size: FrameSize) -> Self {
        let w = frame_size.width as f32;
        let h = frame_size.height as f32;
        // Image row 0 sits at the top of the viewport.
        let vertices = [
            QuadVertex {
                position: [-1.0, 1.0],
                texcoord: [0.0, 0.0],
            },
            QuadVertex {
                position: [-1.0, -1.0],
                texcoord: [0.0, h],
            },
            QuadVertex {
                position: [1.0, 1.0],
                texcoord: [w, 0.0],
            },
            QuadVertex {
                position: [1.0, -1.0],
                texcoord: [w, h],
            },
        ];
        Self {
            frame_size,
            vertices,
        }
    }

    pub fn frame_size(&self) -> FrameSize {
        self.frame_size
    }

    pub fn vertices(&self) -> &[QuadVertex; 4] {
        &self.vertices
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }
}
