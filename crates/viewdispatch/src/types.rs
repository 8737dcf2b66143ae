use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use winit::dpi::PhysicalSize;

/// Logical size of a tracked frame or of the window, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Number of bytes a tightly packed 4-channel image of this size occupies.
    pub fn rgba_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

impl fmt::Display for FrameSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for FrameSize {
    type Err = String;

    /// Parses `WIDTHxHEIGHT`, e.g. `768x576`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let (width, height) = trimmed
            .split_once(['x', 'X', '×'])
            .ok_or_else(|| format!("expected WxH format, e.g. 768x576 (got '{trimmed}')"))?;

        let width: u32 = width
            .trim()
            .parse()
            .map_err(|_| format!("invalid width in size '{trimmed}'"))?;
        let height: u32 = height
            .trim()
            .parse()
            .map_err(|_| format!("invalid height in size '{trimmed}'"))?;

        if width == 0 || height == 0 {
            return Err("frame dimensions must be greater than zero".to_string());
        }

        Ok(Self { width, height })
    }
}

impl From<PhysicalSize<u32>> for FrameSize {
    fn from(size: PhysicalSize<u32>) -> Self {
        Self::new(size.width, size.height)
    }
}

impl From<FrameSize> for PhysicalSize<u32> {
    fn from(size: FrameSize) -> Self {
        PhysicalSize::new(size.width, size.height)
    }
}

/// Window-space rectangle the device rasterizes into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn covering(size: FrameSize) -> Self {
        Self {
            x: 0,
            y: 0,
            width: size.width,
            height: size.height,
        }
    }

    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.width, self.height)
    }
}

/// A texture unit index shared by every program's sampler uniforms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureUnit(pub u32);

/// Unit carrying the primary image of a view (camera frame, depth pass, ...).
pub const SOURCE_UNIT: TextureUnit = TextureUnit(0);
/// Unit carrying the image blended on top of the source by the canvas program.
pub const OVERLAY_UNIT: TextureUnit = TextureUnit(1);
/// Number of texture units the programs sample from.
pub const TEXTURE_UNIT_COUNT: usize = 2;

/// Opaque location handle of a uniform inside a linked program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub i32);

impl UniformLocation {
    /// Sentinel handed out for names the linked program does not expose.
    pub const UNRESOLVED: UniformLocation = UniformLocation(-1);

    pub fn is_resolved(&self) -> bool {
        self.0 >= 0
    }

    pub(crate) fn index(&self) -> Option<usize> {
        usize::try_from(self.0).ok()
    }
}

/// Buffers touched by a clear.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClearBuffers {
    Color,
    ColorDepth,
}

impl ClearBuffers {
    pub fn includes_depth(self) -> bool {
        matches!(self, ClearBuffers::ColorDepth)
    }
}

/// Fixed-function state the dispatcher resets at the start of every cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RasterState {
    pub culling: bool,
    pub depth_test: bool,
    pub blending: bool,
}

impl RasterState {
    pub const DISABLED: RasterState = RasterState {
        culling: false,
        depth_test: false,
        blending: false,
    };
}

/// Adapter preference when several GPUs are available.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GpuPower {
    Low,
    #[default]
    High,
}

impl FromStr for GpuPower {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" | "low-power" => Ok(GpuPower::Low),
            "high" | "high-performance" => Ok(GpuPower::High),
            other => Err(format!("unknown GPU power preference '{other}' (expected low or high)")),
        }
    }
}

/// Opaque black, the clear color for every cycle.
pub const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];
