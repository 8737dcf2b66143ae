use tracing::debug;

use crate::device::RenderDevice;
use crate::error::{LifecycleError, RenderError};
use crate::geometry::FrameGeometry;
use crate::programs::RenderProgramSet;
use crate::types::{ClearBuffers, FrameSize, RasterState, Viewport, CLEAR_COLOR};

/// Owns the device plus everything derived from it that must exist before a
/// draw: the linked programs and the frame-size dependent quad.
pub struct RenderSurface<D: RenderDevice> {
    device: D,
    programs: Option<RenderProgramSet<D>>,
    geometry: Option<FrameGeometry>,
    window: Viewport,
}

/// Disjoint borrows handed to the dispatcher for one cycle.
pub(crate) struct SurfaceParts<'a, D: RenderDevice> {
    pub device: &'a mut D,
    pub programs: &'a RenderProgramSet<D>,
    pub geometry: &'a FrameGeometry,
    pub window: Viewport,
}

impl<D: RenderDevice> RenderSurface<D> {
    pub fn new(device: D, window_size: FrameSize) -> Self {
        Self {
            device,
            programs: None,
            geometry: None,
            window: Viewport::covering(window_size),
        }
    }

    /// Links the programs. Must run once before the first draw.
    pub fn initialize(&mut self) -> Result<(), LifecycleError> {
        if self.programs.is_some() {
            return Err(LifecycleError::AlreadyInitialized);
        }
        let programs = RenderProgramSet::initialize(&mut self.device)?;
        debug!(programs = programs.len(), "surface initialized");
        self.programs = Some(programs);
        Ok(())
    }

    /// Rebuilds the quad for a new logical frame size.
    ///
    /// Needed on construction and after every frame-size change; a stale
    /// quad samples the frame with the previous size's texel range.
    pub fn reset(&mut self, frame_size: FrameSize) -> Result<(), LifecycleError> {
        if frame_size.is_empty() {
            return Err(LifecycleError::EmptyFrame(frame_size));
        }
        self.geometry = Some(FrameGeometry::new(frame_size));
        debug!(%frame_size, "frame geometry rebuilt");
        Ok(())
    }

    /// Updates the window rectangle and resizes the presentable target.
    pub fn set_window_size(&mut self, size: FrameSize) {
        self.window = Viewport::covering(size);
        if size.is_empty() {
            debug!(%size, "ignoring empty window size for target resize");
            return;
        }
        self.device.resize_target(size);
    }

    /// Releases the programs and forgets the geometry.
    pub fn teardown(&mut self) {
        if let Some(programs) = self.programs.take() {
            programs.release(&mut self.device);
            debug!("surface programs released");
        }
        self.geometry = None;
    }

    pub fn is_ready(&self) -> bool {
        self.programs.is_some() && self.geometry.is_some()
    }

    pub fn geometry(&self) -> Option<&FrameGeometry> {
        self.geometry.as_ref()
    }

    pub fn programs(&self) -> Option<&RenderProgramSet<D>> {
        self.programs.as_ref()
    }

    pub fn window_viewport(&self) -> Viewport {
        self.window
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Blanks the whole window to black and presents.
    pub fn clear(&mut self) -> Result<(), RenderError> {
        self.device.bind_default_target();
        self.device.set_viewport(self.window);
        self.device.set_raster_state(RasterState::DISABLED);
        self.device.clear(ClearBuffers::ColorDepth, CLEAR_COLOR);
        self.device.present()
    }

    /// Copies the presented frame into `buffer` (BGRA, window-sized).
    pub fn read_pixels(&mut self, buffer: &mut [u8]) -> Result<(), RenderError> {
        let expected = self.window.size().rgba_len();
        if buffer.len() != expected {
            return Err(RenderError::BufferSize {
                expected,
                actual: buffer.len(),
            });
        }
        self.device.read_pixels(buffer)
    }

    pub(crate) fn parts_mut(&mut self) -> Result<SurfaceParts<'_, D>, RenderError> {
        let programs = self.programs.as_ref().ok_or(RenderError::NotInitialized)?;
        let geometry = self.geometry.as_ref().ok_or(RenderError::MissingGeometry)?;
        Ok(SurfaceParts {
            device: &mut self.device,
            programs,
            geometry,
            window: self.window,
        })
    }
}

impl<D: RenderDevice> Drop for RenderSurface<D> {
    fn drop(&mut self) {
        self.teardown();
    }
}
