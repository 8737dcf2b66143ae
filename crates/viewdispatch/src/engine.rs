use crate::canvas::OverlayCanvas;
use crate::device::RenderDevice;

/// Index into the engine's frame ring read by the augmented-image view.
pub const AUGMENTED_FRAME_SLOT: usize = 2;

/// The upstream tracking engine, seen only through the artifacts it exposes.
///
/// Texture accessors may recompute lazily and are allowed to be expensive;
/// the dispatcher calls them before it touches any GPU binding. Handles are
/// only valid for the redraw cycle that fetched them.
pub trait EngineFacade<D: RenderDevice> {
    fn current_frame(&mut self, device: &mut D) -> D::Texture;
    fn frame_at(&mut self, device: &mut D, index: usize) -> D::Texture;
    fn tracker_depth_pass(&mut self, device: &mut D) -> D::Texture;
    fn tracker_initial_model(&mut self, device: &mut D) -> D::Texture;
    fn tracker_fitted_model(&mut self, device: &mut D) -> D::Texture;
    fn tracker_reference_colors(&mut self, device: &mut D) -> D::Texture;
    fn canny_edges(&mut self, device: &mut D) -> D::Texture;
    fn distance_transform(&mut self, device: &mut D) -> D::Texture;
    fn contour_view(&mut self, device: &mut D) -> D::Texture;

    /// Renders the shaded model into the bound target.
    fn draw_solid_model(&mut self, device: &mut D);
    fn draw_augmented_image(&mut self, device: &mut D);
    fn draw_contour_statistics(&mut self, canvas: &mut OverlayCanvas);
    fn draw_detection_map(&mut self, device: &mut D);
    fn draw_detected_pose(&mut self, device: &mut D);

    /// Non-blocking: true when the asynchronous pose detector has no pass in
    /// flight. Polled once per redraw, never cached across cycles.
    fn is_pose_detector_idle(&self) -> bool;
}

/// A texture artifact a view mode reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Artifact {
    CurrentFrame,
    FrameAt(usize),
    DepthPass,
    InitialModel,
    FittedModel,
    ReferenceColors,
    CannyEdges,
    DistanceTransform,
    ContourView,
}

impl Artifact {
    pub(crate) fn fetch<D, E>(self, engine: &mut E, device: &mut D) -> D::Texture
    where
        D: RenderDevice,
        E: EngineFacade<D> + ?Sized,
    {
        match self {
            Artifact::CurrentFrame => engine.current_frame(device),
            Artifact::FrameAt(index) => engine.frame_at(device, index),
            Artifact::DepthPass => engine.tracker_depth_pass(device),
            Artifact::InitialModel => engine.tracker_initial_model(device),
            Artifact::FittedModel => engine.tracker_fitted_model(device),
            Artifact::ReferenceColors => engine.tracker_reference_colors(device),
            Artifact::CannyEdges => engine.canny_edges(device),
            Artifact::DistanceTransform => engine.distance_transform(device),
            Artifact::ContourView => engine.contour_view(device),
        }
    }
}

/// An engine-side draw issued after a view's quad.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverlayPass {
    SolidModel,
    AugmentedImage,
    /// Cleared canvas, engine statistics drawn into it, canvas composited.
    ContourStatistics,
    DetectionMap,
    DetectedPose,
}
