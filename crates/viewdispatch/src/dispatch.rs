//! Per-mode rendering recipes and the redraw state machine.

use tracing::{debug, trace};

use crate::canvas::OverlayCanvas;
use crate::device::RenderDevice;
use crate::engine::{Artifact, EngineFacade, OverlayPass, AUGMENTED_FRAME_SLOT};
use crate::error::{LifecycleError, RenderError};
use crate::geometry::FrameGeometry;
use crate::programs::{ProgramKind, RenderProgramSet, BLEND_FACTOR, OVERLAY_IMAGE, SOURCE_IMAGE};
use crate::surface::{RenderSurface, SurfaceParts};
use crate::types::{
    ClearBuffers, FrameSize, RasterState, CLEAR_COLOR, OVERLAY_UNIT, SOURCE_UNIT,
};
use crate::view_mode::ViewMode;

/// What one view mode draws, in dispatch order: the textured quad (when a
/// program is set) followed by the engine overlay passes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModeRecipe {
    pub program: Option<ProgramKind>,
    /// Artifact bound to [`SOURCE_UNIT`].
    pub source: Option<Artifact>,
    /// Artifact bound to [`OVERLAY_UNIT`].
    pub overlay: Option<Artifact>,
    pub blend_factor: Option<f32>,
    pub clears_depth: bool,
    /// Skip the whole mode while the pose detector has a pass in flight.
    pub requires_idle_detector: bool,
    pub overlays: &'static [OverlayPass],
}

impl ModeRecipe {
    const NOTHING: ModeRecipe = ModeRecipe {
        program: None,
        source: None,
        overlay: None,
        blend_factor: None,
        clears_depth: false,
        requires_idle_detector: false,
        overlays: &[],
    };

    const fn textured(program: ProgramKind, source: Artifact) -> ModeRecipe {
        ModeRecipe {
            program: Some(program),
            source: Some(source),
            ..Self::NOTHING
        }
    }

    const fn blended(overlay: Artifact, blend_factor: f32) -> ModeRecipe {
        ModeRecipe {
            program: Some(ProgramKind::CanvasOverlay),
            source: Some(Artifact::CurrentFrame),
            overlay: Some(overlay),
            blend_factor: Some(blend_factor),
            ..Self::NOTHING
        }
    }

    pub const fn for_mode(mode: ViewMode) -> ModeRecipe {
        match mode {
            ViewMode::Input => Self::textured(ProgramKind::PlainImage, Artifact::CurrentFrame),
            ViewMode::SolidModel => ModeRecipe {
                clears_depth: true,
                overlays: &[OverlayPass::SolidModel],
                ..Self::NOTHING
            },
            ViewMode::DepthPass => ModeRecipe {
                clears_depth: true,
                ..Self::textured(ProgramKind::DepthPass, Artifact::DepthPass)
            },
            ViewMode::InitialModel => Self::blended(Artifact::InitialModel, 0.6),
            ViewMode::FittedModel => Self::blended(Artifact::FittedModel, 0.75),
            ViewMode::ReferenceColors => Self::blended(Artifact::ReferenceColors, 0.6),
            // The overlay blend is intentionally absent: base frame plus the
            // engine's own augmentation draw.
            ViewMode::AugmentedImage => ModeRecipe {
                overlays: &[OverlayPass::AugmentedImage],
                ..Self::textured(
                    ProgramKind::PlainImage,
                    Artifact::FrameAt(AUGMENTED_FRAME_SLOT),
                )
            },
            ViewMode::CannyEdges => Self::textured(ProgramKind::PlainImage, Artifact::CannyEdges),
            ViewMode::DistanceTransform => {
                Self::textured(ProgramKind::DistanceTransform, Artifact::DistanceTransform)
            }
            ViewMode::Contours => ModeRecipe {
                requires_idle_detector: true,
                overlays: &[OverlayPass::ContourStatistics, OverlayPass::DetectionMap],
                ..Self::textured(ProgramKind::Contour, Artifact::ContourView)
            },
            ViewMode::DetectedPose => ModeRecipe {
                requires_idle_detector: true,
                overlays: &[OverlayPass::DetectionMap, OverlayPass::DetectedPose],
                ..Self::textured(ProgramKind::PlainImage, Artifact::CurrentFrame)
            },
            // Reserved; accepted but draws nothing.
            ViewMode::HarrisCorners => Self::NOTHING,
        }
    }

    fn clear_buffers(&self) -> ClearBuffers {
        if self.clears_depth {
            ClearBuffers::ColorDepth
        } else {
            ClearBuffers::Color
        }
    }
}

/// Textures fetched before the cycle touches any binding.
struct Prefetched<T> {
    source: Option<T>,
    overlay: Option<T>,
}

impl<T> Prefetched<T> {
    fn none() -> Self {
        Self {
            source: None,
            overlay: None,
        }
    }
}

/// Renders the active [`ViewMode`] from engine artifacts once per cycle.
pub struct ViewDispatcher<D: RenderDevice, E: EngineFacade<D>> {
    surface: RenderSurface<D>,
    engine: E,
    canvas: OverlayCanvas,
    mode: ViewMode,
}

impl<D: RenderDevice, E: EngineFacade<D>> ViewDispatcher<D, E> {
    /// Wraps `device` without linking anything; call [`initialize`] and
    /// [`reset`] before the first redraw.
    ///
    /// [`initialize`]: ViewDispatcher::initialize
    /// [`reset`]: ViewDispatcher::reset
    pub fn new(device: D, engine: E, window_size: FrameSize) -> Self {
        Self {
            surface: RenderSurface::new(device, window_size),
            engine,
            canvas: OverlayCanvas::new(FrameSize::new(0, 0)),
            mode: ViewMode::default(),
        }
    }

    /// Builds a dispatcher that is ready to draw `frame_size` frames.
    pub fn create(
        device: D,
        engine: E,
        frame_size: FrameSize,
        window_size: FrameSize,
    ) -> Result<Self, LifecycleError> {
        let mut dispatcher = Self::new(device, engine, window_size);
        dispatcher.initialize()?;
        dispatcher.reset(frame_size)?;
        Ok(dispatcher)
    }

    pub fn initialize(&mut self) -> Result<(), LifecycleError> {
        self.surface.initialize()
    }

    /// Rebuilds the frame quad and the overlay canvas for `frame_size`.
    pub fn reset(&mut self, frame_size: FrameSize) -> Result<(), LifecycleError> {
        self.surface.reset(frame_size)?;
        self.canvas.resize(frame_size);
        Ok(())
    }

    pub fn teardown(&mut self) {
        self.surface.teardown();
    }

    pub fn set_window_size(&mut self, size: FrameSize) {
        self.surface.set_window_size(size);
    }

    pub fn set_mode(&mut self, mode: ViewMode) {
        if mode != self.mode {
            debug!(from = %self.mode, to = %mode, "view mode changed");
        }
        self.mode = mode;
    }

    /// # Panics
    ///
    /// Panics when `ordinal` is not below [`ViewMode::COUNT`].
    pub fn set_mode_ordinal(&mut self, ordinal: usize) {
        self.set_mode(ViewMode::option_at(ordinal));
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    /// Runs one cycle: prefetch, target reset, mode dispatch, present.
    ///
    /// Every successful cycle presents exactly once, including cycles where
    /// the mode draws nothing.
    pub fn redraw(&mut self) -> Result<(), RenderError> {
        let mode = self.mode;
        let recipe = ModeRecipe::for_mode(mode);
        let SurfaceParts {
            device,
            programs,
            geometry,
            window,
        } = self.surface.parts_mut()?;

        let active = !recipe.requires_idle_detector || self.engine.is_pose_detector_idle();
        let textures = if active {
            Prefetched {
                source: recipe.source.map(|artifact| artifact.fetch(&mut self.engine, device)),
                overlay: recipe
                    .overlay
                    .map(|artifact| artifact.fetch(&mut self.engine, device)),
            }
        } else {
            Prefetched::none()
        };

        device.bind_default_target();
        device.set_viewport(window);
        device.clear(recipe.clear_buffers(), CLEAR_COLOR);
        device.set_raster_state(RasterState::DISABLED);

        if active {
            trace!(%mode, "dispatching view");
            draw_recipe(
                &recipe,
                &textures,
                device,
                programs,
                geometry,
                &mut self.engine,
                &mut self.canvas,
            );
        } else {
            trace!(%mode, "pose detector busy; skipping view this cycle");
        }

        device.present()
    }

    /// Blanks the whole window to black, whatever the mode.
    pub fn clear(&mut self) -> Result<(), RenderError> {
        self.surface.clear()
    }

    /// Reads the presented frame back as BGRA, `width * height * 4` bytes of
    /// the window size.
    pub fn read_pixels(&mut self, buffer: &mut [u8]) -> Result<(), RenderError> {
        self.surface.read_pixels(buffer)
    }

    pub fn frame_size(&self) -> Option<FrameSize> {
        self.surface.geometry().map(FrameGeometry::frame_size)
    }

    pub fn window_size(&self) -> FrameSize {
        self.surface.window_viewport().size()
    }

    pub fn surface(&self) -> &RenderSurface<D> {
        &self.surface
    }

    pub fn canvas(&self) -> &OverlayCanvas {
        &self.canvas
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn device(&self) -> &D {
        self.surface.device()
    }

    pub fn device_mut(&mut self) -> &mut D {
        self.surface.device_mut()
    }
}

fn draw_recipe<D, E>(
    recipe: &ModeRecipe,
    textures: &Prefetched<D::Texture>,
    device: &mut D,
    programs: &RenderProgramSet<D>,
    geometry: &FrameGeometry,
    engine: &mut E,
    canvas: &mut OverlayCanvas,
) where
    D: RenderDevice,
    E: EngineFacade<D>,
{
    if let Some(kind) = recipe.program {
        let program = programs.get(kind);
        device.use_program(program.handle());
        if let Some(texture) = &textures.source {
            device.set_sampler_uniform(program.uniform(SOURCE_IMAGE), SOURCE_UNIT);
            device.bind_texture(SOURCE_UNIT, texture);
        }
        if let Some(texture) = &textures.overlay {
            device.set_sampler_uniform(program.uniform(OVERLAY_IMAGE), OVERLAY_UNIT);
            device.bind_texture(OVERLAY_UNIT, texture);
        }
        if let Some(blend_factor) = recipe.blend_factor {
            device.set_float_uniform(program.uniform(BLEND_FACTOR), blend_factor);
        }
        device.draw_quad(geometry);
    }

    for pass in recipe.overlays {
        match pass {
            OverlayPass::SolidModel => engine.draw_solid_model(device),
            OverlayPass::AugmentedImage => engine.draw_augmented_image(device),
            OverlayPass::ContourStatistics => {
                canvas.clear();
                engine.draw_contour_statistics(canvas);
                device.draw_canvas(canvas, geometry);
            }
            OverlayPass::DetectionMap => engine.draw_detection_map(device),
            OverlayPass::DetectedPose => engine.draw_detected_pose(device),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{Op, RecordingDevice, ScriptedEngine};
    use crate::types::{UniformLocation, Viewport};

    const FRAME: FrameSize = FrameSize::new(768, 576);
    const WINDOW: FrameSize = FrameSize::new(1024, 768);

    type TestDispatcher = ViewDispatcher<RecordingDevice, ScriptedEngine>;

    fn dispatcher() -> TestDispatcher {
        let mut dispatcher =
            ViewDispatcher::create(RecordingDevice::new(), ScriptedEngine::new(), FRAME, WINDOW)
                .expect("dispatcher initializes");
        dispatcher.device_mut().take_ops();
        dispatcher
    }

    fn redraw_ops(dispatcher: &mut TestDispatcher) -> Vec<Op> {
        dispatcher.redraw().expect("redraw succeeds");
        dispatcher.device_mut().take_ops()
    }

    fn presents(ops: &[Op]) -> usize {
        ops.iter().filter(|op| **op == Op::Present).count()
    }

    fn cycle_prologue(clear: ClearBuffers) -> Vec<Op> {
        vec![
            Op::BindDefaultTarget,
            Op::SetViewport(Viewport::covering(WINDOW)),
            Op::Clear(clear, CLEAR_COLOR),
            Op::SetRasterState(RasterState::DISABLED),
        ]
    }

    #[test]
    fn starts_in_input_mode() {
        assert_eq!(dispatcher().mode(), ViewMode::Input);
    }

    #[test]
    fn set_mode_reads_back_every_mode_from_every_mode() {
        let mut dispatcher = dispatcher();
        for from in ViewMode::ALL {
            for to in ViewMode::ALL {
                dispatcher.set_mode(from);
                dispatcher.set_mode(to);
                assert_eq!(dispatcher.mode(), to);
            }
        }
        dispatcher.set_mode_ordinal(11);
        assert_eq!(dispatcher.mode(), ViewMode::HarrisCorners);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn set_mode_ordinal_rejects_out_of_range() {
        dispatcher().set_mode_ordinal(ViewMode::COUNT);
    }

    #[test]
    fn unguarded_modes_present_once_whatever_the_detector_does() {
        let mut dispatcher = dispatcher();
        for mode in ViewMode::ALL {
            if ModeRecipe::for_mode(mode).requires_idle_detector {
                continue;
            }
            for idle in [true, false] {
                dispatcher.engine_mut().set_detector_idle(idle);
                dispatcher.set_mode(mode);
                let ops = redraw_ops(&mut dispatcher);
                assert_eq!(presents(&ops), 1, "{mode} idle={idle}");
                assert_eq!(ops.last(), Some(&Op::Present), "{mode}");
            }
        }
        assert_eq!(dispatcher.engine().idle_polls(), 0);
    }

    #[test]
    fn guarded_modes_skip_everything_but_present_while_detector_busy() {
        let mut dispatcher = dispatcher();
        dispatcher.engine_mut().set_detector_idle(false);
        for mode in [ViewMode::Contours, ViewMode::DetectedPose] {
            dispatcher.set_mode(mode);
            let ops = redraw_ops(&mut dispatcher);
            let mut expected = cycle_prologue(ClearBuffers::Color);
            expected.push(Op::Present);
            assert_eq!(ops, expected, "{mode}");
        }
    }

    #[test]
    fn contours_draw_sequence_when_detector_idle() {
        let mut dispatcher = dispatcher();
        dispatcher.set_mode(ViewMode::Contours);
        let ops = redraw_ops(&mut dispatcher);

        let mut expected = vec![Op::Fetch(Artifact::ContourView)];
        expected.extend(cycle_prologue(ClearBuffers::Color));
        expected.extend([
            Op::UseProgram(ProgramKind::Contour),
            Op::SetSampler(UniformLocation(0), SOURCE_UNIT),
            Op::BindTexture(SOURCE_UNIT, Artifact::ContourView),
            Op::DrawQuad(FRAME),
            Op::DrawCanvas { blank: false },
            Op::EngineDraw(OverlayPass::DetectionMap),
            Op::Present,
        ]);
        assert_eq!(ops, expected);
    }

    #[test]
    fn contour_statistics_start_from_a_fresh_canvas_each_cycle() {
        let mut dispatcher = dispatcher();
        dispatcher.set_mode(ViewMode::Contours);
        redraw_ops(&mut dispatcher);
        redraw_ops(&mut dispatcher);

        let canvas = dispatcher.device().last_canvas().expect("canvas composited");
        let (first_x, first_y) = ScriptedEngine::statistics_marker(0);
        let (second_x, second_y) = ScriptedEngine::statistics_marker(1);
        assert_eq!(
            *canvas.get_pixel(first_x as u32, first_y as u32),
            OverlayCanvas::TRANSPARENT
        );
        assert_ne!(
            *canvas.get_pixel(second_x as u32, second_y as u32),
            OverlayCanvas::TRANSPARENT
        );
    }

    #[test]
    fn detected_pose_draw_sequence_when_detector_idle() {
        let mut dispatcher = dispatcher();
        dispatcher.set_mode(ViewMode::DetectedPose);
        let ops = redraw_ops(&mut dispatcher);

        let mut expected = vec![Op::Fetch(Artifact::CurrentFrame)];
        expected.extend(cycle_prologue(ClearBuffers::Color));
        expected.extend([
            Op::UseProgram(ProgramKind::PlainImage),
            Op::SetSampler(UniformLocation(0), SOURCE_UNIT),
            Op::BindTexture(SOURCE_UNIT, Artifact::CurrentFrame),
            Op::DrawQuad(FRAME),
            Op::EngineDraw(OverlayPass::DetectionMap),
            Op::EngineDraw(OverlayPass::DetectedPose),
            Op::Present,
        ]);
        assert_eq!(ops, expected);
    }

    #[test]
    fn detector_idleness_is_polled_fresh_every_cycle() {
        let mut dispatcher = dispatcher();
        dispatcher.set_mode(ViewMode::Contours);

        dispatcher.engine_mut().set_detector_idle(false);
        let busy = redraw_ops(&mut dispatcher);
        dispatcher.engine_mut().set_detector_idle(true);
        let idle = redraw_ops(&mut dispatcher);
        dispatcher.engine_mut().set_detector_idle(false);
        let busy_again = redraw_ops(&mut dispatcher);

        assert!(!busy.iter().any(Op::is_gpu_binding_or_draw));
        assert!(idle.contains(&Op::DrawQuad(FRAME)));
        assert!(!busy_again.iter().any(Op::is_gpu_binding_or_draw));
        assert_eq!(dispatcher.engine().idle_polls(), 3);
    }

    #[test]
    fn input_scenario_binds_current_frame_once_and_presents() {
        let mut dispatcher = dispatcher();
        dispatcher.set_mode(ViewMode::Input);
        let ops = redraw_ops(&mut dispatcher);

        let binds = ops
            .iter()
            .filter(|op| **op == Op::BindTexture(SOURCE_UNIT, Artifact::CurrentFrame))
            .count();
        let draws = ops.iter().filter(|op| matches!(op, Op::DrawQuad(_))).count();
        assert_eq!(binds, 1);
        assert_eq!(draws, 1);
        assert_eq!(presents(&ops), 1);
        assert!(ops.contains(&Op::DrawQuad(FRAME)));
        for op in &ops {
            if let Op::SetRasterState(state) = op {
                assert!(!state.depth_test && !state.blending && !state.culling);
            }
        }
        assert!(!ops.contains(&Op::Clear(ClearBuffers::ColorDepth, CLEAR_COLOR)));
    }

    #[test]
    fn initial_model_scenario_blends_camera_frame_with_model() {
        let mut dispatcher = dispatcher();
        dispatcher.set_mode(ViewMode::InitialModel);
        let ops = redraw_ops(&mut dispatcher);

        assert!(ops.contains(&Op::UseProgram(ProgramKind::CanvasOverlay)));
        assert!(ops.contains(&Op::SetFloat(UniformLocation(2), 0.6)));
        assert!(ops.contains(&Op::BindTexture(SOURCE_UNIT, Artifact::CurrentFrame)));
        assert!(ops.contains(&Op::BindTexture(OVERLAY_UNIT, Artifact::InitialModel)));
        assert!(ops.contains(&Op::SetSampler(UniformLocation(0), SOURCE_UNIT)));
        assert!(ops.contains(&Op::SetSampler(UniformLocation(1), OVERLAY_UNIT)));
    }

    #[test]
    fn blend_factors_are_per_mode_constants() {
        let factor = |mode| ModeRecipe::for_mode(mode).blend_factor;
        assert_eq!(factor(ViewMode::InitialModel), Some(0.6));
        assert_eq!(factor(ViewMode::FittedModel), Some(0.75));
        assert_eq!(factor(ViewMode::ReferenceColors), Some(0.6));
        assert_eq!(factor(ViewMode::AugmentedImage), None);

        let mut dispatcher = dispatcher();
        dispatcher.set_mode(ViewMode::FittedModel);
        let ops = redraw_ops(&mut dispatcher);
        assert!(ops.contains(&Op::SetFloat(UniformLocation(2), 0.75)));
        assert!(ops.contains(&Op::BindTexture(OVERLAY_UNIT, Artifact::FittedModel)));
    }

    #[test]
    fn prefetch_happens_before_any_target_work() {
        let mut dispatcher = dispatcher();
        for mode in ViewMode::ALL {
            dispatcher.set_mode(mode);
            let ops = redraw_ops(&mut dispatcher);
            let first_target_op = ops
                .iter()
                .position(|op| *op == Op::BindDefaultTarget)
                .expect("every cycle binds the target");
            let last_fetch = ops.iter().rposition(|op| matches!(op, Op::Fetch(_)));
            if let Some(last_fetch) = last_fetch {
                assert!(last_fetch < first_target_op, "{mode}");
            }
        }
    }

    #[test]
    fn depth_is_cleared_only_for_depth_modes() {
        let mut dispatcher = dispatcher();
        for mode in ViewMode::ALL {
            dispatcher.set_mode(mode);
            let ops = redraw_ops(&mut dispatcher);
            let clears: Vec<_> = ops
                .iter()
                .filter_map(|op| match op {
                    Op::Clear(buffers, _) => Some(*buffers),
                    _ => None,
                })
                .collect();
            let expected = if matches!(mode, ViewMode::SolidModel | ViewMode::DepthPass) {
                ClearBuffers::ColorDepth
            } else {
                ClearBuffers::Color
            };
            assert_eq!(clears, vec![expected], "{mode}");
        }
    }

    #[test]
    fn solid_model_is_delegated_to_the_engine() {
        let mut dispatcher = dispatcher();
        dispatcher.set_mode(ViewMode::SolidModel);
        let ops = redraw_ops(&mut dispatcher);
        let mut expected = cycle_prologue(ClearBuffers::ColorDepth);
        expected.extend([Op::EngineDraw(OverlayPass::SolidModel), Op::Present]);
        assert_eq!(ops, expected);
    }

    #[test]
    fn augmented_image_draws_ring_slot_then_engine_overlay_without_blend() {
        let mut dispatcher = dispatcher();
        dispatcher.set_mode(ViewMode::AugmentedImage);
        let ops = redraw_ops(&mut dispatcher);
        let slot = Artifact::FrameAt(AUGMENTED_FRAME_SLOT);

        let mut expected = vec![Op::Fetch(slot)];
        expected.extend(cycle_prologue(ClearBuffers::Color));
        expected.extend([
            Op::UseProgram(ProgramKind::PlainImage),
            Op::SetSampler(UniformLocation(0), SOURCE_UNIT),
            Op::BindTexture(SOURCE_UNIT, slot),
            Op::DrawQuad(FRAME),
            Op::EngineDraw(OverlayPass::AugmentedImage),
            Op::Present,
        ]);
        assert_eq!(ops, expected);
    }

    #[test]
    fn textured_modes_use_their_program_and_artifact() {
        let cases = [
            (ViewMode::DepthPass, ProgramKind::DepthPass, Artifact::DepthPass),
            (ViewMode::CannyEdges, ProgramKind::PlainImage, Artifact::CannyEdges),
            (
                ViewMode::DistanceTransform,
                ProgramKind::DistanceTransform,
                Artifact::DistanceTransform,
            ),
        ];
        let mut dispatcher = dispatcher();
        for (mode, program, artifact) in cases {
            dispatcher.set_mode(mode);
            let ops = redraw_ops(&mut dispatcher);
            assert_eq!(ops[0], Op::Fetch(artifact), "{mode}");
            assert!(ops.contains(&Op::UseProgram(program)), "{mode}");
            assert!(ops.contains(&Op::BindTexture(SOURCE_UNIT, artifact)), "{mode}");
            assert_eq!(
                ops.iter().filter(|op| matches!(op, Op::DrawQuad(_))).count(),
                1,
                "{mode}"
            );
        }
    }

    #[test]
    fn harris_corners_is_an_accepted_no_op() {
        let mut dispatcher = dispatcher();
        dispatcher.set_mode(ViewMode::HarrisCorners);
        let ops = redraw_ops(&mut dispatcher);
        let mut expected = cycle_prologue(ClearBuffers::Color);
        expected.push(Op::Present);
        assert_eq!(ops, expected);
    }

    #[test]
    fn state_is_reset_at_the_start_of_every_cycle() {
        let mut dispatcher = dispatcher();
        for mode in [ViewMode::InitialModel, ViewMode::Input, ViewMode::SolidModel] {
            dispatcher.set_mode(mode);
            let ops = redraw_ops(&mut dispatcher);
            let start = ops
                .iter()
                .position(|op| *op == Op::BindDefaultTarget)
                .expect("target bound");
            assert_eq!(ops[start + 3], Op::SetRasterState(RasterState::DISABLED));
        }
    }

    #[test]
    fn reset_rebuilds_geometry_and_canvas_for_the_new_size() {
        let mut dispatcher = dispatcher();
        let resized = FrameSize::new(640, 480);
        dispatcher.reset(resized).unwrap();
        assert_eq!(dispatcher.frame_size(), Some(resized));
        assert_eq!(
            dispatcher.surface().geometry(),
            Some(&FrameGeometry::new(resized))
        );
        assert_eq!(dispatcher.canvas().size(), resized);

        let ops = redraw_ops(&mut dispatcher);
        assert!(ops.contains(&Op::DrawQuad(resized)));
        assert!(!ops.contains(&Op::DrawQuad(FRAME)));
    }

    #[test]
    fn clear_blanks_the_last_window_size_in_any_mode() {
        let mut dispatcher = dispatcher();
        let window = FrameSize::new(640, 360);
        dispatcher.set_window_size(window);
        dispatcher.device_mut().take_ops();
        for mode in ViewMode::ALL {
            dispatcher.set_mode(mode);
            dispatcher.clear().unwrap();
            let ops = dispatcher.device_mut().take_ops();
            assert_eq!(
                ops,
                vec![
                    Op::BindDefaultTarget,
                    Op::SetViewport(Viewport::covering(window)),
                    Op::SetRasterState(RasterState::DISABLED),
                    Op::Clear(ClearBuffers::ColorDepth, [0.0, 0.0, 0.0, 1.0]),
                    Op::Present,
                ],
                "{mode}"
            );
        }
    }

    #[test]
    fn redraw_before_initialize_fails_without_presenting() {
        let mut dispatcher: TestDispatcher =
            ViewDispatcher::new(RecordingDevice::new(), ScriptedEngine::new(), WINDOW);
        assert!(matches!(dispatcher.redraw(), Err(RenderError::NotInitialized)));
        dispatcher.initialize().unwrap();
        assert!(matches!(dispatcher.redraw(), Err(RenderError::MissingGeometry)));
        assert_eq!(presents(dispatcher.device().ops()), 0);
    }

    #[test]
    fn teardown_releases_programs_and_stops_rendering() {
        let mut dispatcher = dispatcher();
        dispatcher.teardown();
        let released = dispatcher
            .device()
            .count(|op| matches!(op, Op::ReleaseProgram(_)));
        assert_eq!(released, ProgramKind::ALL.len());
        assert!(matches!(dispatcher.redraw(), Err(RenderError::NotInitialized)));
    }

    #[test]
    fn read_pixels_uses_the_window_size() {
        let mut dispatcher = dispatcher();
        let mut buffer = vec![0xffu8; WINDOW.rgba_len()];
        dispatcher.read_pixels(&mut buffer).unwrap();
        assert!(buffer.iter().all(|byte| *byte == 0));

        let mut wrong = vec![0u8; FRAME.rgba_len()];
        assert!(matches!(
            dispatcher.read_pixels(&mut wrong),
            Err(RenderError::BufferSize { .. })
        ));
    }
}
