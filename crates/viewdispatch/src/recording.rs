//! In-memory device and engine that log every call, for asserting the exact
//! sequence a redraw issues without a GPU.

use std::cell::Cell;
use std::collections::HashSet;

use image::{Rgba, RgbaImage};

use crate::canvas::OverlayCanvas;
use crate::device::RenderDevice;
use crate::engine::{Artifact, EngineFacade, OverlayPass};
use crate::error::{ProgramError, RenderError};
use crate::geometry::FrameGeometry;
use crate::programs::{ProgramKind, ProgramSource, UniformDecl};
use crate::types::{
    ClearBuffers, FrameSize, RasterState, TextureUnit, UniformLocation, Viewport,
};

#[derive(Clone, Debug, PartialEq)]
pub enum Op {
    LinkProgram(ProgramKind),
    ReleaseProgram(ProgramKind),
    BindDefaultTarget,
    SetViewport(Viewport),
    Clear(ClearBuffers, [f32; 4]),
    SetRasterState(RasterState),
    UseProgram(ProgramKind),
    SetSampler(UniformLocation, TextureUnit),
    SetFloat(UniformLocation, f32),
    BindTexture(TextureUnit, Artifact),
    DrawQuad(FrameSize),
    DrawCanvas { blank: bool },
    Present,
    ReadPixels(usize),
    ResizeTarget(FrameSize),
    /// Engine accessor invoked.
    Fetch(Artifact),
    /// Engine-side draw invoked.
    EngineDraw(OverlayPass),
}

impl Op {
    pub fn is_gpu_binding_or_draw(&self) -> bool {
        matches!(
            self,
            Op::UseProgram(_)
                | Op::SetSampler(..)
                | Op::SetFloat(..)
                | Op::BindTexture(..)
                | Op::DrawQuad(_)
                | Op::DrawCanvas { .. }
                | Op::EngineDraw(_)
        )
    }
}

#[derive(Debug)]
pub struct RecordedProgram {
    kind: ProgramKind,
    uniforms: &'static [UniformDecl],
}

#[derive(Default)]
pub struct RecordingDevice {
    ops: Vec<Op>,
    failing_compile: Option<ProgramKind>,
    failing_link: Option<ProgramKind>,
    hidden: HashSet<(ProgramKind, &'static str)>,
    last_canvas: Option<RgbaImage>,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_compile(&mut self, kind: ProgramKind) {
        self.failing_compile = Some(kind);
    }

    pub fn fail_link(&mut self, kind: ProgramKind) {
        self.failing_link = Some(kind);
    }

    /// Makes `name` unresolvable on `kind`, as if the linker optimized it out.
    pub fn hide_uniform(&mut self, kind: ProgramKind, name: &'static str) {
        self.hidden.insert((kind, name));
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn take_ops(&mut self) -> Vec<Op> {
        std::mem::take(&mut self.ops)
    }

    pub fn count(&self, predicate: impl Fn(&Op) -> bool) -> usize {
        self.ops.iter().filter(|op| predicate(op)).count()
    }

    /// Pixels of the most recently composited canvas.
    pub fn last_canvas(&self) -> Option<&RgbaImage> {
        self.last_canvas.as_ref()
    }

    pub fn record(&mut self, op: Op) {
        self.ops.push(op);
    }
}

impl RenderDevice for RecordingDevice {
    type Texture = Artifact;
    type Program = RecordedProgram;

    fn link_program(&mut self, source: &ProgramSource) -> Result<RecordedProgram, ProgramError> {
        if self.failing_compile == Some(source.kind) {
            return Err(ProgramError::Compile {
                program: source.kind,
                stage: "fragment",
                message: "scripted compile failure".to_string(),
            });
        }
        if self.failing_link == Some(source.kind) {
            return Err(ProgramError::Link {
                program: source.kind,
                message: "scripted link failure".to_string(),
            });
        }
        self.record(Op::LinkProgram(source.kind));
        Ok(RecordedProgram {
            kind: source.kind,
            uniforms: source.uniforms,
        })
    }

    fn uniform_location(&self, program: &RecordedProgram, name: &str) -> UniformLocation {
        if self
            .hidden
            .iter()
            .any(|(kind, hidden)| *kind == program.kind && *hidden == name)
        {
            return UniformLocation::UNRESOLVED;
        }
        program
            .uniforms
            .iter()
            .position(|decl| decl.name == name)
            .map(|index| UniformLocation(index as i32))
            .unwrap_or(UniformLocation::UNRESOLVED)
    }

    fn release_program(&mut self, program: RecordedProgram) {
        self.record(Op::ReleaseProgram(program.kind));
    }

    fn bind_default_target(&mut self) {
        self.record(Op::BindDefaultTarget);
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.record(Op::SetViewport(viewport));
    }

    fn clear(&mut self, buffers: ClearBuffers, color: [f32; 4]) {
        self.record(Op::Clear(buffers, color));
    }

    fn set_raster_state(&mut self, state: RasterState) {
        self.record(Op::SetRasterState(state));
    }

    fn use_program(&mut self, program: &RecordedProgram) {
        self.record(Op::UseProgram(program.kind));
    }

    fn set_sampler_uniform(&mut self, location: UniformLocation, unit: TextureUnit) {
        self.record(Op::SetSampler(location, unit));
    }

    fn set_float_uniform(&mut self, location: UniformLocation, value: f32) {
        self.record(Op::SetFloat(location, value));
    }

    fn bind_texture(&mut self, unit: TextureUnit, texture: &Artifact) {
        self.record(Op::BindTexture(unit, *texture));
    }

    fn draw_quad(&mut self, geometry: &FrameGeometry) {
        self.record(Op::DrawQuad(geometry.frame_size()));
    }

    fn draw_canvas(&mut self, canvas: &OverlayCanvas, _geometry: &FrameGeometry) {
        self.last_canvas = Some(canvas.image().clone());
        self.record(Op::DrawCanvas {
            blank: canvas.is_blank(),
        });
    }

    fn present(&mut self) -> Result<(), RenderError> {
        self.record(Op::Present);
        Ok(())
    }

    fn read_pixels(&mut self, buffer: &mut [u8]) -> Result<(), RenderError> {
        buffer.fill(0);
        self.record(Op::ReadPixels(buffer.len()));
        Ok(())
    }

    fn resize_target(&mut self, size: FrameSize) {
        self.record(Op::ResizeTarget(size));
    }
}

/// Engine whose accessors hand back the artifact they were asked for and
/// whose detector idleness is toggled by the test.
pub struct ScriptedEngine {
    idle: bool,
    idle_polls: Cell<usize>,
    statistics_draws: usize,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self {
            idle: true,
            idle_polls: Cell::new(0),
            statistics_draws: 0,
        }
    }

    pub fn set_detector_idle(&mut self, idle: bool) {
        self.idle = idle;
    }

    pub fn idle_polls(&self) -> usize {
        self.idle_polls.get()
    }

    /// Center of the cross painted by the `draw`-th statistics call.
    pub fn statistics_marker(draw: usize) -> (i64, i64) {
        (8 + 32 * draw as i64, 8)
    }

    fn fetch(device: &mut RecordingDevice, artifact: Artifact) -> Artifact {
        device.record(Op::Fetch(artifact));
        artifact
    }
}

impl EngineFacade<RecordingDevice> for ScriptedEngine {
    fn current_frame(&mut self, device: &mut RecordingDevice) -> Artifact {
        Self::fetch(device, Artifact::CurrentFrame)
    }

    fn frame_at(&mut self, device: &mut RecordingDevice, index: usize) -> Artifact {
        Self::fetch(device, Artifact::FrameAt(index))
    }

    fn tracker_depth_pass(&mut self, device: &mut RecordingDevice) -> Artifact {
        Self::fetch(device, Artifact::DepthPass)
    }

    fn tracker_initial_model(&mut self, device: &mut RecordingDevice) -> Artifact {
        Self::fetch(device, Artifact::InitialModel)
    }

    fn tracker_fitted_model(&mut self, device: &mut RecordingDevice) -> Artifact {
        Self::fetch(device, Artifact::FittedModel)
    }

    fn tracker_reference_colors(&mut self, device: &mut RecordingDevice) -> Artifact {
        Self::fetch(device, Artifact::ReferenceColors)
    }

    fn canny_edges(&mut self, device: &mut RecordingDevice) -> Artifact {
        Self::fetch(device, Artifact::CannyEdges)
    }

    fn distance_transform(&mut self, device: &mut RecordingDevice) -> Artifact {
        Self::fetch(device, Artifact::DistanceTransform)
    }

    fn contour_view(&mut self, device: &mut RecordingDevice) -> Artifact {
        Self::fetch(device, Artifact::ContourView)
    }

    fn draw_solid_model(&mut self, device: &mut RecordingDevice) {
        device.record(Op::EngineDraw(OverlayPass::SolidModel));
    }

    fn draw_augmented_image(&mut self, device: &mut RecordingDevice) {
        device.record(Op::EngineDraw(OverlayPass::AugmentedImage));
    }

    fn draw_contour_statistics(&mut self, canvas: &mut OverlayCanvas) {
        let marker = Self::statistics_marker(self.statistics_draws);
        self.statistics_draws += 1;
        canvas.draw_cross(marker, 4, Rgba([255, 255, 0, 255]));
    }

    fn draw_detection_map(&mut self, device: &mut RecordingDevice) {
        device.record(Op::EngineDraw(OverlayPass::DetectionMap));
    }

    fn draw_detected_pose(&mut self, device: &mut RecordingDevice) {
        device.record(Op::EngineDraw(OverlayPass::DetectedPose));
    }

    fn is_pose_detector_idle(&self) -> bool {
        self.idle_polls.set(self.idle_polls.get() + 1);
        self.idle
    }
}
