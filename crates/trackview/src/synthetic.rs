use std::collections::HashMap;

use anyhow::Result;
use image::Rgba;
use tracing::trace;
use viewconfig::EngineSection;
use viewdispatch::{
    Artifact, EngineFacade, FrameGeometry, FrameSize, OverlayCanvas, RenderDevice, WgpuDevice,
};

use crate::detector::PoseDetector;
use crate::scene::{self, ContourStatistics, Pose, Scene, FITTED_TINT};

const SOLID_ALPHA: u8 = 255;
const AUGMENT_COLOR: Rgba<u8> = Rgba([255, 220, 40, 255]);
const DETECTED_COLOR: Rgba<u8> = Rgba([255, 70, 220, 255]);
const HEAT_CELL: u32 = 16;
const PANEL_BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 160]);
const BAR_COLOR: Rgba<u8> = Rgba([60, 255, 90, 220]);
const BAR_HEIGHT: u32 = 10;
const BAR_LENGTH: u32 = 120;
const MEAN_COLOR: Rgba<u8> = Rgba([255, 255, 255, 220]);

/// Stand-in tracking engine: a procedural scene, a CPU edge pipeline and a
/// threaded pose detector, exposed to the dispatcher as GPU textures.
pub struct SyntheticEngine {
    scene: Scene,
    detector: PoseDetector,
    geometry: FrameGeometry,
    overlay: OverlayCanvas,
    /// Views uploaded during the current tick.
    textures: HashMap<Artifact, wgpu::TextureView>,
}

impl SyntheticEngine {
    pub fn new(frame_size: FrameSize, settings: &EngineSection) -> Result<Self> {
        Ok(Self {
            scene: Scene::new(frame_size, settings.frame_ring),
            detector: PoseDetector::spawn(settings.detector_latency)?,
            geometry: FrameGeometry::new(frame_size),
            overlay: OverlayCanvas::new(frame_size),
            textures: HashMap::new(),
        })
    }

    /// Steps the scene by one tick and hands the detector new work when it
    /// is free.
    pub fn advance(&mut self) {
        self.scene.advance();
        self.textures.clear();
        let submitted = self.detector.submit(self.scene.pose());
        trace!(
            tick = self.scene.tick(),
            ring = self.scene.ring_len(),
            submitted,
            "scene advanced"
        );
    }

    fn texture(&mut self, device: &mut WgpuDevice, artifact: Artifact) -> wgpu::TextureView {
        if let Some(view) = self.textures.get(&artifact) {
            return view.clone();
        }
        let view = device.upload_image(&texture_key(artifact), self.scene.image(artifact));
        self.textures.insert(artifact, view.clone());
        view
    }

    /// Redraws the engine overlay with `paint` and composites it.
    fn composite<F>(&mut self, device: &mut WgpuDevice, paint: F)
    where
        F: FnOnce(&mut OverlayCanvas, &Scene),
    {
        self.overlay.clear();
        paint(&mut self.overlay, &self.scene);
        device.draw_canvas(&self.overlay, &self.geometry);
    }
}

fn texture_key(artifact: Artifact) -> String {
    match artifact {
        Artifact::FrameAt(index) => format!("frame ring slot {index}"),
        other => format!("{other:?}"),
    }
}

impl EngineFacade<WgpuDevice> for SyntheticEngine {
    fn current_frame(&mut self, device: &mut WgpuDevice) -> wgpu::TextureView {
        self.texture(device, Artifact::CurrentFrame)
    }

    fn frame_at(&mut self, device: &mut WgpuDevice, index: usize) -> wgpu::TextureView {
        self.texture(device, Artifact::FrameAt(index))
    }

    fn tracker_depth_pass(&mut self, device: &mut WgpuDevice) -> wgpu::TextureView {
        self.texture(device, Artifact::DepthPass)
    }

    fn tracker_initial_model(&mut self, device: &mut WgpuDevice) -> wgpu::TextureView {
        self.texture(device, Artifact::InitialModel)
    }

    fn tracker_fitted_model(&mut self, device: &mut WgpuDevice) -> wgpu::TextureView {
        self.texture(device, Artifact::FittedModel)
    }

    fn tracker_reference_colors(&mut self, device: &mut WgpuDevice) -> wgpu::TextureView {
        self.texture(device, Artifact::ReferenceColors)
    }

    fn canny_edges(&mut self, device: &mut WgpuDevice) -> wgpu::TextureView {
        self.texture(device, Artifact::CannyEdges)
    }

    fn distance_transform(&mut self, device: &mut WgpuDevice) -> wgpu::TextureView {
        self.texture(device, Artifact::DistanceTransform)
    }

    fn contour_view(&mut self, device: &mut WgpuDevice) -> wgpu::TextureView {
        self.texture(device, Artifact::ContourView)
    }

    fn draw_solid_model(&mut self, device: &mut WgpuDevice) {
        self.composite(device, |canvas, scene| {
            scene::fill_pose(canvas, &scene.pose(), FITTED_TINT, SOLID_ALPHA);
        });
    }

    fn draw_augmented_image(&mut self, device: &mut WgpuDevice) {
        self.composite(device, |canvas, scene| {
            let pose = scene.pose_at_slot(viewdispatch::AUGMENTED_FRAME_SLOT);
            scene::outline_pose(canvas, &pose, AUGMENT_COLOR);
            scene::draw_axes(canvas, &pose);
        });
    }

    fn draw_contour_statistics(&mut self, canvas: &mut OverlayCanvas) {
        let stats = self.scene.contour_statistics();
        paint_statistics(canvas, &stats, &self.scene.pose());
    }

    fn draw_detection_map(&mut self, device: &mut WgpuDevice) {
        let Some(detection) = self.detector.latest() else {
            return;
        };
        self.composite(device, |canvas, _| paint_heat(canvas, &detection.pose));
    }

    fn draw_detected_pose(&mut self, device: &mut WgpuDevice) {
        let Some(detection) = self.detector.latest() else {
            return;
        };
        self.composite(device, |canvas, _| {
            scene::outline_pose(canvas, &detection.pose, DETECTED_COLOR);
            canvas.draw_cross(detection.pose.center(), 6, DETECTED_COLOR);
        });
    }

    fn is_pose_detector_idle(&self) -> bool {
        self.detector.is_idle()
    }
}

/// Support bars per contour side and their mean, plus a cross on every
/// corner.
fn paint_statistics(canvas: &mut OverlayCanvas, stats: &ContourStatistics, pose: &Pose) {
    let rows = stats.sides.len() as u32 + 1;
    canvas.fill_rect(
        4,
        4,
        BAR_LENGTH + 8,
        rows * (BAR_HEIGHT + 4) + 4,
        PANEL_BACKGROUND,
    );
    for (row, support) in stats.sides.iter().enumerate() {
        let length = (support.clamp(0.0, 1.0) * BAR_LENGTH as f32).round() as u32;
        let y = 8 + row as i64 * (BAR_HEIGHT + 4) as i64;
        canvas.fill_rect(8, y, length, BAR_HEIGHT, BAR_COLOR);
    }
    let mean_length = (stats.mean().clamp(0.0, 1.0) * BAR_LENGTH as f32).round() as u32;
    let mean_y = 8 + stats.sides.len() as i64 * (BAR_HEIGHT + 4) as i64;
    canvas.fill_rect(8, mean_y, mean_length, BAR_HEIGHT, MEAN_COLOR);
    for (x, y) in pose.corners() {
        canvas.draw_cross((x.round() as i64, y.round() as i64), 4, BAR_COLOR);
    }
}

/// Detection likelihood as a coarse heat grid around `pose`.
fn paint_heat(canvas: &mut OverlayCanvas, pose: &Pose) {
    let size = canvas.size();
    let spread = 2.0 * pose.half_extent;
    for cell_y in (0..size.height).step_by(HEAT_CELL as usize) {
        for cell_x in (0..size.width).step_by(HEAT_CELL as usize) {
            let dx = cell_x as f32 + HEAT_CELL as f32 * 0.5 - pose.x;
            let dy = cell_y as f32 + HEAT_CELL as f32 * 0.5 - pose.y;
            let heat = (-(dx * dx + dy * dy) / (spread * spread)).exp();
            if heat < 0.05 {
                continue;
            }
            let color = Rgba([
                255,
                ((1.0 - heat) * 200.0) as u8,
                0,
                (heat * 160.0) as u8,
            ]);
            canvas.fill_rect(
                cell_x as i64,
                cell_y as i64,
                HEAT_CELL - 1,
                HEAT_CELL - 1,
                color,
            );
        }
    }
}
