//! Procedural camera and tracker artifacts.
//!
//! A textured square drifts across a checkered backdrop. Every engine
//! artifact is derived on the CPU from that scene, lazily and at most once
//! per tick.

use std::collections::{HashMap, VecDeque};

use image::{Rgba, RgbaImage};
use viewdispatch::{Artifact, FrameSize, OverlayCanvas};

/// Simulated seconds per tick.
pub const TICK_SECONDS: f32 = 1.0 / 60.0;

/// How far behind the fitted pose the initial hypothesis starts.
const INITIAL_POSE_LAG: f32 = 0.25;

const CHECKER_CELL: u32 = 32;
const STRIPE_WIDTH: f32 = 8.0;

const EDGE_HIGH: f32 = 100.0;
const EDGE_LOW: f32 = 50.0;
const EDGE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const NO_EDGE: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Gray levels per chamfer unit in the distance image.
const DISTANCE_SCALE: u32 = 4;

const SAMPLES_PER_SIDE: usize = 16;
const SUPPORT_RADIUS: i64 = 2;

pub const INITIAL_TINT: [u8; 3] = [90, 140, 255];
pub const FITTED_TINT: [u8; 3] = [80, 230, 120];
pub const CONTOUR_COLOR: Rgba<u8> = Rgba([60, 255, 90, 255]);

/// Position, size and rotation of the tracked square, in frame pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    pub x: f32,
    pub y: f32,
    /// Half the side length.
    pub half_extent: f32,
    pub angle: f32,
}

impl Pose {
    /// Where the target sits `seconds` into the sequence.
    pub fn at(size: FrameSize, seconds: f32) -> Self {
        let (width, height) = (size.width as f32, size.height as f32);
        Self {
            x: width * 0.5 + width * 0.25 * (seconds * 0.7).cos(),
            y: height * 0.5 + height * 0.2 * (seconds * 1.1).sin(),
            half_extent: width.min(height) * 0.12,
            angle: seconds * 0.5,
        }
    }

    pub fn to_local(&self, x: f32, y: f32) -> (f32, f32) {
        let (sin, cos) = self.angle.sin_cos();
        let (dx, dy) = (x - self.x, y - self.y);
        (dx * cos + dy * sin, -dx * sin + dy * cos)
    }

    pub fn to_frame(&self, local_x: f32, local_y: f32) -> (f32, f32) {
        let (sin, cos) = self.angle.sin_cos();
        (
            self.x + local_x * cos - local_y * sin,
            self.y + local_x * sin + local_y * cos,
        )
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        let (local_x, local_y) = self.to_local(x, y);
        local_x.abs() <= self.half_extent && local_y.abs() <= self.half_extent
    }

    /// Corners in winding order.
    pub fn corners(&self) -> [(f32, f32); 4] {
        let extent = self.half_extent;
        [
            (-extent, -extent),
            (extent, -extent),
            (extent, extent),
            (-extent, extent),
        ]
        .map(|(local_x, local_y)| self.to_frame(local_x, local_y))
    }

    pub fn center(&self) -> (i64, i64) {
        (self.x.round() as i64, self.y.round() as i64)
    }

    /// Shading term in `0.45..=1.0`, brightest on the +x side.
    fn shade(&self, x: f32, y: f32) -> f32 {
        let (local_x, _) = self.to_local(x, y);
        0.45 + 0.55 * ((local_x + self.half_extent) / (2.0 * self.half_extent)).clamp(0.0, 1.0)
    }
}

/// Fraction of contour samples per side that found an edge nearby.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContourStatistics {
    pub sides: [f32; 4],
}

impl ContourStatistics {
    pub fn mean(&self) -> f32 {
        self.sides.iter().sum::<f32>() / self.sides.len() as f32
    }
}

pub struct Scene {
    size: FrameSize,
    tick: u64,
    /// Newest frame first; never empty.
    ring: VecDeque<RgbaImage>,
    ring_capacity: usize,
    derived: HashMap<Artifact, RgbaImage>,
}

impl Scene {
    pub fn new(size: FrameSize, ring_capacity: usize) -> Self {
        let ring_capacity = ring_capacity.max(1);
        let mut ring = VecDeque::with_capacity(ring_capacity);
        ring.push_front(camera_frame(size, 0.0));
        Self {
            size,
            tick: 0,
            ring,
            ring_capacity,
            derived: HashMap::new(),
        }
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn ring_len(&self) -> usize {
        self.ring.len()
    }

    pub fn advance(&mut self) {
        self.tick += 1;
        self.ring
            .push_front(camera_frame(self.size, self.tick as f32 * TICK_SECONDS));
        self.ring.truncate(self.ring_capacity);
        self.derived.clear();
    }

    /// Ground-truth pose of the current frame, which the tracker fits exactly.
    pub fn pose(&self) -> Pose {
        self.pose_at_slot(0)
    }

    /// Pose shown in ring slot `index`, clamped to the oldest frame kept.
    pub fn pose_at_slot(&self, index: usize) -> Pose {
        let age = self.clamp_slot(index) as u64;
        Pose::at(self.size, self.tick.saturating_sub(age) as f32 * TICK_SECONDS)
    }

    pub fn initial_pose(&self) -> Pose {
        let seconds = self.tick as f32 * TICK_SECONDS - INITIAL_POSE_LAG;
        Pose::at(self.size, seconds.max(0.0))
    }

    pub fn frame(&self, index: usize) -> &RgbaImage {
        &self.ring[self.clamp_slot(index)]
    }

    fn clamp_slot(&self, index: usize) -> usize {
        index.min(self.ring.len() - 1)
    }

    /// CPU image of `artifact` for the current tick.
    pub fn image(&mut self, artifact: Artifact) -> &RgbaImage {
        match artifact {
            Artifact::CurrentFrame => self.frame(0),
            Artifact::FrameAt(index) => self.frame(index),
            _ => {
                if !self.derived.contains_key(&artifact) {
                    let image = self.render(artifact);
                    self.derived.insert(artifact, image);
                }
                &self.derived[&artifact]
            }
        }
    }

    fn render(&mut self, artifact: Artifact) -> RgbaImage {
        let pose = self.pose();
        match artifact {
            Artifact::CurrentFrame => self.frame(0).clone(),
            Artifact::FrameAt(index) => self.frame(index).clone(),
            Artifact::DepthPass => depth_pass(self.size, &pose),
            Artifact::InitialModel => model_render(self.size, &self.initial_pose(), INITIAL_TINT),
            Artifact::FittedModel => model_render(self.size, &pose, FITTED_TINT),
            Artifact::ReferenceColors => reference_colors(self.frame(0), &pose),
            Artifact::CannyEdges => canny_edges(self.frame(0)),
            Artifact::DistanceTransform => distance_transform(self.image(Artifact::CannyEdges)),
            Artifact::ContourView => contour_view(self.image(Artifact::CannyEdges), &pose),
        }
    }

    pub fn contour_statistics(&mut self) -> ContourStatistics {
        let pose = self.pose();
        contour_support(self.image(Artifact::CannyEdges), &pose)
    }
}

pub fn camera_frame(size: FrameSize, seconds: f32) -> RgbaImage {
    let pose = Pose::at(size, seconds);
    let height = size.height.max(1) as f32;
    let width = size.width.max(1) as f32;
    RgbaImage::from_fn(size.width, size.height, |x, y| {
        let (fx, fy) = (x as f32 + 0.5, y as f32 + 0.5);
        if pose.contains(fx, fy) {
            let (local_x, _) = pose.to_local(fx, fy);
            let stripe = (local_x / STRIPE_WIDTH).floor() as i32;
            let green = if stripe.rem_euclid(2) == 0 { 140 } else { 200 };
            return Rgba([220, green, 60, 255]);
        }
        let checker = if (x / CHECKER_CELL + y / CHECKER_CELL) % 2 == 0 {
            15
        } else {
            0
        };
        Rgba([
            40 + (40.0 * fy / height) as u8 + checker,
            50 + (40.0 * fx / width) as u8 + checker,
            70 + checker,
            255,
        ])
    })
}

/// Nearer surface points are brighter; the background is the far plane.
pub fn depth_pass(size: FrameSize, pose: &Pose) -> RgbaImage {
    RgbaImage::from_fn(size.width, size.height, |x, y| {
        let (fx, fy) = (x as f32 + 0.5, y as f32 + 0.5);
        if !pose.contains(fx, fy) {
            return Rgba([0, 0, 0, 255]);
        }
        let (local_x, local_y) = pose.to_local(fx, fy);
        let falloff = local_x.abs().max(local_y.abs()) / pose.half_extent;
        let value = (255.0 - 140.0 * falloff).clamp(0.0, 255.0) as u8;
        Rgba([value, value, value, 255])
    })
}

pub fn model_render(size: FrameSize, pose: &Pose, tint: [u8; 3]) -> RgbaImage {
    RgbaImage::from_fn(size.width, size.height, |x, y| {
        let (fx, fy) = (x as f32 + 0.5, y as f32 + 0.5);
        if !pose.contains(fx, fy) {
            return Rgba([0, 0, 0, 255]);
        }
        let shade = pose.shade(fx, fy);
        let [r, g, b] = tint.map(|channel| (channel as f32 * shade) as u8);
        Rgba([r, g, b, 255])
    })
}

/// Camera colors under the fitted model, quantized to 16 levels per channel.
pub fn reference_colors(frame: &RgbaImage, pose: &Pose) -> RgbaImage {
    RgbaImage::from_fn(frame.width(), frame.height(), |x, y| {
        if !pose.contains(x as f32 + 0.5, y as f32 + 0.5) {
            return Rgba([0, 0, 0, 255]);
        }
        let Rgba([r, g, b, _]) = *frame.get_pixel(x, y);
        Rgba([r & 0xF0, g & 0xF0, b & 0xF0, 255])
    })
}

/// Sobel gradients, non-maximum suppression and a two-level threshold.
///
/// Weak responses survive only next to a strong one.
pub fn canny_edges(frame: &RgbaImage) -> RgbaImage {
    let (width, height) = (frame.width() as usize, frame.height() as usize);
    let luma: Vec<f32> = frame
        .pixels()
        .map(|p| 0.299 * p[0] as f32 + 0.587 * p[1] as f32 + 0.114 * p[2] as f32)
        .collect();

    let mut magnitude = vec![0f32; width * height];
    let mut direction = vec![0u8; width * height];
    for y in 1..height.saturating_sub(1) {
        for x in 1..width.saturating_sub(1) {
            let at = |dx: isize, dy: isize| {
                luma[(y as isize + dy) as usize * width + (x as isize + dx) as usize]
            };
            let gx = at(1, -1) + 2.0 * at(1, 0) + at(1, 1)
                - at(-1, -1)
                - 2.0 * at(-1, 0)
                - at(-1, 1);
            let gy = at(-1, 1) + 2.0 * at(0, 1) + at(1, 1)
                - at(-1, -1)
                - 2.0 * at(0, -1)
                - at(1, -1);
            magnitude[y * width + x] = (gx * gx + gy * gy).sqrt();
            direction[y * width + x] = quantize_direction(gy.atan2(gx));
        }
    }

    let mut thinned = vec![0f32; width * height];
    for y in 1..height.saturating_sub(1) {
        for x in 1..width.saturating_sub(1) {
            let index = y * width + x;
            let value = magnitude[index];
            if value == 0.0 {
                continue;
            }
            let (dx, dy): (isize, isize) = match direction[index] {
                0 => (1, 0),
                1 => (1, 1),
                2 => (0, 1),
                _ => (-1, 1),
            };
            let ahead = magnitude[(y as isize + dy) as usize * width + (x as isize + dx) as usize];
            let behind = magnitude[(y as isize - dy) as usize * width + (x as isize - dx) as usize];
            if value >= ahead && value >= behind {
                thinned[index] = value;
            }
        }
    }

    let strong_near = |x: usize, y: usize| {
        (y.saturating_sub(1)..(y + 2).min(height)).any(|ny| {
            (x.saturating_sub(1)..(x + 2).min(width)).any(|nx| thinned[ny * width + nx] >= EDGE_HIGH)
        })
    };
    RgbaImage::from_fn(frame.width(), frame.height(), |x, y| {
        let (x, y) = (x as usize, y as usize);
        let value = thinned[y * width + x];
        if value >= EDGE_HIGH || (value >= EDGE_LOW && strong_near(x, y)) {
            EDGE
        } else {
            NO_EDGE
        }
    })
}

fn quantize_direction(angle: f32) -> u8 {
    let degrees = angle.to_degrees().rem_euclid(180.0);
    if !(22.5..157.5).contains(&degrees) {
        0
    } else if degrees < 67.5 {
        1
    } else if degrees < 112.5 {
        2
    } else {
        3
    }
}

fn is_edge(pixel: &Rgba<u8>) -> bool {
    pixel[0] > 0
}

/// Chamfer (3-4) distance to the nearest edge pixel, brighter further away.
pub fn distance_transform(edges: &RgbaImage) -> RgbaImage {
    const FAR: u32 = u32::MAX / 2;
    let (width, height) = (edges.width() as usize, edges.height() as usize);
    let mut distance: Vec<u32> = edges
        .pixels()
        .map(|pixel| if is_edge(pixel) { 0 } else { FAR })
        .collect();

    for y in 0..height {
        for x in 0..width {
            let index = y * width + x;
            let mut best = distance[index];
            if x > 0 {
                best = best.min(distance[index - 1] + 3);
            }
            if y > 0 {
                best = best.min(distance[index - width] + 3);
                if x > 0 {
                    best = best.min(distance[index - width - 1] + 4);
                }
                if x + 1 < width {
                    best = best.min(distance[index - width + 1] + 4);
                }
            }
            distance[index] = best;
        }
    }
    for y in (0..height).rev() {
        for x in (0..width).rev() {
            let index = y * width + x;
            let mut best = distance[index];
            if x + 1 < width {
                best = best.min(distance[index + 1] + 3);
            }
            if y + 1 < height {
                best = best.min(distance[index + width] + 3);
                if x + 1 < width {
                    best = best.min(distance[index + width + 1] + 4);
                }
                if x > 0 {
                    best = best.min(distance[index + width - 1] + 4);
                }
            }
            distance[index] = best;
        }
    }

    RgbaImage::from_fn(edges.width(), edges.height(), |x, y| {
        let steps = distance[y as usize * width + x as usize];
        let value = (steps.saturating_mul(DISTANCE_SCALE) / 3).min(255) as u8;
        Rgba([value, value, value, 255])
    })
}

/// Dimmed edge map with the fitted contour drawn on top.
pub fn contour_view(edges: &RgbaImage, pose: &Pose) -> RgbaImage {
    let mut canvas = OverlayCanvas::new(FrameSize::new(edges.width(), edges.height()));
    canvas.fill_rect(0, 0, edges.width(), edges.height(), Rgba([0, 0, 0, 255]));
    for (x, y, pixel) in edges.enumerate_pixels() {
        if is_edge(pixel) {
            canvas.put_pixel(x as i64, y as i64, Rgba([90, 90, 90, 255]));
        }
    }
    outline_pose(&mut canvas, pose, CONTOUR_COLOR);
    canvas.image().clone()
}

pub fn contour_support(edges: &RgbaImage, pose: &Pose) -> ContourStatistics {
    let corners = pose.corners();
    let mut sides = [0.0; 4];
    for (side, support) in sides.iter_mut().enumerate() {
        let (from, to) = (corners[side], corners[(side + 1) % 4]);
        let hits = (0..SAMPLES_PER_SIDE)
            .filter(|&sample| {
                let t = (sample as f32 + 0.5) / SAMPLES_PER_SIDE as f32;
                let x = (from.0 + (to.0 - from.0) * t).round() as i64;
                let y = (from.1 + (to.1 - from.1) * t).round() as i64;
                edge_within(edges, x, y, SUPPORT_RADIUS)
            })
            .count();
        *support = hits as f32 / SAMPLES_PER_SIDE as f32;
    }
    ContourStatistics { sides }
}

fn edge_within(edges: &RgbaImage, x: i64, y: i64, radius: i64) -> bool {
    (y - radius..=y + radius).any(|ny| {
        (x - radius..=x + radius).any(|nx| {
            nx >= 0
                && ny >= 0
                && (nx as u32) < edges.width()
                && (ny as u32) < edges.height()
                && is_edge(edges.get_pixel(nx as u32, ny as u32))
        })
    })
}

/// Shaded fill of the square, clipped to the canvas.
pub fn fill_pose(canvas: &mut OverlayCanvas, pose: &Pose, tint: [u8; 3], alpha: u8) {
    let reach = pose.half_extent * std::f32::consts::SQRT_2;
    let x0 = (pose.x - reach).floor() as i64;
    let x1 = (pose.x + reach).ceil() as i64;
    let y0 = (pose.y - reach).floor() as i64;
    let y1 = (pose.y + reach).ceil() as i64;
    for y in y0..=y1 {
        for x in x0..=x1 {
            let (fx, fy) = (x as f32 + 0.5, y as f32 + 0.5);
            if pose.contains(fx, fy) {
                let shade = pose.shade(fx, fy);
                let [r, g, b] = tint.map(|channel| (channel as f32 * shade) as u8);
                canvas.put_pixel(x, y, Rgba([r, g, b, alpha]));
            }
        }
    }
}

pub fn outline_pose(canvas: &mut OverlayCanvas, pose: &Pose, color: Rgba<u8>) {
    let corners = pose
        .corners()
        .map(|(x, y)| (x.round() as i64, y.round() as i64));
    for side in 0..4 {
        canvas.draw_line(corners[side], corners[(side + 1) % 4], color);
    }
}

/// Local x (red) and y (blue) axes from the pose center.
pub fn draw_axes(canvas: &mut OverlayCanvas, pose: &Pose) {
    let center = pose.center();
    let reach = pose.half_extent * 1.5;
    for ((local_x, local_y), color) in [
        ((reach, 0.0), Rgba([255, 60, 60, 255])),
        ((0.0, reach), Rgba([60, 120, 255, 255])),
    ] {
        let (x, y) = pose.to_frame(local_x, local_y);
        canvas.draw_line(center, (x.round() as i64, y.round() as i64), color);
    }
}
