use image::{Rgba, RgbaImage};

use crate::types::FrameSize;

/// CPU-side RGBA canvas for 2-D overlays (statistics, detection markers).
///
/// The device uploads the raw pixels and alpha-composites them over the
/// current target when asked to draw the canvas.
#[derive(Clone, Debug)]
pub struct OverlayCanvas {
    image: RgbaImage,
}

impl OverlayCanvas {
    pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

    pub fn new(size: FrameSize) -> Self {
        Self {
            image: RgbaImage::from_pixel(size.width, size.height, Self::TRANSPARENT),
        }
    }

    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.image.width(), self.image.height())
    }

    pub fn resize(&mut self, size: FrameSize) {
        if self.size() != size {
            self.image = RgbaImage::from_pixel(size.width, size.height, Self::TRANSPARENT);
        }
    }

    /// Resets every pixel to fully transparent.
    pub fn clear(&mut self) {
        for pixel in self.image.pixels_mut() {
            *pixel = Self::TRANSPARENT;
        }
    }

    pub fn is_blank(&self) -> bool {
        self.image.pixels().all(|pixel| pixel[3] == 0)
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba<u8>> {
        (x < self.image.width() && y < self.image.height()).then(|| *self.image.get_pixel(x, y))
    }

    pub fn put_pixel(&mut self, x: i64, y: i64, color: Rgba<u8>) {
        if x < 0 || y < 0 {
            return;
        }
        let (x, y) = (x as u32, y as u32);
        if x < self.image.width() && y < self.image.height() {
            self.image.put_pixel(x, y, color);
        }
    }

    /// Fills the rectangle clipped to the canvas bounds.
    pub fn fill_rect(&mut self, x: i64, y: i64, width: u32, height: u32, color: Rgba<u8>) {
        let x0 = x.max(0);
        let y0 = y.max(0);
        let x1 = (x + width as i64).min(self.image.width() as i64);
        let y1 = (y + height as i64).min(self.image.height() as i64);
        for py in y0..y1 {
            for px in x0..x1 {
                self.image.put_pixel(px as u32, py as u32, color);
            }
        }
    }

    /// Bresenham line, clipped per pixel.
    pub fn draw_line(&mut self, from: (i64, i64), to: (i64, i64), color: Rgba<u8>) {
        let (mut x, mut y) = from;
        let dx = (to.0 - x).abs();
        let dy = -(to.1 - y).abs();
        let sx = if x < to.0 { 1 } else { -1 };
        let sy = if y < to.1 { 1 } else { -1 };
        let mut err = dx + dy;
        loop {
            self.put_pixel(x, y, color);
            if x == to.0 && y == to.1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    pub fn draw_cross(&mut self, center: (i64, i64), arm: i64, color: Rgba<u8>) {
        self.draw_line((center.0 - arm, center.1), (center.0 + arm, center.1), color);
        self.draw_line((center.0, center.1 - arm), (center.0, center.1 + arm), color);
    }

    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }
}
