use crate::spectrum::frame::SpectrumPoint;

use super::surface::{to_rgba8, PhosphorImage, Rgba, Surface};
use super::text::{ClipRect, TextOverlay};

/// Software RGBA8 frame, rows top-down.
///
/// Panels are addressed through a viewport; panel coordinates have y up and
/// everything outside the viewport is clipped.
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    viewport_x: i32,
    viewport_width: u32,
    viewport_height: u32,
    text: Option<TextOverlay>,
}

impl Canvas {
    pub fn new(width: u32, height: u32, text: Option<TextOverlay>) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
            viewport_x: 0,
            viewport_width: width,
            viewport_height: height,
            text,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn clear(&mut self, color: Rgba) {
        let rgba = to_rgba8(color);
        for pixel in self.pixels.chunks_exact_mut(4) {
            pixel.copy_from_slice(&rgba);
        }
    }

    /// Pixel at panel-local column `x`, top-down row `row`.
    pub fn pixel(&self, x: i32, row: i32) -> Option<[u8; 4]> {
        let idx = self.index(self.viewport_x + x, row)?;
        let mut out = [0; 4];
        out.copy_from_slice(&self.pixels[idx..idx + 4]);
        Some(out)
    }

    /// Window pixels covered by the current viewport.
    fn clip(&self) -> ClipRect {
        ClipRect {
            left: self.viewport_x.max(0),
            top: 0,
            right: (self.viewport_x + self.viewport_width as i32).min(self.width as i32),
            bottom: self.viewport_height.min(self.height) as i32,
        }
    }

    /// Byte offset of a window pixel, `None` outside the current viewport.
    fn index(&self, x: i32, row: i32) -> Option<usize> {
        let clip = self.clip();
        if x < clip.left || x >= clip.right || row < clip.top || row >= clip.bottom {
            return None;
        }
        Some((row as usize * self.width as usize + x as usize) * 4)
    }

    fn blend(&mut self, x: i32, row: i32, color: Rgba, coverage: f32) {
        let Some(idx) = self.index(x, row) else {
            return;
        };
        let a = (color[3] * coverage).clamp(0.0, 1.0);
        let src = to_rgba8(color);
        for c in 0..3 {
            let dst = self.pixels[idx + c] as f32;
            self.pixels[idx + c] = (src[c] as f32 * a + dst * (1.0 - a)).round() as u8;
        }
        self.pixels[idx + 3] = 255;
    }

    fn to_row(&self, y: f32) -> f32 {
        self.viewport_height as f32 - y
    }
}

impl Surface for Canvas {
    fn set_viewport(&mut self, x: i32, width: u32, height: u32) {
        self.viewport_x = x;
        self.viewport_width = width;
        self.viewport_height = height;
    }

    fn draw_line(&mut self, from: SpectrumPoint, to: SpectrumPoint, color: Rgba, thickness: f32) {
        if !(from.x.is_finite() && from.y.is_finite() && to.x.is_finite() && to.y.is_finite()) {
            return;
        }

        let (ax, ay) = (self.viewport_x as f32 + from.x, self.to_row(from.y));
        let (bx, by) = (self.viewport_x as f32 + to.x, self.to_row(to.y));
        let half = thickness.max(1.0) * 0.5;
        let reach = half + 1.0;

        let min_x = (ax.min(bx) - reach).floor().max(self.viewport_x as f32) as i32;
        let max_x = (ax.max(bx) + reach)
            .ceil()
            .min((self.viewport_x + self.viewport_width as i32) as f32) as i32;
        let min_row = (ay.min(by) - reach).floor().max(0.0) as i32;
        let max_row = (ay.max(by) + reach).ceil().min(self.viewport_height as f32) as i32;

        let (dx, dy) = (bx - ax, by - ay);
        let len_sq = dx * dx + dy * dy;

        for row in min_row..max_row {
            for x in min_x..max_x {
                let (px, py) = (x as f32 + 0.5, row as f32 + 0.5);
                let t = if len_sq > 0.0 {
                    (((px - ax) * dx + (py - ay) * dy) / len_sq).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                let (cx, cy) = (ax + dx * t, ay + dy * t);
                let dist = ((px - cx).powi(2) + (py - cy).powi(2)).sqrt();
                let coverage = (half + 0.5 - dist).clamp(0.0, 1.0);
                if coverage > 0.0 {
                    self.blend(x, row, color, coverage);
                }
            }
        }
    }

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Rgba) {
        let left = (self.viewport_x as f32 + x).round() as i32;
        let right = (self.viewport_x as f32 + x + width).round() as i32;
        let top = self.to_row(y + height).round() as i32;
        let bottom = self.to_row(y).round() as i32;
        for row in top.max(0)..bottom {
            for px in left..right {
                self.blend(px, row, color, 1.0);
            }
        }
    }

    fn draw_text(&mut self, text: &str, x: f32, y: f32, size: f32, color: Rgba) {
        let Some(overlay) = self.text.as_ref() else {
            return;
        };
        let baseline = self.to_row(y).round() as i32;
        let clip = self.clip();
        overlay.composite(
            &mut self.pixels,
            self.width,
            text,
            self.viewport_x + x.round() as i32,
            baseline,
            size,
            to_rgba8(color),
            clip,
        );
    }

    fn blit(&mut self, image: &PhosphorImage<'_>) {
        let rows = image.height.min(self.viewport_height) as i32;
        let cols = image.width.min(self.viewport_width) as i32;
        for row in 0..rows {
            for col in 0..cols {
                let Some(dst) = self.index(self.viewport_x + col, row) else {
                    continue;
                };
                let src = (row as usize * image.width as usize + col as usize) * 4;
                self.pixels[dst..dst + 4].copy_from_slice(&image.rgba[src..src + 4]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Rgba = [1.0, 1.0, 1.0, 1.0];
    const BLACK: Rgba = [0.0, 0.0, 0.0, 1.0];

    fn canvas() -> Canvas {
        let mut canvas = Canvas::new(40, 20, None);
        canvas.clear(BLACK);
        canvas
    }

    #[test]
    fn horizontal_line_flips_y() {
        let mut c = canvas();
        c.set_viewport(0, 40, 20);
        c.draw_line(SpectrumPoint::new(2.0, 15.5), SpectrumPoint::new(30.0, 15.5), WHITE, 1.0);
        // Panel y 15.5 is row 20 - 15.5 = 4.5, i.e. row 4.
        assert_eq!(c.pixel(10, 4).unwrap()[0], 255);
        assert_eq!(c.pixel(10, 15).unwrap()[0], 0);
    }

    #[test]
    fn viewport_clips_neighbouring_panels() {
        let mut c = canvas();
        c.set_viewport(20, 20, 20);
        c.draw_line(SpectrumPoint::new(-30.0, 10.0), SpectrumPoint::new(50.0, 10.0), WHITE, 2.0);

        c.set_viewport(0, 40, 20);
        assert_eq!(c.pixel(10, 10).unwrap()[0], 0, "left panel untouched");
        assert!(c.pixel(25, 10).unwrap()[0] > 0);
    }

    #[test]
    fn non_finite_points_are_skipped() {
        let mut c = canvas();
        c.draw_line(SpectrumPoint::new(f32::NAN, 0.0), SpectrumPoint::new(5.0, 5.0), WHITE, 2.0);
        assert!(c.pixels().chunks_exact(4).all(|p| p[0] == 0));
    }

    #[test]
    fn fill_rect_and_blit() {
        let mut c = canvas();
        c.set_viewport(0, 40, 20);
        c.fill_rect(0.0, 0.0, 4.0, 2.0, WHITE);
        assert_eq!(c.pixel(1, 19).unwrap()[0], 255);
        assert_eq!(c.pixel(1, 17).unwrap()[0], 0);

        let image = vec![200u8; 2 * 2 * 4];
        c.set_viewport(10, 30, 20);
        c.blit(&PhosphorImage {
            width: 2,
            height: 2,
            rgba: &image,
        });
        assert_eq!(c.pixel(1, 1).unwrap(), [200; 4]);
        assert_eq!(c.pixel(2, 1).unwrap()[0], 0);
    }

    #[test]
    fn text_clip_follows_viewport() {
        let mut c = canvas();
        c.set_viewport(20, 20, 20);
        assert_eq!(
            c.clip(),
            ClipRect {
                left: 20,
                top: 0,
                right: 40,
                bottom: 20
            }
        );

        // A panel hanging off either side is cut at the window edge.
        c.set_viewport(-5, 100, 30);
        assert_eq!(
            c.clip(),
            ClipRect {
                left: 0,
                top: 0,
                right: 40,
                bottom: 20
            }
        );
    }

    #[test]
    fn text_without_font_is_ignored() {
        let mut c = canvas();
        c.draw_text("440.00 Hz", 10.0, 10.0, 14.0, WHITE);
        assert!(c.pixels().chunks_exact(4).all(|p| p[0] == 0));
    }
}
