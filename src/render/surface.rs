use crate::spectrum::frame::SpectrumPoint;

/// Linear RGBA colour, components in 0.0..=1.0.
pub type Rgba = [f32; 4];

/// Mixes `fg` over `bg` with weight `alpha`, per component.
pub fn mix(fg: Rgba, bg: Rgba, alpha: f32) -> Rgba {
    let mut out = [0.0; 4];
    for i in 0..4 {
        out[i] = fg[i] * alpha + bg[i] * (1.0 - alpha);
    }
    out
}

pub fn to_rgba8(color: Rgba) -> [u8; 4] {
    color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
}

/// Theme colours the visualizer paints with.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Palette {
    pub background: Rgba,
    pub spectrum: Rgba,
    pub grid: Rgba,
    pub text: Rgba,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            background: [0.05, 0.06, 0.07, 1.0],
            spectrum: [0.35, 0.95, 0.55, 1.0],
            grid: [0.22, 0.25, 0.28, 1.0],
            text: [0.85, 0.88, 0.9, 1.0],
        }
    }
}

/// Borrowed RGBA8 image produced by a persistence renderer, rows top-down.
#[derive(Clone, Copy, Debug)]
pub struct PhosphorImage<'a> {
    pub width: u32,
    pub height: u32,
    pub rgba: &'a [u8],
}

/// Drawing primitives used by the visualizer.
///
/// Coordinates are panel-local pixels with y pointing up; the surface clips.
pub trait Surface {
    /// Selects the panel that subsequent calls draw into.
    fn set_viewport(&mut self, x: i32, width: u32, height: u32);

    fn draw_line(&mut self, from: SpectrumPoint, to: SpectrumPoint, color: Rgba, thickness: f32);

    fn draw_polyline(&mut self, points: &[SpectrumPoint], color: Rgba, thickness: f32) {
        for pair in points.windows(2) {
            self.draw_line(pair[0], pair[1], color, thickness);
        }
    }

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Rgba);

    /// `y` is the text baseline.
    fn draw_text(&mut self, text: &str, x: f32, y: f32, size: f32, color: Rgba);

    fn blit(&mut self, image: &PhosphorImage<'_>);
}
