use crate::spectrum::frame::SpectrumPoint;

use super::surface::{mix, to_rgba8, PhosphorImage, Rgba};

/// Everything a persistence renderer needs for one frame.
#[derive(Clone, Copy, Debug)]
pub struct SplineRequest<'a> {
    pub points: &'a [SpectrumPoint],
    /// One per segment, parallel to `dwell_times`.
    pub intensities: &'a [f32],
    pub dwell_times: &'a [f32],
    pub width: u32,
    pub height: u32,
    pub delta_time: f32,
    pub beam_width: f32,
    pub background: Rgba,
    pub foreground: Rgba,
}

/// Accumulates beam energy into a drawable image.
///
/// A context owns the renderer-side allocation and releases it on drop.
pub trait PhosphorRenderer {
    type Context;

    fn create_context(&mut self, label: &'static str) -> Self::Context;

    fn render_splines<'c>(
        &mut self,
        context: &'c mut Self::Context,
        request: &SplineRequest<'_>,
    ) -> Option<PhosphorImage<'c>>;
}

/// Holds at most one live renderer context.
///
/// Acquired lazily while persistence is enabled, released as soon as it is
/// disabled or invalidated.
#[derive(Debug)]
pub struct PhosphorSlot<C> {
    label: &'static str,
    context: Option<C>,
}

impl<C> PhosphorSlot<C> {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            context: None,
        }
    }

    pub fn is_live(&self) -> bool {
        self.context.is_some()
    }

    /// Creates or drops the context to match `enabled`.
    pub fn sync<R>(&mut self, enabled: bool, renderer: &mut R) -> Option<&mut C>
    where
        R: PhosphorRenderer<Context = C>,
    {
        if !enabled {
            self.release();
            return None;
        }
        if self.context.is_none() {
            log::debug!("Creating phosphor context '{}'", self.label);
            self.context = Some(renderer.create_context(self.label));
        }
        self.context.as_mut()
    }

    /// Drops the context; the next enabled frame recreates it.
    pub fn invalidate(&mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.context.take().is_some() {
            log::debug!("Released phosphor context '{}'", self.label);
        }
    }
}

/// Software persistence renderer.
#[derive(Clone, Debug)]
pub struct CpuPhosphor {
    /// Seconds for stored energy to fall to 1/e.
    pub decay_time: f32,
    /// Scale from beam intensity to displayed energy.
    pub exposure: f32,
}

impl Default for CpuPhosphor {
    fn default() -> Self {
        Self {
            decay_time: 0.15,
            exposure: 100.0,
        }
    }
}

#[derive(Debug, Default)]
pub struct CpuPhosphorContext {
    width: u32,
    height: u32,
    energy: Vec<f32>,
    rgba: Vec<u8>,
}

impl CpuPhosphorContext {
    fn resize(&mut self, width: u32, height: u32) {
        if self.width == width && self.height == height {
            return;
        }
        let len = width as usize * height as usize;
        self.width = width;
        self.height = height;
        self.energy.clear();
        self.energy.resize(len, 0.0);
        self.rgba.clear();
        self.rgba.resize(len * 4, 0);
    }

    pub fn energy(&self) -> &[f32] {
        &self.energy
    }

    fn deposit(&mut self, from: SpectrumPoint, to: SpectrumPoint, amount: f32) {
        let Some((from, to)) = clip_segment(from, to, self.width as f32, self.height as f32) else {
            return;
        };
        let dx = to.x - from.x;
        let dy = to.y - from.y;
        let steps = (dx.abs().max(dy.abs()).ceil() as usize).max(1);

        for step in 0..steps {
            let t = step as f32 / steps as f32;
            let x = from.x + dx * t;
            let y = from.y + dy * t;
            if !(x >= 0.0 && y >= 0.0 && x < self.width as f32 && y < self.height as f32) {
                continue;
            }
            let col = x as usize;
            let row = self.height as usize - 1 - y as usize;
            self.energy[row * self.width as usize + col] += amount;
        }
    }
}

/// Liang-Barsky clip of a segment to `[0, width] x [0, height]`.
///
/// Runs in f64: unclamped traces can sit millions of pixels off the panel.
fn clip_segment(
    from: SpectrumPoint,
    to: SpectrumPoint,
    width: f32,
    height: f32,
) -> Option<(SpectrumPoint, SpectrumPoint)> {
    if !(from.x.is_finite() && from.y.is_finite() && to.x.is_finite() && to.y.is_finite()) {
        return None;
    }
    let (x0, y0) = (from.x as f64, from.y as f64);
    let (dx, dy) = (to.x as f64 - x0, to.y as f64 - y0);
    let (w, h) = (width as f64, height as f64);
    let (mut t0, mut t1) = (0.0f64, 1.0f64);

    for (p, q) in [(-dx, x0), (dx, w - x0), (-dy, y0), (dy, h - y0)] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }

    let at = |t: f64| {
        SpectrumPoint::new(
            (x0 + dx * t).clamp(0.0, w) as f32,
            (y0 + dy * t).clamp(0.0, h) as f32,
        )
    };
    Some((at(t0), at(t1)))
}

impl PhosphorRenderer for CpuPhosphor {
    type Context = CpuPhosphorContext;

    fn create_context(&mut self, _label: &'static str) -> CpuPhosphorContext {
        CpuPhosphorContext::default()
    }

    fn render_splines<'c>(
        &mut self,
        context: &'c mut CpuPhosphorContext,
        request: &SplineRequest<'_>,
    ) -> Option<PhosphorImage<'c>> {
        if request.width == 0 || request.height == 0 {
            return None;
        }
        context.resize(request.width, request.height);

        let decay = if self.decay_time > 0.0 {
            (-request.delta_time / self.decay_time).exp()
        } else {
            0.0
        };
        for e in context.energy.iter_mut() {
            *e *= decay;
        }

        // Earlier segments were swept earlier and have already faded a little.
        let sweep: f32 = request.dwell_times.iter().sum();
        let mut elapsed = 0.0f32;
        let segments = request
            .points
            .windows(2)
            .zip(request.intensities.iter().zip(request.dwell_times));
        for (pair, (&intensity, &dwell)) in segments {
            elapsed += dwell;
            let age = sweep - elapsed;
            let fade = if self.decay_time > 0.0 {
                (-age / self.decay_time).exp()
            } else {
                1.0
            };
            let amount = intensity * self.exposure * request.beam_width * fade;
            if amount.is_finite() && amount > 0.0 {
                context.deposit(pair[0], pair[1], amount);
            }
        }

        for (pixel, &e) in context.rgba.chunks_exact_mut(4).zip(&context.energy) {
            let level = 1.0 - (-e).exp();
            pixel.copy_from_slice(&to_rgba8(mix(request.foreground, request.background, level)));
        }

        Some(PhosphorImage {
            width: context.width,
            height: context.height,
            rgba: &context.rgba,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct Counting {
        created: Rc<Cell<usize>>,
        dropped: Rc<Cell<usize>>,
    }

    struct CountingContext {
        dropped: Rc<Cell<usize>>,
    }

    impl Drop for CountingContext {
        fn drop(&mut self) {
            self.dropped.set(self.dropped.get() + 1);
        }
    }

    impl PhosphorRenderer for Counting {
        type Context = CountingContext;

        fn create_context(&mut self, _label: &'static str) -> CountingContext {
            self.created.set(self.created.get() + 1);
            CountingContext {
                dropped: self.dropped.clone(),
            }
        }

        fn render_splines<'c>(
            &mut self,
            _context: &'c mut CountingContext,
            _request: &SplineRequest<'_>,
        ) -> Option<PhosphorImage<'c>> {
            None
        }
    }

    fn counting() -> Counting {
        Counting {
            created: Rc::new(Cell::new(0)),
            dropped: Rc::new(Cell::new(0)),
        }
    }

    fn request<'a>(points: &'a [SpectrumPoint], intensities: &'a [f32], dwell: &'a [f32]) -> SplineRequest<'a> {
        SplineRequest {
            points,
            intensities,
            dwell_times: dwell,
            width: 16,
            height: 8,
            delta_time: 0.016,
            beam_width: 1.0,
            background: [0.0, 0.0, 0.0, 1.0],
            foreground: [0.0, 1.0, 0.0, 1.0],
        }
    }

    #[test]
    fn slot_creates_lazily_and_once() {
        let mut renderer = counting();
        let mut slot = PhosphorSlot::new("test");
        assert!(!slot.is_live());

        assert!(slot.sync(false, &mut renderer).is_none());
        assert_eq!(renderer.created.get(), 0);

        assert!(slot.sync(true, &mut renderer).is_some());
        assert!(slot.sync(true, &mut renderer).is_some());
        assert_eq!(renderer.created.get(), 1);
        assert!(slot.is_live());
    }

    #[test]
    fn slot_releases_on_disable_and_invalidate() {
        let mut renderer = counting();
        let mut slot = PhosphorSlot::new("test");

        slot.sync(true, &mut renderer);
        slot.sync(false, &mut renderer);
        assert_eq!(renderer.dropped.get(), 1);
        assert!(!slot.is_live());

        slot.sync(true, &mut renderer);
        slot.invalidate();
        assert_eq!(renderer.dropped.get(), 2);
        // Invalidating an empty slot is a no-op.
        slot.invalidate();
        assert_eq!(renderer.dropped.get(), 2);

        slot.sync(true, &mut renderer);
        assert_eq!(renderer.created.get(), 3);
        assert_eq!(renderer.created.get() - renderer.dropped.get(), 1);
    }

    #[test]
    fn cpu_renderer_lights_the_trace() {
        let mut renderer = CpuPhosphor::default();
        let mut context = renderer.create_context("cpu");
        let points = [SpectrumPoint::new(0.0, 4.0), SpectrumPoint::new(15.0, 4.0)];
        let image = renderer
            .render_splines(&mut context, &request(&points, &[0.01], &[1.0 / 48000.0]))
            .unwrap();
        assert_eq!((image.width, image.height), (16, 8));
        assert_eq!(image.rgba.len(), 16 * 8 * 4);

        // y = 4 lands on row 8 - 1 - 4 = 3.
        let lit = &image.rgba[(3 * 16 + 5) * 4..(3 * 16 + 5) * 4 + 4];
        assert!(lit[1] > 0);
        let dark = &image.rgba[(7 * 16 + 5) * 4..(7 * 16 + 5) * 4 + 4];
        assert_eq!(dark[1], 0);
    }

    #[test]
    fn cpu_renderer_decays_between_frames() {
        let mut renderer = CpuPhosphor::default();
        let mut context = renderer.create_context("cpu");
        let points = [SpectrumPoint::new(0.0, 2.0), SpectrumPoint::new(10.0, 2.0)];
        renderer.render_splines(&mut context, &request(&points, &[0.01], &[1e-5]));
        let lit: f32 = context.energy().iter().sum();

        renderer.render_splines(&mut context, &request(&[], &[], &[]));
        let faded: f32 = context.energy().iter().sum();
        assert!(faded < lit && faded > 0.0);
    }

    #[test]
    fn segments_are_clipped_to_the_panel() {
        let (a, b) = clip_segment(
            SpectrumPoint::new(4.0, -1.0e6),
            SpectrumPoint::new(4.0, 1.0e6),
            16.0,
            8.0,
        )
        .unwrap();
        assert_eq!((a.x, b.x), (4.0, 4.0));
        assert!((a.y - 0.0).abs() < 1e-3 && (b.y - 8.0).abs() < 1e-3, "{a:?} {b:?}");

        let (a, b) = clip_segment(SpectrumPoint::new(2.0, 2.0), SpectrumPoint::new(6.0, 5.0), 16.0, 8.0).unwrap();
        assert_eq!((a, b), (SpectrumPoint::new(2.0, 2.0), SpectrumPoint::new(6.0, 5.0)));

        assert!(clip_segment(SpectrumPoint::new(-5.0, 1.0), SpectrumPoint::new(-1.0, 100.0), 16.0, 8.0).is_none());
        assert!(clip_segment(SpectrumPoint::new(0.0, 20.0), SpectrumPoint::new(15.0, 9.0), 16.0, 8.0).is_none());
        assert!(clip_segment(SpectrumPoint::new(f32::NAN, 1.0), SpectrumPoint::new(3.0, 1.0), 16.0, 8.0).is_none());
    }

    #[test]
    fn far_off_panel_segment_lights_only_its_visible_column() {
        let mut renderer = CpuPhosphor::default();
        let mut context = renderer.create_context("cpu");
        let points = [SpectrumPoint::new(5.5, -5.0e7), SpectrumPoint::new(5.5, 5.0e7)];
        renderer.render_splines(&mut context, &request(&points, &[0.01], &[1e-5]));

        let energy = context.energy();
        for row in 0..8 {
            assert!(energy[row * 16 + 5] > 0.0, "row {row}");
            assert_eq!(energy[row * 16 + 4], 0.0);
        }
    }

    #[test]
    fn cpu_renderer_ignores_off_panel_and_degenerate_input() {
        let mut renderer = CpuPhosphor::default();
        let mut context = renderer.create_context("cpu");
        let points = [SpectrumPoint::new(-50.0, -200.0), SpectrumPoint::new(-10.0, -300.0)];
        renderer.render_splines(&mut context, &request(&points, &[f32::INFINITY], &[1e-5]));
        assert!(context.energy().iter().all(|&e| e == 0.0));

        let mut empty = request(&points, &[0.1], &[1e-5]);
        empty.width = 0;
        assert!(renderer.render_splines(&mut context, &empty).is_none());
    }
}
