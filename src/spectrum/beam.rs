use super::frame::{AnalysisMethod, SpectrumPoint};

/// Frame duration the beam energy is calibrated against (60 Hz).
pub const REFERENCE_FRAME_SECONDS: f32 = 0.016;
/// Lower bound on segment length, keeps coincident points finite.
pub const MIN_SEGMENT_LENGTH: f32 = 1e-12;

const REFERENCE_ENERGY: f32 = 400.0;
const NON_UNIFORM_AREA_SCALE: f32 = 300.0;

/// Energy deposited along one segment of the main trace.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BeamSegment {
    pub intensity: f32,
    /// Seconds the beam spends on the segment.
    pub dwell_time: f32,
}

/// Per-frame inputs of the beam model.
#[derive(Clone, Copy, Debug)]
pub struct BeamSettings {
    pub method: AnalysisMethod,
    /// Configured baseline beam energy.
    pub beam_energy: f32,
    pub beam_multiplier: f32,
    pub panel_width: f32,
    pub window_height: f32,
    pub sample_rate: f32,
    pub delta_time: f32,
}

impl BeamSettings {
    /// Beam energy normalised over panel area, multiplier and frame time.
    pub fn frame_energy(&self) -> f32 {
        let (reference, height_factor) = match self.method {
            AnalysisMethod::NonUniform => {
                (REFERENCE_ENERGY * NON_UNIFORM_AREA_SCALE, self.window_height)
            }
            AnalysisMethod::Uniform => (REFERENCE_ENERGY, 1.0),
        };

        let energy = self.beam_energy / reference * (self.panel_width * height_factor);
        energy * self.beam_multiplier * self.delta_time / REFERENCE_FRAME_SECONDS
    }
}

/// Simulated CRT beam energy for the persistence renderer.
///
/// Output buffers are parallel: one intensity and one dwell time per segment.
#[derive(Debug, Default)]
pub struct BeamEnergyModel {
    intensities: Vec<f32>,
    dwell_times: Vec<f32>,
}

impl BeamEnergyModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.intensities.clear();
        self.dwell_times.clear();
    }

    pub fn intensities(&self) -> &[f32] {
        &self.intensities
    }

    pub fn dwell_times(&self) -> &[f32] {
        &self.dwell_times
    }

    pub fn len(&self) -> usize {
        self.intensities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intensities.is_empty()
    }

    pub fn segments(&self) -> impl Iterator<Item = BeamSegment> + '_ {
        self.intensities
            .iter()
            .zip(&self.dwell_times)
            .map(|(&intensity, &dwell_time)| BeamSegment {
                intensity,
                dwell_time,
            })
    }

    /// Fills one segment per consecutive point pair.
    ///
    /// The two analysis methods use different dwell approximations: inverse
    /// path length for non-uniform bins, horizontal spread for uniform bins.
    pub fn compute(&mut self, points: &[SpectrumPoint], settings: &BeamSettings) {
        self.clear();
        if points.len() < 2 {
            return;
        }

        let beam_energy = settings.frame_energy();
        let delta_t = 1.0 / settings.sample_rate;

        for pair in points.windows(2) {
            let dx = pair[1].x - pair[0].x;
            let dy = pair[1].y - pair[0].y;
            let seg_len = (dx * dx + dy * dy).sqrt().max(MIN_SEGMENT_LENGTH);

            let intensity = match settings.method {
                AnalysisMethod::NonUniform => beam_energy * (delta_t / seg_len) * 2.0,
                AnalysisMethod::Uniform => beam_energy * delta_t * dx.abs().sqrt() / 2.0,
            };

            self.intensities.push(intensity);
            self.dwell_times.push(delta_t);
        }
    }
}
