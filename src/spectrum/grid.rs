use std::iter;

/// Labelled grid lines drawn above the plot.
pub const GRID_LABELS: [(f32, &str); 3] = [(100.0, "100 Hz"), (1000.0, "1 kHz"), (10000.0, "10 kHz")];

/// Vertical grid line frequencies: 1..9 per decade from 10 Hz, then decade
/// lines from 10 kHz up to `max_freq`.
///
/// Some frequencies repeat; callers drop those outside the display range.
pub fn grid_frequencies(max_freq: f32) -> impl Iterator<Item = f32> {
    let first_decade = (1..10).map(|mult| 10.0 * mult as f32);
    let decades = (2..=5).flat_map(|decade| {
        let base = 10.0f32.powi(decade);
        (1..10).map(move |mult| base * mult as f32)
    });
    let top = iter::successors(Some(10000.0f32), |f| Some(f * 10.0)).take_while(move |&f| f <= max_freq);

    first_decade.chain(iter::once(100.0)).chain(decades).chain(top)
}
