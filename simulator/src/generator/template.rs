use rand::Rng;
use std::f64::consts::PI;

/// Slow sinusoidal drift around `level` with uniform jitter, standing in for
/// a well-behaved sensor.
pub fn baseline<R: Rng>(rng: &mut R, length: usize, level: f64, noise: f64) -> Vec<f64> {
    let swing = noise * 0.5;
    (0..length)
        .map(|i| {
            let phase = i as f64 / length.max(1) as f64 * 2.0 * PI;
            let jitter = if noise > 0.0 {
                rng.gen_range(-noise..noise)
            } else {
                0.0
            };
            level + phase.sin() * swing + jitter
        })
        .collect()
}
