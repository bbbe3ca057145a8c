// src/dsp/filter.rs
//
// Two-pole lowpass (RBJ cookbook biquad, Q = 1).

use std::f64::consts::PI;

const Q: f64 = 1.0;

/// Biquad lowpass in transposed direct form II.
///
/// Coefficients are recomputed at most once per rendered block, so cutoff
/// modulation is block-rate.
#[derive(Debug, Clone, Default)]
pub struct LowpassFilter {
    // b0, b1, b2, a1, a2, all divided by a0
    coefficients: [f64; 5],

    // Filter state
    y1: f64,
    y2: f64,

    cutoff: f64,
}

impl LowpassFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update coefficients for `cutoff` Hz. Skipped when the cutoff has not
    /// changed since the last call.
    pub fn set_cutoff(&mut self, cutoff: f64, sample_rate: f64) {
        // Keep the pole pair inside the unit circle.
        let cutoff = cutoff.clamp(10.0, sample_rate * 0.49);
        if cutoff == self.cutoff {
            return;
        }
        self.cutoff = cutoff;

        let omega = 2.0 * PI * cutoff / sample_rate;
        let (sin, cos) = omega.sin_cos();
        let alpha = sin / (2.0 * Q);

        let b0 = (1.0 - cos) / 2.0;
        let b1 = 1.0 - cos;
        let b2 = b0;
        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos;
        let a2 = 1.0 - alpha;

        self.coefficients = [b0 / a0, b1 / a0, b2 / a0, a1 / a0, a2 / a0];
    }

    #[inline]
    fn process_sample(&mut self, input: f64) -> f64 {
        let [b0, b1, b2, a1, a2] = self.coefficients;
        let out = b0 * input + self.y1;
        self.y1 = b1 * input - a1 * out + self.y2;
        self.y2 = b2 * input - a2 * out;
        out
    }

    /// Filter `buf` in place.
    pub fn process(&mut self, buf: &mut [f32]) {
        for sample in buf.iter_mut() {
            *sample = self.process_sample(*sample as f64) as f32;
        }
    }

    pub fn reset(&mut self) {
        self.y1 = 0.0;
        self.y2 = 0.0;
    }
}
