// Buffer mixing helpers.

use super::Envelope;

/// Decibels to linear gain.
#[inline]
pub fn db_to_gain(db: f64) -> f64 {
    10.0_f64.powf(db / 20.0)
}

/// Add `src[pos..]` into `dst`, scaled by `gain` and the envelope, and
/// return the new read position in `src`.
///
/// Stops at whichever runs out first; the envelope advances one step per
/// mixed sample.
#[inline]
pub fn sum(dst: &mut [f32], src: &[f32], pos: usize, gain: f64, env: &mut Envelope) -> usize {
    let remaining = src.get(pos..).unwrap_or(&[]);
    let n = remaining.len().min(dst.len());

    for (out, sample) in dst[..n].iter_mut().zip(remaining) {
        *out += (*sample as f64 * gain * env.value()) as f32;
    }
    pos + n
}

/// Add `src` into `dst` with a fixed gain.
#[inline]
pub fn mix_into(dst: &mut [f32], src: &[f32], gain: f32) {
    for (out, sample) in dst.iter_mut().zip(src) {
        *out += sample * gain;
    }
}
