// Basic oscillators.

use std::f64::consts::{PI, TAU};
use std::fmt;
use std::str::FromStr;

/// Oscillator waveform, selectable per oscillator through `osc1.wave` and
/// `osc2.wave`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Waveform {
    Sine,
    #[default]
    Saw,
    Square,
    Off,
}

impl Waveform {
    /// Sample the waveform at `phase` (radians, in `[0, 2π)`).
    #[inline]
    pub fn sample(self, phase: f64) -> f64 {
        match self {
            Waveform::Sine => phase.sin(),
            Waveform::Saw => 2.0 * phase / TAU - 1.0,
            Waveform::Square => {
                if phase <= PI {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Off => 0.0,
        }
    }
}

impl FromStr for Waveform {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sine" => Ok(Waveform::Sine),
            "saw" => Ok(Waveform::Saw),
            "square" => Ok(Waveform::Square),
            "off" => Ok(Waveform::Off),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Waveform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Waveform::Sine => "sine",
            Waveform::Saw => "saw",
            Waveform::Square => "square",
            Waveform::Off => "off",
        };
        f.write_str(name)
    }
}

/// MIDI note number to frequency in Hz (A4 = 69 = 440 Hz).
#[inline]
pub fn midi_to_freq(note: i32) -> f64 {
    440.0 * 2.0_f64.powf((note - 69) as f64 / 12.0)
}

// ═══════════════════════════════════════════════════════════════════
// Phase-accumulator oscillator (naive, non-bandlimited)
// ═══════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default)]
pub struct Oscillator {
    pub wave: Waveform,
    phase: f64,
    phase_delta: f64,
}

impl Oscillator {
    pub fn new(wave: Waveform) -> Self {
        Self {
            wave,
            ..Self::default()
        }
    }

    pub fn set_frequency(&mut self, freq: f64, sample_rate: f64) {
        self.phase_delta = TAU * freq / sample_rate;
    }

    /// Add the oscillator output into `buf`.
    #[inline]
    pub fn process(&mut self, buf: &mut [f32]) {
        for sample in buf.iter_mut() {
            *sample += self.wave.sample(self.phase) as f32;
            self.phase += self.phase_delta;
            if self.phase >= TAU {
                self.phase -= TAU;
            }
        }
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
        self.phase_delta = 0.0;
    }
}
