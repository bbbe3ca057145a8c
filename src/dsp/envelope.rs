// Envelope generator.

// ═══════════════════════════════════════════════════════════════════
// ADSR Envelope
// ═══════════════════════════════════════════════════════════════════

/// Rounding slack when the attack ramp approaches full scale.
const FULL_SCALE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeStage {
    Init,
    Attack,
    Decay,
    Sustain,
    Release,
}

/// Linear ADSR envelope.
///
/// Times are in seconds, `sustain` is a 0-1 level. The per-sample rates are
/// derived when a stage starts, so changing a time mid-note only affects
/// the next stage transition.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub attack: f64,
    pub decay: f64,
    pub sustain: f64,
    pub release: f64,

    attack_rate: f64,
    decay_rate: f64,
    release_rate: f64,

    value: f64,
    stage: EnvelopeStage,
    sample_rate: f64,
}

impl Envelope {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            attack: 0.01,
            decay: 0.5,
            sustain: 1.0,
            release: 0.1,
            attack_rate: 0.0,
            decay_rate: 0.0,
            release_rate: 0.0,
            value: 0.0,
            stage: EnvelopeStage::Init,
            sample_rate,
        }
    }

    #[inline]
    fn samples(&self, seconds: f64) -> f64 {
        (seconds * self.sample_rate).max(1.0)
    }

    /// Restart from silence.
    pub fn start_attack(&mut self) {
        self.value = 0.0;
        self.stage = EnvelopeStage::Attack;
        self.attack_rate = 1.0 / self.samples(self.attack);
        self.decay_rate = if self.sustain > 0.0 {
            (1.0 - self.sustain) / self.samples(self.decay)
        } else {
            1.0 / self.samples(self.decay)
        };
    }

    /// Fade from the current value to zero over `release` seconds.
    pub fn start_release(&mut self) {
        self.stage = EnvelopeStage::Release;
        self.release_rate = self.value / self.samples(self.release);
    }

    /// Advance one sample and return the gain for it.
    #[inline]
    pub fn value(&mut self) -> f64 {
        match self.stage {
            EnvelopeStage::Init => return 0.0,

            EnvelopeStage::Attack => {
                self.value += self.attack_rate;
                if self.value >= 1.0 - FULL_SCALE_EPSILON {
                    self.value = 1.0;
                    self.stage = if self.decay_rate > 0.0 {
                        EnvelopeStage::Decay
                    } else {
                        EnvelopeStage::Sustain
                    };
                }
            }

            EnvelopeStage::Decay => {
                self.value -= self.decay_rate;
                if self.value <= self.sustain {
                    self.value = self.sustain;
                    self.stage = EnvelopeStage::Sustain;
                }
            }

            EnvelopeStage::Sustain => {
                if self.sustain == 0.0 {
                    self.value = 0.0;
                    self.stage = EnvelopeStage::Init;
                } else {
                    self.value = self.sustain;
                }
            }

            EnvelopeStage::Release => {
                self.value -= self.release_rate;
                if self.value <= 0.0 {
                    self.value = 0.0;
                    self.stage = EnvelopeStage::Init;
                }
            }
        }
        self.value
    }

    /// Multiply `buf` by the envelope, one sample per frame.
    #[inline]
    pub fn process(&mut self, buf: &mut [f32]) {
        for sample in buf.iter_mut() {
            *sample *= self.value() as f32;
        }
    }

    #[inline]
    pub fn stage(&self) -> EnvelopeStage {
        self.stage
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        self.stage == EnvelopeStage::Init
    }

    pub fn reset(&mut self) {
        self.stage = EnvelopeStage::Init;
        self.value = 0.0;
    }
}
