// src/sampler.rs
//
// Sample playback instrument: up to 25 one-shot sounds, one per key.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, warn};

use crate::config::EngineConfig;
use crate::dsp::{Envelope, db_to_gain, sum};
use crate::error::{Error, Result};
use crate::event::Event;
use crate::event_queue::EventProducer;
use crate::instrument::Instrument;
use crate::props::{self, Prop, Props, Value};
use crate::voice::{Voice, VoiceState};

/// Pitch of the first key.
pub const ROOT_PITCH: i32 = 60;

/// Number of keys (and therefore sounds) the sampler can map.
pub const NUM_KEYS: usize = 25;

pub const PROP_SOUND_MAP: &str = "sounds.map";

/// Fade used when a sound is choked or its note ends.
const STOP_RELEASE: f64 = 0.05;

/// Key index for `pitch`, if it is one of the sampler's keys.
#[inline]
pub fn key_index(pitch: i32) -> Option<usize> {
    usize::try_from(pitch - ROOT_PITCH)
        .ok()
        .filter(|key| *key < NUM_KEYS)
}

pub fn key_prop(name: &str, pitch: i32) -> String {
    format!("{name}.{pitch}")
}

// ═══════════════════════════════════════════════════════════════════
// Sounds
// ═══════════════════════════════════════════════════════════════════

/// A decoded mono sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Sound {
    pub samples: Vec<f32>,
    pub path: PathBuf,
}

/// Which sound each key plays. Published whole through `sounds.map`.
#[derive(Debug, Clone, Default)]
pub struct SoundMapping {
    keys: [Option<Arc<Sound>>; NUM_KEYS],
}

impl SoundMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `pitch` to `sound`. Pitches outside the key range are ignored.
    pub fn put(&mut self, pitch: i32, sound: Arc<Sound>) {
        if let Some(key) = key_index(pitch) {
            self.keys[key] = Some(sound);
        }
    }

    pub fn remove(&mut self, pitch: i32) -> Option<Arc<Sound>> {
        key_index(pitch).and_then(|key| self.keys[key].take())
    }

    pub fn get(&self, pitch: i32) -> Option<&Arc<Sound>> {
        key_index(pitch).and_then(|key| self.keys[key].as_ref())
    }

    /// Number of mapped keys.
    pub fn len(&self) -> usize {
        self.keys.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Decodes sample files.
pub trait SampleLoader: Send {
    fn load(&self, path: &Path) -> Result<Sound>;
}

/// Loads WAV files with `hound`, keeping the first channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct WavLoader;

impl SampleLoader for WavLoader {
    fn load(&self, path: &Path) -> Result<Sound> {
        let load_err = |source| Error::Load {
            path: path.to_path_buf(),
            source,
        };

        let mut reader = hound::WavReader::open(path).map_err(load_err)?;
        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<std::result::Result<_, _>>()
                .map_err(load_err)?,
            hound::SampleFormat::Int => {
                let max_val = (1_i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|s| s as f32 / max_val))
                    .collect::<std::result::Result<_, _>>()
                    .map_err(load_err)?
            }
        };

        let samples = interleaved.into_iter().step_by(channels).collect::<Vec<_>>();
        debug!("loaded {} ({} samples)", path.display(), samples.len());

        Ok(Sound {
            samples,
            path: path.to_path_buf(),
        })
    }
}

// ═══════════════════════════════════════════════════════════════════
// Voice
// ═══════════════════════════════════════════════════════════════════

/// Per-key properties.
#[derive(Clone)]
struct KeyProps {
    attack: Prop,
    decay: Prop,
    level: Prop,

    /// Bit `n` set: a note on key `n` chokes this key
    choke: Prop,
}

pub struct SamplerVoice {
    sounds: Prop,
    keys: Arc<[KeyProps]>,
    state: VoiceState,
    env: Envelope,
    sound: Option<Arc<Sound>>,
    pos: usize,
    key: usize,
    velocity_gain: f64,
    duration: usize,
    played: usize,
}

impl SamplerVoice {
    fn new(sample_rate: f64, sounds: Prop, keys: Arc<[KeyProps]>) -> Self {
        let mut env = Envelope::new(sample_rate);
        env.sustain = 0.0;
        Self {
            sounds,
            keys,
            state: VoiceState::Free,
            env,
            sound: None,
            pos: 0,
            key: 0,
            velocity_gain: 1.0,
            duration: 0,
            played: 0,
        }
    }

    fn stop(&mut self) {
        self.env.release = STOP_RELEASE;
        self.env.start_release();
        self.state = VoiceState::Released;
    }

    fn free(&mut self) {
        self.sound = None;
        self.pos = 0;
        self.env.reset();
        self.state = VoiceState::Free;
    }
}

impl Voice for SamplerVoice {
    fn start(&mut self, pitch: i32, velocity: i32, duration: usize) {
        let Some(key) = key_index(pitch) else {
            warn!("sampler: pitch {pitch} is outside the key range");
            return;
        };

        let sound = match &**self.sounds.load() {
            Value::Sounds(mapping) => mapping.get(pitch).cloned(),
            _ => None,
        };
        let Some(sound) = sound else {
            debug!("sampler: no sound mapped to pitch {pitch}");
            return;
        };

        let props = &self.keys[key];
        self.env.attack = props.attack.float();
        self.env.decay = props.decay.float();
        self.env.start_attack();

        self.sound = Some(sound);
        self.pos = 0;
        self.key = key;
        self.velocity_gain = Event::velocity_gain(velocity);
        self.duration = duration;
        self.played = 0;
        self.state = VoiceState::Active;
    }

    fn render(&mut self, buf: &mut [f32]) {
        let Some(sound) = &self.sound else {
            return;
        };

        let gain = db_to_gain(self.keys[self.key].level.float()) * self.velocity_gain;
        let start = self.pos;
        self.pos = sum(buf, &sound.samples, start, gain, &mut self.env);
        self.played += self.pos - start;
        let finished = self.pos >= sound.samples.len();

        if self.state == VoiceState::Active && self.duration > 0 && self.played >= self.duration {
            self.stop();
        }
        if finished || self.env.is_idle() {
            self.free();
        }
    }

    fn state(&self) -> VoiceState {
        self.state
    }

    fn notify(&mut self, pitch: i32) {
        if self.state != VoiceState::Active {
            return;
        }
        let Some(key) = key_index(pitch) else {
            return;
        };
        if self.keys[self.key].choke.int() & (1 << key) != 0 {
            self.stop();
        }
    }
}

/// Build the sampler and register its properties: `sounds.map`, `level`
/// and per key `env.attack.<pitch>`, `env.decay.<pitch>`, `level.<pitch>`,
/// `choke.<pitch>`.
pub fn sampler(props: &mut Props, config: &EngineConfig) -> (Instrument, EventProducer) {
    let sounds = props.register(PROP_SOUND_MAP, props::sound_mapping(), SoundMapping::new());

    let keys: Arc<[KeyProps]> = (0..NUM_KEYS as i32)
        .map(|n| {
            let pitch = ROOT_PITCH + n;
            KeyProps {
                attack: props.register(&key_prop("env.attack", pitch), props::env_time(), 0.0005),
                decay: props.register(&key_prop("env.decay", pitch), props::env_time(), 5.0),
                level: props.register(&key_prop("level", pitch), props::level(), 0.0),
                choke: props.register(&key_prop("choke", pitch), props::int(), 0_i64),
            }
        })
        .collect();

    let voices = (0..config.voices)
        .map(|_| Box::new(SamplerVoice::new(config.sample_rate, sounds.clone(), keys.clone())) as Box<dyn Voice>)
        .collect();

    Instrument::new("sampler", props, voices, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sound(len: usize) -> Arc<Sound> {
        Arc::new(Sound {
            samples: vec![1.0; len],
            path: PathBuf::from("test.wav"),
        })
    }

    fn voice_with(mapping: SoundMapping) -> (SamplerVoice, Props) {
        let mut props = Props::new();
        let config = EngineConfig::default();
        let (_inst, _producer) = sampler(&mut props, &config);
        props.set(PROP_SOUND_MAP, mapping).unwrap();

        let sounds = props.handle(PROP_SOUND_MAP).unwrap();
        let keys: Arc<[KeyProps]> = (0..NUM_KEYS as i32)
            .map(|n| {
                let pitch = ROOT_PITCH + n;
                KeyProps {
                    attack: props.handle(&key_prop("env.attack", pitch)).unwrap(),
                    decay: props.handle(&key_prop("env.decay", pitch)).unwrap(),
                    level: props.handle(&key_prop("level", pitch)).unwrap(),
                    choke: props.handle(&key_prop("choke", pitch)).unwrap(),
                }
            })
            .collect();
        (SamplerVoice::new(config.sample_rate, sounds, keys), props)
    }

    #[test]
    fn test_key_range() {
        assert_eq!(key_index(59), None);
        assert_eq!(key_index(60), Some(0));
        assert_eq!(key_index(84), Some(24));
        assert_eq!(key_index(85), None);
    }

    #[test]
    fn test_mapping() {
        let mut mapping = SoundMapping::new();
        mapping.put(61, sound(4));
        mapping.put(100, sound(4));
        assert_eq!(mapping.len(), 1);
        assert!(mapping.get(61).is_some());
        assert!(mapping.remove(61).is_some());
        assert!(mapping.is_empty());
    }

    #[test]
    fn test_unmapped_pitch_stays_free() {
        let (mut voice, _props) = voice_with(SoundMapping::new());
        voice.start(60, 127, 0);
        assert_eq!(voice.state(), VoiceState::Free);
    }

    #[test]
    fn test_plays_to_the_end_of_the_sound() {
        let mut mapping = SoundMapping::new();
        mapping.put(60, sound(100));
        let (mut voice, _props) = voice_with(mapping);

        voice.start(60, 127, 0);
        assert_eq!(voice.state(), VoiceState::Active);

        let mut buf = [0.0f32; 64];
        voice.render(&mut buf);
        assert!(buf[63] > 0.9);
        assert_eq!(voice.state(), VoiceState::Active);

        let mut buf = [0.0f32; 64];
        voice.render(&mut buf);
        assert!(buf[35] > 0.0);
        assert_eq!(buf[36], 0.0);
        assert_eq!(voice.state(), VoiceState::Free);
    }

    #[test]
    fn test_key_level_and_velocity() {
        let mut mapping = SoundMapping::new();
        mapping.put(60, sound(1000));
        let (mut voice, props) = voice_with(mapping);
        props.set(&key_prop("level", 60), -20.0).unwrap();

        voice.start(60, 127, 0);
        let mut buf = [0.0f32; 64];
        voice.render(&mut buf);
        assert_abs_diff_eq!(buf[63], 0.1, epsilon = 1e-3);
    }

    #[test]
    fn test_choke_releases_the_voice() {
        let mut mapping = SoundMapping::new();
        mapping.put(60, sound(44_100));
        mapping.put(61, sound(44_100));
        let (mut voice, props) = voice_with(mapping);
        // key 1 (pitch 61) chokes key 0
        props.set(&key_prop("choke", 60), 0b10_i64).unwrap();

        voice.start(60, 127, 0);
        voice.notify(62);
        assert_eq!(voice.state(), VoiceState::Active);

        voice.notify(61);
        assert_eq!(voice.state(), VoiceState::Released);

        let mut buf = vec![0.0f32; 4096];
        voice.render(&mut buf);
        assert_eq!(voice.state(), VoiceState::Free);
    }

    #[test]
    fn test_wav_loader_reads_first_channel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");

        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 44_100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..10 {
            writer.write_sample(16_384_i16).unwrap();
            writer.write_sample(-16_384_i16).unwrap();
        }
        writer.finalize().unwrap();

        let sound = WavLoader.load(&path).unwrap();
        assert_eq!(sound.samples.len(), 10);
        assert_abs_diff_eq!(sound.samples[0], 0.5);
    }

    #[test]
    fn test_wav_loader_reports_missing_files() {
        let err = WavLoader.load(Path::new("/does/not/exist.wav")).unwrap_err();
        assert!(matches!(err, Error::Load { .. }));
    }
}
