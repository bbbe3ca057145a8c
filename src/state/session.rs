// src/state/session.rs
//
// Control-path session: owns the property stores and the step grid, and
// evaluates command lines against them.
//
// Nothing here runs on the audio thread. Every edit is published either
// through `Props::set` or as a new grid version, so a failing command never
// leaves the engine half updated.

use std::path::Path;
use std::sync::Arc;

use log::{debug, info};
use rand::SeedableRng;
use rand::rngs::StdRng;

use super::{Clip, ClipMap, NUM_TRACKS, SharedGrid};
use crate::clock::TimeSignature;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::lang::{self, Arg, Command};
use crate::presets::load_preset;
use crate::props::{Props, Value};
use crate::sampler::{PROP_SOUND_MAP, ROOT_PITCH, SampleLoader, SoundMapping, key_prop};
use crate::sequencer::{PROP_BPM, PROP_CLIPS};

/// Shortest and longest sample decay the `decay` command accepts, seconds.
const DECAY_RANGE: (f64, f64) = (0.005, 2.0);

/// Per-sound gain the `gain` command accepts, dB.
const GAIN_RANGE: (f64, f64) = (-40.0, 6.0);

const SAMPLER_PREFIX: &str = "sampler.";
const SYNTH_PREFIX: &str = "synth.";

pub struct Session {
    config: EngineConfig,
    grid: SharedGrid,

    /// `sounds.map`, `level` and the per-key sampler properties
    sampler: Props,

    /// Synth voice properties and `level`
    synth: Props,

    /// `bpm` and `clips`
    transport: Props,

    loader: Box<dyn SampleLoader>,
    rng: StdRng,

    /// Sequencer target index of the synth
    synth_target: usize,
}

impl Session {
    pub(crate) fn new(
        config: EngineConfig,
        grid: SharedGrid,
        sampler: Props,
        synth: Props,
        transport: Props,
        loader: Box<dyn SampleLoader>,
        synth_target: usize,
    ) -> Self {
        Self {
            config,
            grid,
            sampler,
            synth,
            transport,
            loader,
            rng: StdRng::from_entropy(),
            synth_target,
        }
    }

    /// Reseed the generator used by `rand`.
    pub fn seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    pub fn grid(&self) -> &SharedGrid {
        &self.grid
    }

    /// Parse and run one line. Blank lines and `#` comments are ignored.
    pub fn exec(&mut self, line: &str) -> Result<()> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(());
        }
        let command = lang::parse(line)?;
        self.eval(&command)
    }

    pub fn eval(&mut self, command: &Command) -> Result<()> {
        debug!("eval {command:?}");

        if is_sound_id(&command.name) {
            return self.eval_sound(&command.name, &command.args);
        }

        let builtin = BUILTINS
            .iter()
            .find(|b| b.name == command.name)
            .ok_or_else(|| Error::UnknownCommand(command.name.clone()))?;

        let count = match builtin.sounds {
            SoundArgs::None => 0,
            SoundArgs::One => 1,
            SoundArgs::All => command.args.len(),
        };
        if command.args.len() < count {
            return Err(Error::args(format!("{}: expected a sound id", builtin.name)));
        }

        let (ids, args) = command.args.split_at(count);
        let slots = ids
            .iter()
            .map(|arg| match arg {
                Arg::Ident(id) => self.sound_slot(id),
                other => Err(Error::InvalidSound(format!("<{}>", other.kind()))),
            })
            .collect::<Result<Vec<_>>>()?;

        (builtin.run)(self, &slots, args).map_err(|e| match e {
            Error::Arguments(msg) => Error::Arguments(format!("{}: {msg}", builtin.name)),
            other => other,
        })
    }

    /// Set a property by key. See [`Session::get`] for how keys resolve.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        let (props, key) = self.resolve(key);
        props.set(key, value)
    }

    /// Read a property. A `sampler.` or `synth.` prefix picks the
    /// instrument (`sampler.level`); bare keys are looked up in the
    /// transport, then the synth, then the sampler.
    pub fn get(&self, key: &str) -> Result<Arc<Value>> {
        let (props, key) = self.resolve(key);
        props.get(key)
    }

    fn resolve<'k>(&self, key: &'k str) -> (&Props, &'k str) {
        if let Some(rest) = key.strip_prefix(SAMPLER_PREFIX) {
            (&self.sampler, rest)
        } else if let Some(rest) = key.strip_prefix(SYNTH_PREFIX) {
            (&self.synth, rest)
        } else if self.transport.contains(key) {
            (&self.transport, key)
        } else if self.synth.contains(key) {
            (&self.synth, key)
        } else {
            (&self.sampler, key)
        }
    }

    // ─────────────────────────────────────────────────────────────────
    // Sounds
    // ─────────────────────────────────────────────────────────────────

    /// Decode `path` and map it to `slot` (or the first free one). Returns
    /// the slot used.
    pub fn load_sound(&mut self, path: &Path, slot: Option<usize>) -> Result<usize> {
        let slot = match slot {
            Some(slot) => slot,
            None => self.free_slot()?,
        };
        let sound = self.loader.load(path)?;
        let pitch = slot_pitch(slot);

        let mut mapping = self.sound_mapping();
        mapping.put(pitch, Arc::new(sound));
        self.sampler.set(PROP_SOUND_MAP, mapping)?;

        self.grid.update(|grid| {
            if grid.track(slot).is_none() {
                grid.add_track(slot, pitch);
            }
        });
        info!("loaded {} as {}", path.display(), sound_name(slot));
        Ok(slot)
    }

    fn delete_sound(&mut self, slot: usize) -> Result<()> {
        let mut mapping = self.sound_mapping();
        mapping.remove(slot_pitch(slot));
        self.sampler.set(PROP_SOUND_MAP, mapping)?;
        self.grid.update(|grid| grid.remove_track(slot));
        info!("deleted {}", sound_name(slot));
        Ok(())
    }

    fn sound_mapping(&self) -> SoundMapping {
        match self.sampler.get(PROP_SOUND_MAP).as_deref() {
            Ok(Value::Sounds(mapping)) => SoundMapping::clone(mapping),
            _ => SoundMapping::new(),
        }
    }

    fn free_slot(&self) -> Result<usize> {
        let grid = self.grid.load();
        (0..NUM_TRACKS)
            .find(|slot| grid.track(*slot).is_none())
            .ok_or_else(|| Error::args(format!("reached maximum number of sounds: {NUM_TRACKS}")))
    }

    /// Slot of a loaded sound, by its one-letter name.
    fn sound_slot(&self, id: &str) -> Result<usize> {
        parse_slot(id)
            .filter(|slot| self.grid.load().track(*slot).is_some())
            .ok_or_else(|| Error::InvalidSound(id.to_string()))
    }

    /// `a '2,4/*` and `a 3 7`: OR match expressions into the track, toggle
    /// single steps.
    fn eval_sound(&mut self, id: &str, args: &[Arg]) -> Result<()> {
        let slot = self.sound_slot(id)?;

        self.grid.try_update(|grid| {
            let (denom, num_steps, step_size, triplets) =
                (grid.time_signature.denom, grid.num_steps(), grid.step_size, grid.triplets);
            let track = grid
                .track_mut(slot)
                .ok_or_else(|| Error::InvalidSound(id.to_string()))?;

            for arg in args {
                match arg {
                    Arg::Match(expr) => {
                        let seq = expr.eval(denom, num_steps, step_size, triplets)?;
                        track.merge(&seq);
                    }
                    Arg::Int(step) => {
                        let toggled = usize::try_from(*step).is_ok_and(|step| track.toggle(step));
                        if !toggled {
                            return Err(Error::args(format!("step {step} is out of range 1-{num_steps}")));
                        }
                    }
                    other => return Err(Error::args(format!("unexpected argument: {}", other.kind()))),
                }
            }
            Ok(())
        })
    }

    // ─────────────────────────────────────────────────────────────────
    // Clips
    // ─────────────────────────────────────────────────────────────────

    fn clips(&self) -> ClipMap {
        match self.transport.get(PROP_CLIPS).as_deref() {
            Ok(Value::Clips(clips)) => ClipMap::clone(clips),
            _ => ClipMap::new(),
        }
    }

    /// Edit a copy of the clip map and publish it.
    fn update_clips(&self, edit: impl FnOnce(&mut ClipMap) -> Result<()>) -> Result<()> {
        let mut clips = self.clips();
        edit(&mut clips)?;
        self.transport.set(PROP_CLIPS, clips)
    }
}

// ═══════════════════════════════════════════════════════════════════
// Builtin commands
// ═══════════════════════════════════════════════════════════════════

/// How many leading arguments are sound ids.
#[derive(Debug, Clone, Copy)]
enum SoundArgs {
    None,
    One,
    All,
}

struct Builtin {
    name: &'static str,
    sounds: SoundArgs,
    run: fn(&mut Session, &[usize], &[Arg]) -> Result<()>,
}

const BUILTINS: &[Builtin] = &[
    Builtin { name: "beat", sounds: SoundArgs::None, run: beat },
    Builtin { name: "bpm", sounds: SoundArgs::None, run: bpm },
    Builtin { name: "decay", sounds: SoundArgs::One, run: decay },
    Builtin { name: "gain", sounds: SoundArgs::One, run: gain },
    Builtin { name: "clear", sounds: SoundArgs::All, run: clear },
    Builtin { name: "choke", sounds: SoundArgs::All, run: choke },
    Builtin { name: "rand", sounds: SoundArgs::All, run: random },
    Builtin { name: "mute", sounds: SoundArgs::All, run: mute },
    Builtin { name: "delete", sounds: SoundArgs::All, run: delete },
    Builtin { name: "load", sounds: SoundArgs::None, run: load },
    Builtin { name: "triplets", sounds: SoundArgs::None, run: triplets },
    Builtin { name: "set", sounds: SoundArgs::None, run: set },
    Builtin { name: "preset", sounds: SoundArgs::None, run: preset },
    Builtin { name: "clip", sounds: SoundArgs::None, run: clip },
    Builtin { name: "note", sounds: SoundArgs::None, run: note },
    Builtin { name: "unclip", sounds: SoundArgs::None, run: unclip },
];

fn beat(s: &mut Session, _: &[usize], args: &[Arg]) -> Result<()> {
    let num = int_arg(args, 0)?;
    let denom = int_arg(args, 1)?;
    let time_signature: TimeSignature = format!("{num}/{denom}").parse()?;
    if time_signature.denom > s.config.step_size {
        return Err(Error::args(format!(
            "{time_signature} is finer than the step size {}",
            s.config.step_size
        )));
    }
    s.grid.update(|grid| grid.set_time_signature(time_signature));
    info!("time signature {time_signature}");
    Ok(())
}

fn bpm(s: &mut Session, _: &[usize], args: &[Arg]) -> Result<()> {
    s.transport.set(PROP_BPM, float_arg(args, 0)?)
}

fn decay(s: &mut Session, slots: &[usize], args: &[Arg]) -> Result<()> {
    let d = float_arg(args, 0)?;
    let (min, max) = DECAY_RANGE;
    if !(min..=max).contains(&d) {
        return Err(Error::args(format!("{d} is out of range 5ms - 2s")));
    }
    s.sampler.set(&key_prop("env.decay", slot_pitch(slots[0])), d)
}

fn gain(s: &mut Session, slots: &[usize], args: &[Arg]) -> Result<()> {
    let db = float_arg(args, 0)?;
    let (min, max) = GAIN_RANGE;
    if !(min..=max).contains(&db) {
        return Err(Error::args(format!("{db}dB is out of range {min}dB - {max}dB")));
    }
    s.sampler.set(&key_prop("level", slot_pitch(slots[0])), db)
}

fn clear(s: &mut Session, slots: &[usize], _: &[Arg]) -> Result<()> {
    s.grid.update(|grid| {
        for slot in slots {
            if let Some(track) = grid.track_mut(*slot) {
                track.clear();
            }
        }
    });
    Ok(())
}

/// Every sound in the set chokes all the others. Replaces any previous
/// groups.
fn choke(s: &mut Session, slots: &[usize], _: &[Arg]) -> Result<()> {
    let group = slots.iter().fold(0_i64, |mask, slot| mask | 1 << slot);
    for slot in 0..NUM_TRACKS {
        let mask = if slots.contains(&slot) { group & !(1 << slot) } else { 0 };
        s.sampler.set(&key_prop("choke", slot_pitch(slot)), mask)?;
    }
    Ok(())
}

fn random(s: &mut Session, slots: &[usize], _: &[Arg]) -> Result<()> {
    let rng = &mut s.rng;
    s.grid.update(|grid| {
        for slot in slots {
            if let Some(track) = grid.track_mut(*slot) {
                track.randomize(rng);
            }
        }
    });
    Ok(())
}

fn mute(s: &mut Session, slots: &[usize], _: &[Arg]) -> Result<()> {
    s.grid.update(|grid| {
        for slot in slots {
            if let Some(track) = grid.track_mut(*slot) {
                track.muted = !track.muted;
            }
        }
    });
    Ok(())
}

fn delete(s: &mut Session, slots: &[usize], _: &[Arg]) -> Result<()> {
    for slot in slots {
        s.delete_sound(*slot)?;
    }
    Ok(())
}

/// `load <path> [id]`
fn load(s: &mut Session, _: &[usize], args: &[Arg]) -> Result<()> {
    let path = name_arg(args, 0)?.to_string();
    let slot = match args.get(1) {
        Some(Arg::Ident(id)) => Some(parse_slot(id).ok_or_else(|| Error::InvalidSound(id.clone()))?),
        Some(other) => return Err(Error::InvalidSound(format!("<{}>", other.kind()))),
        None => None,
    };
    s.load_sound(Path::new(&path), slot).map(|_| ())
}

fn triplets(s: &mut Session, _: &[usize], _: &[Arg]) -> Result<()> {
    let on = s.grid.update(|grid| {
        grid.triplets = !grid.triplets;
        grid.triplets
    });
    info!("triplets {}", if on { "on" } else { "off" });
    Ok(())
}

/// `set <key> <value>`
fn set(s: &mut Session, _: &[usize], args: &[Arg]) -> Result<()> {
    let key = name_arg(args, 0)?;
    let value = match args.get(1) {
        Some(Arg::Int(i)) => Value::Int(*i),
        Some(Arg::Float(f)) => Value::Float(*f),
        Some(Arg::Ident(v) | Arg::Str(v)) => Value::Text(v.clone()),
        Some(other) => return Err(Error::args(format!("can't set {key} to a {}", other.kind()))),
        None => return Err(Error::args("missing value")),
    };
    s.set(key, value)
}

fn preset(s: &mut Session, _: &[usize], args: &[Arg]) -> Result<()> {
    load_preset(name_arg(args, 0)?, &s.synth)
}

/// `clip <name> <beats>`: a new, empty clip on the synth.
fn clip(s: &mut Session, _: &[usize], args: &[Arg]) -> Result<()> {
    let name = name_arg(args, 0)?.to_string();
    let beats = float_arg(args, 1)?;
    if beats <= 0.0 {
        return Err(Error::args(format!("clip length must be positive: {beats}")));
    }
    let target = s.synth_target;
    s.update_clips(|clips| {
        clips.insert(name, Clip::new(beats, target));
        Ok(())
    })
}

/// `note <clip> <beat> <pitch> <beats>`
fn note(s: &mut Session, _: &[usize], args: &[Arg]) -> Result<()> {
    let name = name_arg(args, 0)?;
    let position = float_arg(args, 1)?;
    let pitch = int_arg(args, 2)?;
    let length = float_arg(args, 3)?;
    if !(1..=127).contains(&pitch) {
        return Err(Error::args(format!("pitch out of range 1-127: {pitch}")));
    }

    s.update_clips(|clips| {
        let clip = clips
            .get_mut(name)
            .ok_or_else(|| Error::args(format!("no such clip: {name}")))?;
        if position < 0.0 || position >= clip.beats() {
            return Err(Error::args(format!(
                "beat {position} is outside {name} (0 - {} beats)",
                clip.beats()
            )));
        }
        clip.add_note(position, pitch as i32, length);
        Ok(())
    })
}

fn unclip(s: &mut Session, _: &[usize], args: &[Arg]) -> Result<()> {
    let name = name_arg(args, 0)?;
    s.update_clips(|clips| {
        clips
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::args(format!("no such clip: {name}")))
    })
}

// ═══════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════

fn is_sound_id(name: &str) -> bool {
    name.len() == 1 && name.chars().all(|c| c.is_ascii_alphabetic())
}

/// `a` → 0, `B` → 1, …
fn parse_slot(id: &str) -> Option<usize> {
    if !is_sound_id(id) {
        return None;
    }
    let slot = (id.as_bytes()[0].to_ascii_lowercase() - b'a') as usize;
    (slot < NUM_TRACKS).then_some(slot)
}

fn slot_pitch(slot: usize) -> i32 {
    ROOT_PITCH + slot as i32
}

pub fn sound_name(slot: usize) -> char {
    (b'a' + slot as u8) as char
}

fn missing(n: usize) -> Error {
    Error::args(format!("missing argument {}", n + 1))
}

fn float_arg(args: &[Arg], n: usize) -> Result<f64> {
    match args.get(n) {
        Some(Arg::Float(f)) => Ok(*f),
        Some(Arg::Int(i)) => Ok(*i as f64),
        Some(other) => Err(Error::args(format!(
            "argument {}: expected a number, got {}",
            n + 1,
            other.kind()
        ))),
        None => Err(missing(n)),
    }
}

fn int_arg(args: &[Arg], n: usize) -> Result<i64> {
    match args.get(n) {
        Some(Arg::Int(i)) => Ok(*i),
        Some(other) => Err(Error::args(format!(
            "argument {}: expected an int, got {}",
            n + 1,
            other.kind()
        ))),
        None => Err(missing(n)),
    }
}

/// An identifier or a string.
fn name_arg(args: &[Arg], n: usize) -> Result<&str> {
    match args.get(n) {
        Some(Arg::Ident(s) | Arg::Str(s)) => Ok(s),
        Some(other) => Err(Error::args(format!(
            "argument {}: expected a name, got {}",
            n + 1,
            other.kind()
        ))),
        None => Err(missing(n)),
    }
}
