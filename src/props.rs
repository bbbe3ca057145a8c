// src/props.rs
//
// Lock-free property store shared between the control thread and the audio
// thread.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use arc_swap::{ArcSwap, Guard};

use crate::dsp::Waveform;
use crate::error::{Error, Result};
use crate::sampler::SoundMapping;
use crate::state::ClipMap;

/// A published property value.
///
/// The set of kinds is closed; each registered key decides at registration
/// time which kinds it accepts through its validator.
#[derive(Debug, Clone)]
pub enum Value {
    Float(f64),
    Int(i64),
    Text(String),
    Wave(Waveform),
    Sounds(Arc<SoundMapping>),
    Clips(Arc<ClipMap>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Float(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Wave(w) => write!(f, "{w}"),
            Value::Sounds(m) => write!(f, "<{} sounds>", m.len()),
            Value::Clips(c) => write!(f, "<{} clips>", c.len()),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<Waveform> for Value {
    fn from(w: Waveform) -> Self {
        Value::Wave(w)
    }
}

impl From<SoundMapping> for Value {
    fn from(m: SoundMapping) -> Self {
        Value::Sounds(Arc::new(m))
    }
}

impl From<ClipMap> for Value {
    fn from(c: ClipMap) -> Self {
        Value::Clips(Arc::new(c))
    }
}

/// Checks (and normalizes) a value before it is published.
///
/// Validators are pure: they either return the value to store or a
/// description of why it was rejected.
pub type Validator = Arc<dyn Fn(Value) -> std::result::Result<Value, String> + Send + Sync>;

/// A float in `[min, max]`. Integers are widened.
pub fn float_in(min: f64, max: f64) -> Validator {
    Arc::new(move |v: Value| {
        let f = match v {
            Value::Float(f) => f,
            Value::Int(i) => i as f64,
            other => return Err(format!("value is not a float: {other}")),
        };
        if f < min || f > max {
            return Err(format!("value is not in range [{min}, {max}]: {f}"));
        }
        Ok(Value::Float(f))
    })
}

/// Any integer. Floats are truncated.
pub fn int() -> Validator {
    Arc::new(|v: Value| match v {
        Value::Int(i) => Ok(Value::Int(i)),
        Value::Float(f) => Ok(Value::Int(f as i64)),
        other => Err(format!("value is not an int: {other}")),
    })
}

/// One of the oscillator waveform names.
pub fn waveform() -> Validator {
    Arc::new(|v: Value| match v {
        Value::Wave(w) => Ok(Value::Wave(w)),
        Value::Text(s) => s
            .parse::<Waveform>()
            .map(Value::Wave)
            .map_err(|_| format!("not a valid waveform type: {s}")),
        other => Err(format!("value is not a string: {other}")),
    })
}

pub fn sound_mapping() -> Validator {
    Arc::new(|v: Value| match v {
        Value::Sounds(m) => Ok(Value::Sounds(m)),
        other => Err(format!("value is not a sound mapping: {other}")),
    })
}

pub fn clips() -> Validator {
    Arc::new(|v: Value| match v {
        Value::Clips(c) => Ok(Value::Clips(c)),
        other => Err(format!("value is not a map of clips: {other}")),
    })
}

/// Envelope times in seconds.
pub fn env_time() -> Validator {
    float_in(0.0005, 15.0)
}

/// Levels in dB.
pub fn level() -> Validator {
    float_in(-40.0, 10.0)
}

/// Read handle for a single property.
///
/// Cheap to clone. Loads are lock-free and never allocate, so handles are
/// what voices and clocks keep for use on the audio thread.
#[derive(Clone)]
pub struct Prop {
    cell: Arc<ArcSwap<Value>>,
}

impl Prop {
    /// Current value.
    #[inline]
    pub fn load(&self) -> Guard<Arc<Value>> {
        self.cell.load()
    }

    #[inline]
    pub fn float(&self) -> f64 {
        match **self.cell.load() {
            Value::Float(f) => f,
            Value::Int(i) => i as f64,
            _ => 0.0,
        }
    }

    #[inline]
    pub fn int(&self) -> i64 {
        match **self.cell.load() {
            Value::Int(i) => i,
            Value::Float(f) => f as i64,
            _ => 0,
        }
    }

    #[inline]
    pub fn wave(&self) -> Waveform {
        match **self.cell.load() {
            Value::Wave(w) => w,
            _ => Waveform::Off,
        }
    }

    fn store(&self, value: Value) {
        self.cell.store(Arc::new(value));
    }
}

struct Entry {
    prop: Prop,
    validate: Validator,
}

/// Device configuration that can be updated without locks.
///
/// All properties must be registered (during setup, with `&mut self`)
/// before any reads take place. After that the store is only accessed
/// through `&self` and can be shared with `Arc`.
#[derive(Default)]
pub struct Props {
    entries: HashMap<String, Entry>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new property and return its read handle.
    ///
    /// Panics if `initial` is rejected by `validate`: that is a setup bug,
    /// not a runtime condition.
    pub fn register(&mut self, key: &str, validate: Validator, initial: impl Into<Value>) -> Prop {
        let value = match validate(initial.into()) {
            Ok(value) => value,
            Err(reason) => panic!("register property {key}: {reason}"),
        };
        let prop = Prop {
            cell: Arc::new(ArcSwap::from_pointee(value)),
        };
        self.entries.insert(
            key.to_string(),
            Entry {
                prop: prop.clone(),
                validate,
            },
        );
        prop
    }

    /// Validate and publish a new value. Rejected values leave the previous
    /// value in place.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        let entry = self
            .entries
            .get(key)
            .ok_or_else(|| Error::UnknownProperty(key.to_string()))?;

        let value = (entry.validate)(value.into()).map_err(|reason| Error::InvalidValue {
            key: key.to_string(),
            reason,
        })?;

        entry.prop.store(value);
        Ok(())
    }

    /// Most recently published value.
    pub fn get(&self, key: &str) -> Result<Arc<Value>> {
        self.entries
            .get(key)
            .map(|entry| entry.prop.cell.load_full())
            .ok_or_else(|| Error::UnknownProperty(key.to_string()))
    }

    /// Read handle for an already registered key.
    pub fn handle(&self, key: &str) -> Option<Prop> {
        self.entries.get(key).map(|entry| entry.prop.clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}
