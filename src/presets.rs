// src/presets.rs
//
// Named property bundles.

use log::info;

use crate::error::{Error, Result};
use crate::props::{Props, Value};

/// Known preset names.
pub const PRESETS: &[&str] = &["lame-bass"];

fn bundle(name: &str) -> Option<Vec<(&'static str, Value)>> {
    let values = match name {
        "lame-bass" => vec![
            ("level", Value::Float(3.0)),
            ("env.decay", Value::Float(0.1)),
            ("env.sustain", Value::Float(0.0)),
            ("osc1.wave", Value::from("saw")),
            ("osc2.wave", Value::from("saw")),
            ("cutoff", Value::Float(900.0)),
        ],
        _ => return None,
    };
    Some(values)
}

/// Apply preset `name` to `props`, one `set` per property.
///
/// Stops at the first value `props` rejects; the properties set before it
/// keep their new values.
pub fn load_preset(name: &str, props: &Props) -> Result<()> {
    let values = bundle(name).ok_or_else(|| Error::NoSuchPreset(name.to_string()))?;
    for (key, value) in values {
        props.set(key, value)?;
    }
    info!("loaded preset {name}");
    Ok(())
}
