// src/state/mod.rs
//
// Control-side state.
//
// The structures here describe what should play: clips, step tables and
// the session that edits them. They reach the audio thread only as
// published, immutable versions.

mod clip;
mod pattern;
mod session;

pub use clip::*;
pub use pattern::*;
pub use session::*;
